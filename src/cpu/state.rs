/*!
state.rs - 6502 architectural state plus the per-cycle bus primitives.

Overview
========
`CpuState` owns the registers, the status byte and the interrupt sequencing
latches. Every bus access goes through `read`/`write` here so that the
interrupt lines are sampled at the end of each cycle, the way the 2A03 polls
them; nothing else in the core touches the bus directly.

Interrupt latches
=================
- `need_nmi` is set on a rising edge of the NMI line and cleared when the
  NMI is serviced (or hijacks a BRK/IRQ sequence).
- `run_irq` is the IRQ line AND NOT I, sampled every cycle.
- `prev_need_nmi` / `prev_run_irq` hold the values from one cycle earlier.
  The dispatcher checks those after each instruction, which reproduces the
  "poll on the penultimate cycle" rule (CLI/SEI/PLP delay, branch delay).

6502 Status Register Bit Layout
===============================
Bit: 7 6 5 4 3 2 1 0
     N V 1 B D I Z C
B exists only on the stack copy pushed by PHP/BRK.
*/

use crate::cpu_bus::CpuBus;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Processor status flag bit masks.
pub const CARRY: u8 = 0b0000_0001;
pub const ZERO: u8 = 0b0000_0010;
pub const IRQ_DISABLE: u8 = 0b0000_0100;
pub const DECIMAL: u8 = 0b0000_1000; // Stored and pushed, ignored by the ALU.
pub const BREAK: u8 = 0b0001_0000;
pub const UNUSED: u8 = 0b0010_0000;
pub const OVERFLOW: u8 = 0b0100_0000;
pub const NEGATIVE: u8 = 0b1000_0000;

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    /// A JAM opcode locked the core; only reset or power clears it.
    pub jammed: bool,

    pub(crate) need_nmi: bool,
    pub(crate) prev_need_nmi: bool,
    pub(crate) prev_nmi_line: bool,
    pub(crate) run_irq: bool,
    pub(crate) prev_run_irq: bool,
}

impl Default for CpuState {
    fn default() -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0x00,
            pc: 0x0000,
            status: IRQ_DISABLE | UNUSED,
            jammed: false,
            need_nmi: false,
            prev_need_nmi: false,
            prev_nmi_line: false,
            run_irq: false,
            prev_run_irq: false,
        }
    }
}

impl CpuState {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Flag Operations
    // ---------------------------------------------------------------------

    #[inline]
    pub fn is_flag_set(&self, mask: u8) -> bool {
        (self.status & mask) != 0
    }

    #[inline]
    pub fn assign_flag(&mut self, mask: u8, value: bool) {
        if value {
            self.status |= mask;
        } else {
            self.status &= !mask;
        }
    }

    #[inline]
    pub fn update_zn(&mut self, result: u8) {
        self.assign_flag(ZERO, result == 0);
        self.assign_flag(NEGATIVE, (result & 0x80) != 0);
    }

    /// Status byte as pushed: UNUSED forced on, BREAK only for PHP/BRK.
    pub fn compose_status_for_push(&self, set_break_on_push: bool) -> u8 {
        let v = (self.status | UNUSED) & !BREAK;
        if set_break_on_push { v | BREAK } else { v }
    }

    /// Status byte as pulled by PLP/RTI: BREAK dropped, UNUSED kept.
    #[inline]
    pub fn restore_status(&mut self, pulled: u8) {
        self.status = (pulled & !BREAK) | UNUSED;
    }

    // ---------------------------------------------------------------------
    // Bus cycles
    // ---------------------------------------------------------------------

    /// One read cycle, followed by the end-of-cycle interrupt poll.
    #[inline]
    pub fn read<B: CpuBus>(&mut self, bus: &mut B, addr: u16) -> u8 {
        let v = bus.read(addr);
        self.poll_interrupts(bus);
        v
    }

    /// One write cycle, followed by the end-of-cycle interrupt poll.
    #[inline]
    pub fn write<B: CpuBus>(&mut self, bus: &mut B, addr: u16, value: u8) {
        bus.write(addr, value);
        self.poll_interrupts(bus);
    }

    /// Read whose value the instruction discards (still a real bus cycle).
    #[inline]
    pub fn dummy_read<B: CpuBus>(&mut self, bus: &mut B, addr: u16) {
        self.read(bus, addr);
    }

    #[inline]
    pub fn fetch_u8<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        let b = self.read(bus, self.pc);
        self.pc = self.pc.wrapping_add(1);
        b
    }

    #[inline]
    pub fn fetch_u16<B: CpuBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.fetch_u8(bus) as u16;
        let hi = self.fetch_u8(bus) as u16;
        (hi << 8) | lo
    }

    /// Little-endian word read, as used for vectors.
    pub fn read_u16<B: CpuBus>(&mut self, bus: &mut B, addr: u16) -> u16 {
        let lo = self.read(bus, addr) as u16;
        let hi = self.read(bus, addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn poll_interrupts<B: CpuBus>(&mut self, bus: &B) {
        self.prev_need_nmi = self.need_nmi;
        let nmi_line = bus.nmi_line();
        if nmi_line && !self.prev_nmi_line {
            self.need_nmi = true;
        }
        self.prev_nmi_line = nmi_line;

        self.prev_run_irq = self.run_irq;
        self.run_irq = bus.irq_line() && !self.is_flag_set(IRQ_DISABLE);
    }

    /// True when the instruction that just finished must be followed by an
    /// interrupt sequence.
    #[inline]
    pub(crate) fn interrupt_due(&self) -> bool {
        self.prev_need_nmi || self.prev_run_irq
    }

    // ---------------------------------------------------------------------
    // Stack Helpers
    // ---------------------------------------------------------------------
    //
    // Push: write at 0x0100 | SP, then SP -= 1
    // Pull: SP += 1, then read at 0x0100 | SP

    #[inline]
    pub fn push_u8<B: CpuBus>(&mut self, bus: &mut B, value: u8) {
        let addr = 0x0100u16 | (self.sp as u16);
        self.write(bus, addr, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    #[inline]
    pub fn pop_u8<B: CpuBus>(&mut self, bus: &mut B) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100u16 | (self.sp as u16);
        self.read(bus, addr)
    }

    /// Return addresses go high byte first, so they pop low byte first.
    #[inline]
    pub fn push_u16<B: CpuBus>(&mut self, bus: &mut B, value: u16) {
        self.push_u8(bus, (value >> 8) as u8);
        self.push_u8(bus, value as u8);
    }

    #[inline]
    pub fn pop_u16<B: CpuBus>(&mut self, bus: &mut B) -> u16 {
        let lo = self.pop_u8(bus) as u16;
        let hi = self.pop_u8(bus) as u16;
        (hi << 8) | lo
    }

    /// Read of the current stack slot without moving SP (internal cycles of
    /// PLA/PLP/RTS/RTI/JSR).
    #[inline]
    pub fn stack_dummy_read<B: CpuBus>(&mut self, bus: &mut B) {
        let addr = 0x0100u16 | (self.sp as u16);
        self.dummy_read(bus, addr);
    }
}

impl Stateful for CpuState {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.a);
        w.u8(self.x);
        w.u8(self.y);
        w.u8(self.sp);
        w.u16(self.pc);
        w.u8(self.status);
        w.bool(self.jammed);
        w.bool(self.need_nmi);
        w.bool(self.prev_need_nmi);
        w.bool(self.prev_nmi_line);
        w.bool(self.run_irq);
        w.bool(self.prev_run_irq);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.a = r.u8()?;
        self.x = r.u8()?;
        self.y = r.u8()?;
        self.sp = r.u8()?;
        self.pc = r.u16()?;
        self.status = r.u8()? | UNUSED;
        self.jammed = r.bool()?;
        self.need_nmi = r.bool()?;
        self.prev_need_nmi = r.bool()?;
        self.prev_nmi_line = r.bool()?;
        self.run_irq = r.bool()?;
        self.prev_run_irq = r.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_bus::tests::FlatBus;

    #[test]
    fn flag_assignment() {
        let mut s = CpuState::new();
        s.assign_flag(IRQ_DISABLE, false);
        assert!(!s.is_flag_set(IRQ_DISABLE));
        s.assign_flag(DECIMAL, true);
        assert!(s.is_flag_set(DECIMAL));
    }

    #[test]
    fn update_zn_behavior() {
        let mut s = CpuState::new();
        s.update_zn(0x00);
        assert!(s.is_flag_set(ZERO));
        assert!(!s.is_flag_set(NEGATIVE));
        s.update_zn(0x80);
        assert!(!s.is_flag_set(ZERO));
        assert!(s.is_flag_set(NEGATIVE));
    }

    #[test]
    fn compose_and_restore_status() {
        let mut s = CpuState::new();
        assert_ne!(s.compose_status_for_push(true) & BREAK, 0);
        assert_eq!(s.compose_status_for_push(false) & BREAK, 0);
        s.restore_status(0xFF);
        assert_eq!(s.status, 0xFF & !BREAK);
        s.restore_status(0x00);
        assert_eq!(s.status, UNUSED);
    }

    #[test]
    fn stack_push_pop_round_trip() {
        let mut bus = FlatBus::with_program(0x8000, &[0xEA]);
        let mut s = CpuState::new();
        s.sp = 0xFD;
        s.push_u16(&mut bus, 0xABCD);
        assert_eq!(bus.mem[0x01FD], 0xAB);
        assert_eq!(bus.mem[0x01FC], 0xCD);
        assert_eq!(s.pop_u16(&mut bus), 0xABCD);
        assert_eq!(s.sp, 0xFD);
    }

    #[test]
    fn nmi_is_edge_detected_and_irq_masked() {
        let mut bus = FlatBus::with_program(0x8000, &[0xEA]);
        let mut s = CpuState::new();
        bus.nmi = true;
        bus.irq = true;
        s.read(&mut bus, 0x8000);
        assert!(s.need_nmi);
        assert!(!s.run_irq, "I flag masks IRQ");
        s.need_nmi = false;
        s.read(&mut bus, 0x8000);
        assert!(!s.need_nmi, "a held line is not a new edge");
        s.assign_flag(IRQ_DISABLE, false);
        s.read(&mut bus, 0x8000);
        assert!(s.run_irq);
        assert!(!s.prev_run_irq);
        s.read(&mut bus, 0x8000);
        assert!(s.interrupt_due());
    }
}
