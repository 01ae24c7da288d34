/*!
core::Cpu - The 6502 façade the machine drives.

`Cpu` owns a `CpuState` and runs it against any `CpuBus`. One `step` is one
instruction (plus a following interrupt sequence, if one was due), and the
returned count covers every cycle the bus spent, DMA stalls included.

Power and reset
===============
Both run the 7-cycle reset sequence: two reads at PC, three stack reads
with SP decrementing (the suppressed pushes), then the vector fetch from
$FFFC. Power first clears the registers (SP 0 so the sequence leaves $FD);
reset keeps A/X/Y and lands SP three below its old value.
*/

use crate::cpu::dispatch;
use crate::cpu::state::{BREAK, CpuState, IRQ_DISABLE, RESET_VECTOR, UNUSED};
use crate::cpu_bus::CpuBus;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Register snapshot for hosts and debuggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuRegisters {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Cpu {
    state: CpuState,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registers(&self) -> CpuRegisters {
        let s = &self.state;
        CpuRegisters {
            a: s.a,
            x: s.x,
            y: s.y,
            sp: s.sp,
            pc: s.pc,
            status: s.status,
        }
    }

    pub fn pc(&self) -> u16 {
        self.state.pc
    }

    pub fn is_jammed(&self) -> bool {
        self.state.jammed
    }

    /// Cold start: A=X=Y=0, P=$34, SP ends at $FD.
    pub fn power<B: CpuBus>(&mut self, bus: &mut B) {
        self.state = CpuState {
            status: IRQ_DISABLE | BREAK | UNUSED,
            ..CpuState::new()
        };
        self.run_reset_sequence(bus);
    }

    /// Warm reset: registers survive, SP -= 3, I set, JAM cleared.
    pub fn reset<B: CpuBus>(&mut self, bus: &mut B) {
        let s = &mut self.state;
        s.jammed = false;
        s.need_nmi = false;
        s.prev_need_nmi = false;
        s.run_irq = false;
        s.prev_run_irq = false;
        self.run_reset_sequence(bus);
    }

    fn run_reset_sequence<B: CpuBus>(&mut self, bus: &mut B) {
        let s = &mut self.state;
        s.dummy_read(bus, s.pc);
        s.dummy_read(bus, s.pc);
        for _ in 0..3 {
            s.stack_dummy_read(bus);
            s.sp = s.sp.wrapping_sub(1);
        }
        s.assign_flag(IRQ_DISABLE, true);
        s.pc = s.read_u16(bus, RESET_VECTOR);
        // Lines already high at power-on are not edges.
        s.need_nmi = false;
        s.prev_need_nmi = false;
    }

    /// Execute one instruction; returns the CPU cycles it took on the bus.
    pub fn step<B: CpuBus>(&mut self, bus: &mut B) -> u32 {
        let start = bus.cycle_count();
        dispatch::step(&mut self.state, bus);
        (bus.cycle_count() - start) as u32
    }
}

impl Stateful for Cpu {
    fn save_state(&self, w: &mut StateWriter) {
        self.state.save_state(w);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.state.load_state(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_bus::tests::FlatBus;
    use crate::state::{StateReader, StateWriter};

    #[test]
    fn power_takes_seven_cycles_and_loads_vector() {
        let mut bus = FlatBus::with_program(0xC123, &[0xEA]);
        let mut cpu = Cpu::new();
        cpu.power(&mut bus);
        assert_eq!(bus.cycles, 7);
        let r = cpu.registers();
        assert_eq!(r.pc, 0xC123);
        assert_eq!(r.sp, 0xFD);
        assert_eq!(r.status, 0x34);
        assert_eq!((r.a, r.x, r.y), (0, 0, 0));
        // No stack writes during reset.
        assert!(bus.log.iter().all(|e| !e.2));
    }

    #[test]
    fn reset_keeps_registers_and_drops_sp_by_three() {
        let mut bus = FlatBus::with_program(0x8000, &[0xA9, 0x42, 0x02]);
        let mut cpu = Cpu::new();
        cpu.power(&mut bus);
        cpu.step(&mut bus);
        cpu.step(&mut bus);
        assert!(cpu.is_jammed());
        cpu.reset(&mut bus);
        assert!(!cpu.is_jammed());
        assert_eq!(cpu.registers().a, 0x42);
        assert_eq!(cpu.registers().sp, 0xFA);
        assert_eq!(cpu.pc(), 0x8000);
    }

    #[test]
    fn step_reports_bus_cycles() {
        let mut bus = FlatBus::with_program(0x8000, &[0xEE, 0x00, 0x02]);
        let mut cpu = Cpu::new();
        cpu.power(&mut bus);
        assert_eq!(cpu.step(&mut bus), 6);
    }

    #[test]
    fn state_round_trip() {
        let mut bus = FlatBus::with_program(0x8000, &[0xA2, 0x99]);
        let mut cpu = Cpu::new();
        cpu.power(&mut bus);
        cpu.step(&mut bus);
        let mut w = StateWriter::new();
        cpu.save_state(&mut w);
        let bytes = w.into_bytes();
        let mut other = Cpu::new();
        other.load_state(&mut StateReader::new(&bytes)).unwrap();
        assert_eq!(other.registers(), cpu.registers());
    }
}
