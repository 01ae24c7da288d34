/*!
addressing.rs - Effective-address resolution with the 2A03's bus traffic.

Overview
========
`resolve` runs the addressing cycles of an instruction and returns an
`Operand`. Every cycle a real 6502 spends on addressing is a bus access here,
including the ones whose value is thrown away:

```text
Imp/Acc  dummy read of the byte after the opcode (PC not advanced)
Imm/Rel  the operand byte's address is returned; the handler's read
         of it is the fetch cycle
Zp,X/Y   dummy read of the unindexed zero-page address
Abs,X/Y  dummy read of the un-carried address on page cross, or always
(zp),Y   for stores and read-modify-write instructions
(zp,X)   dummy read of the pointer before indexing
```

Zero-page pointers wrap within page 0, and JMP ($xxFF) fetches its high byte
from $xx00 (`read_word_indirect_bug`).
*/

use crate::cpu::state::CpuState;
use crate::cpu::table::{Access, Mode};
use crate::cpu_bus::CpuBus;

/// Resolved operand of the instruction being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Operand {
    pub mode: Mode,
    /// Effective address (the operand byte itself for Imm/Rel; unused for
    /// Imp/Acc; the pointer location for Ind).
    pub addr: u16,
}

pub(crate) fn resolve<B: CpuBus>(cpu: &mut CpuState, bus: &mut B, mode: Mode, access: Access) -> Operand {
    let addr = match mode {
        Mode::Imp | Mode::Acc => {
            cpu.dummy_read(bus, cpu.pc);
            0
        }
        Mode::Imm | Mode::Rel => {
            let at = cpu.pc;
            cpu.pc = cpu.pc.wrapping_add(1);
            at
        }
        Mode::Zp => cpu.fetch_u8(bus) as u16,
        Mode::Zpx => {
            let base = cpu.fetch_u8(bus);
            cpu.dummy_read(bus, base as u16);
            base.wrapping_add(cpu.x) as u16
        }
        Mode::Zpy => {
            let base = cpu.fetch_u8(bus);
            cpu.dummy_read(bus, base as u16);
            base.wrapping_add(cpu.y) as u16
        }
        Mode::Abs | Mode::Ind => cpu.fetch_u16(bus),
        Mode::Abx => {
            let base = cpu.fetch_u16(bus);
            let x = cpu.x;
            indexed(cpu, bus, base, x, access)
        }
        Mode::Aby => {
            let base = cpu.fetch_u16(bus);
            let y = cpu.y;
            indexed(cpu, bus, base, y, access)
        }
        Mode::Izx => {
            let zp = cpu.fetch_u8(bus);
            cpu.dummy_read(bus, zp as u16);
            let ptr = zp.wrapping_add(cpu.x);
            read_word_zp(cpu, bus, ptr)
        }
        Mode::Izy => {
            let zp = cpu.fetch_u8(bus);
            let base = read_word_zp(cpu, bus, zp);
            let y = cpu.y;
            indexed(cpu, bus, base, y, access)
        }
    };
    Operand { mode, addr }
}

/// Add `index` to `base`; the CPU first reads the address with the low byte
/// added but the carry into the high byte not yet applied.
#[inline]
fn indexed<B: CpuBus>(cpu: &mut CpuState, bus: &mut B, base: u16, index: u8, access: Access) -> u16 {
    let addr = base.wrapping_add(index as u16);
    if page_crossed(base, addr) || access != Access::Read {
        cpu.dummy_read(bus, (base & 0xFF00) | (addr & 0x00FF));
    }
    addr
}

#[inline]
pub(crate) fn page_crossed(a: u16, b: u16) -> bool {
    (a ^ b) & 0xFF00 != 0
}

/// 16-bit pointer from zero page; the high byte wraps to $00.
#[inline]
pub(crate) fn read_word_zp<B: CpuBus>(cpu: &mut CpuState, bus: &mut B, base: u8) -> u16 {
    let lo = cpu.read(bus, base as u16) as u16;
    let hi = cpu.read(bus, base.wrapping_add(1) as u16) as u16;
    (hi << 8) | lo
}

/// JMP (indirect): the high byte never carries into the next page.
#[inline]
pub(crate) fn read_word_indirect_bug<B: CpuBus>(cpu: &mut CpuState, bus: &mut B, addr: u16) -> u16 {
    let lo = cpu.read(bus, addr) as u16;
    let hi_addr = (addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF);
    let hi = cpu.read(bus, hi_addr) as u16;
    (hi << 8) | lo
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_bus::tests::FlatBus;

    fn cpu_at(pc: u16) -> CpuState {
        CpuState {
            pc,
            ..CpuState::new()
        }
    }

    #[test]
    fn abs_x_read_pays_only_on_page_cross() {
        let mut bus = FlatBus::with_program(0x8000, &[0xF5, 0x80, 0x10, 0x80]);
        let mut cpu = cpu_at(0x8000);
        cpu.x = 0x10;
        let op = resolve(&mut cpu, &mut bus, Mode::Abx, Access::Read);
        assert_eq!(op.addr, 0x8105);
        assert_eq!(bus.cycles, 3);
        assert_eq!(bus.log[2], (0x8005, 0, false), "un-carried address read first");

        bus.cycles = 0;
        let op = resolve(&mut cpu, &mut bus, Mode::Abx, Access::Read);
        assert_eq!(op.addr, 0x8020);
        assert_eq!(bus.cycles, 2);
    }

    #[test]
    fn stores_always_take_the_index_cycle() {
        let mut bus = FlatBus::with_program(0x8000, &[0x00, 0x02]);
        let mut cpu = cpu_at(0x8000);
        cpu.y = 1;
        resolve(&mut cpu, &mut bus, Mode::Aby, Access::Write);
        assert_eq!(bus.cycles, 3);
    }

    #[test]
    fn zero_page_indexing_wraps() {
        let mut bus = FlatBus::with_program(0x8000, &[0xF0]);
        let mut cpu = cpu_at(0x8000);
        cpu.x = 0x20;
        let op = resolve(&mut cpu, &mut bus, Mode::Zpx, Access::Read);
        assert_eq!(op.addr, 0x0010);
    }

    #[test]
    fn indexed_indirect_pointer_wraps_in_zero_page() {
        let mut bus = FlatBus::with_program(0x8000, &[0xFF]);
        bus.mem[0x00FF] = 0x34;
        bus.mem[0x0000] = 0x12;
        let mut cpu = cpu_at(0x8000);
        let op = resolve(&mut cpu, &mut bus, Mode::Izx, Access::Read);
        assert_eq!(op.addr, 0x1234);
    }

    #[test]
    fn indirect_jmp_bug() {
        let mut bus = FlatBus::with_program(0x8000, &[]);
        bus.mem[0x10FF] = 0x34;
        bus.mem[0x1000] = 0x12;
        bus.mem[0x1100] = 0x56;
        let mut cpu = cpu_at(0x8000);
        assert_eq!(read_word_indirect_bug(&mut cpu, &mut bus, 0x10FF), 0x1234);
    }
}
