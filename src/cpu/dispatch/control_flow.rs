/*!
control_flow.rs - JMP, JSR, RTS, RTI, BRK and the hardware interrupt entry.

Bus traffic
===========
```text
JSR   fetch target, dummy stack read, push PC-1 (high, low)
RTS   dummy read, dummy stack read, pull PC, dummy read of PC, PC += 1
RTI   dummy read, dummy stack read, pull P, pull PC
BRK   padding byte read, push PC, push P|B, set I, read vector
IRQ/NMI (`interrupt`)
      two dummy reads of PC, push PC, push P (B clear), set I, read vector
```

NMI hijacking
=============
BRK and IRQ sequences decide their vector after pushing PC. If an NMI edge
is pending at that point, the sequence fetches the NMI vector instead and
the NMI is consumed.
*/

use crate::cpu::addressing::{Operand, read_word_indirect_bug};
use crate::cpu::state::{CpuState, IRQ_DISABLE, IRQ_VECTOR, NMI_VECTOR};
use crate::cpu::table::{Mode, Op};
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    match op {
        Op::JMP => {
            cpu.pc = if operand.mode == Mode::Ind {
                read_word_indirect_bug(cpu, bus, operand.addr)
            } else {
                operand.addr
            };
        }
        Op::JSR => {
            cpu.stack_dummy_read(bus);
            let ret = cpu.pc.wrapping_sub(1);
            cpu.push_u16(bus, ret);
            cpu.pc = operand.addr;
        }
        Op::RTS => {
            cpu.stack_dummy_read(bus);
            let ret = cpu.pop_u16(bus);
            cpu.dummy_read(bus, ret);
            cpu.pc = ret.wrapping_add(1);
        }
        Op::RTI => {
            cpu.stack_dummy_read(bus);
            let p = cpu.pop_u8(bus);
            cpu.restore_status(p);
            cpu.pc = cpu.pop_u16(bus);
        }
        Op::BRK => brk(cpu, bus),
        _ => return false,
    }
    true
}

fn brk<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    // The padding byte was read as the implied-mode dummy cycle.
    cpu.pc = cpu.pc.wrapping_add(1);
    let ret = cpu.pc;
    cpu.push_u16(bus, ret);
    let p = cpu.compose_status_for_push(true);
    let vector = take_vector(cpu, IRQ_VECTOR);
    cpu.push_u8(bus, p);
    cpu.assign_flag(IRQ_DISABLE, true);
    cpu.pc = cpu.read_u16(bus, vector);
    // An NMI that arrives during BRK's last cycles waits for the next
    // instruction boundary.
    cpu.prev_need_nmi = false;
}

/// Hardware IRQ/NMI sequence, run between instructions.
pub(crate) fn interrupt<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    cpu.dummy_read(bus, cpu.pc);
    cpu.dummy_read(bus, cpu.pc);
    let ret = cpu.pc;
    cpu.push_u16(bus, ret);
    let p = cpu.compose_status_for_push(false);
    let vector = take_vector(cpu, IRQ_VECTOR);
    cpu.push_u8(bus, p);
    cpu.assign_flag(IRQ_DISABLE, true);
    cpu.pc = cpu.read_u16(bus, vector);
}

fn take_vector(cpu: &mut CpuState, fallback: u16) -> u16 {
    if cpu.need_nmi {
        cpu.need_nmi = false;
        NMI_VECTOR
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use crate::cpu::dispatch::tests::{run_one, setup};
    use crate::cpu::state::{BREAK, CARRY, IRQ_DISABLE, IRQ_VECTOR, NMI_VECTOR};

    #[test]
    fn jsr_rts_round_trip() {
        // $8000 JSR $8010 ; $8003 ... ; $8010 RTS
        let mut program = vec![0x20, 0x10, 0x80];
        program.resize(0x10, 0xEA);
        program.push(0x60);
        let (mut cpu, mut bus) = setup(&program);
        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.pc, 0x8010);
        assert_eq!(bus.mem[0x01FD], 0x80);
        assert_eq!(bus.mem[0x01FC], 0x02);
        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.pc, 0x8003);
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn brk_pushes_pc_plus_two_and_break_flag() {
        let (mut cpu, mut bus) = setup(&[0x00, 0xFF]);
        bus.set_vector(IRQ_VECTOR, 0x9000);
        assert_eq!(run_one(&mut cpu, &mut bus), 7);
        assert_eq!(cpu.pc, 0x9000);
        assert_eq!(bus.mem[0x01FC], 0x02);
        assert_ne!(bus.mem[0x01FB] & BREAK, 0);
        assert!(cpu.is_flag_set(IRQ_DISABLE));
    }

    #[test]
    fn nmi_hijacks_brk() {
        let (mut cpu, mut bus) = setup(&[0x00, 0x00]);
        bus.set_vector(IRQ_VECTOR, 0x9000);
        bus.set_vector(NMI_VECTOR, 0xA000);
        // Edge arrives during the opcode fetch.
        bus.nmi = true;
        assert_eq!(run_one(&mut cpu, &mut bus), 7);
        assert_eq!(cpu.pc, 0xA000);
        assert!(!cpu.need_nmi, "the NMI was consumed by the hijack");
        assert_ne!(bus.mem[0x01FB] & BREAK, 0, "pushed P still has B set");
    }

    #[test]
    fn rti_restores_status_and_pc() {
        let (mut cpu, mut bus) = setup(&[0x40]);
        cpu.sp = 0xFA;
        bus.mem[0x01FB] = CARRY | BREAK;
        bus.mem[0x01FC] = 0x34;
        bus.mem[0x01FD] = 0x12;
        assert_eq!(run_one(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.pc, 0x1234);
        assert!(cpu.is_flag_set(CARRY));
        assert!(!cpu.is_flag_set(BREAK));
    }

    #[test]
    fn jmp_indirect_uses_page_wrap() {
        let (mut cpu, mut bus) = setup(&[0x6C, 0xFF, 0x02]);
        bus.mem[0x02FF] = 0x00;
        bus.mem[0x0200] = 0x90;
        bus.mem[0x0300] = 0xAA;
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.pc, 0x9000);
    }
}
