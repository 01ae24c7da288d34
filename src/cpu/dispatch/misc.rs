/*!
misc.rs - Implied-mode housekeeping: transfers, stack, flags, register
increments, NOPs and JAM.

TXS is the only transfer that leaves Z/N alone. Unofficial NOPs with an
operand still perform the operand read (it can hit a register with read
side effects).
*/

use log::warn;

use crate::cpu::addressing::Operand;
use crate::cpu::execute::{lda, pha, php, pla, plp};
use crate::cpu::state::{CARRY, CpuState, DECIMAL, IRQ_DISABLE, OVERFLOW};
use crate::cpu::table::{Mode, Op};
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    match op {
        Op::TAX => {
            cpu.x = cpu.a;
            cpu.update_zn(cpu.x);
        }
        Op::TAY => {
            cpu.y = cpu.a;
            cpu.update_zn(cpu.y);
        }
        Op::TSX => {
            cpu.x = cpu.sp;
            cpu.update_zn(cpu.x);
        }
        Op::TXA => {
            let x = cpu.x;
            lda(cpu, x);
        }
        Op::TYA => {
            let y = cpu.y;
            lda(cpu, y);
        }
        Op::TXS => cpu.sp = cpu.x,

        Op::PHA => pha(cpu, bus),
        Op::PHP => php(cpu, bus),
        Op::PLA => pla(cpu, bus),
        Op::PLP => plp(cpu, bus),

        Op::CLC => cpu.assign_flag(CARRY, false),
        Op::SEC => cpu.assign_flag(CARRY, true),
        Op::CLI => cpu.assign_flag(IRQ_DISABLE, false),
        Op::SEI => cpu.assign_flag(IRQ_DISABLE, true),
        Op::CLD => cpu.assign_flag(DECIMAL, false),
        Op::SED => cpu.assign_flag(DECIMAL, true),
        Op::CLV => cpu.assign_flag(OVERFLOW, false),

        Op::INX => {
            cpu.x = cpu.x.wrapping_add(1);
            cpu.update_zn(cpu.x);
        }
        Op::INY => {
            cpu.y = cpu.y.wrapping_add(1);
            cpu.update_zn(cpu.y);
        }
        Op::DEX => {
            cpu.x = cpu.x.wrapping_sub(1);
            cpu.update_zn(cpu.x);
        }
        Op::DEY => {
            cpu.y = cpu.y.wrapping_sub(1);
            cpu.update_zn(cpu.y);
        }

        Op::NOP => {
            if operand.mode != Mode::Imp {
                cpu.dummy_read(bus, operand.addr);
            }
        }
        Op::JAM => {
            warn!("CPU jammed at {:04X}", cpu.pc.wrapping_sub(1));
            cpu.jammed = true;
        }
        _ => return false,
    }
    true
}

#[cfg(test)]
mod tests {
    use crate::cpu::dispatch::tests::{run_one, setup};
    use crate::cpu::state::{BREAK, CARRY, NEGATIVE, UNUSED, ZERO};

    #[test]
    fn txs_does_not_touch_flags() {
        let (mut cpu, mut bus) = setup(&[0x9A]);
        cpu.x = 0x00;
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.sp, 0x00);
        assert!(!cpu.is_flag_set(ZERO));
    }

    #[test]
    fn php_plp_round_trip_drops_break() {
        let (mut cpu, mut bus) = setup(&[0x08, 0x28]);
        cpu.status = UNUSED | CARRY | NEGATIVE;
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(bus.mem[0x01FD], UNUSED | CARRY | NEGATIVE | BREAK);
        cpu.status = UNUSED;
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.status, UNUSED | CARRY | NEGATIVE);
    }

    #[test]
    fn pla_sets_flags() {
        let (mut cpu, mut bus) = setup(&[0x68]);
        cpu.sp = 0xFC;
        bus.mem[0x01FD] = 0x00;
        run_one(&mut cpu, &mut bus);
        assert!(cpu.is_flag_set(ZERO));
        assert_eq!(cpu.sp, 0xFD);
    }

    #[test]
    fn dex_wraps() {
        let (mut cpu, mut bus) = setup(&[0xCA]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.x, 0xFF);
        assert!(cpu.is_flag_set(NEGATIVE));
    }

    #[test]
    fn unofficial_nop_reads_its_operand() {
        let (mut cpu, mut bus) = setup(&[0x0C, 0x02, 0x40]);
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(bus.log.last().map(|e| e.0), Some(0x4002));
        assert_eq!(cpu.pc, 0x8003);
    }
}
