/*!
rmw.rs - Shifts, rotates, INC/DEC and the unofficial combined RMW opcodes.

Memory forms run through `execute::rmw_memory` (read, write back the old
value, write the result). The accumulator forms (`ASL A` etc.) operate on A
after the implied dummy read and touch no other bus cycle.

Unofficial combinations apply the RMW step, then an ALU op with the result:
    SLO = ASL + ORA     RLA = ROL + AND     SRE = LSR + EOR
    RRA = ROR + ADC     DCP = DEC + CMP     ISC = INC + SBC
*/

use crate::cpu::addressing::Operand;
use crate::cpu::execute::{adc, and, asl, compare, eor, lsr, ora, rmw_memory, rol, ror, sbc};
use crate::cpu::state::CpuState;
use crate::cpu::table::{Mode, Op};
use crate::cpu_bus::CpuBus;

type Transform = fn(&mut CpuState, u8) -> u8;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    let transform: Transform = match op {
        Op::ASL => asl,
        Op::LSR => lsr,
        Op::ROL => rol,
        Op::ROR => ror,
        Op::INC => inc,
        Op::DEC => dec,
        Op::SLO => |c, v| {
            let r = asl(c, v);
            ora(c, r);
            r
        },
        Op::RLA => |c, v| {
            let r = rol(c, v);
            and(c, r);
            r
        },
        Op::SRE => |c, v| {
            let r = lsr(c, v);
            eor(c, r);
            r
        },
        Op::RRA => |c, v| {
            let r = ror(c, v);
            adc(c, r);
            r
        },
        Op::DCP => |c, v| {
            let r = v.wrapping_sub(1);
            let a = c.a;
            compare(c, a, r);
            r
        },
        Op::ISC => |c, v| {
            let r = v.wrapping_add(1);
            sbc(c, r);
            r
        },
        _ => return false,
    };

    if operand.mode == Mode::Acc {
        let a = cpu.a;
        cpu.a = transform(cpu, a);
    } else {
        rmw_memory(cpu, bus, operand.addr, transform);
    }
    true
}

fn inc(cpu: &mut CpuState, v: u8) -> u8 {
    let r = v.wrapping_add(1);
    cpu.update_zn(r);
    r
}

fn dec(cpu: &mut CpuState, v: u8) -> u8 {
    let r = v.wrapping_sub(1);
    cpu.update_zn(r);
    r
}
