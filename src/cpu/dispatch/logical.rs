/*!
logical.rs - AND/ORA/EOR/BIT and the immediate-only unofficial logic ops.

```text
ANC  A &= imm, C = N
ALR  A &= imm, then LSR A
ARR  A = ((A & imm) >> 1) | C << 7, C = bit 6, V = bit 6 ^ bit 5
XAA  A = (A | $EE) & X & imm
LXA  A = X = imm
```
*/

use crate::cpu::addressing::Operand;
use crate::cpu::execute::{and, bit, eor, lda, lsr, ora};
use crate::cpu::state::{CARRY, CpuState, NEGATIVE, OVERFLOW};
use crate::cpu::table::Op;
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    if !matches!(
        op,
        Op::AND | Op::ORA | Op::EOR | Op::BIT | Op::ANC | Op::ALR | Op::ARR | Op::XAA | Op::LXA
    ) {
        return false;
    }
    let v = cpu.read(bus, operand.addr);
    match op {
        Op::AND => and(cpu, v),
        Op::ORA => ora(cpu, v),
        Op::EOR => eor(cpu, v),
        Op::BIT => bit(cpu, v),
        Op::ANC => {
            and(cpu, v);
            cpu.assign_flag(CARRY, cpu.is_flag_set(NEGATIVE));
        }
        Op::ALR => {
            and(cpu, v);
            let a = cpu.a;
            cpu.a = lsr(cpu, a);
        }
        Op::ARR => {
            let carry_in = (cpu.is_flag_set(CARRY) as u8) << 7;
            let r = ((cpu.a & v) >> 1) | carry_in;
            lda(cpu, r);
            cpu.assign_flag(CARRY, r & 0x40 != 0);
            cpu.assign_flag(OVERFLOW, ((r >> 6) ^ (r >> 5)) & 1 != 0);
        }
        Op::XAA => {
            let r = (cpu.a | 0xEE) & cpu.x & v;
            lda(cpu, r);
        }
        _ => {
            cpu.x = v;
            lda(cpu, v);
        }
    }
    true
}
