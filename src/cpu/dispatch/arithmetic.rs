/*!
arithmetic.rs - ADC, SBC (both encodings) and AXS.

AXS (a.k.a. SBX) computes X = (A AND X) - operand without borrow in, setting
C like a compare and Z/N from the result.
*/

use crate::cpu::addressing::Operand;
use crate::cpu::execute::{adc, sbc};
use crate::cpu::state::{CARRY, CpuState};
use crate::cpu::table::Op;
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    match op {
        Op::ADC => {
            let v = cpu.read(bus, operand.addr);
            adc(cpu, v);
        }
        Op::SBC => {
            let v = cpu.read(bus, operand.addr);
            sbc(cpu, v);
        }
        Op::AXS => {
            let v = cpu.read(bus, operand.addr);
            let masked = cpu.a & cpu.x;
            cpu.assign_flag(CARRY, masked >= v);
            cpu.x = masked.wrapping_sub(v);
            cpu.update_zn(cpu.x);
        }
        _ => return false,
    }
    true
}
