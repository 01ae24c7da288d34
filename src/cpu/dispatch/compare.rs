//! CMP, CPX and CPY: subtract without storing; C means register >= operand.

use crate::cpu::addressing::Operand;
use crate::cpu::execute::compare;
use crate::cpu::state::CpuState;
use crate::cpu::table::Op;
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    let reg = match op {
        Op::CMP => cpu.a,
        Op::CPX => cpu.x,
        Op::CPY => cpu.y,
        _ => return false,
    };
    let v = cpu.read(bus, operand.addr);
    compare(cpu, reg, v);
    true
}
