/*!
dispatch - one instruction step: fetch, address, execute, interrupt check.

Flow
====
1. A jammed core only burns a read cycle; interrupts are ignored.
2. Fetch the opcode and look it up in `table::OPCODES`.
3. `addressing::resolve` runs the addressing cycles for the mode.
4. The family handlers are tried in turn; exactly one claims the op.
5. If an interrupt was pending one cycle before the instruction ended, the
   7-cycle interrupt sequence runs before the next fetch.

Families
========
```text
load_store    LDA LDX LDY STA STX STY LAX SAX LAS SHA SHX SHY TAS
arithmetic    ADC SBC AXS
logical       AND ORA EOR BIT ANC ALR ARR XAA LXA
compare       CMP CPX CPY
branches      Bxx (with the taken-branch IRQ delay)
control_flow  JMP JSR RTS RTI BRK (+ hardware interrupt entry)
rmw           ASL LSR ROL ROR INC DEC SLO RLA SRE RRA DCP ISC
misc          transfers, stack, flags, register inc/dec, NOP, JAM
```
*/

use log::{Level, log_enabled, trace};

use crate::cpu::addressing::{Operand, resolve};
use crate::cpu::state::CpuState;
use crate::cpu::table::{OPCODES, Op};
use crate::cpu_bus::CpuBus;

pub(crate) mod arithmetic;
pub(crate) mod branches;
pub(crate) mod compare;
pub(crate) mod control_flow;
pub(crate) mod load_store;
pub(crate) mod logical;
pub(crate) mod misc;
pub(crate) mod rmw;

/// Execute one instruction (plus any interrupt sequence it triggers).
pub(crate) fn step<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    if cpu.jammed {
        cpu.dummy_read(bus, cpu.pc);
        return;
    }

    let pc = cpu.pc;
    let opcode = cpu.fetch_u8(bus);
    let entry = OPCODES[opcode as usize];
    if log_enabled!(Level::Trace) {
        trace!(
            "{pc:04X}  {opcode:02X} {:?} {:<4} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            entry.op,
            format!("{:?}", entry.mode),
            cpu.a,
            cpu.x,
            cpu.y,
            cpu.status,
            cpu.sp
        );
    }

    let operand = resolve(cpu, bus, entry.mode, entry.op.access());
    execute(entry.op, operand, cpu, bus);

    if cpu.interrupt_due() {
        control_flow::interrupt(cpu, bus);
    }
}

fn execute<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) {
    let handled = load_store::handle(op, operand, cpu, bus)
        || arithmetic::handle(op, operand, cpu, bus)
        || logical::handle(op, operand, cpu, bus)
        || compare::handle(op, operand, cpu, bus)
        || branches::handle(op, operand, cpu, bus)
        || control_flow::handle(op, operand, cpu, bus)
        || rmw::handle(op, operand, cpu, bus)
        || misc::handle(op, operand, cpu, bus);
    debug_assert!(handled, "no handler for {op:?}");
}
