/*!
branches.rs - Conditional relative branches.

Cycle Rules
===========
```text
not taken            2 cycles (opcode + displacement)
taken                +1 (dummy read of the next opcode)
taken, page cross    +1 more (dummy read with the un-carried high byte)
```

IRQ delay
=========
A taken branch that does not cross a page polls interrupts one cycle early:
an IRQ that became pending during the branch's last cycles is serviced one
instruction later. This is done by dropping a freshly raised `run_irq`
before the extra cycle, so it is only seen again on the next poll.
*/

use crate::cpu::addressing::{Operand, page_crossed};
use crate::cpu::state::{CARRY, CpuState, NEGATIVE, OVERFLOW, ZERO};
use crate::cpu::table::Op;
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    let taken = match op {
        Op::BPL => !cpu.is_flag_set(NEGATIVE),
        Op::BMI => cpu.is_flag_set(NEGATIVE),
        Op::BVC => !cpu.is_flag_set(OVERFLOW),
        Op::BVS => cpu.is_flag_set(OVERFLOW),
        Op::BCC => !cpu.is_flag_set(CARRY),
        Op::BCS => cpu.is_flag_set(CARRY),
        Op::BNE => !cpu.is_flag_set(ZERO),
        Op::BEQ => cpu.is_flag_set(ZERO),
        _ => return false,
    };
    let offset = cpu.read(bus, operand.addr) as i8;
    if !taken {
        return true;
    }

    if cpu.run_irq && !cpu.prev_run_irq {
        cpu.run_irq = false;
    }
    cpu.dummy_read(bus, cpu.pc);

    let target = cpu.pc.wrapping_add(offset as u16);
    if page_crossed(cpu.pc, target) {
        cpu.dummy_read(bus, (cpu.pc & 0xFF00) | (target & 0x00FF));
    }
    cpu.pc = target;
    true
}

#[cfg(test)]
mod tests {
    use crate::cpu::dispatch::tests::{run_one, setup};
    use crate::cpu::state::{IRQ_VECTOR, ZERO};

    #[test]
    fn taken_branch_costs() {
        // BNE +2
        let (mut cpu, mut bus) = setup(&[0xD0, 0x02]);
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.pc, 0x8004);

        // BEQ not taken
        let (mut cpu, mut bus) = setup(&[0xF0, 0x02]);
        assert_eq!(run_one(&mut cpu, &mut bus), 2);
        assert_eq!(cpu.pc, 0x8002);
    }

    #[test]
    fn backwards_branch_across_page() {
        // BNE -4 from $8002 lands at $7FFE.
        let (mut cpu, mut bus) = setup(&[0xD0, 0xFC]);
        assert_eq!(run_one(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.pc, 0x7FFE);
        assert_eq!(bus.log.last().map(|e| e.0), Some(0x80FE));
    }

    #[test]
    fn taken_branch_delays_an_irq_raised_on_its_operand_cycle() {
        let (mut cpu, mut bus) = setup(&[0xF0, 0x00, 0xEA, 0xEA]);
        cpu.status |= ZERO;
        bus.set_vector(IRQ_VECTOR, 0x9000);
        bus.irq_from = Some(2);
        assert_eq!(run_one(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.pc, 0x8002, "no interrupt right after the branch");
        assert_eq!(run_one(&mut cpu, &mut bus), 2 + 7);
        assert_eq!(cpu.pc, 0x9000);
    }

    #[test]
    fn irq_raised_before_the_branch_is_not_delayed() {
        let (mut cpu, mut bus) = setup(&[0xF0, 0x00, 0xEA]);
        cpu.status |= ZERO;
        bus.set_vector(IRQ_VECTOR, 0x9000);
        bus.irq_from = Some(1);
        assert_eq!(run_one(&mut cpu, &mut bus), 3 + 7);
        assert_eq!(cpu.pc, 0x9000);
    }
}
