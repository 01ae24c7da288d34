/*!
execute.rs - 6502 instruction semantics shared by the dispatch families.

Scope
=====
Register/ALU helpers touch only `CpuState`:
    lda/ldx/ldy, and/ora/eor/bit, adc/sbc, compare
    asl/lsr/rol/ror on a value (accumulator or memory operand)

Bus-touching helpers go through the cycle primitives on `CpuState`:
    rmw_memory   read, dummy write of the unmodified value, final write
    php/plp/pha/pla

Decimal mode is not wired on the 2A03, so ADC/SBC are binary only.
*/

use crate::cpu::state::{CARRY, CpuState, NEGATIVE, OVERFLOW, ZERO};
use crate::cpu_bus::CpuBus;

#[inline]
pub(crate) fn lda(cpu: &mut CpuState, v: u8) {
    cpu.a = v;
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn ldx(cpu: &mut CpuState, v: u8) {
    cpu.x = v;
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn ldy(cpu: &mut CpuState, v: u8) {
    cpu.y = v;
    cpu.update_zn(v);
}

#[inline]
pub(crate) fn and(cpu: &mut CpuState, v: u8) {
    let a = cpu.a;
    lda(cpu, a & v);
}

#[inline]
pub(crate) fn ora(cpu: &mut CpuState, v: u8) {
    let a = cpu.a;
    lda(cpu, a | v);
}

#[inline]
pub(crate) fn eor(cpu: &mut CpuState, v: u8) {
    let a = cpu.a;
    lda(cpu, a ^ v);
}

pub(crate) fn bit(cpu: &mut CpuState, v: u8) {
    cpu.assign_flag(ZERO, cpu.a & v == 0);
    cpu.assign_flag(OVERFLOW, v & 0x40 != 0);
    cpu.assign_flag(NEGATIVE, v & 0x80 != 0);
}

pub(crate) fn adc(cpu: &mut CpuState, v: u8) {
    let a = cpu.a;
    let sum = a as u16 + v as u16 + cpu.is_flag_set(CARRY) as u16;
    let result = sum as u8;
    cpu.assign_flag(CARRY, sum > 0xFF);
    cpu.assign_flag(OVERFLOW, (!(a ^ v) & (a ^ result) & 0x80) != 0);
    lda(cpu, result);
}

#[inline]
pub(crate) fn sbc(cpu: &mut CpuState, v: u8) {
    adc(cpu, !v);
}

pub(crate) fn compare(cpu: &mut CpuState, reg: u8, v: u8) {
    let diff = reg.wrapping_sub(v);
    cpu.assign_flag(CARRY, reg >= v);
    cpu.update_zn(diff);
}

pub(crate) fn asl(cpu: &mut CpuState, v: u8) -> u8 {
    cpu.assign_flag(CARRY, v & 0x80 != 0);
    let r = v << 1;
    cpu.update_zn(r);
    r
}

pub(crate) fn lsr(cpu: &mut CpuState, v: u8) -> u8 {
    cpu.assign_flag(CARRY, v & 0x01 != 0);
    let r = v >> 1;
    cpu.update_zn(r);
    r
}

pub(crate) fn rol(cpu: &mut CpuState, v: u8) -> u8 {
    let carry_in = cpu.is_flag_set(CARRY) as u8;
    cpu.assign_flag(CARRY, v & 0x80 != 0);
    let r = (v << 1) | carry_in;
    cpu.update_zn(r);
    r
}

pub(crate) fn ror(cpu: &mut CpuState, v: u8) -> u8 {
    let carry_in = (cpu.is_flag_set(CARRY) as u8) << 7;
    cpu.assign_flag(CARRY, v & 0x01 != 0);
    let r = (v >> 1) | carry_in;
    cpu.update_zn(r);
    r
}

/// Read-modify-write choreography: the 6502 writes the unmodified value back
/// before the result, and devices see both writes.
pub(crate) fn rmw_memory<B, F>(cpu: &mut CpuState, bus: &mut B, addr: u16, transform: F) -> u8
where
    B: CpuBus,
    F: FnOnce(&mut CpuState, u8) -> u8,
{
    let old = cpu.read(bus, addr);
    cpu.write(bus, addr, old);
    let new = transform(cpu, old);
    cpu.write(bus, addr, new);
    new
}

pub(crate) fn php<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    let p = cpu.compose_status_for_push(true);
    cpu.push_u8(bus, p);
}

pub(crate) fn plp<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    cpu.stack_dummy_read(bus);
    let p = cpu.pop_u8(bus);
    cpu.restore_status(p);
}

pub(crate) fn pha<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    cpu.push_u8(bus, cpu.a);
}

pub(crate) fn pla<B: CpuBus>(cpu: &mut CpuState, bus: &mut B) {
    cpu.stack_dummy_read(bus);
    let v = cpu.pop_u8(bus);
    lda(cpu, v);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu_bus::tests::FlatBus;

    #[test]
    fn adc_overflow_and_carry() {
        let mut cpu = CpuState::new();
        cpu.a = 0x50;
        adc(&mut cpu, 0x50);
        assert_eq!(cpu.a, 0xA0);
        assert!(cpu.is_flag_set(OVERFLOW));
        assert!(!cpu.is_flag_set(CARRY));

        cpu.a = 0xFF;
        adc(&mut cpu, 0x01);
        assert_eq!(cpu.a, 0x00);
        assert!(cpu.is_flag_set(CARRY));
        assert!(cpu.is_flag_set(ZERO));
        assert!(!cpu.is_flag_set(OVERFLOW));
    }

    #[test]
    fn sbc_basic() {
        let mut cpu = CpuState::new();
        cpu.assign_flag(CARRY, true);
        cpu.a = 0x10;
        sbc(&mut cpu, 0x01);
        assert_eq!(cpu.a, 0x0F);
        assert!(cpu.is_flag_set(CARRY), "no borrow");
        sbc(&mut cpu, 0x10);
        assert_eq!(cpu.a, 0xFF);
        assert!(!cpu.is_flag_set(CARRY));
    }

    #[test]
    fn rotates_pass_through_carry() {
        let mut cpu = CpuState::new();
        cpu.assign_flag(CARRY, true);
        assert_eq!(ror(&mut cpu, 0x02), 0x81);
        assert!(!cpu.is_flag_set(CARRY));
        assert_eq!(rol(&mut cpu, 0x80), 0x00);
        assert!(cpu.is_flag_set(CARRY));
        assert!(cpu.is_flag_set(ZERO));
    }

    #[test]
    fn rmw_writes_old_value_then_new() {
        let mut bus = FlatBus::with_program(0x8000, &[]);
        bus.mem[0x0010] = 0x41;
        let mut cpu = CpuState::new();
        let r = rmw_memory(&mut cpu, &mut bus, 0x0010, |c, v| asl(c, v));
        assert_eq!(r, 0x82);
        let writes: Vec<_> = bus.log.iter().filter(|e| e.2).map(|e| e.1).collect();
        assert_eq!(writes, [0x41, 0x82]);
    }

    #[test]
    fn compare_sets_carry_when_greater_or_equal() {
        let mut cpu = CpuState::new();
        compare(&mut cpu, 0x40, 0x40);
        assert!(cpu.is_flag_set(CARRY) && cpu.is_flag_set(ZERO));
        compare(&mut cpu, 0x10, 0x20);
        assert!(!cpu.is_flag_set(CARRY));
        assert!(cpu.is_flag_set(NEGATIVE));
    }
}
