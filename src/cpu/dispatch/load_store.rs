/*!
load_store.rs - Register loads and stores, including the unofficial ones.

Handled
=======
```text
LDA LDX LDY LAX LAS     read the operand, set Z/N
STA STX STY SAX         plain stores (SAX stores A AND X)
SHA SHX SHY TAS         "unstable" stores
```

Unstable stores
===============
SHA/SHX/SHY/TAS store `reg AND (H + 1)` where H is the high byte of the base
address before indexing. When indexing crosses a page, the high byte of the
target address is replaced by the stored value. TAS also sets SP = A AND X.
*/

use crate::cpu::addressing::{Operand, page_crossed};
use crate::cpu::execute::{lda, ldx, ldy};
use crate::cpu::state::CpuState;
use crate::cpu::table::Op;
use crate::cpu_bus::CpuBus;

pub(crate) fn handle<B: CpuBus>(op: Op, operand: Operand, cpu: &mut CpuState, bus: &mut B) -> bool {
    let addr = operand.addr;
    match op {
        Op::LDA => {
            let v = cpu.read(bus, addr);
            lda(cpu, v);
        }
        Op::LDX => {
            let v = cpu.read(bus, addr);
            ldx(cpu, v);
        }
        Op::LDY => {
            let v = cpu.read(bus, addr);
            ldy(cpu, v);
        }
        Op::LAX => {
            let v = cpu.read(bus, addr);
            cpu.x = v;
            lda(cpu, v);
        }
        Op::LAS => {
            let v = cpu.read(bus, addr) & cpu.sp;
            cpu.sp = v;
            cpu.x = v;
            lda(cpu, v);
        }
        Op::STA => cpu.write(bus, addr, cpu.a),
        Op::STX => cpu.write(bus, addr, cpu.x),
        Op::STY => cpu.write(bus, addr, cpu.y),
        Op::SAX => cpu.write(bus, addr, cpu.a & cpu.x),
        Op::SHA => {
            let (value, index) = (cpu.a & cpu.x, cpu.y);
            unstable_store(cpu, bus, addr, value, index);
        }
        Op::SHX => {
            let (value, index) = (cpu.x, cpu.y);
            unstable_store(cpu, bus, addr, value, index);
        }
        Op::SHY => {
            let (value, index) = (cpu.y, cpu.x);
            unstable_store(cpu, bus, addr, value, index);
        }
        Op::TAS => {
            cpu.sp = cpu.a & cpu.x;
            let (value, index) = (cpu.sp, cpu.y);
            unstable_store(cpu, bus, addr, value, index);
        }
        _ => return false,
    }
    true
}

fn unstable_store<B: CpuBus>(cpu: &mut CpuState, bus: &mut B, addr: u16, value: u8, index: u8) {
    let base = addr.wrapping_sub(index as u16);
    let high = (base >> 8) as u8;
    let stored = value & high.wrapping_add(1);
    let target = if page_crossed(base, addr) {
        ((stored as u16) << 8) | (addr & 0x00FF)
    } else {
        addr
    };
    cpu.write(bus, target, stored);
}

#[cfg(test)]
mod tests {
    use crate::cpu::dispatch::tests::{run_one, setup};
    use crate::cpu::state::{NEGATIVE, ZERO};

    #[test]
    fn lda_immediate_sets_flags() {
        let (mut cpu, mut bus) = setup(&[0xA9, 0x80, 0xA9, 0x00]);
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.a, 0x80);
        assert!(cpu.is_flag_set(NEGATIVE));
        run_one(&mut cpu, &mut bus);
        assert!(cpu.is_flag_set(ZERO));
    }

    #[test]
    fn lax_loads_both_registers() {
        let (mut cpu, mut bus) = setup(&[0xA7, 0x10]);
        bus.mem[0x10] = 0x5A;
        run_one(&mut cpu, &mut bus);
        assert_eq!((cpu.a, cpu.x), (0x5A, 0x5A));
    }

    #[test]
    fn sax_stores_a_and_x() {
        let (mut cpu, mut bus) = setup(&[0x87, 0x20]);
        cpu.a = 0xF0;
        cpu.x = 0x3C;
        run_one(&mut cpu, &mut bus);
        assert_eq!(bus.mem[0x20], 0x30);
    }

    #[test]
    fn shy_masks_with_high_byte_plus_one() {
        // SHY $0200,X with X=1, Y=$FF: value = $FF & $03
        let (mut cpu, mut bus) = setup(&[0x9C, 0x00, 0x02]);
        cpu.x = 1;
        cpu.y = 0xFF;
        run_one(&mut cpu, &mut bus);
        assert_eq!(bus.mem[0x0201], 0x03);
    }

    #[test]
    fn shx_page_cross_corrupts_target_high_byte() {
        // SHX $02FF,Y with Y=1: base high $02, value = $07 & $03 = $03,
        // crossing turns target $0300 into $0300 & $00FF | ($03 << 8).
        let (mut cpu, mut bus) = setup(&[0x9E, 0xFF, 0x02]);
        cpu.x = 0x07;
        cpu.y = 1;
        run_one(&mut cpu, &mut bus);
        assert_eq!(bus.mem[0x0300], 0x03);

        let (mut cpu, mut bus) = setup(&[0x9E, 0xFF, 0x04]);
        cpu.x = 0xFF;
        cpu.y = 1;
        run_one(&mut cpu, &mut bus);
        assert_eq!(bus.mem[0x0500], 0x05);
        assert_eq!(bus.mem[0x0400], 0x00);
    }

    #[test]
    fn tas_sets_stack_pointer() {
        let (mut cpu, mut bus) = setup(&[0x9B, 0x00, 0x02]);
        cpu.a = 0xFF;
        cpu.x = 0x0F;
        run_one(&mut cpu, &mut bus);
        assert_eq!(cpu.sp, 0x0F);
        assert_eq!(bus.mem[0x0200], 0x03);
    }
}
