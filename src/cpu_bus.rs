/*!
cpu_bus: the CPU's view of the system.

Timing contract:
- Every `read`/`write` is exactly one CPU cycle. The implementor advances the
  PPU, APU and mapper for that cycle inside the call, and may insert DMA halt
  cycles in front of a read (so one `read` can cost several cycles).
- `cycle_count` is the running total of CPU cycles including DMA stalls; the
  CPU reports instruction cost as the difference across a step.

Interrupt lines are levels sampled by the CPU at the end of every cycle:
- `nmi_line`: PPU /NMI output (vblank AND NMI enable). The CPU edge-detects it.
- `irq_line`: wired-OR of APU frame/DMC IRQ and the cartridge IRQ.
*/

/// Memory and interrupt interface the 6502 core runs against.
pub trait CpuBus {
    fn read(&mut self, addr: u16) -> u8;

    fn write(&mut self, addr: u16, value: u8);

    fn nmi_line(&self) -> bool;

    fn irq_line(&self) -> bool;

    fn cycle_count(&self) -> u64;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::CpuBus;

    /// Flat 64 KiB of RAM, one cycle per access, interrupt lines driven by the test.
    pub struct FlatBus {
        pub mem: Vec<u8>,
        pub nmi: bool,
        pub irq: bool,
        /// Raise the IRQ line once `cycles` reaches this count.
        pub irq_from: Option<u64>,
        pub cycles: u64,
        /// (address, value, is_write) for every access, in order.
        pub log: Vec<(u16, u8, bool)>,
    }

    impl FlatBus {
        /// Load `program` at `origin` and point the reset vector at it.
        pub fn with_program(origin: u16, program: &[u8]) -> Self {
            let mut mem = vec![0u8; 0x10000];
            mem[origin as usize..origin as usize + program.len()].copy_from_slice(program);
            mem[0xFFFC] = origin as u8;
            mem[0xFFFD] = (origin >> 8) as u8;
            Self {
                mem,
                nmi: false,
                irq: false,
                irq_from: None,
                cycles: 0,
                log: Vec::new(),
            }
        }

        pub fn set_vector(&mut self, vector: u16, target: u16) {
            self.mem[vector as usize] = target as u8;
            self.mem[vector as usize + 1] = (target >> 8) as u8;
        }
    }

    impl CpuBus for FlatBus {
        fn read(&mut self, addr: u16) -> u8 {
            self.cycles += 1;
            let v = self.mem[addr as usize];
            self.log.push((addr, v, false));
            v
        }

        fn write(&mut self, addr: u16, value: u8) {
            self.cycles += 1;
            self.mem[addr as usize] = value;
            self.log.push((addr, value, true));
        }

        fn nmi_line(&self) -> bool {
            self.nmi
        }

        fn irq_line(&self) -> bool {
            self.irq || self.irq_from.is_some_and(|at| self.cycles >= at)
        }

        fn cycle_count(&self) -> u64 {
            self.cycles
        }
    }

    #[test]
    fn flat_bus_counts_each_access() {
        let mut bus = FlatBus::with_program(0x8000, &[0xEA]);
        assert_eq!(bus.read(0xFFFC), 0x00);
        bus.write(0x0200, 7);
        assert_eq!(bus.cycle_count(), 2);
        assert_eq!(bus.log.last(), Some(&(0x0200, 7, true)));
    }
}
