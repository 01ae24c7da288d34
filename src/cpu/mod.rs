/*!
cpu::mod - Public façade for the 2A03's 6502 core.

Layout:

```text
state.rs        - Registers, flags, interrupt latches, per-cycle bus primitives.
table.rs        - 256-entry opcode metadata (op, mode, base cycles) + disassembly.
addressing.rs   - Effective-address resolution, including dummy accesses.
execute.rs      - ALU / stack / read-modify-write semantic helpers.
dispatch/       - One-instruction step and the per-family opcode handlers.
core/           - `Cpu` façade: power, reset, step, save state.
```

The core runs against the `CpuBus` trait, so unit tests drive it with a flat
64 KiB bus while the machine plugs in the real system bus.

Usage:
```ignore
use famicore::cpu::Cpu;

let mut cpu = Cpu::new();
cpu.power(&mut bus);
let cycles = cpu.step(&mut bus);
```
*/

pub mod addressing;
pub mod core;
pub mod dispatch;
pub mod execute;
pub mod state;
pub mod table;

pub use crate::cpu::core::{Cpu, CpuRegisters};
pub use crate::cpu::state::{
    BREAK, CARRY, CpuState, DECIMAL, IRQ_DISABLE, NEGATIVE, OVERFLOW, UNUSED, ZERO,
};
pub use crate::cpu::table::disassemble;
