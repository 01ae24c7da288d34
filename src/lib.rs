#![doc = r#"
famicore: a cycle-stepped NES / Famicom emulator core.

The host talks to a [`Machine`]: load an image, power on, latch input, call
`execute()` once per video frame, collect pixels and samples. Everything below
is public for tools and tests that want to drive a single chip.

Modules:
- machine: the `Machine` facade, frame loop and save-state assembly
- bus: system bus, address decoding, DMA and the master clock
- cpu: 2A03 CPU core (facade + state + dispatch + execute modules)
- ppu: 2C02/2C07 picture unit rendering to a palette-index frame buffer
- apu: pulse, triangle, noise and DMC channels, frame counter, mixer
- cartridge: iNES / NES 2.0 / disk image loading; constructs a Mapper
- mapper / mappers: the board trait, shared banking helpers and the registry
- controller: pads, Four Score and Zapper on the serial ports
- state: the chunked save-state container
- battery: host storage seam for battery RAM and disk patches
- config, database, error, crc32: supporting types
- cpu_bus / ppu_bus: the traits decoupling the chips from the concrete bus

In tests, shared iNES builders are available under `crate::test_utils`.
"#]

// Core emulator modules
pub mod apu;
pub mod battery;
pub mod bus;
pub mod cartridge;
pub mod config;
pub mod controller;
pub mod cpu;
pub mod cpu_bus;
pub mod crc32;
pub mod database;
pub mod error;
pub mod machine;
pub mod mapper;
pub mod mappers;
pub mod ppu;
pub mod ppu_bus;
pub mod state;

// Re-export commonly used types at the crate root for convenience.
pub use battery::{BatteryStorage, MemoryStorage};
pub use bus::Bus;
pub use cartridge::{Cartridge, CartridgeInfo, RomFormat};
pub use config::{Config, PixelFormat, RamPowerPolicy, Region};
pub use controller::{Buttons, FrameInput, ZapperState};
pub use cpu::{Cpu, CpuRegisters};
pub use database::{Database, DatabaseEntry};
pub use error::{ExecuteError, LoadError, PatchError, StateError};
pub use machine::{Frame, Machine};
pub use mapper::{Mapper, Mirroring};
pub use mappers::MapperRegistry;

// Shared test utilities (only compiled for tests)
#[cfg(test)]
pub mod test_utils;
