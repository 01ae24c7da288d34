#![doc = r#"
PPU address-space helpers: console nametable RAM and the mirroring map.

Concepts
- The console has 2 KiB of nametable RAM (CIRAM). The cartridge decides how the
  four logical 1 KiB nametables at $2000/$2400/$2800/$2C00 map onto it, and can
  change that at runtime (`Mapper::mirroring`).
- Four-screen boards add 2 KiB on the cartridge. That extra RAM is modelled here
  as the upper half of a 4 KiB `Vram`, so every arrangement indexes one buffer.
- $3000-$3EFF mirrors $2000-$2EFF. Palette RAM ($3F00+) lives inside the PPU and
  never reaches this module.
"#]

use crate::error::StateError;
use crate::mapper::Mirroring;
use crate::state::{StateReader, StateWriter, Stateful};

/// Nametable RAM: 2 KiB console CIRAM plus 2 KiB for four-screen boards.
pub const VRAM_SIZE: usize = 0x1000;

/// Physical byte index (0..VRAM_SIZE) for a nametable address under `mirroring`.
pub fn map_nametable_addr(addr: u16, mirroring: Mirroring) -> usize {
    let offset = (addr as usize) & 0x0FFF;
    let table = offset >> 10;
    let within = offset & 0x03FF;
    let physical = match mirroring {
        Mirroring::Horizontal => table >> 1,
        Mirroring::Vertical => table & 1,
        Mirroring::SingleScreenLower => 0,
        Mirroring::SingleScreenUpper => 1,
        Mirroring::FourScreen => table,
    };
    (physical << 10) | within
}

pub struct Vram {
    data: Box<[u8; VRAM_SIZE]>,
}

impl Default for Vram {
    fn default() -> Self {
        Self::new()
    }
}

impl Vram {
    pub fn new() -> Self {
        Self {
            data: Box::new([0; VRAM_SIZE]),
        }
    }

    pub fn clear(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub fn read(&self, addr: u16, mirroring: Mirroring) -> u8 {
        self.data[map_nametable_addr(addr, mirroring)]
    }

    #[inline]
    pub fn write(&mut self, addr: u16, value: u8, mirroring: Mirroring) {
        self.data[map_nametable_addr(addr, mirroring)] = value;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..]
    }
}

impl Stateful for Vram {
    fn save_state(&self, w: &mut StateWriter) {
        w.bytes(&self.data[..]);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.fill(&mut self.data[..])
    }
}
