#![doc = r#"
PPU memory submodule

Responsibilities
- Palette RAM with its $3F10/$3F14/$3F18/$3F1C aliasing.
- OAM data port writes.
- Loopy `v` register arithmetic used by rendering and by $2007 accesses
  (coarse X / fine Y increments and the horizontal / vertical copies from `t`).

Integration
- Implemented as inherent methods on `Ppu` to keep fields private while allowing direct access.
- Pattern and nametable memory live outside the PPU and are reached through `PpuBus`.
"#]

use super::Ppu;

/// Index into the 32-byte palette RAM for a $3F00..=$3FFF address.
#[inline]
pub(crate) fn palette_index(addr: u16) -> usize {
    let idx = (addr & 0x1F) as usize;
    // Sprite backdrop entries alias the background ones.
    if idx >= 0x10 && idx & 0x03 == 0 { idx - 0x10 } else { idx }
}

impl Ppu {
    #[inline]
    pub(in crate::ppu) fn palette_read(&self, addr: u16) -> u8 {
        self.palette[palette_index(addr)]
    }

    #[inline]
    pub(in crate::ppu) fn palette_write(&mut self, addr: u16, value: u8) {
        self.palette[palette_index(addr)] = value & 0x3F;
    }

    /// $2004 write outside rendering: store and post-increment OAMADDR.
    pub(in crate::ppu) fn write_oam_data(&mut self, value: u8) {
        self.oam[self.oam_addr as usize] = value;
        self.oam_addr = self.oam_addr.wrapping_add(1);
    }

    /// Coarse X increment with horizontal nametable wrap.
    pub(in crate::ppu) fn increment_x(&mut self) {
        if self.v & 0x001F == 31 {
            self.v &= !0x001F;
            self.v ^= 0x0400;
        } else {
            self.v += 1;
        }
    }

    /// Fine Y increment, carrying into coarse Y and the vertical nametable bit.
    /// Coarse Y 29 wraps to the next nametable; 30 and 31 wrap without switching.
    pub(in crate::ppu) fn increment_y(&mut self) {
        if self.v & 0x7000 != 0x7000 {
            self.v += 0x1000;
            return;
        }
        self.v &= !0x7000;
        let mut y = (self.v & 0x03E0) >> 5;
        if y == 29 {
            y = 0;
            self.v ^= 0x0800;
        } else if y == 31 {
            y = 0;
        } else {
            y += 1;
        }
        self.v = (self.v & !0x03E0) | (y << 5);
    }

    pub(in crate::ppu) fn copy_x(&mut self) {
        self.v = (self.v & 0xFBE0) | (self.t & 0x041F);
    }

    pub(in crate::ppu) fn copy_y(&mut self) {
        self.v = (self.v & 0x841F) | (self.t & 0x7BE0);
    }
}
