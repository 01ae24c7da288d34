#![doc = r#"
PPU sprite pipeline

Responsibilities
- Sprite pattern fetches on dots 257..=320, one 8-dot slot per sprite:
  two garbage nametable reads, then the low and high pattern planes.
- Empty slots fetch tile $FF so the PPU address bus shows the same pattern
  traffic as hardware (MMC3's A12 counter depends on it).
- Sprites beyond eight (sprite limit disabled) are fetched together at dot 320.
- Per-dot sprite pixel lookup for the multiplexer in `renderer.rs`.

Pattern layout
- Each prepared sprite is eight 4-bit pixels (`palette << 2 | pattern`),
  leftmost pixel in the high nibble, horizontal flip already applied.
"#]

use super::{Ppu, PpuCtrl};
use crate::ppu_bus::PpuBus;

impl Ppu {
    /// One dot of the sprite fetch window (dots 257..=320).
    pub(in crate::ppu) fn fetch_sprite_step<B: PpuBus>(&mut self, bus: &mut B) {
        let offset = self.dot - 257;
        let slot = (offset / 8) as usize;
        match offset % 8 {
            0 | 2 => {
                bus.read(0x2000 | (self.v & 0x0FFF));
            }
            4 => {
                if slot == 0 {
                    self.sprite_count = self.secondary_count.min(8);
                }
                self.fetch_sprite_slot(slot, bus);
            }
            _ => {}
        }
        if self.dot == 320 && self.secondary_count > 8 {
            for slot in 8..self.secondary_count {
                self.fetch_sprite_slot(slot, bus);
            }
            self.sprite_count = self.secondary_count;
        }
    }

    fn fetch_sprite_slot<B: PpuBus>(&mut self, slot: usize, bus: &mut B) {
        let height = self.sprite_height();
        if slot >= self.secondary_count {
            // Dummy fetch of tile $FF, row 0.
            let addr = if height == 16 {
                0x1000 | (0xFE * 16)
            } else {
                self.sprite_table() | (0xFF * 16)
            };
            bus.read(addr);
            bus.read(addr + 8);
            return;
        }
        let base = slot * 4;
        let y = self.secondary[base];
        let mut tile = self.secondary[base + 1] as u16;
        let attr = self.secondary[base + 2];
        let x = self.secondary[base + 3];

        let mut row = (self.scanline as i32 - y as i32).clamp(0, height - 1) as u16;
        if attr & 0x80 != 0 {
            row = (height as u16 - 1) - row;
        }
        let table = if height == 16 {
            let table = (tile & 1) * 0x1000;
            tile &= 0xFE;
            if row > 7 {
                tile += 1;
                row -= 8;
            }
            table
        } else {
            self.sprite_table()
        };
        let addr = table + tile * 16 + row;
        let lo = bus.read(addr);
        let hi = bus.read(addr + 8);

        self.sprite_patterns[slot] = sprite_pattern(lo, hi, attr);
        self.sprite_x[slot] = x;
        self.sprite_behind[slot] = attr & 0x20 != 0;
        self.sprite_index[slot] = self.secondary_source[slot];
    }

    fn sprite_table(&self) -> u16 {
        if self.ctrl.contains(PpuCtrl::SPRITE_TABLE) { 0x1000 } else { 0 }
    }

    /// Sprite pixel at the current dot: (slot, `palette << 2 | pattern`).
    /// Returns pattern 0 when no opaque sprite covers the dot.
    pub(in crate::ppu) fn sprite_pixel(&self) -> (usize, u8) {
        let x = self.dot as i32 - 1;
        for slot in 0..self.sprite_count {
            let offset = x - self.sprite_x[slot] as i32;
            if !(0..8).contains(&offset) {
                continue;
            }
            let color = ((self.sprite_patterns[slot] >> ((7 - offset) * 4)) & 0x0F) as u8;
            if color & 0x03 != 0 {
                return (slot, color);
            }
        }
        (0, 0)
    }
}

fn sprite_pattern(mut lo: u8, mut hi: u8, attr: u8) -> u32 {
    let palette = (attr & 0x03) << 2;
    let mut data = 0u32;
    for _ in 0..8 {
        let p = if attr & 0x40 != 0 {
            let p = (lo & 1) | ((hi & 1) << 1);
            lo >>= 1;
            hi >>= 1;
            p
        } else {
            let p = ((lo & 0x80) >> 7) | ((hi & 0x80) >> 6);
            lo <<= 1;
            hi <<= 1;
            p
        };
        data = (data << 4) | (palette | p) as u32;
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::ppu_bus::tests::MockPpuBus;

    #[test]
    fn horizontal_flip_reverses_pixels() {
        let normal = sprite_pattern(0b1000_0000, 0, 0x01);
        let flipped = sprite_pattern(0b1000_0000, 0, 0x41);
        assert_eq!(normal >> 28, 0b0101);
        assert_eq!(flipped & 0xF, 0b0101);
    }

    #[test]
    fn fetch_window_prepares_sprites_for_next_line() {
        let mut bus = MockPpuBus::new();
        bus.write(0x0053, 0xFF); // tile 5 row 3, low plane
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.oam = [0xF0; 256];
        ppu.oam[0..4].copy_from_slice(&[10, 5, 0x00, 30]);
        ppu.scanline = 13;
        ppu.evaluate_sprites();
        for dot in 257..=320 {
            ppu.dot = dot;
            ppu.fetch_sprite_step(&mut bus);
        }
        assert_eq!(ppu.sprite_count, 1);
        assert_eq!(ppu.sprite_index[0], 0);
        ppu.dot = 31;
        assert_eq!(ppu.sprite_pixel(), (0, 1));
        ppu.dot = 39;
        assert_eq!(ppu.sprite_pixel().1, 0);
    }

    #[test]
    fn vertical_flip_in_tall_mode_picks_other_tile() {
        let mut bus = MockPpuBus::new();
        // Tile pair $02/$03 in the $1000 table via odd tile number 3.
        bus.write(0x1020, 0x01); // tile 2 row 0
        bus.write(0x1037, 0x80); // tile 3 row 7
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.ctrl.insert(PpuCtrl::SPRITE_8X16);
        ppu.oam = [0xF0; 256];
        ppu.oam[0..4].copy_from_slice(&[0, 3, 0x80, 0]);
        ppu.scanline = 0;
        ppu.evaluate_sprites();
        for dot in 257..=320 {
            ppu.dot = dot;
            ppu.fetch_sprite_step(&mut bus);
        }
        // Row 0 with vertical flip is row 15: tile 3, row 7.
        assert_eq!(ppu.sprite_patterns[0] >> 28, 0b0001);
    }
}
