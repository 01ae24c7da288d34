#![doc = r#"
PPU background fetch

Responsibilities
- The 8-dot fetch cadence of the background pipeline: nametable byte,
  attribute byte, pattern low plane, pattern high plane, then reload.
- The two-tile pixel shifter (`bg_tiles`) and the per-dot background pixel.

Integration
- `fetch_background_step` runs on dots 1..=256 and 321..=336 of render lines;
  `renderer.rs` decides when.
- Every fetch is a real `PpuBus::read`, so mappers watching the PPU address
  bus see the same traffic as hardware.

Layout of `bg_tiles`
- 16 pixels, 4 bits each (`attribute << 2 | pattern`). The upper 32 bits hold
  the tile currently being drawn; fine X picks the pixel within it.
"#]

use super::{Ppu, PpuCtrl};
use crate::ppu_bus::PpuBus;

impl Ppu {
    /// One dot of background fetching. The shifter advances one pixel per dot.
    pub(in crate::ppu) fn fetch_background_step<B: PpuBus>(&mut self, bus: &mut B) {
        self.bg_tiles <<= 4;
        match self.dot % 8 {
            1 => self.fetch_nametable_byte(bus),
            3 => self.fetch_attribute_byte(bus),
            5 => self.pattern_lo = bus.read(self.bg_pattern_addr()),
            7 => self.pattern_hi = bus.read(self.bg_pattern_addr() + 8),
            0 => {
                self.reload_background();
                self.increment_x();
            }
            _ => {}
        }
    }

    pub(in crate::ppu) fn fetch_nametable_byte<B: PpuBus>(&mut self, bus: &mut B) {
        self.nt_latch = bus.read(0x2000 | (self.v & 0x0FFF));
    }

    fn fetch_attribute_byte<B: PpuBus>(&mut self, bus: &mut B) {
        let v = self.v;
        let addr = 0x23C0 | (v & 0x0C00) | ((v >> 4) & 0x38) | ((v >> 2) & 0x07);
        let shift = ((v >> 4) & 0x04) | (v & 0x02);
        self.at_latch = ((bus.read(addr) >> shift) & 0x03) << 2;
    }

    fn bg_pattern_addr(&self) -> u16 {
        let table = if self.ctrl.contains(PpuCtrl::BG_TABLE) { 0x1000 } else { 0 };
        let fine_y = (self.v >> 12) & 0x07;
        table + (self.nt_latch as u16) * 16 + fine_y
    }

    fn reload_background(&mut self) {
        let mut lo = self.pattern_lo;
        let mut hi = self.pattern_hi;
        let mut data: u32 = 0;
        for _ in 0..8 {
            let p = ((lo & 0x80) >> 7) | ((hi & 0x80) >> 6);
            lo <<= 1;
            hi <<= 1;
            data = (data << 4) | (self.at_latch | p) as u32;
        }
        self.bg_tiles |= data as u64;
    }

    /// Background pixel (`attribute << 2 | pattern`) for the current dot.
    #[inline]
    pub(in crate::ppu) fn background_pixel(&self) -> u8 {
        let tile = (self.bg_tiles >> 32) as u32;
        ((tile >> ((7 - self.x as u32) * 4)) & 0x0F) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;
    use crate::ppu_bus::tests::MockPpuBus;

    #[test]
    fn attribute_quadrant_selection() {
        let mut bus = MockPpuBus::new();
        // Attribute byte for the top-left 32x32 area: quadrants 0..3 = 1, 2, 3, 0.
        bus.write(0x23C0, 0b00_11_10_01);
        let mut ppu = Ppu::new(Region::Ntsc);
        for (v, expected) in [(0x0000u16, 1u8), (0x0002, 2), (0x0040, 3), (0x0042, 0)] {
            ppu.v = v;
            ppu.fetch_attribute_byte(&mut bus);
            assert_eq!(ppu.at_latch, expected << 2, "v={v:#06x}");
        }
    }

    #[test]
    fn eight_dots_load_one_tile() {
        let mut bus = MockPpuBus::new();
        bus.write(0x2000, 0x01);
        bus.write(0x0010, 0b1000_0001);
        bus.write(0x0018, 0b1000_0000);
        let mut ppu = Ppu::new(Region::Ntsc);
        for dot in 1..=16 {
            ppu.dot = dot;
            ppu.fetch_background_step(&mut bus);
        }
        // After two tiles the first sits in the upper half of the shifter.
        assert_eq!(ppu.background_pixel(), 0b11);
        ppu.x = 7;
        assert_eq!(ppu.background_pixel(), 0b01);
        assert_eq!(ppu.v & 0x1F, 2, "coarse X advanced once per tile");
    }
}
