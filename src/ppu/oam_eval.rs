#![doc = r#"
PPU OAM evaluation submodule

Responsibilities
- Select the sprites that intersect the next scanline and copy their four OAM
  bytes into secondary OAM.
- Compute the sprite overflow flag the way the 2C02 does, including its
  diagonal-scan bug once eight sprites have been found.

Integration
- `evaluate_sprites` runs at dot 257 of visible lines (the point where the
  hardware has finished its dots 65..=256 scan). The pre-render line selects
  nothing, so line 0 never shows sprites.
- With the sprite limit disabled all in-range sprites are kept (up to 64); the
  overflow flag still behaves as on hardware.
"#]

use super::{MAX_LINE_SPRITES, Ppu, PpuCtrl, PpuStatus};

impl Ppu {
    #[inline]
    pub(in crate::ppu) fn sprite_height(&self) -> i32 {
        if self.ctrl.contains(PpuCtrl::SPRITE_8X16) { 16 } else { 8 }
    }

    #[inline]
    fn sprite_in_range(&self, y: u8) -> bool {
        let row = self.scanline as i32 - y as i32;
        (0..self.sprite_height()).contains(&row)
    }

    pub(in crate::ppu) fn evaluate_sprites(&mut self) {
        self.secondary_count = 0;
        if self.scanline as usize >= super::NES_HEIGHT {
            return;
        }
        let limit = if self.sprite_limit { 8 } else { MAX_LINE_SPRITES };
        let mut eighth = None;
        let mut found = 0;
        for n in 0..64 {
            if !self.sprite_in_range(self.oam[n * 4]) {
                continue;
            }
            if found < limit {
                let dst = self.secondary_count * 4;
                self.secondary[dst..dst + 4].copy_from_slice(&self.oam[n * 4..n * 4 + 4]);
                self.secondary_source[self.secondary_count] = n as u8;
                self.secondary_count += 1;
            }
            found += 1;
            if found == 8 {
                eighth = Some(n);
                if self.sprite_limit {
                    break;
                }
            }
        }

        // After the 8th hit the hardware keeps comparing, but increments the
        // byte offset along with the sprite index.
        if let Some(last) = eighth {
            let mut n = last + 1;
            let mut m = 0;
            while n < 64 {
                if self.sprite_in_range(self.oam[n * 4 + m]) {
                    self.status.insert(PpuStatus::SPRITE_OVERFLOW);
                    break;
                }
                n += 1;
                m = (m + 1) & 3;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Region;

    fn ppu_with_sprites(ys: &[u8]) -> Ppu {
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.oam = [0xF0; 256];
        for (i, &y) in ys.iter().enumerate() {
            ppu.oam[i * 4] = y;
            ppu.oam[i * 4 + 3] = i as u8;
        }
        ppu
    }

    #[test]
    fn selects_in_range_sprites_in_oam_order() {
        let mut ppu = ppu_with_sprites(&[10, 50, 12, 3]);
        ppu.scanline = 12;
        ppu.evaluate_sprites();
        assert_eq!(ppu.secondary_count, 2);
        assert_eq!(ppu.secondary[3], 0);
        assert_eq!(ppu.secondary[7], 2);
        assert!(!ppu.status.contains(PpuStatus::SPRITE_OVERFLOW));
    }

    #[test]
    fn ninth_sprite_sets_overflow() {
        let mut ppu = ppu_with_sprites(&[20; 9]);
        ppu.scanline = 20;
        ppu.evaluate_sprites();
        assert_eq!(ppu.secondary_count, 8);
        assert!(ppu.status.contains(PpuStatus::SPRITE_OVERFLOW));
    }

    #[test]
    fn overflow_bug_reads_wrong_byte() {
        // Sprite 8 is out of range, so the scan moves on to sprite 9 at byte 1
        // (its tile number) and never sees sprite 9's real Y.
        let mut ppu = ppu_with_sprites(&[20; 8]);
        ppu.oam[8 * 4] = 0xF0;
        ppu.oam[9 * 4] = 20;
        ppu.oam[9 * 4 + 1] = 0xF0;
        ppu.scanline = 20;
        ppu.evaluate_sprites();
        assert!(!ppu.status.contains(PpuStatus::SPRITE_OVERFLOW));
    }

    #[test]
    fn limit_off_keeps_every_sprite() {
        let mut ppu = ppu_with_sprites(&[40; 12]);
        ppu.sprite_limit = false;
        ppu.scanline = 44;
        ppu.evaluate_sprites();
        assert_eq!(ppu.secondary_count, 12);
        assert!(ppu.status.contains(PpuStatus::SPRITE_OVERFLOW));
    }

    #[test]
    fn tall_sprites_cover_sixteen_lines() {
        let mut ppu = ppu_with_sprites(&[100]);
        ppu.ctrl.insert(PpuCtrl::SPRITE_8X16);
        ppu.scanline = 115;
        ppu.evaluate_sprites();
        assert_eq!(ppu.secondary_count, 1);
        ppu.scanline = 116;
        ppu.evaluate_sprites();
        assert_eq!(ppu.secondary_count, 0);
    }
}
