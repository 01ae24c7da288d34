#![doc = r#"
PPU renderer module

Responsibilities
- Orchestrates per-dot timing and scanline/frame progression.
- Hosts `Ppu::tick`, the single entry point the bus calls once per dot.
- Multiplexes background and sprite pixels, sets sprite 0 hit, and writes the
  frame buffer.

Submodules (structure overview)
- `registers.rs` - CPU-visible register semantics ($2000-$2007)
- `memory.rs` - palette/OAM storage and loopy `v` arithmetic
- `oam_eval.rs` - sprite evaluation and the overflow flag
- `fetch.rs` - per-dot background fetch and shifters
- `sprite.rs` - sprite pattern fetch and per-dot sprite pixel
- `renderer.rs` - this module: timing orchestration and composition

Per-line schedule (render lines, rendering enabled)
- dots 1..=256: draw a pixel (visible lines), fetch background
- dot 256: increment Y; dot 257: copy horizontal bits from `t`, evaluate sprites
- dots 257..=320: sprite fetches, OAMADDR held at 0
- dots 280..=304 of the pre-render line: copy vertical bits from `t`
- dots 321..=336: prefetch the first two tiles of the next line
- dots 337 and 339: unused nametable fetches
"#]

use super::*;
use crate::ppu_bus::PpuBus;

impl Ppu {
    /// Advance one PPU dot.
    pub fn tick<B: PpuBus>(&mut self, bus: &mut B) {
        let visible = (self.scanline as usize) < NES_HEIGHT;
        let pre_render = self.scanline == self.pre_render_line;
        let dot = self.dot;

        if visible && (1..=256).contains(&dot) {
            self.render_pixel();
        }

        if self.rendering_enabled() && (visible || pre_render) {
            if (1..=256).contains(&dot) || (321..=336).contains(&dot) {
                self.fetch_background_step(bus);
            }
            if dot == 337 || dot == 339 {
                self.fetch_nametable_byte(bus);
            }
            if dot == 256 {
                self.increment_y();
            }
            if dot == 257 {
                self.copy_x();
                self.evaluate_sprites();
            }
            if (257..=320).contains(&dot) {
                self.oam_addr = 0;
                self.fetch_sprite_step(bus);
            }
            if pre_render && (280..=304).contains(&dot) {
                self.copy_y();
            }
        }

        if dot == 1 {
            if self.scanline == self.vblank_line {
                if !self.suppress_vblank {
                    self.status.insert(PpuStatus::VBLANK);
                }
                self.suppress_vblank = false;
                self.frame_complete = true;
            } else if pre_render {
                self.status
                    .remove(PpuStatus::VBLANK | PpuStatus::SPRITE_ZERO_HIT | PpuStatus::SPRITE_OVERFLOW);
            }
        }

        self.advance();
    }

    fn advance(&mut self) {
        // Odd NTSC frames drop the last dot of the pre-render line while rendering.
        if self.scanline == self.pre_render_line
            && self.dot == 339
            && self.odd_frame
            && self.odd_frame_skip
            && self.rendering_enabled()
        {
            self.dot = DOTS_PER_LINE - 1;
        }
        self.dot += 1;
        if self.dot < DOTS_PER_LINE {
            return;
        }
        self.dot = 0;
        self.scanline += 1;
        if self.scanline > self.pre_render_line {
            self.scanline = 0;
            self.frame += 1;
            self.odd_frame = !self.odd_frame;
        }
    }

    fn render_pixel(&mut self) {
        let x = (self.dot - 1) as usize;
        let y = self.scanline as usize;

        let entry = if self.rendering_enabled() {
            let left_edge = x < 8;
            let bg = if self.mask.contains(PpuMask::SHOW_BG)
                && (!left_edge || self.mask.contains(PpuMask::BG_LEFT))
            {
                self.background_pixel()
            } else {
                0
            };
            let (slot, sprite) = if self.mask.contains(PpuMask::SHOW_SPRITES)
                && (!left_edge || self.mask.contains(PpuMask::SPRITES_LEFT))
            {
                self.sprite_pixel()
            } else {
                (0, 0)
            };

            let bg_opaque = bg & 0x03 != 0;
            let sprite_opaque = sprite & 0x03 != 0;
            let color = match (bg_opaque, sprite_opaque) {
                (false, false) => 0,
                (false, true) => 0x10 | sprite,
                (true, false) => bg,
                (true, true) => {
                    if self.sprite_index[slot] == 0 && x != 255 {
                        self.status.insert(PpuStatus::SPRITE_ZERO_HIT);
                    }
                    if self.sprite_behind[slot] { bg } else { 0x10 | sprite }
                }
            };
            self.palette_read(0x3F00 | color as u16)
        } else if self.v & 0x3F00 == 0x3F00 {
            // Rendering off with `v` in palette space shows that entry.
            self.palette_read(self.v)
        } else {
            self.palette_read(0x3F00)
        };

        let entry = if self.mask.contains(PpuMask::GREYSCALE) { entry & 0x30 } else { entry & 0x3F };
        let emphasis = (self.mask.bits() >> 5) as u16;
        self.frame_buffer[y * NES_WIDTH + x] = entry as u16 | (emphasis << 6);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ppu_bus::tests::MockPpuBus;

    fn run_dots(ppu: &mut Ppu, bus: &mut MockPpuBus, dots: usize) {
        for _ in 0..dots {
            ppu.tick(bus);
        }
    }

    fn seek(ppu: &mut Ppu, bus: &mut MockPpuBus, scanline: u16, dot: u16) {
        while !(ppu.scanline == scanline && ppu.dot == dot) {
            ppu.tick(bus);
        }
    }

    #[test]
    fn vblank_sets_and_clears_on_schedule() {
        let mut bus = MockPpuBus::new();
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.cpu_write(0x2000, 0x80, &mut bus);
        seek(&mut ppu, &mut bus, 241, 1);
        assert!(!ppu.status.contains(PpuStatus::VBLANK));
        ppu.tick(&mut bus);
        assert!(ppu.status.contains(PpuStatus::VBLANK));
        assert!(ppu.nmi_output());
        assert!(ppu.take_frame_complete());
        assert!(!ppu.take_frame_complete());
        seek(&mut ppu, &mut bus, 261, 2);
        assert!(!ppu.status.contains(PpuStatus::VBLANK));
        assert!(!ppu.nmi_output());
    }

    #[test]
    fn status_read_just_before_vblank_suppresses_it() {
        let mut bus = MockPpuBus::new();
        let mut ppu = Ppu::new(Region::Ntsc);
        seek(&mut ppu, &mut bus, 241, 1);
        let v = ppu.cpu_read(0x2002, &mut bus);
        assert_eq!(v & 0x80, 0);
        ppu.tick(&mut bus);
        assert!(!ppu.status.contains(PpuStatus::VBLANK));
        assert!(ppu.take_frame_complete(), "the frame still ends");
    }

    #[test]
    fn frame_lengths_per_region() {
        let mut bus = MockPpuBus::new();
        let mut ppu = Ppu::new(Region::Pal);
        run_dots(&mut ppu, &mut bus, 341 * 312);
        assert_eq!((ppu.frame_count(), ppu.scanline, ppu.dot), (1, 0, 0));

        // NTSC with rendering on: odd frames are one dot shorter.
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.cpu_write(0x2001, 0x08, &mut bus);
        run_dots(&mut ppu, &mut bus, 341 * 262);
        assert_eq!((ppu.frame_count(), ppu.scanline, ppu.dot), (1, 0, 0));
        run_dots(&mut ppu, &mut bus, 341 * 262 - 1);
        assert_eq!((ppu.frame_count(), ppu.scanline, ppu.dot), (2, 0, 0));
    }

    #[test]
    fn backdrop_when_rendering_disabled() {
        let mut bus = MockPpuBus::new();
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.palette_write(0x3F00, 0x21);
        ppu.palette_write(0x3F05, 0x16);
        run_dots(&mut ppu, &mut bus, 341 * 2);
        assert!(ppu.frame_buffer()[..NES_WIDTH * 2].iter().all(|&p| p == 0x21));

        // `v` pointing into palette RAM shows that color instead.
        ppu.v = 0x3F05;
        run_dots(&mut ppu, &mut bus, 341);
        assert_eq!(ppu.frame_buffer()[NES_WIDTH * 2 + 10], 0x16);
    }

    #[test]
    fn sprite_zero_hit_over_opaque_background() {
        let mut bus = MockPpuBus::new();
        // Tile 1: solid plane 0. Nametable fully tile 1.
        for row in 0..8 {
            bus.write(0x0010 + row, 0xFF);
        }
        for i in 0..960 {
            bus.write(0x2000 + i, 0x01);
        }
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.palette_write(0x3F01, 0x0A);
        ppu.palette_write(0x3F11, 0x16);
        ppu.oam = [0xF0; 256];
        ppu.oam[0..4].copy_from_slice(&[20, 0x01, 0x00, 40]);
        ppu.cpu_write(0x2001, 0x1E, &mut bus);

        seek(&mut ppu, &mut bus, 21, 0);
        assert!(!ppu.status.contains(PpuStatus::SPRITE_ZERO_HIT));
        seek(&mut ppu, &mut bus, 21, 42);
        assert!(ppu.status.contains(PpuStatus::SPRITE_ZERO_HIT));
        // Sprite in front of the background uses the sprite palette.
        assert_eq!(ppu.frame_buffer()[21 * NES_WIDTH + 40] & 0x3F, 0x16);
        assert_eq!(ppu.frame_buffer()[21 * NES_WIDTH + 39] & 0x3F, 0x0A);

        seek(&mut ppu, &mut bus, 261, 2);
        assert!(!ppu.status.contains(PpuStatus::SPRITE_ZERO_HIT));
    }

    #[test]
    fn greyscale_and_emphasis_bits_in_output() {
        let mut bus = MockPpuBus::new();
        let mut ppu = Ppu::new(Region::Ntsc);
        ppu.palette_write(0x3F00, 0x27);
        ppu.cpu_write(0x2001, 0b1010_0001, &mut bus);
        run_dots(&mut ppu, &mut bus, 10);
        assert_eq!(ppu.frame_buffer()[0], 0x20 | (0b101 << 6));
    }
}
