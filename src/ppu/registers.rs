#![doc = r#"
PPU registers module

Purpose
- CPU-visible register semantics for $2000..=$2007 (mirrored through $3FFF).
- Register bit layouts as `bitflags` types.

Notes
- Writes go through the shared loopy latches: `t`, `v`, fine X and the write
  toggle `w`.
- PPUDATA ($2007) reads below $3F00 are buffered; palette reads return
  immediately and refill the buffer from the nametable underneath.
- Accessing $2007 during rendering bumps coarse X and Y together instead of the
  normal 1/32 increment.
- Reads of write-only registers return the PPU's I/O latch (last value driven
  on its data bus).
"#]

use bitflags::bitflags;

use super::Ppu;
use crate::ppu_bus::PpuBus;

bitflags! {
    /// $2000 PPUCTRL.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PpuCtrl: u8 {
        const NAMETABLE_X     = 0b0000_0001;
        const NAMETABLE_Y     = 0b0000_0010;
        const INCREMENT_32    = 0b0000_0100;
        const SPRITE_TABLE    = 0b0000_1000;
        const BG_TABLE        = 0b0001_0000;
        const SPRITE_8X16     = 0b0010_0000;
        const MASTER_SLAVE    = 0b0100_0000;
        const NMI_ENABLE      = 0b1000_0000;
    }

    /// $2001 PPUMASK.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PpuMask: u8 {
        const GREYSCALE       = 0b0000_0001;
        const BG_LEFT         = 0b0000_0010;
        const SPRITES_LEFT    = 0b0000_0100;
        const SHOW_BG         = 0b0000_1000;
        const SHOW_SPRITES    = 0b0001_0000;
        const EMPHASIZE_RED   = 0b0010_0000;
        const EMPHASIZE_GREEN = 0b0100_0000;
        const EMPHASIZE_BLUE  = 0b1000_0000;
    }

    /// $2002 PPUSTATUS (upper three bits; the rest is open bus).
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PpuStatus: u8 {
        const SPRITE_OVERFLOW = 0b0010_0000;
        const SPRITE_ZERO_HIT = 0b0100_0000;
        const VBLANK          = 0b1000_0000;
    }
}

impl Ppu {
    /// CPU read of register `addr` (any mirror in $2000..=$3FFF).
    pub fn cpu_read<B: PpuBus>(&mut self, addr: u16, bus: &mut B) -> u8 {
        let value = match addr & 0x7 {
            2 => {
                let v = self.status.bits() | (self.io_latch & 0x1F);
                self.status.remove(PpuStatus::VBLANK);
                self.w = false;
                // Reading just before the flag is raised suppresses it (and the
                // NMI) for this frame. `dot` is the next dot to be processed.
                if self.scanline == self.vblank_line && self.dot == 1 {
                    self.suppress_vblank = true;
                }
                v
            }
            4 => {
                let v = self.oam[self.oam_addr as usize];
                if self.oam_addr & 0x03 == 2 { v & 0xE3 } else { v }
            }
            7 => self.read_data(bus),
            _ => self.io_latch,
        };
        self.io_latch = value;
        value
    }

    /// CPU write of register `addr` (any mirror in $2000..=$3FFF).
    pub fn cpu_write<B: PpuBus>(&mut self, addr: u16, value: u8, bus: &mut B) {
        self.io_latch = value;
        match addr & 0x7 {
            0 => {
                self.ctrl = PpuCtrl::from_bits_retain(value);
                self.t = (self.t & 0xF3FF) | (((value & 0x03) as u16) << 10);
            }
            1 => self.mask = PpuMask::from_bits_retain(value),
            3 => self.oam_addr = value,
            4 => {
                if self.rendering_enabled() && self.on_render_line() {
                    // Writes during rendering only bump the high six bits.
                    self.oam_addr = self.oam_addr.wrapping_add(4);
                } else {
                    self.write_oam_data(value);
                }
            }
            5 => {
                if !self.w {
                    self.t = (self.t & 0xFFE0) | ((value >> 3) as u16);
                    self.x = value & 0x07;
                } else {
                    self.t = (self.t & 0x8C1F)
                        | (((value & 0x07) as u16) << 12)
                        | (((value & 0xF8) as u16) << 2);
                }
                self.w = !self.w;
            }
            6 => {
                if !self.w {
                    self.t = (self.t & 0x80FF) | (((value & 0x3F) as u16) << 8);
                } else {
                    self.t = (self.t & 0xFF00) | value as u16;
                    self.v = self.t;
                    bus.set_address(self.v & 0x3FFF);
                }
                self.w = !self.w;
            }
            7 => self.write_data(value, bus),
            _ => {}
        }
    }

    fn read_data<B: PpuBus>(&mut self, bus: &mut B) -> u8 {
        let addr = self.v & 0x3FFF;
        let value = if addr >= 0x3F00 {
            self.read_buffer = bus.read(addr - 0x1000);
            self.palette_read(addr) | (self.io_latch & 0xC0)
        } else {
            let out = self.read_buffer;
            self.read_buffer = bus.read(addr);
            out
        };
        self.increment_data_address(bus);
        value
    }

    fn write_data<B: PpuBus>(&mut self, value: u8, bus: &mut B) {
        let addr = self.v & 0x3FFF;
        if addr >= 0x3F00 {
            self.palette_write(addr, value);
        } else {
            bus.write(addr, value);
        }
        self.increment_data_address(bus);
    }

    fn increment_data_address<B: PpuBus>(&mut self, bus: &mut B) {
        if self.rendering_enabled() && self.on_render_line() {
            self.increment_x();
            self.increment_y();
        } else {
            let step = if self.ctrl.contains(PpuCtrl::INCREMENT_32) { 32 } else { 1 };
            self.v = self.v.wrapping_add(step) & 0x7FFF;
        }
        bus.set_address(self.v & 0x3FFF);
    }
}
