/*!
Dot-level 2C02/2C07 picture processing unit.

Provides:
- CPU-visible register interface ($2000..$2007), see `registers.rs`
- OAM and palette RAM, loopy scroll counters (`memory.rs`)
- Background fetch pipeline with 16-pixel shifters (`fetch.rs`)
- Per-scanline sprite evaluation with the hardware overflow quirk (`oam_eval.rs`)
- Sprite pattern fetch and pixel output (`sprite.rs`)
- Per-dot timing, vblank/NMI signaling and pixel multiplexing (`renderer.rs`)

Output:
- The frame buffer holds one `u16` per pixel: palette index in bits 0..=5 and
  the PPUMASK emphasis bits in 6..=8. `render_rgb` turns it into packed RGB.

STRUCTURE:
- `Ppu` holds all state. Child modules add inherent methods and use the
  private fields directly.
- Memory outside the PPU (pattern tables, nametables) is reached through the
  `PpuBus` trait, so the PPU never borrows the system bus.
- Scanlines are numbered 0..=239 visible, then post-render and vblank; the
  last line of the frame is the pre-render line.
*/

use crate::config::{PixelFormat, Region};
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

pub use registers::{PpuCtrl, PpuMask, PpuStatus};

/// Screen width in pixels.
pub const NES_WIDTH: usize = 256;
/// Screen height in pixels.
pub const NES_HEIGHT: usize = 240;
/// Dots per scanline.
pub const DOTS_PER_LINE: u16 = 341;

/// Canonical (approximate) NES master palette (RGB).
const NES_PALETTE: [[u8; 3]; 64] = [
    [0x75, 0x75, 0x75], [0x27, 0x1B, 0x8F], [0x00, 0x00, 0xAB], [0x47, 0x00, 0x9F],
    [0x8F, 0x00, 0x77], [0xAB, 0x00, 0x13], [0xA7, 0x00, 0x00], [0x7F, 0x0B, 0x00],
    [0x43, 0x2F, 0x00], [0x00, 0x47, 0x00], [0x00, 0x51, 0x00], [0x00, 0x3F, 0x17],
    [0x1B, 0x3F, 0x5F], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xBC, 0xBC, 0xBC], [0x00, 0x73, 0xEF], [0x23, 0x3B, 0xEF], [0x83, 0x00, 0xF3],
    [0xBF, 0x00, 0xBF], [0xE7, 0x00, 0x5B], [0xDB, 0x2B, 0x00], [0xCB, 0x4F, 0x0F],
    [0x8B, 0x73, 0x00], [0x00, 0x97, 0x00], [0x00, 0xAB, 0x00], [0x00, 0x93, 0x3B],
    [0x00, 0x83, 0x8B], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xFF, 0xFF, 0xFF], [0x3F, 0xBF, 0xFF], [0x5F, 0x97, 0xFF], [0xA7, 0x8B, 0xFD],
    [0xF7, 0x7B, 0xFF], [0xFF, 0x77, 0xB7], [0xFF, 0x77, 0x63], [0xFF, 0x9B, 0x3B],
    [0xF3, 0xBF, 0x3F], [0x83, 0xD3, 0x13], [0x4F, 0xDF, 0x4B], [0x58, 0xF8, 0x98],
    [0x00, 0xEB, 0xDB], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
    [0xFF, 0xFF, 0xFF], [0xAB, 0xE7, 0xFF], [0xC7, 0xD7, 0xFF], [0xD7, 0xCB, 0xFF],
    [0xFF, 0xC7, 0xFF], [0xFF, 0xC7, 0xDB], [0xFF, 0xBF, 0xB3], [0xFF, 0xDB, 0xAB],
    [0xFF, 0xE7, 0xA3], [0xE3, 0xFF, 0xA3], [0xAB, 0xF3, 0xBF], [0xB3, 0xFF, 0xCF],
    [0x9F, 0xFF, 0xF3], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00], [0x00, 0x00, 0x00],
];

/// Brightness factor applied to channels not selected by an emphasis bit.
const EMPHASIS_ATTENUATION: f32 = 0.746;

pub(crate) mod fetch;
pub(crate) mod memory;
pub(crate) mod oam_eval;
pub(crate) mod registers;
pub(crate) mod renderer;
pub(crate) mod sprite;

/// Most sprites a line can hold when the 8-sprite limit is lifted.
pub(crate) const MAX_LINE_SPRITES: usize = 64;

pub struct Ppu {
    region: Region,
    pre_render_line: u16,
    vblank_line: u16,
    odd_frame_skip: bool,
    /// Enforce the 8 sprites per line limit.
    sprite_limit: bool,

    // CPU-visible registers
    ctrl: PpuCtrl,
    mask: PpuMask,
    status: PpuStatus,
    oam_addr: u8,

    // Loopy scroll/address latches
    v: u16,
    t: u16,
    x: u8,
    w: bool,
    read_buffer: u8,
    /// Last value driven on the PPU's CPU-facing data bus.
    io_latch: u8,

    palette: [u8; 32],
    oam: [u8; 256],

    // Timing
    scanline: u16,
    dot: u16,
    frame: u64,
    odd_frame: bool,
    suppress_vblank: bool,
    frame_complete: bool,

    // Background pipeline
    nt_latch: u8,
    at_latch: u8,
    pattern_lo: u8,
    pattern_hi: u8,
    /// Two tiles of 4-bit (attribute << 2 | pattern) pixels, high tile first.
    bg_tiles: u64,

    // Sprites found by evaluation (copies of the OAM entries, 4 bytes each)
    secondary: [u8; MAX_LINE_SPRITES * 4],
    secondary_count: usize,
    /// OAM index each secondary entry was copied from.
    secondary_source: [u8; MAX_LINE_SPRITES],
    // Sprites prepared for the next line
    sprite_count: usize,
    sprite_patterns: [u32; MAX_LINE_SPRITES],
    sprite_x: [u8; MAX_LINE_SPRITES],
    sprite_behind: [bool; MAX_LINE_SPRITES],
    sprite_index: [u8; MAX_LINE_SPRITES],

    frame_buffer: Vec<u16>,
}

impl std::fmt::Debug for Ppu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ppu")
            .field("region", &self.region)
            .field("scanline", &self.scanline)
            .field("dot", &self.dot)
            .field("frame", &self.frame)
            .field("ctrl", &self.ctrl)
            .field("mask", &self.mask)
            .field("status", &self.status)
            .field("v", &self.v)
            .field("t", &self.t)
            .finish()
    }
}

impl Ppu {
    pub fn new(region: Region) -> Self {
        let timing = region.timing();
        Self {
            region,
            pre_render_line: timing.scanlines - 1,
            vblank_line: timing.vblank_scanline,
            odd_frame_skip: timing.odd_frame_skip,
            sprite_limit: true,
            ctrl: PpuCtrl::empty(),
            mask: PpuMask::empty(),
            status: PpuStatus::empty(),
            oam_addr: 0,
            v: 0,
            t: 0,
            x: 0,
            w: false,
            read_buffer: 0,
            io_latch: 0,
            palette: [0; 32],
            oam: [0; 256],
            scanline: 0,
            dot: 0,
            frame: 0,
            odd_frame: false,
            suppress_vblank: false,
            frame_complete: false,
            nt_latch: 0,
            at_latch: 0,
            pattern_lo: 0,
            pattern_hi: 0,
            bg_tiles: 0,
            secondary: [0xFF; MAX_LINE_SPRITES * 4],
            secondary_count: 0,
            secondary_source: [0; MAX_LINE_SPRITES],
            sprite_count: 0,
            sprite_patterns: [0; MAX_LINE_SPRITES],
            sprite_x: [0; MAX_LINE_SPRITES],
            sprite_behind: [false; MAX_LINE_SPRITES],
            sprite_index: [0; MAX_LINE_SPRITES],
            frame_buffer: vec![0; NES_WIDTH * NES_HEIGHT],
        }
    }

    /// Power-on (`hard`) or reset-button state.
    ///
    /// The reset line clears the control/mask registers and the scroll latches;
    /// OAM, palette RAM and the current VRAM address survive a soft reset.
    /// Either way the beam restarts one dot past the vblank-start dot, so the
    /// next frame boundary is a whole frame away. The vblank flag stays clear.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            let limit = self.sprite_limit;
            *self = Self::new(self.region);
            self.sprite_limit = limit;
        } else {
            self.ctrl = PpuCtrl::empty();
            self.mask = PpuMask::empty();
            self.w = false;
            self.t = 0;
            self.x = 0;
            self.read_buffer = 0;
            self.odd_frame = false;
            self.frame_complete = false;
        }
        self.scanline = self.vblank_line;
        self.dot = 2;
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn set_sprite_limit(&mut self, on: bool) {
        self.sprite_limit = on;
    }

    /// Frame buffer of palette entries (see module docs for the layout).
    pub fn frame_buffer(&self) -> &[u16] {
        &self.frame_buffer
    }

    /// Level of the PPU's /NMI output (vblank flag AND NMI enable).
    #[inline]
    pub fn nmi_output(&self) -> bool {
        self.status.contains(PpuStatus::VBLANK) && self.ctrl.contains(PpuCtrl::NMI_ENABLE)
    }

    /// True once per frame, on the dot vblank begins.
    pub fn take_frame_complete(&mut self) -> bool {
        std::mem::take(&mut self.frame_complete)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    pub fn scanline(&self) -> u16 {
        self.scanline
    }

    pub fn dot(&self) -> u16 {
        self.dot
    }

    pub fn status(&self) -> PpuStatus {
        self.status
    }

    pub fn mask(&self) -> PpuMask {
        self.mask
    }

    /// Current VRAM address (`v`).
    pub fn vram_addr(&self) -> u16 {
        self.v
    }

    /// Register value as a read would return it, without side effects.
    pub fn peek(&self, addr: u16) -> u8 {
        match addr & 0x7 {
            2 => self.status.bits() | (self.io_latch & 0x1F),
            4 => self.oam[self.oam_addr as usize],
            _ => self.io_latch,
        }
    }

    pub fn oam(&self) -> &[u8; 256] {
        &self.oam
    }

    pub fn palette_ram(&self) -> &[u8; 32] {
        &self.palette
    }

    #[inline]
    pub(crate) fn rendering_enabled(&self) -> bool {
        self.mask.intersects(PpuMask::SHOW_BG | PpuMask::SHOW_SPRITES)
    }

    /// Visible or pre-render line: the lines where the fetch pipeline runs.
    #[inline]
    pub(crate) fn on_render_line(&self) -> bool {
        (self.scanline as usize) < NES_HEIGHT || self.scanline == self.pre_render_line
    }

    /// Convert the frame buffer to packed RGB pixels.
    pub fn render_rgb(&self, format: PixelFormat, out: &mut [u32]) {
        let swap_red_green = matches!(self.region, Region::Pal | Region::Dendy);
        for (dst, &entry) in out.iter_mut().zip(self.frame_buffer.iter()) {
            let (r, g, b) = entry_rgb(entry, swap_red_green);
            *dst = format.pack(r, g, b);
        }
    }
}

/// RGB for one frame-buffer entry (palette index plus emphasis bits).
///
/// The 2C07 wires PPUMASK bits 5 and 6 to green and red respectively, the
/// opposite of the 2C02; `swap_red_green` selects that wiring.
pub fn entry_rgb(entry: u16, swap_red_green: bool) -> (u8, u8, u8) {
    let [r, g, b] = NES_PALETTE[(entry & 0x3F) as usize];
    let mut emphasis = (entry >> 6) & 0x7;
    if emphasis == 0 || (entry & 0x0E) == 0x0E {
        return (r, g, b);
    }
    if swap_red_green {
        emphasis = (emphasis & 0b100) | ((emphasis & 1) << 1) | ((emphasis >> 1) & 1);
    }
    let mut rgb = [r as f32, g as f32, b as f32];
    for (channel, bit) in [(0usize, 0b001u16), (1, 0b010), (2, 0b100)] {
        // Each emphasis bit darkens the two other channels.
        for (other, value) in rgb.iter_mut().enumerate() {
            if other != channel && emphasis & bit != 0 {
                *value *= EMPHASIS_ATTENUATION;
            }
        }
    }
    (rgb[0] as u8, rgb[1] as u8, rgb[2] as u8)
}

impl Stateful for Ppu {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.ctrl.bits());
        w.u8(self.mask.bits());
        w.u8(self.status.bits());
        w.u8(self.oam_addr);
        w.u16(self.v);
        w.u16(self.t);
        w.u8(self.x);
        w.bool(self.w);
        w.u8(self.read_buffer);
        w.u8(self.io_latch);
        w.bytes(&self.palette);
        w.bytes(&self.oam);
        w.u16(self.scanline);
        w.u16(self.dot);
        w.u64(self.frame);
        w.bool(self.odd_frame);
        w.bool(self.suppress_vblank);
        w.bool(self.frame_complete);
        w.u8(self.nt_latch);
        w.u8(self.at_latch);
        w.u8(self.pattern_lo);
        w.u8(self.pattern_hi);
        w.u64(self.bg_tiles);
        w.bytes(&self.secondary);
        w.bytes(&self.secondary_source);
        w.u8(self.secondary_count as u8);
        w.u8(self.sprite_count as u8);
        for i in 0..MAX_LINE_SPRITES {
            w.u32(self.sprite_patterns[i]);
            w.u8(self.sprite_x[i]);
            w.bool(self.sprite_behind[i]);
            w.u8(self.sprite_index[i]);
        }
        w.words(&self.frame_buffer);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.ctrl = PpuCtrl::from_bits_retain(r.u8()?);
        self.mask = PpuMask::from_bits_retain(r.u8()?);
        self.status = PpuStatus::from_bits_retain(r.u8()? & 0xE0);
        self.oam_addr = r.u8()?;
        self.v = r.u16()? & 0x7FFF;
        self.t = r.u16()? & 0x7FFF;
        self.x = r.u8()? & 0x07;
        self.w = r.bool()?;
        self.read_buffer = r.u8()?;
        self.io_latch = r.u8()?;
        r.fill(&mut self.palette)?;
        r.fill(&mut self.oam)?;
        let scanline = r.u16()?;
        let dot = r.u16()?;
        if scanline > self.pre_render_line || dot >= DOTS_PER_LINE {
            return Err(StateError::Invalid("PPU position"));
        }
        self.scanline = scanline;
        self.dot = dot;
        self.frame = r.u64()?;
        self.odd_frame = r.bool()?;
        self.suppress_vblank = r.bool()?;
        self.frame_complete = r.bool()?;
        self.nt_latch = r.u8()?;
        self.at_latch = r.u8()?;
        self.pattern_lo = r.u8()?;
        self.pattern_hi = r.u8()?;
        self.bg_tiles = r.u64()?;
        r.fill(&mut self.secondary)?;
        r.fill(&mut self.secondary_source)?;
        let secondary_count = r.u8()? as usize;
        let sprite_count = r.u8()? as usize;
        if secondary_count > MAX_LINE_SPRITES || sprite_count > MAX_LINE_SPRITES {
            return Err(StateError::Invalid("PPU sprite count"));
        }
        self.secondary_count = secondary_count;
        self.sprite_count = sprite_count;
        for i in 0..MAX_LINE_SPRITES {
            self.sprite_patterns[i] = r.u32()?;
            self.sprite_x[i] = r.u8()?;
            self.sprite_behind[i] = r.bool()?;
            self.sprite_index[i] = r.u8()?;
        }
        r.fill_words(&mut self.frame_buffer)?;
        Ok(())
    }
}
