/*!
Machine configuration: console region, RAM power-on policy, output format and
input wiring.

`Config` is a plain value with public fields. Hosts build one (usually from
`Config::default()`), hand it to `Machine::new`, and may replace it between
sessions; persistence of configuration is the host's concern.
*/

/// Console timing family.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    Ntsc,
    Pal,
    /// Japanese console: NTSC timing, expansion-port multi-pad wiring.
    Famicom,
    /// PAL-clocked clone with NTSC-like per-frame CPU budget.
    Dendy,
}

/// Derived clock constants for a region.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    pub master_clock_hz: u64,
    /// Master clocks per CPU cycle.
    pub cpu_divider: u64,
    /// Master clocks per PPU dot.
    pub ppu_divider: u64,
    pub scanlines: u16,
    pub vblank_scanline: u16,
    /// Whether the pre-render line drops one dot on odd frames.
    pub odd_frame_skip: bool,
    /// APU period/rate tables to use.
    pub pal_apu: bool,
}

impl Region {
    pub const fn timing(self) -> Timing {
        match self {
            Region::Ntsc | Region::Famicom => Timing {
                master_clock_hz: 21_477_272,
                cpu_divider: 12,
                ppu_divider: 4,
                scanlines: 262,
                vblank_scanline: 241,
                odd_frame_skip: true,
                pal_apu: false,
            },
            Region::Pal => Timing {
                master_clock_hz: 26_601_712,
                cpu_divider: 16,
                ppu_divider: 5,
                scanlines: 312,
                vblank_scanline: 241,
                odd_frame_skip: false,
                pal_apu: true,
            },
            Region::Dendy => Timing {
                master_clock_hz: 26_601_712,
                cpu_divider: 15,
                ppu_divider: 5,
                scanlines: 312,
                vblank_scanline: 291,
                odd_frame_skip: false,
                pal_apu: false,
            },
        }
    }

    /// CPU clock in Hz (rounded down).
    pub const fn cpu_clock_hz(self) -> u64 {
        let t = self.timing();
        t.master_clock_hz / t.cpu_divider
    }

    /// Nominal video refresh rate in whole frames per second.
    pub const fn frame_rate(self) -> u32 {
        match self {
            Region::Ntsc | Region::Famicom => 60,
            Region::Pal | Region::Dendy => 50,
        }
    }

    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Region::Ntsc => 0,
            Region::Pal => 1,
            Region::Famicom => 2,
            Region::Dendy => 3,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Region::Ntsc),
            1 => Some(Region::Pal),
            2 => Some(Region::Famicom),
            3 => Some(Region::Dendy),
            _ => None,
        }
    }
}

/// Contents of CPU work RAM (and cartridge PRG-RAM) after a hard reset.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RamPowerPolicy {
    AllZero,
    AllOnes,
    /// Pseudo-random bytes, reproducible for a given seed.
    Random(u64),
}

impl RamPowerPolicy {
    /// Fill `buf` according to the policy. `salt` decorrelates separate RAM
    /// regions that share one seed.
    pub fn fill(self, buf: &mut [u8], salt: u64) {
        match self {
            RamPowerPolicy::AllZero => buf.fill(0x00),
            RamPowerPolicy::AllOnes => buf.fill(0xFF),
            RamPowerPolicy::Random(seed) => {
                let mut rng = XorShift64Star::new(seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15));
                for chunk in buf.chunks_mut(8) {
                    let word = rng.next_u64().to_le_bytes();
                    chunk.copy_from_slice(&word[..chunk.len()]);
                }
            }
        }
    }
}

/// xorshift64* generator; small, fast and stable across platforms.
#[derive(Clone, Debug)]
struct XorShift64Star {
    state: u64,
}

impl XorShift64Star {
    fn new(seed: u64) -> Self {
        // A zero state would get stuck.
        Self {
            state: if seed == 0 { 0x2545_F491_4F6C_DD1D } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }
}

/// Channel order of the packed 32-bit output pixels.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// 0x00RRGGBB
    Xrgb8888,
    /// 0x00BBGGRR
    Xbgr8888,
    /// 0xRRGGBBAA
    Rgba8888,
    /// 0xBBGGRRAA
    Bgra8888,
}

impl PixelFormat {
    #[inline]
    pub fn pack(self, r: u8, g: u8, b: u8) -> u32 {
        let (r, g, b) = (r as u32, g as u32, b as u32);
        match self {
            PixelFormat::Xrgb8888 => (r << 16) | (g << 8) | b,
            PixelFormat::Xbgr8888 => (b << 16) | (g << 8) | r,
            PixelFormat::Rgba8888 => (r << 24) | (g << 16) | (b << 8) | 0xFF,
            PixelFormat::Bgra8888 => (b << 24) | (g << 16) | (r << 8) | 0xFF,
        }
    }
}

/// Emulator configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Forced region; `None` follows the cartridge header/database, else NTSC.
    pub region: Option<Region>,
    pub ram_power: RamPowerPolicy,
    /// Hardware 8-sprites-per-scanline limit. Disabling it removes flicker at
    /// the cost of accuracy.
    pub sprite_limit: bool,
    /// Insert disk side A automatically at power-on.
    pub fds_auto_insert: bool,
    /// Four Score (NES) or expansion-port pads (Famicom) for players 3 and 4.
    pub four_player: bool,
    /// Light gun on controller port 2 instead of a pad.
    pub zapper: bool,
    pub sample_rate: u32,
    pub pixel_format: PixelFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            ram_power: RamPowerPolicy::AllZero,
            sprite_limit: true,
            fds_auto_insert: true,
            four_player: false,
            zapper: false,
            sample_rate: 44_100,
            pixel_format: PixelFormat::Xrgb8888,
        }
    }
}
