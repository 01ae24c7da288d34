/*!
Mapper subsystem: the capability interface every cartridge board implements,
plus `Board`, the PRG/CHR/RAM storage and banking arithmetic the concrete
mappers share.

Purpose:
- Decouple CPU/PPU address mapping from the `Bus` so boards are added by
  implementing `Mapper` and registering a constructor, never by editing the
  bus or the dispatcher.
- Give the state codec a uniform way to persist board registers and RAM.

Integration:
- The Bus forwards CPU $4020..=$FFFF to `cpu_read`/`cpu_write` and PPU
  $0000..=$1FFF to `ppu_read`/`ppu_write`.
- Nametable arrangement comes from `mirroring()` on every nametable access, so
  boards with runtime mirroring control need no extra plumbing.
- `tick` runs once per CPU cycle inside the bus access that consumed the cycle;
  IRQ output is data (`irq_pending`) sampled by the CPU's interrupt poll.
- `notify_ppu_address` sees every address the PPU puts on its bus (pattern,
  nametable and $2006/$2007 traffic); boards clocking off PPU A12 use it.
*/

use log::warn;

use crate::error::StateError;
use crate::mappers::fds::Fds;
use crate::state::{StateReader, StateWriter};

/// Nametable arrangement of the 4 logical nametables onto physical VRAM.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleScreenLower,
    SingleScreenUpper,
    /// Cartridge supplies 2 KiB extra VRAM; all 4 tables are distinct.
    FourScreen,
}

impl Mirroring {
    pub(crate) fn to_u8(self) -> u8 {
        match self {
            Mirroring::Horizontal => 0,
            Mirroring::Vertical => 1,
            Mirroring::SingleScreenLower => 2,
            Mirroring::SingleScreenUpper => 3,
            Mirroring::FourScreen => 4,
        }
    }

    pub(crate) fn from_u8(v: u8) -> Result<Self, StateError> {
        Ok(match v {
            0 => Mirroring::Horizontal,
            1 => Mirroring::Vertical,
            2 => Mirroring::SingleScreenLower,
            3 => Mirroring::SingleScreenUpper,
            4 => Mirroring::FourScreen,
            _ => return Err(StateError::Invalid("mirroring")),
        })
    }
}

/// Common interface all cartridge mappers implement.
///
/// Semantics:
/// - All read/write methods take full CPU or PPU addresses (unmasked).
/// - `cpu_read` returns `None` when the board does not drive the data bus
///   (the bus then yields its open-bus value).
/// - `ppu_read` takes `&mut self` because some boards latch on pattern
///   fetches (MMC2/MMC4).
/// - Save/load must cover every mutable register and RAM byte; anything left
///   out desynchronizes restored sessions.
pub trait Mapper {
    /// iNES mapper number.
    fn mapper_id(&self) -> u16;

    /// CPU read in $4020..=$FFFF. Reads at $6000 and above must not change
    /// board state; debugger peeks go through this path.
    fn cpu_read(&mut self, addr: u16) -> Option<u8>;

    /// CPU write in $4020..=$FFFF.
    fn cpu_write(&mut self, addr: u16, value: u8);

    /// PPU pattern-table read ($0000..=$1FFF).
    fn ppu_read(&mut self, addr: u16) -> u8;

    /// PPU pattern-table write ($0000..=$1FFF); ignored for CHR ROM.
    fn ppu_write(&mut self, addr: u16, value: u8);

    /// Current nametable arrangement.
    fn mirroring(&self) -> Mirroring;

    /// Power (`hard`) or reset-button initialization of board registers.
    fn reset(&mut self, _hard: bool) {}

    /// Advance cycle-driven logic (IRQ counters, disk drive, audio).
    fn tick(&mut self, _cpu_cycles: u32) {}

    /// Level of the board's IRQ output.
    fn irq_pending(&self) -> bool {
        false
    }

    /// Observe a PPU bus address (A12 edge detection and similar).
    fn notify_ppu_address(&mut self, _addr: u16) {}

    /// Expansion sound output, already scaled to the APU mix level.
    fn expansion_audio(&self) -> f32 {
        0.0
    }

    /// Battery-backed memory, if the board has any.
    fn battery_ram(&self) -> Option<&[u8]> {
        None
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn save_state(&self, w: &mut StateWriter);

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError>;

    /// Disk-system access for host commands (insert/eject/patch).
    fn as_fds(&self) -> Option<&Fds> {
        None
    }

    fn as_fds_mut(&mut self) -> Option<&mut Fds> {
        None
    }
}

/// Log a board behavior the core does not model. `seen` keeps it to one
/// record per condition per mapper instance; emulation carries on either way.
pub fn warn_unhandled(seen: &mut bool, mapper: u16, condition: &str) {
    if !*seen {
        *seen = true;
        warn!("mapper {mapper}: {condition} is not emulated; continuing");
    }
}

/// Value actually latched by a discrete-logic board with bus conflicts: the
/// CPU and the ROM drive the bus together, so the result is their AND.
/// `driven` is what the board itself decodes at the written address, i.e. the
/// byte from the currently banked PRG window; `None` leaves the value alone.
#[inline]
pub fn bus_conflict(driven: Option<u8>, value: u8) -> u8 {
    driven.map_or(value, |rom| value & rom)
}

// ----------------------------------------------------------------------------
// Board memory
// ----------------------------------------------------------------------------

/// PRG/CHR/RAM storage plus header facts a mapper needs.
///
/// Features:
/// - Bank reads wrap the bank number modulo the number of banks present, which
///   is what incomplete address decoding does on real boards.
/// - CHR is either ROM or RAM; writes to CHR ROM are dropped.
/// - PRG-RAM at $6000..=$7FFF mirrors when smaller than 8 KiB.
#[derive(Clone, Debug)]
pub struct Board {
    pub mapper_id: u16,
    pub submapper: u8,
    pub prg_rom: Vec<u8>,
    pub chr: Vec<u8>,
    pub chr_is_ram: bool,
    pub prg_ram: Vec<u8>,
    pub battery: bool,
    /// Header (soldered) mirroring.
    pub mirroring: Mirroring,
}

impl Board {
    /// Number of `size`-byte PRG banks (at least 1).
    #[inline]
    pub fn prg_bank_count(&self, size: usize) -> usize {
        (self.prg_rom.len() / size).max(1)
    }

    /// Number of `size`-byte CHR banks (at least 1).
    #[inline]
    pub fn chr_bank_count(&self, size: usize) -> usize {
        (self.chr.len() / size).max(1)
    }

    /// Read from PRG bank `bank` of `size` bytes at `offset` (masked to the bank).
    #[inline]
    pub fn read_prg(&self, bank: usize, size: usize, offset: usize) -> u8 {
        if self.prg_rom.is_empty() {
            return 0xFF;
        }
        let bank = bank % self.prg_bank_count(size);
        let idx = (bank * size + (offset & (size - 1))) % self.prg_rom.len();
        self.prg_rom[idx]
    }

    /// Read CHR bank `bank` of `size` bytes at `offset`.
    #[inline]
    pub fn read_chr(&self, bank: usize, size: usize, offset: usize) -> u8 {
        if self.chr.is_empty() {
            return 0;
        }
        let bank = bank % self.chr_bank_count(size);
        let idx = (bank * size + (offset & (size - 1))) % self.chr.len();
        self.chr[idx]
    }

    /// Write CHR bank `bank` of `size` bytes at `offset` (RAM only).
    #[inline]
    pub fn write_chr(&mut self, bank: usize, size: usize, offset: usize, value: u8) {
        if !self.chr_is_ram || self.chr.is_empty() {
            return;
        }
        let bank = bank % self.chr_bank_count(size);
        let idx = (bank * size + (offset & (size - 1))) % self.chr.len();
        self.chr[idx] = value;
    }

    /// PRG-RAM read at $6000..=$7FFF; `None` when the board has none.
    #[inline]
    pub fn read_prg_ram(&self, addr: u16) -> Option<u8> {
        if self.prg_ram.is_empty() {
            return None;
        }
        let rel = (addr as usize).wrapping_sub(0x6000) & 0x1FFF;
        Some(self.prg_ram[rel % self.prg_ram.len()])
    }

    #[inline]
    pub fn write_prg_ram(&mut self, addr: u16, value: u8) {
        if self.prg_ram.is_empty() {
            return;
        }
        let rel = (addr as usize).wrapping_sub(0x6000) & 0x1FFF;
        let len = self.prg_ram.len();
        self.prg_ram[rel % len] = value;
    }

    /// Battery RAM view (PRG-RAM when the header marks it battery-backed).
    pub fn battery_ram(&self) -> Option<&[u8]> {
        (self.battery && !self.prg_ram.is_empty()).then_some(self.prg_ram.as_slice())
    }

    pub fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        (self.battery && !self.prg_ram.is_empty()).then_some(self.prg_ram.as_mut_slice())
    }

    /// Persist the mutable memories (PRG-RAM and CHR-RAM).
    pub fn save_state(&self, w: &mut StateWriter) {
        w.bytes(&self.prg_ram);
        if self.chr_is_ram {
            w.bytes(&self.chr);
        } else {
            w.bytes(&[]);
        }
    }

    pub fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.fill(&mut self.prg_ram)?;
        if self.chr_is_ram {
            r.fill(&mut self.chr)?;
        } else if !r.bytes()?.is_empty() {
            return Err(StateError::Invalid("CHR-RAM data for a CHR-ROM board"));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Board with PRG banks filled by bank number and CHR banks by `0x80 | bank`.
    pub(crate) fn board(prg_kib: usize, chr_kib: usize, chr_is_ram: bool, prg_ram_kib: usize) -> Board {
        let mut prg_rom = vec![0u8; prg_kib * 1024];
        for (i, b) in prg_rom.iter_mut().enumerate() {
            *b = (i / 0x1000) as u8;
        }
        let chr = if chr_is_ram {
            vec![0u8; chr_kib * 1024]
        } else {
            (0..chr_kib * 1024).map(|i| 0x80 | (i / 0x400) as u8).collect()
        };
        Board {
            mapper_id: 0,
            submapper: 0,
            prg_rom,
            chr,
            chr_is_ram,
            prg_ram: vec![0; prg_ram_kib * 1024],
            battery: false,
            mirroring: Mirroring::Horizontal,
        }
    }

    #[test]
    fn bank_reads_wrap() {
        let b = board(64, 8, false, 8);
        // 4 banks of 16 KiB; bank 5 wraps to bank 1 (starts at 4 KiB unit 4).
        assert_eq!(b.read_prg(5, 0x4000, 0), 4);
        assert_eq!(b.read_prg(1, 0x4000, 0x3FFF), 7);
        assert_eq!(b.read_chr(9, 0x400, 0), 0x81);
    }

    #[test]
    fn prg_ram_mirrors_and_chr_rom_is_read_only() {
        let mut b = board(32, 8, false, 2);
        b.write_prg_ram(0x6001, 0x5A);
        assert_eq!(b.read_prg_ram(0x6801), Some(0x5A));
        b.write_chr(0, 0x2000, 0, 0x00);
        assert_eq!(b.read_chr(0, 0x2000, 0), 0x80);
        let none = board(32, 8, false, 0);
        assert_eq!(none.read_prg_ram(0x6000), None);
    }

    #[test]
    fn bus_conflict_ands_with_rom() {
        assert_eq!(bus_conflict(Some(0b1010_1010), 0xFF), 0b1010_1010);
        assert_eq!(bus_conflict(Some(0x0F), 0x35), 0x05);
        assert_eq!(bus_conflict(None, 0xFF), 0xFF);
    }
}
