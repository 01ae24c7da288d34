/*!
Cartridge image parsing (iNES 1.0, NES 2.0, headerless) and the loaded
`Cartridge` that owns the mapper instance.

Features:
- Parse the 16-byte header into `CartHeader`: mapper/submapper, mirroring,
  battery, trainer, PRG/CHR sizes (including the NES 2.0 exponent form),
  PRG-RAM/NVRAM and CHR-RAM sizes, and region.
- Compute the CRC-32 of the PRG+CHR payload and apply matching `Database`
  overrides.
- Route headerless dumps: a database entry decides the layout; without one a
  24 KiB or 40 KiB image is taken as NROM (16/32 KiB PRG followed by 8 KiB CHR).
- Build the `Board` memory and hand it to the mapper registry.

Notes:
- iNES 1.0 PRG-RAM size byte of 0 means 8 KiB by convention.
- Headers with junk in bytes 12..=15 ("DiskDude!" style) only trust the low
  mapper nibble.
- A 512-byte trainer is copied to PRG-RAM at $7000.
*/

use log::{info, warn};

use crate::config::Region;
use crate::crc32::crc32;
use crate::database::Database;
use crate::error::LoadError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::mappers::{Fds, MapperRegistry};

const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const PRG_UNIT: usize = 16 * 1024;
const CHR_UNIT: usize = 8 * 1024;
/// iNES number conventionally given to the disk system.
pub const FDS_MAPPER: u16 = 20;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RomFormat {
    Ines1,
    Nes2,
    Headerless,
    /// Famicom Disk System image plus BIOS.
    FdsDisk,
}

/// Header metadata after database overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartHeader {
    pub format: RomFormat,
    pub mapper: u16,
    pub submapper: u8,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub prg_ram_size: usize,
    pub chr_ram_size: usize,
    pub region: Option<Region>,
}

/// An image split into its parts, ready to become a `Board`.
#[derive(Clone, Debug)]
pub struct RomImage {
    pub header: CartHeader,
    pub prg_rom: Vec<u8>,
    pub chr_rom: Vec<u8>,
    pub trainer: Option<Vec<u8>>,
    /// CRC-32 of PRG+CHR.
    pub crc32: u32,
}

/// Summary returned to the host after a successful load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartridgeInfo {
    pub format: RomFormat,
    pub mapper: u16,
    pub submapper: u8,
    pub mirroring: Mirroring,
    pub battery: bool,
    pub prg_rom_len: usize,
    pub chr_rom_len: usize,
    pub prg_ram_len: usize,
    pub chr_ram_len: usize,
    pub region: Region,
    pub crc32: u32,
}

/// Size decoding for NES 2.0's LSB byte + MSB nibble, including the
/// exponent-multiplier form (`MSB == 0xF`).
fn nes2_rom_size(lsb: u8, msb_nibble: u8, unit: usize) -> Option<usize> {
    if msb_nibble == 0x0F {
        let exponent = (lsb >> 2) as u32;
        let multiplier = ((lsb & 0x03) as usize) * 2 + 1;
        1usize.checked_shl(exponent)?.checked_mul(multiplier)
    } else {
        (((msb_nibble as usize) << 8) | lsb as usize).checked_mul(unit)
    }
}

/// NES 2.0 RAM size shift count: 0 means none, else 64 << n.
fn nes2_ram_size(shift: u8) -> usize {
    if shift == 0 { 0 } else { 64usize << shift }
}

fn take<'a>(data: &'a [u8], offset: usize, len: usize, section: &'static str) -> Result<&'a [u8], LoadError> {
    let end = offset.checked_add(len).ok_or(LoadError::Truncated {
        section,
        expected: len,
        actual: 0,
    })?;
    if end > data.len() {
        return Err(LoadError::Truncated {
            section,
            expected: len,
            actual: data.len().saturating_sub(offset),
        });
    }
    Ok(&data[offset..end])
}

impl RomImage {
    /// Parse an image, applying database overrides where the CRC matches.
    pub fn parse(data: &[u8], db: &Database) -> Result<Self, LoadError> {
        if data.len() >= 4 && &data[0..4] == b"NES\x1A" {
            Self::parse_ines(data, db)
        } else {
            Self::parse_headerless(data, db)
        }
    }

    fn parse_ines(data: &[u8], db: &Database) -> Result<Self, LoadError> {
        if data.len() < HEADER_LEN {
            return Err(LoadError::BadHeader("image shorter than a 16-byte header".into()));
        }
        let h = &data[..HEADER_LEN];
        let flags6 = h[6];
        let flags7 = h[7];
        let nes2 = (flags7 & 0x0C) == 0x08;

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };
        let has_trainer = flags6 & 0x04 != 0;
        let mut battery = flags6 & 0x02 != 0;

        let (format, mapper, submapper, prg_len, chr_len, prg_ram_size, chr_ram_size, region) = if nes2 {
            let mapper = ((h[8] as u16 & 0x0F) << 8) | (flags7 as u16 & 0xF0) | (flags6 as u16 >> 4);
            let prg_len = nes2_rom_size(h[4], h[9] & 0x0F, PRG_UNIT)
                .ok_or_else(|| LoadError::BadHeader("PRG-ROM size overflow".into()))?;
            let chr_len = nes2_rom_size(h[5], h[9] >> 4, CHR_UNIT)
                .ok_or_else(|| LoadError::BadHeader("CHR-ROM size overflow".into()))?;
            let volatile = nes2_ram_size(h[10] & 0x0F);
            let nv = nes2_ram_size(h[10] >> 4);
            if nv > 0 {
                battery = true;
            }
            let chr_ram = nes2_ram_size(h[11] & 0x0F) + nes2_ram_size(h[11] >> 4);
            let chr_ram_size = if chr_len == 0 && chr_ram == 0 { CHR_UNIT } else { chr_ram };
            let region = match h[12] & 0x03 {
                0 => Some(Region::Ntsc),
                1 => Some(Region::Pal),
                3 => Some(Region::Dendy),
                _ => None,
            };
            (RomFormat::Nes2, mapper, h[8] >> 4, prg_len, chr_len, volatile + nv, chr_ram_size, region)
        } else {
            let junk = h[12..16].iter().any(|&b| b != 0);
            if junk {
                warn!("iNES header bytes 12..15 are not zero; ignoring the upper mapper nibble");
            }
            let high = if junk { 0 } else { flags7 as u16 & 0xF0 };
            let prg_len = h[4] as usize * PRG_UNIT;
            let chr_len = h[5] as usize * CHR_UNIT;
            let prg_ram_size = if h[8] == 0 { 8 * 1024 } else { h[8] as usize * 8 * 1024 };
            let chr_ram_size = if chr_len == 0 { CHR_UNIT } else { 0 };
            let region = if !junk && h[9] & 0x01 != 0 { Some(Region::Pal) } else { None };
            (RomFormat::Ines1, high | (flags6 as u16 >> 4), 0, prg_len, chr_len, prg_ram_size, chr_ram_size, region)
        };
        let mut prg_ram_size = prg_ram_size;

        if prg_len == 0 {
            return Err(LoadError::BadHeader("header declares no PRG-ROM".into()));
        }

        let mut offset = HEADER_LEN;
        let trainer = if has_trainer {
            let t = take(data, offset, TRAINER_LEN, "trainer")?.to_vec();
            offset += TRAINER_LEN;
            if prg_ram_size < 8 * 1024 {
                prg_ram_size = 8 * 1024;
            }
            Some(t)
        } else {
            None
        };
        let prg_rom = take(data, offset, prg_len, "PRG-ROM")?.to_vec();
        offset += prg_len;
        let chr_rom = take(data, offset, chr_len, "CHR-ROM")?.to_vec();

        let mut crc = crate::crc32::Crc32::new();
        crc.update(&prg_rom);
        crc.update(&chr_rom);
        let crc32 = crc.finish();

        let mut header = CartHeader {
            format,
            mapper,
            submapper,
            mirroring,
            battery,
            prg_ram_size,
            chr_ram_size,
            region,
        };
        apply_database(&mut header, crc32, db);

        Ok(Self {
            header,
            prg_rom,
            chr_rom,
            trainer,
            crc32,
        })
    }

    fn parse_headerless(data: &[u8], db: &Database) -> Result<Self, LoadError> {
        let crc32 = crc32(data);
        let entry = db.lookup(crc32);
        let prg_len = match entry.and_then(|e| e.prg_rom_size) {
            Some(len) => len,
            None => match data.len() {
                0x4000 | 0x8000 => data.len(),
                0x6000 => 0x4000,
                0xA000 => 0x8000,
                other => {
                    return Err(LoadError::BadHeader(format!(
                        "no iNES header and no database entry for a {other}-byte image"
                    )));
                }
            },
        };
        if prg_len == 0 || prg_len > data.len() {
            return Err(LoadError::Truncated {
                section: "PRG-ROM",
                expected: prg_len,
                actual: data.len(),
            });
        }
        let prg_rom = data[..prg_len].to_vec();
        let chr_rom = data[prg_len..].to_vec();
        let chr_ram_size = if chr_rom.is_empty() { CHR_UNIT } else { 0 };
        let mut header = CartHeader {
            format: RomFormat::Headerless,
            mapper: 0,
            submapper: 0,
            mirroring: Mirroring::Vertical,
            battery: false,
            prg_ram_size: 8 * 1024,
            chr_ram_size,
            region: None,
        };
        apply_database(&mut header, crc32, db);
        Ok(Self {
            header,
            prg_rom,
            chr_rom,
            trainer: None,
            crc32,
        })
    }

    /// Convert into board memory for the mapper constructor.
    pub fn into_board(self) -> Board {
        let chr_is_ram = self.chr_rom.is_empty();
        let chr = if chr_is_ram {
            vec![0; self.header.chr_ram_size.max(CHR_UNIT)]
        } else {
            self.chr_rom
        };
        let mut prg_ram = vec![0; self.header.prg_ram_size];
        if let Some(trainer) = &self.trainer {
            if prg_ram.len() >= 0x1200 {
                prg_ram[0x1000..0x1200].copy_from_slice(trainer);
            }
        }
        Board {
            mapper_id: self.header.mapper,
            submapper: self.header.submapper,
            prg_rom: self.prg_rom,
            chr,
            chr_is_ram,
            prg_ram,
            battery: self.header.battery,
            mirroring: self.header.mirroring,
        }
    }
}

fn apply_database(header: &mut CartHeader, crc: u32, db: &Database) {
    let Some(entry) = db.lookup(crc) else {
        return;
    };
    info!("database match for CRC {crc:08X}");
    if let Some(m) = entry.mapper {
        header.mapper = m;
    }
    if let Some(s) = entry.submapper {
        header.submapper = s;
    }
    if let Some(m) = entry.mirroring {
        header.mirroring = m;
    }
    if let Some(r) = entry.region {
        header.region = Some(r);
    }
    if let Some(s) = entry.prg_ram_size {
        header.prg_ram_size = s;
    }
    if let Some(s) = entry.chr_ram_size {
        header.chr_ram_size = s;
    }
    if let Some(b) = entry.battery {
        header.battery = b;
    }
}

/// A loaded cartridge: the mapper instance plus the facts it was built from.
pub struct Cartridge {
    pub mapper: Box<dyn Mapper>,
    info: CartridgeInfo,
}

impl std::fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cartridge").field("info", &self.info).finish()
    }
}

impl Cartridge {
    /// Parse `data` and construct its mapper from `registry`.
    pub fn load(
        data: &[u8],
        registry: &MapperRegistry,
        db: &Database,
        preferred: Option<Region>,
    ) -> Result<Self, LoadError> {
        let image = RomImage::parse(data, db)?;
        Self::from_image(image, registry, preferred)
    }

    pub fn from_image(
        image: RomImage,
        registry: &MapperRegistry,
        preferred: Option<Region>,
    ) -> Result<Self, LoadError> {
        let region = preferred.or(image.header.region).unwrap_or(Region::Ntsc);
        let info = CartridgeInfo {
            format: image.header.format,
            mapper: image.header.mapper,
            submapper: image.header.submapper,
            mirroring: image.header.mirroring,
            battery: image.header.battery,
            prg_rom_len: image.prg_rom.len(),
            chr_rom_len: image.chr_rom.len(),
            prg_ram_len: image.header.prg_ram_size,
            chr_ram_len: if image.chr_rom.is_empty() {
                image.header.chr_ram_size.max(CHR_UNIT)
            } else {
                0
            },
            region,
            crc32: image.crc32,
        };
        let mapper = registry.create(image.into_board())?;
        info!(
            "loaded cartridge: mapper {} (sub {}), PRG {} KiB, CHR {} KiB{}, {:?}, CRC {:08X}{}",
            info.mapper,
            info.submapper,
            info.prg_rom_len / 1024,
            (info.chr_rom_len + info.chr_ram_len) / 1024,
            if info.chr_rom_len == 0 { " RAM" } else { "" },
            info.region,
            info.crc32,
            if info.battery { ", battery" } else { "" },
        );
        Ok(Self { mapper, info })
    }

    /// Disk system: a `.fds` image and the 8 KiB BIOS. The checksum covers the
    /// raw disk sides, so it names the disk rather than the BIOS.
    pub fn from_disk(disk: &[u8], bios: &[u8], preferred: Option<Region>) -> Result<Self, LoadError> {
        let fds = Fds::new(disk, bios)?;
        let image = fds.original_image();
        let info = CartridgeInfo {
            format: RomFormat::FdsDisk,
            mapper: FDS_MAPPER,
            submapper: 0,
            mirroring: fds.mirroring(),
            battery: false,
            prg_rom_len: 0,
            chr_rom_len: 0,
            prg_ram_len: 0x8000,
            chr_ram_len: CHR_UNIT,
            region: preferred.unwrap_or(Region::Famicom),
            crc32: crc32(&image),
        };
        info!(
            "loaded disk: {} side(s), {:?}, CRC {:08X}",
            fds.side_count(),
            info.region,
            info.crc32
        );
        Ok(Self::from_mapper(Box::new(fds), info))
    }

    /// Wrap an already-built mapper.
    pub fn from_mapper(mapper: Box<dyn Mapper>, info: CartridgeInfo) -> Self {
        Self { mapper, info }
    }

    pub fn info(&self) -> &CartridgeInfo {
        &self.info
    }

    pub fn mapper_id(&self) -> u16 {
        self.info.mapper
    }

    pub fn crc32(&self) -> u32 {
        self.info.crc32
    }

    pub fn region(&self) -> Region {
        self.info.region
    }

    pub fn has_battery(&self) -> bool {
        self.info.battery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseEntry;
    use crate::test_utils::build_ines;

    fn load(data: &[u8]) -> Result<Cartridge, LoadError> {
        Cartridge::load(data, &MapperRegistry::default(), &Database::new(), None)
    }

    #[test]
    fn parse_ines1_basic() {
        // 2 x 16K PRG, 1 x 8K CHR, vertical mirroring, battery, mapper 1
        let flags6 = 0x01 | 0x02 | (1 << 4);
        let rom = build_ines(2, 1, flags6, 0x00, 0, None);
        let cart = load(&rom).expect("parse");
        let info = cart.info();
        assert_eq!(info.format, RomFormat::Ines1);
        assert_eq!(info.mapper, 1);
        assert_eq!(info.mirroring, Mirroring::Vertical);
        assert!(info.battery);
        assert_eq!(info.prg_rom_len, 32 * 1024);
        assert_eq!(info.chr_rom_len, 8 * 1024);
        assert_eq!(info.prg_ram_len, 8 * 1024, "0 PRG-RAM units means 8 KiB");
        assert_eq!(info.region, Region::Ntsc);
    }

    #[test]
    fn chr_ram_when_no_chr_rom() {
        let rom = build_ines(1, 0, 0x00, 0x00, 1, None);
        let cart = load(&rom).expect("parse");
        assert_eq!(cart.info().chr_rom_len, 0);
        assert_eq!(cart.info().chr_ram_len, 8 * 1024);
    }

    #[test]
    fn trainer_lands_at_7000() {
        let trainer = [0x5Au8; 512];
        let rom = build_ines(1, 1, 0x04, 0x00, 1, Some(&trainer));
        let mut cart = load(&rom).expect("parse");
        assert_eq!(cart.mapper.cpu_read(0x7000), Some(0x5A));
        assert_eq!(cart.mapper.cpu_read(0x71FF), Some(0x5A));
        assert_eq!(cart.mapper.cpu_read(0x7200), Some(0x00));
    }

    #[test]
    fn nes2_fields() {
        let mut rom = build_ines(2, 1, 0x40, 0x08, 0, None);
        // mapper 0x104 (bits 8-11 = 1), submapper 3
        rom[8] = 0x31;
        rom[10] = 0x70; // NVRAM 8 KiB (64 << 7)
        rom[12] = 0x01; // PAL
        let image = RomImage::parse(&rom, &Database::new()).expect("parse");
        assert_eq!(image.header.format, RomFormat::Nes2);
        assert_eq!(image.header.mapper, 0x104);
        assert_eq!(image.header.submapper, 3);
        assert_eq!(image.header.prg_ram_size, 8 * 1024);
        assert!(image.header.battery);
        assert_eq!(image.header.region, Some(Region::Pal));
    }

    #[test]
    fn nes2_exponent_size() {
        assert_eq!(nes2_rom_size(0b0000_1101, 0x0F, PRG_UNIT), Some(8 * 3));
        assert_eq!(nes2_rom_size(2, 0x01, PRG_UNIT), Some(0x102 * PRG_UNIT));
    }

    #[test]
    fn truncated_prg_is_reported() {
        let mut rom = build_ines(2, 1, 0, 0, 0, None);
        rom.truncate(16 + 20_000);
        match load(&rom) {
            Err(LoadError::Truncated { section, .. }) => assert_eq!(section, "PRG-ROM"),
            other => panic!("expected truncation error, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_mapper_is_fatal() {
        // mapper 0xF0 | 0x0F = 255
        let rom = build_ines(1, 1, 0xF0, 0xF0, 0, None);
        match load(&rom) {
            Err(LoadError::UnsupportedMapper(255)) => {}
            other => panic!("expected UnsupportedMapper(255), got {other:?}"),
        }
    }

    #[test]
    fn headerless_40k_is_nrom() {
        let mut data = vec![0xEAu8; 0x8000];
        data.extend(std::iter::repeat_n(0x11, 0x2000));
        let cart = load(&data).expect("headerless");
        assert_eq!(cart.info().format, RomFormat::Headerless);
        assert_eq!(cart.info().mapper, 0);
        assert_eq!(cart.info().prg_rom_len, 0x8000);
        assert_eq!(cart.info().chr_rom_len, 0x2000);
    }

    #[test]
    fn headerless_unknown_size_rejected() {
        assert!(matches!(load(&[0u8; 1000]), Err(LoadError::BadHeader(_))));
    }

    #[test]
    fn database_overrides_header() {
        let rom = build_ines(2, 1, 0x00, 0x00, 0, None);
        let crc = crc32(&rom[16..]);
        let mut db = Database::new();
        db.insert(
            crc,
            DatabaseEntry {
                mapper: Some(3),
                mirroring: Some(Mirroring::Vertical),
                region: Some(Region::Dendy),
                ..Default::default()
            },
        );
        let cart = Cartridge::load(&rom, &MapperRegistry::default(), &db, None).expect("load");
        assert_eq!(cart.info().mapper, 3);
        assert_eq!(cart.info().mirroring, Mirroring::Vertical);
        assert_eq!(cart.info().region, Region::Dendy);

        let forced = Cartridge::load(&rom, &MapperRegistry::default(), &db, Some(Region::Pal)).expect("load");
        assert_eq!(forced.info().region, Region::Pal, "caller preference wins");
    }
}
