//! Shared test utilities: iNES image builders and a ready-to-run bus.
//!
//! Notes on iNES header fields used here:
//! - bytes[0..4] = b"NES\x1A"
//! - byte 4 = PRG ROM size in 16 KiB units
//! - byte 5 = CHR ROM size in 8 KiB units (0 => CHR RAM)
//! - byte 6 = Flags 6 (mirroring, battery, trainer, mapper low nibble)
//! - byte 7 = Flags 7 (NES 2.0 indicator, mapper high nibble)
//! - byte 8 = PRG RAM size in 8 KiB units
//!
//! Vectors for a 16 KiB NROM image sit at PRG offset 0x3FFA..=0x3FFF and are
//! visible at $FFFA..=$FFFF through the mirror.

#![allow(dead_code)]

use crate::bus::Bus;
use crate::cartridge::Cartridge;
use crate::config::{Config, Region};
use crate::database::Database;
use crate::mappers::MapperRegistry;

/// Build a minimal iNES (v1) image with configurable PRG/CHR sizes and flags.
/// PRG is filled with $AA and CHR with $CC.
pub fn build_ines(
    prg_16k: usize,
    chr_8k: usize,
    flags6: u8,
    flags7: u8,
    prg_ram_8k: u8,
    trainer: Option<&[u8; 512]>,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(
        16 + trainer.map_or(0, |_| 512) + prg_16k * 16 * 1024 + chr_8k * 8 * 1024,
    );
    bytes.extend_from_slice(b"NES\x1A");
    bytes.push(prg_16k as u8);
    bytes.push(chr_8k as u8);
    bytes.push(flags6);
    bytes.push(flags7);
    bytes.push(prg_ram_8k);
    bytes.extend_from_slice(&[0u8; 7]);
    if let Some(t) = trainer {
        bytes.extend_from_slice(t);
    }
    bytes.resize(bytes.len() + prg_16k * 16 * 1024, 0xAA);
    bytes.resize(bytes.len() + chr_8k * 8 * 1024, 0xCC);
    bytes
}

/// 16 KiB NROM image with `program` at $8000, CHR RAM, vertical mirroring,
/// and all three vectors pointing at their targets.
pub fn nrom_program(program: &[u8], reset: u16, nmi: u16, irq: u16) -> Vec<u8> {
    assert!(program.len() <= 0x3FFA, "program overlaps the vectors");
    let mut image = build_ines(1, 0, 0x01, 0x00, 1, None);
    let prg = &mut image[16..16 + 0x4000];
    prg.fill(0xEA);
    prg[..program.len()].copy_from_slice(program);
    for (offset, target) in [(0x3FFA, nmi), (0x3FFC, reset), (0x3FFE, irq)] {
        prg[offset..offset + 2].copy_from_slice(&target.to_le_bytes());
    }
    image
}

/// Load `image` as an NTSC cartridge through the builtin registry.
pub fn cartridge(image: &[u8]) -> Cartridge {
    Cartridge::load(image, &MapperRegistry::with_builtin(), &Database::new(), Some(Region::Ntsc))
        .expect("test image loads")
}

/// Powered NTSC bus with `program` at $8000 (reset vector $8000, NMI and IRQ
/// handlers at $9000 and $A000).
pub fn bus_with_program(program: &[u8]) -> Bus {
    let mut bus = Bus::new(Region::Ntsc, &Config::default());
    bus.insert_cartridge(cartridge(&nrom_program(program, 0x8000, 0x9000, 0xA000)));
    bus.power();
    bus
}
