//! Image builders shared by the integration tests.

#![allow(dead_code)]

use famicore::{Config, Machine};

/// iNES v1 image for `mapper`. Every byte of PRG holds its 8 KiB bank number
/// and every byte of CHR its 1 KiB bank number, so bank switches are visible.
pub fn ines(mapper: u8, prg_16k: u8, chr_8k: u8, flags6: u8) -> Vec<u8> {
    let mut image = Vec::new();
    image.extend_from_slice(b"NES\x1A");
    image.push(prg_16k);
    image.push(chr_8k);
    image.push((flags6 & 0x0F) | (mapper << 4));
    image.push(mapper & 0xF0);
    image.push(1);
    image.extend_from_slice(&[0u8; 7]);
    for i in 0..prg_16k as usize * 0x4000 {
        image.push((i / 0x2000) as u8);
    }
    for i in 0..chr_8k as usize * 0x2000 {
        image.push((i / 0x400) as u8);
    }
    image
}

/// 16 KiB NROM with `program` at $8000, NMI handler `INC $00 ; RTI` at
/// $9000, CHR RAM and vertical mirroring.
pub fn nrom(program: &[u8]) -> Vec<u8> {
    let mut image = ines(0, 1, 0, 0x01);
    let prg = &mut image[16..16 + 0x4000];
    prg.fill(0xEA);
    prg[..program.len()].copy_from_slice(program);
    prg[0x1000..0x1003].copy_from_slice(&[0xE6, 0x00, 0x40]);
    for (offset, target) in [(0x3FFA, 0x9000u16), (0x3FFC, 0x8000), (0x3FFE, 0x8000)] {
        prg[offset..offset + 2].copy_from_slice(&target.to_le_bytes());
    }
    image
}

/// Turns on the background and NMI, fills the backdrop, then spins.
pub const RENDERING_DEMO: &[u8] = &[
    0xA9, 0x3F, 0x8D, 0x06, 0x20, // LDA #$3F ; STA $2006
    0xA9, 0x00, 0x8D, 0x06, 0x20, // LDA #$00 ; STA $2006
    0xA9, 0x21, 0x8D, 0x07, 0x20, // LDA #$21 ; STA $2007
    0xA9, 0x0A, 0x8D, 0x01, 0x20, // LDA #$0A ; STA $2001
    0xA9, 0x80, 0x8D, 0x00, 0x20, // LDA #$80 ; STA $2000
    0x4C, 0x19, 0x80, // JMP $8019
];

/// Backdrop plus audio: pulse 1 at constant volume and the noise channel. The
/// main loop retunes pulse 1 from the NMI counter, so every frame sounds
/// different.
pub const AUDIO_DEMO: &[u8] = &[
    0xA9, 0x3F, 0x8D, 0x06, 0x20, // LDA #$3F ; STA $2006
    0xA9, 0x00, 0x8D, 0x06, 0x20, // LDA #$00 ; STA $2006
    0xA9, 0x21, 0x8D, 0x07, 0x20, // LDA #$21 ; STA $2007
    0xA9, 0x0F, 0x8D, 0x15, 0x40, // LDA #$0F ; STA $4015
    0xA9, 0xBF, 0x8D, 0x00, 0x40, // LDA #$BF ; STA $4000
    0xA9, 0x08, 0x8D, 0x01, 0x40, // LDA #$08 ; STA $4001
    0xA9, 0x00, 0x8D, 0x03, 0x40, // LDA #$00 ; STA $4003
    0xA9, 0x3C, 0x8D, 0x0C, 0x40, // LDA #$3C ; STA $400C
    0xA9, 0x05, 0x8D, 0x0E, 0x40, // LDA #$05 ; STA $400E
    0xA9, 0x08, 0x8D, 0x0F, 0x40, // LDA #$08 ; STA $400F
    0xA9, 0x0A, 0x8D, 0x01, 0x20, // LDA #$0A ; STA $2001
    0xA9, 0x80, 0x8D, 0x00, 0x20, // LDA #$80 ; STA $2000
    0xA5, 0x00, 0x09, 0x40, // $803C: LDA $00 ; ORA #$40
    0x8D, 0x02, 0x40, // STA $4002
    0x4C, 0x3C, 0x80, // JMP $803C
];

/// 8 KiB BIOS whose reset code enables NMI and spins at $E005.
pub fn fds_bios() -> Vec<u8> {
    let mut bios = vec![0xEAu8; 0x2000];
    bios[..8].copy_from_slice(&[0xA9, 0x80, 0x8D, 0x00, 0x20, 0x4C, 0x05, 0xE0]);
    bios[0x100..0x103].copy_from_slice(&[0xE6, 0x00, 0x40]);
    for (offset, target) in [(0x1FFA, 0xE100u16), (0x1FFC, 0xE000), (0x1FFE, 0xE000)] {
        bios[offset..offset + 2].copy_from_slice(&target.to_le_bytes());
    }
    bios
}

/// Headered `.fds` image with `sides` blank sides.
pub fn fds_disk(sides: u8) -> Vec<u8> {
    let mut disk = b"FDS\x1A".to_vec();
    disk.push(sides);
    disk.resize(16, 0);
    disk.resize(16 + sides as usize * 65_500, 0);
    disk
}

pub fn powered(image: &[u8]) -> Machine {
    let mut m = Machine::new(Config::default());
    m.load(image, None).expect("image loads");
    m.power(true);
    m
}
