/*
MMC2 (Mapper 9, PxROM) and MMC4 (Mapper 10, FxROM).

- PRG: MMC2 has one switchable 8 KiB bank at $8000 and the last three banks
  fixed; MMC4 has a switchable 16 KiB bank at $8000 and the last fixed.
- CHR: two 4 KiB halves, each with an FD and an FE bank register. A latch per
  half picks which register is live. The PPU fetching tile $FD or $FE flips
  the latch after the fetch completes:
  - $0FD8 / $0FE8 for the lower half ($0FD8-$0FDF / $0FE8-$0FEF on MMC4),
  - $1FD8-$1FDF / $1FE8-$1FEF for the upper half.
- $F000: mirroring, bit 0 (0 = vertical, 1 = horizontal).
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Mmc2 {
    board: Board,
    mmc4: bool,
    prg_bank: u8,
    /// [half][latch] where latch 0 = FD, 1 = FE.
    chr_banks: [[u8; 2]; 2],
    latch: [u8; 2],
    horizontal: bool,
}

impl Mmc2 {
    pub fn new(board: Board) -> Self {
        let mmc4 = board.mapper_id == 10;
        let horizontal = board.mirroring == Mirroring::Horizontal;
        Self {
            board,
            mmc4,
            prg_bank: 0,
            chr_banks: [[0; 2]; 2],
            latch: [1, 1],
            horizontal,
        }
    }

    fn update_latch(&mut self, addr: u16) {
        let lower_exact = !self.mmc4;
        match addr {
            0x0FD8 => self.latch[0] = 0,
            0x0FE8 => self.latch[0] = 1,
            0x0FD9..=0x0FDF if !lower_exact => self.latch[0] = 0,
            0x0FE9..=0x0FEF if !lower_exact => self.latch[0] = 1,
            0x1FD8..=0x1FDF => self.latch[1] = 0,
            0x1FE8..=0x1FEF => self.latch[1] = 1,
            _ => {}
        }
    }

    #[inline]
    fn chr_bank(&self, addr: u16) -> usize {
        let half = ((addr >> 12) & 1) as usize;
        self.chr_banks[half][self.latch[half] as usize] as usize
    }
}

impl Mapper for Mmc2 {
    fn mapper_id(&self) -> u16 {
        if self.mmc4 { 10 } else { 9 }
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        if addr < 0x8000 {
            return match addr {
                0x6000..=0x7FFF => self.board.read_prg_ram(addr),
                _ => None,
            };
        }
        let value = if self.mmc4 {
            let bank = if addr < 0xC000 {
                self.prg_bank as usize
            } else {
                self.board.prg_bank_count(0x4000) - 1
            };
            self.board.read_prg(bank, 0x4000, addr as usize)
        } else {
            let count = self.board.prg_bank_count(0x2000);
            let bank = match addr {
                0x8000..=0x9FFF => self.prg_bank as usize,
                0xA000..=0xBFFF => count.saturating_sub(3),
                0xC000..=0xDFFF => count.saturating_sub(2),
                _ => count - 1,
            };
            self.board.read_prg(bank, 0x2000, addr as usize)
        };
        Some(value)
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.board.write_prg_ram(addr, value),
            0xA000..=0xAFFF => self.prg_bank = value & 0x0F,
            0xB000..=0xBFFF => self.chr_banks[0][0] = value & 0x1F,
            0xC000..=0xCFFF => self.chr_banks[0][1] = value & 0x1F,
            0xD000..=0xDFFF => self.chr_banks[1][0] = value & 0x1F,
            0xE000..=0xEFFF => self.chr_banks[1][1] = value & 0x1F,
            0xF000..=0xFFFF => self.horizontal = value & 1 != 0,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        let value = self.board.read_chr(self.chr_bank(addr), 0x1000, addr as usize);
        self.update_latch(addr);
        value
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board
            .write_chr(self.chr_bank(addr), 0x1000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        if self.horizontal {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    fn reset(&mut self, hard: bool) {
        if hard {
            self.prg_bank = 0;
            self.chr_banks = [[0; 2]; 2];
            self.latch = [1, 1];
        }
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.prg_bank);
        for half in self.chr_banks {
            w.u8(half[0]);
            w.u8(half[1]);
        }
        w.u8(self.latch[0]);
        w.u8(self.latch[1]);
        w.bool(self.horizontal);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.prg_bank = r.u8()?;
        for half in &mut self.chr_banks {
            half[0] = r.u8()?;
            half[1] = r.u8()?;
        }
        for l in &mut self.latch {
            *l = r.u8()?;
            if *l > 1 {
                return Err(StateError::Invalid("MMC2 latch"));
            }
        }
        self.horizontal = r.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    fn setup(mapper_id: u16) -> Mmc2 {
        let mut b = board(128, 128, false, 8);
        b.mapper_id = mapper_id;
        let mut m = Mmc2::new(b);
        m.reset(true);
        m
    }

    #[test]
    fn mmc2_prg_layout() {
        let mut m = setup(9);
        m.cpu_write(0xA000, 2);
        assert_eq!(m.cpu_read(0x8000), Some(4));
        assert_eq!(m.cpu_read(0xA000), Some(26));
        assert_eq!(m.cpu_read(0xE000), Some(30));
    }

    #[test]
    fn mmc4_prg_layout() {
        let mut m = setup(10);
        m.cpu_write(0xA000, 3);
        assert_eq!(m.cpu_read(0x8000), Some(12));
        assert_eq!(m.cpu_read(0xC000), Some(28));
    }

    #[test]
    fn latch_switches_after_fetch() {
        let mut m = setup(9);
        m.cpu_write(0xB000, 1); // FD bank, lower
        m.cpu_write(0xC000, 2); // FE bank, lower
        assert_eq!(m.ppu_read(0x0000), 0x80 | 8, "power-on latch is FE");
        assert_eq!(m.ppu_read(0x0FD8), 0x80 | 11, "fetch itself uses old bank");
        assert_eq!(m.ppu_read(0x0000), 0x80 | 4, "now FD");
        // MMC2 lower half only reacts to the exact address.
        m.ppu_read(0x0FE9);
        assert_eq!(m.ppu_read(0x0000), 0x80 | 4);
        m.ppu_read(0x0FE8);
        assert_eq!(m.ppu_read(0x0000), 0x80 | 8);
    }

    #[test]
    fn mirroring_register() {
        let mut m = setup(9);
        m.cpu_write(0xF000, 1);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
        m.cpu_write(0xF000, 0);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
    }
}
