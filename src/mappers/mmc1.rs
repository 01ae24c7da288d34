//! MMC1 (Mapper 1).
//!
//! Implements:
//! - Serial 5-bit shift register feeding control / CHR0 / CHR1 / PRG registers
//! - PRG modes: 32K switch, 16K with first bank fixed, 16K with last bank fixed
//! - CHR modes: 8K, or two independent 4K banks
//! - Runtime mirroring including both single-screen arrangements
//! - PRG-RAM enable bit (bit 4 of the PRG register, active low)
//! - SUROM/SXROM 512 KiB PRG: CHR register bit 4 selects the outer 256 KiB
//! - Writes on back-to-back CPU cycles are ignored (only the first of an RMW
//!   instruction's double write reaches the shift register)

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

/// MMC1 register file and serial latch.
#[derive(Debug, Clone)]
pub struct Mmc1 {
    board: Board,

    // 5-bit registers
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,

    // Serial latch
    shift_reg: u8,
    shift_count: u8,

    /// CPU cycles since power; used to reject writes on consecutive cycles.
    cycle: u64,
    last_write_cycle: u64,
}

impl Mmc1 {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
            shift_reg: 0,
            shift_count: 0,
            cycle: 0,
            last_write_cycle: u64::MAX,
        }
    }

    #[inline]
    fn prg_mode(&self) -> u8 {
        (self.control >> 2) & 0x03
    }

    #[inline]
    fn chr_4k_mode(&self) -> bool {
        self.control & 0x10 != 0
    }

    #[inline]
    fn prg_ram_enabled(&self) -> bool {
        self.prg_bank & 0x10 == 0
    }

    /// SUROM outer bank: the 256 KiB half selected through CHR register bit 4.
    #[inline]
    fn outer_prg(&self) -> usize {
        if self.board.prg_rom.len() > 0x40000 {
            ((self.chr_bank0 >> 4) & 1) as usize * 16
        } else {
            0
        }
    }

    /// 16 KiB bank mapped at $8000 (`hi == false`) or $C000.
    fn prg_bank_for(&self, hi: bool) -> usize {
        let outer = self.outer_prg();
        let bank = (self.prg_bank & 0x0F) as usize;
        let last_in_outer = ((self.board.prg_bank_count(0x4000) - 1) & 0x0F).min(15);
        let inner = match (self.prg_mode(), hi) {
            (0 | 1, false) => bank & !1,
            (0 | 1, true) => (bank & !1) | 1,
            (2, false) => 0,
            (2, true) => bank,
            (_, false) => bank,
            (_, true) => last_in_outer,
        };
        outer | inner
    }

    /// 4 KiB CHR bank for pattern table half `half`.
    fn chr_bank_for(&self, half: usize) -> usize {
        if self.chr_4k_mode() {
            if half == 0 {
                self.chr_bank0 as usize
            } else {
                self.chr_bank1 as usize
            }
        } else {
            (self.chr_bank0 as usize & !1) | half
        }
    }

    fn commit_register(&mut self, addr: u16, value5: u8) {
        match addr {
            0x8000..=0x9FFF => self.control = value5,
            0xA000..=0xBFFF => self.chr_bank0 = value5,
            0xC000..=0xDFFF => self.chr_bank1 = value5,
            _ => self.prg_bank = value5,
        }
    }

    fn serial_write(&mut self, addr: u16, data: u8) {
        let consecutive =
            self.last_write_cycle != u64::MAX && self.last_write_cycle + 1 == self.cycle;
        self.last_write_cycle = self.cycle;
        if consecutive {
            return;
        }
        if data & 0x80 != 0 {
            self.shift_reg = 0;
            self.shift_count = 0;
            self.control |= 0x0C;
            return;
        }
        self.shift_reg |= (data & 1) << self.shift_count;
        self.shift_count += 1;
        if self.shift_count == 5 {
            let value5 = self.shift_reg & 0x1F;
            self.commit_register(addr, value5);
            self.shift_reg = 0;
            self.shift_count = 0;
        }
    }
}

impl Mapper for Mmc1 {
    fn mapper_id(&self) -> u16 {
        1
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => self.board.read_prg_ram(addr),
            0x8000..=0xBFFF => {
                Some(self.board.read_prg(self.prg_bank_for(false), 0x4000, addr as usize))
            }
            0xC000..=0xFFFF => {
                Some(self.board.read_prg(self.prg_bank_for(true), 0x4000, addr as usize))
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => self.board.write_prg_ram(addr, value),
            0x8000..=0xFFFF => self.serial_write(addr, value),
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        let half = ((addr >> 12) & 1) as usize;
        self.board
            .read_chr(self.chr_bank_for(half), 0x1000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        let half = ((addr >> 12) & 1) as usize;
        self.board
            .write_chr(self.chr_bank_for(half), 0x1000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        match self.control & 0x03 {
            0 => Mirroring::SingleScreenLower,
            1 => Mirroring::SingleScreenUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self, hard: bool) {
        self.control |= 0x0C;
        self.shift_reg = 0;
        self.shift_count = 0;
        if hard {
            self.control = 0x0C;
            self.chr_bank0 = 0;
            self.chr_bank1 = 0;
            self.prg_bank = 0;
            self.cycle = 0;
            self.last_write_cycle = u64::MAX;
        }
    }

    fn tick(&mut self, cpu_cycles: u32) {
        self.cycle = self.cycle.wrapping_add(cpu_cycles as u64);
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.control);
        w.u8(self.chr_bank0);
        w.u8(self.chr_bank1);
        w.u8(self.prg_bank);
        w.u8(self.shift_reg);
        w.u8(self.shift_count);
        w.u64(self.cycle);
        w.u64(self.last_write_cycle);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.control = r.u8()? & 0x1F;
        self.chr_bank0 = r.u8()? & 0x1F;
        self.chr_bank1 = r.u8()? & 0x1F;
        self.prg_bank = r.u8()? & 0x1F;
        self.shift_reg = r.u8()?;
        self.shift_count = r.u8()?;
        if self.shift_count > 4 {
            return Err(StateError::Invalid("MMC1 shift count"));
        }
        self.cycle = r.u64()?;
        self.last_write_cycle = r.u64()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    /// Feed a 5-bit value into `addr`, one CPU cycle apart plus a gap so no
    /// write counts as consecutive.
    fn write_reg(m: &mut Mmc1, addr: u16, value: u8) {
        for i in 0..5 {
            m.tick(2);
            m.cpu_write(addr, (value >> i) & 1);
        }
    }

    fn setup(prg_kib: usize) -> Mmc1 {
        let mut m = Mmc1::new(board(prg_kib, 8, true, 8));
        m.reset(true);
        m
    }

    #[test]
    fn power_on_fixes_last_bank_high() {
        let mut m = setup(128);
        assert_eq!(m.cpu_read(0x8000), Some(0));
        assert_eq!(m.cpu_read(0xC000), Some(28));
    }

    #[test]
    fn prg_modes() {
        let mut m = setup(128);
        write_reg(&mut m, 0xE000, 3);
        assert_eq!(m.cpu_read(0x8000), Some(12), "mode 3 switches low bank");
        write_reg(&mut m, 0x8000, 0b01000);
        assert_eq!(m.cpu_read(0x8000), Some(0), "mode 2 fixes first bank");
        assert_eq!(m.cpu_read(0xC000), Some(12));
        write_reg(&mut m, 0x8000, 0b00000);
        assert_eq!(m.cpu_read(0x8000), Some(8), "32K mode ignores bit 0");
        assert_eq!(m.cpu_read(0xC000), Some(12));
    }

    #[test]
    fn mirroring_control() {
        let mut m = setup(32);
        write_reg(&mut m, 0x8000, 0x0C);
        assert_eq!(m.mirroring(), Mirroring::SingleScreenLower);
        write_reg(&mut m, 0x8000, 0x0D);
        assert_eq!(m.mirroring(), Mirroring::SingleScreenUpper);
        write_reg(&mut m, 0x8000, 0x0E);
        assert_eq!(m.mirroring(), Mirroring::Vertical);
        write_reg(&mut m, 0x8000, 0x0F);
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn reset_bit_clears_latch_and_sets_mode3() {
        let mut m = setup(128);
        write_reg(&mut m, 0x8000, 0x00);
        m.tick(2);
        m.cpu_write(0x8000, 1);
        m.tick(2);
        m.cpu_write(0x8000, 0x80);
        assert_eq!(m.shift_count, 0);
        assert_eq!(m.prg_mode(), 3);
    }

    #[test]
    fn consecutive_cycle_writes_ignored() {
        let mut m = setup(128);
        m.tick(2);
        m.cpu_write(0xE000, 1);
        m.tick(1);
        m.cpu_write(0xE000, 1);
        assert_eq!(m.shift_count, 1, "second write of an RMW pair is dropped");
    }

    #[test]
    fn prg_ram_disable_bit() {
        let mut m = setup(128);
        m.cpu_write(0x6000, 0x77);
        assert_eq!(m.cpu_read(0x6000), Some(0x77));
        write_reg(&mut m, 0xE000, 0x10);
        assert_eq!(m.cpu_read(0x6000), None);
    }

    #[test]
    fn chr_4k_mode() {
        let mut m = Mmc1::new(board(32, 32, false, 0));
        m.reset(true);
        write_reg(&mut m, 0x8000, 0x1C);
        write_reg(&mut m, 0xA000, 3);
        write_reg(&mut m, 0xC000, 5);
        assert_eq!(m.ppu_read(0x0000), 0x80 | 12);
        assert_eq!(m.ppu_read(0x1000), 0x80 | 20);
    }

    #[test]
    fn surom_outer_bank() {
        let mut m = setup(512);
        write_reg(&mut m, 0xA000, 0x10);
        assert_eq!(m.cpu_read(0x8000), Some(64), "second 256 KiB half");
        assert_eq!(m.cpu_read(0xC000), Some(124));
    }

    #[test]
    fn state_round_trip() {
        let mut m = setup(128);
        write_reg(&mut m, 0xE000, 5);
        m.tick(2);
        m.cpu_write(0x8000, 1);
        let mut w = StateWriter::new();
        m.save_state(&mut w);
        let bytes = w.into_bytes();
        let mut n = setup(128);
        n.load_state(&mut StateReader::new(&bytes)).expect("load");
        assert_eq!(n.cpu_read(0x8000), Some(20));
        assert_eq!(n.shift_count, 1);
    }
}
