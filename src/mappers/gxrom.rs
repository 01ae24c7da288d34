/*
GxROM / MxROM (Mapper 66).

Register at $8000-$FFFF: bits 4-5 select the 32 KiB PRG bank, bits 0-1 the
8 KiB CHR bank. Bus conflicts apply.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Gxrom {
    board: Board,
    reg: u8,
}

impl Gxrom {
    pub fn new(board: Board) -> Self {
        Self { board, reg: 0 }
    }
}

impl Mapper for Gxrom {
    fn mapper_id(&self) -> u16 {
        66
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.board.read_prg(
                ((self.reg >> 4) & 0x03) as usize,
                0x8000,
                addr as usize,
            )),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            self.reg = bus_conflict(self.cpu_read(addr), value);
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.board
            .read_chr((self.reg & 0x03) as usize, 0x2000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board
            .write_chr((self.reg & 0x03) as usize, 0x2000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.board.mirroring
    }

    fn reset(&mut self, _hard: bool) {
        self.reg = 0;
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.reg);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.reg = r.u8()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    #[test]
    fn register_splits_prg_and_chr() {
        let mut b = board(128, 32, false, 0);
        b.prg_rom.fill(0xFF);
        let mut m = Gxrom::new(b);
        m.cpu_write(0x8000, 0x21);
        assert_eq!(m.reg, 0x21);
        assert_eq!(m.ppu_read(0x0000), 0x80 | 8);
    }

    #[test]
    fn conflict_reads_the_selected_bank() {
        let mut b = board(128, 32, false, 0);
        b.prg_rom.fill(0xFF);
        b.prg_rom[0x10000] = 0x03; // bank 2, offset 0
        let mut m = Gxrom::new(b);
        m.cpu_write(0x8000, 0x20);
        assert_eq!(m.reg, 0x20);
        m.cpu_write(0x8000, 0x11);
        assert_eq!(m.reg, 0x01, "ROM byte 0x03 of bank 2 clears the PRG bits");
    }
}
