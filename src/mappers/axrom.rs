/*
AxROM (Mapper 7).

Writes to $8000-$FFFF select a 32 KiB PRG bank (bits 0-2) and which
single-screen nametable is shown (bit 4). CHR is 8 KiB RAM.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Axrom {
    board: Board,
    reg: u8,
}

impl Axrom {
    pub fn new(board: Board) -> Self {
        Self { board, reg: 0 }
    }
}

impl Mapper for Axrom {
    fn mapper_id(&self) -> u16 {
        7
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.board.read_prg(
                (self.reg & 0x07) as usize,
                0x8000,
                addr as usize,
            )),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if addr >= 0x8000 {
            // AMROM (submapper 2) has conflicts; ANROM/AOROM do not.
            self.reg = if self.board.submapper == 2 {
                bus_conflict(self.cpu_read(addr), value)
            } else {
                value
            };
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.board.read_chr(0, 0x2000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board.write_chr(0, 0x2000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        if self.reg & 0x10 != 0 {
            Mirroring::SingleScreenUpper
        } else {
            Mirroring::SingleScreenLower
        }
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
    fn bank_and_single_screen_select() {
        let mut m = Axrom::new(board(256, 8, true, 0));
        assert_eq!(m.mirroring(), Mirroring::SingleScreenLower);
        m.cpu_write(0x8000, 0x12);
        assert_eq!(m.cpu_read(0x8000), Some(16));
        assert_eq!(m.mirroring(), Mirroring::SingleScreenUpper);
    }
}
