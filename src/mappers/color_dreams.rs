/*
Color Dreams (Mapper 11).

One register at $8000-$FFFF: bits 0-1 pick a 32 KiB PRG bank, bits 4-7 an
8 KiB CHR bank. The board has bus conflicts.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct ColorDreams {
    board: Board,
    reg: u8,
}

impl ColorDreams {
    pub fn new(board: Board) -> Self {
        Self { board, reg: 0 }
    }
}

impl Mapper for ColorDreams {
    fn mapper_id(&self) -> u16 {
        11
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x8000..=0xFFFF => Some(self.board.read_prg(
                (self.reg & 0x03) as usize,
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
            .read_chr((self.reg >> 4) as usize, 0x2000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board
            .write_chr((self.reg >> 4) as usize, 0x2000, addr as usize, value);
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
