/*
UxROM (Mapper 2).

- $8000-$BFFF: 16 KiB switchable bank, selected by writes to $8000-$FFFF.
- $C000-$FFFF: fixed to the last 16 KiB bank.
- CHR: 8 KiB, almost always RAM.
- Bus conflicts on the original boards (submapper 2 is conflict-free).
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Uxrom {
    board: Board,
    prg_bank: u8,
}

impl Uxrom {
    pub fn new(board: Board) -> Self {
        Self { board, prg_bank: 0 }
    }
}

impl Mapper for Uxrom {
    fn mapper_id(&self) -> u16 {
        2
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => self.board.read_prg_ram(addr),
            0x8000..=0xBFFF => Some(self.board.read_prg(
                self.prg_bank as usize,
                0x4000,
                addr as usize,
            )),
            0xC000..=0xFFFF => {
                let last = self.board.prg_bank_count(0x4000) - 1;
                Some(self.board.read_prg(last, 0x4000, addr as usize))
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => self.board.write_prg_ram(addr, value),
            0x8000..=0xFFFF => {
                let value = if self.board.submapper == 2 {
                    value
                } else {
                    bus_conflict(self.cpu_read(addr), value)
                };
                self.prg_bank = value;
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.board.read_chr(0, 0x2000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board.write_chr(0, 0x2000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.board.mirroring
    }

    fn reset(&mut self, _hard: bool) {
        self.prg_bank = 0;
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
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.prg_bank = r.u8()?;
        Ok(())
    }
}
