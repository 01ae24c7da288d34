/*
Camerica / Codemasters (Mapper 71).

- $C000-$FFFF write: 16 KiB PRG bank at $8000; the last bank is fixed at
  $C000. No bus conflicts.
- $8000-$9FFF write (Fire Hawk, submapper 1): bit 4 picks the single-screen
  nametable.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Camerica {
    board: Board,
    prg_bank: u8,
    single_screen: Option<Mirroring>,
}

impl Camerica {
    pub fn new(board: Board) -> Self {
        Self {
            board,
            prg_bank: 0,
            single_screen: None,
        }
    }
}

impl Mapper for Camerica {
    fn mapper_id(&self) -> u16 {
        71
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
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
            0x8000..=0x9FFF if self.board.submapper == 1 => {
                self.single_screen = Some(if value & 0x10 != 0 {
                    Mirroring::SingleScreenUpper
                } else {
                    Mirroring::SingleScreenLower
                });
            }
            0xC000..=0xFFFF => self.prg_bank = value,
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
        self.single_screen.unwrap_or(self.board.mirroring)
    }

    fn reset(&mut self, _hard: bool) {
        self.prg_bank = 0;
        self.single_screen = None;
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.prg_bank);
        w.u8(self.single_screen.map_or(0xFF, Mirroring::to_u8));
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.prg_bank = r.u8()?;
        self.single_screen = match r.u8()? {
            0xFF => None,
            v => Some(Mirroring::from_u8(v)?),
        };
        Ok(())
    }
}
