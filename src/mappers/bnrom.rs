/*
Mapper 34: BNROM and NINA-001 share the number.

- BNROM (CHR RAM, at most 8 KiB CHR): writes to $8000-$FFFF select a 32 KiB
  PRG bank, with bus conflicts.
- NINA-001 (CHR ROM larger than 8 KiB): registers live in PRG-RAM space.
  $7FFD selects the 32 KiB PRG bank, $7FFE the lower 4 KiB CHR bank and $7FFF
  the upper one. The writes also land in PRG-RAM.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Bnrom {
    board: Board,
    nina: bool,
    prg_bank: u8,
    chr_banks: [u8; 2],
}

impl Bnrom {
    pub fn new(board: Board) -> Self {
        let nina = board.submapper == 1 || (!board.chr_is_ram && board.chr.len() > 0x2000);
        Self {
            board,
            nina,
            prg_bank: 0,
            chr_banks: [0, 1],
        }
    }
}

impl Mapper for Bnrom {
    fn mapper_id(&self) -> u16 {
        34
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => self.board.read_prg_ram(addr),
            0x8000..=0xFFFF => Some(self.board.read_prg(
                self.prg_bank as usize,
                0x8000,
                addr as usize,
            )),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x6000..=0x7FFF => {
                self.board.write_prg_ram(addr, value);
                if self.nina {
                    match addr {
                        0x7FFD => self.prg_bank = value & 0x01,
                        0x7FFE => self.chr_banks[0] = value & 0x0F,
                        0x7FFF => self.chr_banks[1] = value & 0x0F,
                        _ => {}
                    }
                }
            }
            0x8000..=0xFFFF if !self.nina => {
                self.prg_bank = bus_conflict(self.cpu_read(addr), value);
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        if self.nina {
            let half = ((addr >> 12) & 1) as usize;
            self.board
                .read_chr(self.chr_banks[half] as usize, 0x1000, addr as usize)
        } else {
            self.board.read_chr(0, 0x2000, addr as usize)
        }
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        if !self.nina {
            self.board.write_chr(0, 0x2000, addr as usize, value);
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.board.mirroring
    }

    fn reset(&mut self, _hard: bool) {
        self.prg_bank = 0;
        self.chr_banks = [0, 1];
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
        w.u8(self.chr_banks[0]);
        w.u8(self.chr_banks[1]);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.prg_bank = r.u8()?;
        self.chr_banks = [r.u8()?, r.u8()?];
        Ok(())
    }
}
