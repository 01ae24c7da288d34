/*
CNROM (Mapper 3).

- PRG: fixed 16 KiB (mirrored) or 32 KiB.
- CHR: 8 KiB banks selected by any write to $8000-$FFFF. The bank number is
  reduced modulo the banks present, which also covers oversized dumps.
- Bus conflicts: the written value is ANDed with the ROM byte at that address
  (submapper 2 boards have none).
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, bus_conflict};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Cnrom {
    board: Board,
    chr_bank: u8,
}

impl Cnrom {
    pub fn new(board: Board) -> Self {
        Self { board, chr_bank: 0 }
    }

    #[cfg(test)]
    pub(crate) fn current_chr_bank(&self) -> u8 {
        self.chr_bank
    }
}

impl Mapper for Cnrom {
    fn mapper_id(&self) -> u16 {
        3
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => self.board.read_prg_ram(addr),
            0x8000..=0xFFFF => Some(self.board.read_prg(0, 0x8000, (addr - 0x8000) as usize)),
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
                self.chr_bank = value % self.board.chr_bank_count(0x2000) as u8;
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.board.read_chr(self.chr_bank as usize, 0x2000, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board
            .write_chr(self.chr_bank as usize, 0x2000, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        self.board.mirroring
    }

    fn reset(&mut self, _hard: bool) {
        self.chr_bank = 0;
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.chr_bank);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.chr_bank = r.u8()?;
        Ok(())
    }
}
