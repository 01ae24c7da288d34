/*
NROM (Mapper 0).

- PRG: 16 KiB mirrored into both halves of $8000-$FFFF, or 32 KiB direct.
- CHR: 8 KiB ROM or RAM, no banking.
- PRG-RAM at $6000-$7FFF when the header asks for it (Family BASIC).
- Mirroring soldered on the board.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

#[derive(Debug, Clone)]
pub struct Nrom {
    board: Board,
}

impl Nrom {
    pub fn new(board: Board) -> Self {
        Self { board }
    }
}

impl Mapper for Nrom {
    fn mapper_id(&self) -> u16 {
        self.board.mapper_id
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF => self.board.read_prg_ram(addr),
            0x8000..=0xFFFF => Some(self.board.read_prg(0, 0x8000, (addr - 0x8000) as usize)),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            self.board.write_prg_ram(addr, value);
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

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    #[test]
    fn prg_16k_is_mirrored() {
        let mut m = Nrom::new(board(16, 8, false, 0));
        assert_eq!(m.cpu_read(0x8000), Some(0));
        assert_eq!(m.cpu_read(0xC000), Some(0), "upper half mirrors lower");
        assert_eq!(m.cpu_read(0xFFFF), Some(3));
        assert_eq!(m.cpu_read(0x6000), None, "no PRG-RAM means open bus");
    }

    #[test]
    fn prg_32k_is_direct() {
        let mut m = Nrom::new(board(32, 8, false, 0));
        assert_eq!(m.cpu_read(0xC000), Some(4));
        assert_eq!(m.cpu_read(0xFFFF), Some(7));
    }

    #[test]
    fn chr_ram_and_prg_ram_round_trip_through_state() {
        let mut m = Nrom::new(board(32, 8, true, 8));
        m.ppu_write(0x0123, 0x42);
        m.cpu_write(0x6010, 0x99);
        let mut w = StateWriter::new();
        m.save_state(&mut w);
        let bytes = w.into_bytes();

        let mut other = Nrom::new(board(32, 8, true, 8));
        other.load_state(&mut StateReader::new(&bytes)).expect("load");
        assert_eq!(other.ppu_read(0x0123), 0x42);
        assert_eq!(other.cpu_read(0x6010), Some(0x99));
    }
}
