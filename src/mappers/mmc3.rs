/*!
MMC3 / TxROM (Mapper 4).

Implemented:
- Bank select ($8000 even) / bank data ($8001 odd)
- PRG modes (bit 6): two switchable 8K banks, fixed second-last, fixed last
- CHR banking (two 2K + four 1K) with A12 inversion (bit 7)
- Mirroring control ($A000 even) unless the board is hard-wired four-screen
- PRG-RAM enable (bit 7) and write protect (bit 6) via $A001
- Scanline IRQ: latch ($C000), reload ($C001), disable+ack ($E000), enable ($E001)

IRQ clocking:
- The counter is clocked by rising edges of PPU A12 seen through
  `notify_ppu_address`. An edge only counts when A12 has been low for at least
  three CPU cycles (the M2 filter on the real chip), so the closely spaced
  sprite pattern fetches on one scanline produce a single clock.
- Clock: if the counter is zero or a reload is pending, it is loaded from the
  latch; otherwise it decrements. Reaching zero with IRQs enabled asserts IRQ.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

const A12_FILTER_CYCLES: u64 = 3;

#[derive(Debug, Clone)]
pub struct Mmc3 {
    board: Board,

    // Bank registers R0..R7
    bank_regs: [u8; 8],
    bank_select: u8,

    mirroring_vertical: bool,
    prg_ram_enabled: bool,
    prg_ram_write_protect: bool,

    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,

    a12_high: bool,
    /// CPU cycle at which A12 last went low.
    a12_low_at: u64,
    cycle: u64,
}

impl Mmc3 {
    pub fn new(board: Board) -> Self {
        let mirroring_vertical = board.mirroring != Mirroring::Horizontal;
        Self {
            board,
            bank_regs: [0, 2, 4, 5, 6, 7, 0, 1],
            bank_select: 0,
            mirroring_vertical,
            prg_ram_enabled: true,
            prg_ram_write_protect: false,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            a12_high: false,
            a12_low_at: 0,
            cycle: 0,
        }
    }

    #[inline]
    fn prg_mode(&self) -> bool {
        self.bank_select & 0x40 != 0
    }

    #[inline]
    fn chr_inverted(&self) -> bool {
        self.bank_select & 0x80 != 0
    }

    /// 8 KiB PRG bank at CPU slot `slot` (0..4 for $8000/$A000/$C000/$E000).
    fn prg_bank(&self, slot: usize) -> usize {
        let count = self.board.prg_bank_count(0x2000);
        let second_last = count.saturating_sub(2);
        match (slot, self.prg_mode()) {
            (0, false) | (2, true) => self.bank_regs[6] as usize,
            (0, true) | (2, false) => second_last,
            (1, _) => self.bank_regs[7] as usize,
            _ => count - 1,
        }
    }

    /// 1 KiB CHR bank for PPU address `addr`.
    fn chr_bank(&self, addr: u16) -> usize {
        let mut slot = ((addr >> 10) & 0x07) as usize;
        if self.chr_inverted() {
            slot ^= 0x04;
        }
        match slot {
            0 => (self.bank_regs[0] & 0xFE) as usize,
            1 => (self.bank_regs[0] | 0x01) as usize,
            2 => (self.bank_regs[1] & 0xFE) as usize,
            3 => (self.bank_regs[1] | 0x01) as usize,
            n => self.bank_regs[n - 2] as usize,
        }
    }

    fn clock_irq_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }

    #[cfg(test)]
    pub(crate) fn irq_counter(&self) -> u8 {
        self.irq_counter
    }
}

impl Mapper for Mmc3 {
    fn mapper_id(&self) -> u16 {
        4
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled => self.board.read_prg_ram(addr),
            0x8000..=0xFFFF => {
                let slot = ((addr - 0x8000) >> 13) as usize;
                Some(self.board.read_prg(self.prg_bank(slot), 0x2000, addr as usize))
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        let even = addr & 1 == 0;
        match addr {
            0x6000..=0x7FFF => {
                if self.prg_ram_enabled && !self.prg_ram_write_protect {
                    self.board.write_prg_ram(addr, value);
                }
            }
            0x8000..=0x9FFF if even => self.bank_select = value,
            0x8000..=0x9FFF => self.bank_regs[(self.bank_select & 0x07) as usize] = value,
            0xA000..=0xBFFF if even => self.mirroring_vertical = value & 1 == 0,
            0xA000..=0xBFFF => {
                self.prg_ram_enabled = value & 0x80 != 0;
                self.prg_ram_write_protect = value & 0x40 != 0;
            }
            0xC000..=0xDFFF if even => self.irq_latch = value,
            0xC000..=0xDFFF => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            0xE000..=0xFFFF if even => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE000..=0xFFFF => self.irq_enabled = true,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.board.read_chr(self.chr_bank(addr), 0x400, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.board
            .write_chr(self.chr_bank(addr), 0x400, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        match self.board.mirroring {
            Mirroring::FourScreen => Mirroring::FourScreen,
            _ if self.mirroring_vertical => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn reset(&mut self, hard: bool) {
        if hard {
            self.bank_regs = [0, 2, 4, 5, 6, 7, 0, 1];
            self.bank_select = 0;
            self.prg_ram_enabled = true;
            self.prg_ram_write_protect = false;
            self.irq_latch = 0;
            self.irq_counter = 0;
            self.cycle = 0;
            self.a12_low_at = 0;
        }
        self.irq_reload = false;
        self.irq_enabled = false;
        self.irq_pending = false;
        self.a12_high = false;
    }

    fn tick(&mut self, cpu_cycles: u32) {
        self.cycle = self.cycle.wrapping_add(cpu_cycles as u64);
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn notify_ppu_address(&mut self, addr: u16) {
        let high = addr & 0x1000 != 0;
        if high && !self.a12_high {
            if self.cycle.wrapping_sub(self.a12_low_at) >= A12_FILTER_CYCLES {
                self.clock_irq_counter();
            }
        } else if !high && self.a12_high {
            self.a12_low_at = self.cycle;
        }
        self.a12_high = high;
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.bytes(&self.bank_regs);
        w.u8(self.bank_select);
        w.bool(self.mirroring_vertical);
        w.bool(self.prg_ram_enabled);
        w.bool(self.prg_ram_write_protect);
        w.u8(self.irq_latch);
        w.u8(self.irq_counter);
        w.bool(self.irq_reload);
        w.bool(self.irq_enabled);
        w.bool(self.irq_pending);
        w.bool(self.a12_high);
        w.u64(self.a12_low_at);
        w.u64(self.cycle);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        r.fill(&mut self.bank_regs)?;
        self.bank_select = r.u8()?;
        self.mirroring_vertical = r.bool()?;
        self.prg_ram_enabled = r.bool()?;
        self.prg_ram_write_protect = r.bool()?;
        self.irq_latch = r.u8()?;
        self.irq_counter = r.u8()?;
        self.irq_reload = r.bool()?;
        self.irq_enabled = r.bool()?;
        self.irq_pending = r.bool()?;
        self.a12_high = r.bool()?;
        self.a12_low_at = r.u64()?;
        self.cycle = r.u64()?;
        Ok(())
    }
}
