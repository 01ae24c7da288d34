/*!
Konami VRC6 (Mapper 24 = VRC6a, Mapper 26 = VRC6b with A0/A1 swapped).

Banking:
- $8000-$8003: 16 KiB PRG bank at $8000
- $C000-$C003: 8 KiB PRG bank at $C000; $E000 is fixed to the last 8 KiB
- $D000-$E003: eight 1 KiB CHR banks
- $B003: bits 2-3 mirroring, bit 7 PRG-RAM enable

IRQ ($F000 latch, $F001 control, $F002 acknowledge):
- Scanline mode divides CPU cycles by 113.667 using a prescaler that starts at
  341 and drops by 3 per cycle; cycle mode clocks the counter every cycle.
- The 8-bit counter counts up and reloads from the latch on overflow, which
  raises IRQ.

Expansion audio: two pulse channels ($9000-$9002, $A000-$A002) and a sawtooth
($B000-$B002). $9003 halts all channels or speeds up their dividers by 16 or
256.
*/

use crate::error::StateError;
use crate::mapper::{Board, Mapper, Mirroring, warn_unhandled};
use crate::state::{StateReader, StateWriter};

/// Output scale so one VRC6 pulse step is about as loud as one 2A03 pulse step.
const VRC6_MIX: f32 = 0.0099;

#[derive(Debug, Clone, Default)]
struct Vrc6Pulse {
    volume: u8,
    duty: u8,
    ignore_duty: bool,
    period: u16,
    enabled: bool,
    timer: u16,
    step: u8,
}

impl Vrc6Pulse {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => {
                self.volume = value & 0x0F;
                self.duty = (value >> 4) & 0x07;
                self.ignore_duty = value & 0x80 != 0;
            }
            1 => self.period = (self.period & 0x0F00) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | (((value & 0x0F) as u16) << 8);
                self.enabled = value & 0x80 != 0;
                if !self.enabled {
                    self.step = 0;
                }
            }
        }
    }

    fn clock(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.timer == 0 {
            self.timer = self.period >> shift;
            self.step = (self.step + 1) & 0x0F;
        } else {
            self.timer -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.enabled && (self.ignore_duty || self.step <= self.duty) {
            self.volume
        } else {
            0
        }
    }

    fn save(&self, w: &mut StateWriter) {
        w.u8(self.volume);
        w.u8(self.duty);
        w.bool(self.ignore_duty);
        w.u16(self.period);
        w.bool(self.enabled);
        w.u16(self.timer);
        w.u8(self.step);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.volume = r.u8()? & 0x0F;
        self.duty = r.u8()? & 0x07;
        self.ignore_duty = r.bool()?;
        self.period = r.u16()? & 0x0FFF;
        self.enabled = r.bool()?;
        self.timer = r.u16()?;
        self.step = r.u8()? & 0x0F;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Vrc6Saw {
    rate: u8,
    period: u16,
    enabled: bool,
    timer: u16,
    step: u8,
    accumulator: u8,
}

impl Vrc6Saw {
    fn write(&mut self, reg: u16, value: u8) {
        match reg {
            0 => self.rate = value & 0x3F,
            1 => self.period = (self.period & 0x0F00) | value as u16,
            _ => {
                self.period = (self.period & 0x00FF) | (((value & 0x0F) as u16) << 8);
                self.enabled = value & 0x80 != 0;
                if !self.enabled {
                    self.accumulator = 0;
                    self.step = 0;
                }
            }
        }
    }

    fn clock(&mut self, shift: u8) {
        if !self.enabled {
            return;
        }
        if self.timer == 0 {
            self.timer = self.period >> shift;
            self.step += 1;
            if self.step == 14 {
                self.step = 0;
                self.accumulator = 0;
            } else if self.step & 1 == 0 {
                self.accumulator = self.accumulator.wrapping_add(self.rate);
            }
        } else {
            self.timer -= 1;
        }
    }

    fn output(&self) -> u8 {
        if self.enabled { self.accumulator >> 3 } else { 0 }
    }

    fn save(&self, w: &mut StateWriter) {
        w.u8(self.rate);
        w.u16(self.period);
        w.bool(self.enabled);
        w.u16(self.timer);
        w.u8(self.step);
        w.u8(self.accumulator);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.rate = r.u8()? & 0x3F;
        self.period = r.u16()? & 0x0FFF;
        self.enabled = r.bool()?;
        self.timer = r.u16()?;
        self.step = r.u8()?;
        if self.step >= 14 {
            return Err(StateError::Invalid("VRC6 saw step"));
        }
        self.accumulator = r.u8()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Vrc6 {
    board: Board,
    swap_lines: bool,

    prg_16k: u8,
    prg_8k: u8,
    chr_banks: [u8; 8],
    control: u8,

    irq_latch: u8,
    irq_counter: u8,
    irq_prescaler: i16,
    irq_enabled: bool,
    irq_enable_after_ack: bool,
    irq_cycle_mode: bool,
    irq_pending: bool,

    pulses: [Vrc6Pulse; 2],
    saw: Vrc6Saw,
    audio_halt: bool,
    freq_shift: u8,

    warned_banking_mode: bool,
}

impl Vrc6 {
    pub fn new(board: Board) -> Self {
        let swap_lines = board.mapper_id == 26;
        Self {
            board,
            swap_lines,
            prg_16k: 0,
            prg_8k: 0,
            chr_banks: [0; 8],
            control: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_prescaler: 341,
            irq_enabled: false,
            irq_enable_after_ack: false,
            irq_cycle_mode: false,
            irq_pending: false,
            pulses: [Vrc6Pulse::default(), Vrc6Pulse::default()],
            saw: Vrc6Saw::default(),
            audio_halt: false,
            freq_shift: 0,
            warned_banking_mode: false,
        }
    }

    /// Register address with VRC6b line swap undone: `$x000..=$x003`.
    #[inline]
    fn decode(&self, addr: u16) -> u16 {
        let base = addr & 0xF000;
        let mut low = addr & 0x0003;
        if self.swap_lines {
            low = ((low & 1) << 1) | ((low >> 1) & 1);
        }
        base | low
    }

    #[inline]
    fn prg_ram_enabled(&self) -> bool {
        self.control & 0x80 != 0
    }

    fn clock_irq_counter(&mut self) {
        if self.irq_counter == 0xFF {
            self.irq_counter = self.irq_latch;
            self.irq_pending = true;
        } else {
            self.irq_counter += 1;
        }
    }
}

impl Mapper for Vrc6 {
    fn mapper_id(&self) -> u16 {
        if self.swap_lines { 26 } else { 24 }
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x6000..=0x7FFF if self.prg_ram_enabled() => self.board.read_prg_ram(addr),
            0x8000..=0xBFFF => Some(self.board.read_prg(
                self.prg_16k as usize,
                0x4000,
                addr as usize,
            )),
            0xC000..=0xDFFF => Some(self.board.read_prg(
                self.prg_8k as usize,
                0x2000,
                addr as usize,
            )),
            0xE000..=0xFFFF => {
                let last = self.board.prg_bank_count(0x2000) - 1;
                Some(self.board.read_prg(last, 0x2000, addr as usize))
            }
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        if (0x6000..=0x7FFF).contains(&addr) {
            if self.prg_ram_enabled() {
                self.board.write_prg_ram(addr, value);
            }
            return;
        }
        let reg = self.decode(addr);
        match reg {
            0x8000..=0x8003 => self.prg_16k = value & 0x0F,
            0x9000..=0x9002 => self.pulses[0].write(reg & 3, value),
            0x9003 => {
                self.audio_halt = value & 0x01 != 0;
                self.freq_shift = if value & 0x04 != 0 {
                    8
                } else if value & 0x02 != 0 {
                    4
                } else {
                    0
                };
            }
            0xA000..=0xA002 => self.pulses[1].write(reg & 3, value),
            0xB000..=0xB002 => self.saw.write(reg & 3, value),
            0xB003 => {
                // Only 1 KiB CHR banking with CIRAM nametables is wired up.
                if value & 0x13 != 0 {
                    warn_unhandled(
                        &mut self.warned_banking_mode,
                        self.board.mapper_id,
                        "VRC6 PPU banking mode other than 0",
                    );
                }
                self.control = value;
            }
            0xC000..=0xC003 => self.prg_8k = value & 0x1F,
            0xD000..=0xD003 => self.chr_banks[(reg & 3) as usize] = value,
            0xE000..=0xE003 => self.chr_banks[4 + (reg & 3) as usize] = value,
            0xF000 => self.irq_latch = value,
            0xF001 => {
                self.irq_enable_after_ack = value & 0x01 != 0;
                self.irq_enabled = value & 0x02 != 0;
                self.irq_cycle_mode = value & 0x04 != 0;
                if self.irq_enabled {
                    self.irq_counter = self.irq_latch;
                    self.irq_prescaler = 341;
                }
                self.irq_pending = false;
            }
            0xF002 => {
                self.irq_pending = false;
                self.irq_enabled = self.irq_enable_after_ack;
            }
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        let bank = self.chr_banks[((addr >> 10) & 7) as usize] as usize;
        self.board.read_chr(bank, 0x400, addr as usize)
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        let bank = self.chr_banks[((addr >> 10) & 7) as usize] as usize;
        self.board.write_chr(bank, 0x400, addr as usize, value);
    }

    fn mirroring(&self) -> Mirroring {
        match (self.control >> 2) & 0x03 {
            0 => Mirroring::Vertical,
            1 => Mirroring::Horizontal,
            2 => Mirroring::SingleScreenLower,
            _ => Mirroring::SingleScreenUpper,
        }
    }

    fn reset(&mut self, hard: bool) {
        self.irq_enabled = false;
        self.irq_pending = false;
        if hard {
            let board = self.board.clone();
            *self = Self::new(board);
        }
    }

    fn tick(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            if self.irq_enabled {
                if self.irq_cycle_mode {
                    self.clock_irq_counter();
                } else {
                    self.irq_prescaler -= 3;
                    if self.irq_prescaler <= 0 {
                        self.irq_prescaler += 341;
                        self.clock_irq_counter();
                    }
                }
            }
            if !self.audio_halt {
                self.pulses[0].clock(self.freq_shift);
                self.pulses[1].clock(self.freq_shift);
                self.saw.clock(self.freq_shift);
            }
        }
    }

    fn irq_pending(&self) -> bool {
        self.irq_pending
    }

    fn expansion_audio(&self) -> f32 {
        let sum = self.pulses[0].output() as u16
            + self.pulses[1].output() as u16
            + self.saw.output() as u16;
        sum as f32 * VRC6_MIX
    }

    fn battery_ram(&self) -> Option<&[u8]> {
        self.board.battery_ram()
    }

    fn battery_ram_mut(&mut self) -> Option<&mut [u8]> {
        self.board.battery_ram_mut()
    }

    fn save_state(&self, w: &mut StateWriter) {
        self.board.save_state(w);
        w.u8(self.prg_16k);
        w.u8(self.prg_8k);
        w.bytes(&self.chr_banks);
        w.u8(self.control);
        w.u8(self.irq_latch);
        w.u8(self.irq_counter);
        w.u16(self.irq_prescaler as u16);
        w.bool(self.irq_enabled);
        w.bool(self.irq_enable_after_ack);
        w.bool(self.irq_cycle_mode);
        w.bool(self.irq_pending);
        self.pulses[0].save(w);
        self.pulses[1].save(w);
        self.saw.save(w);
        w.bool(self.audio_halt);
        w.u8(self.freq_shift);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.board.load_state(r)?;
        self.prg_16k = r.u8()?;
        self.prg_8k = r.u8()?;
        r.fill(&mut self.chr_banks)?;
        self.control = r.u8()?;
        self.irq_latch = r.u8()?;
        self.irq_counter = r.u8()?;
        self.irq_prescaler = r.u16()? as i16;
        if !(-2..=341).contains(&self.irq_prescaler) {
            return Err(StateError::Invalid("VRC6 prescaler"));
        }
        self.irq_enabled = r.bool()?;
        self.irq_enable_after_ack = r.bool()?;
        self.irq_cycle_mode = r.bool()?;
        self.irq_pending = r.bool()?;
        self.pulses[0].load(r)?;
        self.pulses[1].load(r)?;
        self.saw.load(r)?;
        self.audio_halt = r.bool()?;
        self.freq_shift = r.u8()?;
        if !matches!(self.freq_shift, 0 | 4 | 8) {
            return Err(StateError::Invalid("VRC6 frequency shift"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    fn setup(mapper_id: u16) -> Vrc6 {
        let mut b = board(256, 128, false, 8);
        b.mapper_id = mapper_id;
        let mut m = Vrc6::new(b);
        m.reset(true);
        m
    }

    #[test]
    fn prg_banking() {
        let mut m = setup(24);
        m.cpu_write(0x8000, 3);
        m.cpu_write(0xC000, 5);
        assert_eq!(m.cpu_read(0x8000), Some(12));
        assert_eq!(m.cpu_read(0xC000), Some(10));
        assert_eq!(m.cpu_read(0xE000), Some(62));
    }

    #[test]
    fn vrc6b_swaps_address_lines() {
        let mut a = setup(24);
        let mut b = setup(26);
        a.cpu_write(0xD001, 9);
        b.cpu_write(0xD002, 9);
        assert_eq!(a.ppu_read(0x0400), 0x80 | 9);
        assert_eq!(b.ppu_read(0x0400), 0x80 | 9);
    }

    #[test]
    fn prg_ram_gated_by_b003() {
        let mut m = setup(24);
        assert_eq!(m.cpu_read(0x6000), None);
        m.cpu_write(0xB003, 0x84);
        m.cpu_write(0x6000, 0x33);
        assert_eq!(m.cpu_read(0x6000), Some(0x33));
        assert_eq!(m.mirroring(), Mirroring::Horizontal);
    }

    #[test]
    fn cycle_mode_irq() {
        let mut m = setup(24);
        m.cpu_write(0xF000, 0xFD);
        m.cpu_write(0xF001, 0x06);
        m.tick(2);
        assert!(!m.irq_pending());
        m.tick(1);
        assert!(m.irq_pending(), "counter overflowed after three clocks");
        m.cpu_write(0xF002, 0);
        assert!(!m.irq_pending());
        assert!(!m.irq_enabled, "acknowledge copies the enable-after-ack bit");
    }

    #[test]
    fn scanline_mode_prescaler() {
        let mut m = setup(24);
        m.cpu_write(0xF000, 0xFF);
        m.cpu_write(0xF001, 0x02);
        m.tick(113);
        assert!(!m.irq_pending());
        m.tick(1);
        assert!(m.irq_pending(), "one scanline is about 114 CPU cycles");
    }

    #[test]
    fn pulse_audio_produces_output() {
        let mut m = setup(24);
        m.cpu_write(0x9000, 0x8F); // constant volume 15
        m.cpu_write(0x9001, 0x10);
        m.cpu_write(0x9002, 0x80);
        m.tick(1);
        assert!(m.expansion_audio() > 0.0);
        m.cpu_write(0x9003, 0x01);
        let held = m.expansion_audio();
        m.tick(1000);
        assert_eq!(m.expansion_audio(), held, "halt freezes the channels");
    }
}
