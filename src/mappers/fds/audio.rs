//! Disk-system wavetable sound ($4040-$4092).
//!
//! One 64-step, 6-bit wavetable voice with a volume envelope, pitched by a
//! 12-bit frequency and bent by a modulation unit that walks its own 64-entry
//! table of 3-bit deltas.

use crate::error::StateError;
use crate::state::{StateReader, StateWriter};

/// Master volume divisors for $4089 bits 0-1 (2/2, 2/3, 2/4, 2/5).
const WAVE_VOLUME: [u32; 4] = [36, 24, 17, 14];
/// Modulation table deltas; index 4 resets the counter.
const MOD_DELTA: [i8; 8] = [0, 1, 2, 4, 0, -4, -2, -1];
const MOD_RESET: u8 = 4;
/// Scale to the 2A03 mix: full volume lands near one pulse channel at max.
const FDS_MIX: f32 = 0.0024;

/// Envelope and frequency state shared by the volume and modulation units.
#[derive(Debug, Clone)]
struct Envelope {
    speed: u8,
    gain: u8,
    off: bool,
    increase: bool,
    frequency: u16,
    timer: u32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            speed: 0,
            gain: 0,
            off: true,
            increase: false,
            frequency: 0,
            timer: 0,
        }
    }
}

impl Envelope {
    fn write_control(&mut self, value: u8, master_speed: u8) {
        self.speed = value & 0x3F;
        self.increase = value & 0x40 != 0;
        self.off = value & 0x80 != 0;
        self.reset_timer(master_speed);
        if self.off {
            self.gain = self.speed;
        }
    }

    fn reset_timer(&mut self, master_speed: u8) {
        self.timer = 8 * (self.speed as u32 + 1) * master_speed as u32;
    }

    /// One CPU cycle; true when the gain stepped.
    fn tick(&mut self, master_speed: u8) -> bool {
        if self.off || master_speed == 0 {
            return false;
        }
        self.timer = self.timer.saturating_sub(1);
        if self.timer > 0 {
            return false;
        }
        self.reset_timer(master_speed);
        if self.increase && self.gain < 32 {
            self.gain += 1;
        } else if !self.increase && self.gain > 0 {
            self.gain -= 1;
        }
        true
    }

    fn save(&self, w: &mut StateWriter) {
        w.u8(self.speed);
        w.u8(self.gain);
        w.bool(self.off);
        w.bool(self.increase);
        w.u16(self.frequency);
        w.u32(self.timer);
    }

    fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.speed = r.u8()? & 0x3F;
        self.gain = r.u8()?;
        self.off = r.bool()?;
        self.increase = r.bool()?;
        self.frequency = r.u16()? & 0x0FFF;
        self.timer = r.u32()?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FdsAudio {
    wave: [u8; 64],
    wave_write: bool,
    wave_halt: bool,
    envelopes_disabled: bool,
    wave_pos: u8,
    wave_acc: u16,
    master_volume: u8,
    master_speed: u8,
    volume: Envelope,

    modulator: Envelope,
    mod_table: [u8; 64],
    mod_pos: u8,
    mod_acc: u16,
    mod_halt: bool,
    /// 7-bit signed sweep counter.
    mod_counter: i8,
    mod_output: i32,

    output: u8,
}

impl Default for FdsAudio {
    fn default() -> Self {
        Self {
            wave: [0; 64],
            wave_write: false,
            wave_halt: true,
            envelopes_disabled: false,
            wave_pos: 0,
            wave_acc: 0,
            master_volume: 0,
            master_speed: 0xE8,
            volume: Envelope::default(),
            modulator: Envelope::default(),
            mod_table: [0; 64],
            mod_pos: 0,
            mod_acc: 0,
            mod_halt: true,
            mod_counter: 0,
            mod_output: 0,
            output: 0,
        }
    }
}

impl FdsAudio {
    pub fn read(&self, addr: u16) -> Option<u8> {
        match addr {
            0x4040..=0x407F => Some(self.wave[(addr & 0x3F) as usize] | 0x40),
            0x4090 => Some(self.volume.gain | 0x40),
            0x4092 => Some(self.modulator.gain | 0x40),
            _ => None,
        }
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4040..=0x407F => {
                if self.wave_write {
                    self.wave[(addr & 0x3F) as usize] = value & 0x3F;
                }
            }
            0x4080 => self.volume.write_control(value, self.master_speed),
            0x4082 => self.volume.frequency = (self.volume.frequency & 0x0F00) | value as u16,
            0x4083 => {
                self.volume.frequency =
                    (self.volume.frequency & 0x00FF) | (((value & 0x0F) as u16) << 8);
                self.wave_halt = value & 0x80 != 0;
                self.envelopes_disabled = value & 0x40 != 0;
                if self.wave_halt {
                    self.wave_pos = 0;
                    self.wave_acc = 0;
                }
                if self.envelopes_disabled {
                    self.volume.reset_timer(self.master_speed);
                    self.modulator.reset_timer(self.master_speed);
                }
            }
            0x4084 => self.modulator.write_control(value, self.master_speed),
            0x4085 => {
                self.set_mod_counter((value & 0x7F) as i16);
                self.update_mod_output();
            }
            0x4086 => {
                self.modulator.frequency = (self.modulator.frequency & 0x0F00) | value as u16;
            }
            0x4087 => {
                self.modulator.frequency =
                    (self.modulator.frequency & 0x00FF) | (((value & 0x0F) as u16) << 8);
                self.mod_halt = value & 0x80 != 0;
                if self.mod_halt {
                    self.mod_acc = 0;
                }
            }
            0x4088 => {
                if self.mod_halt {
                    let v = value & 0x07;
                    self.mod_table[self.mod_pos as usize] = v;
                    self.mod_table[((self.mod_pos + 1) & 0x3F) as usize] = v;
                    self.mod_pos = (self.mod_pos + 2) & 0x3F;
                }
            }
            0x4089 => {
                self.master_volume = value & 0x03;
                self.wave_write = value & 0x80 != 0;
            }
            0x408A => self.master_speed = value,
            _ => {}
        }
    }

    fn set_mod_counter(&mut self, value: i16) {
        let mut v = value;
        if v >= 64 {
            v -= 128;
        } else if v < -64 {
            v += 128;
        }
        self.mod_counter = v as i8;
    }

    fn tick_modulator(&mut self) -> bool {
        let freq = self.modulator.frequency;
        if self.mod_halt || freq == 0 {
            return false;
        }
        let (acc, overflow) = self.mod_acc.overflowing_add(freq);
        self.mod_acc = acc;
        if !overflow {
            return false;
        }
        let step = self.mod_table[self.mod_pos as usize];
        if step == MOD_RESET {
            self.set_mod_counter(0);
        } else {
            self.set_mod_counter(self.mod_counter as i16 + MOD_DELTA[step as usize] as i16);
        }
        self.mod_pos = (self.mod_pos + 1) & 0x3F;
        true
    }

    /// Pitch offset from the sweep counter and modulator gain.
    fn update_mod_output(&mut self) {
        let counter = self.mod_counter as i32;
        let mut temp = counter * self.modulator.gain as i32;
        let remainder = temp & 0x0F;
        temp >>= 4;
        if remainder > 0 && temp & 0x80 == 0 {
            temp += if counter < 0 { -1 } else { 2 };
        }
        if temp >= 192 {
            temp -= 256;
        } else if temp < -64 {
            temp += 256;
        }
        temp *= self.volume.frequency as i32;
        let remainder = temp & 0x3F;
        temp >>= 6;
        if remainder >= 32 {
            temp += 1;
        }
        self.mod_output = temp;
    }

    fn update_output(&mut self) {
        let level = (self.volume.gain.min(32) as u32) * WAVE_VOLUME[self.master_volume as usize];
        self.output = ((self.wave[self.wave_pos as usize] as u32 * level) / 1152) as u8;
    }

    /// Advance by one CPU cycle.
    pub fn clock(&mut self) {
        if !self.wave_halt && !self.envelopes_disabled {
            self.volume.tick(self.master_speed);
            if self.modulator.tick(self.master_speed) {
                self.update_mod_output();
            }
        }
        if self.tick_modulator() {
            self.update_mod_output();
        }

        if self.wave_halt {
            self.wave_pos = 0;
            self.update_output();
            return;
        }
        self.update_output();
        let pitch = self.volume.frequency as i32 + self.mod_output;
        if pitch > 0 && !self.wave_write {
            let step = pitch.min(u16::MAX as i32) as u16;
            let (acc, overflow) = self.wave_acc.overflowing_add(step);
            self.wave_acc = acc;
            if overflow {
                self.wave_pos = (self.wave_pos + 1) & 0x3F;
            }
        }
    }

    /// Current level scaled to the console mix.
    pub fn output(&self) -> f32 {
        self.output as f32 * FDS_MIX
    }

    pub fn save(&self, w: &mut StateWriter) {
        w.bytes(&self.wave);
        w.bool(self.wave_write);
        w.bool(self.wave_halt);
        w.bool(self.envelopes_disabled);
        w.u8(self.wave_pos);
        w.u16(self.wave_acc);
        w.u8(self.master_volume);
        w.u8(self.master_speed);
        self.volume.save(w);
        self.modulator.save(w);
        w.bytes(&self.mod_table);
        w.u8(self.mod_pos);
        w.u16(self.mod_acc);
        w.bool(self.mod_halt);
        w.i8(self.mod_counter);
        w.i32(self.mod_output);
        w.u8(self.output);
    }

    pub fn load(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.fill(&mut self.wave)?;
        self.wave_write = r.bool()?;
        self.wave_halt = r.bool()?;
        self.envelopes_disabled = r.bool()?;
        self.wave_pos = r.u8()? & 0x3F;
        self.wave_acc = r.u16()?;
        self.master_volume = r.u8()? & 0x03;
        self.master_speed = r.u8()?;
        self.volume.load(r)?;
        self.modulator.load(r)?;
        r.fill(&mut self.mod_table)?;
        if self.mod_table.iter().any(|&v| v > 7) {
            return Err(StateError::Invalid("FDS modulation table"));
        }
        self.mod_pos = r.u8()? & 0x3F;
        self.mod_acc = r.u16()?;
        self.mod_halt = r.bool()?;
        self.mod_counter = r.i8()?;
        self.mod_output = r.i32()?;
        self.output = r.u8()?;
        Ok(())
    }
}
