//! Noise channel at $400C-$400F.

use super::units::{Envelope, LengthCounter, Timer};
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Timer periods in CPU cycles.
const NTSC_PERIODS: [u16; 16] = [4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068];
const PAL_PERIODS: [u16; 16] = [4, 8, 14, 30, 60, 88, 118, 148, 188, 236, 354, 472, 708, 944, 1890, 3778];

#[derive(Clone, Debug)]
pub struct NoiseChannel {
    pal: bool,
    pub(super) envelope: Envelope,
    pub(super) length: LengthCounter,
    timer: Timer,
    /// Short mode: feedback from bit 6 instead of bit 1.
    mode: bool,
    shift: u16,
}

impl NoiseChannel {
    pub fn new(pal: bool) -> Self {
        Self {
            pal,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            timer: Timer::new(NTSC_PERIODS[0] - 1),
            mode: false,
            shift: 1,
        }
    }

    pub fn set_ctrl(&mut self, value: u8) {
        self.length.halt = value & 0x20 != 0;
        self.envelope.write(value);
    }

    pub fn set_freq(&mut self, value: u8) {
        self.mode = value & 0x80 != 0;
        let table = if self.pal { &PAL_PERIODS } else { &NTSC_PERIODS };
        self.timer.period = table[(value & 0x0F) as usize] - 1;
    }

    pub fn set_length(&mut self, value: u8) {
        self.length.load(value >> 3);
        self.envelope.start = true;
    }

    pub fn clock_timer(&mut self) {
        if self.timer.clock() {
            let tap = if self.mode { 6 } else { 1 };
            let feedback = (self.shift ^ (self.shift >> tap)) & 1;
            self.shift = (self.shift >> 1) | (feedback << 14);
        }
    }

    pub fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    pub fn clock_length(&mut self) {
        self.length.clock();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    pub fn get_output(&self) -> u8 {
        if self.shift & 1 != 0 || !self.length.active() {
            0
        } else {
            self.envelope.volume()
        }
    }
}

impl Stateful for NoiseChannel {
    fn save_state(&self, w: &mut StateWriter) {
        self.envelope.save_state(w);
        self.length.save_state(w);
        self.timer.save_state(w);
        w.bool(self.mode);
        w.u16(self.shift);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.envelope.load_state(r)?;
        self.length.load_state(r)?;
        self.timer.load_state(r)?;
        self.mode = r.bool()?;
        self.shift = r.u16()? & 0x7FFF;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn period_of(noise: &mut NoiseChannel) -> usize {
        let start = noise.shift;
        let mut n = 0;
        loop {
            for _ in 0..=noise.timer.period {
                noise.clock_timer();
            }
            n += 1;
            if noise.shift == start {
                return n;
            }
        }
    }

    #[test]
    fn long_and_short_sequences() {
        let mut noise = NoiseChannel::new(false);
        assert_eq!(period_of(&mut noise), 32767);
        noise.set_freq(0x80);
        assert_eq!(period_of(&mut noise), 93);
    }

    #[test]
    fn pal_uses_its_own_period_table() {
        let mut noise = NoiseChannel::new(true);
        noise.set_freq(0x02);
        assert_eq!(noise.timer.period, 13);
    }
}
