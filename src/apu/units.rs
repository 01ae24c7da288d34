//! Building blocks shared by several channels: the length counter, the
//! volume envelope and the divider-style timer.

use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Length counter load values, indexed by bits 3..=7 of the fourth register.
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22, 192, 24, 72,
    26, 16, 28, 32, 30,
];

#[derive(Clone, Debug, Default)]
pub struct LengthCounter {
    pub enabled: bool,
    pub halt: bool,
    pub counter: u8,
}

impl LengthCounter {
    pub fn load(&mut self, index: u8) {
        if self.enabled {
            self.counter = LENGTH_TABLE[(index & 0x1F) as usize];
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.counter = 0;
        }
    }

    /// Half-frame clock.
    pub fn clock(&mut self) {
        if self.counter > 0 && !self.halt {
            self.counter -= 1;
        }
    }

    #[inline]
    pub fn active(&self) -> bool {
        self.counter > 0
    }
}

impl Stateful for LengthCounter {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.enabled);
        w.bool(self.halt);
        w.u8(self.counter);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.enabled = r.bool()?;
        self.halt = r.bool()?;
        self.counter = r.u8()?;
        Ok(())
    }
}

/// Decaying volume envelope (pulse and noise).
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    pub start: bool,
    pub looping: bool,
    pub constant: bool,
    /// Divider period, or the fixed volume when `constant`.
    pub period: u8,
    divider: u8,
    decay: u8,
}

impl Envelope {
    /// Bits 0..=5 of the channel's first register.
    pub fn write(&mut self, value: u8) {
        self.looping = value & 0x20 != 0;
        self.constant = value & 0x10 != 0;
        self.period = value & 0x0F;
    }

    /// Quarter-frame clock.
    pub fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.period;
        } else if self.divider == 0 {
            self.divider = self.period;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        } else {
            self.divider -= 1;
        }
    }

    #[inline]
    pub fn volume(&self) -> u8 {
        if self.constant { self.period } else { self.decay }
    }
}

impl Stateful for Envelope {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.start);
        w.bool(self.looping);
        w.bool(self.constant);
        w.u8(self.period);
        w.u8(self.divider);
        w.u8(self.decay);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.start = r.bool()?;
        self.looping = r.bool()?;
        self.constant = r.bool()?;
        self.period = r.u8()? & 0x0F;
        self.divider = r.u8()?;
        self.decay = r.u8()? & 0x0F;
        Ok(())
    }
}

/// Down-counter clocked once per CPU cycle; fires when it wraps past zero.
#[derive(Clone, Debug, Default)]
pub struct Timer {
    pub period: u16,
    counter: u16,
}

impl Timer {
    pub fn new(period: u16) -> Self {
        Self { period, counter: 0 }
    }

    /// Returns true when the counter reloads (the channel steps).
    #[inline]
    pub fn clock(&mut self) -> bool {
        if self.counter == 0 {
            self.counter = self.period;
            true
        } else {
            self.counter -= 1;
            false
        }
    }

    pub fn restart(&mut self) {
        self.counter = self.period;
    }
}

impl Stateful for Timer {
    fn save_state(&self, w: &mut StateWriter) {
        w.u16(self.period);
        w.u16(self.counter);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.period = r.u16()?;
        self.counter = r.u16()?;
        Ok(())
    }
}
