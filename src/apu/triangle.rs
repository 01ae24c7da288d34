//! Triangle channel at $4008-$400B.

use super::units::{LengthCounter, Timer};
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

const SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15,
];

#[derive(Clone, Debug, Default)]
pub struct TriangleChannel {
    pub(super) length: LengthCounter,
    timer: Timer,
    step: u8,
    /// Control flag: halts the length counter and keeps reloading the linear counter.
    control: bool,
    linear_reload_value: u8,
    linear_counter: u8,
    linear_reload: bool,
}

impl TriangleChannel {
    pub fn set_ctrl(&mut self, value: u8) {
        self.control = value & 0x80 != 0;
        self.length.halt = self.control;
        self.linear_reload_value = value & 0x7F;
    }

    pub fn set_freq_low(&mut self, value: u8) {
        self.timer.period = (self.timer.period & 0x0700) | value as u16;
    }

    pub fn set_freq_high(&mut self, value: u8) {
        self.timer.period = (self.timer.period & 0x00FF) | (((value & 0x07) as u16) << 8);
        self.length.load(value >> 3);
        self.linear_reload = true;
    }

    /// Clocked every CPU cycle; the sequencer only moves while both counters are non-zero.
    pub fn clock_timer(&mut self) {
        if self.timer.clock() && self.length.active() && self.linear_counter > 0 {
            self.step = (self.step + 1) & 0x1F;
        }
    }

    /// Quarter-frame clock.
    pub fn clock_linear(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_reload_value;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub fn clock_length(&mut self) {
        self.length.clock();
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    /// The triangle keeps outputting its last step when halted, so it never clicks.
    pub fn get_output(&self) -> u8 {
        SEQUENCE[self.step as usize]
    }
}

impl Stateful for TriangleChannel {
    fn save_state(&self, w: &mut StateWriter) {
        self.length.save_state(w);
        self.timer.save_state(w);
        w.u8(self.step);
        w.bool(self.control);
        w.u8(self.linear_reload_value);
        w.u8(self.linear_counter);
        w.bool(self.linear_reload);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.length.load_state(r)?;
        self.timer.load_state(r)?;
        self.step = r.u8()? & 0x1F;
        self.control = r.bool()?;
        self.linear_reload_value = r.u8()? & 0x7F;
        self.linear_counter = r.u8()? & 0x7F;
        self.linear_reload = r.bool()?;
        Ok(())
    }
}
