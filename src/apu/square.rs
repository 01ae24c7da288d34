//! Pulse (square wave) channels at $4000-$4007.

use super::units::{Envelope, LengthCounter, Timer};
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

const DUTY_TABLE: [[u8; 8]; 4] = [
    [0, 1, 0, 0, 0, 0, 0, 0],
    [0, 1, 1, 0, 0, 0, 0, 0],
    [0, 1, 1, 1, 1, 0, 0, 0],
    [1, 0, 0, 1, 1, 1, 1, 1],
];

#[derive(Clone, Debug)]
pub struct SquareChannel {
    /// Pulse 1 negates with ones' complement (subtracts one extra).
    ones_complement: bool,
    duty: u8,
    duty_pos: u8,
    pub(super) envelope: Envelope,
    pub(super) length: LengthCounter,
    timer: Timer,
    /// 11-bit period from $4002/$4003.
    period: u16,

    sweep_enabled: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    sweep_divider: u8,
    sweep_reload: bool,
}

impl SquareChannel {
    pub fn new(ones_complement: bool) -> Self {
        Self {
            ones_complement,
            duty: 0,
            duty_pos: 0,
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            timer: Timer::default(),
            period: 0,
            sweep_enabled: false,
            sweep_period: 0,
            sweep_negate: false,
            sweep_shift: 0,
            sweep_divider: 0,
            sweep_reload: false,
        }
    }

    pub fn set_ctrl(&mut self, value: u8) {
        self.duty = value >> 6;
        self.length.halt = value & 0x20 != 0;
        self.envelope.write(value);
    }

    pub fn set_sweep(&mut self, value: u8) {
        self.sweep_enabled = value & 0x80 != 0;
        self.sweep_period = (value >> 4) & 0x07;
        self.sweep_negate = value & 0x08 != 0;
        self.sweep_shift = value & 0x07;
        self.sweep_reload = true;
    }

    pub fn set_freq_low(&mut self, value: u8) {
        self.set_period((self.period & 0x0700) | value as u16);
    }

    pub fn set_freq_high(&mut self, value: u8) {
        self.set_period((self.period & 0x00FF) | (((value & 0x07) as u16) << 8));
        self.length.load(value >> 3);
        self.duty_pos = 0;
        self.envelope.start = true;
    }

    fn set_period(&mut self, period: u16) {
        self.period = period;
        self.timer.period = period * 2 + 1;
    }

    fn sweep_target(&self) -> u16 {
        let change = self.period >> self.sweep_shift;
        if self.sweep_negate {
            let extra = if self.ones_complement { 1 } else { 0 };
            self.period.saturating_sub(change + extra)
        } else {
            self.period + change
        }
    }

    fn muted(&self) -> bool {
        self.period < 8 || (!self.sweep_negate && self.sweep_target() > 0x7FF)
    }

    pub fn clock_timer(&mut self) {
        if self.timer.clock() {
            self.duty_pos = self.duty_pos.wrapping_sub(1) & 0x07;
        }
    }

    pub fn clock_envelope(&mut self) {
        self.envelope.clock();
    }

    /// Half-frame clock: length counter and sweep unit.
    pub fn clock_length_and_sweep(&mut self) {
        self.length.clock();
        if self.sweep_divider == 0 && self.sweep_enabled && self.sweep_shift > 0 && !self.muted() {
            let target = self.sweep_target();
            self.set_period(target);
        }
        if self.sweep_divider == 0 || self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        } else {
            self.sweep_divider -= 1;
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.length.set_enabled(enabled);
    }

    /// Current 4-bit output.
    pub fn get_output(&self) -> u8 {
        if self.muted() || !self.length.active() || DUTY_TABLE[self.duty as usize][self.duty_pos as usize] == 0 {
            0
        } else {
            self.envelope.volume()
        }
    }
}

impl Stateful for SquareChannel {
    fn save_state(&self, w: &mut StateWriter) {
        w.u8(self.duty);
        w.u8(self.duty_pos);
        self.envelope.save_state(w);
        self.length.save_state(w);
        self.timer.save_state(w);
        w.u16(self.period);
        w.bool(self.sweep_enabled);
        w.u8(self.sweep_period);
        w.bool(self.sweep_negate);
        w.u8(self.sweep_shift);
        w.u8(self.sweep_divider);
        w.bool(self.sweep_reload);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.duty = r.u8()? & 0x03;
        self.duty_pos = r.u8()? & 0x07;
        self.envelope.load_state(r)?;
        self.length.load_state(r)?;
        self.timer.load_state(r)?;
        self.period = r.u16()? & 0x07FF;
        self.sweep_enabled = r.bool()?;
        self.sweep_period = r.u8()? & 0x07;
        self.sweep_negate = r.bool()?;
        self.sweep_shift = r.u8()? & 0x07;
        self.sweep_divider = r.u8()?;
        self.sweep_reload = r.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing(ones_complement: bool) -> SquareChannel {
        let mut sq = SquareChannel::new(ones_complement);
        sq.set_enabled(true);
        sq.set_ctrl(0b1011_1111); // duty 2, halt, constant volume 15
        sq.set_freq_low(0x00);
        sq.set_freq_high(0x01); // period $100
        sq
    }

    #[test]
    fn timer_period_is_doubled() {
        let mut sq = playing(false);
        let mut steps = 0;
        for _ in 0..(0x101 * 2 * 8) {
            let before = sq.duty_pos;
            sq.clock_timer();
            if sq.duty_pos != before {
                steps += 1;
            }
        }
        assert_eq!(steps, 8);
    }

    #[test]
    fn negate_differs_between_channels() {
        let mut one = playing(true);
        let mut two = playing(false);
        for sq in [&mut one, &mut two] {
            sq.set_sweep(0b1000_1001); // enabled, period 0, negate, shift 1
        }
        one.clock_length_and_sweep();
        two.clock_length_and_sweep();
        assert_eq!(one.period, 0x100 - 0x80 - 1);
        assert_eq!(two.period, 0x100 - 0x80);
    }

    #[test]
    fn low_periods_and_overflowing_targets_mute() {
        let mut sq = playing(false);
        sq.set_freq_low(0x07);
        sq.set_freq_high(0x00);
        assert!(sq.muted());
        sq.set_freq_low(0xFF);
        sq.set_freq_high(0x07);
        sq.set_sweep(0x01);
        assert!(sq.muted(), "target beyond $7FF mutes even with sweep disabled");
    }

    #[test]
    fn output_follows_duty_and_volume() {
        let mut sq = playing(false);
        let mut outputs = Vec::new();
        for _ in 0..8 {
            outputs.push(sq.get_output());
            for _ in 0..(0x101 * 2) {
                sq.clock_timer();
            }
        }
        assert_eq!(outputs.iter().filter(|&&v| v == 15).count(), 4);
    }
}
