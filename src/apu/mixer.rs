//! Non-linear channel mixer and the CPU-rate to output-rate resampler.

use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Lookup-table approximation of the 2A03 DAC network.
#[derive(Clone, Debug)]
pub struct Mixer {
    pulse: [f32; 31],
    tnd: [f32; 203],
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        let mut pulse = [0.0; 31];
        for (n, v) in pulse.iter_mut().enumerate().skip(1) {
            *v = 95.52 / (8128.0 / n as f32 + 100.0);
        }
        let mut tnd = [0.0; 203];
        for (n, v) in tnd.iter_mut().enumerate().skip(1) {
            *v = 163.67 / (24329.0 / n as f32 + 100.0);
        }
        Self { pulse, tnd }
    }

    /// Mixed level in roughly 0.0..=1.0.
    #[inline]
    pub fn mix(&self, pulse1: u8, pulse2: u8, triangle: u8, noise: u8, dmc: u8) -> f32 {
        self.pulse[(pulse1 + pulse2) as usize]
            + self.tnd[3 * triangle as usize + 2 * noise as usize + dmc as usize]
    }
}

/// Box-filter decimator driven by an integer phase accumulator, so the
/// number of samples per second is exact over any span of cycles.
#[derive(Clone, Debug)]
pub struct Resampler {
    sample_rate: u64,
    clock_rate: u64,
    phase: u64,
    sum: f32,
    count: u32,
}

impl Resampler {
    pub fn new(sample_rate: u32, clock_rate: u64) -> Self {
        Self {
            sample_rate: sample_rate.max(1) as u64,
            clock_rate: clock_rate.max(1),
            phase: 0,
            sum: 0.0,
            count: 0,
        }
    }

    /// Feed one CPU-cycle level; returns a finished output sample when one is due.
    #[inline]
    pub fn push(&mut self, level: f32) -> Option<i16> {
        self.sum += level;
        self.count += 1;
        self.phase += self.sample_rate;
        if self.phase < self.clock_rate {
            return None;
        }
        self.phase -= self.clock_rate;
        let avg = self.sum / self.count as f32;
        self.sum = 0.0;
        self.count = 0;
        Some((avg * 32767.0).clamp(-32768.0, 32767.0) as i16)
    }
}

impl Stateful for Resampler {
    fn save_state(&self, w: &mut StateWriter) {
        w.u64(self.phase);
        w.u32(self.sum.to_bits());
        w.u32(self.count);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let phase = r.u64()?;
        if phase >= self.clock_rate {
            return Err(StateError::Invalid("resampler phase"));
        }
        self.phase = phase;
        self.sum = f32::from_bits(r.u32()?);
        self.count = r.u32()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_mixes_to_zero_and_full_scale_stays_below_one() {
        let m = Mixer::new();
        assert_eq!(m.mix(0, 0, 0, 0, 0), 0.0);
        let loud = m.mix(15, 15, 15, 15, 127);
        assert!(loud > 0.9 && loud < 1.1, "{loud}");
    }

    #[test]
    fn sample_count_is_exact() {
        let mut r = Resampler::new(44_100, 1_789_772);
        let produced = (0..1_789_772).filter_map(|_| r.push(0.5)).count();
        assert_eq!(produced, 44_100);
    }
}
