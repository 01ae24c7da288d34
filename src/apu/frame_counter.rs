//! Frame sequencer ($4017): quarter/half-frame clocks and the frame IRQ.

use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Step cycle positions, counted in CPU cycles from the sequencer restart.
const NTSC_STEPS: [[u32; 6]; 2] = [
    [7457, 14913, 22371, 29828, 29829, 29830],
    [7457, 14913, 22371, 29829, 37281, 37282],
];
const PAL_STEPS: [[u32; 6]; 2] = [
    [8313, 16627, 24939, 33252, 33253, 33254],
    [8313, 16627, 24939, 33253, 41565, 41566],
];

/// Which units the sequencer clocked this cycle.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameClock {
    pub quarter: bool,
    pub half: bool,
}

#[derive(Clone, Debug)]
pub struct FrameCounter {
    pal: bool,
    pub five_step: bool,
    pub irq_inhibit: bool,
    pub irq_flag: bool,
    cycle: u32,
    step: usize,
    /// Value written to $4017 that takes effect after `write_delay` cycles.
    pending: Option<u8>,
    write_delay: u8,
}

impl FrameCounter {
    pub fn new(pal: bool) -> Self {
        Self {
            pal,
            five_step: false,
            irq_inhibit: false,
            irq_flag: false,
            cycle: 0,
            step: 0,
            pending: None,
            write_delay: 0,
        }
    }

    /// $4017 write. The mode change lands 3 or 4 cycles later depending on
    /// the CPU cycle parity; IRQ inhibit is immediate.
    pub fn write(&mut self, value: u8, odd_cycle: bool) {
        self.irq_inhibit = value & 0x40 != 0;
        if self.irq_inhibit {
            self.irq_flag = false;
        }
        self.pending = Some(value);
        self.write_delay = if odd_cycle { 4 } else { 3 };
    }

    pub fn clock(&mut self) -> FrameClock {
        let mut out = FrameClock::default();
        self.cycle += 1;

        let table = if self.pal { &PAL_STEPS } else { &NTSC_STEPS };
        if self.cycle == table[self.five_step as usize][self.step] {
            match (self.five_step, self.step) {
                (_, 0) | (_, 2) => out.quarter = true,
                (_, 1) => out = FrameClock { quarter: true, half: true },
                (false, 3) | (false, 5) => self.raise_irq(),
                (false, 4) => {
                    out = FrameClock { quarter: true, half: true };
                    self.raise_irq();
                }
                (true, 4) => out = FrameClock { quarter: true, half: true },
                _ => {}
            }
            self.step += 1;
            if self.step == 6 {
                self.step = 0;
                self.cycle = 0;
            }
        }

        if self.pending.is_some() {
            self.write_delay = self.write_delay.saturating_sub(1);
            if self.write_delay == 0
                && let Some(value) = self.pending.take()
            {
                self.five_step = value & 0x80 != 0;
                self.cycle = 0;
                self.step = 0;
                if self.five_step {
                    out = FrameClock { quarter: true, half: true };
                }
            }
        }
        out
    }

    fn raise_irq(&mut self) {
        if !self.irq_inhibit {
            self.irq_flag = true;
        }
    }
}

impl Stateful for FrameCounter {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.five_step);
        w.bool(self.irq_inhibit);
        w.bool(self.irq_flag);
        w.u32(self.cycle);
        w.u8(self.step as u8);
        w.bool(self.pending.is_some());
        w.u8(self.pending.unwrap_or(0));
        w.u8(self.write_delay);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.five_step = r.bool()?;
        self.irq_inhibit = r.bool()?;
        self.irq_flag = r.bool()?;
        self.cycle = r.u32()?;
        let step = r.u8()? as usize;
        if step >= 6 {
            return Err(StateError::Invalid("frame counter step"));
        }
        self.step = step;
        let has_pending = r.bool()?;
        let value = r.u8()?;
        self.pending = has_pending.then_some(value);
        self.write_delay = r.u8()?;
        Ok(())
    }
}
