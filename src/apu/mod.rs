/*!
2A03 audio processing unit.

Scope:
- Two pulse channels, triangle, noise and DMC with their register files at
  $4000..=$4013, the status register $4015 and the frame counter $4017.
- Every channel timer is clocked once per CPU cycle (`tick`); the frame
  counter supplies quarter- and half-frame clocks.
- Output is mixed through the non-linear DAC tables, the mapper's expansion
  audio is added, and the result is resampled to mono `i16` at the configured
  output rate.

DMC DMA:
- The DMC never reads memory itself. `take_dmc_request` yields the address the
  sample reader needs; the bus performs the stall-accounted DMA and returns
  the byte through `dmc_fill`.

Status semantics ($4015 read):
    bit 0..3: length counter > 0 for pulse 1, pulse 2, triangle, noise
    bit 4:    DMC bytes remaining > 0
    bit 6:    frame interrupt flag (cleared by the read)
    bit 7:    DMC interrupt flag
*/

pub mod dmc;
pub mod frame_counter;
pub mod mixer;
pub mod noise;
pub mod square;
pub mod triangle;
pub mod units;

use crate::config::Region;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

use dmc::DmcChannel;
use frame_counter::FrameCounter;
use mixer::{Mixer, Resampler};
use noise::NoiseChannel;
use square::SquareChannel;
use triangle::TriangleChannel;

#[derive(Clone, Debug)]
pub struct Apu {
    region: Region,
    square1: SquareChannel,
    square2: SquareChannel,
    triangle: TriangleChannel,
    noise: NoiseChannel,
    dmc: DmcChannel,
    frame_counter: FrameCounter,
    /// CPU cycles since power-on; parity drives the $4017 write delay.
    cycle: u64,
    last_frame_counter_write: u8,

    mixer: Mixer,
    sample_rate: u32,
    resampler: Resampler,
    samples: Vec<i16>,
}

impl Apu {
    pub fn new(region: Region, sample_rate: u32) -> Self {
        let pal = region.timing().pal_apu;
        Self {
            region,
            square1: SquareChannel::new(true),
            square2: SquareChannel::new(false),
            triangle: TriangleChannel::default(),
            noise: NoiseChannel::new(pal),
            dmc: DmcChannel::new(pal),
            frame_counter: FrameCounter::new(pal),
            cycle: 0,
            last_frame_counter_write: 0,
            mixer: Mixer::new(),
            sample_rate,
            resampler: Resampler::new(sample_rate, region.cpu_clock_hz()),
            samples: Vec::with_capacity(2048),
        }
    }

    /// Power-on (`hard`) or reset-button state. A reset silences every
    /// channel and restarts the frame counter in its last written mode.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            *self = Self::new(self.region, self.sample_rate);
            return;
        }
        self.write(0x4015, 0x00);
        let last = self.last_frame_counter_write;
        self.frame_counter.write(last, self.cycle & 1 == 1);
        self.frame_counter.irq_flag = false;
    }

    /// Change the output sample rate (takes effect immediately).
    pub fn set_sample_rate(&mut self, rate: u32) {
        self.sample_rate = rate;
        self.resampler = Resampler::new(rate, self.region.cpu_clock_hz());
    }

    pub fn write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4000 => self.square1.set_ctrl(value),
            0x4001 => self.square1.set_sweep(value),
            0x4002 => self.square1.set_freq_low(value),
            0x4003 => self.square1.set_freq_high(value),
            0x4004 => self.square2.set_ctrl(value),
            0x4005 => self.square2.set_sweep(value),
            0x4006 => self.square2.set_freq_low(value),
            0x4007 => self.square2.set_freq_high(value),
            0x4008 => self.triangle.set_ctrl(value),
            0x400A => self.triangle.set_freq_low(value),
            0x400B => self.triangle.set_freq_high(value),
            0x400C => self.noise.set_ctrl(value),
            0x400E => self.noise.set_freq(value),
            0x400F => self.noise.set_length(value),
            0x4010 => self.dmc.set_ctrl(value),
            0x4011 => self.dmc.set_dac(value),
            0x4012 => self.dmc.set_address(value),
            0x4013 => self.dmc.set_length(value),
            0x4015 => {
                self.square1.set_enabled(value & 0x01 != 0);
                self.square2.set_enabled(value & 0x02 != 0);
                self.triangle.set_enabled(value & 0x04 != 0);
                self.noise.set_enabled(value & 0x08 != 0);
                self.dmc.set_enabled(value & 0x10 != 0);
            }
            0x4017 => {
                self.last_frame_counter_write = value;
                self.frame_counter.write(value, self.cycle & 1 == 1);
            }
            _ => {}
        }
    }

    /// $4015 read; clears the frame interrupt flag.
    pub fn read_status(&mut self) -> u8 {
        let value = self.peek_status();
        self.frame_counter.irq_flag = false;
        value
    }

    /// $4015 value without the read side effect.
    pub fn peek_status(&self) -> u8 {
        let mut value = 0u8;
        value |= self.square1.length.active() as u8;
        value |= (self.square2.length.active() as u8) << 1;
        value |= (self.triangle.length.active() as u8) << 2;
        value |= (self.noise.length.active() as u8) << 3;
        value |= (self.dmc.active() as u8) << 4;
        value |= (self.frame_counter.irq_flag as u8) << 6;
        value |= (self.dmc.irq_flag as u8) << 7;
        value
    }

    /// Level of the APU's IRQ output (frame counter OR DMC).
    pub fn irq_pending(&self) -> bool {
        self.frame_counter.irq_flag || self.dmc.irq_flag
    }

    /// Advance one CPU cycle. `expansion` is the cartridge's audio level for
    /// this cycle, already scaled to the APU mix.
    pub fn tick(&mut self, expansion: f32) {
        let clocks = self.frame_counter.clock();
        if clocks.quarter {
            self.square1.clock_envelope();
            self.square2.clock_envelope();
            self.triangle.clock_linear();
            self.noise.clock_envelope();
        }
        if clocks.half {
            self.square1.clock_length_and_sweep();
            self.square2.clock_length_and_sweep();
            self.triangle.clock_length();
            self.noise.clock_length();
        }

        self.square1.clock_timer();
        self.square2.clock_timer();
        self.triangle.clock_timer();
        self.noise.clock_timer();
        self.dmc.clock_timer();
        self.cycle += 1;

        let level = self.mixer.mix(
            self.square1.get_output(),
            self.square2.get_output(),
            self.triangle.get_output(),
            self.noise.get_output(),
            self.dmc.get_output(),
        ) + expansion;
        if let Some(sample) = self.resampler.push(level) {
            self.samples.push(sample);
        }
    }

    /// Address the DMC sample reader wants fetched by DMA.
    pub fn take_dmc_request(&mut self) -> Option<u16> {
        self.dmc.take_fetch_request()
    }

    pub fn dmc_fill(&mut self, value: u8) {
        self.dmc.fill(value);
    }

    /// Samples produced since the last `clear_samples`.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn clear_samples(&mut self) {
        self.samples.clear();
    }
}

impl Stateful for Apu {
    fn save_state(&self, w: &mut StateWriter) {
        self.square1.save_state(w);
        self.square2.save_state(w);
        self.triangle.save_state(w);
        self.noise.save_state(w);
        self.dmc.save_state(w);
        self.frame_counter.save_state(w);
        w.u64(self.cycle);
        w.u8(self.last_frame_counter_write);
        self.resampler.save_state(w);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.square1.load_state(r)?;
        self.square2.load_state(r)?;
        self.triangle.load_state(r)?;
        self.noise.load_state(r)?;
        self.dmc.load_state(r)?;
        self.frame_counter.load_state(r)?;
        self.cycle = r.u64()?;
        self.last_frame_counter_write = r.u8()?;
        self.resampler.load_state(r)?;
        self.samples.clear();
        Ok(())
    }
}
