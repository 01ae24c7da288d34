//! Delta modulation channel at $4010-$4013.
//!
//! The sample reader does not touch memory itself. When its buffer empties it
//! raises a fetch request; the bus performs the DMA (stalling the CPU) and
//! hands the byte back through `fill`.

use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Output-unit periods in CPU cycles.
const NTSC_RATES: [u16; 16] = [428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54];
const PAL_RATES: [u16; 16] = [398, 354, 316, 298, 276, 236, 210, 198, 176, 148, 132, 118, 98, 78, 66, 50];

#[derive(Clone, Debug)]
pub struct DmcChannel {
    pal: bool,
    pub(super) irq_enabled: bool,
    pub(super) irq_flag: bool,
    looping: bool,
    period: u16,
    timer: u16,

    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    pub(super) bytes_remaining: u16,

    buffer: Option<u8>,
    fetch_pending: bool,

    shift: u8,
    bits_remaining: u8,
    silence: bool,
    level: u8,
}

impl DmcChannel {
    pub fn new(pal: bool) -> Self {
        let period = if pal { PAL_RATES[0] } else { NTSC_RATES[0] };
        Self {
            pal,
            irq_enabled: false,
            irq_flag: false,
            looping: false,
            period,
            timer: period - 1,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            buffer: None,
            fetch_pending: false,
            shift: 0,
            bits_remaining: 8,
            silence: true,
            level: 0,
        }
    }

    pub fn set_ctrl(&mut self, value: u8) {
        self.irq_enabled = value & 0x80 != 0;
        self.looping = value & 0x40 != 0;
        let table = if self.pal { &PAL_RATES } else { &NTSC_RATES };
        self.period = table[(value & 0x0F) as usize];
        if !self.irq_enabled {
            self.irq_flag = false;
        }
    }

    pub fn set_dac(&mut self, value: u8) {
        self.level = value & 0x7F;
    }

    pub fn set_address(&mut self, value: u8) {
        self.sample_address = 0xC000 | ((value as u16) << 6);
    }

    pub fn set_length(&mut self, value: u8) {
        self.sample_length = ((value as u16) << 4) | 1;
    }

    /// $4015 bit 4.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.irq_flag = false;
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart();
            self.request_fetch();
        }
    }

    fn restart(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    fn request_fetch(&mut self) {
        if self.buffer.is_none() && self.bytes_remaining > 0 {
            self.fetch_pending = true;
        }
    }

    /// Address the reader wants fetched, if any. Clears the request.
    pub fn take_fetch_request(&mut self) -> Option<u16> {
        if std::mem::take(&mut self.fetch_pending) && self.bytes_remaining > 0 {
            Some(self.current_address)
        } else {
            None
        }
    }

    /// Byte delivered by DMC DMA.
    pub fn fill(&mut self, value: u8) {
        if self.bytes_remaining == 0 {
            return;
        }
        self.buffer = Some(value);
        self.current_address = if self.current_address == 0xFFFF { 0x8000 } else { self.current_address + 1 };
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.looping {
                self.restart();
            } else if self.irq_enabled {
                self.irq_flag = true;
            }
        }
    }

    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.period - 1;

        if !self.silence {
            if self.shift & 1 != 0 {
                if self.level <= 125 {
                    self.level += 2;
                }
            } else if self.level >= 2 {
                self.level -= 2;
            }
        }
        self.shift >>= 1;
        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.buffer.take() {
                Some(byte) => {
                    self.silence = false;
                    self.shift = byte;
                    self.request_fetch();
                }
                None => self.silence = true,
            }
        }
    }

    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    pub fn get_output(&self) -> u8 {
        self.level
    }
}

impl Stateful for DmcChannel {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.irq_enabled);
        w.bool(self.irq_flag);
        w.bool(self.looping);
        w.u16(self.period);
        w.u16(self.timer);
        w.u16(self.sample_address);
        w.u16(self.sample_length);
        w.u16(self.current_address);
        w.u16(self.bytes_remaining);
        w.bool(self.buffer.is_some());
        w.u8(self.buffer.unwrap_or(0));
        w.bool(self.fetch_pending);
        w.u8(self.shift);
        w.u8(self.bits_remaining);
        w.bool(self.silence);
        w.u8(self.level);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.irq_enabled = r.bool()?;
        self.irq_flag = r.bool()?;
        self.looping = r.bool()?;
        let period = r.u16()?;
        if period == 0 {
            return Err(StateError::Invalid("DMC period"));
        }
        self.period = period;
        self.timer = r.u16()?;
        self.sample_address = r.u16()?;
        self.sample_length = r.u16()?;
        self.current_address = r.u16()?;
        self.bytes_remaining = r.u16()?;
        let has_buffer = r.bool()?;
        let byte = r.u8()?;
        self.buffer = has_buffer.then_some(byte);
        self.fetch_pending = r.bool()?;
        self.shift = r.u8()?;
        let bits = r.u8()?;
        if bits == 0 || bits > 8 {
            return Err(StateError::Invalid("DMC bit counter"));
        }
        self.bits_remaining = bits;
        self.silence = r.bool()?;
        self.level = r.u8()? & 0x7F;
        Ok(())
    }
}
