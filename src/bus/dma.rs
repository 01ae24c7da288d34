/*!
DmaController: the 2A03's sprite (OAM) and DMC sample DMA unit.

Behavioral model
- DMA only takes the bus on a CPU *read* cycle. A $4014 write or a DMC sample
  request raises `need_halt`; the next CPU read runs `process` before the read
  itself happens.
- The first stolen cycle is the halt cycle: a dummy read of the address the
  CPU was about to read.
- The unit then alternates get (even CPU cycle) and put (odd CPU cycle) slots:
  - get: DMC fetch if the DMC is past its halt and dummy cycles, else the next
    sprite byte from `page * $100 + n`, else an idle re-read of the CPU address.
  - put: write the latched sprite byte to $2004, or an alignment re-read.
- Sprite cycles double as the DMC's halt and dummy cycles when both run, so a
  DMC fetch landing inside OAM DMA costs two extra cycles instead of four.

Cycle counts that fall out of this:
- OAM DMA alone: 513 cycles, or 514 when the halt cycle lands on a put slot.
- DMC fetch alone: 3 or 4 cycles.

Region differences
- PAL consoles do not repeat the CPU address on idle cycles, so none of the
  dummy reads have side effects there.
- On NES-style consoles only the first read of $4016/$4017 clocks the pad, so
  the repeat reads are dropped for those two addresses. Famicom consoles clock
  the pad on every one.

The controller does not own any bus state. `process` drives the system through
`DmaHost`, which the bus implements while the controller is moved out of it.
*/

use crate::config::Region;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// What DMA needs from the rest of the console, one call per bus action.
pub(crate) trait DmaHost {
    /// Completed CPU cycles.
    fn cycle_count(&self) -> u64;

    /// Start phase of one stolen read cycle. Returns a DMC fetch address the
    /// APU asked for during that cycle, if any.
    fn begin_dma_cycle(&mut self) -> Option<u16>;

    fn end_dma_cycle(&mut self);

    /// CPU-visible read with the usual side effects.
    fn dma_read(&mut self, addr: u16) -> u8;

    /// Store one byte through $2004.
    fn oam_write(&mut self, value: u8);

    /// Hand the fetched sample byte to the DMC.
    fn dmc_deliver(&mut self, value: u8);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DmaController {
    need_halt: bool,
    need_dummy_read: bool,
    sprite_dma: bool,
    sprite_page: u8,
    dmc_running: bool,
    dmc_addr: u16,
}

impl DmaController {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the next CPU read must run `process` first.
    #[inline]
    pub fn pending(&self) -> bool {
        self.need_halt
    }

    pub fn is_active(&self) -> bool {
        self.sprite_dma || self.dmc_running
    }

    /// $4014 write.
    pub fn start_oam(&mut self, page: u8) {
        self.sprite_dma = true;
        self.sprite_page = page;
        self.need_halt = true;
    }

    /// DMC sample request from the APU.
    pub fn start_dmc(&mut self, addr: u16) {
        self.dmc_running = true;
        self.dmc_addr = addr;
        self.need_dummy_read = true;
        self.need_halt = true;
    }

    /// Run every pending transfer to completion, stalling the CPU read at
    /// `read_addr`. Returns the number of cycles stolen.
    pub(crate) fn process<H: DmaHost>(&mut self, host: &mut H, region: Region, read_addr: u16) -> u32 {
        if !self.need_halt {
            return 0;
        }
        let start = host.cycle_count();
        let is_input_port = read_addr == 0x4016 || read_addr == 0x4017;
        let repeats_address = region != Region::Pal;
        let skip_dummy_reads =
            !repeats_address || (region != Region::Famicom && is_input_port);
        // The DMC reading the same register hides the CPU's read of it.
        let skip_first_read =
            self.dmc_running && is_input_port && (self.dmc_addr & 0x1F) == (read_addr & 0x1F);

        self.need_halt = false;
        self.begin(host);
        if repeats_address && !skip_first_read {
            host.dma_read(read_addr);
        }
        host.end_dma_cycle();

        let mut sprite_counter: u16 = 0;
        let mut sprite_offset: u8 = 0;
        let mut latch: u8 = 0;
        while self.dmc_running || self.sprite_dma {
            let get_cycle = host.cycle_count() & 1 == 0;
            if get_cycle {
                if self.dmc_running && !self.need_halt && !self.need_dummy_read {
                    self.stolen_cycle(host);
                    let value = host.dma_read(self.dmc_addr);
                    host.end_dma_cycle();
                    self.dmc_running = false;
                    host.dmc_deliver(value);
                } else if self.sprite_dma {
                    self.stolen_cycle(host);
                    let addr = u16::from_le_bytes([sprite_offset, self.sprite_page]);
                    latch = host.dma_read(addr);
                    host.end_dma_cycle();
                    sprite_offset = sprite_offset.wrapping_add(1);
                    sprite_counter += 1;
                } else {
                    self.idle_cycle(host, skip_dummy_reads, read_addr);
                }
            } else if self.sprite_dma && sprite_counter & 1 == 1 {
                self.stolen_cycle(host);
                host.oam_write(latch);
                host.end_dma_cycle();
                sprite_counter += 1;
                if sprite_counter == 0x200 {
                    self.sprite_dma = false;
                }
            } else {
                self.idle_cycle(host, skip_dummy_reads, read_addr);
            }
        }

        (host.cycle_count() - start) as u32
    }

    fn begin<H: DmaHost>(&mut self, host: &mut H) {
        if let Some(addr) = host.begin_dma_cycle() {
            self.start_dmc(addr);
        }
    }

    /// Any stolen cycle also counts toward the DMC's halt, then dummy, cycle.
    fn stolen_cycle<H: DmaHost>(&mut self, host: &mut H) {
        if self.need_halt {
            self.need_halt = false;
        } else if self.need_dummy_read {
            self.need_dummy_read = false;
        }
        self.begin(host);
    }

    fn idle_cycle<H: DmaHost>(&mut self, host: &mut H, skip_read: bool, read_addr: u16) {
        self.stolen_cycle(host);
        if !skip_read {
            host.dma_read(read_addr);
        }
        host.end_dma_cycle();
    }
}

impl Stateful for DmaController {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.need_halt);
        w.bool(self.need_dummy_read);
        w.bool(self.sprite_dma);
        w.u8(self.sprite_page);
        w.bool(self.dmc_running);
        w.u16(self.dmc_addr);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.need_halt = r.bool()?;
        self.need_dummy_read = r.bool()?;
        self.sprite_dma = r.bool()?;
        self.sprite_page = r.u8()?;
        self.dmc_running = r.bool()?;
        self.dmc_addr = r.u16()?;
        if (self.sprite_dma || self.dmc_running) && !self.need_halt {
            // Transfers always finish inside one `process` call, so an active
            // one without a pending halt cannot come from a real save.
            return Err(StateError::Invalid("DMA active without pending halt"));
        }
        Ok(())
    }
}
