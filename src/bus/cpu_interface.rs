/*!
CPU interface: the 2A03 address decoder.

Address map:
- $0000-$07FF: 2KB internal RAM
- $0800-$1FFF: Mirrors of $0000-$07FF (mask & 0x07FF)
- $2000-$2007: PPU registers
- $2008-$3FFF: Mirrors of $2000-$2007 (mask with & 0x0007)
- $4000-$4013: APU registers (write-only)
- $4014: OAM DMA (write)
- $4015: APU status (read) / channel enables (write)
- $4016: Input strobe (write), port 1 serial data (read)
- $4017: APU frame counter (write), port 2 serial data (read)
- $4018-$401F: Disabled test registers, open bus
- $4020-$FFFF: Cartridge space; unmapped reads return open bus

Open bus: the last value driven on the data bus. Undriven bits of $4015 and
the input ports come from it, and nothing driven at all returns it whole.

This module holds only the decode. Cycle timing (PPU/APU/mapper stepping,
DMA halts) lives in `Bus`'s `CpuBus` implementation, which calls into here
exactly once per access.
*/

use log::debug;

use crate::bus::Bus;
use crate::bus::interfaces::BusPpuView;

impl Bus {
    /// One CPU-visible read with device side effects.
    pub(crate) fn read_register(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF => {
                let mut view = BusPpuView::new(&mut self.vram, &mut self.cartridge);
                self.ppu.cpu_read(addr, &mut view)
            }
            0x4015 => self.apu.read_status() | (self.open_bus & 0x20),
            0x4016 | 0x4017 => {
                let port = (addr - 0x4016) as usize;
                self.input.read(port, &self.ppu) | (self.open_bus & 0xE0)
            }
            0x4000..=0x401F => self.open_bus,
            _ => {
                let open_bus = self.open_bus;
                self.cartridge
                    .as_mut()
                    .and_then(|c| c.mapper.cpu_read(addr))
                    .unwrap_or(open_bus)
            }
        }
    }

    /// One CPU-visible write.
    pub(crate) fn write_register(&mut self, addr: u16, value: u8) {
        match addr {
            0x0000..=0x1FFF => self.ram.write(addr, value),
            0x2000..=0x3FFF => {
                let mut view = BusPpuView::new(&mut self.vram, &mut self.cartridge);
                self.ppu.cpu_write(addr, value, &mut view);
            }
            0x4014 => {
                debug!("OAM DMA from page ${value:02X} at cycle {}", self.clock.cpu_cycle());
                self.dma.start_oam(value);
            }
            0x4016 => self.input.write_strobe(value),
            0x4000..=0x4013 | 0x4015 | 0x4017 => self.apu.write(addr, value),
            0x4018..=0x401F => {}
            _ => {
                if let Some(cart) = self.cartridge.as_mut() {
                    cart.mapper.cpu_write(addr, value);
                }
            }
        }
    }

    /// Debugger read: the value a CPU read would see, with no side effects
    /// and no time passing.
    ///
    /// Cartridge registers below $6000 (disk system ports, expansion chips)
    /// acknowledge on read, so that range reports open bus here.
    pub fn peek(&mut self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.ram.read(addr),
            0x2000..=0x3FFF => self.ppu.peek(addr),
            0x4015 => self.apu.peek_status() | (self.open_bus & 0x20),
            0x4016 | 0x4017 => {
                self.input.peek((addr - 0x4016) as usize) | (self.open_bus & 0xE0)
            }
            0x4000..=0x5FFF => self.open_bus,
            _ => {
                let open_bus = self.open_bus;
                self.cartridge
                    .as_mut()
                    .and_then(|c| c.mapper.cpu_read(addr))
                    .unwrap_or(open_bus)
            }
        }
    }
}
