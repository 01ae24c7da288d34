#![doc = r#"
Bus module: the console's system bus and everything hanging off it.

Overview
- `Bus` owns every device except the CPU: work RAM, PPU, APU, nametable RAM,
  the cartridge, the input ports, the DMA unit and the master clock.
- It implements `CpuBus`, so each CPU access is one complete console cycle:
  start phase (PPU dots, mapper tick, APU tick), the access itself, end phase
  (more PPU dots).
- Pending DMA runs in front of the next CPU read and steals as many cycles as
  it needs.

Modules and responsibilities
- cpu_interface: CPU-visible address decoder ($0000-$FFFF) and side-effect-free `peek`.
- ppu_space: nametable RAM and the mirroring map.
- interfaces: `BusPpuView`, the PPU's borrow-split view of VRAM and the mapper.
- dma: OAM and DMC DMA (`DmaController`) and the `DmaHost` seam it drives.
- clock: master-clock phases and the PPU catch-up rule.
- ram: 2 KiB work RAM.
"#]

pub mod clock;
pub mod cpu_interface;
pub mod dma;
pub mod interfaces;
pub mod ppu_space;
pub mod ram;


use log::{debug, trace};

use crate::apu::Apu;
use crate::bus::clock::MasterClock;
use crate::bus::dma::{DmaController, DmaHost};
use crate::bus::interfaces::BusPpuView;
use crate::bus::ppu_space::Vram;
use crate::bus::ram::Ram;
use crate::cartridge::Cartridge;
use crate::config::{Config, RamPowerPolicy, Region};
use crate::controller::{InputPorts, PortLayout};
use crate::cpu_bus::CpuBus;
use crate::ppu::Ppu;

/// The system bus: every device but the CPU, stepped in lockstep.
pub struct Bus {
    region: Region,
    ram_power: RamPowerPolicy,
    pub(crate) ram: Ram,
    pub(crate) ppu: Ppu,
    pub(crate) apu: Apu,
    pub(crate) vram: Vram,
    pub(crate) cartridge: Option<Cartridge>,
    pub(crate) input: InputPorts,
    pub(crate) dma: DmaController,
    pub(crate) clock: MasterClock,
    pub(crate) open_bus: u8,
    stall_cycles: u64,
}

impl Bus {
    pub fn new(region: Region, config: &Config) -> Self {
        let mut ppu = Ppu::new(region);
        ppu.set_sprite_limit(config.sprite_limit);
        Self {
            region,
            ram_power: config.ram_power,
            ram: Ram::new(),
            ppu,
            apu: Apu::new(region, config.sample_rate),
            vram: Vram::new(),
            cartridge: None,
            input: InputPorts::new(PortLayout {
                four_player: config.four_player,
                famicom: region == Region::Famicom,
                zapper: config.zapper,
            }),
            dma: DmaController::new(),
            clock: MasterClock::new(region),
            open_bus: 0,
            stall_cycles: 0,
        }
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// Cold boot of every device on the bus. The CPU is powered separately.
    pub fn power(&mut self) {
        debug!("bus power-on ({:?})", self.region);
        self.ram.power(self.ram_power);
        self.vram.clear();
        self.ppu.reset(true);
        self.apu.reset(true);
        if let Some(cart) = self.cartridge.as_mut() {
            cart.mapper.reset(true);
        }
        self.dma = DmaController::new();
        self.clock = MasterClock::new(self.region);
        self.open_bus = 0;
        self.stall_cycles = 0;
    }

    /// Reset button: RAM, VRAM and the clock keep running.
    pub fn reset(&mut self) {
        debug!("bus reset at cycle {}", self.clock.cpu_cycle());
        self.ppu.reset(false);
        self.apu.reset(false);
        if let Some(cart) = self.cartridge.as_mut() {
            cart.mapper.reset(false);
        }
        self.dma = DmaController::new();
    }

    pub fn insert_cartridge(&mut self, cartridge: Cartridge) -> Option<Cartridge> {
        self.cartridge.replace(cartridge)
    }

    pub fn take_cartridge(&mut self) -> Option<Cartridge> {
        self.cartridge.take()
    }

    pub fn cartridge(&self) -> Option<&Cartridge> {
        self.cartridge.as_ref()
    }

    pub fn cartridge_mut(&mut self) -> Option<&mut Cartridge> {
        self.cartridge.as_mut()
    }

    pub fn ppu(&self) -> &Ppu {
        &self.ppu
    }

    pub fn ppu_mut(&mut self) -> &mut Ppu {
        &mut self.ppu
    }

    pub fn apu(&self) -> &Apu {
        &self.apu
    }

    pub fn apu_mut(&mut self) -> &mut Apu {
        &mut self.apu
    }

    pub fn input_mut(&mut self) -> &mut InputPorts {
        &mut self.input
    }

    pub fn ram(&self) -> &[u8] {
        self.ram.as_slice()
    }

    /// CPU cycles since power-on, DMA included.
    pub fn cpu_cycle(&self) -> u64 {
        self.clock.cpu_cycle()
    }

    pub fn open_bus(&self) -> u8 {
        self.open_bus
    }

    /// CPU cycles stolen by DMA since the last call.
    pub fn take_stall_cycles(&mut self) -> u64 {
        std::mem::take(&mut self.stall_cycles)
    }

    fn run_ppu(&mut self, dots: u32) {
        if dots == 0 {
            return;
        }
        let mut view = BusPpuView::new(&mut self.vram, &mut self.cartridge);
        for _ in 0..dots {
            self.ppu.tick(&mut view);
        }
    }

    /// Start phase of a CPU cycle. Returns a DMC fetch the APU raised.
    fn begin_cycle(&mut self, read: bool) -> Option<u16> {
        let dots = self.clock.begin_cycle(read);
        self.run_ppu(dots);
        let expansion = match self.cartridge.as_mut() {
            Some(cart) => {
                cart.mapper.tick(1);
                cart.mapper.expansion_audio()
            }
            None => 0.0,
        };
        self.apu.tick(expansion);
        self.apu.take_dmc_request()
    }

    fn end_cycle(&mut self, read: bool) {
        let dots = self.clock.end_cycle(read);
        self.run_ppu(dots);
    }

    fn run_dma(&mut self, read_addr: u16) {
        let mut dma = std::mem::take(&mut self.dma);
        let region = self.region;
        let stolen = dma.process(self, region, read_addr);
        self.dma = dma;
        trace!("DMA stole {stolen} cycles before read of ${read_addr:04X}");
        self.stall_cycles += stolen as u64;
    }
}

impl CpuBus for Bus {
    fn read(&mut self, addr: u16) -> u8 {
        if self.dma.pending() {
            self.run_dma(addr);
        }
        if let Some(dmc_addr) = self.begin_cycle(true) {
            self.dma.start_dmc(dmc_addr);
        }
        let value = self.read_register(addr);
        self.end_cycle(true);
        // $4015 is internal to the CPU package and never drives the external bus.
        if addr != 0x4015 {
            self.open_bus = value;
        }
        value
    }

    fn write(&mut self, addr: u16, value: u8) {
        if let Some(dmc_addr) = self.begin_cycle(false) {
            self.dma.start_dmc(dmc_addr);
        }
        self.write_register(addr, value);
        self.end_cycle(false);
        self.open_bus = value;
    }

    fn nmi_line(&self) -> bool {
        self.ppu.nmi_output()
    }

    fn irq_line(&self) -> bool {
        self.apu.irq_pending()
            || self
                .cartridge
                .as_ref()
                .is_some_and(|c| c.mapper.irq_pending())
    }

    fn cycle_count(&self) -> u64 {
        self.clock.cpu_cycle()
    }
}

impl DmaHost for Bus {
    fn cycle_count(&self) -> u64 {
        self.clock.cpu_cycle()
    }

    fn begin_dma_cycle(&mut self) -> Option<u16> {
        self.begin_cycle(true)
    }

    fn end_dma_cycle(&mut self) {
        self.end_cycle(true);
    }

    fn dma_read(&mut self, addr: u16) -> u8 {
        let value = self.read_register(addr);
        if addr != 0x4015 {
            self.open_bus = value;
        }
        value
    }

    fn oam_write(&mut self, value: u8) {
        let mut view = BusPpuView::new(&mut self.vram, &mut self.cartridge);
        self.ppu.cpu_write(0x2004, value, &mut view);
    }

    fn dmc_deliver(&mut self, value: u8) {
        self.apu.dmc_fill(value);
    }
}
