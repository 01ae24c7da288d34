/*!
Machine: the console as one value.

`Machine` owns the CPU and the system bus (which owns everything else), and
is the only type a host needs:

- `load` / `load_disk` turn image bytes into a cartridge; `power(true)` boots it.
- `set_input` latches controller state; `execute` runs exactly one video
  frame and hands back the pixels and audio it produced.
- `save_state` / `load_state` snapshot and restore everything, atomically.

Frame boundary
==============
`execute` steps whole CPU instructions until the PPU raises its frame-complete
flag at the start of vblank, so an instruction that straddles the boundary
finishes inside the frame that started it.

Save states
===========
Chunks, in order: `CART`, `CPU `, `RAM `, `PPU `, `VRAM`, `APU `, `DMA `,
`CLK `, `INPT`, `MAPR`. Loading validates the container and the cartridge,
snapshots the running machine, applies every chunk, and restores the snapshot
if any chunk is rejected.

Machines share nothing; any number may run side by side.
*/

use log::{debug, error, info, warn};

use crate::battery::{BatteryStorage, patch_name, save_name};
use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeInfo};
use crate::config::{Config, Region};
use crate::controller::FrameInput;
use crate::cpu::table::OPCODES;
use crate::cpu::{Cpu, CpuRegisters, disassemble};
use crate::database::Database;
use crate::error::{ExecuteError, LoadError, PatchError, StateError};
use crate::mappers::{Fds, MapperRegistry};
use crate::ppu::{NES_HEIGHT, NES_WIDTH};
use crate::state::{
    Chunk, StateReader, StateWriter, Stateful, Tag, parse_container, tag_name,
};

const TAG_CART: Tag = *b"CART";
const TAG_CPU: Tag = *b"CPU ";
const TAG_RAM: Tag = *b"RAM ";
const TAG_PPU: Tag = *b"PPU ";
const TAG_VRAM: Tag = *b"VRAM";
const TAG_APU: Tag = *b"APU ";
const TAG_DMA: Tag = *b"DMA ";
const TAG_CLK: Tag = *b"CLK ";
const TAG_INPT: Tag = *b"INPT";
const TAG_MAPR: Tag = *b"MAPR";

const CHUNK_VERSION: u16 = 1;

const REQUIRED_CHUNKS: [Tag; 10] = [
    TAG_CART, TAG_CPU, TAG_RAM, TAG_PPU, TAG_VRAM, TAG_APU, TAG_DMA, TAG_CLK, TAG_INPT, TAG_MAPR,
];

/// Output of one `execute` call, borrowed from the machine.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    /// Packed pixels in the configured `PixelFormat`, row-major.
    pub pixels: &'a [u32],
    pub width: usize,
    pub height: usize,
    /// Pixels per row in `pixels`.
    pub stride: usize,
    /// Mono signed 16-bit PCM.
    pub samples: &'a [i16],
    pub sample_rate: u32,
    /// Frames completed since power-on, this one included.
    pub number: u64,
    /// CPU cycles the frame took, DMA included.
    pub cpu_cycles: u64,
    /// Of those, cycles stolen by DMA.
    pub dma_cycles: u64,
}

pub struct Machine {
    config: Config,
    registry: MapperRegistry,
    database: Database,
    storage: Option<Box<dyn BatteryStorage>>,
    cpu: Cpu,
    bus: Bus,
    powered: bool,
    pixels: Vec<u32>,
}

impl std::fmt::Debug for Machine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Machine")
            .field("region", &self.bus.region())
            .field("cartridge", &self.bus.cartridge().map(Cartridge::info))
            .field("powered", &self.powered)
            .field("cpu", &self.cpu.registers())
            .finish()
    }
}

impl Machine {
    /// A machine with the builtin mappers and an empty database.
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, MapperRegistry::with_builtin())
    }

    pub fn with_registry(config: Config, registry: MapperRegistry) -> Self {
        let bus = Bus::new(config.region.unwrap_or(Region::Ntsc), &config);
        Self {
            config,
            registry,
            database: Database::new(),
            storage: None,
            cpu: Cpu::new(),
            bus,
            powered: false,
            pixels: vec![0; NES_WIDTH * NES_HEIGHT],
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Output rate for the samples of the following frames, e.g. after the
    /// host's audio device changes. Survives later loads.
    pub fn set_sample_rate(&mut self, rate: u32) {
        self.config.sample_rate = rate;
        self.bus.apu_mut().set_sample_rate(rate);
    }

    pub fn set_database(&mut self, database: Database) {
        self.database = database;
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.database
    }

    pub fn registry_mut(&mut self) -> &mut MapperRegistry {
        &mut self.registry
    }

    /// Where battery RAM and disk patches are pulled from and pushed to.
    pub fn set_battery_storage(&mut self, storage: Box<dyn BatteryStorage>) {
        self.storage = Some(storage);
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load a cartridge image. A region forced in `Config` wins over
    /// `preferred`, which wins over the header. On error the machine is left
    /// unloaded.
    pub fn load(&mut self, data: &[u8], preferred: Option<Region>) -> Result<CartridgeInfo, LoadError> {
        self.unload();
        let cart = Cartridge::load(data, &self.registry, &self.database, self.config.region.or(preferred))?;
        Ok(self.install(cart))
    }

    /// Load a Famicom Disk System image with its BIOS.
    pub fn load_disk(
        &mut self,
        disk: &[u8],
        bios: &[u8],
        preferred: Option<Region>,
    ) -> Result<CartridgeInfo, LoadError> {
        self.unload();
        let cart = Cartridge::from_disk(disk, bios, self.config.region.or(preferred))?;
        Ok(self.install(cart))
    }

    fn install(&mut self, mut cart: Cartridge) -> CartridgeInfo {
        self.restore_persistent(&mut cart);
        let info = cart.info().clone();
        self.bus = Bus::new(info.region, &self.config);
        self.bus.insert_cartridge(cart);
        self.cpu = Cpu::new();
        self.powered = false;
        info
    }

    /// Push persistent data and drop the cartridge.
    pub fn unload(&mut self) {
        if self.bus.cartridge().is_none() {
            return;
        }
        self.save_battery();
        if let Some(cart) = self.bus.take_cartridge() {
            info!("unloaded cartridge {:08X}", cart.crc32());
        }
        self.powered = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.bus.cartridge().is_some()
    }

    pub fn cartridge_info(&self) -> Option<&CartridgeInfo> {
        self.bus.cartridge().map(Cartridge::info)
    }

    fn restore_persistent(&mut self, cart: &mut Cartridge) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        let crc = cart.crc32();
        if let Some(fds) = cart.mapper.as_fds_mut() {
            if let Some(patch) = storage.load(&patch_name(crc)) {
                match fds.apply_disk_patch(&patch) {
                    Ok(()) => debug!("applied saved disk patch ({} bytes)", patch.len()),
                    Err(e) => warn!("ignoring saved disk patch: {e}"),
                }
            }
        } else if cart.has_battery()
            && let Some(data) = storage.load(&save_name(crc))
            && let Some(ram) = cart.mapper.battery_ram_mut()
        {
            if data.len() == ram.len() {
                ram.copy_from_slice(&data);
                debug!("restored {} bytes of battery RAM", data.len());
            } else {
                warn!(
                    "ignoring battery save of {} bytes, cartridge has {}",
                    data.len(),
                    ram.len()
                );
            }
        }
    }

    /// Push battery RAM (or the disk patch) to storage now.
    pub fn save_battery(&mut self) {
        let (Some(storage), Some(cart)) = (self.storage.as_mut(), self.bus.cartridge()) else {
            return;
        };
        let crc = cart.crc32();
        if let Some(fds) = cart.mapper.as_fds() {
            if fds.is_modified() {
                storage.save(&patch_name(crc), &fds.disk_patch());
            }
        } else if cart.has_battery()
            && let Some(ram) = cart.mapper.battery_ram()
        {
            storage.save(&save_name(crc), ram);
        }
    }

    // ------------------------------------------------------------------
    // Power and execution
    // ------------------------------------------------------------------

    /// `true`: cold boot (RAM per the power-on policy). `false`: switch off,
    /// pushing battery data; the cartridge stays loaded.
    pub fn power(&mut self, on: bool) {
        if !on {
            if self.powered {
                self.save_battery();
            }
            self.powered = false;
            return;
        }
        self.bus.power();
        self.cpu.power(&mut self.bus);
        self.bus.take_stall_cycles();
        self.auto_insert_disk();
        self.powered = true;
    }

    /// `soft`: the reset button. Otherwise a full power cycle.
    pub fn reset(&mut self, soft: bool) {
        if !soft {
            self.power(true);
            return;
        }
        if !self.powered {
            return;
        }
        self.bus.reset();
        self.cpu.reset(&mut self.bus);
        self.bus.take_stall_cycles();
        self.auto_insert_disk();
    }

    fn auto_insert_disk(&mut self) {
        if !self.config.fds_auto_insert {
            return;
        }
        if let Some(fds) = self.fds_mut()
            && fds.inserted_side().is_none()
        {
            fds.insert(0);
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Controller state for the next frame.
    pub fn set_input(&mut self, input: FrameInput) {
        self.bus.input_mut().set_input(input);
    }

    /// Run one video frame.
    pub fn execute(&mut self) -> Result<Frame<'_>, ExecuteError> {
        if !self.is_loaded() {
            return Err(ExecuteError::NotLoaded);
        }
        if !self.powered {
            return Err(ExecuteError::PoweredOff);
        }
        self.bus.apu_mut().clear_samples();
        self.bus.ppu_mut().take_frame_complete();
        let start = self.bus.cpu_cycle();
        loop {
            self.cpu.step(&mut self.bus);
            if self.bus.ppu_mut().take_frame_complete() {
                break;
            }
        }
        let dma_cycles = self.bus.take_stall_cycles();
        let ppu = self.bus.ppu();
        ppu.render_rgb(self.config.pixel_format, &mut self.pixels);
        Ok(Frame {
            pixels: &self.pixels,
            width: NES_WIDTH,
            height: NES_HEIGHT,
            stride: NES_WIDTH,
            samples: self.bus.apu().samples(),
            sample_rate: self.config.sample_rate,
            number: ppu.frame_count(),
            cpu_cycles: self.bus.cpu_cycle() - start,
            dma_cycles,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.bus.ppu().frame_count()
    }

    /// Pixels of the last completed frame.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    // ------------------------------------------------------------------
    // Save states
    // ------------------------------------------------------------------

    pub fn save_state(&self) -> Result<Vec<u8>, StateError> {
        let cart = self.bus.cartridge().ok_or(StateError::NoCartridge)?;
        let bus = &self.bus;
        let mut w = StateWriter::container();
        w.chunk(TAG_CART, CHUNK_VERSION, |w| {
            w.u32(cart.crc32());
            w.u8(bus.region().to_u8());
        });
        w.chunk(TAG_CPU, CHUNK_VERSION, |w| {
            self.cpu.save_state(w);
            w.u64(bus.cpu_cycle());
        });
        w.chunk(TAG_RAM, CHUNK_VERSION, |w| bus.ram.save_state(w));
        w.chunk(TAG_PPU, CHUNK_VERSION, |w| bus.ppu.save_state(w));
        w.chunk(TAG_VRAM, CHUNK_VERSION, |w| bus.vram.save_state(w));
        w.chunk(TAG_APU, CHUNK_VERSION, |w| bus.apu.save_state(w));
        w.chunk(TAG_DMA, CHUNK_VERSION, |w| bus.dma.save_state(w));
        w.chunk(TAG_CLK, CHUNK_VERSION, |w| {
            bus.clock.save_state(w);
            w.u8(bus.open_bus);
        });
        w.chunk(TAG_INPT, CHUNK_VERSION, |w| bus.input.save_state(w));
        w.chunk(TAG_MAPR, CHUNK_VERSION, |w| {
            w.u16(cart.mapper.mapper_id());
            cart.mapper.save_state(w);
        });
        Ok(w.into_bytes())
    }

    /// Restore a blob from `save_state`. On any error the machine is exactly
    /// as it was before the call.
    pub fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let (crc, mapper_id) = match self.bus.cartridge() {
            Some(c) => (c.crc32(), c.mapper.mapper_id()),
            None => return Err(StateError::NoCartridge),
        };
        let chunks = parse_container(data)?;
        for tag in REQUIRED_CHUNKS {
            if !chunks.iter().any(|c| c.tag == tag) {
                return Err(StateError::MissingChunk(tag_name(tag)));
            }
        }
        for chunk in chunks.iter().filter(|c| c.tag == TAG_CART) {
            let mut r = chunk.reader();
            if r.u32()? != crc {
                return Err(StateError::CartridgeMismatch);
            }
            let region = Region::from_u8(r.u8()?).ok_or(StateError::Invalid("unknown region"))?;
            if region != self.bus.region() {
                return Err(StateError::Invalid("state was saved in another region"));
            }
        }
        for chunk in chunks.iter().filter(|c| c.tag == TAG_MAPR) {
            let found = chunk.reader().u16()?;
            if found != mapper_id {
                return Err(StateError::MapperMismatch {
                    expected: mapper_id,
                    found,
                });
            }
        }

        let snapshot = self.save_state()?;
        if let Err(e) = self.apply_chunks(&chunks) {
            warn!("save state rejected ({e}); restoring previous state");
            if let Err(restore) = parse_container(&snapshot).and_then(|c| self.apply_chunks(&c)) {
                error!("could not restore the pre-load snapshot: {restore}");
            }
            return Err(e);
        }
        self.powered = true;
        Ok(())
    }

    fn apply_chunks(&mut self, chunks: &[Chunk<'_>]) -> Result<(), StateError> {
        let mut cpu_cycle = None;
        for chunk in chunks {
            if chunk.version != CHUNK_VERSION {
                warn!(
                    "skipping chunk {} version {} (supported: {CHUNK_VERSION})",
                    tag_name(chunk.tag),
                    chunk.version
                );
                continue;
            }
            let mut r = chunk.reader();
            let bus = &mut self.bus;
            match chunk.tag {
                TAG_CART => {}
                TAG_CPU => {
                    self.cpu.load_state(&mut r)?;
                    cpu_cycle = Some(r.u64()?);
                }
                TAG_RAM => bus.ram.load_state(&mut r)?,
                TAG_PPU => bus.ppu.load_state(&mut r)?,
                TAG_VRAM => bus.vram.load_state(&mut r)?,
                TAG_APU => bus.apu.load_state(&mut r)?,
                TAG_DMA => bus.dma.load_state(&mut r)?,
                TAG_CLK => {
                    bus.clock.load_state(&mut r)?;
                    bus.open_bus = r.u8()?;
                }
                TAG_INPT => bus.input.load_state(&mut r)?,
                TAG_MAPR => load_mapper(bus, &mut r)?,
                other => warn!("skipping unknown chunk {}", tag_name(other)),
            }
        }
        if cpu_cycle.is_some_and(|c| c != self.bus.cpu_cycle()) {
            return Err(StateError::Invalid("CPU and clock cycle counts disagree"));
        }
        self.bus.take_stall_cycles();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Disk system
    // ------------------------------------------------------------------

    fn fds(&self) -> Option<&Fds> {
        self.bus.cartridge().and_then(|c| c.mapper.as_fds())
    }

    fn fds_mut(&mut self) -> Option<&mut Fds> {
        self.bus.cartridge_mut().and_then(|c| c.mapper.as_fds_mut())
    }

    /// Insert `side`. Returns false when no disk system is loaded.
    pub fn fds_insert(&mut self, side: usize) -> bool {
        self.fds_mut().map(|fds| fds.insert(side)).is_some()
    }

    pub fn fds_eject(&mut self) -> bool {
        self.fds_mut().map(Fds::eject).is_some()
    }

    /// Eject, then insert the next side once the drive would notice.
    pub fn fds_change_side(&mut self) -> bool {
        self.fds_mut().map(Fds::change_side).is_some()
    }

    /// Number of disk sides, 0 when no disk system is loaded.
    pub fn fds_side_count(&self) -> usize {
        self.fds().map_or(0, Fds::side_count)
    }

    pub fn fds_inserted_side(&self) -> Option<usize> {
        self.fds().and_then(Fds::inserted_side)
    }

    /// The disk's changes since load, as a UPS patch.
    pub fn fds_disk_patch(&self) -> Result<Vec<u8>, PatchError> {
        self.fds().map(Fds::disk_patch).ok_or(PatchError::NoDisk)
    }

    pub fn apply_fds_disk_patch(&mut self, patch: &[u8]) -> Result<(), PatchError> {
        self.fds_mut()
            .ok_or(PatchError::NoDisk)?
            .apply_disk_patch(patch)
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn region(&self) -> Region {
        self.bus.region()
    }

    pub fn cpu_registers(&self) -> CpuRegisters {
        self.cpu.registers()
    }

    pub fn is_jammed(&self) -> bool {
        self.cpu.is_jammed()
    }

    /// Read without side effects or time passing.
    pub fn peek(&mut self, addr: u16) -> u8 {
        self.bus.peek(addr)
    }

    /// 2 KiB work RAM.
    pub fn ram(&self) -> &[u8] {
        self.bus.ram()
    }

    pub fn cpu_cycle(&self) -> u64 {
        self.bus.cpu_cycle()
    }

    /// Disassemble the instruction at `addr`; returns the text and its length.
    pub fn disassemble(&mut self, addr: u16) -> (String, u16) {
        let opcode = self.peek(addr);
        let operand = [self.peek(addr.wrapping_add(1)), self.peek(addr.wrapping_add(2))];
        let len = 1 + OPCODES[opcode as usize].mode.operand_len();
        (disassemble(addr, opcode, operand), len)
    }

    /// The last frame as an RGBA image.
    #[cfg(feature = "screenshot")]
    pub fn screenshot(&self) -> image::RgbaImage {
        use crate::ppu::entry_rgb;
        let ppu = self.bus.ppu();
        let swap = matches!(ppu.region(), Region::Pal | Region::Dendy);
        let frame = ppu.frame_buffer();
        image::RgbaImage::from_fn(NES_WIDTH as u32, NES_HEIGHT as u32, |x, y| {
            let (r, g, b) = entry_rgb(frame[y as usize * NES_WIDTH + x as usize], swap);
            image::Rgba([r, g, b, 0xFF])
        })
    }
}

fn load_mapper(bus: &mut Bus, r: &mut StateReader<'_>) -> Result<(), StateError> {
    let cart = bus.cartridge_mut().ok_or(StateError::NoCartridge)?;
    let expected = cart.mapper.mapper_id();
    let found = r.u16()?;
    if found != expected {
        return Err(StateError::MapperMismatch { expected, found });
    }
    cart.mapper.load_state(r)
}

impl Drop for Machine {
    fn drop(&mut self) {
        if self.powered {
            self.save_battery();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::battery::MemoryStorage;
    use crate::config::RamPowerPolicy;
    use crate::controller::Buttons;
    use crate::test_utils::{build_ines, nrom_program};

    /// Counts frames in $00 from the NMI handler; main loop spins.
    const COUNTER: &[u8] = &[
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000
        0x4C, 0x05, 0x80, // JMP $8005
    ];
    /// NMI at $9000: INC $00 ; RTI
    fn counter_rom() -> Vec<u8> {
        let mut image = nrom_program(COUNTER, 0x8000, 0x9000, 0xA000);
        image[16 + 0x1000..16 + 0x1003].copy_from_slice(&[0xE6, 0x00, 0x40]);
        image
    }

    fn running(image: &[u8]) -> Machine {
        let mut m = Machine::new(Config::default());
        m.load(image, None).expect("loads");
        m.power(true);
        m
    }

    #[test]
    fn execute_needs_cartridge_and_power() {
        let mut m = Machine::new(Config::default());
        assert_eq!(m.execute().err(), Some(ExecuteError::NotLoaded));
        m.load(&counter_rom(), None).expect("loads");
        assert_eq!(m.execute().err(), Some(ExecuteError::PoweredOff));
        m.power(true);
        assert!(m.execute().is_ok());
    }

    #[test]
    fn frame_has_full_picture_and_ntsc_audio() {
        let mut m = running(&counter_rom());
        let frame = m.execute().expect("first frame");
        assert_eq!(frame.number, 1);
        assert_eq!(frame.pixels.len(), 256 * 240);
        assert_eq!((frame.width, frame.height, frame.stride), (256, 240, 256));
        assert!((730..=738).contains(&frame.samples.len()), "{}", frame.samples.len());
        assert!((29_770..=29_795).contains(&frame.cpu_cycles), "{}", frame.cpu_cycles);
        assert_eq!(frame.dma_cycles, 0);
    }

    #[test]
    fn nmi_handler_runs_once_per_frame() {
        let mut m = running(&counter_rom());
        for _ in 0..10 {
            m.execute().expect("frame");
        }
        let count = m.ram()[0];
        assert!((8..=10).contains(&count), "counted {count}");
    }

    #[test]
    fn unsupported_mapper_leaves_machine_unloaded() {
        let mut m = Machine::new(Config::default());
        let err = m.load(&build_ines(1, 1, 0xF0, 0xF0, 0, None), None).unwrap_err();
        assert_eq!(err, LoadError::UnsupportedMapper(255));
        assert!(!m.is_loaded());
        assert!(m.load(&counter_rom(), None).is_ok());
    }

    #[test]
    fn soft_reset_keeps_ram_power_applies_policy() {
        let config = Config {
            ram_power: RamPowerPolicy::AllOnes,
            ..Config::default()
        };
        let mut m = Machine::new(config);
        m.load(&counter_rom(), None).expect("loads");
        m.power(true);
        assert!(m.ram().iter().all(|&b| b == 0xFF));
        m.execute().expect("frame");
        let before = m.ram().to_vec();
        m.reset(true);
        assert_eq!(m.ram(), &before[..]);
        m.reset(false);
        assert!(m.ram().iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn save_then_load_is_invisible() {
        let mut a = running(&counter_rom());
        for _ in 0..3 {
            a.execute().expect("frame");
        }
        let blob = a.save_state().expect("save");
        let expected: Vec<Vec<u32>> = (0..5)
            .map(|_| a.execute().expect("frame").pixels.to_vec())
            .collect();

        a.load_state(&blob).expect("load");
        for want in expected {
            assert_eq!(a.execute().expect("frame").pixels, &want[..]);
        }
    }

    #[test]
    fn corrupt_state_is_rejected_atomically() {
        let mut m = running(&counter_rom());
        m.execute().expect("frame");
        let good = m.save_state().expect("save");
        let regs = m.cpu_registers();
        let ram = m.ram().to_vec();

        assert_eq!(m.load_state(&good[..good.len() - 3]).unwrap_err(), StateError::ChunkOverrun {
            tag: "MAPR".into()
        });
        let mut bad_version = good.clone();
        bad_version[4] = 9;
        assert!(matches!(
            m.load_state(&bad_version),
            Err(StateError::IncompatibleState { found: 9, .. })
        ));
        assert_eq!(m.cpu_registers(), regs);
        assert_eq!(m.ram(), &ram[..]);
    }

    #[test]
    fn clock_out_of_step_is_refused() {
        let mut m = running(&counter_rom());
        m.execute().expect("frame");
        let good = m.save_state().expect("save");
        let at = good
            .windows(4)
            .position(|w| w == b"CLK ")
            .expect("clock chunk")
            + 10;
        let mut bad = good.clone();
        bad[at..at + 8].copy_from_slice(&(u64::MAX - 2).to_le_bytes());
        assert!(matches!(m.load_state(&bad), Err(StateError::Invalid(_))));
        assert_eq!(m.save_state().expect("save"), good, "nothing was applied");

        let mut a = running(&counter_rom());
        a.execute().expect("frame");
        let pixels = a.execute().expect("frame").pixels.to_vec();
        assert_eq!(m.execute().expect("frame still runs").pixels, &pixels[..]);
    }

    #[test]
    fn state_from_other_cartridge_is_refused() {
        let mut a = running(&counter_rom());
        let blob = a.save_state().expect("save");
        let mut other = counter_rom();
        other[16] = 0xEA;
        let mut b = running(&other);
        assert_eq!(b.load_state(&blob), Err(StateError::CartridgeMismatch));
    }

    /// Storage a test can still inspect after handing it to a machine.
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<MemoryStorage>>);

    impl BatteryStorage for Shared {
        fn load(&mut self, name: &str) -> Option<Vec<u8>> {
            self.0.borrow_mut().load(name)
        }

        fn save(&mut self, name: &str, data: &[u8]) {
            self.0.borrow_mut().save(name, data);
        }
    }

    #[test]
    fn battery_ram_round_trips_through_storage() {
        let mut image = counter_rom();
        image[6] |= 0x02;
        let storage = Shared::default();

        let mut m = Machine::new(Config::default());
        m.set_battery_storage(Box::new(storage.clone()));
        let info = m.load(&image, None).expect("loads");
        assert!(info.battery);
        m.power(true);
        m.bus.write_register(0x6000, 0x42);
        m.unload();
        let saved = storage.0.borrow().get(&save_name(info.crc32)).map(<[u8]>::to_vec);
        assert_eq!(saved.as_deref().map(|d| d[0]), Some(0x42));

        let mut m = Machine::new(Config::default());
        m.set_battery_storage(Box::new(storage.clone()));
        m.load(&image, None).expect("loads");
        m.power(true);
        assert_eq!(m.peek(0x6000), 0x42);
    }

    #[test]
    fn battery_save_of_wrong_size_is_ignored() {
        let mut image = counter_rom();
        image[6] |= 0x02;
        let storage = Shared::default();
        let crc = Cartridge::load(&image, &MapperRegistry::with_builtin(), &Database::new(), None)
            .expect("loads")
            .crc32();
        storage.0.borrow_mut().insert(save_name(crc), vec![0x99; 16]);

        let mut m = Machine::new(Config::default());
        m.set_battery_storage(Box::new(storage));
        m.load(&image, None).expect("loads");
        m.power(true);
        assert_eq!(m.peek(0x6000), 0x00);
    }

    #[test]
    fn input_reaches_the_ports() {
        let mut m = running(&counter_rom());
        m.set_input(FrameInput {
            pads: [Buttons::empty(), Buttons::B, Buttons::empty(), Buttons::empty()],
            ..FrameInput::default()
        });
        m.bus.write_register(0x4016, 1);
        m.bus.write_register(0x4016, 0);
        assert_eq!(m.bus.read_register(0x4017) & 1, 0);
        assert_eq!(m.bus.read_register(0x4017) & 1, 1);
    }

    #[test]
    fn disassembles_from_the_cartridge() {
        let mut m = running(&counter_rom());
        assert_eq!(m.disassemble(0x8000), ("LDA #$80".to_string(), 2));
        assert_eq!(m.disassemble(0x8005), ("JMP $8005".to_string(), 3));
    }

    #[test]
    fn fds_commands_without_disk_report_absence() {
        let mut m = running(&counter_rom());
        assert!(!m.fds_insert(0));
        assert_eq!(m.fds_side_count(), 0);
        assert_eq!(m.fds_disk_patch(), Err(PatchError::NoDisk));
    }
}
