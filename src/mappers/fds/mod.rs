/*!
Famicom Disk System: RAM adapter, disk drive and wavetable sound.

Memory:
- $6000-$DFFF: 32 KiB PRG-RAM
- $E000-$FFFF: 8 KiB BIOS ROM
- PPU $0000-$1FFF: 8 KiB CHR-RAM

Registers:
- $4020/$4021: timer IRQ reload value (low/high)
- $4022: timer IRQ control (bit 0 repeat, bit 1 enable)
- $4023: master I/O enable (bit 0 disk, bit 1 sound)
- $4024: write data
- $4025: control (motor, transfer reset, read mode, mirroring, CRC, ready,
  disk IRQ enable)
- $4026: external connector output
- $4030: status (timer IRQ, byte transferred, end of head, disk I/O enabled),
  reading acknowledges both IRQ sources
- $4031: read data
- $4032: drive status (no disk, not ready, write protected)
- $4033: external connector input; bit 7 reports a good battery

Drive:
- The head walks the gap-framed side one byte every 150 CPU cycles while the
  motor runs; returning to the start of the side costs 50 000 cycles.
- In read mode the first non-zero byte after the gap starts the transfer and
  each later byte raises the disk IRQ if enabled. In write mode bytes from
  $4024 are stored, followed by the running CRC when $4025 bit 4 is set.
- Every written byte marks the disk dirty; `disk_patch` reports the
  difference against the loaded image as a UPS patch.
*/

pub mod audio;
pub mod disk;
pub mod ups;

use log::{debug, info};

use self::audio::FdsAudio;
use crate::cartridge::FDS_MAPPER;
use crate::error::{LoadError, PatchError, StateError};
use crate::mapper::{Mapper, Mirroring};
use crate::state::{StateReader, StateWriter};

pub const BIOS_SIZE: usize = 0x2000;
const PRG_RAM_SIZE: usize = 0x8000;
const CHR_RAM_SIZE: usize = 0x2000;

const BYTE_CYCLES: u32 = 150;
const HEAD_RETURN_CYCLES: u32 = 50_000;
/// Delay between ejecting one side and the next one becoming visible.
pub const INSERT_DELAY_CYCLES: u32 = 1_800_000;

pub struct Fds {
    bios: Vec<u8>,
    prg_ram: Vec<u8>,
    chr_ram: Vec<u8>,

    /// Sides as loaded, raw format; the base of disk patches.
    original: Vec<Vec<u8>>,
    /// Sides as the drive sees them, gap-framed and possibly written to.
    sides: Vec<Vec<u8>>,
    modified: bool,

    side: Option<usize>,
    pending_insert: Option<(usize, u32)>,

    // Timer IRQ
    irq_reload: u16,
    irq_counter: u16,
    irq_repeat: bool,
    irq_enabled: bool,
    timer_irq: bool,

    // I/O enables and control
    disk_io: bool,
    sound_io: bool,
    motor_on: bool,
    reset_transfer: bool,
    read_mode: bool,
    horizontal: bool,
    crc_control: bool,
    disk_ready: bool,
    disk_irq_enabled: bool,
    ext_out: u8,

    // Drive
    position: usize,
    delay: u32,
    end_of_head: bool,
    scanning: bool,
    gap_ended: bool,
    transfer_complete: bool,
    need_irq: bool,
    disk_irq: bool,
    read_data: u8,
    write_data: u8,
    crc: u16,
    prev_crc_control: bool,

    audio: FdsAudio,
}

impl std::fmt::Debug for Fds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fds")
            .field("sides", &self.sides.len())
            .field("side", &self.side)
            .field("motor_on", &self.motor_on)
            .field("position", &self.position)
            .field("modified", &self.modified)
            .finish()
    }
}

impl Fds {
    /// Build the unit from a `.fds` image and the 8 KiB BIOS.
    pub fn new(disk: &[u8], bios: &[u8]) -> Result<Self, LoadError> {
        if bios.len() != BIOS_SIZE {
            return Err(LoadError::MissingBios);
        }
        let original = disk::parse_image(disk)?;
        let sides = original.iter().map(|s| disk::add_gaps(s)).collect();
        info!("FDS: {} disk side(s)", original.len());
        Ok(Self {
            bios: bios.to_vec(),
            prg_ram: vec![0; PRG_RAM_SIZE],
            chr_ram: vec![0; CHR_RAM_SIZE],
            original,
            sides,
            modified: false,
            side: None,
            pending_insert: None,
            irq_reload: 0,
            irq_counter: 0,
            irq_repeat: false,
            irq_enabled: false,
            timer_irq: false,
            disk_io: false,
            sound_io: false,
            motor_on: false,
            reset_transfer: false,
            read_mode: true,
            horizontal: false,
            crc_control: false,
            disk_ready: false,
            disk_irq_enabled: false,
            ext_out: 0,
            position: 0,
            delay: 0,
            end_of_head: true,
            scanning: false,
            gap_ended: false,
            transfer_complete: false,
            need_irq: false,
            disk_irq: false,
            read_data: 0,
            write_data: 0,
            crc: 0,
            prev_crc_control: false,
            audio: FdsAudio::default(),
        })
    }

    /// Raw image bytes as loaded (all sides, no header).
    pub fn original_image(&self) -> Vec<u8> {
        self.original.concat()
    }

    /// Raw image bytes including everything the BIOS wrote.
    pub fn current_image(&self) -> Vec<u8> {
        self.sides.iter().map(|s| disk::remove_gaps(s)).collect::<Vec<_>>().concat()
    }

    pub fn side_count(&self) -> usize {
        self.sides.len()
    }

    pub fn inserted_side(&self) -> Option<usize> {
        self.side
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Insert `side` now. Out-of-range sides are ignored.
    pub fn insert(&mut self, side: usize) {
        if side >= self.sides.len() {
            debug!("FDS: ignoring insert of side {side}");
            return;
        }
        debug!("FDS: insert side {side}");
        self.side = Some(side);
        self.pending_insert = None;
        self.end_of_head = true;
    }

    pub fn eject(&mut self) {
        debug!("FDS: eject");
        self.side = None;
        self.pending_insert = None;
        self.scanning = false;
    }

    /// Eject, then insert the following side (wrapping) after the insert delay.
    pub fn change_side(&mut self) {
        let next = match self.side.or(self.pending_insert.map(|(s, _)| s)) {
            Some(s) => (s + 1) % self.sides.len(),
            None => 0,
        };
        self.eject();
        self.pending_insert = Some((next, INSERT_DELAY_CYCLES));
    }

    /// UPS patch from the loaded image to the current disk contents.
    pub fn disk_patch(&self) -> Vec<u8> {
        ups::create(&self.original_image(), &self.current_image())
    }

    /// Replace the disk contents with the loaded image patched by `patch`.
    pub fn apply_disk_patch(&mut self, patch: &[u8]) -> Result<(), PatchError> {
        let source = self.original_image();
        let target = ups::apply(&source, patch)?;
        if target.len() != source.len() {
            return Err(PatchError::SizeMismatch {
                expected: source.len() as u64,
                actual: target.len() as u64,
            });
        }
        self.sides = target
            .chunks(disk::SIDE_SIZE)
            .map(disk::add_gaps)
            .collect();
        self.modified = target != source;
        Ok(())
    }

    fn update_crc(&mut self, value: u8) {
        let mut n = 0x01u16;
        while n <= 0x80 {
            let carry = self.crc & 1;
            self.crc >>= 1;
            if carry != 0 {
                self.crc ^= 0x8408;
            }
            if value as u16 & n != 0 {
                self.crc ^= 0x8000;
            }
            n <<= 1;
        }
    }

    fn clock_timer_irq(&mut self) {
        if !self.irq_enabled {
            return;
        }
        if self.irq_counter == 0 {
            self.timer_irq = true;
            self.irq_counter = self.irq_reload;
            if !self.irq_repeat {
                self.irq_enabled = false;
            }
        } else {
            self.irq_counter -= 1;
        }
    }

    fn clock_drive(&mut self) {
        if let Some((side, left)) = self.pending_insert {
            if left <= 1 {
                self.insert(side);
            } else {
                self.pending_insert = Some((side, left - 1));
            }
        }

        let Some(side) = self.side else {
            self.end_of_head = true;
            self.scanning = false;
            return;
        };
        if !self.motor_on {
            self.end_of_head = true;
            self.scanning = false;
            return;
        }
        if self.reset_transfer && !self.scanning {
            return;
        }
        if self.end_of_head {
            self.delay = HEAD_RETURN_CYCLES;
            self.end_of_head = false;
            self.position = 0;
            self.gap_ended = false;
            return;
        }
        if self.delay > 0 {
            self.delay -= 1;
            return;
        }

        self.scanning = true;
        let mut data;
        if self.read_mode {
            data = self.sides[side][self.position];
            if !self.prev_crc_control {
                self.update_crc(data);
            }
            if !self.disk_ready {
                self.gap_ended = false;
                self.crc = 0;
            } else if data != 0 && !self.gap_ended {
                self.gap_ended = true;
                self.need_irq = false;
            }
            if self.gap_ended {
                self.transfer_complete = true;
                self.read_data = data;
                if self.need_irq {
                    self.disk_irq = true;
                }
                self.need_irq = self.disk_irq_enabled;
            }
        } else {
            data = 0;
            if !self.crc_control {
                self.transfer_complete = true;
                data = self.write_data;
                if self.need_irq {
                    self.disk_irq = true;
                }
                self.need_irq = self.disk_irq_enabled;
            }
            if !self.disk_ready {
                data = 0;
            }
            if !self.crc_control {
                self.update_crc(data);
            } else {
                if !self.prev_crc_control {
                    self.update_crc(0);
                    self.update_crc(0);
                }
                data = self.crc as u8;
                self.crc >>= 8;
            }
            if self.sides[side][self.position] != data {
                self.sides[side][self.position] = data;
                self.modified = true;
            }
            self.gap_ended = false;
        }

        self.prev_crc_control = self.crc_control;
        self.position += 1;
        if self.position >= self.sides[side].len() {
            self.motor_on = false;
            self.end_of_head = true;
        } else {
            self.delay = BYTE_CYCLES - 1;
        }
    }

    fn write_register(&mut self, addr: u16, value: u8) {
        if !self.disk_io && addr != 0x4023 && addr < 0x4040 {
            return;
        }
        match addr {
            0x4020 => self.irq_reload = (self.irq_reload & 0xFF00) | value as u16,
            0x4021 => self.irq_reload = (self.irq_reload & 0x00FF) | ((value as u16) << 8),
            0x4022 => {
                self.irq_repeat = value & 0x01 != 0;
                self.irq_enabled = value & 0x02 != 0 && self.disk_io;
                if self.irq_enabled {
                    self.irq_counter = self.irq_reload;
                } else {
                    self.timer_irq = false;
                }
            }
            0x4023 => {
                self.disk_io = value & 0x01 != 0;
                self.sound_io = value & 0x02 != 0;
                if !self.disk_io {
                    self.irq_enabled = false;
                    self.timer_irq = false;
                    self.disk_irq = false;
                }
            }
            0x4024 => {
                self.write_data = value;
                self.transfer_complete = false;
                self.disk_irq = false;
            }
            0x4025 => {
                self.motor_on = value & 0x01 != 0;
                self.reset_transfer = value & 0x02 != 0;
                self.read_mode = value & 0x04 != 0;
                self.horizontal = value & 0x08 != 0;
                self.crc_control = value & 0x10 != 0;
                self.disk_ready = value & 0x40 != 0;
                self.disk_irq_enabled = value & 0x80 != 0;
                self.disk_irq = false;
            }
            0x4026 => self.ext_out = value,
            0x4040..=0x408A if self.sound_io => self.audio.write(addr, value),
            _ => {}
        }
    }

    fn read_register(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x4030 if self.disk_io => {
                let mut v = 0;
                if self.timer_irq {
                    v |= 0x01;
                }
                if self.transfer_complete {
                    v |= 0x02;
                }
                if self.end_of_head {
                    v |= 0x40;
                }
                if self.disk_io {
                    v |= 0x80;
                }
                self.transfer_complete = false;
                self.timer_irq = false;
                self.disk_irq = false;
                Some(v)
            }
            0x4031 if self.disk_io => {
                self.transfer_complete = false;
                self.disk_irq = false;
                Some(self.read_data)
            }
            0x4032 if self.disk_io => {
                let mut v = 0x40;
                if self.side.is_none() {
                    v |= 0x07;
                } else if !self.scanning {
                    v |= 0x02;
                }
                Some(v)
            }
            0x4033 if self.disk_io => Some((self.ext_out & 0x7F) | 0x80),
            0x4040..=0x4092 if self.sound_io => self.audio.read(addr),
            _ => None,
        }
    }
}

impl Mapper for Fds {
    fn mapper_id(&self) -> u16 {
        FDS_MAPPER
    }

    fn cpu_read(&mut self, addr: u16) -> Option<u8> {
        match addr {
            0x4020..=0x409F => self.read_register(addr),
            0x6000..=0xDFFF => Some(self.prg_ram[(addr - 0x6000) as usize]),
            0xE000..=0xFFFF => Some(self.bios[(addr - 0xE000) as usize]),
            _ => None,
        }
    }

    fn cpu_write(&mut self, addr: u16, value: u8) {
        match addr {
            0x4020..=0x409F => self.write_register(addr, value),
            0x6000..=0xDFFF => self.prg_ram[(addr - 0x6000) as usize] = value,
            _ => {}
        }
    }

    fn ppu_read(&mut self, addr: u16) -> u8 {
        self.chr_ram[(addr & 0x1FFF) as usize]
    }

    fn ppu_write(&mut self, addr: u16, value: u8) {
        self.chr_ram[(addr & 0x1FFF) as usize] = value;
    }

    fn mirroring(&self) -> Mirroring {
        if self.horizontal {
            Mirroring::Horizontal
        } else {
            Mirroring::Vertical
        }
    }

    fn reset(&mut self, hard: bool) {
        self.irq_enabled = false;
        self.timer_irq = false;
        self.disk_irq = false;
        self.motor_on = false;
        self.end_of_head = true;
        self.scanning = false;
        if hard {
            self.prg_ram.fill(0);
            self.chr_ram.fill(0);
            self.disk_io = false;
            self.sound_io = false;
            self.audio = FdsAudio::default();
        }
    }

    fn tick(&mut self, cpu_cycles: u32) {
        for _ in 0..cpu_cycles {
            self.clock_timer_irq();
            self.clock_drive();
            self.audio.clock();
        }
    }

    fn irq_pending(&self) -> bool {
        self.timer_irq || self.disk_irq
    }

    fn expansion_audio(&self) -> f32 {
        self.audio.output()
    }

    fn save_state(&self, w: &mut StateWriter) {
        w.bytes(&self.prg_ram);
        w.bytes(&self.chr_ram);
        w.u8(self.sides.len() as u8);
        for side in &self.sides {
            w.bytes(side);
        }
        w.bool(self.modified);
        w.u8(self.side.map_or(0xFF, |s| s as u8));
        match self.pending_insert {
            Some((s, left)) => {
                w.u8(s as u8);
                w.u32(left);
            }
            None => {
                w.u8(0xFF);
                w.u32(0);
            }
        }
        w.u16(self.irq_reload);
        w.u16(self.irq_counter);
        for flag in [
            self.irq_repeat,
            self.irq_enabled,
            self.timer_irq,
            self.disk_io,
            self.sound_io,
            self.motor_on,
            self.reset_transfer,
            self.read_mode,
            self.horizontal,
            self.crc_control,
            self.disk_ready,
            self.disk_irq_enabled,
            self.end_of_head,
            self.scanning,
            self.gap_ended,
            self.transfer_complete,
            self.need_irq,
            self.disk_irq,
            self.prev_crc_control,
        ] {
            w.bool(flag);
        }
        w.u8(self.ext_out);
        w.u32(self.position as u32);
        w.u32(self.delay);
        w.u8(self.read_data);
        w.u8(self.write_data);
        w.u16(self.crc);
        self.audio.save(w);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.fill(&mut self.prg_ram)?;
        r.fill(&mut self.chr_ram)?;
        if r.u8()? as usize != self.sides.len() {
            return Err(StateError::Invalid("FDS side count"));
        }
        for side in &mut self.sides {
            let data = r.bytes()?;
            if data.len() < disk::SIDE_SIZE {
                return Err(StateError::Invalid("FDS side length"));
            }
            side.clear();
            side.extend_from_slice(data);
        }
        self.modified = r.bool()?;
        let count = self.sides.len();
        let side_index = |v: u8| -> Result<Option<usize>, StateError> {
            match v {
                0xFF => Ok(None),
                s if (s as usize) < count => Ok(Some(s as usize)),
                _ => Err(StateError::Invalid("FDS side index")),
            }
        };
        self.side = side_index(r.u8()?)?;
        let pending = side_index(r.u8()?)?;
        let left = r.u32()?;
        self.pending_insert = pending.map(|s| (s, left));
        self.irq_reload = r.u16()?;
        self.irq_counter = r.u16()?;
        let mut flags = [false; 19];
        for f in &mut flags {
            *f = r.bool()?;
        }
        [
            self.irq_repeat,
            self.irq_enabled,
            self.timer_irq,
            self.disk_io,
            self.sound_io,
            self.motor_on,
            self.reset_transfer,
            self.read_mode,
            self.horizontal,
            self.crc_control,
            self.disk_ready,
            self.disk_irq_enabled,
            self.end_of_head,
            self.scanning,
            self.gap_ended,
            self.transfer_complete,
            self.need_irq,
            self.disk_irq,
            self.prev_crc_control,
        ] = flags;
        self.ext_out = r.u8()?;
        self.position = r.u32()? as usize;
        if let Some(s) = self.side {
            if self.position > self.sides[s].len() {
                return Err(StateError::Invalid("FDS head position"));
            }
        }
        self.delay = r.u32()?;
        self.read_data = r.u8()?;
        self.write_data = r.u8()?;
        self.crc = r.u16()?;
        self.audio.load(r)
    }

    fn as_fds(&self) -> Option<&Fds> {
        Some(self)
    }

    fn as_fds_mut(&mut self) -> Option<&mut Fds> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::disk::tests::sample_side;
    use super::*;

    fn setup() -> Fds {
        let mut image = sample_side(b"GAME DATA");
        image.extend_from_slice(&sample_side(b"SIDE B"));
        let mut fds = Fds::new(&image, &vec![0xEA; BIOS_SIZE]).expect("disk");
        fds.reset(true);
        fds.cpu_write(0x4023, 0x03);
        fds
    }

    /// Run the drive until a byte has been transferred.
    fn wait_byte(fds: &mut Fds) {
        for _ in 0..1_000_000 {
            fds.tick(1);
            if fds.transfer_complete {
                return;
            }
        }
        panic!("drive produced no byte");
    }

    fn next_byte(fds: &mut Fds) -> u8 {
        wait_byte(fds);
        fds.cpu_read(0x4031).unwrap_or(0)
    }

    #[test]
    fn bios_must_be_8k() {
        let image = sample_side(b"x");
        assert!(matches!(Fds::new(&image, &[0; 100]), Err(LoadError::MissingBios)));
    }

    #[test]
    fn memory_map() {
        let mut fds = setup();
        assert_eq!(fds.cpu_read(0xE000), Some(0xEA));
        fds.cpu_write(0x6000, 1);
        fds.cpu_write(0xDFFF, 2);
        assert_eq!(fds.cpu_read(0x6000), Some(1));
        assert_eq!(fds.cpu_read(0xDFFF), Some(2));
        fds.cpu_write(0xE000, 0);
        assert_eq!(fds.cpu_read(0xE000), Some(0xEA), "BIOS is ROM");
    }

    #[test]
    fn drive_status_tracks_insertion() {
        let mut fds = setup();
        assert_eq!(fds.cpu_read(0x4032).map(|v| v & 0x07), Some(0x07));
        fds.insert(0);
        assert_eq!(fds.cpu_read(0x4032).map(|v| v & 0x01), Some(0));
    }

    #[test]
    fn reads_first_block_after_gap() {
        let mut fds = setup();
        fds.insert(0);
        fds.cpu_write(0x4025, 0x45); // motor, read mode, ready
        assert_eq!(next_byte(&mut fds), 0x80, "start mark ends the gap");
        assert_eq!(next_byte(&mut fds), 0x01, "disk info block");
        assert_eq!(next_byte(&mut fds), b'*');
    }

    #[test]
    fn byte_transfer_raises_disk_irq() {
        let mut fds = setup();
        fds.insert(0);
        fds.cpu_write(0x4025, 0xC5);
        next_byte(&mut fds);
        assert!(!fds.irq_pending(), "the start mark itself does not interrupt");
        wait_byte(&mut fds);
        assert!(fds.irq_pending());
        fds.cpu_read(0x4030);
        assert!(!fds.irq_pending(), "$4030 acknowledges");
    }

    #[test]
    fn timer_irq_one_shot() {
        let mut fds = setup();
        fds.cpu_write(0x4020, 10);
        fds.cpu_write(0x4021, 0);
        fds.cpu_write(0x4022, 0x02);
        fds.tick(10);
        assert!(!fds.irq_pending());
        fds.tick(1);
        assert!(fds.irq_pending());
        assert!(!fds.irq_enabled, "non-repeating timer disables itself");
    }

    #[test]
    fn writes_become_a_patch() {
        let mut fds = setup();
        fds.insert(0);
        fds.cpu_write(0x4025, 0x45);
        next_byte(&mut fds);
        // Switch to write mode partway into the first block.
        fds.cpu_write(0x4024, 0x99);
        fds.cpu_write(0x4025, 0x41);
        for _ in 0..BYTE_CYCLES * 2 {
            fds.tick(1);
        }
        assert!(fds.is_modified());
        let patch = fds.disk_patch();
        let mut restored = setup();
        restored.apply_disk_patch(&patch).expect("patch");
        assert_eq!(restored.current_image(), fds.current_image());
        assert!(restored.is_modified());
    }

    #[test]
    fn change_side_waits_for_insert_delay() {
        let mut fds = setup();
        fds.insert(0);
        fds.change_side();
        assert_eq!(fds.inserted_side(), None);
        fds.tick(INSERT_DELAY_CYCLES);
        assert_eq!(fds.inserted_side(), Some(1));
        assert_eq!(fds.side_count(), 2);
    }

    #[test]
    fn state_round_trip_includes_disk() {
        let mut fds = setup();
        fds.insert(1);
        fds.cpu_write(0x6123, 0x42);
        let mut w = StateWriter::new();
        Mapper::save_state(&fds, &mut w);
        let bytes = w.into_bytes();
        let mut other = setup();
        Mapper::load_state(&mut other, &mut StateReader::new(&bytes)).expect("load");
        assert_eq!(other.inserted_side(), Some(1));
        assert_eq!(other.cpu_read(0x6123), Some(0x42));
    }
}
