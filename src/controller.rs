/*!
Input devices on the $4016/$4017 serial ports.

Behavior:
- Button bits are in the order the CPU shifts them out:
  A, B, Select, Start, Up, Down, Left, Right  (bit 0 through bit 7)
- Writing $4016 bit 0 drives the strobe line. While it is high every port
  reloads from the live input, so reads keep returning the first bit. The
  falling edge leaves the snapshot in the shift registers.
- With strobe low, each read returns the next bit and shifts a 1 in behind it,
  so a standard pad reads 1 after its 8 buttons.

Devices:
- Standard pads on ports 1 and 2 (data line D0).
- Four Score (NES): each port shifts 24 bits: pad 1/2, pad 3/4, then the
  adapter signature ($4016: read 20 high, $4017: read 19 high).
- Famicom expansion pads: pads 3 and 4 arrive on D1 of $4016/$4017.
- Zapper on port 2: D3 is the light sensor (0 = light seen), D4 the trigger.
  Light is taken from the frame being drawn: a bright pixel near the aim point
  the beam passed within the last few scanlines.
*/

use bitflags::bitflags;

use crate::config::Region;
use crate::error::StateError;
use crate::ppu::{NES_HEIGHT, NES_WIDTH, Ppu, entry_rgb};
use crate::state::{StateReader, StateWriter, Stateful};

bitflags! {
    /// Pad buttons, one bit per button in serial order.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Buttons: u8 {
        const A      = 1 << 0;
        const B      = 1 << 1;
        const SELECT = 1 << 2;
        const START  = 1 << 3;
        const UP     = 1 << 4;
        const DOWN   = 1 << 5;
        const LEFT   = 1 << 6;
        const RIGHT  = 1 << 7;
    }
}

/// Light gun aim in screen pixels plus trigger. Coordinates outside the
/// 256x240 picture mean the gun points off screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZapperState {
    pub x: i32,
    pub y: i32,
    pub trigger: bool,
}

impl Default for ZapperState {
    fn default() -> Self {
        Self { x: -1, y: -1, trigger: false }
    }
}

impl ZapperState {
    pub fn on_screen(&self) -> bool {
        (0..NES_WIDTH as i32).contains(&self.x) && (0..NES_HEIGHT as i32).contains(&self.y)
    }
}

/// Everything the host latches before one `execute()`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub pads: [Buttons; 4],
    pub zapper: ZapperState,
}

/// Pixels around the aim point checked for light.
const ZAPPER_RADIUS: i32 = 3;
/// Scanlines the sensor keeps reporting after the beam passes.
const ZAPPER_PERSISTENCE: i32 = 20;
/// Minimum luma (0..=255) counted as "light".
const ZAPPER_LUMA: u32 = 85;

const FOUR_SCORE_SIGNATURE: [u32; 2] = [0x08, 0x04];

/// Which devices hang off the two ports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortLayout {
    pub four_player: bool,
    pub famicom: bool,
    pub zapper: bool,
}

#[derive(Clone, Debug)]
pub struct InputPorts {
    layout: PortLayout,
    input: FrameInput,
    strobe: bool,
    // D0 shift registers; 1s fill in from the top.
    shift: [u32; 2],
    // D1 shift registers (Famicom expansion pads 3/4).
    expansion: [u32; 2],
}

impl InputPorts {
    pub fn new(layout: PortLayout) -> Self {
        Self {
            layout,
            input: FrameInput::default(),
            strobe: false,
            shift: [0xFFFF_FFFF; 2],
            expansion: [0xFFFF_FFFF; 2],
        }
    }

    pub fn layout(&self) -> PortLayout {
        self.layout
    }

    pub fn set_input(&mut self, input: FrameInput) {
        self.input = input;
        if self.strobe {
            self.latch();
        }
    }

    pub fn input(&self) -> &FrameInput {
        &self.input
    }

    /// CPU write to $4016.
    pub fn write_strobe(&mut self, value: u8) {
        self.strobe = value & 1 != 0;
        if self.strobe {
            self.latch();
        }
    }

    fn latch(&mut self) {
        let pads = self.input.pads.map(|b| b.bits() as u32);
        let expansion_pads = self.layout.famicom && self.layout.four_player;
        let four_score = !self.layout.famicom && self.layout.four_player;
        for port in 0..2 {
            self.shift[port] = if four_score {
                pads[port] | (pads[port + 2] << 8) | (FOUR_SCORE_SIGNATURE[port] << 16) | 0xFF00_0000
            } else {
                pads[port] | 0xFFFF_FF00
            };
            self.expansion[port] = if expansion_pads {
                pads[port + 2] | 0xFFFF_FF00
            } else {
                0
            };
        }
    }

    /// CPU read of $4016 (`port` 0) or $4017 (`port` 1). Only D0..D4 are
    /// driven; the bus fills the rest from open bus.
    pub fn read(&mut self, port: usize, ppu: &Ppu) -> u8 {
        if self.strobe {
            self.latch();
        }
        if port == 1 && self.layout.zapper {
            let mut value = 0;
            if !self.light_sensed(ppu) {
                value |= 0x08;
            }
            if self.input.zapper.trigger {
                value |= 0x10;
            }
            return value;
        }
        let mut value = (self.shift[port] & 1) as u8;
        value |= ((self.expansion[port] & 1) as u8) << 1;
        if !self.strobe {
            self.shift[port] = (self.shift[port] >> 1) | 0x8000_0000;
            if self.expansion[port] != 0 {
                self.expansion[port] = (self.expansion[port] >> 1) | 0x8000_0000;
            }
        }
        value
    }

    /// Side-effect-free view of a port read.
    pub fn peek(&self, port: usize) -> u8 {
        (self.shift[port] & 1) as u8 | (((self.expansion[port] & 1) as u8) << 1)
    }

    fn light_sensed(&self, ppu: &Ppu) -> bool {
        let aim = self.input.zapper;
        if !aim.on_screen() {
            return false;
        }
        let scanline = ppu.scanline() as i32;
        let dot = ppu.dot() as i32;
        let swap = matches!(ppu.region(), Region::Pal | Region::Dendy);
        let frame = ppu.frame_buffer();
        for y in (aim.y - ZAPPER_RADIUS)..=(aim.y + ZAPPER_RADIUS) {
            if !(0..NES_HEIGHT as i32).contains(&y) {
                continue;
            }
            // The beam must have drawn this line, and recently.
            if scanline < y || scanline - y > ZAPPER_PERSISTENCE {
                continue;
            }
            for x in (aim.x - ZAPPER_RADIUS)..=(aim.x + ZAPPER_RADIUS) {
                if !(0..NES_WIDTH as i32).contains(&x) || (scanline == y && dot <= x + 1) {
                    continue;
                }
                let entry = frame[y as usize * NES_WIDTH + x as usize];
                let (r, g, b) = entry_rgb(entry, swap);
                let luma = (299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000;
                if luma >= ZAPPER_LUMA {
                    return true;
                }
            }
        }
        false
    }
}

impl Stateful for InputPorts {
    fn save_state(&self, w: &mut StateWriter) {
        w.bool(self.strobe);
        for port in 0..2 {
            w.u32(self.shift[port]);
            w.u32(self.expansion[port]);
        }
        for pad in self.input.pads {
            w.u8(pad.bits());
        }
        w.i32(self.input.zapper.x);
        w.i32(self.input.zapper.y);
        w.bool(self.input.zapper.trigger);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        self.strobe = r.bool()?;
        for port in 0..2 {
            self.shift[port] = r.u32()?;
            self.expansion[port] = r.u32()?;
        }
        for pad in self.input.pads.iter_mut() {
            *pad = Buttons::from_bits_retain(r.u8()?);
        }
        self.input.zapper.x = r.i32()?;
        self.input.zapper.y = r.i32()?;
        self.input.zapper.trigger = r.bool()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(four_player: bool, famicom: bool, zapper: bool) -> InputPorts {
        InputPorts::new(PortLayout { four_player, famicom, zapper })
    }

    fn read_bits(p: &mut InputPorts, port: usize, n: usize, ppu: &Ppu) -> Vec<u8> {
        (0..n).map(|_| p.read(port, ppu) & 1).collect()
    }

    #[test]
    fn serial_shift_behaviour() {
        let ppu = Ppu::new(Region::Ntsc);
        let mut p = ports(false, false, false);
        let mut input = FrameInput::default();
        input.pads[0] = Buttons::A | Buttons::START | Buttons::LEFT;
        p.set_input(input);

        p.write_strobe(1);
        p.write_strobe(0);
        assert_eq!(read_bits(&mut p, 0, 8, &ppu), [1, 0, 0, 1, 0, 0, 1, 0]);
        assert_eq!(p.read(0, &ppu), 1);
        assert_eq!(p.read(0, &ppu), 1);
    }

    #[test]
    fn strobe_high_always_returns_a() {
        let ppu = Ppu::new(Region::Ntsc);
        let mut p = ports(false, false, false);
        let mut input = FrameInput::default();
        input.pads[1] = Buttons::A;
        p.set_input(input);
        p.write_strobe(1);
        for _ in 0..16 {
            assert_eq!(p.read(1, &ppu), 1);
        }
        input.pads[1] = Buttons::empty();
        p.set_input(input);
        assert_eq!(p.read(1, &ppu), 0);
    }

    #[test]
    fn four_score_reports_pads_and_signature() {
        let ppu = Ppu::new(Region::Ntsc);
        let mut p = ports(true, false, false);
        let mut input = FrameInput::default();
        input.pads[0] = Buttons::B;
        input.pads[2] = Buttons::RIGHT;
        input.pads[3] = Buttons::A;
        p.set_input(input);
        p.write_strobe(1);
        p.write_strobe(0);

        let port0 = read_bits(&mut p, 0, 24, &ppu);
        assert_eq!(port0[1], 1);
        assert_eq!(port0[15], 1);
        let signature: Vec<u8> = port0[16..].to_vec();
        assert_eq!(signature, [0, 0, 0, 1, 0, 0, 0, 0]);

        let port1 = read_bits(&mut p, 1, 24, &ppu);
        assert_eq!(port1[8], 1);
        assert_eq!(&port1[16..], [0, 0, 1, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn famicom_expansion_pads_use_d1() {
        let ppu = Ppu::new(Region::Famicom);
        let mut p = ports(true, true, false);
        let mut input = FrameInput::default();
        input.pads[2] = Buttons::A;
        input.pads[3] = Buttons::B;
        p.set_input(input);
        p.write_strobe(1);
        p.write_strobe(0);
        assert_eq!(p.read(0, &ppu), 0b10);
        assert_eq!(p.read(1, &ppu), 0b00);
        assert_eq!(p.read(1, &ppu), 0b10);
    }

    #[test]
    fn zapper_reports_trigger_and_darkness() {
        let ppu = Ppu::new(Region::Ntsc);
        let mut p = ports(false, false, true);
        let mut input = FrameInput::default();
        input.zapper = ZapperState { x: 100, y: 100, trigger: true };
        p.set_input(input);
        // Fresh PPU: black frame, so no light is seen.
        assert_eq!(p.read(1, &ppu), 0x18);
        input.zapper = ZapperState::default();
        p.set_input(input);
        assert_eq!(p.read(1, &ppu), 0x08);
    }

    #[test]
    fn state_round_trip_preserves_shift_position() {
        let ppu = Ppu::new(Region::Ntsc);
        let mut p = ports(false, false, false);
        let mut input = FrameInput::default();
        input.pads[0] = Buttons::SELECT | Buttons::DOWN;
        p.set_input(input);
        p.write_strobe(1);
        p.write_strobe(0);
        p.read(0, &ppu);

        let mut w = StateWriter::new();
        p.save_state(&mut w);
        let bytes = w.into_bytes();
        let mut q = ports(false, false, false);
        q.load_state(&mut StateReader::new(&bytes)).expect("load");
        assert_eq!(read_bits(&mut q, 0, 7, &ppu), read_bits(&mut p, 0, 7, &ppu));
    }
}
