//! Headless runner: `famicore [ROM] [FRAMES] [FDS_BIOS]`.
//!
//! Without a ROM it runs a built-in NROM demo. Prints the CPU registers, a
//! checksum of the last frame and the audio produced.

use std::error::Error;
use std::process::ExitCode;

use famicore::crc32::crc32;
use famicore::{Config, Machine};

const DEFAULT_FRAMES: u64 = 60;

fn build_demo_ines() -> Vec<u8> {
    let mut header = Vec::with_capacity(16);
    header.extend_from_slice(b"NES\x1A");
    header.push(1); // 1 x 16KB PRG
    header.push(1); // 1 x 8KB CHR
    header.push(0); // horizontal mirroring
    header.push(0);
    header.push(1); // 8KB PRG-RAM
    header.extend_from_slice(&[0u8; 7]);

    let mut prg = vec![0xEAu8; 16 * 1024];
    let program: &[u8] = &[
        0xA9, 0x3F, // LDA #$3F
        0x8D, 0x06, 0x20, // STA $2006
        0xA9, 0x00, // LDA #$00
        0x8D, 0x06, 0x20, // STA $2006
        0xA9, 0x21, // LDA #$21 (sky blue backdrop)
        0x8D, 0x07, 0x20, // STA $2007
        0xA9, 0x0A, // LDA #$0A
        0x8D, 0x01, 0x20, // STA $2001 (show background)
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000 (NMI on)
        0x4C, 0x19, 0x80, // JMP $8019
    ];
    prg[..program.len()].copy_from_slice(program);
    // NMI at $9000: INC $00 ; RTI
    prg[0x1000..0x1003].copy_from_slice(&[0xE6, 0x00, 0x40]);
    for (offset, target) in [(0x3FFA, 0x9000u16), (0x3FFC, 0x8000), (0x3FFE, 0x8000)] {
        prg[offset..offset + 2].copy_from_slice(&target.to_le_bytes());
    }

    let mut rom = header;
    rom.extend_from_slice(&prg);
    rom.extend_from_slice(&[0u8; 8 * 1024]);
    rom
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let frames = match args.get(1) {
        Some(n) => n.parse::<u64>()?,
        None => DEFAULT_FRAMES,
    };

    let mut machine = Machine::new(Config::default());
    let info = match args.first() {
        Some(path) if path.to_ascii_lowercase().ends_with(".fds") => {
            let bios_path = args.get(2).ok_or("disk images need a BIOS path as the third argument")?;
            machine.load_disk(&std::fs::read(path)?, &std::fs::read(bios_path)?, None)?
        }
        Some(path) => machine.load(&std::fs::read(path)?, None)?,
        None => machine.load(&build_demo_ines(), None)?,
    };
    println!(
        "mapper {} ({:?}), {:?}, CRC {:08X}",
        info.mapper, info.format, info.region, info.crc32
    );

    machine.power(true);
    let mut samples = 0usize;
    let mut checksum = 0u32;
    for _ in 0..frames {
        let frame = machine.execute()?;
        samples += frame.samples.len();
        let bytes: Vec<u8> = frame.pixels.iter().flat_map(|p| p.to_le_bytes()).collect();
        checksum = crc32(&bytes);
    }

    let regs = machine.cpu_registers();
    println!("frames: {}", machine.frame_count());
    println!("A: 0x{:02X}", regs.a);
    println!("X: 0x{:02X}", regs.x);
    println!("Y: 0x{:02X}", regs.y);
    println!("SP: 0x{:02X}", regs.sp);
    println!("PC: 0x{:04X}", regs.pc);
    println!("P (flags): 0b{:08b}", regs.status);
    println!("next: {}", machine.disassemble(regs.pc).0);
    println!("mem[0x0000]: 0x{:02X}", machine.peek(0x0000));
    println!("frame CRC: {checksum:08X}");
    println!("audio samples: {samples}");

    #[cfg(feature = "screenshot")]
    {
        machine.screenshot().save("famicore.png")?;
        println!("screenshot: famicore.png");
    }
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("famicore: {e}");
            ExitCode::FAILURE
        }
    }
}
