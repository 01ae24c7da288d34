/*!
table.rs - Opcode metadata for all 256 encodings.

Each entry names the operation, its addressing mode and the documented base
cycle count (no page-cross or branch penalties). The dispatcher uses the
operation and mode; the cycle column is the reference the timing tests hold
the bus-accurate core against, and feeds the trace disassembly.

Unofficial opcodes use the common names (SLO, RLA, SRE, RRA, SAX, LAX, DCP,
ISC, ANC, ALR, ARR, XAA, LXA, AXS, SHA, SHX, SHY, TAS, LAS); the twelve
halting encodings are `JAM`.
*/

use self::Mode::*;
use self::Op::*;

/// Instruction mnemonic.
#[rustfmt::skip]
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
    CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
    JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
    RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
    // Unofficial
    SLO, RLA, SRE, RRA, SAX, LAX, DCP, ISC, ANC, ALR, ARR, XAA, LXA, AXS,
    SHA, SHX, SHY, TAS, LAS, JAM,
}

/// Addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Imp,
    Acc,
    Imm,
    Rel,
    Zp,
    Zpx,
    Zpy,
    Abs,
    Abx,
    Aby,
    Ind,
    Izx,
    Izy,
}

/// How an instruction uses its effective address. Indexed modes only take
/// the extra (dummy-read) cycle on a page cross for `Read`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadModifyWrite,
}

impl Op {
    pub fn access(self) -> Access {
        match self {
            STA | STX | STY | SAX | SHA | SHX | SHY | TAS => Access::Write,
            ASL | LSR | ROL | ROR | INC | DEC | SLO | RLA | SRE | RRA | DCP | ISC => {
                Access::ReadModifyWrite
            }
            _ => Access::Read,
        }
    }
}

impl Mode {
    /// Operand bytes following the opcode.
    pub fn operand_len(self) -> u16 {
        match self {
            Imp | Acc => 0,
            Imm | Rel | Zp | Zpx | Zpy | Izx | Izy => 1,
            Abs | Abx | Aby | Ind => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode {
    pub op: Op,
    pub mode: Mode,
    pub cycles: u8,
}

#[rustfmt::skip]
const OPS: [(Op, Mode); 256] = [
    // 0x00
    (BRK, Imp), (ORA, Izx), (JAM, Imp), (SLO, Izx), (NOP, Zp),  (ORA, Zp),  (ASL, Zp),  (SLO, Zp),
    (PHP, Imp), (ORA, Imm), (ASL, Acc), (ANC, Imm), (NOP, Abs), (ORA, Abs), (ASL, Abs), (SLO, Abs),
    // 0x10
    (BPL, Rel), (ORA, Izy), (JAM, Imp), (SLO, Izy), (NOP, Zpx), (ORA, Zpx), (ASL, Zpx), (SLO, Zpx),
    (CLC, Imp), (ORA, Aby), (NOP, Imp), (SLO, Aby), (NOP, Abx), (ORA, Abx), (ASL, Abx), (SLO, Abx),
    // 0x20
    (JSR, Abs), (AND, Izx), (JAM, Imp), (RLA, Izx), (BIT, Zp),  (AND, Zp),  (ROL, Zp),  (RLA, Zp),
    (PLP, Imp), (AND, Imm), (ROL, Acc), (ANC, Imm), (BIT, Abs), (AND, Abs), (ROL, Abs), (RLA, Abs),
    // 0x30
    (BMI, Rel), (AND, Izy), (JAM, Imp), (RLA, Izy), (NOP, Zpx), (AND, Zpx), (ROL, Zpx), (RLA, Zpx),
    (SEC, Imp), (AND, Aby), (NOP, Imp), (RLA, Aby), (NOP, Abx), (AND, Abx), (ROL, Abx), (RLA, Abx),
    // 0x40
    (RTI, Imp), (EOR, Izx), (JAM, Imp), (SRE, Izx), (NOP, Zp),  (EOR, Zp),  (LSR, Zp),  (SRE, Zp),
    (PHA, Imp), (EOR, Imm), (LSR, Acc), (ALR, Imm), (JMP, Abs), (EOR, Abs), (LSR, Abs), (SRE, Abs),
    // 0x50
    (BVC, Rel), (EOR, Izy), (JAM, Imp), (SRE, Izy), (NOP, Zpx), (EOR, Zpx), (LSR, Zpx), (SRE, Zpx),
    (CLI, Imp), (EOR, Aby), (NOP, Imp), (SRE, Aby), (NOP, Abx), (EOR, Abx), (LSR, Abx), (SRE, Abx),
    // 0x60
    (RTS, Imp), (ADC, Izx), (JAM, Imp), (RRA, Izx), (NOP, Zp),  (ADC, Zp),  (ROR, Zp),  (RRA, Zp),
    (PLA, Imp), (ADC, Imm), (ROR, Acc), (ARR, Imm), (JMP, Ind), (ADC, Abs), (ROR, Abs), (RRA, Abs),
    // 0x70
    (BVS, Rel), (ADC, Izy), (JAM, Imp), (RRA, Izy), (NOP, Zpx), (ADC, Zpx), (ROR, Zpx), (RRA, Zpx),
    (SEI, Imp), (ADC, Aby), (NOP, Imp), (RRA, Aby), (NOP, Abx), (ADC, Abx), (ROR, Abx), (RRA, Abx),
    // 0x80
    (NOP, Imm), (STA, Izx), (NOP, Imm), (SAX, Izx), (STY, Zp),  (STA, Zp),  (STX, Zp),  (SAX, Zp),
    (DEY, Imp), (NOP, Imm), (TXA, Imp), (XAA, Imm), (STY, Abs), (STA, Abs), (STX, Abs), (SAX, Abs),
    // 0x90
    (BCC, Rel), (STA, Izy), (JAM, Imp), (SHA, Izy), (STY, Zpx), (STA, Zpx), (STX, Zpy), (SAX, Zpy),
    (TYA, Imp), (STA, Aby), (TXS, Imp), (TAS, Aby), (SHY, Abx), (STA, Abx), (SHX, Aby), (SHA, Aby),
    // 0xA0
    (LDY, Imm), (LDA, Izx), (LDX, Imm), (LAX, Izx), (LDY, Zp),  (LDA, Zp),  (LDX, Zp),  (LAX, Zp),
    (TAY, Imp), (LDA, Imm), (TAX, Imp), (LXA, Imm), (LDY, Abs), (LDA, Abs), (LDX, Abs), (LAX, Abs),
    // 0xB0
    (BCS, Rel), (LDA, Izy), (JAM, Imp), (LAX, Izy), (LDY, Zpx), (LDA, Zpx), (LDX, Zpy), (LAX, Zpy),
    (CLV, Imp), (LDA, Aby), (TSX, Imp), (LAS, Aby), (LDY, Abx), (LDA, Abx), (LDX, Aby), (LAX, Aby),
    // 0xC0
    (CPY, Imm), (CMP, Izx), (NOP, Imm), (DCP, Izx), (CPY, Zp),  (CMP, Zp),  (DEC, Zp),  (DCP, Zp),
    (INY, Imp), (CMP, Imm), (DEX, Imp), (AXS, Imm), (CPY, Abs), (CMP, Abs), (DEC, Abs), (DCP, Abs),
    // 0xD0
    (BNE, Rel), (CMP, Izy), (JAM, Imp), (DCP, Izy), (NOP, Zpx), (CMP, Zpx), (DEC, Zpx), (DCP, Zpx),
    (CLD, Imp), (CMP, Aby), (NOP, Imp), (DCP, Aby), (NOP, Abx), (CMP, Abx), (DEC, Abx), (DCP, Abx),
    // 0xE0
    (CPX, Imm), (SBC, Izx), (NOP, Imm), (ISC, Izx), (CPX, Zp),  (SBC, Zp),  (INC, Zp),  (ISC, Zp),
    (INX, Imp), (SBC, Imm), (NOP, Imp), (SBC, Imm), (CPX, Abs), (SBC, Abs), (INC, Abs), (ISC, Abs),
    // 0xF0
    (BEQ, Rel), (SBC, Izy), (JAM, Imp), (ISC, Izy), (NOP, Zpx), (SBC, Zpx), (INC, Zpx), (ISC, Zpx),
    (SED, Imp), (SBC, Aby), (NOP, Imp), (ISC, Aby), (NOP, Abx), (SBC, Abx), (INC, Abx), (ISC, Abx),
];

#[rustfmt::skip]
const CYCLES: [u8; 256] = [
    7, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 3, 2, 2, 2, 3, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
    6, 6, 2, 8, 3, 3, 5, 5, 4, 2, 2, 2, 5, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4,
    2, 6, 2, 6, 4, 4, 4, 4, 2, 5, 2, 5, 5, 5, 5, 5,
    2, 6, 2, 6, 3, 3, 3, 3, 2, 2, 2, 2, 4, 4, 4, 4,
    2, 5, 2, 5, 4, 4, 4, 4, 2, 4, 2, 4, 4, 4, 4, 4,
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
    2, 6, 2, 8, 3, 3, 5, 5, 2, 2, 2, 2, 4, 4, 6, 6,
    2, 5, 2, 8, 4, 4, 6, 6, 2, 4, 2, 7, 4, 4, 7, 7,
];

const fn build() -> [Opcode; 256] {
    let mut table = [Opcode { op: JAM, mode: Imp, cycles: 2 }; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = Opcode {
            op: OPS[i].0,
            mode: OPS[i].1,
            cycles: CYCLES[i],
        };
        i += 1;
    }
    table
}

pub static OPCODES: [Opcode; 256] = build();

/// One-line disassembly of the instruction at `pc`, e.g. `LDA $80F5,X`.
/// `operand` holds the (up to two) bytes following the opcode.
pub fn disassemble(pc: u16, opcode: u8, operand: [u8; 2]) -> String {
    let entry = OPCODES[opcode as usize];
    let byte = operand[0];
    let word = u16::from_le_bytes(operand);
    let args = match entry.mode {
        Imp => String::new(),
        Acc => " A".to_string(),
        Imm => format!(" #${byte:02X}"),
        Rel => {
            let target = pc.wrapping_add(2).wrapping_add(byte as i8 as u16);
            format!(" ${target:04X}")
        }
        Zp => format!(" ${byte:02X}"),
        Zpx => format!(" ${byte:02X},X"),
        Zpy => format!(" ${byte:02X},Y"),
        Abs => format!(" ${word:04X}"),
        Abx => format!(" ${word:04X},X"),
        Aby => format!(" ${word:04X},Y"),
        Ind => format!(" (${word:04X})"),
        Izx => format!(" (${byte:02X},X)"),
        Izy => format!(" (${byte:02X}),Y"),
    };
    format!("{:?}{args}", entry.op)
}
