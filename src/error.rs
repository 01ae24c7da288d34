/*!
Error taxonomy for the emulator core.

Every failure that crosses the `Machine` boundary is a typed value:
- `LoadError`: the cartridge or disk image could not be turned into a running machine.
  The machine stays unloaded.
- `StateError`: a save-state blob was rejected. The machine keeps its prior state.
- `PatchError`: an FDS disk patch (UPS) did not apply to the inserted disk.
- `ExecuteError`: `execute()` was called on a machine that cannot run a frame.

Mapper conditions the core does not model are not errors; they are logged with
`log::warn!` and emulation continues.
*/

use thiserror::Error;

/// Failure to turn an image into a loaded cartridge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("bad header: {0}")]
    BadHeader(String),
    #[error("unsupported mapper {0}")]
    UnsupportedMapper(u16),
    #[error("truncated image: {section} needs {expected} bytes, {actual} available")]
    Truncated {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("disk system BIOS missing or not 8 KiB")]
    MissingBios,
    #[error("bad disk image: {0}")]
    BadDiskImage(String),
}

/// Rejection of a save-state blob. The machine is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("no cartridge loaded")]
    NoCartridge,
    #[error("not a save state (bad magic)")]
    BadMagic,
    #[error("incompatible save state version {found} (supported: {supported})")]
    IncompatibleState { found: u32, supported: u32 },
    #[error("save state truncated")]
    Truncated,
    #[error("chunk {tag} overruns the save state")]
    ChunkOverrun { tag: String },
    #[error("required chunk {0} missing")]
    MissingChunk(String),
    #[error("save state belongs to a different cartridge")]
    CartridgeMismatch,
    #[error("save state is for mapper {found}, cartridge uses mapper {expected}")]
    MapperMismatch { expected: u16, found: u16 },
    #[error("invalid value in save state: {0}")]
    Invalid(&'static str),
}

/// Failure to apply a UPS disk patch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    #[error("not a UPS patch")]
    BadMagic,
    #[error("patch truncated")]
    Truncated,
    #[error("patch source size {expected} does not match disk size {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("patch was made against a different disk image")]
    SourceMismatch,
    #[error("patch checksum mismatch")]
    ChecksumMismatch,
    #[error("no disk system cartridge loaded")]
    NoDisk,
}

/// Reasons `Machine::execute` refuses to run.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteError {
    #[error("no cartridge loaded")]
    NotLoaded,
    #[error("machine is powered off")]
    PoweredOff,
}
