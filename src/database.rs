//! Cartridge database keyed by CRC-32 of the PRG+CHR payload.
//!
//! Headers in the wild are often wrong or missing. A host that ships a game
//! database fills one of these and hands it to the machine; matching entries
//! override what the header says. The core ships no entries of its own.

use std::collections::HashMap;

use crate::config::Region;
use crate::mapper::Mirroring;

/// Known-good facts about one cartridge. `None` fields leave the header value.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DatabaseEntry {
    pub mapper: Option<u16>,
    pub submapper: Option<u8>,
    pub mirroring: Option<Mirroring>,
    pub region: Option<Region>,
    /// PRG-ROM size in bytes; needed to split headerless images.
    pub prg_rom_size: Option<usize>,
    pub prg_ram_size: Option<usize>,
    pub chr_ram_size: Option<usize>,
    pub battery: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct Database {
    entries: HashMap<u32, DatabaseEntry>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, crc32: u32, entry: DatabaseEntry) {
        self.entries.insert(crc32, entry);
    }

    pub fn lookup(&self, crc32: u32) -> Option<&DatabaseEntry> {
        self.entries.get(&crc32)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
