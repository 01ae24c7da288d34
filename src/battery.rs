//! Persistent storage for battery-backed RAM and disk patches.
//!
//! The core never touches the filesystem. It names blobs after the cartridge
//! checksum and pulls/pushes them through a host-supplied `BatteryStorage`:
//!
//! - `"<crc32>.sav"`: battery-backed PRG-RAM of a cartridge
//! - `"<crc32>.ups"`: UPS patch of a disk system image against its original
//!
//! `<crc32>` is eight lowercase hex digits.

use std::collections::HashMap;

/// Host-side storage for named save blobs.
pub trait BatteryStorage {
    fn load(&mut self, name: &str) -> Option<Vec<u8>>;
    fn save(&mut self, name: &str, data: &[u8]);
}

pub fn save_name(crc32: u32) -> String {
    format!("{crc32:08x}.sav")
}

pub fn patch_name(crc32: u32) -> String {
    format!("{crc32:08x}.ups")
}

/// In-memory storage; handy for tests and for hosts that persist elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStorage {
    blobs: HashMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.blobs.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.blobs.insert(name.into(), data);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl BatteryStorage for MemoryStorage {
    fn load(&mut self, name: &str) -> Option<Vec<u8>> {
        self.blobs.get(name).cloned()
    }

    fn save(&mut self, name: &str, data: &[u8]) {
        self.blobs.insert(name.to_string(), data.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_use_padded_lowercase_hex() {
        assert_eq!(save_name(0x00AB_CDEF), "00abcdef.sav");
        assert_eq!(patch_name(0xDEAD_BEEF), "deadbeef.ups");
    }

    #[test]
    fn memory_storage_round_trip() {
        let mut s = MemoryStorage::new();
        assert!(s.load("x.sav").is_none());
        s.save("x.sav", &[1, 2, 3]);
        assert_eq!(s.load("x.sav"), Some(vec![1, 2, 3]));
        assert_eq!(s.len(), 1);
    }
}
