/*
Module: mappers

Declares the concrete board implementations and the registry that turns an
iNES mapper number into a constructor. New boards are added by implementing
`Mapper` and calling `MapperRegistry::register`; nothing else in the core
changes.

Implemented:
- NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3 (4), AxROM (7)
- MMC2 (9), MMC4 (10), Color Dreams (11), BNROM (34), GxROM (66)
- Camerica/Codemasters (71), Konami VRC6 (24, 26)
- Famicom Disk System (20), built from a disk image and BIOS rather than
  through the registry
*/

use std::collections::BTreeMap;

use crate::error::LoadError;
use crate::mapper::{Board, Mapper};

pub mod axrom;
pub mod bnrom;
pub mod camerica;
pub mod cnrom;
pub mod color_dreams;
pub mod fds;
pub mod gxrom;
pub mod mmc1;
pub mod mmc2;
pub mod mmc3;
pub mod nrom;
pub mod uxrom;
pub mod vrc6;

pub use axrom::Axrom;
pub use bnrom::Bnrom;
pub use camerica::Camerica;
pub use cnrom::Cnrom;
pub use color_dreams::ColorDreams;
pub use fds::Fds;
pub use gxrom::Gxrom;
pub use mmc1::Mmc1;
pub use mmc2::Mmc2;
pub use mmc3::Mmc3;
pub use nrom::Nrom;
pub use uxrom::Uxrom;
pub use vrc6::Vrc6;

/// Constructor for one board family.
pub type MapperCtor = fn(Board) -> Box<dyn Mapper>;

/// Mapper number -> constructor.
#[derive(Clone)]
pub struct MapperRegistry {
    ctors: BTreeMap<u16, MapperCtor>,
}

impl std::fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapperRegistry")
            .field("mappers", &self.ctors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for MapperRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl MapperRegistry {
    /// A registry with no boards at all.
    pub fn empty() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    /// All boards shipped with the core.
    pub fn with_builtin() -> Self {
        let mut r = Self::empty();
        r.register(0, |b| Box::new(Nrom::new(b)));
        r.register(1, |b| Box::new(Mmc1::new(b)));
        r.register(2, |b| Box::new(Uxrom::new(b)));
        r.register(3, |b| Box::new(Cnrom::new(b)));
        r.register(4, |b| Box::new(Mmc3::new(b)));
        r.register(7, |b| Box::new(Axrom::new(b)));
        r.register(9, |b| Box::new(Mmc2::new(b)));
        r.register(10, |b| Box::new(Mmc2::new(b)));
        r.register(11, |b| Box::new(ColorDreams::new(b)));
        r.register(24, |b| Box::new(Vrc6::new(b)));
        r.register(26, |b| Box::new(Vrc6::new(b)));
        r.register(34, |b| Box::new(Bnrom::new(b)));
        r.register(66, |b| Box::new(Gxrom::new(b)));
        r.register(71, |b| Box::new(Camerica::new(b)));
        r
    }

    /// Add or replace the constructor for `mapper`.
    pub fn register(&mut self, mapper: u16, ctor: MapperCtor) {
        self.ctors.insert(mapper, ctor);
    }

    pub fn supports(&self, mapper: u16) -> bool {
        self.ctors.contains_key(&mapper)
    }

    pub fn supported(&self) -> impl Iterator<Item = u16> + '_ {
        self.ctors.keys().copied()
    }

    /// Build the mapper for `board`, or `UnsupportedMapper`.
    pub fn create(&self, board: Board) -> Result<Box<dyn Mapper>, LoadError> {
        let id = board.mapper_id;
        let ctor = self.ctors.get(&id).ok_or(LoadError::UnsupportedMapper(id))?;
        let mut mapper = ctor(board);
        mapper.reset(true);
        Ok(mapper)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;

    #[test]
    fn builtin_set() {
        let r = MapperRegistry::with_builtin();
        for id in [0u16, 1, 2, 3, 4, 7, 9, 10, 11, 24, 26, 34, 66, 71] {
            assert!(r.supports(id), "mapper {id} should be built in");
        }
        assert!(!r.supports(5));
        assert!(!r.supports(20), "disk system is not an iNES board");
    }

    #[test]
    fn unknown_mapper_rejected() {
        let r = MapperRegistry::with_builtin();
        let mut b = board(32, 8, false, 8);
        b.mapper_id = 250;
        assert!(matches!(r.create(b), Err(LoadError::UnsupportedMapper(250))));
    }

    #[test]
    fn register_extends_without_touching_builtins() {
        let mut r = MapperRegistry::empty();
        assert!(!r.supports(0));
        r.register(250, |b| Box::new(Nrom::new(b)));
        let mut b = board(32, 8, false, 8);
        b.mapper_id = 250;
        let m = r.create(b).expect("registered");
        assert_eq!(m.mapper_id(), 250);
    }
}
