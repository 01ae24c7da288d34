/*!
interfaces: borrow-split views handed to subsystems that need part of the bus.

`BusPpuView` implements `PpuBus` over the nametable RAM and the cartridge
mapper only. The bus builds one from its own fields while the PPU itself is
borrowed mutably, so PPU ticking and register accesses never alias the bus.

Every PPU bus address (data cycles and `set_address`) is forwarded to
`Mapper::notify_ppu_address` first, which is what A12-clocked boards watch.
*/

use crate::bus::ppu_space::Vram;
use crate::cartridge::Cartridge;
use crate::mapper::{Mapper, Mirroring};
use crate::ppu_bus::PpuBus;

pub(crate) struct BusPpuView<'a> {
    vram: &'a mut Vram,
    mapper: Option<&'a mut (dyn Mapper + 'static)>,
}

impl<'a> BusPpuView<'a> {
    #[inline]
    pub(crate) fn new(vram: &'a mut Vram, cartridge: &'a mut Option<Cartridge>) -> Self {
        Self::from_parts(vram, cartridge.as_mut().map(|c| c.mapper.as_mut()))
    }

    #[inline]
    pub(crate) fn from_parts(
        vram: &'a mut Vram,
        mapper: Option<&'a mut (dyn Mapper + 'static)>,
    ) -> Self {
        Self { vram, mapper }
    }

    #[inline]
    fn mirroring(&self) -> Mirroring {
        self.mapper
            .as_ref()
            .map_or(Mirroring::Horizontal, |m| m.mirroring())
    }
}

impl PpuBus for BusPpuView<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        let addr = addr & 0x3FFF;
        if let Some(m) = self.mapper.as_mut() {
            m.notify_ppu_address(addr);
        }
        if addr < 0x2000 {
            self.mapper.as_mut().map_or(0, |m| m.ppu_read(addr))
        } else {
            let mirroring = self.mirroring();
            self.vram.read(addr, mirroring)
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        let addr = addr & 0x3FFF;
        if let Some(m) = self.mapper.as_mut() {
            m.notify_ppu_address(addr);
        }
        if addr < 0x2000 {
            if let Some(m) = self.mapper.as_mut() {
                m.ppu_write(addr, value);
            }
        } else {
            let mirroring = self.mirroring();
            self.vram.write(addr, value, mirroring);
        }
    }

    fn set_address(&mut self, addr: u16) {
        if let Some(m) = self.mapper.as_mut() {
            m.notify_ppu_address(addr & 0x3FFF);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::tests::board;
    use crate::mappers::nrom::Nrom;

    #[test]
    fn nametables_follow_cartridge_mirroring() {
        let mut vram = Vram::new();
        let mut b = board(32, 8, false, 0);
        b.mirroring = Mirroring::Vertical;
        let mut mapper = Nrom::new(b);
        let mut view = BusPpuView::from_parts(&mut vram, Some(&mut mapper));
        view.write(0x2005, 0x42);
        assert_eq!(view.read(0x2805), 0x42);
        assert_eq!(view.read(0x2405), 0x00);
    }

    #[test]
    fn pattern_reads_without_cartridge_are_zero() {
        let mut vram = Vram::new();
        let mut view = BusPpuView::from_parts(&mut vram, None);
        assert_eq!(view.read(0x0010), 0);
        view.write(0x2400, 9);
        assert_eq!(view.read(0x2000), 9, "horizontal by default");
    }
}
