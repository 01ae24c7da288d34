/*!
ppu_bus: Trait abstraction decoupling the PPU from the full `Bus`.

Rationale:
- The PPU only needs its own 14-bit address space (pattern tables through the
  cartridge, nametables through console VRAM or the cartridge). Palette RAM is
  internal to the PPU and never reaches this trait.
- Accepting a trait instead of a concrete `Bus` keeps the PPU testable with a
  plain in-memory mock and lets the real bus hand out a borrow-split view of
  VRAM plus the mapper without aliasing the PPU itself.

Address Space Expectations (mirroring semantics left to implementor):
- 0x0000-0x1FFF : Pattern tables (CHR ROM/RAM via mapper)
- 0x2000-0x2FFF : Nametables (with mirroring rules)
- 0x3000-0x3EFF : Mirrors of 0x2000-0x2EFF

Side effects:
- Every `read`/`write` is a real PPU bus cycle. Implementors forward the
  address to the mapper (A12 clocking, MMC2 latches).
- `set_address` reports address changes that happen without a data cycle
  ($2006 second write, $2007 increments).
*/

/// Memory interface the PPU performs its fetches and $2007 accesses through.
pub trait PpuBus {
    /// Read a byte at `addr` (0x0000-0x3EFF).
    fn read(&mut self, addr: u16) -> u8;

    /// Write a byte at `addr` (0x0000-0x3EFF).
    fn write(&mut self, addr: u16, value: u8);

    /// The PPU placed `addr` on its address bus without a data access.
    fn set_address(&mut self, _addr: u16) {}
}
