//! Property-based tests for the nametable mirroring map.

use famicore::Mirroring;
use famicore::bus::ppu_space::{VRAM_SIZE, map_nametable_addr};
use proptest::prelude::*;

fn two_table() -> impl Strategy<Value = Mirroring> {
    prop_oneof![
        Just(Mirroring::Horizontal),
        Just(Mirroring::Vertical),
        Just(Mirroring::SingleScreenLower),
        Just(Mirroring::SingleScreenUpper),
    ]
}

proptest! {
    #[test]
    fn console_ram_arrangements_stay_in_2k(addr in 0x2000u16..0x3F00, m in two_table()) {
        prop_assert!(map_nametable_addr(addr, m) < 0x800);
    }

    #[test]
    fn offset_within_table_is_preserved(addr in 0x2000u16..0x3F00, m in two_table()) {
        prop_assert_eq!(map_nametable_addr(addr, m) & 0x3FF, (addr & 0x3FF) as usize);
    }

    #[test]
    fn upper_space_mirrors_nametables(addr in 0x2000u16..0x2F00, m in two_table()) {
        prop_assert_eq!(map_nametable_addr(addr + 0x1000, m), map_nametable_addr(addr, m));
    }

    #[test]
    fn vertical_and_horizontal_pair_tables(addr in 0x2000u16..0x2400) {
        let v = Mirroring::Vertical;
        let h = Mirroring::Horizontal;
        prop_assert_eq!(map_nametable_addr(addr, v), map_nametable_addr(addr + 0x800, v));
        prop_assert_ne!(map_nametable_addr(addr, v), map_nametable_addr(addr + 0x400, v));
        prop_assert_eq!(map_nametable_addr(addr, h), map_nametable_addr(addr + 0x400, h));
        prop_assert_ne!(map_nametable_addr(addr, h), map_nametable_addr(addr + 0x800, h));
    }

    #[test]
    fn four_screen_is_a_bijection(a in 0x2000u16..0x3000, b in 0x2000u16..0x3000) {
        let fa = map_nametable_addr(a, Mirroring::FourScreen);
        let fb = map_nametable_addr(b, Mirroring::FourScreen);
        prop_assert!(fa < VRAM_SIZE);
        prop_assert_eq!(fa == fb, a == b);
    }
}
