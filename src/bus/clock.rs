/*!
Master clock: the one counter CPU and PPU timing are derived from.

Every CPU cycle is split into a start and an end phase. The master clock
advances by a region-specific amount in each phase, and after each phase the
PPU is run until its own master-clock position catches up. Reads and writes
split the cycle slightly differently (the data bus is sampled at a different
point), which is what makes the PPU:CPU alignment come out right for register
accesses:

```text
region          start  end   CPU divider  PPU divider
NTSC/Famicom      6     6       12            4        (3 dots/cycle)
PAL               8     8       16            5        (3.2 dots/cycle)
Dendy             7     8       15            5        (3 dots/cycle)

read:   start - 1, end + 1
write:  start + 1, end - 1
```
*/

use crate::config::Region;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Upper bound accepted from a snapshot; centuries of emulated time, far from
/// the point where the per-cycle additions could wrap.
const MAX_MASTER: u64 = 1 << 62;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterClock {
    start_clocks: u64,
    end_clocks: u64,
    ppu_divider: u64,
    master: u64,
    ppu_master: u64,
    cpu_cycle: u64,
}

impl MasterClock {
    pub fn new(region: Region) -> Self {
        let timing = region.timing();
        let (start_clocks, end_clocks) = match region {
            Region::Ntsc | Region::Famicom => (6, 6),
            Region::Pal => (8, 8),
            Region::Dendy => (7, 8),
        };
        debug_assert_eq!(start_clocks + end_clocks, timing.cpu_divider);
        Self {
            start_clocks,
            end_clocks,
            ppu_divider: timing.ppu_divider,
            master: 0,
            ppu_master: 0,
            cpu_cycle: 0,
        }
    }

    /// CPU cycles elapsed since power-on.
    #[inline]
    pub fn cpu_cycle(&self) -> u64 {
        self.cpu_cycle
    }

    #[inline]
    pub fn master(&self) -> u64 {
        self.master
    }

    /// Start phase of a CPU cycle; returns the PPU dots now due.
    #[inline]
    pub fn begin_cycle(&mut self, read: bool) -> u32 {
        self.master += if read {
            self.start_clocks - 1
        } else {
            self.start_clocks + 1
        };
        self.cpu_cycle += 1;
        self.due_dots()
    }

    /// End phase of a CPU cycle; returns the PPU dots now due.
    #[inline]
    pub fn end_cycle(&mut self, read: bool) -> u32 {
        self.master += if read {
            self.end_clocks + 1
        } else {
            self.end_clocks - 1
        };
        self.due_dots()
    }

    fn due_dots(&mut self) -> u32 {
        let mut dots = 0;
        while self.ppu_master + self.ppu_divider <= self.master {
            self.ppu_master += self.ppu_divider;
            dots += 1;
        }
        dots
    }
}

impl Stateful for MasterClock {
    fn save_state(&self, w: &mut StateWriter) {
        w.u64(self.master);
        w.u64(self.ppu_master);
        w.u64(self.cpu_cycle);
    }

    /// Snapshots are taken between CPU cycles, so the master clock sits on a
    /// whole number of cycles and the PPU is less than one dot behind it.
    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        let master = r.u64()?;
        let ppu_master = r.u64()?;
        let cpu_cycle = r.u64()?;
        if master > MAX_MASTER {
            return Err(StateError::Invalid("master clock out of range"));
        }
        if cpu_cycle.checked_mul(self.start_clocks + self.end_clocks) != Some(master) {
            return Err(StateError::Invalid("master clock does not match the CPU cycle count"));
        }
        if ppu_master > master || master - ppu_master >= self.ppu_divider {
            return Err(StateError::Invalid("PPU clock out of step with master clock"));
        }
        self.master = master;
        self.ppu_master = ppu_master;
        self.cpu_cycle = cpu_cycle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dots_over(region: Region, cycles: u32) -> u32 {
        let mut clock = MasterClock::new(region);
        (0..cycles)
            .map(|i| {
                let read = i % 3 != 0;
                clock.begin_cycle(read) + clock.end_cycle(read)
            })
            .sum()
    }

    #[test]
    fn ntsc_runs_three_dots_per_cycle() {
        assert_eq!(dots_over(Region::Ntsc, 1000), 3000);
        assert_eq!(dots_over(Region::Dendy, 1000), 3000);
    }

    #[test]
    fn pal_runs_sixteen_dots_per_five_cycles() {
        assert_eq!(dots_over(Region::Pal, 5000), 16000);
    }

    #[test]
    fn read_phase_is_shorter_at_start() {
        let mut read = MasterClock::new(Region::Ntsc);
        let mut write = MasterClock::new(Region::Ntsc);
        read.begin_cycle(true);
        write.begin_cycle(false);
        assert_eq!(read.master(), 5);
        assert_eq!(write.master(), 7);
        read.end_cycle(true);
        write.end_cycle(false);
        assert_eq!(read.master(), write.master());
        assert_eq!(read.cpu_cycle(), 1);
    }

    fn restore(region: Region, master: u64, ppu_master: u64, cpu_cycle: u64) -> Result<MasterClock, StateError> {
        let mut w = StateWriter::new();
        w.u64(master);
        w.u64(ppu_master);
        w.u64(cpu_cycle);
        let bytes = w.into_bytes();
        let mut clock = MasterClock::new(region);
        clock.load_state(&mut StateReader::new(&bytes)).map(|()| clock)
    }

    #[test]
    fn snapshot_round_trips_mid_run() {
        let mut clock = MasterClock::new(Region::Pal);
        for i in 0..37 {
            clock.begin_cycle(i % 2 == 0);
            clock.end_cycle(i % 2 == 0);
        }
        let mut w = StateWriter::new();
        clock.save_state(&mut w);
        let bytes = w.into_bytes();
        let mut copy = MasterClock::new(Region::Pal);
        copy.load_state(&mut StateReader::new(&bytes)).expect("restores");
        assert_eq!(copy, clock);
    }

    #[test]
    fn inconsistent_snapshots_are_refused() {
        assert!(restore(Region::Ntsc, 120, 120, 10).is_ok());
        assert!(restore(Region::Ntsc, 120, 117, 10).is_ok());
        // master far past the cycle count
        assert!(matches!(
            restore(Region::Ntsc, u64::MAX - 2, 0, 10),
            Err(StateError::Invalid(_))
        ));
        // PPU a whole dot or more behind
        assert!(matches!(restore(Region::Ntsc, 120, 116, 10), Err(StateError::Invalid(_))));
        assert!(matches!(restore(Region::Ntsc, 120, 124, 10), Err(StateError::Invalid(_))));
        // consistent numbers, but too close to wrapping
        let cycles = u64::MAX / 12;
        assert!(matches!(
            restore(Region::Ntsc, cycles * 12, cycles * 12, cycles),
            Err(StateError::Invalid(_))
        ));
    }
}
