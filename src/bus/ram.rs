/*!
RAM module: the 2 KiB CPU work RAM with mirrored access.

CPU address map for internal RAM:
- $0000-$07FF: 2 KiB internal RAM
- $0800-$1FFF: Mirrors of $0000-$07FF (mask with & 0x07FF)

Power-on contents follow the configured `RamPowerPolicy`; a soft reset leaves
RAM untouched.
*/

use crate::config::RamPowerPolicy;
use crate::error::StateError;
use crate::state::{StateReader, StateWriter, Stateful};

/// Size of CPU internal RAM (in bytes).
pub const CPU_RAM_SIZE: usize = 0x0800;

/// Salt that keeps work RAM and cartridge RAM from sharing a random stream.
const RAM_SALT: u64 = 0x5752_414D;

/// CPU internal RAM with mirrored access helpers.
pub struct Ram {
    data: [u8; CPU_RAM_SIZE],
}

impl Default for Ram {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Ram {
    /// Create a new RAM instance initialized to 0.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0; CPU_RAM_SIZE],
        }
    }

    /// Power-on fill.
    pub fn power(&mut self, policy: RamPowerPolicy) {
        policy.fill(&mut self.data, RAM_SALT);
    }

    /// Read a byte from CPU-visible RAM space ($0000-$1FFF), applying 2 KiB mirroring.
    #[inline]
    pub fn read(&self, addr: u16) -> u8 {
        self.data[Self::mirror_index(addr)]
    }

    /// Write a byte to CPU-visible RAM space ($0000-$1FFF), applying 2 KiB mirroring.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u8) {
        self.data[Self::mirror_index(addr)] = value;
    }

    /// Expose the internal slice (read-only). Useful for diagnostics or hashing.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn mirror_index(addr: u16) -> usize {
        (addr as usize) & (CPU_RAM_SIZE - 1)
    }
}

impl Stateful for Ram {
    fn save_state(&self, w: &mut StateWriter) {
        w.bytes(&self.data);
    }

    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError> {
        r.fill(&mut self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::{CPU_RAM_SIZE, Ram};
    use crate::config::RamPowerPolicy;

    #[test]
    fn size_and_init() {
        let r = Ram::new();
        assert_eq!(r.as_slice().len(), CPU_RAM_SIZE);
        assert!(r.as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn mirrored_reads_and_writes() {
        let mut r = Ram::new();
        r.write(0x0001, 0xAA);
        assert_eq!(r.read(0x0001), 0xAA);
        assert_eq!(r.read(0x0801), 0xAA);
        assert_eq!(r.read(0x1801), 0xAA);

        r.write(0x1801, 0x55);
        assert_eq!(r.read(0x0001), 0x55);
        assert_eq!(r.read(0x0801), 0x55);
    }

    #[test]
    fn power_policies() {
        let mut r = Ram::new();
        r.power(RamPowerPolicy::AllOnes);
        assert!(r.as_slice().iter().all(|&b| b == 0xFF));

        r.power(RamPowerPolicy::Random(7));
        let first = r.as_slice().to_vec();
        r.power(RamPowerPolicy::Random(7));
        assert_eq!(r.as_slice(), &first[..], "same seed, same bytes");
        assert!(first.iter().any(|&b| b != first[0]));
    }
}
