//! UPS patches: the persistence format for disk writes.
//!
//! Layout: `UPS1`, source size and target size as varints, then hunks of
//! (varint skip, XOR bytes, 0 terminator), then CRC-32 of source, target and
//! of the patch itself (excluding that last field).

use crate::crc32::crc32;
use crate::error::PatchError;

const MAGIC: &[u8; 4] = b"UPS1";
const FOOTER_LEN: usize = 12;

fn encode_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let x = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out.push(0x80 | x);
            break;
        }
        out.push(x);
        value -= 1;
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn byte(&mut self) -> Result<u8, PatchError> {
        let b = *self.data.get(self.pos).ok_or(PatchError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn varint(&mut self) -> Result<u64, PatchError> {
        let mut value: u64 = 0;
        let mut shift: u64 = 1;
        loop {
            let x = self.byte()?;
            value = value
                .checked_add((x & 0x7F) as u64 * shift)
                .ok_or(PatchError::Truncated)?;
            if x & 0x80 != 0 {
                return Ok(value);
            }
            shift = shift.checked_shl(7).ok_or(PatchError::Truncated)?;
            value = value.checked_add(shift).ok_or(PatchError::Truncated)?;
        }
    }
}

fn read_u32(data: &[u8]) -> u32 {
    u32::from_le_bytes([data[0], data[1], data[2], data[3]])
}

/// Build a patch turning `source` into `target`.
pub fn create(source: &[u8], target: &[u8]) -> Vec<u8> {
    let mut out = MAGIC.to_vec();
    encode_varint(&mut out, source.len() as u64);
    encode_varint(&mut out, target.len() as u64);

    let src = |i: usize| source.get(i).copied().unwrap_or(0);
    let mut last = 0usize;
    let mut i = 0usize;
    while i < target.len() {
        if src(i) == target[i] {
            i += 1;
            continue;
        }
        encode_varint(&mut out, (i - last) as u64);
        while i < target.len() && src(i) != target[i] {
            out.push(src(i) ^ target[i]);
            i += 1;
        }
        out.push(0);
        i += 1;
        last = i;
    }

    out.extend_from_slice(&crc32(source).to_le_bytes());
    out.extend_from_slice(&crc32(target).to_le_bytes());
    let own = crc32(&out);
    out.extend_from_slice(&own.to_le_bytes());
    out
}

/// Apply `patch` to `source`, checking every checksum it carries.
pub fn apply(source: &[u8], patch: &[u8]) -> Result<Vec<u8>, PatchError> {
    if patch.len() < MAGIC.len() + FOOTER_LEN {
        return Err(if patch.starts_with(MAGIC) || patch.len() < MAGIC.len() {
            PatchError::Truncated
        } else {
            PatchError::BadMagic
        });
    }
    if &patch[..4] != MAGIC {
        return Err(PatchError::BadMagic);
    }
    let footer = patch.len() - FOOTER_LEN;
    if crc32(&patch[..patch.len() - 4]) != read_u32(&patch[footer + 8..]) {
        return Err(PatchError::ChecksumMismatch);
    }

    let mut cur = Cursor {
        data: &patch[..footer],
        pos: 4,
    };
    let source_size = cur.varint()?;
    let target_size = cur.varint()?;
    if source_size != source.len() as u64 {
        return Err(PatchError::SizeMismatch {
            expected: source_size,
            actual: source.len() as u64,
        });
    }
    if crc32(source) != read_u32(&patch[footer..]) {
        return Err(PatchError::SourceMismatch);
    }

    let target_len = usize::try_from(target_size).map_err(|_| PatchError::Truncated)?;
    let mut target = vec![0u8; target_len];
    let n = target_len.min(source.len());
    target[..n].copy_from_slice(&source[..n]);

    let mut pos = 0usize;
    while cur.pos < cur.data.len() {
        let skip = usize::try_from(cur.varint()?).map_err(|_| PatchError::Truncated)?;
        pos = pos.checked_add(skip).ok_or(PatchError::Truncated)?;
        loop {
            let x = cur.byte()?;
            if x == 0 {
                pos += 1;
                break;
            }
            let Some(slot) = target.get_mut(pos) else {
                return Err(PatchError::Truncated);
            };
            *slot = source.get(pos).copied().unwrap_or(0) ^ x;
            pos += 1;
        }
    }

    if crc32(&target) != read_u32(&patch[footer + 4..]) {
        return Err(PatchError::ChecksumMismatch);
    }
    Ok(target)
}
