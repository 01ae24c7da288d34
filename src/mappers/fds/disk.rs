//! Disk images: `.fds` parsing and conversion between the raw side format
//! and the gap-framed stream the drive actually scans.
//!
//! Raw sides are 65 500 bytes of back-to-back blocks with no gaps or CRCs.
//! The drive sees a leading gap, then for every block a start mark ($80), the
//! block bytes, two CRC bytes and an inter-block gap.

use crate::error::LoadError;

/// Bytes in one raw disk side.
pub const SIDE_SIZE: usize = 65_500;

/// Size of a gap-framed side; trailing bytes are zero.
pub const GAPPED_SIDE_CAPACITY: usize = 68_000;

const HEADER_MAGIC: &[u8; 4] = b"FDS\x1A";
const HEADER_LEN: usize = 16;

/// Leading gap: 28 300 bits of zeros.
const LEADING_GAP: usize = 28_300 / 8;
/// Gap after each block: 976 bits.
const BLOCK_GAP: usize = 976 / 8;
const BLOCK_START: u8 = 0x80;
/// Placeholder CRC; the BIOS never checks the bytes it reads back.
const FAKE_CRC: [u8; 2] = [0x4D, 0x62];

/// Split an image into raw sides, dropping the optional 16-byte header.
pub fn parse_image(data: &[u8]) -> Result<Vec<Vec<u8>>, LoadError> {
    let body = if data.len() >= HEADER_LEN && &data[..4] == HEADER_MAGIC {
        &data[HEADER_LEN..]
    } else {
        data
    };
    if body.is_empty() {
        return Err(LoadError::BadDiskImage("image holds no disk sides".into()));
    }
    if body.len() % SIDE_SIZE != 0 {
        return Err(LoadError::BadDiskImage(format!(
            "{} bytes is not a whole number of {SIDE_SIZE}-byte sides",
            body.len()
        )));
    }
    Ok(body.chunks(SIDE_SIZE).map(<[u8]>::to_vec).collect())
}

/// Length of the block starting with type byte `kind`, or `None` when the byte
/// does not start a valid block. `file_size` comes from the preceding header.
fn block_len(kind: u8, file_size: usize) -> Option<usize> {
    match kind {
        1 => Some(56),
        2 => Some(2),
        3 => Some(16),
        4 => Some(1 + file_size),
        _ => None,
    }
}

/// File size field of a file-header block (type 3).
#[inline]
fn header_file_size(block: &[u8]) -> usize {
    u16::from_le_bytes([block[13], block[14]]) as usize
}

/// Expand a raw side into the gap-framed stream the drive scans.
pub fn add_gaps(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(GAPPED_SIDE_CAPACITY);
    out.resize(LEADING_GAP, 0);
    let mut pos = 0;
    let mut file_size = 0;
    while pos < raw.len() {
        let Some(len) = block_len(raw[pos], file_size) else {
            break;
        };
        if pos + len > raw.len() {
            break;
        }
        let block = &raw[pos..pos + len];
        if block[0] == 3 {
            file_size = header_file_size(block);
        }
        out.push(BLOCK_START);
        out.extend_from_slice(block);
        out.extend_from_slice(&FAKE_CRC);
        out.resize(out.len() + BLOCK_GAP, 0);
        pos += len;
    }
    if out.len() < GAPPED_SIDE_CAPACITY {
        out.resize(GAPPED_SIDE_CAPACITY, 0);
    }
    out
}

/// Rebuild the raw side from a gap-framed stream (after the BIOS wrote to it).
pub fn remove_gaps(gapped: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(SIDE_SIZE);
    let mut pos = 0;
    let mut file_size = 0;
    loop {
        while pos < gapped.len() && gapped[pos] == 0 {
            pos += 1;
        }
        if pos >= gapped.len() || gapped[pos] != BLOCK_START {
            break;
        }
        pos += 1;
        let Some(&kind) = gapped.get(pos) else {
            break;
        };
        let Some(len) = block_len(kind, file_size) else {
            break;
        };
        if pos + len > gapped.len() || out.len() + len > SIDE_SIZE {
            break;
        }
        let block = &gapped[pos..pos + len];
        if kind == 3 {
            file_size = header_file_size(block);
        }
        out.extend_from_slice(block);
        pos += len + FAKE_CRC.len();
    }
    out.resize(SIDE_SIZE, 0);
    out
}
