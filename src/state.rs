/*!
Save-state codec: a chunked, versioned, little-endian binary container.

Binary format
=============
```text
offset  size  field
0       4     magic "FCST"
4       4     container version (u32 LE)
8       ...   chunks, back to back until end of buffer

chunk:
0       4     tag (ASCII, e.g. "CPU ", "MAPR")
4       2     chunk version (u16 LE)
6       4     payload length in bytes (u32 LE)
10      len   payload
```

Every chunk carries its own length, so a reader can step over tags it does not
know (or versions it does not understand) without losing its place. The
container version is the compatibility contract: a blob with any other value is
rejected as `StateError::IncompatibleState`.

Writers
=======
Subsystems implement [`Stateful`]; each writes a flat sequence of primitives
through [`StateWriter`] and reads them back in the same order through
[`StateReader`]. Variable-size buffers are written with a `u32` length prefix.
Fixed-size buffers are checked against the receiver's size on load.
*/

use crate::error::StateError;

/// Container magic.
pub const STATE_MAGIC: [u8; 4] = *b"FCST";
/// Current container version.
pub const STATE_VERSION: u32 = 1;

const HEADER_LEN: usize = 8;
const CHUNK_HEADER_LEN: usize = 10;

/// Four-byte chunk identifier.
pub type Tag = [u8; 4];

/// Renders a tag for messages.
pub fn tag_name(tag: Tag) -> String {
    String::from_utf8_lossy(&tag).trim_end().to_string()
}

/// Subsystems whose mutable state is persisted in a chunk.
pub trait Stateful {
    fn save_state(&self, w: &mut StateWriter);
    fn load_state(&mut self, r: &mut StateReader<'_>) -> Result<(), StateError>;
}

// ----------------------------------------------------------------------------
// Writing
// ----------------------------------------------------------------------------

/// Append-only byte sink with little-endian primitive encoders.
#[derive(Debug, Default)]
pub struct StateWriter {
    buf: Vec<u8>,
}

impl StateWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Start a container: writes magic and version.
    pub fn container() -> Self {
        let mut w = Self::new();
        w.buf.extend_from_slice(&STATE_MAGIC);
        w.u32(STATE_VERSION);
        w
    }

    /// Write one chunk whose payload is produced by `body`.
    pub fn chunk<F>(&mut self, tag: Tag, version: u16, body: F)
    where
        F: FnOnce(&mut StateWriter),
    {
        self.buf.extend_from_slice(&tag);
        self.u16(version);
        let len_at = self.buf.len();
        self.u32(0);
        let start = self.buf.len();
        body(self);
        let len = (self.buf.len() - start) as u32;
        self.buf[len_at..len_at + 4].copy_from_slice(&len.to_le_bytes());
    }

    #[inline]
    pub fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    #[inline]
    pub fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    #[inline]
    pub fn u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    #[inline]
    pub fn i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    #[inline]
    pub fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Length-prefixed byte buffer.
    pub fn bytes(&mut self, data: &[u8]) {
        self.u32(data.len() as u32);
        self.buf.extend_from_slice(data);
    }

    /// Length-prefixed `u16` buffer.
    pub fn words(&mut self, data: &[u16]) {
        self.u32(data.len() as u32);
        for &v in data {
            self.u16(v);
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ----------------------------------------------------------------------------
// Reading
// ----------------------------------------------------------------------------

/// Cursor over a chunk payload.
#[derive(Debug, Clone)]
pub struct StateReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StateReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StateError> {
        let end = self.pos.checked_add(n).ok_or(StateError::Truncated)?;
        if end > self.data.len() {
            return Err(StateError::Truncated);
        }
        let s = &self.data[self.pos..end];
        self.pos = end;
        Ok(s)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StateError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, StateError> {
        Ok(self.take(1)?[0])
    }

    pub fn bool(&mut self) -> Result<bool, StateError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(StateError::Invalid("boolean out of range")),
        }
    }

    pub fn u16(&mut self) -> Result<u16, StateError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, StateError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, StateError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn i8(&mut self) -> Result<i8, StateError> {
        Ok(self.u8()? as i8)
    }

    pub fn i32(&mut self) -> Result<i32, StateError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    /// Length-prefixed buffer of any size.
    pub fn bytes(&mut self) -> Result<&'a [u8], StateError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    /// Length-prefixed buffer that must exactly fill `dst`.
    pub fn fill(&mut self, dst: &mut [u8]) -> Result<(), StateError> {
        let src = self.bytes()?;
        if src.len() != dst.len() {
            return Err(StateError::Invalid("buffer size mismatch"));
        }
        dst.copy_from_slice(src);
        Ok(())
    }

    /// Length-prefixed `u16` buffer that must exactly fill `dst`.
    pub fn fill_words(&mut self, dst: &mut [u16]) -> Result<(), StateError> {
        let len = self.u32()? as usize;
        if len != dst.len() {
            return Err(StateError::Invalid("buffer size mismatch"));
        }
        for slot in dst.iter_mut() {
            *slot = self.u16()?;
        }
        Ok(())
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

// ----------------------------------------------------------------------------
// Container parsing
// ----------------------------------------------------------------------------

/// One framed chunk borrowed from a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub tag: Tag,
    pub version: u16,
    pub payload: &'a [u8],
}

impl<'a> Chunk<'a> {
    pub fn reader(&self) -> StateReader<'a> {
        StateReader::new(self.payload)
    }
}

/// Validate container framing and split it into chunks. Nothing is applied.
pub fn parse_container(data: &[u8]) -> Result<Vec<Chunk<'_>>, StateError> {
    if data.len() < HEADER_LEN {
        return Err(StateError::Truncated);
    }
    if data[0..4] != STATE_MAGIC {
        return Err(StateError::BadMagic);
    }
    let version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    if version != STATE_VERSION {
        return Err(StateError::IncompatibleState {
            found: version,
            supported: STATE_VERSION,
        });
    }

    let mut chunks = Vec::new();
    let mut pos = HEADER_LEN;
    while pos < data.len() {
        if data.len() - pos < CHUNK_HEADER_LEN {
            return Err(StateError::Truncated);
        }
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&data[pos..pos + 4]);
        let version = u16::from_le_bytes([data[pos + 4], data[pos + 5]]);
        let len = u32::from_le_bytes([
            data[pos + 6],
            data[pos + 7],
            data[pos + 8],
            data[pos + 9],
        ]) as usize;
        let start = pos + CHUNK_HEADER_LEN;
        let end = start
            .checked_add(len)
            .filter(|&e| e <= data.len())
            .ok_or_else(|| StateError::ChunkOverrun { tag: tag_name(tag) })?;
        chunks.push(Chunk {
            tag,
            version,
            payload: &data[start..end],
        });
        pos = end;
    }
    Ok(chunks)
}
