//! RIFF chunk tree reading and writing.
//!
//! A chunk is `tag(4) + size(u32 LE) + payload`, padded to an even length.
//! `RIFF` and `LIST` chunks carry a 4-byte form type followed by sub-chunks.
//! Every read is bounds-checked against the enclosing slice, so a declared
//! size that overruns the buffer becomes a [`Error::Format`].

use crate::error::{Error, Result};
use tracing::trace;

/// Four-character chunk code.
pub type FourCc = [u8; 4];

/// A chunk borrowed from the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub id: FourCc,
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// Chunk tag as text (for logs and errors).
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.id).into_owned()
    }

    /// Whether this chunk nests sub-chunks.
    #[inline]
    pub fn is_list(&self) -> bool {
        &self.id == b"LIST" || &self.id == b"RIFF"
    }

    /// Form type and sub-chunks of a `RIFF`/`LIST` chunk.
    pub fn list(&self) -> Result<(FourCc, ChunkIter<'a>)> {
        if self.data.len() < 4 {
            return Err(Error::format(self.name(), "list chunk shorter than its form type"));
        }
        let form = fourcc(&self.data[..4]);
        Ok((form, ChunkIter::new(&self.data[4..])))
    }
}

/// Iterator over consecutive chunks in a slice.
///
/// Yields an error once (then stops) when a chunk's declared size overruns
/// the slice.
#[derive(Debug, Clone)]
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> ChunkIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        let remaining = &self.data[self.pos..];
        if remaining.len() < 8 {
            trace!("ignoring {} trailing bytes after last chunk", remaining.len());
            self.pos = self.data.len();
            return None;
        }

        let id = fourcc(&remaining[..4]);
        let size = u32::from_le_bytes([remaining[4], remaining[5], remaining[6], remaining[7]]) as usize;
        let available = remaining.len() - 8;
        if size > available {
            self.failed = true;
            return Some(Err(Error::format(
                String::from_utf8_lossy(&id),
                format!("declared size {size} exceeds the {available} remaining bytes"),
            )));
        }

        let data = &remaining[8..8 + size];
        // pad byte for odd sizes (may be missing at the very end)
        self.pos += 8 + size + (size & 1);
        Some(Ok(Chunk { id, data }))
    }
}

/// Parse the top-level `RIFF` chunk and return its form type and contents.
pub fn read_riff(data: &[u8]) -> Result<(FourCc, ChunkIter<'_>)> {
    let mut top = ChunkIter::new(data);
    let riff = top.next().ok_or(Error::MissingChunk("RIFF"))??;
    if &riff.id != b"RIFF" {
        return Err(Error::format(riff.name(), "expected a RIFF container"));
    }
    riff.list()
}

#[inline]
pub(crate) fn fourcc(bytes: &[u8]) -> FourCc {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

/// Little-endian cursor over a fixed-size record table.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| Error::format("record", "record extends past the end of its chunk"))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_le_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Fixed-width, NUL-padded ASCII field.
    pub fn string(&mut self, len: usize) -> Result<String> {
        Ok(decode_string(self.take(len)?))
    }
}

/// Decode a NUL-terminated (or NUL-padded) text field.
pub(crate) fn decode_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// Split a record chunk into `size`-byte records.
pub(crate) fn records<'a>(chunk: &Chunk<'a>, size: usize) -> Result<std::slice::ChunksExact<'a, u8>> {
    if chunk.data.len() % size != 0 {
        return Err(Error::format(
            chunk.name(),
            format!("length {} is not a multiple of the {size}-byte record", chunk.data.len()),
        ));
    }
    Ok(chunk.data.chunks_exact(size))
}

/// Append a chunk (with pad byte) to `out`.
pub(crate) fn write_chunk(out: &mut Vec<u8>, id: &FourCc, payload: &[u8]) {
    out.extend_from_slice(id);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

/// Append a `LIST` (or `RIFF`) chunk with the given form type.
pub(crate) fn write_list(out: &mut Vec<u8>, id: &FourCc, form: &FourCc, body: &[u8]) {
    let mut payload = Vec::with_capacity(body.len() + 4);
    payload.extend_from_slice(form);
    payload.extend_from_slice(body);
    write_chunk(out, id, &payload);
}

/// Fixed-width, NUL-padded text field.
pub(crate) fn encode_string(out: &mut Vec<u8>, text: &str, len: usize) {
    let bytes = text.as_bytes();
    let n = bytes.len().min(len.saturating_sub(1));
    out.extend_from_slice(&bytes[..n]);
    out.resize(out.len() + (len - n), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_bytes(id: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        write_chunk(&mut out, id, payload);
        out
    }

    #[test]
    fn test_iterates_sibling_chunks_with_padding() {
        let mut data = chunk_bytes(b"abcd", &[1, 2, 3]);
        data.extend(chunk_bytes(b"efgh", &[4, 5]));

        let chunks: Vec<_> = ChunkIter::new(&data).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0].id, b"abcd");
        assert_eq!(chunks[0].data, &[1, 2, 3]);
        assert_eq!(&chunks[1].id, b"efgh");
        assert_eq!(chunks[1].data, &[4, 5]);
    }

    #[test]
    fn test_oversized_chunk_is_format_error() {
        let mut data = Vec::new();
        data.extend_from_slice(b"smpl");
        data.extend_from_slice(&1000u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 16]);

        let mut iter = ChunkIter::new(&data);
        assert!(matches!(iter.next(), Some(Err(Error::Format { .. }))));
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_nested_list() {
        let inner = chunk_bytes(b"ifil", &[2, 0, 1, 0]);
        let mut list = Vec::new();
        write_list(&mut list, b"LIST", b"INFO", &inner);
        let mut riff = Vec::new();
        write_list(&mut riff, b"RIFF", b"sfbk", &list);

        let (form, mut children) = read_riff(&riff).unwrap();
        assert_eq!(&form, b"sfbk");
        let info = children.next().unwrap().unwrap();
        assert!(info.is_list());
        let (info_form, mut sub) = info.list().unwrap();
        assert_eq!(&info_form, b"INFO");
        assert_eq!(sub.next().unwrap().unwrap().data, &[2, 0, 1, 0]);
    }

    #[test]
    fn test_not_riff() {
        let data = chunk_bytes(b"RIFX", b"sfbk");
        assert!(read_riff(&data).is_err());
        assert!(matches!(read_riff(&[]), Err(Error::MissingChunk("RIFF"))));
    }

    #[test]
    fn test_byte_reader_bounds() {
        let mut reader = ByteReader::new(&[1, 0, 0xFF]);
        assert_eq!(reader.u16().unwrap(), 1);
        assert_eq!(reader.i8().unwrap(), -1);
        assert!(reader.u8().is_err());
    }

    #[test]
    fn test_string_fields() {
        let mut out = Vec::new();
        encode_string(&mut out, "Piano", 20);
        assert_eq!(out.len(), 20);
        assert_eq!(decode_string(&out), "Piano");
    }
}
