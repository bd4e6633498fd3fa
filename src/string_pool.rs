//! Decoder for the indexed string table shared by both binary formats.
//!
//! A pool is either UTF-8 or UTF-16LE, selected by a pool-wide flag. Each
//! string carries a variable-length length prefix: one unit normally, two
//! units when the high bit of the first is set (15-bit extension for 16-bit
//! units, 7-bit for bytes), matching the platform's `decodeLength` routines.

use bitflags::bitflags;
use log::debug;

use crate::chunk::{BinaryReader, ChunkHeader, NO_ENTRY};
use crate::types::{AxmlError, AxmlResult};

bitflags! {
    /// Pool-wide flags from the string-pool chunk header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct StringPoolFlags: u32 {
        /// Strings are sorted by value. A hint for the platform's binary
        /// search; declaration order is preserved here regardless.
        const SORTED = 1 << 0;
        /// String data is UTF-8 rather than UTF-16LE.
        const UTF8 = 1 << 8;
    }
}

/// An immutable, index-addressable string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringPool {
    strings: Vec<String>,
    flags: StringPoolFlags,
}

impl StringPool {
    /// Decode a string-pool chunk whose header has already been read.
    ///
    /// The reader is positioned just past the chunk prologue; the caller is
    /// responsible for seeking to `header.end()` afterwards.
    pub(crate) fn parse(reader: &mut BinaryReader<'_>, header: &ChunkHeader) -> AxmlResult<Self> {
        let string_count = reader.read_u32()? as usize;
        let style_count = reader.read_u32()? as usize;
        let flags = StringPoolFlags::from_bits_truncate(reader.read_u32()?);
        let strings_start = reader.read_u32()? as usize;
        let _styles_start = reader.read_u32()? as usize;

        let mut offsets = Vec::with_capacity(string_count);
        for _ in 0..string_count {
            offsets.push(reader.read_u32()? as usize);
        }
        // Style runs are not interpreted; their offset table is skipped.
        for _ in 0..style_count {
            reader.read_u32()?;
        }
        if style_count > 0 {
            debug!("string pool at {:#x}: skipping {} style runs", header.start, style_count);
        }

        let data = reader.data();
        let base = header.start + strings_start;
        let limit = header.end();
        let mut strings = Vec::with_capacity(string_count);
        for offset in offsets {
            let absolute = base + offset;
            let text = if flags.contains(StringPoolFlags::UTF8) {
                read_utf8_string(data, absolute, limit)?
            } else {
                read_utf16_string(data, absolute, limit)?
            };
            strings.push(text);
        }

        Ok(StringPool { strings, flags })
    }

    /// Index lookup. The `0xFFFFFFFF` sentinel and out-of-range indices both
    /// yield `None`; use [`StringPool::require`] where a string must exist.
    pub fn get(&self, index: u32) -> Option<&str> {
        if index == NO_ENTRY {
            return None;
        }
        self.strings.get(index as usize).map(|s| s.as_str())
    }

    /// Index lookup where absence indicates corrupt input.
    pub fn require(&self, index: u32) -> AxmlResult<&str> {
        self.get(index).ok_or(AxmlError::StringIndexOutOfRange {
            index,
            count: self.strings.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn is_utf8(&self) -> bool {
        self.flags.contains(StringPoolFlags::UTF8)
    }

    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub(crate) fn into_strings(self) -> Vec<String> {
        self.strings
    }

    /// Position of a string by exact value, in declaration order.
    pub(crate) fn position(&self, value: &str) -> Option<usize> {
        self.strings.iter().position(|s| s == value)
    }
}

fn malformed(offset: usize, detail: &str) -> AxmlError {
    AxmlError::MalformedChunk {
        offset,
        detail: detail.to_string(),
    }
}

/// Decode a length prefix over byte units: 1 byte, or 2 when the high bit of
/// the first is set. Returns the length and the number of prefix bytes.
fn decode_utf8_length(data: &[u8], offset: usize, limit: usize) -> AxmlResult<(usize, usize)> {
    if offset >= limit || offset >= data.len() {
        return Err(malformed(offset, "string length prefix outside pool"));
    }
    let first = data[offset];
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }
    if offset + 1 >= limit {
        return Err(malformed(offset, "truncated two-byte length prefix"));
    }
    let second = data[offset + 1];
    Ok(((((first & 0x7F) as usize) << 8) | second as usize, 2))
}

/// Decode a length prefix over 16-bit units: 1 unit, or 2 when the high bit
/// of the first is set. Returns the length and the number of prefix bytes.
fn decode_utf16_length(data: &[u8], offset: usize, limit: usize) -> AxmlResult<(usize, usize)> {
    if offset + 2 > limit || offset + 2 > data.len() {
        return Err(malformed(offset, "string length prefix outside pool"));
    }
    let first = u16::from_le_bytes([data[offset], data[offset + 1]]);
    if first & 0x8000 == 0 {
        return Ok((first as usize, 2));
    }
    if offset + 4 > limit {
        return Err(malformed(offset, "truncated two-unit length prefix"));
    }
    let second = u16::from_le_bytes([data[offset + 2], data[offset + 3]]);
    Ok(((((first & 0x7FFF) as usize) << 16) | second as usize, 4))
}

/// UTF-8 entries carry two prefixes: the UTF-16 character count (decoded only
/// to find where the second prefix starts) and then the UTF-8 byte count.
fn read_utf8_string(data: &[u8], offset: usize, limit: usize) -> AxmlResult<String> {
    let (_char_count, skip) = decode_utf8_length(data, offset, limit)?;
    let mut cursor = offset + skip;
    let (byte_len, skip) = decode_utf8_length(data, cursor, limit)?;
    cursor += skip;
    if cursor + byte_len > limit || cursor + byte_len > data.len() {
        return Err(malformed(offset, "UTF-8 string data outside pool"));
    }
    std::str::from_utf8(&data[cursor..cursor + byte_len])
        .map(|s| s.to_string())
        .map_err(|err| malformed(offset, &format!("invalid UTF-8 string data: {err}")))
}

fn read_utf16_string(data: &[u8], offset: usize, limit: usize) -> AxmlResult<String> {
    let (char_count, skip) = decode_utf16_length(data, offset, limit)?;
    let cursor = offset + skip;
    let byte_len = char_count * 2;
    if cursor + byte_len > limit || cursor + byte_len > data.len() {
        return Err(malformed(offset, "UTF-16 string data outside pool"));
    }
    let units: Vec<u16> = data[cursor..cursor + byte_len]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units)
        .map_err(|err| malformed(offset, &format!("invalid UTF-16 string data: {err}")))
}
