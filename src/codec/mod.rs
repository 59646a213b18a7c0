//! Byte-level helpers shared by every chunk parser and builder.
//!
//! # Endianness
//! Every integer in a Blorb file is big-endian.  The readers here never
//! panic: a range that runs past the end of the slice yields `None` and the
//! caller decides what a short read means for its chunk.
//!
//! # Strings
//! Chunk tags and legacy text are one byte per character (Latin-1), so the
//! ASCII helpers can represent any byte value and always round-trip.  Text
//! payloads use UTF-8, except the deprecated `SNam` chunk which stores
//! big-endian UTF-16 code units.

use byteorder::{BigEndian, ByteOrder};

/// Read a big-endian `u32` at `offset`.
#[inline]
pub fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    bytes.get(offset..end).map(BigEndian::read_u32)
}

/// Read a big-endian `u16` at `offset`.
#[inline]
pub fn read_u16_be(bytes: &[u8], offset: usize) -> Option<u16> {
    let end = offset.checked_add(2)?;
    bytes.get(offset..end).map(BigEndian::read_u16)
}

/// Overwrite four bytes at `offset` with `value`, big-endian.
///
/// # Panics
/// If `offset + 4` exceeds `bytes.len()`.  Callers size the buffer first.
#[inline]
pub fn write_u32_be(bytes: &mut [u8], offset: usize, value: u32) {
    BigEndian::write_u32(&mut bytes[offset..offset + 4], value);
}

/// Append `value` to `buf`, big-endian.
#[inline]
pub fn push_u32_be(buf: &mut Vec<u8>, value: u32) {
    let mut raw = [0u8; 4];
    BigEndian::write_u32(&mut raw, value);
    buf.extend_from_slice(&raw);
}

/// One character per byte.  No validation; every byte maps to a `char`.
pub fn bytes_to_ascii_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Like [`bytes_to_ascii_string`] over `bytes[offset..offset + len]`,
/// clamped to the available data.
pub fn ascii_string_at(bytes: &[u8], offset: usize, len: usize) -> String {
    let start = offset.min(bytes.len());
    let end = offset.saturating_add(len).min(bytes.len());
    bytes_to_ascii_string(&bytes[start..end])
}

/// Inverse of [`bytes_to_ascii_string`].  Characters above U+00FF cannot
/// come out of the reader; they are written as `?`.
pub fn ascii_string_to_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect()
}

/// Strict UTF-8 decode.
pub fn utf8_decode(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

/// UTF-8 decode with U+FFFD substitution for invalid sequences.
pub fn utf8_decode_lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn utf8_encode(s: &str) -> Vec<u8> {
    s.as_bytes().to_vec()
}

/// Decode big-endian UTF-16.  Unpaired surrogates become U+FFFD; a trailing
/// odd byte is ignored.
pub fn utf16_decode(bytes: &[u8]) -> String {
    let units = bytes.chunks_exact(2).map(BigEndian::read_u16);
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_bounds_checked() {
        let bytes = [0x00, 0x00, 0x01, 0x02, 0xFF];
        assert_eq!(read_u32_be(&bytes, 0), Some(0x0102));
        assert_eq!(read_u32_be(&bytes, 1), Some(0x0001_02FF));
        assert_eq!(read_u32_be(&bytes, 2), None);
        assert_eq!(read_u32_be(&bytes, usize::MAX), None);
        assert_eq!(read_u16_be(&bytes, 3), Some(0x02FF));
        assert_eq!(read_u16_be(&bytes, 4), None);
    }

    #[test]
    fn write_in_place() {
        let mut bytes = [0u8; 8];
        write_u32_be(&mut bytes, 2, 0xDEAD_BEEF);
        assert_eq!(bytes, [0, 0, 0xDE, 0xAD, 0xBE, 0xEF, 0, 0]);

        let mut buf = vec![1];
        push_u32_be(&mut buf, 7);
        assert_eq!(buf, [1, 0, 0, 0, 7]);
    }

    #[test]
    fn ascii_keeps_every_byte() {
        let raw = [b'S', b'n', b'd', b' ', 0x00, 0xE9];
        let s = bytes_to_ascii_string(&raw);
        assert_eq!(s.chars().count(), 6);
        assert_eq!(ascii_string_to_bytes(&s), raw);
        assert_eq!(ascii_string_at(&raw, 4, 10).chars().count(), 2);
        assert_eq!(ascii_string_at(&raw, 10, 4), "");
    }

    #[test]
    fn text_decoders() {
        assert_eq!(utf8_decode("caf\u{e9}".as_bytes()).as_deref(), Some("caf\u{e9}"));
        assert_eq!(utf8_decode(&[0xC3]), None);
        assert_eq!(utf8_decode_lossy(&[b'a', 0xC3]), "a\u{fffd}");
        assert_eq!(utf8_encode("ok"), b"ok");
        assert_eq!(utf16_decode(&[0x00, b'Z', 0x00, b'o', 0x00]), "Zo");
        assert_eq!(utf16_decode(&[0xD8, 0x00]), "\u{fffd}");
    }
}
