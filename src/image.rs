//! Dimension probes for embedded PNG and JPEG payloads.
//!
//! Neither probe decodes pixels.  Each walks the container structure of its
//! format just far enough to reach the header that records the image size,
//! and gives up (returns `None`) at the first thing it does not understand.

use serde::Serialize;

use crate::codec::{read_u16_be, read_u32_be};

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Pixel dimensions.  Also used for the window sizes of a `Reso` chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Size {
    pub width:  u32,
    pub height: u32,
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Width and height from the `IHDR` chunk of a PNG stream.
///
/// PNG chunks are `length:u32, type:4, data[length], crc:4`.  The walk stops
/// at the first `IHDR`, or when the next chunk header would run past the end.
pub fn png_dimensions(bytes: &[u8]) -> Option<Size> {
    if bytes.get(..PNG_SIGNATURE.len())? != PNG_SIGNATURE {
        return None;
    }
    let mut pos = PNG_SIGNATURE.len();
    loop {
        let length = read_u32_be(bytes, pos)? as usize;
        let tag = bytes.get(pos + 4..pos + 8)?;
        if tag == b"IHDR" {
            return Some(Size {
                width:  read_u32_be(bytes, pos + 8)?,
                height: read_u32_be(bytes, pos + 12)?,
            });
        }
        pos = pos.checked_add(12)?.checked_add(length)?;
    }
}

/// Width and height from the first Start-Of-Frame marker of a JPEG stream.
///
/// Markers are `0xFF` followed by a marker byte.  `0x01` and `0xD0..=0xD9`
/// stand alone; every other marker is followed by a big-endian `u16` segment
/// length that counts itself.  A SOF segment holds precision, height, width.
pub fn jpeg_dimensions(bytes: &[u8]) -> Option<Size> {
    let mut pos = 0usize;
    loop {
        if *bytes.get(pos)? != 0xFF {
            return None;
        }
        // Any number of 0xFF fill bytes may precede the marker byte.
        let mut marker_pos = pos + 1;
        while *bytes.get(marker_pos)? == 0xFF {
            marker_pos += 1;
        }
        let marker = bytes[marker_pos];
        let segment = marker_pos + 1;

        if marker == 0x01 || (0xD0..=0xD9).contains(&marker) {
            pos = segment;
            continue;
        }

        let length = read_u16_be(bytes, segment)? as usize;
        if is_start_of_frame(marker) {
            // Offsets and the minimum are measured from the length field:
            // length(2) precision(1) height(2) width(2).
            if length < 7 {
                return None;
            }
            let height = read_u16_be(bytes, segment + 3)?;
            let width = read_u16_be(bytes, segment + 5)?;
            return Some(Size { width: width.into(), height: height.into() });
        }
        pos = segment + length;
    }
}

/// SOF0..SOF15, less the three codes in that range that are not frames:
/// DHT (`C4`), JPG (`C8`) and DAC (`CC`).
fn is_start_of_frame(marker: u8) -> bool {
    (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}
