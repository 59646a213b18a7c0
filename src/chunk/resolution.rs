//! `Reso`: preferred window size and per-picture scaling ratios.
//!
//! Layout: a 24-byte window header (`size`, `min_size`, `max_size`, each
//! `{width:u32, height:u32}`), then zero or more 28-byte entries of
//! `{number:u32, std, min, max}` where each ratio is
//! `{numerator:u32, denominator:u32}`.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt};
use serde::Serialize;

use crate::codec::push_u32_be;
use crate::image::Size;

pub const WINDOW_HEADER_SIZE: usize = 24;
pub const RESOLUTION_ENTRY_SIZE: usize = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Ratio {
    pub numerator:   u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Window {
    pub size:     Size,
    pub min_size: Size,
    pub max_size: Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolutionEntry {
    /// Number of the `Pict` resource this entry scales.
    pub number:    u32,
    pub std_ratio: Ratio,
    pub min_ratio: Ratio,
    pub max_ratio: Ratio,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Resolution {
    pub window:  Window,
    pub entries: Vec<ResolutionEntry>,
}

impl Resolution {
    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        if data.len() < WINDOW_HEADER_SIZE {
            errors.push(format!(
                "Reso: chunk too short ({} bytes) for the {WINDOW_HEADER_SIZE}-byte window header",
                data.len()
            ));
            return Self::default();
        }

        let mut cur = Cursor::new(data);
        let window = Window {
            size:     read_size(&mut cur),
            min_size: read_size(&mut cur),
            max_size: read_size(&mut cur),
        };

        let body = &data[WINDOW_HEADER_SIZE..];
        let entries = body
            .chunks_exact(RESOLUTION_ENTRY_SIZE)
            .map(|raw| {
                let mut cur = Cursor::new(raw);
                ResolutionEntry {
                    number:    cur.read_u32::<BigEndian>().unwrap_or_default(),
                    std_ratio: read_ratio(&mut cur),
                    min_ratio: read_ratio(&mut cur),
                    max_ratio: read_ratio(&mut cur),
                }
            })
            .collect();

        let trailing = body.len() % RESOLUTION_ENTRY_SIZE;
        if trailing != 0 {
            errors.push(format!("Reso: {trailing} stray bytes after the last entry"));
        }
        Self { window, entries }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WINDOW_HEADER_SIZE + self.entries.len() * RESOLUTION_ENTRY_SIZE);
        for s in [self.window.size, self.window.min_size, self.window.max_size] {
            push_u32_be(&mut out, s.width);
            push_u32_be(&mut out, s.height);
        }
        for e in &self.entries {
            push_u32_be(&mut out, e.number);
            for r in [e.std_ratio, e.min_ratio, e.max_ratio] {
                push_u32_be(&mut out, r.numerator);
                push_u32_be(&mut out, r.denominator);
            }
        }
        out
    }

    pub fn entry_for(&self, number: u32) -> Option<&ResolutionEntry> {
        self.entries.iter().find(|e| e.number == number)
    }
}

// Callers have already checked the length, so short reads cannot happen.
fn read_size(cur: &mut Cursor<&[u8]>) -> Size {
    Size {
        width:  cur.read_u32::<BigEndian>().unwrap_or_default(),
        height: cur.read_u32::<BigEndian>().unwrap_or_default(),
    }
}

fn read_ratio(cur: &mut Cursor<&[u8]>) -> Ratio {
    Ratio {
        numerator:   cur.read_u32::<BigEndian>().unwrap_or_default(),
        denominator: cur.read_u32::<BigEndian>().unwrap_or_default(),
    }
}
