//! Resource identities and the chunks that refer to resources by identity:
//! the resource index (`RIdx`), resource descriptions (`RDes`) and the
//! frontispiece (`Fspc`).
//!
//! # Wire layouts
//!
//! | Chunk | Layout |
//! |-------|--------|
//! | `RIdx` | `count:u32`, then `count` × `{usage:4, number:u32, file_pos:u32}` |
//! | `RDes` | `count:u32`, then `count` × `{usage:4, number:u32, len:u32, text:utf8[len]}` |
//! | `Fspc` | `picture:u32` |

use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read};
use std::str::FromStr;

use byteorder::{BigEndian, ReadBytesExt};
use serde::{Serialize, Serializer};

use crate::codec::{bytes_to_ascii_string, push_u32_be, read_u32_be, utf8_decode, utf8_decode_lossy, utf8_encode};
use crate::error::BlorbError;

// ── Usage ─────────────────────────────────────────────────────────────────────

/// Category of a resource, stored as a 4-byte tag in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Usage {
    Pict,
    Snd,
    Data,
    Exec,
}

impl Usage {
    pub const ALL: [Usage; 4] = [Usage::Pict, Usage::Snd, Usage::Data, Usage::Exec];

    pub fn tag(self) -> [u8; 4] {
        match self {
            Usage::Pict => *b"Pict",
            Usage::Snd  => *b"Snd ",
            Usage::Data => *b"Data",
            Usage::Exec => *b"Exec",
        }
    }

    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        Usage::ALL.into_iter().find(|u| u.tag() == tag)
    }

    /// Tag with trailing spaces removed, for filenames.
    pub fn short_name(self) -> &'static str {
        match self {
            Usage::Pict => "Pict",
            Usage::Snd  => "Snd",
            Usage::Data => "Data",
            Usage::Exec => "Exec",
        }
    }
}

impl fmt::Display for Usage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bytes_to_ascii_string(&self.tag()))
    }
}

impl FromStr for Usage {
    type Err = BlorbError;

    /// Accepts the raw tag or the tag without its trailing space (`"Snd"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Usage::ALL
            .into_iter()
            .find(|u| u.short_name() == s.trim_end())
            .ok_or_else(|| BlorbError::BadResourceId(s.to_owned()))
    }
}

impl Serialize for Usage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── ResourceId ────────────────────────────────────────────────────────────────

/// A `(usage, number)` pair: the key a resource is known by.
///
/// Displays as `"<usage>:<number>"`, e.g. `Pict:3` or `Snd :2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub usage:  Usage,
    pub number: u32,
}

impl ResourceId {
    pub fn new(usage: Usage, number: u32) -> Self {
        Self { usage, number }
    }

    pub fn pict(number: u32) -> Self {
        Self::new(Usage::Pict, number)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.usage, self.number)
    }
}

impl FromStr for ResourceId {
    type Err = BlorbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || BlorbError::BadResourceId(s.to_owned());
        let (usage, number) = s.split_once(':').ok_or_else(bad)?;
        Ok(Self {
            usage:  usage.parse().map_err(|_| bad())?,
            number: number.trim().parse().map_err(|_| bad())?,
        })
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ── Resource index (RIdx) ─────────────────────────────────────────────────────

pub const INDEX_ENTRY_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexEntry {
    pub resource: ResourceId,
    /// Absolute offset of the resource chunk's tag byte.
    pub file_pos: u32,
}

/// Parsed `RIdx` payload plus both lookup directions.
///
/// When input files carry duplicate keys or positions, the maps hold the
/// first entry; the full list is kept in `entries` for the checker.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceIndex {
    entries:     Vec<IndexEntry>,
    by_resource: HashMap<ResourceId, u32>,
    by_pos:      HashMap<u32, IndexEntry>,
}

impl ResourceIndex {
    pub fn new(entries: Vec<IndexEntry>) -> Self {
        let mut by_resource = HashMap::with_capacity(entries.len());
        let mut by_pos = HashMap::with_capacity(entries.len());
        for e in &entries {
            by_resource.entry(e.resource).or_insert(e.file_pos);
            by_pos.entry(e.file_pos).or_insert(*e);
        }
        Self { entries, by_resource, by_pos }
    }

    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        let Some(count) = read_u32_be(data, 0) else {
            errors.push(format!("RIdx: chunk too short ({} bytes) to hold an entry count", data.len()));
            return Self::default();
        };
        let expected = 4 + count as u64 * INDEX_ENTRY_SIZE as u64;
        if expected != data.len() as u64 {
            errors.push(format!(
                "RIdx: bad index chunk count ({count} entries need {expected} bytes, chunk has {})",
                data.len()
            ));
        }

        let available = (data.len() - 4) / INDEX_ENTRY_SIZE;
        let mut entries = Vec::with_capacity(available.min(count as usize));
        for (i, raw) in data[4..].chunks_exact(INDEX_ENTRY_SIZE).take(count as usize).enumerate() {
            let number = read_u32_be(raw, 4).unwrap_or_default();
            let file_pos = read_u32_be(raw, 8).unwrap_or_default();
            match Usage::from_tag(&raw[..4]) {
                Some(usage) => entries.push(IndexEntry { resource: ResourceId { usage, number }, file_pos }),
                None => errors.push(format!(
                    "RIdx: entry {i} has unrecognized usage '{}'",
                    bytes_to_ascii_string(&raw[..4])
                )),
            }
        }
        Self::new(entries)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_index(&self.entries)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pos_of(&self, resource: ResourceId) -> Option<u32> {
        self.by_resource.get(&resource).copied()
    }

    pub fn entry_at(&self, file_pos: u32) -> Option<&IndexEntry> {
        self.by_pos.get(&file_pos)
    }
}

pub(crate) fn encode_index(entries: &[IndexEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + entries.len() * INDEX_ENTRY_SIZE);
    push_u32_be(&mut out, entries.len() as u32);
    for e in entries {
        out.extend_from_slice(&e.resource.usage.tag());
        push_u32_be(&mut out, e.resource.number);
        push_u32_be(&mut out, e.file_pos);
    }
    out
}

// ── Resource descriptions (RDes) ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Description {
    pub resource: ResourceId,
    pub text:     String,
}

/// Parsed `RDes` payload.  Alternative text for resources, in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResourceDescriptions {
    entries:     Vec<Description>,
    by_resource: HashMap<ResourceId, String>,
}

impl ResourceDescriptions {
    pub fn new(entries: Vec<Description>) -> Self {
        let mut by_resource = HashMap::with_capacity(entries.len());
        for d in &entries {
            by_resource.entry(d.resource).or_insert_with(|| d.text.clone());
        }
        Self { entries, by_resource }
    }

    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        let mut cur = Cursor::new(data);
        let Ok(count) = cur.read_u32::<BigEndian>() else {
            errors.push(format!("RDes: chunk too short ({} bytes) to hold an entry count", data.len()));
            return Self::default();
        };

        let mut entries = Vec::new();
        for i in 0..count {
            let mut usage = [0u8; 4];
            let header = cur.read_exact(&mut usage).and_then(|_| {
                Ok((cur.read_u32::<BigEndian>()?, cur.read_u32::<BigEndian>()?))
            });
            let Ok((number, len)) = header else {
                errors.push(format!("RDes: entry {i} of {count} is truncated"));
                break;
            };
            let start = cur.position() as usize;
            let Some(raw) = data.get(start..start.saturating_add(len as usize)) else {
                errors.push(format!("RDes: text of entry {i} runs past the end of the chunk"));
                cur.set_position(data.len() as u64);
                break;
            };
            cur.set_position((start + raw.len()) as u64);

            let text = utf8_decode(raw).unwrap_or_else(|| {
                errors.push(format!("RDes: text of entry {i} is not valid UTF-8"));
                utf8_decode_lossy(raw)
            });
            match Usage::from_tag(&usage) {
                Some(usage) => entries.push(Description { resource: ResourceId { usage, number }, text }),
                None => errors.push(format!(
                    "RDes: entry {i} has unrecognized usage '{}'",
                    bytes_to_ascii_string(&usage)
                )),
            }
        }

        let consumed = cur.position() as usize;
        if consumed != data.len() {
            errors.push(format!(
                "RDes: chunk is {} bytes but its entries account for {consumed}",
                data.len()
            ));
        }
        Self::new(entries)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode_descriptions(&self.entries)
    }

    pub fn entries(&self) -> &[Description] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn text_for(&self, resource: ResourceId) -> Option<&str> {
        self.by_resource.get(&resource).map(String::as_str)
    }
}

pub(crate) fn encode_descriptions(entries: &[Description]) -> Vec<u8> {
    let mut out = Vec::new();
    push_u32_be(&mut out, entries.len() as u32);
    for d in entries {
        out.extend_from_slice(&d.resource.usage.tag());
        push_u32_be(&mut out, d.resource.number);
        let text = utf8_encode(&d.text);
        push_u32_be(&mut out, text.len() as u32);
        out.extend_from_slice(&text);
    }
    out
}

// ── Frontispiece (Fspc) ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Frontispiece {
    /// Number of the `Pict` resource used as cover art.
    pub picture: u32,
}

impl Frontispiece {
    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        if data.len() != 4 {
            errors.push(format!("Fspc: bad chunk size ({} rather than 4)", data.len()));
        }
        Self { picture: read_u32_be(data, 0).unwrap_or_default() }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.picture.to_be_bytes().to_vec()
    }
}
