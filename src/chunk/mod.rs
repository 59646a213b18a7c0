//! Typed chunk model.
//!
//! A [`Chunk`] is one tagged payload from a Blorb file.  Its [`ChunkContent`]
//! is derived from the payload exactly once, by [`parse_chunk`], which is the
//! only place that dispatches on the tag.  Everything downstream reaches the
//! typed view through the checked `as_*` accessors.
//!
//! # Identity
//! Every chunk carries a [`ChunkKey`] allocated from a process-wide counter.
//! Keys are never reused.  A chunk rebuilt to replace another (same logical
//! resource, new payload) takes over the old key via [`Chunk::with_key`].
//!
//! # Immutability
//! Chunks are immutable values.  The document holds them behind `Arc`, and
//! payload bytes are themselves shared, so relocating a chunk during layout
//! copies a handful of fields and never the payload.

pub mod describe;
pub mod game;
pub mod resolution;
pub mod resource;
pub mod text;

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;
use serde::{Serialize, Serializer};

use crate::codec::{ascii_string_to_bytes, bytes_to_ascii_string, read_u32_be};
use crate::error::{BlorbError, Result};
use crate::image::{jpeg_dimensions, png_dimensions, Size};

pub use describe::{guess_chunk_type, readable_description, suggested_filename_and_mime_type, ExportName};
pub use game::{GlulxHeader, InformInfo, ReleaseNumber, ZCodeHeader};
pub use resolution::{Ratio, Resolution, ResolutionEntry, Window};
pub use resource::{Description, Frontispiece, IndexEntry, ResourceDescriptions, ResourceId, ResourceIndex, Usage};
pub use text::{Metadata, Text};

// ── ChunkType ─────────────────────────────────────────────────────────────────

/// A four-byte chunk tag.
///
/// The raw bytes are authoritative; the string form is derived one
/// character per byte, so tags with spaces or non-printable bytes still
/// round-trip exactly.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkType([u8; 4]);

impl ChunkType {
    pub const RIDX: ChunkType = ChunkType(*b"RIdx");
    pub const FORM: ChunkType = ChunkType(*b"FORM");
    pub const FSPC: ChunkType = ChunkType(*b"Fspc");
    pub const RDES: ChunkType = ChunkType(*b"RDes");
    pub const IFMD: ChunkType = ChunkType(*b"IFmd");
    pub const IFHD: ChunkType = ChunkType(*b"IFhd");
    pub const PLTE: ChunkType = ChunkType(*b"Plte");
    pub const RELN: ChunkType = ChunkType(*b"RelN");
    pub const RESO: ChunkType = ChunkType(*b"Reso");
    pub const APAL: ChunkType = ChunkType(*b"APal");
    pub const LOOP: ChunkType = ChunkType(*b"Loop");
    pub const SNAM: ChunkType = ChunkType(*b"SNam");
    pub const ZCOD: ChunkType = ChunkType(*b"ZCOD");
    pub const GLUL: ChunkType = ChunkType(*b"GLUL");
    pub const PNG:  ChunkType = ChunkType(*b"PNG ");
    pub const JPEG: ChunkType = ChunkType(*b"JPEG");
    pub const TEXT: ChunkType = ChunkType(*b"TEXT");
    pub const AUTH: ChunkType = ChunkType(*b"AUTH");
    pub const ANNO: ChunkType = ChunkType(*b"ANNO");
    pub const COPY: ChunkType = ChunkType(*b"(c) ");
    pub const BINA: ChunkType = ChunkType(*b"BINA");

    pub const fn new(raw: [u8; 4]) -> Self {
        Self(raw)
    }

    /// First four bytes of `bytes`, if there are four.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.get(..4)?.try_into().ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    pub fn as_string(&self) -> String {
        bytes_to_ascii_string(&self.0)
    }

    /// String form without trailing spaces (`"PNG "` → `"PNG"`).
    pub fn trimmed(&self) -> String {
        self.as_string().trim_end().to_owned()
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl fmt::Debug for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkType({:?})", self.as_string())
    }
}

impl FromStr for ChunkType {
    type Err = BlorbError;

    /// Up to four one-byte characters; short tags are padded with spaces.
    fn from_str(s: &str) -> Result<Self> {
        let n = s.chars().count();
        if n == 0 || n > 4 || s.chars().any(|c| u32::from(c) > 0xFF) {
            return Err(BlorbError::BadTag(s.to_owned()));
        }
        let mut raw = [b' '; 4];
        raw[..n].copy_from_slice(&ascii_string_to_bytes(s));
        Ok(Self(raw))
    }
}

impl Serialize for ChunkType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

/// Chunk types of which a document may hold at most one.
pub const SINGLETON_TYPES: [ChunkType; 11] = [
    ChunkType::RIDX,
    ChunkType::IFHD,
    ChunkType::PLTE,
    ChunkType::FSPC,
    ChunkType::RDES,
    ChunkType::IFMD,
    ChunkType::RELN,
    ChunkType::RESO,
    ChunkType::APAL,
    ChunkType::LOOP,
    ChunkType::SNAM,
];

pub fn is_singleton_type(tag: ChunkType) -> bool {
    SINGLETON_TYPES.contains(&tag)
}

// ── ChunkKey ──────────────────────────────────────────────────────────────────

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Opaque chunk identity, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChunkKey(u64);

impl ChunkKey {
    pub fn fresh() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Typed content ─────────────────────────────────────────────────────────────

/// Image chunk view.  `size` is `None` when the payload was not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImageInfo {
    pub size: Option<Size>,
}

/// Typed view of a chunk's payload, selected by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkContent {
    /// Any tag without a dedicated parser (sounds, other executables, `BINA`...).
    Opaque,
    ResourceIndex(ResourceIndex),
    Frontispiece(Frontispiece),
    ResourceDescriptions(ResourceDescriptions),
    Metadata(Metadata),
    ZCode(ZCodeHeader),
    Glulx(GlulxHeader),
    Image(ImageInfo),
    Text(Text),
    ReleaseNumber(ReleaseNumber),
    Resolution(Resolution),
}

// ── Chunk ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    key:        ChunkKey,
    chunk_type: ChunkType,
    form_type:  Option<ChunkType>,
    data:       Arc<[u8]>,
    index:      usize,
    file_pos:   u32,
    content:    ChunkContent,
}

/// Parse `data` as a chunk of type `chunk_type`.
///
/// Never fails.  Malformed payloads produce a best-effort chunk with zeroed
/// or empty fields plus a list of problems.  For `FORM` chunks `data` starts
/// with the form's own 8-byte header and the subtype is read from bytes 8..12.
pub fn parse_chunk(
    chunk_type: ChunkType,
    data: impl Into<Arc<[u8]>>,
    original_pos: Option<u32>,
) -> (Chunk, Vec<String>) {
    let data: Arc<[u8]> = data.into();
    let mut errors = Vec::new();

    let form_type = if chunk_type == ChunkType::FORM {
        let sub = data.get(8..).and_then(ChunkType::from_slice);
        if sub.is_none() {
            errors.push(format!("FORM: chunk too short ({} bytes) to hold a form type", data.len()));
        }
        if data.len() >= 8 {
            if &data[..4] != b"FORM" {
                errors.push("FORM: payload does not start with its own FORM header".to_string());
            }
            let declared = read_u32_be(&data, 4).unwrap_or_default();
            if declared as usize != data.len() - 8 {
                errors.push(format!("FORM: header declares {declared} bytes but {} follow", data.len() - 8));
            }
        }
        sub
    } else {
        None
    };

    let content = match chunk_type {
        ChunkType::RIDX => ChunkContent::ResourceIndex(ResourceIndex::parse(&data, &mut errors)),
        ChunkType::FSPC => ChunkContent::Frontispiece(Frontispiece::parse(&data, &mut errors)),
        ChunkType::RDES => ChunkContent::ResourceDescriptions(ResourceDescriptions::parse(&data, &mut errors)),
        ChunkType::IFMD => ChunkContent::Metadata(Metadata::parse(&data, &mut errors)),
        ChunkType::ZCOD => ChunkContent::ZCode(ZCodeHeader::parse(&data)),
        ChunkType::GLUL => ChunkContent::Glulx(GlulxHeader::parse(&data)),
        ChunkType::PNG => ChunkContent::Image(ImageInfo { size: png_dimensions(&data) }),
        ChunkType::JPEG => ChunkContent::Image(ImageInfo { size: jpeg_dimensions(&data) }),
        ChunkType::TEXT | ChunkType::AUTH | ChunkType::ANNO | ChunkType::COPY | ChunkType::SNAM => {
            ChunkContent::Text(Text::parse(chunk_type, &data, &mut errors))
        }
        ChunkType::RELN => ChunkContent::ReleaseNumber(ReleaseNumber::parse(&data, &mut errors)),
        ChunkType::RESO => ChunkContent::Resolution(Resolution::parse(&data, &mut errors)),
        _ => ChunkContent::Opaque,
    };

    let chunk = Chunk {
        key: ChunkKey::fresh(),
        chunk_type,
        form_type,
        data,
        index: 0,
        file_pos: original_pos.unwrap_or_default(),
        content,
    };
    debug!("parsed {} {} ({} bytes, {} problem(s))", chunk.key, chunk.type_label(), chunk.data.len(), errors.len());
    (chunk, errors)
}

macro_rules! typed_accessor {
    ($name:ident, $variant:ident, $ty:ty, $what:literal) => {
        #[doc = concat!("The ", $what, " view, or `WrongVariant`.")]
        pub fn $name(&self) -> Result<&$ty> {
            match &self.content {
                ChunkContent::$variant(v) => Ok(v),
                _ => Err(self.wrong_variant($what)),
            }
        }
    };
}

impl Chunk {
    // ── Constructors for edit-produced chunks ───────────────────────────────

    /// Build from fields that are known to be well formed.
    fn built(chunk_type: ChunkType, data: Vec<u8>) -> Self {
        let (chunk, errors) = parse_chunk(chunk_type, data, None);
        debug_assert!(errors.is_empty(), "built {chunk_type} chunk reparsed with errors: {errors:?}");
        chunk
    }

    pub fn frontispiece(picture: u32) -> Self {
        Self::built(ChunkType::FSPC, Frontispiece { picture }.to_bytes())
    }

    pub fn resource_index(entries: &[IndexEntry]) -> Self {
        Self::built(ChunkType::RIDX, resource::encode_index(entries))
    }

    pub fn empty_resource_index() -> Self {
        Self::resource_index(&[])
    }

    pub fn resource_descriptions(entries: &[Description]) -> Self {
        Self::built(ChunkType::RDES, resource::encode_descriptions(entries))
    }

    pub fn empty_resource_descriptions() -> Self {
        Self::resource_descriptions(&[])
    }

    pub fn resolution(window: Window, entries: Vec<ResolutionEntry>) -> Self {
        Self::built(ChunkType::RESO, Resolution { window, entries }.to_bytes())
    }

    /// Same chunk under `key`, for replacing a chunk in place.
    pub fn with_key(mut self, key: ChunkKey) -> Self {
        self.key = key;
        self
    }

    /// Copy placed at a new position.  Only layout calls this.
    pub(crate) fn placed(&self, index: usize, file_pos: u32) -> Self {
        Self { index, file_pos, ..self.clone() }
    }

    // ── Fields ──────────────────────────────────────────────────────────────

    pub fn key(&self) -> ChunkKey {
        self.key
    }

    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }

    pub fn form_type(&self) -> Option<ChunkType> {
        self.form_type
    }

    /// Raw payload.  For `FORM` chunks this includes the 8-byte form header.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn shared_data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    /// Position in the document's chunk sequence.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Offset of this chunk's tag byte in the serialized file.
    pub fn file_pos(&self) -> u32 {
        self.file_pos
    }

    pub fn content(&self) -> &ChunkContent {
        &self.content
    }

    pub fn is_form(&self) -> bool {
        self.chunk_type == ChunkType::FORM
    }

    /// Length the chunk's payload field declares on disk.
    pub fn payload_len(&self) -> usize {
        if self.is_form() {
            self.data.len().saturating_sub(8)
        } else {
            self.data.len()
        }
    }

    /// Bytes this chunk occupies on disk, header included, before padding.
    pub fn encoded_len(&self) -> usize {
        if self.is_form() {
            self.data.len()
        } else {
            8 + self.data.len()
        }
    }

    /// `"FORM/AIFF"` for forms, otherwise the tag.
    pub fn type_label(&self) -> String {
        match self.form_type {
            Some(sub) => format!("FORM/{sub}"),
            None => self.chunk_type.as_string(),
        }
    }

    // ── Typed views ─────────────────────────────────────────────────────────

    fn wrong_variant(&self, expected: &'static str) -> BlorbError {
        BlorbError::WrongVariant { expected, found: self.type_label() }
    }

    typed_accessor!(as_resource_index, ResourceIndex, ResourceIndex, "resource index");
    typed_accessor!(as_frontispiece, Frontispiece, Frontispiece, "frontispiece");
    typed_accessor!(as_resource_descriptions, ResourceDescriptions, ResourceDescriptions, "resource descriptions");
    typed_accessor!(as_metadata, Metadata, Metadata, "metadata");
    typed_accessor!(as_zcode, ZCode, ZCodeHeader, "Z-code header");
    typed_accessor!(as_glulx, Glulx, GlulxHeader, "Glulx header");
    typed_accessor!(as_image, Image, ImageInfo, "image");
    typed_accessor!(as_text, Text, Text, "text");
    typed_accessor!(as_release_number, ReleaseNumber, ReleaseNumber, "release number");
    typed_accessor!(as_resolution, Resolution, Resolution, "resolution");
}
