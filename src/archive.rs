//! Loading and exporting documents: the surface an embedding application or
//! the CLI works through.
//!
//! ```no_run
//! use blorbkit::archive::{load_path, save_path};
//! use blorbkit::chunk::ResourceId;
//! use blorbkit::edit::{apply_edit, Edit};
//!
//! let doc = load_path("story.gblorb")?;
//! for e in doc.errors() {
//!     eprintln!("{e}");
//! }
//! let doc = apply_edit(&doc, Edit::SetResourceDescription {
//!     resource: ResourceId::pict(1),
//!     text:     "A brass lantern".into(),
//! });
//! save_path(&doc, "story-described.gblorb")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::blorb::Blorb;
use crate::check::{check_against_expected_layout, check_consistency};
use crate::chunk::{readable_description, suggested_filename_and_mime_type, Chunk, ChunkKey, ResourceId};
use crate::error::Result;

// ── LoadOptions ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Also report chunks whose offset in the input differs from the
    /// canonical layout.
    pub check_layout: bool,
}

// ── In-memory API ─────────────────────────────────────────────────────────────

/// Parse and check.  Never fails; problems end up in [`Blorb::errors`].
pub fn load_document(filename: Option<&str>, bytes: &[u8]) -> Blorb {
    load_document_with(filename, bytes, &LoadOptions::default())
}

pub fn load_document_with(filename: Option<&str>, bytes: &[u8], opts: &LoadOptions) -> Blorb {
    let (doc, original) = Blorb::parse_with_original_layout(bytes);
    let doc = check_consistency(&doc.with_filename(filename.map(str::to_owned)));
    if opts.check_layout && !doc.is_empty() {
        check_against_expected_layout(&doc, bytes.len() as u32, &original)
    } else {
        doc
    }
}

pub fn export_document(doc: &Blorb) -> Vec<u8> {
    doc.to_bytes()
}

/// A chunk's payload ready to be written as a standalone file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedChunk {
    pub bytes:     Vec<u8>,
    pub filename:  String,
    pub mime_type: &'static str,
}

/// `FORM` chunks keep their form header, so an exported AIFF is a complete
/// AIFF file.
pub fn export_chunk(chunk: &Chunk, doc: &Blorb) -> ExportedChunk {
    let name = suggested_filename_and_mime_type(chunk, doc);
    ExportedChunk { bytes: chunk.data().to_vec(), filename: name.filename, mime_type: name.mime_type }
}

// ── ChunkInfo ─────────────────────────────────────────────────────────────────

/// One row of a chunk listing.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkInfo {
    pub key:         ChunkKey,
    pub index:       usize,
    pub file_pos:    u32,
    pub chunk_type:  String,
    pub description: &'static str,
    pub length:      usize,
    pub resource:    Option<ResourceId>,
    /// BLAKE3 of the payload, hex.
    pub digest:      String,
}

impl ChunkInfo {
    pub fn new(chunk: &Chunk, doc: &Blorb) -> Self {
        Self {
            key:         chunk.key(),
            index:       chunk.index(),
            file_pos:    chunk.file_pos(),
            chunk_type:  chunk.type_label(),
            description: readable_description(chunk),
            length:      chunk.payload_len(),
            resource:    doc.resource_for_chunk(chunk),
            digest:      hex::encode(blake3::hash(chunk.data()).as_bytes()),
        }
    }
}

pub fn list_chunks(doc: &Blorb) -> Vec<ChunkInfo> {
    doc.chunks().iter().map(|c| ChunkInfo::new(c, doc)).collect()
}

// ── File glue ─────────────────────────────────────────────────────────────────

pub fn load_path(path: impl AsRef<Path>) -> Result<Blorb> {
    load_path_with(path, &LoadOptions::default())
}

pub fn load_path_with(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<Blorb> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let filename = path.file_name().map(|n| n.to_string_lossy().into_owned());
    let doc = load_document_with(filename.as_deref(), &bytes, opts);
    info!("loaded {}: {} chunk(s), {} diagnostic(s)", path.display(), doc.len(), doc.errors().len());
    Ok(doc)
}

pub fn save_path(doc: &Blorb, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let bytes = export_document(doc);
    let mut f = File::create(path)?;
    f.write_all(&bytes)?;
    f.flush()?;
    info!("wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
