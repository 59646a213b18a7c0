//! The Blorb document: an ordered chunk list plus everything derived from it.
//!
//! # File layout
//! ```text
//! "FORM" | total_len - 8 : u32 | "IFRS"        12-byte envelope
//! tag:4 | len:u32 | payload[len] | pad?         repeated, 2-byte aligned
//! ```
//! A `FORM` sub-chunk keeps its own 8-byte header inside its payload, so it
//! contributes `data.len()` bytes rather than `8 + data.len()`.
//!
//! # Derived state
//! `index`/`file_pos` of every chunk, `total_length`, the resource index
//! entries' positions and the three lookup maps are never patched.  Every
//! structural change goes through [`Blorb::layout`], which recomputes all of
//! them in one pass from the chunk list.  A `Blorb` is an immutable value:
//! mutators return a new document that shares unchanged chunks by `Arc`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use crate::chunk::resource::INDEX_ENTRY_SIZE;
use crate::chunk::{parse_chunk, Chunk, ChunkKey, ChunkType, IndexEntry, ResourceId, ResourceIndex};
use crate::codec::{push_u32_be, read_u32_be, write_u32_be};

/// Size of the `FORM`/length/`IFRS` envelope.
pub const HEADER_SIZE: u32 = 12;
pub const FORM_TAG: &[u8; 4] = b"FORM";
pub const BLORB_FORM_TYPE: &[u8; 4] = b"IFRS";

/// One problem found in a document, optionally tied to the chunk it concerns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub text:  String,
    pub chunk: Option<ChunkKey>,
}

impl Diagnostic {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), chunk: None }
    }

    pub fn for_chunk(chunk: ChunkKey, text: impl Into<String>) -> Self {
        Self { text: text.into(), chunk: Some(chunk) }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Blorb {
    filename:     Option<String>,
    chunks:       Vec<Arc<Chunk>>,
    total_length: u32,
    errors:       Vec<Diagnostic>,

    by_key:       HashMap<ChunkKey, usize>,
    by_pos:       HashMap<u32, usize>,
    by_resource:  HashMap<ResourceId, ChunkKey>,
}

#[inline]
fn padded(len: usize) -> usize {
    len + (len & 1)
}

impl Blorb {
    // ── Construction ─────────────────────────────────────────────────────────

    /// A document holding only an empty resource index.
    pub fn new(filename: Option<String>) -> Self {
        let chunks = vec![Arc::new(Chunk::empty_resource_index())];
        Self::layout(filename, chunks, Vec::new(), &HashMap::new())
    }

    /// Empty document carrying one error: what a file that is not a Blorb
    /// at all turns into.
    fn unreadable(text: String) -> Self {
        warn!("{text}");
        Self::layout(None, Vec::new(), vec![Diagnostic::new(text)], &HashMap::new())
    }

    /// Parse a complete Blorb file.  Never fails; see [`Blorb::errors`].
    pub fn parse(bytes: &[u8]) -> Self {
        Self::parse_with_original_layout(bytes).0
    }

    /// Like [`Blorb::parse`], also returning the offset every chunk had in
    /// `bytes` before layout was recomputed.
    pub fn parse_with_original_layout(bytes: &[u8]) -> (Self, HashMap<ChunkKey, u32>) {
        if bytes.len() < HEADER_SIZE as usize {
            return (Self::unreadable(format!("file too short ({} bytes) to be a blorb", bytes.len())), HashMap::new());
        }
        if &bytes[..4] != FORM_TAG {
            return (Self::unreadable("not an IFF file (missing FORM header)".to_string()), HashMap::new());
        }
        if &bytes[8..12] != BLORB_FORM_TYPE {
            let found = ChunkType::from_slice(&bytes[8..12]).map(|t| t.as_string()).unwrap_or_default();
            return (
                Self::unreadable(format!("not a blorb file (form type {found:?} rather than \"IFRS\")")),
                HashMap::new(),
            );
        }

        let mut errors = Vec::new();
        let declared = read_u32_be(bytes, 4).unwrap_or_default();
        if declared as usize != bytes.len() - 8 {
            warn!("FORM length {declared} does not match file length {}", bytes.len());
            errors.push(Diagnostic::new(format!(
                "FORM header declares {declared} bytes but the file holds {}",
                bytes.len() - 8
            )));
        }

        let mut chunks = Vec::new();
        let mut original = HashMap::new();
        let mut pos = HEADER_SIZE as usize;
        while pos < bytes.len() {
            let (Some(tag), Some(len)) = (ChunkType::from_slice(&bytes[pos..]), read_u32_be(bytes, pos + 4)) else {
                errors.push(Diagnostic::new(format!("truncated chunk header at offset {pos}")));
                break;
            };
            let len = len as usize;
            let end = match pos.checked_add(8 + len) {
                Some(end) if end <= bytes.len() => end,
                _ => {
                    errors.push(Diagnostic::new(format!(
                        "{tag} chunk at offset {pos} declares {len} bytes but only {} remain",
                        bytes.len() - pos - 8
                    )));
                    break;
                }
            };

            let data = if tag == ChunkType::FORM { &bytes[pos..end] } else { &bytes[pos + 8..end] };
            let (chunk, problems) = parse_chunk(tag, data, Some(pos as u32));
            errors.extend(problems.into_iter().map(|p| Diagnostic::for_chunk(chunk.key(), p)));
            original.insert(chunk.key(), pos as u32);
            chunks.push(Arc::new(chunk));
            pos = padded(end);
        }

        let previous = original.iter().map(|(&k, &p)| (p, k)).collect();
        let doc = Self::layout(None, chunks, errors, &previous);
        info!(
            "parsed blorb: {} chunk(s), {} bytes, {} problem(s)",
            doc.chunks.len(),
            bytes.len(),
            doc.errors.len()
        );
        (doc, original)
    }

    // ── Layout ───────────────────────────────────────────────────────────────

    /// Recompute positions, the index and all lookup maps.  Idempotent: on
    /// an already laid-out document every chunk `Arc` is reused.
    pub fn recompute_layout(&self) -> Self {
        Self::layout(self.filename.clone(), self.chunks.clone(), self.errors.clone(), &self.position_keys())
    }

    /// Which chunk sat at each offset in the layout `self` was computed with.
    fn position_keys(&self) -> HashMap<u32, ChunkKey> {
        self.chunks.iter().map(|c| (c.file_pos(), c.key())).collect()
    }

    /// The layout pass.
    ///
    /// `previous` maps offsets as the current index entries know them to
    /// the chunk that was there.  Index entries follow that chunk's key to
    /// its new offset; entries whose chunk is gone are dropped, and entries
    /// that never matched a chunk are kept untouched for the checker.
    fn layout(
        filename: Option<String>,
        mut chunks: Vec<Arc<Chunk>>,
        errors: Vec<Diagnostic>,
        previous: &HashMap<u32, ChunkKey>,
    ) -> Self {
        let present: HashSet<ChunkKey> = chunks.iter().map(|c| c.key()).collect();
        let index = chunks.first().and_then(|c| c.as_resource_index().ok());

        // Which entries survive, and whose position each one tracks.
        let tracked: Option<Vec<(IndexEntry, Option<ChunkKey>)>> = index.map(|idx| {
            idx.entries()
                .iter()
                .filter_map(|e| match previous.get(&e.file_pos) {
                    Some(key) if present.contains(key) => Some((*e, Some(*key))),
                    Some(key) => {
                        debug!("dropping index entry {} of removed chunk {key}", e.resource);
                        None
                    }
                    None => Some((*e, None)),
                })
                .collect()
        });
        if tracked.is_none() {
            if let Some(first) = chunks.first() {
                warn!("first chunk is {}, not a resource index; index left unsynchronised", first.type_label());
            }
        }

        // The index size depends only on how many entries survive, so every
        // offset can be assigned before the entries themselves are rewritten.
        let mut positions = Vec::with_capacity(chunks.len());
        let mut pos = HEADER_SIZE as usize;
        for (i, c) in chunks.iter().enumerate() {
            positions.push(pos as u32);
            let len = match &tracked {
                Some(t) if i == 0 => 8 + 4 + t.len() * INDEX_ENTRY_SIZE,
                _ => c.encoded_len(),
            };
            pos += padded(len);
        }
        let total_length = pos as u32;

        if let Some(tracked) = tracked {
            let new_pos: HashMap<ChunkKey, u32> =
                chunks.iter().zip(&positions).map(|(c, &p)| (c.key(), p)).collect();
            let entries: Vec<IndexEntry> = tracked
                .into_iter()
                .map(|(e, key)| IndexEntry {
                    resource: e.resource,
                    file_pos: key.and_then(|k| new_pos.get(&k).copied()).unwrap_or(e.file_pos),
                })
                .collect();
            let rebuilt = Chunk::resource_index(&entries);
            if rebuilt.data() != chunks[0].data() {
                chunks[0] = Arc::new(rebuilt.with_key(chunks[0].key()));
            }
        }

        for (i, (c, &p)) in chunks.iter_mut().zip(&positions).enumerate() {
            if c.index() != i || c.file_pos() != p {
                *c = Arc::new(c.placed(i, p));
            }
        }

        let by_key: HashMap<ChunkKey, usize> = chunks.iter().enumerate().map(|(i, c)| (c.key(), i)).collect();
        let by_pos: HashMap<u32, usize> = chunks.iter().enumerate().map(|(i, c)| (c.file_pos(), i)).collect();
        let by_resource = chunks
            .first()
            .and_then(|c| c.as_resource_index().ok())
            .map(|idx| {
                // First entry wins for duplicated ids, as in `ResourceIndex::pos_of`.
                let mut map = HashMap::with_capacity(idx.len());
                for e in idx.entries() {
                    if let Some(&i) = by_pos.get(&e.file_pos) {
                        map.entry(e.resource).or_insert(chunks[i].key());
                    }
                }
                map
            })
            .unwrap_or_default();

        Self { filename, chunks, total_length, errors, by_key, by_pos, by_resource }
    }

    // ── Serialization ────────────────────────────────────────────────────────

    /// Write the document.  The output is exactly `total_length` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_length as usize);
        out.extend_from_slice(FORM_TAG);
        push_u32_be(&mut out, 0);
        out.extend_from_slice(BLORB_FORM_TYPE);
        for c in &self.chunks {
            match c.data().get(8..) {
                // The form's own header is regenerated from the payload so the
                // declared length always matches what follows.
                Some(body) if c.is_form() => {
                    out.extend_from_slice(FORM_TAG);
                    push_u32_be(&mut out, body.len() as u32);
                    out.extend_from_slice(body);
                }
                _ if c.is_form() => out.extend_from_slice(c.data()),
                _ => {
                    out.extend_from_slice(c.chunk_type().as_bytes());
                    push_u32_be(&mut out, c.data().len() as u32);
                    out.extend_from_slice(c.data());
                }
            }
            if c.encoded_len() % 2 == 1 {
                out.push(0);
            }
        }
        debug_assert_eq!(out.len(), self.total_length as usize);
        let form_len = (out.len() - 8) as u32;
        write_u32_be(&mut out, 4, form_len);
        out
    }

    // ── Structural mutators ──────────────────────────────────────────────────

    /// Replace the chunk with the same key in place, or append.
    pub fn add_or_replace_chunk(&self, chunk: Chunk) -> Self {
        let mut chunks = self.chunks.clone();
        match self.by_key.get(&chunk.key()) {
            Some(&i) => chunks[i] = Arc::new(chunk),
            None => chunks.push(Arc::new(chunk)),
        }
        Self::layout(self.filename.clone(), chunks, self.errors.clone(), &self.position_keys())
    }

    /// Remove a chunk.  Removing the resource index itself is allowed and
    /// leaves a document the checker will complain about.
    pub fn delete_chunk(&self, key: ChunkKey) -> Self {
        let chunks = self.chunks.iter().filter(|c| c.key() != key).cloned().collect();
        Self::layout(self.filename.clone(), chunks, self.errors.clone(), &self.position_keys())
    }

    pub fn with_filename(&self, filename: Option<String>) -> Self {
        Self { filename, ..self.clone() }
    }

    pub(crate) fn with_errors(&self, errors: Vec<Diagnostic>) -> Self {
        Self { errors, ..self.clone() }
    }

    // ── Lookups ──────────────────────────────────────────────────────────────

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_length(&self) -> u32 {
        self.total_length
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn chunk_for_key(&self, key: ChunkKey) -> Option<&Arc<Chunk>> {
        self.by_key.get(&key).map(|&i| &self.chunks[i])
    }

    pub fn chunk_at(&self, file_pos: u32) -> Option<&Arc<Chunk>> {
        self.by_pos.get(&file_pos).map(|&i| &self.chunks[i])
    }

    pub fn chunk_for_usage(&self, resource: ResourceId) -> Option<&Arc<Chunk>> {
        self.by_resource.get(&resource).and_then(|&k| self.chunk_for_key(k))
    }

    /// The resource index, when chunk 0 is one.
    pub fn resource_index(&self) -> Option<&ResourceIndex> {
        self.chunks.first().and_then(|c| c.as_resource_index().ok())
    }

    /// The `(usage, number)` this chunk is indexed under, if any.
    pub fn resource_for_chunk(&self, chunk: &Chunk) -> Option<ResourceId> {
        let i = *self.by_pos.get(&chunk.file_pos())?;
        if self.chunks[i].key() != chunk.key() {
            return None;
        }
        self.resource_index()?.entry_at(chunk.file_pos()).map(|e| e.resource)
    }

    pub fn first_chunk_of_type(&self, tag: ChunkType) -> Option<&Arc<Chunk>> {
        self.chunks.iter().find(|c| c.chunk_type() == tag)
    }

    pub fn chunks_of_type(&self, tag: ChunkType) -> impl Iterator<Item = &Arc<Chunk>> {
        self.chunks.iter().filter(move |c| c.chunk_type() == tag)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::chunk::{Usage, ChunkContent};
    use test_log::test;

    /// Serialize `(tag, payload)` pairs as a Blorb file with an index built
    /// from `resources` (chunk position in `chunks` → resource id).
    pub(crate) fn build_file(chunks: &[(&[u8; 4], Vec<u8>)], resources: &[(usize, ResourceId)]) -> Vec<u8> {
        let index_len = 4 + 12 * resources.len();
        let mut positions = Vec::new();
        let mut pos = 12 + padded(8 + index_len);
        for (_, data) in chunks {
            positions.push(pos);
            pos += padded(8 + data.len());
        }
        let mut index = Vec::new();
        push_u32_be(&mut index, resources.len() as u32);
        for (i, res) in resources {
            index.extend_from_slice(&res.usage.tag());
            push_u32_be(&mut index, res.number);
            push_u32_be(&mut index, positions[*i] as u32);
        }

        let mut out = b"FORM".to_vec();
        push_u32_be(&mut out, (pos - 8) as u32);
        out.extend_from_slice(b"IFRS");
        for (tag, data) in std::iter::once((b"RIdx", index)).chain(chunks.iter().map(|(t, d)| (*t, d.clone()))) {
            out.extend_from_slice(tag);
            push_u32_be(&mut out, data.len() as u32);
            out.extend_from_slice(&data);
            if data.len() % 2 == 1 {
                out.push(0);
            }
        }
        out
    }

    #[test]
    fn empty_index_file() {
        let bytes = [
            b'F', b'O', b'R', b'M', 0, 0, 0, 12, b'I', b'F', b'R', b'S',
            b'R', b'I', b'd', b'x', 0, 0, 0, 4, 0, 0, 0, 0,
        ];
        let doc = Blorb::parse(&bytes);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.total_length(), 20);
        assert!(doc.errors().is_empty(), "{:?}", doc.errors());
        assert_eq!(doc.to_bytes(), bytes);
        assert_eq!(Blorb::new(None).to_bytes(), bytes);
    }

    #[test]
    fn envelope_failures_give_empty_documents() {
        for bad in [&b"FORM"[..], b"JUNK\0\0\0\x04IFRS", b"FORM\0\0\0\x04IFZS"] {
            let doc = Blorb::parse(bad);
            assert!(doc.is_empty());
            assert_eq!(doc.errors().len(), 1);
            assert_eq!(doc.total_length(), HEADER_SIZE);
        }
    }

    #[test]
    fn round_trip_with_odd_payloads_and_form() {
        let mut aiff = b"FORM".to_vec();
        push_u32_be(&mut aiff, 9);
        aiff.extend_from_slice(b"AIFFCOMM\x01");
        let bytes = build_file(
            &[(b"PNG ", vec![1, 2, 3]), (b"BINA", vec![9; 6])],
            &[(0, ResourceId::pict(1)), (1, ResourceId::new(Usage::Data, 2))],
        );
        // Splice the AIFF form in by hand: its payload already has a header.
        let mut with_form = bytes.clone();
        with_form.extend_from_slice(&aiff[..]);
        with_form.push(0);
        let total = with_form.len() as u32 - 8;
        with_form[4..8].copy_from_slice(&total.to_be_bytes());

        let doc = Blorb::parse(&with_form);
        let structural: Vec<_> = doc.errors().iter().filter(|d| d.chunk.is_none()).collect();
        assert!(structural.is_empty(), "{structural:?}");
        assert_eq!(doc.len(), 4);
        assert_eq!(doc.chunks()[3].type_label(), "FORM/AIFF");
        assert_eq!(doc.to_bytes(), with_form);
        assert_eq!(doc.total_length() as usize, with_form.len());
    }

    #[test]
    fn lookups() {
        let bytes = build_file(&[(b"PNG ", vec![0; 4]), (b"TEXT", b"hi".to_vec())], &[(0, ResourceId::pict(7))]);
        let doc = Blorb::parse(&bytes);
        let png = doc.chunk_for_usage(ResourceId::pict(7)).unwrap();
        assert_eq!(png.chunk_type(), ChunkType::PNG);
        assert_eq!(doc.resource_for_chunk(png), Some(ResourceId::pict(7)));
        assert_eq!(doc.chunk_at(png.file_pos()).map(|c| c.key()), Some(png.key()));
        assert_eq!(doc.chunk_for_key(png.key()).map(|c| c.index()), Some(1));
        let text = doc.first_chunk_of_type(ChunkType::TEXT).unwrap();
        assert_eq!(doc.resource_for_chunk(text), None);
        assert!(matches!(text.content(), ChunkContent::Text(t) if t.text == "hi"));
        assert_eq!(doc.chunks_of_type(ChunkType::PNG).count(), 1);
    }

    #[test]
    fn relayout_reuses_chunks() {
        let bytes = build_file(&[(b"PNG ", vec![0; 5]), (b"BINA", vec![1])], &[(0, ResourceId::pict(1))]);
        let doc = Blorb::parse(&bytes);
        let again = doc.recompute_layout();
        assert_eq!(again, doc);
        for (a, b) in doc.chunks().iter().zip(again.chunks()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn delete_moves_later_chunks_and_follows_index() {
        let bytes = build_file(
            &[(b"BINA", vec![0; 10]), (b"PNG ", vec![0; 4])],
            &[(0, ResourceId::new(Usage::Data, 1)), (1, ResourceId::pict(2))],
        );
        let doc = Blorb::parse(&bytes);
        let bina = doc.chunk_for_usage(ResourceId::new(Usage::Data, 1)).unwrap().key();
        let png_key = doc.chunk_for_usage(ResourceId::pict(2)).unwrap().key();

        let after = doc.delete_chunk(bina);
        assert_eq!(after.len(), 2);
        let idx = after.resource_index().unwrap();
        assert_eq!(idx.len(), 1);
        let png = after.chunk_for_key(png_key).unwrap();
        // Index shrank by one entry and the 18-byte BINA chunk is gone.
        assert_eq!(png.file_pos(), 12 + 8 + 16);
        assert_eq!(idx.pos_of(ResourceId::pict(2)), Some(png.file_pos()));
        assert_eq!(after.total_length() as usize, after.to_bytes().len());
        assert_eq!(after.chunk_for_usage(ResourceId::new(Usage::Data, 1)), None);
    }

    #[test]
    fn replace_keeps_position_in_sequence() {
        let bytes = build_file(&[(b"Fspc", vec![0, 0, 0, 1]), (b"BINA", vec![1])], &[]);
        let doc = Blorb::parse(&bytes);
        let old = doc.first_chunk_of_type(ChunkType::FSPC).unwrap().clone();
        let after = doc.add_or_replace_chunk(Chunk::frontispiece(4).with_key(old.key()));
        assert_eq!(after.len(), doc.len());
        let new = after.chunk_for_key(old.key()).unwrap();
        assert_eq!(new.index(), old.index());
        assert_eq!(new.as_frontispiece().unwrap().picture, 4);
    }

    #[test]
    fn truncated_chunk_keeps_earlier_chunks() {
        let mut bytes = build_file(&[(b"TEXT", b"abcd".to_vec())], &[]);
        bytes.extend_from_slice(b"BINA\0\0\0\x10\x01\x02");
        let doc = Blorb::parse(&bytes);
        assert_eq!(doc.len(), 2);
        assert!(doc.errors().iter().any(|d| d.text.contains("BINA chunk at offset")));
    }

    #[test]
    fn missing_index_still_lays_out() {
        let bytes = build_file(&[(b"TEXT", b"abc".to_vec())], &[]);
        let doc = Blorb::parse(&bytes);
        let idx = doc.chunks()[0].key();
        let headless = doc.delete_chunk(idx);
        assert_eq!(headless.len(), 1);
        assert_eq!(headless.chunks()[0].file_pos(), 12);
        assert_eq!(headless.total_length(), 12 + 12);
        assert!(headless.resource_index().is_none());
    }

    #[test]
    fn form_header_rewritten_on_write() {
        let (form, errors) = parse_chunk(ChunkType::FORM, b"FORM\0\0\0\x99AIFFabcd".to_vec(), None);
        assert_eq!(errors.len(), 1);
        let doc = Blorb::new(None).add_or_replace_chunk(form);
        let bytes = doc.to_bytes();
        assert_eq!(bytes.len() as u32, doc.total_length());
        assert_eq!(&bytes[24..], b"FORM\0\0\0\x08AIFFabcd");

        let reparsed = Blorb::parse(&bytes);
        assert!(reparsed.errors().is_empty(), "{:?}", reparsed.errors());
        assert_eq!(reparsed.len(), 2);
    }

    #[test]
    fn duplicate_index_ids_resolve_to_first_entry() {
        let bytes = build_file(
            &[(b"BINA", vec![1]), (b"BINA", vec![2])],
            &[(0, ResourceId::pict(1)), (1, ResourceId::pict(1))],
        );
        let doc = Blorb::parse(&bytes);
        let first = &doc.chunks()[1];
        let idx = doc.resource_index().unwrap();
        assert_eq!(idx.pos_of(ResourceId::pict(1)), Some(first.file_pos()));
        assert_eq!(doc.chunk_for_usage(ResourceId::pict(1)).map(|c| c.key()), Some(first.key()));
    }
}
