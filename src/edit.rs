//! Semantic edits.
//!
//! [`apply_edit`] is a reducer: it takes a document and one [`Edit`] and
//! returns the next document.  A command that does not apply (unknown key,
//! missing precondition, or nothing to change) returns the input unchanged,
//! error list included.  A command that does apply discards the old error
//! list, makes its change through the document's structural mutators (which
//! relayout) and finishes with a fresh consistency check.

use log::{debug, warn};

use crate::blorb::{Blorb, Diagnostic, FORM_TAG};
use crate::check::check_consistency;
use crate::chunk::{
    is_singleton_type, parse_chunk, Chunk, ChunkKey, ChunkType, Description, IndexEntry, ResolutionEntry, ResourceId,
    Usage,
};
use crate::codec::{push_u32_be, read_u32_be, write_u32_be};

#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// Replace the whole document, e.g. after reading a new file.
    LoadNew(Blorb),
    DeleteChunk(ChunkKey),
    /// Index the chunk under `resource`, or remove it from the index.
    SetChunkUsage { key: ChunkKey, resource: Option<ResourceId> },
    /// Make this `Pict` resource the frontispiece.
    SetFrontispiece(ChunkKey),
    /// Empty `text` removes the description.
    SetResourceDescription { resource: ResourceId, text: String },
    DeleteResolutionEntry(u32),
    AddChunk { chunk_type: ChunkType, data: Vec<u8> },
}

pub fn apply_edit(doc: &Blorb, edit: Edit) -> Blorb {
    debug!("applying {}", edit_name(&edit));
    let base = doc.with_errors(Vec::new());
    let edited = match edit {
        Edit::LoadNew(new) => return new,
        Edit::DeleteChunk(key) => delete_chunk(&base, key),
        Edit::SetChunkUsage { key, resource } => set_chunk_usage(&base, key, resource),
        Edit::SetFrontispiece(key) => set_frontispiece(&base, key),
        Edit::SetResourceDescription { resource, text } => set_resource_description(&base, resource, text),
        Edit::DeleteResolutionEntry(number) => delete_resolution_entry(&base, number),
        Edit::AddChunk { chunk_type, data } => Some(add_chunk(&base, chunk_type, data)),
    };
    match edited {
        Some(next) => check_consistency(&next),
        None => doc.clone(),
    }
}

fn edit_name(edit: &Edit) -> &'static str {
    match edit {
        Edit::LoadNew(_) => "loadNew",
        Edit::DeleteChunk(_) => "deleteChunk",
        Edit::SetChunkUsage { .. } => "setChunkUsage",
        Edit::SetFrontispiece(_) => "setFrontispiece",
        Edit::SetResourceDescription { .. } => "setResourceDescription",
        Edit::DeleteResolutionEntry(_) => "deleteResolutionEntry",
        Edit::AddChunk { .. } => "addChunk",
    }
}

fn delete_chunk(doc: &Blorb, key: ChunkKey) -> Option<Blorb> {
    let chunk = doc.chunk_for_key(key)?;
    let resource = doc.resource_for_chunk(chunk);
    // Layout drops the index entry along with the chunk.
    let doc = doc.delete_chunk(key);
    Some(match resource {
        Some(old) => update_resource_references(&doc, old, None),
        None => doc,
    })
}

fn set_chunk_usage(doc: &Blorb, key: ChunkKey, resource: Option<ResourceId>) -> Option<Blorb> {
    let chunk = doc.chunk_for_key(key)?;
    let index_chunk = doc.chunks().first()?;
    let index = doc.resource_index()?;
    if chunk.key() == index_chunk.key() {
        return None;
    }

    let pos = chunk.file_pos();
    let current = index.entry_at(pos).map(|e| e.resource);
    if current == resource {
        return None;
    }
    if let Some(new) = resource {
        if index.pos_of(new).is_some_and(|p| p != pos) {
            warn!("{new} already belongs to another chunk; not reassigning it to {key}");
            return None;
        }
        // Re-keying this chunk's description must not land on another one.
        let descs = doc.first_chunk_of_type(ChunkType::RDES).and_then(|c| c.as_resource_descriptions().ok());
        if let (Some(old), Some(descs)) = (current, descs) {
            if descs.text_for(old).is_some() && descs.text_for(new).is_some() {
                warn!("{new} already has a description; not reassigning {old} to it");
                return None;
            }
        }
    }

    let mut entries = index.entries().to_vec();
    match (entries.iter().position(|e| e.file_pos == pos), resource) {
        (Some(i), Some(new)) => entries[i].resource = new,
        (Some(i), None) => {
            entries.remove(i);
        }
        (None, Some(new)) => entries.push(IndexEntry { resource: new, file_pos: pos }),
        (None, None) => return None,
    }
    let doc = doc.add_or_replace_chunk(Chunk::resource_index(&entries).with_key(index_chunk.key()));

    Some(match current {
        Some(old) => update_resource_references(&doc, old, resource),
        None => doc,
    })
}

fn set_frontispiece(doc: &Blorb, key: ChunkKey) -> Option<Blorb> {
    let chunk = doc.chunk_for_key(key)?;
    let resource = doc.resource_for_chunk(chunk)?;
    if resource.usage != Usage::Pict {
        warn!("{resource} is not a picture; frontispiece unchanged");
        return None;
    }

    let existing = doc.first_chunk_of_type(ChunkType::FSPC);
    if existing.and_then(|c| c.as_frontispiece().ok()).is_some_and(|f| f.picture == resource.number) {
        return None;
    }
    let fspc = Chunk::frontispiece(resource.number);
    let fspc = match existing {
        Some(old) => fspc.with_key(old.key()),
        None => fspc,
    };
    Some(doc.add_or_replace_chunk(fspc))
}

fn set_resource_description(doc: &Blorb, resource: ResourceId, text: String) -> Option<Blorb> {
    let existing = doc.first_chunk_of_type(ChunkType::RDES);
    let before: Vec<Description> = existing
        .and_then(|c| c.as_resource_descriptions().ok())
        .map(|d| d.entries().to_vec())
        .unwrap_or_default();

    let mut entries = before.clone();
    if text.is_empty() {
        entries.retain(|d| d.resource != resource);
    } else {
        match entries.iter_mut().find(|d| d.resource == resource) {
            Some(d) => d.text = text,
            None => entries.push(Description { resource, text }),
        }
    }
    if entries == before {
        return None;
    }

    Some(match existing {
        Some(old) if entries.is_empty() => doc.delete_chunk(old.key()),
        Some(old) => doc.add_or_replace_chunk(Chunk::resource_descriptions(&entries).with_key(old.key())),
        None => doc.add_or_replace_chunk(Chunk::resource_descriptions(&entries)),
    })
}

fn delete_resolution_entry(doc: &Blorb, number: u32) -> Option<Blorb> {
    let chunk = doc.first_chunk_of_type(ChunkType::RESO)?;
    let reso = chunk.as_resolution().ok()?;
    let entries: Vec<_> = reso.entries.iter().filter(|e| e.number != number).copied().collect();
    if entries.len() == reso.entries.len() {
        return None;
    }
    Some(if entries.is_empty() {
        doc.delete_chunk(chunk.key())
    } else {
        doc.add_or_replace_chunk(Chunk::resolution(reso.window, entries).with_key(chunk.key()))
    })
}

fn add_chunk(doc: &Blorb, chunk_type: ChunkType, data: Vec<u8>) -> Blorb {
    let data = if chunk_type == ChunkType::FORM { with_form_header(data) } else { data };
    let (mut chunk, problems) = parse_chunk(chunk_type, data, None);
    if is_singleton_type(chunk_type) {
        if let Some(old) = doc.first_chunk_of_type(chunk_type) {
            debug!("{chunk_type} is a singleton; replacing {}", old.key());
            chunk = chunk.with_key(old.key());
        }
    }
    let key = chunk.key();
    let doc = doc.add_or_replace_chunk(chunk);
    if problems.is_empty() {
        return doc;
    }
    let mut errors = doc.errors().to_vec();
    errors.extend(problems.into_iter().map(|p| Diagnostic::for_chunk(key, p)));
    doc.with_errors(errors)
}

/// A `FORM` payload carries its own 8-byte header.  Accept either a whole
/// form or just its body (subtype onwards), and make the declared length
/// match what follows.
fn with_form_header(mut data: Vec<u8>) -> Vec<u8> {
    if data.len() >= 8 && data.starts_with(FORM_TAG) {
        let body_len = (data.len() - 8) as u32;
        if read_u32_be(&data, 4) != Some(body_len) {
            warn!("FORM header declares the wrong length; correcting it to {body_len}");
            write_u32_be(&mut data, 4, body_len);
        }
        return data;
    }
    let mut framed = Vec::with_capacity(8 + data.len());
    framed.extend_from_slice(FORM_TAG);
    push_u32_be(&mut framed, data.len() as u32);
    framed.extend(data);
    framed
}

/// Point everything that names `old` at `new` instead, or drop the
/// reference when `new` is `None`.
///
/// Descriptions follow any resource.  The frontispiece and resolution
/// entries only ever name pictures, so they follow `new` only while it is
/// still a `Pict`; otherwise they go.
fn update_resource_references(doc: &Blorb, old: ResourceId, new: Option<ResourceId>) -> Blorb {
    let mut doc = doc.clone();

    if let Some(rdes) = doc.first_chunk_of_type(ChunkType::RDES).cloned() {
        if let Ok(descs) = rdes.as_resource_descriptions() {
            if descs.entries().iter().any(|d| d.resource == old) {
                let entries: Vec<Description> = descs
                    .entries()
                    .iter()
                    .filter_map(|d| match (d.resource == old, new) {
                        (false, _) => Some(d.clone()),
                        (true, Some(new)) => Some(Description { resource: new, text: d.text.clone() }),
                        (true, None) => None,
                    })
                    .collect();
                doc = if entries.is_empty() {
                    doc.delete_chunk(rdes.key())
                } else {
                    doc.add_or_replace_chunk(Chunk::resource_descriptions(&entries).with_key(rdes.key()))
                };
            }
        }
    }

    if old.usage != Usage::Pict {
        return doc;
    }
    let new_picture = new.filter(|r| r.usage == Usage::Pict).map(|r| r.number);

    if let Some(fspc) = doc.first_chunk_of_type(ChunkType::FSPC).cloned() {
        if fspc.as_frontispiece().is_ok_and(|f| f.picture == old.number) {
            doc = match new_picture {
                Some(n) => doc.add_or_replace_chunk(Chunk::frontispiece(n).with_key(fspc.key())),
                None => doc.delete_chunk(fspc.key()),
            };
        }
    }

    if let Some(chunk) = doc.first_chunk_of_type(ChunkType::RESO).cloned() {
        if let Ok(reso) = chunk.as_resolution() {
            if reso.entries.iter().any(|e| e.number == old.number) {
                let entries: Vec<_> = reso
                    .entries
                    .iter()
                    .filter_map(|e| match (e.number == old.number, new_picture) {
                        (false, _) => Some(*e),
                        (true, Some(n)) => Some(ResolutionEntry { number: n, ..*e }),
                        (true, None) => None,
                    })
                    .collect();
                doc = if entries.is_empty() {
                    doc.delete_chunk(chunk.key())
                } else {
                    doc.add_or_replace_chunk(Chunk::resolution(reso.window, entries).with_key(chunk.key()))
                };
            }
        }
    }
    doc
}
