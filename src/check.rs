//! Cross-reference and payload checks over a whole document.
//!
//! Checks only ever append to [`Blorb::errors`]; clearing stale results is the
//! edit engine's job.

use std::collections::{HashMap, HashSet};

use log::{debug, info};

use crate::blorb::{Blorb, Diagnostic};
use crate::chunk::game::{GLULX_MAGIC, MAX_ZCODE_VERSION};
use crate::chunk::text::METADATA_ROOT;
use crate::chunk::{Chunk, ChunkContent, ChunkKey, ResourceId, ResourceIndex, Usage, SINGLETON_TYPES};

/// Run every rule and return `doc` with the findings appended.
pub fn check_consistency(doc: &Blorb) -> Blorb {
    let found = find_problems(doc);
    if found.is_empty() {
        debug!("consistency check: no problems in {} chunk(s)", doc.len());
        return doc.clone();
    }
    info!("consistency check: {} problem(s)", found.len());
    let mut errors = doc.errors().to_vec();
    errors.extend(found);
    doc.with_errors(errors)
}

/// Compare the computed layout with one recorded elsewhere, typically the
/// offsets the chunks had in the file they were read from.
pub fn check_against_expected_layout(
    doc: &Blorb,
    expected_total: u32,
    expected_pos: &HashMap<ChunkKey, u32>,
) -> Blorb {
    let mut errors = doc.errors().to_vec();
    let before = errors.len();
    if doc.total_length() != expected_total {
        errors.push(Diagnostic::new(format!(
            "layout: total length is {} bytes, expected {expected_total}",
            doc.total_length()
        )));
    }
    for c in doc.chunks() {
        match expected_pos.get(&c.key()) {
            Some(&pos) if pos != c.file_pos() => errors.push(Diagnostic::for_chunk(
                c.key(),
                format!("layout: {} chunk {} is at offset {}, expected {pos}", c.type_label(), c.index(), c.file_pos()),
            )),
            _ => {}
        }
    }
    if errors.len() > before {
        info!("layout check: {} mismatch(es)", errors.len() - before);
    }
    doc.with_errors(errors)
}

fn find_problems(doc: &Blorb) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let index = doc.resource_index();

    match doc.chunks().first() {
        None => out.push(Diagnostic::new("document is empty: no resource index")),
        Some(c) if index.is_none() => out.push(Diagnostic::for_chunk(
            c.key(),
            format!("first chunk is {}, not a resource index (RIdx)", c.type_label()),
        )),
        Some(_) => {}
    }

    for tag in SINGLETON_TYPES {
        for extra in doc.chunks_of_type(tag).skip(1) {
            out.push(Diagnostic::for_chunk(
                extra.key(),
                format!("{tag}: more than one chunk of this type (chunk {})", extra.index()),
            ));
        }
    }

    if let (Some(index), Some(first)) = (index, doc.chunks().first()) {
        check_index(doc, first, index, &mut out);
    }

    let has = |resource: ResourceId| index.is_some_and(|idx| idx.pos_of(resource).is_some());
    for chunk in doc.chunks() {
        check_chunk(chunk, &has, &mut out);
    }
    out
}

fn check_index(doc: &Blorb, chunk: &Chunk, index: &ResourceIndex, out: &mut Vec<Diagnostic>) {
    let mut seen = HashSet::new();
    for e in index.entries() {
        if !seen.insert(e.resource) {
            out.push(Diagnostic::for_chunk(chunk.key(), format!("RIdx: duplicate entry for {}", e.resource)));
        }
        if doc.chunk_at(e.file_pos).is_none() {
            out.push(Diagnostic::for_chunk(
                chunk.key(),
                format!("RIdx: entry {} points at offset {}, where no chunk starts", e.resource, e.file_pos),
            ));
        }
    }
}

fn check_chunk(chunk: &Chunk, has: &impl Fn(ResourceId) -> bool, out: &mut Vec<Diagnostic>) {
    let mut report = |text: String| out.push(Diagnostic::for_chunk(chunk.key(), text));
    let tag = chunk.chunk_type();

    match chunk.content() {
        ChunkContent::ResourceDescriptions(rdes) => {
            let mut seen = HashSet::new();
            for d in rdes.entries() {
                if !seen.insert(d.resource) {
                    report(format!("RDes: duplicate description for {}", d.resource));
                }
                if !has(d.resource) {
                    report(format!("RDes: description for {}, which is not in the resource index", d.resource));
                }
            }
        }
        ChunkContent::Image(img) if img.size.is_none() => {
            report(format!("{}: image data not recognized", tag.trimmed()));
        }
        ChunkContent::ZCode(z) if z.version > MAX_ZCODE_VERSION => {
            report(format!("ZCOD: unknown Z-machine version {}", z.version));
        }
        ChunkContent::Glulx(_) if !chunk.data().starts_with(GLULX_MAGIC) => {
            report("GLUL: game file does not start with \"Glul\"".to_string());
        }
        ChunkContent::Metadata(md) => match md.root_element() {
            Err(e) => report(format!("IFmd: metadata is not well-formed XML ({e})")),
            Ok(root) if root != METADATA_ROOT => {
                report(format!("IFmd: metadata root element is <{root}>, expected <{METADATA_ROOT}>"));
            }
            Ok(_) => {}
        },
        ChunkContent::Frontispiece(f) if !has(ResourceId::pict(f.picture)) => {
            report(format!("Fspc: frontispiece is picture {}, which is not a Pict resource", f.picture));
        }
        ChunkContent::Resolution(reso) => {
            let mut seen = HashSet::new();
            for e in &reso.entries {
                if !seen.insert(e.number) {
                    report(format!("Reso: duplicate entry for picture {}", e.number));
                }
                if !has(ResourceId::new(Usage::Pict, e.number)) {
                    report(format!("Reso: entry for picture {}, which is not a Pict resource", e.number));
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blorb::tests::build_file;
    use crate::chunk::game::tests::{glulx_bytes, zcode_bytes};
    use crate::chunk::resource::encode_descriptions;
    use crate::chunk::Description;
    use crate::image::tests::png_bytes;
    use test_log::test;

    fn texts(doc: &Blorb) -> Vec<&str> {
        doc.errors().iter().map(|d| d.text.as_str()).collect()
    }

    #[test]
    fn clean_document() {
        let bytes = build_file(
            &[
                (b"PNG ", png_bytes(2, 2)),
                (b"Fspc", vec![0, 0, 0, 1]),
                (b"ZCOD", zcode_bytes(5, 1, b"250101")),
                (b"GLUL", glulx_bytes(true)),
                (b"IFmd", b"<ifindex><story/></ifindex>".to_vec()),
            ],
            &[(0, ResourceId::pict(1)), (2, ResourceId::new(Usage::Exec, 0))],
        );
        let doc = check_consistency(&Blorb::parse(&bytes));
        assert!(doc.errors().is_empty(), "{:?}", texts(&doc));
    }

    #[test]
    fn dangling_description_reported_once() {
        let rdes = encode_descriptions(&[Description { resource: ResourceId::pict(3), text: "lamp".into() }]);
        let doc = check_consistency(&Blorb::parse(&build_file(&[(b"RDes", rdes)], &[])));
        assert_eq!(doc.errors().len(), 1, "{:?}", texts(&doc));
        assert!(doc.errors()[0].text.contains("Pict:3"));
        assert!(doc.errors()[0].chunk.is_some());
    }

    #[test]
    fn duplicate_and_dangling_are_independent() {
        let d = Description { resource: ResourceId::pict(3), text: "x".into() };
        let rdes = encode_descriptions(&[d.clone(), d]);
        let doc = check_consistency(&Blorb::parse(&build_file(&[(b"RDes", rdes)], &[])));
        assert_eq!(doc.errors().len(), 3, "{:?}", texts(&doc));
    }

    #[test]
    fn frontispiece_without_picture() {
        let doc = check_consistency(&Blorb::parse(&build_file(&[(b"Fspc", vec![0, 0, 0, 5])], &[])));
        assert_eq!(texts(&doc), vec!["Fspc: frontispiece is picture 5, which is not a Pict resource"]);
    }

    #[test]
    fn payload_rules() {
        let mut bad_glulx = glulx_bytes(false);
        bad_glulx[..4].copy_from_slice(b"Junk");
        let bytes = build_file(
            &[
                (b"PNG ", vec![0; 20]),
                (b"ZCOD", zcode_bytes(9, 1, b"000000")),
                (b"GLUL", bad_glulx),
                (b"IFmd", b"<story/>".to_vec()),
            ],
            &[],
        );
        let doc = check_consistency(&Blorb::parse(&bytes));
        assert_eq!(doc.errors().len(), 4, "{:?}", texts(&doc));
    }

    #[test]
    fn resolution_rules() {
        let reso = crate::chunk::resolution::tests::sample(&[1, 1, 2]).to_bytes();
        let doc = check_consistency(&Blorb::parse(&build_file(
            &[(b"PNG ", png_bytes(1, 1)), (b"Reso", reso)],
            &[(0, ResourceId::pict(1))],
        )));
        // One duplicate for 1, one missing for 2.
        assert_eq!(doc.errors().len(), 2, "{:?}", texts(&doc));
    }

    #[test]
    fn structural_rules() {
        let bytes = build_file(&[(b"Fspc", vec![0, 0, 0, 1]), (b"Fspc", vec![0, 0, 0, 1])], &[]);
        let doc = Blorb::parse(&bytes);
        let singles = check_consistency(&doc);
        // Two frontispiece errors (no Pict:1) plus one singleton error.
        assert_eq!(singles.errors().len(), 3, "{:?}", texts(&singles));

        let headless = check_consistency(&doc.delete_chunk(doc.chunks()[0].key()));
        assert!(headless.errors().iter().any(|d| d.text.contains("not a resource index")));
        assert_eq!(check_consistency(&Blorb::parse(b"FORM")).errors().len(), 2);
    }

    #[test]
    fn index_entry_off_target() {
        let mut bytes = build_file(&[(b"BINA", vec![0; 4])], &[(0, ResourceId::new(Usage::Data, 1))]);
        // Entry position is the last four bytes of the 12-byte entry.
        bytes[32..36].copy_from_slice(&7u32.to_be_bytes());
        let doc = check_consistency(&Blorb::parse(&bytes));
        assert_eq!(texts(&doc), vec!["RIdx: entry Data:1 points at offset 7, where no chunk starts"]);
    }

    #[test]
    fn layout_comparison() {
        let doc = Blorb::new(None);
        let mut expected = HashMap::new();
        expected.insert(doc.chunks()[0].key(), 12);
        assert!(check_against_expected_layout(&doc, 20, &expected).errors().is_empty());
        expected.insert(doc.chunks()[0].key(), 14);
        assert_eq!(check_against_expected_layout(&doc, 22, &expected).errors().len(), 2);
    }
}
