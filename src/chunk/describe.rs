//! Human-facing names for chunks: display labels, export filenames and MIME
//! types, and the reverse direction, guessing a tag for a file being added.

use serde::Serialize;

use super::{Chunk, ChunkContent, ChunkType};
use crate::blorb::Blorb;
use crate::image::PNG_SIGNATURE;

/// Tag (or `FORM/<subtype>`) → label.
static DESCRIPTIONS: &[(&str, &str)] = &[
    ("RIdx", "Resource index"),
    ("IFmd", "Metadata"),
    ("Fspc", "Frontispiece"),
    ("RDes", "Resource descriptions"),
    ("IFhd", "Game identifier"),
    ("RelN", "Release number"),
    ("Reso", "Resolution"),
    ("Plte", "Color palette"),
    ("APal", "Adaptive palette"),
    ("Loop", "Sound looping"),
    ("SNam", "Story name (deprecated)"),
    ("AUTH", "Author"),
    ("(c) ", "Copyright message"),
    ("ANNO", "Annotation"),
    ("TEXT", "Text data"),
    ("BINA", "Binary data"),
    ("ZCOD", "Z-code game"),
    ("GLUL", "Glulx game"),
    ("TAD2", "TADS 2 game"),
    ("TAD3", "TADS 3 game"),
    ("HUGO", "Hugo game"),
    ("ALAN", "Alan game"),
    ("ADRI", "ADRIFT game"),
    ("LEVE", "Level 9 game"),
    ("AGT ", "AGT game"),
    ("MAGS", "Magnetic Scrolls game"),
    ("ADVS", "AdvSys game"),
    ("EXEC", "Native executable"),
    ("PNG ", "PNG image"),
    ("JPEG", "JPEG image"),
    ("Rect", "Placeholder image"),
    ("OGGV", "Ogg Vorbis sound"),
    ("MOD ", "MOD music"),
    ("SONG", "SONG music"),
    ("FORM/AIFF", "AIFF sound"),
];

pub const UNRECOGNIZED: &str = "Unrecognized chunk";
pub const UNRECOGNIZED_FORM: &str = "Unrecognized FORM chunk";

pub fn readable_description(chunk: &Chunk) -> &'static str {
    let label = chunk.type_label();
    match DESCRIPTIONS.iter().find(|(tag, _)| *tag == label) {
        Some(&(_, desc)) => desc,
        None if chunk.is_form() => UNRECOGNIZED_FORM,
        None => UNRECOGNIZED,
    }
}

/// Suggested name and MIME type for a chunk written out as its own file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportName {
    pub filename:  String,
    pub mime_type: &'static str,
}

/// `Pict-3.png` for resources, otherwise the trimmed tag (`IFmd.xml`).
pub fn suggested_filename_and_mime_type(chunk: &Chunk, doc: &Blorb) -> ExportName {
    let stem = match doc.resource_for_chunk(chunk) {
        Some(res) => format!("{}-{}", res.usage.short_name(), res.number),
        None => chunk.chunk_type().trimmed(),
    };

    let (suffix, mime_type) = match chunk.type_label().as_str() {
        "PNG " => (".png".to_owned(), "image/png"),
        "JPEG" => (".jpg".to_owned(), "image/jpeg"),
        "IFmd" => (".xml".to_owned(), "text/xml"),
        "GLUL" => (".ulx".to_owned(), "application/x-glulx"),
        "ZCOD" => {
            let version = match chunk.content() {
                ChunkContent::ZCode(h) => h.version,
                _ => 0,
            };
            (format!(".z{version}"), "application/x-zmachine")
        }
        "TEXT" | "AUTH" | "ANNO" | "(c) " | "SNam" => (".txt".to_owned(), "text/plain"),
        "FORM/AIFF" => (".aiff".to_owned(), "audio/aiff"),
        _ => (".dat".to_owned(), "application/octet-stream"),
    };

    ExportName { filename: format!("{stem}{suffix}"), mime_type }
}

/// Suffix → tag.  Consulted before any content sniffing.
static SUFFIXES: &[(&str, ChunkType)] = &[
    ("png", ChunkType::PNG),
    ("jpg", ChunkType::JPEG),
    ("jpeg", ChunkType::JPEG),
    ("aif", ChunkType::FORM),
    ("aiff", ChunkType::FORM),
    ("ogg", ChunkType::new(*b"OGGV")),
    ("mod", ChunkType::new(*b"MOD ")),
    ("xml", ChunkType::IFMD),
    ("ifiction", ChunkType::IFMD),
    ("txt", ChunkType::TEXT),
    ("ulx", ChunkType::GLUL),
    ("z1", ChunkType::ZCOD),
    ("z2", ChunkType::ZCOD),
    ("z3", ChunkType::ZCOD),
    ("z4", ChunkType::ZCOD),
    ("z5", ChunkType::ZCOD),
    ("z6", ChunkType::ZCOD),
    ("z7", ChunkType::ZCOD),
    ("z8", ChunkType::ZCOD),
];

/// Pick a chunk tag for a file about to be added.
///
/// The filename suffix wins whenever it is recognised; the content is only
/// sniffed when the suffix says nothing.
pub fn guess_chunk_type(filename: &str, bytes: &[u8]) -> Option<ChunkType> {
    let by_suffix = filename.rsplit_once('.').and_then(|(_, ext)| {
        let ext = ext.to_ascii_lowercase();
        SUFFIXES.iter().find(|(s, _)| *s == ext).map(|(_, t)| *t)
    });
    by_suffix.or_else(|| sniff(bytes))
}

fn sniff(bytes: &[u8]) -> Option<ChunkType> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        Some(ChunkType::PNG)
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(ChunkType::JPEG)
    } else if bytes.starts_with(b"FORM") {
        Some(ChunkType::FORM)
    } else if bytes.starts_with(b"Glul") {
        Some(ChunkType::GLUL)
    } else if bytes.starts_with(b"<?xml") {
        Some(ChunkType::IFMD)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::parse_chunk;
    use crate::chunk::game::tests::zcode_bytes;

    #[test]
    fn labels() {
        let (png, _) = parse_chunk(ChunkType::PNG, vec![], None);
        assert_eq!(readable_description(&png), "PNG image");

        let (odd, _) = parse_chunk(ChunkType::new(*b"Wxyz"), vec![], None);
        assert_eq!(readable_description(&odd), UNRECOGNIZED);

        let form = |sub: &[u8; 4]| {
            let mut data = b"FORM\0\0\0\x04".to_vec();
            data.extend_from_slice(sub);
            parse_chunk(ChunkType::FORM, data, None).0
        };
        assert_eq!(readable_description(&form(b"AIFF")), "AIFF sound");
        assert_eq!(readable_description(&form(b"8SVX")), UNRECOGNIZED_FORM);
    }

    #[test]
    fn export_names_without_index_entry() {
        let doc = Blorb::new(None);
        let (z, _) = parse_chunk(ChunkType::ZCOD, zcode_bytes(5, 1, b"000000"), None);
        assert_eq!(
            suggested_filename_and_mime_type(&z, &doc),
            ExportName { filename: "ZCOD.z5".into(), mime_type: "application/x-zmachine" }
        );
        let (md, _) = parse_chunk(ChunkType::IFMD, b"<ifindex/>".to_vec(), None);
        assert_eq!(suggested_filename_and_mime_type(&md, &doc).filename, "IFmd.xml");
        let (bin, _) = parse_chunk(ChunkType::BINA, vec![1], None);
        assert_eq!(suggested_filename_and_mime_type(&bin, &doc).mime_type, "application/octet-stream");
    }

    #[test]
    fn suffix_beats_sniffing() {
        assert_eq!(guess_chunk_type("cover.PNG", b""), Some(ChunkType::PNG));
        // A JPEG named .png is still a PNG chunk.
        assert_eq!(guess_chunk_type("cover.png", &[0xFF, 0xD8, 0xFF, 0xE0]), Some(ChunkType::PNG));
        assert_eq!(guess_chunk_type("cover.bin", &[0xFF, 0xD8, 0xFF, 0xE0]), Some(ChunkType::JPEG));
        assert_eq!(guess_chunk_type("story.z5", b""), Some(ChunkType::ZCOD));
        assert_eq!(guess_chunk_type("game", b"Glul\0\x03"), Some(ChunkType::GLUL));
        assert_eq!(guess_chunk_type("noise", b"\0\0"), None);
    }
}
