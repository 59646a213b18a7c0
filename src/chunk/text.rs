//! Text-bearing chunks: plain text (`TEXT`, `AUTH`, `ANNO`, `(c) `, `SNam`)
//! and the iFiction metadata record (`IFmd`).

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

use super::ChunkType;
use crate::codec::{utf16_decode, utf8_decode, utf8_decode_lossy};

/// Root element every well-formed `IFmd` payload must have.
pub const METADATA_ROOT: &str = "ifindex";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Text {
    pub text: String,
}

impl Text {
    pub(crate) fn parse(tag: ChunkType, data: &[u8], errors: &mut Vec<String>) -> Self {
        // SNam predates the UTF-8 rule and holds UTF-16 code units.
        if tag == ChunkType::SNAM {
            return Self { text: utf16_decode(data) };
        }
        let text = utf8_decode(data).unwrap_or_else(|| {
            errors.push(format!("{tag}: text is not valid UTF-8"));
            utf8_decode_lossy(data)
        });
        Self { text }
    }
}

/// `IFmd` payload.  Kept as text; the XML is only parsed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Metadata {
    pub xml: String,
}

impl Metadata {
    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        let xml = utf8_decode(data).unwrap_or_else(|| {
            errors.push("IFmd: metadata is not valid UTF-8".to_string());
            utf8_decode_lossy(data)
        });
        Self { xml }
    }

    /// Parse the whole document and return the local name of its root element.
    pub fn root_element(&self) -> Result<String, String> {
        let mut reader = Reader::from_str(&self.xml);
        reader.config_mut().trim_text(true);

        let mut root = None;
        let mut depth = 0usize;
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    root.get_or_insert_with(|| String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                    depth += 1;
                }
                Ok(Event::Empty(e)) => {
                    root.get_or_insert_with(|| String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                }
                Ok(Event::End(_)) => depth = depth.saturating_sub(1),
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(e.to_string()),
            }
        }
        if depth != 0 {
            return Err(format!("{depth} element(s) left open at end of document"));
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }
}
