//! Game identification: executable headers (`ZCOD`, `GLUL`) and `RelN`.
//!
//! The executable parsers only read fixed header offsets.  They never fail;
//! a payload too short for a field leaves that field zeroed, and the
//! consistency checker judges whether the header makes sense.

use serde::Serialize;

use crate::codec::{ascii_string_at, read_u16_be, read_u32_be};

/// Highest Z-machine version in existence.
pub const MAX_ZCODE_VERSION: u8 = 8;

pub const GLULX_MAGIC: &[u8; 4] = b"Glul";

/// Offset of the Inform `Info` block in a Glulx header.
const GLULX_INFO_OFFSET: usize = 36;
/// Layout version the `Info` block must carry for the fields below to mean anything.
const GLULX_INFO_VERSION: [u8; 4] = [0x00, 0x01, 0x00, 0x00];

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ZCodeHeader {
    pub version: u8,
    pub release: u16,
    /// Six characters, conventionally the compile date as `YYMMDD`.
    pub serial:  String,
}

impl ZCodeHeader {
    pub(crate) fn parse(data: &[u8]) -> Self {
        Self {
            version: data.first().copied().unwrap_or_default(),
            release: read_u16_be(data, 2).unwrap_or_default(),
            serial:  ascii_string_at(data, 0x12, 6),
        }
    }
}

/// Compiler details from the Inform `Info` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InformInfo {
    /// Four characters, e.g. `6.42`.
    pub compiler_version: String,
    pub release:          u16,
    pub serial:           String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct GlulxHeader {
    /// `major.minor`, with `.patch` appended when the patch level is non-zero.
    pub vm_version: String,
    pub info:       Option<InformInfo>,
}

impl GlulxHeader {
    pub(crate) fn parse(data: &[u8]) -> Self {
        let vm_version = read_u32_be(data, 4)
            .map(|v| {
                let (major, minor, patch) = (v >> 16, (v >> 8) & 0xFF, v & 0xFF);
                if patch == 0 {
                    format!("{major}.{minor}")
                } else {
                    format!("{major}.{minor}.{patch}")
                }
            })
            .unwrap_or_default();

        let tagged = data.get(GLULX_INFO_OFFSET..GLULX_INFO_OFFSET + 4) == Some(&b"Info"[..])
            && data.get(GLULX_INFO_OFFSET + 4..GLULX_INFO_OFFSET + 8) == Some(&GLULX_INFO_VERSION[..]);
        let info = if tagged && data.len() >= 60 {
            Some(InformInfo {
                compiler_version: ascii_string_at(data, 44, 4),
                release:          read_u16_be(data, 52).unwrap_or_default(),
                serial:           ascii_string_at(data, 54, 6),
            })
        } else {
            None
        };

        Self { vm_version, info }
    }

    /// Release number, when the Info block provides one.
    pub fn release(&self) -> Option<u16> {
        self.info.as_ref().map(|i| i.release)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ReleaseNumber {
    pub release: u16,
}

impl ReleaseNumber {
    pub(crate) fn parse(data: &[u8], errors: &mut Vec<String>) -> Self {
        if data.len() != 2 {
            errors.push(format!("RelN: bad chunk size ({} rather than 2)", data.len()));
        }
        Self { release: read_u16_be(data, 0).unwrap_or_default() }
    }
}
