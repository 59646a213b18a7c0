#![allow(dead_code)]

use blorbkit::chunk::{Description, ResolutionEntry, Ratio, Window};
use blorbkit::image::{Size, PNG_SIGNATURE};
use blorbkit::{Chunk, ResourceId, Usage};

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Serialize `(tag, payload)` pairs, after a resource index built from
/// `resources` (position in `chunks` → id).  `FORM` payloads start at the
/// subtype, as on disk.
pub fn build_file(chunks: &[(&[u8; 4], Vec<u8>)], resources: &[(usize, ResourceId)]) -> Vec<u8> {
    let padded = |n: usize| n + (n & 1);
    let mut pos = 12 + padded(8 + 4 + 12 * resources.len());
    let mut positions = Vec::new();
    for (_, data) in chunks {
        positions.push(pos);
        pos += padded(8 + data.len());
    }

    let mut index = Vec::new();
    push_u32(&mut index, resources.len() as u32);
    for (i, res) in resources {
        index.extend_from_slice(&res.usage.tag());
        push_u32(&mut index, res.number);
        push_u32(&mut index, positions[*i] as u32);
    }

    let mut out = b"FORM".to_vec();
    push_u32(&mut out, (pos - 8) as u32);
    out.extend_from_slice(b"IFRS");
    let all = std::iter::once((b"RIdx", &index)).chain(chunks.iter().map(|(t, d)| (*t, d)));
    for (tag, data) in all {
        out.extend_from_slice(tag);
        push_u32(&mut out, data.len() as u32);
        out.extend_from_slice(data);
        if data.len() % 2 == 1 {
            out.push(0);
        }
    }
    assert_eq!(out.len(), pos);
    out
}

/// A minimal valid PNG: signature, IHDR, IEND, with real CRCs.
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = PNG_SIGNATURE.to_vec();
    let mut ihdr = Vec::new();
    push_u32(&mut ihdr, width);
    push_u32(&mut ihdr, height);
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
    for (tag, data) in [(b"IHDR", ihdr), (b"IEND", Vec::new())] {
        push_u32(&mut out, data.len() as u32);
        let mut crc = crc32fast::Hasher::new();
        crc.update(tag);
        crc.update(&data);
        out.extend_from_slice(tag);
        out.extend_from_slice(&data);
        push_u32(&mut out, crc.finalize());
    }
    out
}

pub fn jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x11, 0x08];
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x03, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

pub fn zcode(version: u8) -> Vec<u8> {
    let mut data = vec![0u8; 64];
    data[0] = version;
    data[2..4].copy_from_slice(&3u16.to_be_bytes());
    data[0x12..0x18].copy_from_slice(b"970828");
    data
}

/// `FORM` payload of a small AIFF (odd length, so the chunk gets padded).
pub fn aiff() -> Vec<u8> {
    let mut data = b"AIFFCOMM".to_vec();
    push_u32(&mut data, 5);
    data.extend_from_slice(&[0, 1, 0, 0, 9]);
    data
}

pub fn descriptions(entries: &[(ResourceId, &str)]) -> Vec<u8> {
    let entries: Vec<Description> =
        entries.iter().map(|(r, t)| Description { resource: *r, text: t.to_string() }).collect();
    Chunk::resource_descriptions(&entries).data().to_vec()
}

pub fn resolution(numbers: &[u32]) -> Vec<u8> {
    let one = Ratio { numerator: 1, denominator: 1 };
    let window = Window {
        size:     Size { width: 800, height: 600 },
        min_size: Size { width: 0, height: 0 },
        max_size: Size { width: 0, height: 0 },
    };
    let entries = numbers
        .iter()
        .map(|&number| ResolutionEntry { number, std_ratio: one, min_ratio: one, max_ratio: one })
        .collect();
    Chunk::resolution(window, entries).data().to_vec()
}

/// A complete, consistent story file: game, two pictures, a sound,
/// frontispiece, descriptions, resolution table and metadata.
pub fn story_file() -> Vec<u8> {
    build_file(
        &[
            (b"ZCOD", zcode(5)),
            (b"PNG ", png(320, 200)),
            (b"JPEG", jpeg(64, 48)),
            (b"FORM", aiff()),
            (b"Fspc", vec![0, 0, 0, 1]),
            (b"RDes", descriptions(&[(ResourceId::pict(1), "Cover"), (ResourceId::pict(2), "Map")])),
            (b"Reso", resolution(&[1, 2])),
            (b"IFmd", b"<?xml version=\"1.0\"?><ifindex version=\"1.0\"></ifindex>".to_vec()),
            (b"AUTH", b"A. Writer".to_vec()),
        ],
        &[
            (0, ResourceId::new(Usage::Exec, 0)),
            (1, ResourceId::pict(1)),
            (2, ResourceId::pict(2)),
            (3, ResourceId::new(Usage::Snd, 3)),
        ],
    )
}
