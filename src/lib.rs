pub mod codec;
pub mod image;
pub mod chunk;
pub mod blorb;
pub mod edit;
pub mod check;
pub mod archive;
pub mod error;

pub use error::{BlorbError, Result};
pub use chunk::{parse_chunk, Chunk, ChunkContent, ChunkKey, ChunkType, ResourceId, Usage};
pub use blorb::{Blorb, Diagnostic};
pub use edit::{apply_edit, Edit};
pub use check::{check_consistency, check_against_expected_layout};
pub use archive::{load_document, load_document_with, export_document, export_chunk, LoadOptions};
