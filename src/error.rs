use std::io;

use thiserror::Error;

/// Errors from the fallible parts of the API.
///
/// Problems *inside* a Blorb file are never reported this way; they are
/// collected as [`crate::blorb::Diagnostic`]s on the document.
#[derive(Error, Debug)]
pub enum BlorbError {
    #[error("expected a {expected} chunk, found {found}")]
    WrongVariant { expected: &'static str, found: String },
    #[error("invalid chunk tag {0:?}: need one to four single-byte characters")]
    BadTag(String),
    #[error("invalid resource id {0:?}: expected <Pict|Snd|Data|Exec>:<number>")]
    BadResourceId(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, BlorbError>;
