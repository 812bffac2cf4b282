//! Engine error taxonomy.
//!
//! Only structural failures surface as errors: a document that fails to
//! parse, a page index out of range, malformed run data. Per-match outcomes
//! (geometric rejections, fit failures) are values, never errors — see
//! [`crate::replace::SkipReason`].

use thiserror::Error;

/// Structural failures raised to the caller of a session operation.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no document loaded")]
    NoDocument,

    #[error("invalid page index: {0} (document has {1} pages)")]
    InvalidPage(usize, usize),

    #[error("malformed glyph run data: {0}")]
    MalformedRun(String),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
