//! Document error types
//!
//! Unified error handling for the document engine, cache, and thumbnail
//! generation.

use thiserror::Error;

/// Unified document error type
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Document not found in the cache
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Page not found
    #[error("Page {0} not found (document has {1} pages)")]
    PageNotFound(usize, usize),

    /// Failed to parse document
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to render a page
    #[error("Render error: {0}")]
    RenderError(String),

    /// Image encoding error
    #[error("Image error: {0}")]
    ImageError(String),

    /// Failed to load document bytes from their source
    #[error("Source error: {0}")]
    SourceError(String),

    /// Operation timed out
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type alias for document operations
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

impl From<mupdf::Error> for DocumentError {
    fn from(err: mupdf::Error) -> Self {
        DocumentError::ParseError(err.to_string())
    }
}
