//! Book records

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::document::CoverImage;

/// A book on the shelf
#[derive(Clone)]
pub struct Book {
    /// Unique identifier
    pub id: String,

    /// Display title (for uploads: filename with the `.pdf` suffix stripped)
    pub title: String,

    /// Where the PDF bytes come from
    pub source: BookSource,

    /// Generated cover, attached after the first cover render
    pub cover: Option<Arc<CoverImage>>,

    /// Page count, backfilled once the document has been opened
    pub page_count: Option<usize>,

    /// When the book was added to the shelf
    pub added_at: DateTime<Utc>,
}

impl Book {
    pub fn new(id: String, title: String, source: BookSource) -> Self {
        Self {
            id,
            title,
            source,
            cover: None,
            page_count: None,
            added_at: Utc::now(),
        }
    }

    /// Data URL of the generated cover, if one has been attached.
    pub fn cover_url(&self) -> Option<String> {
        self.cover.as_ref().map(|cover| cover.to_data_url())
    }
}

/// Where a book's PDF bytes live.
///
/// Uploaded bytes are reference-counted in memory and released when the
/// last owner (the shelf entry, or a load in progress) drops them.
#[derive(Debug, Clone)]
pub enum BookSource {
    /// In-memory upload
    Memory(Arc<Vec<u8>>),
    /// Remote document, fetched on demand
    Url(String),
    /// File under the shelf directory
    Path(PathBuf),
}

/// Failed to produce the bytes for a source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BookSource {
    pub fn from_upload(data: Vec<u8>) -> Self {
        Self::Memory(Arc::new(data))
    }

    /// Load the PDF bytes.
    pub async fn load(&self) -> Result<Vec<u8>, SourceError> {
        match self {
            BookSource::Memory(data) => Ok(data.as_ref().clone()),
            BookSource::Url(url) => {
                let response = reqwest::get(url).await?.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            }
            BookSource::Path(path) => Ok(tokio::fs::read(path).await?),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BookSource::Memory(_) => "upload",
            BookSource::Url(_) => "url",
            BookSource::Path(_) => "file",
        }
    }
}

/// Derive a display title from an uploaded filename, stripping any `.pdf`
/// suffix (case-insensitive).
pub fn title_from_filename(filename: &str) -> String {
    let trimmed = filename.trim();
    match trimmed
        .len()
        .checked_sub(4)
        .and_then(|stem_len| trimmed.get(stem_len..).map(|ext| (stem_len, ext)))
    {
        Some((stem_len, ext)) if ext.eq_ignore_ascii_case(".pdf") => {
            trimmed[..stem_len].to_string()
        }
        _ => trimmed.to_string(),
    }
}
