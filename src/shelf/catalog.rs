//! Static catalog loading
//!
//! The static-catalog variant serves books listed in a `books.json` file in
//! the shelf directory: a JSON array of `{id, url, title}` records. Remote
//! URLs stay remote and are fetched when a document is first opened;
//! relative entries are percent-decoded (cards carry encoded URLs) and
//! resolved against the shelf directory.

use std::borrow::Cow;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use super::book::{Book, BookSource};

/// Catalog filename inside the shelf directory
pub const CATALOG_FILE: &str = "books.json";

/// One record in `books.json`
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub url: String,
    pub title: String,
}

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Load `books.json` from the shelf directory.
pub async fn load_catalog(shelf_dir: &Path) -> Result<Vec<Book>, CatalogError> {
    let path = shelf_dir.join(CATALOG_FILE);
    let raw = tokio::fs::read_to_string(&path).await?;
    let entries: Vec<CatalogEntry> = serde_json::from_str(&raw)?;

    Ok(entries
        .into_iter()
        .map(|entry| entry_into_book(shelf_dir, entry))
        .collect())
}

fn entry_into_book(shelf_dir: &Path, entry: CatalogEntry) -> Book {
    let source = if is_remote(&entry.url) {
        BookSource::Url(entry.url.clone())
    } else {
        let decoded = urlencoding::decode(&entry.url)
            .unwrap_or_else(|_| Cow::Borrowed(entry.url.as_str()))
            .into_owned();
        let relative = decoded.trim_start_matches("./");
        BookSource::Path(shelf_dir.join(relative))
    };

    Book::new(entry.id, entry.title, source)
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
