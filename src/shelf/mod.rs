//! The bookshelf
//!
//! In-memory book list in catalog order. Books are created by the startup
//! catalog scan or by uploads, mutated only to attach a generated cover or
//! backfill a page count, and dropped when removed. Nothing persists.

pub mod book;
pub mod catalog;

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::document::CoverImage;

pub use book::{title_from_filename, Book, BookSource, SourceError};
pub use catalog::{load_catalog, CatalogEntry, CatalogError, CATALOG_FILE};

/// Thread-safe, ordered book list.
#[derive(Clone, Default)]
pub struct Shelf {
    books: Arc<RwLock<Vec<Book>>>,
}

impl Shelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a book, replacing any existing entry with the same id in place.
    pub async fn insert(&self, book: Book) {
        let mut books = self.books.write().await;
        match books.iter_mut().find(|b| b.id == book.id) {
            Some(existing) => *existing = book,
            None => books.push(book),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Book> {
        let books = self.books.read().await;
        books.iter().find(|b| b.id == id).cloned()
    }

    pub async fn list(&self) -> Vec<Book> {
        let books = self.books.read().await;
        books.clone()
    }

    pub async fn contains(&self, id: &str) -> bool {
        let books = self.books.read().await;
        books.iter().any(|b| b.id == id)
    }

    /// Remove a book, releasing its bytes. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> bool {
        let mut books = self.books.write().await;
        let before = books.len();
        books.retain(|b| b.id != id);
        books.len() != before
    }

    /// Attach a generated cover to a book.
    pub async fn set_cover(&self, id: &str, cover: Arc<CoverImage>) -> bool {
        let mut books = self.books.write().await;
        match books.iter_mut().find(|b| b.id == id) {
            Some(book) => {
                book.cover = Some(cover);
                true
            }
            None => false,
        }
    }

    /// Backfill the page count once a document has been opened.
    pub async fn set_page_count(&self, id: &str, page_count: usize) -> bool {
        let mut books = self.books.write().await;
        match books.iter_mut().find(|b| b.id == id) {
            Some(book) => {
                book.page_count = Some(page_count);
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        let books = self.books.read().await;
        books.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
