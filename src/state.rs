//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::document::{
    DocumentCache, DocumentEngine, DocumentError, DocumentHandle, DocumentResult, MupdfEngine,
};
use crate::reader::ReaderSessions;
use crate::shelf::Shelf;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    shelf: Shelf,
    documents: DocumentCache,
    sessions: ReaderSessions,
}

impl AppState {
    /// Create application state with the MuPDF engine.
    pub fn new(config: Config) -> Self {
        Self::with_engine(config, Arc::new(MupdfEngine::new()))
    }

    /// Create application state with an injected engine.
    ///
    /// This is the seam that keeps the rendering library out of ambient
    /// state; tests substitute a scriptable engine here.
    pub fn with_engine(config: Config, engine: Arc<dyn DocumentEngine>) -> Self {
        let documents = DocumentCache::new(engine, config.cache.raster_cache_size);
        let sessions = ReaderSessions::new(documents.clone());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                shelf: Shelf::new(),
                documents,
                sessions,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn shelf(&self) -> &Shelf {
        &self.inner.shelf
    }

    pub fn documents(&self) -> &DocumentCache {
        &self.inner.documents
    }

    pub fn sessions(&self) -> &ReaderSessions {
        &self.inner.sessions
    }

    /// Ensure a book's document is open, loading its bytes if needed, and
    /// backfill the shelf's page count.
    pub async fn open_document(&self, book_id: &str) -> DocumentResult<Arc<dyn DocumentHandle>> {
        if let Some(handle) = self.documents().get(book_id).await {
            return Ok(handle);
        }

        let book = self
            .shelf()
            .get(book_id)
            .await
            .ok_or_else(|| DocumentError::NotFound(book_id.to_string()))?;

        let data = book
            .source
            .load()
            .await
            .map_err(|e| DocumentError::SourceError(e.to_string()))?;

        let handle = self.documents().open(book_id, data).await?;
        self.shelf()
            .set_page_count(book_id, handle.page_count())
            .await;
        Ok(handle)
    }

    /// Cancel all reader work before the process exits.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down application state...");
        self.sessions().close_all().await;
    }
}
