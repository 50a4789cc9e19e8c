//! Document and raster cache
//!
//! Keeps open document handles by book id and an LRU of encoded page
//! rasters, so repeated frame and cover requests do not re-rasterize.
//!
//! Every engine call is CPU-bound and goes through the blocking thread
//! pool with a timeout, so a problematic document cannot wedge the async
//! runtime or hold a request open forever.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::{timeout, Duration};

use super::engine::{DocumentEngine, DocumentHandle, ImageFormat, PageRenderRequest, RenderedPage};
use super::error::{DocumentError, DocumentResult};

/// Timeout for opening/parsing a document
const OPEN_TIMEOUT_SECS: u64 = 30;
/// Timeout for page rendering
const RENDER_TIMEOUT_SECS: u64 = 30;

/// Cache key for rendered pages
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct RasterCacheKey {
    pub book_id: String,
    pub page: usize,
    /// Scale * 100 as integer for hashing
    pub scale: u32,
    pub format: ImageFormat,
}

impl RasterCacheKey {
    pub fn new(book_id: &str, request: &PageRenderRequest) -> Self {
        Self {
            book_id: book_id.to_string(),
            page: request.page,
            scale: (request.scale * 100.0) as u32,
            format: request.format,
        }
    }
}

/// Thread-safe document cache
#[derive(Clone)]
pub struct DocumentCache {
    /// The injected rendering engine
    engine: Arc<dyn DocumentEngine>,
    /// Open document handles by book id
    handles: Arc<RwLock<HashMap<String, Arc<dyn DocumentHandle>>>>,
    /// LRU cache for encoded page rasters
    raster_cache: Arc<RwLock<LruCache<RasterCacheKey, RenderedPage>>>,
}

impl DocumentCache {
    /// Create a cache with the given raster capacity.
    pub fn new(engine: Arc<dyn DocumentEngine>, raster_cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(raster_cache_size)
            .unwrap_or_else(|| NonZeroUsize::new(100).expect("non-zero"));

        Self {
            engine,
            handles: Arc::new(RwLock::new(HashMap::new())),
            raster_cache: Arc::new(RwLock::new(LruCache::new(cap))),
        }
    }

    /// Open (or reuse) the document for a book.
    ///
    /// Parsing runs on the blocking pool with a timeout.
    pub async fn open(&self, book_id: &str, data: Vec<u8>) -> DocumentResult<Arc<dyn DocumentHandle>> {
        if let Some(handle) = self.get(book_id).await {
            return Ok(handle);
        }

        let engine = self.engine.clone();
        let id = book_id.to_string();
        let open_result = timeout(
            Duration::from_secs(OPEN_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || engine.open(data, id)),
        )
        .await;

        let handle = match open_result {
            Ok(join_result) => join_result
                .map_err(|e| DocumentError::ParseError(format!("Task join error: {}", e)))??,
            Err(_) => return Err(DocumentError::Timeout(OPEN_TIMEOUT_SECS)),
        };

        let mut handles = self.handles.write().await;
        Ok(handles
            .entry(book_id.to_string())
            .or_insert_with(|| handle.clone())
            .clone())
    }

    /// Get an open document handle.
    pub async fn get(&self, book_id: &str) -> Option<Arc<dyn DocumentHandle>> {
        let handles = self.handles.read().await;
        handles.get(book_id).cloned()
    }

    pub async fn contains(&self, book_id: &str) -> bool {
        let handles = self.handles.read().await;
        handles.contains_key(book_id)
    }

    /// Drop the handle and any cached rasters for a book.
    pub async fn remove(&self, book_id: &str) {
        {
            let mut handles = self.handles.write().await;
            handles.remove(book_id);
        }

        let mut raster_cache = self.raster_cache.write().await;
        let stale: Vec<RasterCacheKey> = raster_cache
            .iter()
            .filter(|(key, _)| key.book_id == book_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            raster_cache.pop(&key);
        }
    }

    /// Render a page (with caching).
    pub async fn render_page(
        &self,
        book_id: &str,
        request: &PageRenderRequest,
    ) -> DocumentResult<RenderedPage> {
        let cache_key = RasterCacheKey::new(book_id, request);

        // Check the raster cache first
        {
            let mut raster_cache = self.raster_cache.write().await;
            if let Some(rendered) = raster_cache.get(&cache_key) {
                return Ok(rendered.clone());
            }
        }

        let handle = self
            .get(book_id)
            .await
            .ok_or_else(|| DocumentError::NotFound(book_id.to_string()))?;

        // Offload CPU-bound rendering to the blocking pool with a timeout
        let request_clone = request.clone();
        let render_result = timeout(
            Duration::from_secs(RENDER_TIMEOUT_SECS),
            tokio::task::spawn_blocking(move || handle.render_page(&request_clone)),
        )
        .await;

        let rendered = match render_result {
            Ok(join_result) => join_result
                .map_err(|e| DocumentError::RenderError(format!("Task join error: {}", e)))??,
            Err(_) => return Err(DocumentError::Timeout(RENDER_TIMEOUT_SECS)),
        };

        {
            let mut raster_cache = self.raster_cache.write().await;
            raster_cache.put(cache_key, rendered.clone());
        }

        Ok(rendered)
    }

    /// Number of open documents.
    pub async fn len(&self) -> usize {
        let handles = self.handles.read().await;
        handles.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// (current, capacity) of the raster cache.
    pub async fn raster_cache_stats(&self) -> (usize, usize) {
        let raster_cache = self.raster_cache.read().await;
        (raster_cache.len(), raster_cache.cap().get())
    }
}
