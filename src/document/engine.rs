//! The PDF library boundary
//!
//! The service consumes exactly four capabilities from the rendering
//! library: open a document from bytes, read page count and unscaled page
//! dimensions, and rasterize a page at a scale. They are expressed as
//! traits so the library is an injected dependency rather than ambient
//! state, and so tests can substitute a scriptable engine.
//!
//! All trait methods are blocking; callers offload them to the blocking
//! thread pool (see [`crate::document::DocumentCache`]). Cancellation is
//! cooperative: a rasterization in progress cannot be interrupted, so
//! callers abort the wrapping task and must tolerate late results.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DocumentResult;

/// Opens documents from raw bytes.
pub trait DocumentEngine: Send + Sync {
    /// Parse `data` and return a handle, validating the document up front.
    fn open(&self, data: Vec<u8>, id: String) -> DocumentResult<Arc<dyn DocumentHandle>>;
}

/// An open, parsed document.
pub trait DocumentHandle: Send + Sync {
    /// Document identifier (the owning book's id).
    fn id(&self) -> &str;

    /// Total page count. Cached at open time; never blocks.
    fn page_count(&self) -> usize;

    /// Unscaled page dimensions in PDF points. Pages are 1-indexed.
    fn page_size(&self, page: usize) -> DocumentResult<PageSize>;

    /// Rasterize a page and encode it.
    fn render_page(&self, request: &PageRenderRequest) -> DocumentResult<RenderedPage>;

    /// Title/author metadata from the document info dictionary.
    fn info(&self) -> DocumentInfo;
}

/// Unscaled page dimensions in PDF points (72 points = 1 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// Request for rendering a page
#[derive(Debug, Clone, PartialEq)]
pub struct PageRenderRequest {
    /// Page number (1-indexed)
    pub page: usize,
    /// Scale factor (1.0 = 72 DPI)
    pub scale: f32,
    /// Output encoding
    pub format: ImageFormat,
    /// Quality for lossy formats (1-100)
    pub quality: u8,
}

impl PageRenderRequest {
    pub fn new(page: usize, scale: f32, format: ImageFormat) -> Self {
        Self {
            page,
            scale,
            format,
            quality: 85,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }
}

/// An encoded raster of a single page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Encoding of `data`
    pub format: ImageFormat,
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
}

impl RenderedPage {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Document metadata from the info dictionary
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
}

/// Image output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }
}
