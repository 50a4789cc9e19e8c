//! Shared test support: a scriptable document engine.
//!
//! The engine seam is injected, so tests drive the whole service without
//! MuPDF: documents have a configurable page count and size, renders can be
//! slowed down to exercise cancellation, and bytes starting with `BAD`
//! fail to open.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bookshelf_server::document::{
    DocumentEngine, DocumentError, DocumentHandle, DocumentInfo, DocumentResult,
    PageRenderRequest, PageSize, RenderedPage,
};

pub struct FakeEngine {
    page_count: usize,
    page_size: PageSize,
    render_delay: Duration,
    renders: Arc<AtomicUsize>,
}

impl FakeEngine {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count,
            page_size: PageSize {
                width: 612.0,
                height: 792.0,
            },
            render_delay: Duration::ZERO,
            renders: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Counter of completed `render_page` calls across all documents.
    pub fn render_counter(&self) -> Arc<AtomicUsize> {
        self.renders.clone()
    }
}

impl DocumentEngine for FakeEngine {
    fn open(&self, data: Vec<u8>, id: String) -> DocumentResult<Arc<dyn DocumentHandle>> {
        if data.starts_with(b"BAD") {
            return Err(DocumentError::ParseError("not a PDF".to_string()));
        }

        Ok(Arc::new(FakeDocument {
            id,
            page_count: self.page_count,
            page_size: self.page_size,
            render_delay: self.render_delay,
            renders: self.renders.clone(),
        }))
    }
}

pub struct FakeDocument {
    id: String,
    page_count: usize,
    page_size: PageSize,
    render_delay: Duration,
    renders: Arc<AtomicUsize>,
}

impl DocumentHandle for FakeDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> DocumentResult<PageSize> {
        if page < 1 || page > self.page_count {
            return Err(DocumentError::PageNotFound(page, self.page_count));
        }
        Ok(self.page_size)
    }

    fn render_page(&self, request: &PageRenderRequest) -> DocumentResult<RenderedPage> {
        if request.page < 1 || request.page > self.page_count {
            return Err(DocumentError::PageNotFound(request.page, self.page_count));
        }

        if !self.render_delay.is_zero() {
            std::thread::sleep(self.render_delay);
        }
        self.renders.fetch_add(1, Ordering::SeqCst);

        // One byte of payload identifying the page, so assertions can tell
        // frames apart.
        Ok(RenderedPage {
            data: vec![request.page as u8],
            format: request.format,
            width: (self.page_size.width * request.scale).round() as u32,
            height: (self.page_size.height * request.scale).round() as u32,
        })
    }

    fn info(&self) -> DocumentInfo {
        DocumentInfo {
            title: Some(format!("{} (document title)", self.id)),
            author: Some("Fake Author".to_string()),
        }
    }
}

/// Bytes the fake engine accepts.
pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4 fake but accepted".to_vec()
}

/// Bytes the fake engine rejects.
pub fn bad_bytes() -> Vec<u8> {
    b"BAD not a pdf".to_vec()
}
