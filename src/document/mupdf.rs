//! MuPDF document engine
//!
//! Production [`DocumentEngine`] backed by MuPDF.
//!
//! MuPDF's `fz_context` is not thread-safe, so the handle keeps only the
//! source bytes and opens a fresh document for each operation, serialized
//! behind a mutex. Each operation gets a clean document state and no MuPDF
//! object outlives the call that created it.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use mupdf::{Colorspace, Document, Matrix, MetadataName};
use parking_lot::Mutex;

use super::engine::{
    DocumentEngine, DocumentHandle, DocumentInfo, ImageFormat, PageRenderRequest, PageSize,
    RenderedPage,
};
use super::error::{DocumentError, DocumentResult};

/// Scale clamp bounds, matching the render endpoint's DoS guard.
const MIN_SCALE: f32 = 0.1;
const MAX_SCALE: f32 = 8.0;

/// Engine that opens documents with MuPDF.
#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfEngine;

impl MupdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentEngine for MupdfEngine {
    fn open(&self, data: Vec<u8>, id: String) -> DocumentResult<Arc<dyn DocumentHandle>> {
        Ok(Arc::new(MupdfDocument::from_bytes(data, id)?))
    }
}

/// An open MuPDF document.
pub struct MupdfDocument {
    /// Source bytes, kept alive for the handle's lifetime
    data: Arc<Vec<u8>>,
    /// Owning book id
    id: String,
    /// Cached page count
    page_count: usize,
    /// Serializes MuPDF access
    lock: Mutex<()>,
}

impl MupdfDocument {
    /// Validate the bytes parse as a document and cache the page count.
    pub fn from_bytes(data: Vec<u8>, id: String) -> DocumentResult<Self> {
        let doc = Document::from_bytes(&data, "application/pdf")?;
        let page_count = doc.page_count()? as usize;

        Ok(Self {
            data: Arc::new(data),
            id,
            page_count,
            lock: Mutex::new(()),
        })
    }

    /// Open a fresh document instance for the current operation.
    fn open_document(&self) -> DocumentResult<Document> {
        Document::from_bytes(&self.data, "application/pdf").map_err(Into::into)
    }

    fn validate_page(&self, page: usize) -> DocumentResult<()> {
        if page < 1 || page > self.page_count {
            return Err(DocumentError::PageNotFound(page, self.page_count));
        }
        Ok(())
    }
}

impl DocumentHandle for MupdfDocument {
    fn id(&self) -> &str {
        &self.id
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page: usize) -> DocumentResult<PageSize> {
        self.validate_page(page)?;

        let _guard = self.lock.lock();
        let doc = self.open_document()?;
        let loaded = doc.load_page((page - 1) as i32)?;
        let bounds = loaded.bounds()?;

        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    fn render_page(&self, request: &PageRenderRequest) -> DocumentResult<RenderedPage> {
        self.validate_page(request.page)?;

        let _guard = self.lock.lock();
        let doc = self.open_document()?;
        let page = doc.load_page((request.page - 1) as i32)?;

        let scale = request.scale.clamp(MIN_SCALE, MAX_SCALE);
        let matrix = Matrix::new_scale(scale, scale);

        // Opaque render: the image crate only encodes JPEG from RGB, and an
        // opaque pixmap gives pages the expected white background.
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, false, true)?;

        encode_pixmap(&pixmap, request.format, request.quality)
    }

    fn info(&self) -> DocumentInfo {
        let _guard = self.lock.lock();
        let Ok(doc) = self.open_document() else {
            return DocumentInfo::default();
        };

        let get_meta = |name: MetadataName| -> Option<String> {
            doc.metadata(name).ok().filter(|s| !s.is_empty())
        };

        DocumentInfo {
            title: get_meta(MetadataName::Title),
            author: get_meta(MetadataName::Author),
        }
    }
}

/// Encode a pixmap to image bytes.
fn encode_pixmap(
    pixmap: &mupdf::Pixmap,
    format: ImageFormat,
    quality: u8,
) -> DocumentResult<RenderedPage> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    // Convert to a tightly packed RGB buffer
    let mut rgb_buffer = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let offset = (y * width as usize + x) * n;
            let r = samples.get(offset).copied().unwrap_or(255);
            let g = samples.get(offset + 1).copied().unwrap_or(255);
            let b = samples.get(offset + 2).copied().unwrap_or(255);
            rgb_buffer.extend_from_slice(&[r, g, b]);
        }
    }

    let img = image::RgbImage::from_raw(width, height, rgb_buffer)
        .ok_or_else(|| DocumentError::ImageError("Failed to create image buffer".to_string()))?;
    let dynamic_img = DynamicImage::ImageRgb8(img);

    let mut output = Vec::new();
    match format {
        ImageFormat::Png => {
            dynamic_img
                .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
                .map_err(|e| DocumentError::ImageError(e.to_string()))?;
        }
        ImageFormat::Jpeg => {
            let encoder =
                JpegEncoder::new_with_quality(&mut Cursor::new(&mut output), quality.clamp(1, 100));
            dynamic_img
                .write_with_encoder(encoder)
                .map_err(|e| DocumentError::ImageError(e.to_string()))?;
        }
    }

    Ok(RenderedPage {
        data: output,
        format,
        width,
        height,
    })
}
