//! Cover thumbnail generation
//!
//! A cover is the first page rendered at a fixed 1.5 scale and encoded as
//! JPEG at quality 80, served either as raw bytes or as a
//! `data:image/jpeg;base64,` URL for embedding in book summaries.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

use super::cache::DocumentCache;
use super::engine::{ImageFormat, PageRenderRequest, RenderedPage};
use super::error::DocumentResult;

/// Fixed rasterization scale for covers
pub const COVER_SCALE: f32 = 1.5;
/// JPEG quality for covers (the 0.8 of the canvas encoder, in percent)
pub const COVER_JPEG_QUALITY: u8 = 80;

/// A generated cover image.
#[derive(Debug, Clone)]
pub struct CoverImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CoverImage {
    pub fn content_type(&self) -> &'static str {
        ImageFormat::Jpeg.content_type()
    }

    /// Encode as a data URL for embedding in JSON.
    pub fn to_data_url(&self) -> String {
        data_url(self.content_type(), &self.data)
    }
}

impl From<RenderedPage> for CoverImage {
    fn from(rendered: RenderedPage) -> Self {
        Self {
            data: rendered.data,
            width: rendered.width,
            height: rendered.height,
        }
    }
}

/// Render the cover (page 1) for an open document.
///
/// Decode and render errors propagate to the caller, which logs them and
/// lets the client fall back to a placeholder.
pub async fn generate_cover(cache: &DocumentCache, book_id: &str) -> DocumentResult<CoverImage> {
    let request =
        PageRenderRequest::new(1, COVER_SCALE, ImageFormat::Jpeg).with_quality(COVER_JPEG_QUALITY);
    let rendered = cache.render_page(book_id, &request).await?;
    Ok(rendered.into())
}

/// Build a `data:` URL from encoded image bytes.
pub fn data_url(content_type: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_url_shape() {
        let url = data_url("image/jpeg", &[0xFF, 0xD8, 0xFF]);
        assert_eq!(url, "data:image/jpeg;base64,/9j/");
    }

    #[test]
    fn test_cover_data_url_prefix() {
        let cover = CoverImage {
            data: vec![1, 2, 3],
            width: 10,
            height: 14,
        };
        assert!(cover.to_data_url().starts_with("data:image/jpeg;base64,"));
    }
}
