//! Document handling
//!
//! The boundary to the external PDF rendering library and everything built
//! directly on it:
//!
//! - [`engine`] - the injected engine traits and raster types
//! - [`mupdf`] - the MuPDF engine implementation
//! - [`cache`] - open handles and the rendered-page LRU
//! - [`thumbnail`] - first-page cover generation

pub mod cache;
pub mod engine;
pub mod error;
pub mod mupdf;
pub mod thumbnail;

pub use self::cache::{DocumentCache, RasterCacheKey};
pub use self::engine::{
    DocumentEngine, DocumentHandle, DocumentInfo, ImageFormat, PageRenderRequest, PageSize,
    RenderedPage,
};
pub use self::error::{DocumentError, DocumentResult};
pub use self::mupdf::MupdfEngine;
pub use self::thumbnail::{generate_cover, CoverImage, COVER_JPEG_QUALITY, COVER_SCALE};
