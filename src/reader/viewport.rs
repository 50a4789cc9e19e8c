//! Fit-to-container viewport math
//!
//! A page is displayed at the largest uniform scale that fits its unscaled
//! dimensions entirely inside the client's container. The raster backing
//! resolution is additionally multiplied by the device pixel ratio so the
//! page stays sharp on high-DPI displays without changing its displayed
//! (CSS) size.

use serde::{Deserialize, Serialize};

use crate::document::PageSize;

/// Client-reported container dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerSize {
    /// Container width in CSS pixels
    pub width: f32,
    /// Container height in CSS pixels
    pub height: f32,
    /// Ratio of physical to logical pixels
    #[serde(default = "default_dpr")]
    pub device_pixel_ratio: f32,
}

fn default_dpr() -> f32 {
    1.0
}

impl ContainerSize {
    pub fn new(width: f32, height: f32, device_pixel_ratio: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio,
        }
    }
}

/// Computed scales and dimensions for one page in one container.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFit {
    /// min(containerWidth / pageWidth, containerHeight / pageHeight)
    pub fit_scale: f32,
    /// fit_scale x device pixel ratio; what the rasterizer receives
    pub render_scale: f32,
    /// Displayed width in CSS pixels (unscaled width x fit_scale)
    pub css_width: f32,
    /// Displayed height in CSS pixels
    pub css_height: f32,
    /// Backing raster width in physical pixels
    pub pixel_width: u32,
    /// Backing raster height in physical pixels
    pub pixel_height: u32,
}

impl PageFit {
    /// Compute the fit for a page inside a container.
    ///
    /// Degenerate dimensions are clamped to 1 so a collapsed container or a
    /// malformed page never yields a NaN or zero scale.
    pub fn compute(container: ContainerSize, page: PageSize) -> Self {
        let container_width = container.width.max(1.0);
        let container_height = container.height.max(1.0);
        let page_width = page.width.max(1.0);
        let page_height = page.height.max(1.0);
        let dpr = container.device_pixel_ratio.max(0.1);

        let width_scale = container_width / page_width;
        let height_scale = container_height / page_height;
        let fit_scale = width_scale.min(height_scale);
        let render_scale = fit_scale * dpr;

        Self {
            fit_scale,
            render_scale,
            css_width: page_width * fit_scale,
            css_height: page_height * fit_scale,
            pixel_width: (page_width * render_scale).round() as u32,
            pixel_height: (page_height * render_scale).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize {
        width: 612.0,
        height: 792.0,
    };

    #[test]
    fn test_fit_scale_is_min_ratio() {
        let fit = PageFit::compute(ContainerSize::new(800.0, 600.0, 1.0), LETTER);
        assert!((fit.fit_scale - (600.0 / 792.0)).abs() < 1e-6);

        // Wide page: width is the limiting dimension
        let wide = PageSize {
            width: 1000.0,
            height: 100.0,
        };
        let fit = PageFit::compute(ContainerSize::new(500.0, 400.0, 1.0), wide);
        assert!((fit.fit_scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_css_size_ignores_dpr() {
        for dpr in [1.0, 1.5, 2.0, 3.0] {
            let fit = PageFit::compute(ContainerSize::new(800.0, 600.0, dpr), LETTER);
            assert!((fit.css_width - 612.0 * fit.fit_scale).abs() < 1e-3);
            assert!((fit.css_height - 600.0).abs() < 1e-3);
        }
    }

    #[test]
    fn test_letter_page_in_800x600_at_dpr2() {
        // container 800x600, page 612x792, DPR 2
        let fit = PageFit::compute(ContainerSize::new(800.0, 600.0, 2.0), LETTER);
        assert!((fit.fit_scale - 0.7576).abs() < 1e-3);
        assert!((fit.render_scale - 1.5152).abs() < 1e-3);
        assert!((fit.css_width - 463.6).abs() < 0.5);
        assert!((fit.css_height - 600.0).abs() < 1e-3);
        assert!((927..=928).contains(&fit.pixel_width));
        assert_eq!(fit.pixel_height, 1200);
    }

    #[test]
    fn test_degenerate_container_is_clamped() {
        let fit = PageFit::compute(ContainerSize::new(0.0, -5.0, 0.0), LETTER);
        assert!(fit.fit_scale.is_finite());
        assert!(fit.fit_scale > 0.0);
        assert!(fit.pixel_width >= 1 || fit.css_width > 0.0);
    }
}
