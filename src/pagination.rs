//! Pagination – maps a raster of known pixel size onto fixed-size pages.
//!
//! The image is scaled uniformly to the usable page width and treated as one
//! continuous vertical strip. Page *k* shows the window starting
//! `k × usable_height` points down the strip; pages are added while any of
//! the strip remains unshown.

use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};

/// Default page margins in points.
pub const PAGE_MARGIN_PT: f64 = 40.0;

/// Page size, given in portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageFormat {
    A3,
    #[default]
    A4,
    A5,
    Letter,
    Legal,
    /// Arbitrary size in points.
    Custom { width_pt: f64, height_pt: f64 },
}

impl PageFormat {
    /// `(width, height)` in points, portrait.
    pub fn size_pt(&self) -> (f64, f64) {
        match *self {
            PageFormat::A3 => (841.89, 1190.55),
            PageFormat::A4 => (595.28, 841.89),
            PageFormat::A5 => (419.53, 595.28),
            PageFormat::Letter => (612.0, 792.0),
            PageFormat::Legal => (612.0, 1008.0),
            PageFormat::Custom {
                width_pt,
                height_pt,
            } => (width_pt, height_pt),
        }
    }
}

/// Page orientation for the generated PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageOrientation {
    /// Format width × height as given (default).
    #[default]
    Portrait,
    /// Format width and height swapped.
    Landscape,
}

/// Page format, orientation and uniform margin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageGeometry {
    pub format: PageFormat,
    pub orientation: PageOrientation,
    pub margin_pt: f64,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            orientation: PageOrientation::Portrait,
            margin_pt: PAGE_MARGIN_PT,
        }
    }
}

impl PageGeometry {
    /// Effective `(width, height)` after applying orientation.
    pub fn page_size_pt(&self) -> (f64, f64) {
        let (w, h) = self.format.size_pt();
        match self.orientation {
            PageOrientation::Portrait => (w, h),
            PageOrientation::Landscape => (h, w),
        }
    }

    /// Reject geometry that leaves no drawable area.
    pub fn validate(&self) -> Result<()> {
        let (w, h) = self.page_size_pt();
        if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
            return Err(ExportError::InvalidLayout(format!(
                "page size must be positive, got {w}x{h} pt"
            )));
        }
        if !(self.margin_pt.is_finite() && self.margin_pt >= 0.0) {
            return Err(ExportError::InvalidLayout(format!(
                "margin must be a non-negative number, got {}",
                self.margin_pt
            )));
        }
        let usable_w = w - 2.0 * self.margin_pt;
        let usable_h = h - 2.0 * self.margin_pt;
        if usable_w <= 0.0 {
            return Err(ExportError::InvalidLayout(format!(
                "margin {} pt leaves no usable width on a {w} pt wide page",
                self.margin_pt
            )));
        }
        if usable_h <= 0.0 {
            return Err(ExportError::InvalidLayout(format!(
                "margin {} pt leaves no usable height on a {h} pt tall page",
                self.margin_pt
            )));
        }
        Ok(())
    }
}

/// Where the captured image goes on every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLayoutPlan {
    pub page_width_pts: f64,
    pub page_height_pts: f64,
    pub margin_pts: f64,
    pub usable_width_pts: f64,
    pub usable_height_pts: f64,
    pub rendered_image_width_pts: f64,
    pub rendered_image_height_pts: f64,
    pub page_count: usize,
    /// How far the strip is shifted up on each page; one entry per page.
    pub y_offsets_pts: Vec<f64>,
}

impl PageLayoutPlan {
    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

/// Lay out an image of `pixel_width × pixel_height` on pages of `geometry`.
pub fn compute_layout(
    geometry: &PageGeometry,
    pixel_width: u32,
    pixel_height: u32,
) -> Result<PageLayoutPlan> {
    geometry.validate()?;
    if pixel_width == 0 || pixel_height == 0 {
        return Err(ExportError::InvalidLayout(format!(
            "image has no extent ({pixel_width}x{pixel_height} px)"
        )));
    }

    let (page_w, page_h) = geometry.page_size_pt();
    let margin = geometry.margin_pt;
    let usable_w = page_w - 2.0 * margin;
    let usable_h = page_h - 2.0 * margin;

    let rendered_w = usable_w;
    let rendered_h = pixel_height as f64 * rendered_w / pixel_width as f64;

    let mut y_offsets = vec![0.0];
    // Strictly positive: a strip that exactly fills its last page stops there.
    while rendered_h - y_offsets.len() as f64 * usable_h > 0.0 {
        y_offsets.push(y_offsets.len() as f64 * usable_h);
    }

    Ok(PageLayoutPlan {
        page_width_pts: page_w,
        page_height_pts: page_h,
        margin_pts: margin,
        usable_width_pts: usable_w,
        usable_height_pts: usable_h,
        rendered_image_width_pts: rendered_w,
        rendered_image_height_pts: rendered_h,
        page_count: y_offsets.len(),
        y_offsets_pts: y_offsets,
    })
}
