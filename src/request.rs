//! Capture requests – what to capture, how to lay it out, and the hooks that
//! run around the capture.
//!
//! [`ExportOptions`] is the serialisable part (it round-trips through JSON);
//! [`CaptureRequest`] adds the live target handle and the hooks.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::mask::HideTarget;
use crate::pagination::{PageFormat, PageGeometry, PageOrientation};
use crate::raster::{ImageEncoding, RasterOptions};
use crate::style::parse_color;
use crate::surface::ElementHandle;

/// File name used when a request does not set one.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// A `before_capture` / `after_capture` extension point.
pub type CaptureHook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`CaptureHook`].
pub fn hook<F, Fut>(f: F) -> CaptureHook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// Serialisable export configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Name the document is saved under.
    pub file_name: String,
    /// PDF metadata title; defaults to the file stem.
    pub title: Option<String>,
    pub page: PageGeometry,
    /// Raster pixels per on-screen pixel (must be positive).
    pub scale_factor: f32,
    /// CSS colour painted behind transparent regions.
    pub background_color: String,
    pub image_encoding: ImageEncoding,
    /// Elements to hide while capturing.
    pub hide_targets: Vec<HideTarget>,
    /// Skip the primary rasterizer.
    pub force_fallback_provider: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_FILE_NAME.to_string(),
            title: None,
            page: PageGeometry::default(),
            scale_factor: 2.0,
            background_color: "#ffffff".to_string(),
            image_encoding: ImageEncoding::Png,
            hide_targets: Vec::new(),
            force_fallback_provider: false,
        }
    }
}

impl ExportOptions {
    /// Serialise to JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Deserialise from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ExportError::InvalidRequest(e.to_string()))
    }

    /// Title for PDF metadata.
    pub fn effective_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            Path::new(&self.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document")
                .to_string()
        })
    }

    /// Check everything that can be checked before touching the surface and
    /// derive the provider options.
    pub fn validate(&self) -> Result<RasterOptions> {
        self.page.validate()?;
        if self.file_name.trim().is_empty() {
            return Err(ExportError::InvalidRequest("file name is empty".into()));
        }
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(ExportError::InvalidRequest(format!(
                "scale factor must be positive, got {}",
                self.scale_factor
            )));
        }
        if let ImageEncoding::Jpeg { quality } = self.image_encoding {
            if !(1..=100).contains(&quality) {
                return Err(ExportError::InvalidRequest(format!(
                    "JPEG quality must be within 1..=100, got {quality}"
                )));
            }
        }
        let background_color = parse_color(&self.background_color)
            .map_err(|e| ExportError::InvalidRequest(format!("background color: {e}")))?;
        Ok(RasterOptions {
            scale_factor: self.scale_factor,
            background_color,
            encoding: self.image_encoding,
        })
    }
}

/// One export invocation.
#[derive(Clone, Default)]
pub struct CaptureRequest {
    /// Root of the subtree to capture. `None` fails with `MissingTarget`.
    pub target: Option<ElementHandle>,
    pub options: ExportOptions,
    pub before_capture: Option<CaptureHook>,
    pub after_capture: Option<CaptureHook>,
}

impl CaptureRequest {
    pub fn new(target: ElementHandle) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: ExportOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.options.file_name = name.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.options.title = Some(title.into());
        self
    }

    pub fn with_page_format(mut self, format: PageFormat) -> Self {
        self.options.page.format = format;
        self
    }

    pub fn with_orientation(mut self, orientation: PageOrientation) -> Self {
        self.options.page.orientation = orientation;
        self
    }

    pub fn with_margin(mut self, margin_pt: f64) -> Self {
        self.options.page.margin_pt = margin_pt;
        self
    }

    pub fn with_scale_factor(mut self, scale: f32) -> Self {
        self.options.scale_factor = scale;
        self
    }

    pub fn with_background_color(mut self, color: impl Into<String>) -> Self {
        self.options.background_color = color.into();
        self
    }

    pub fn with_image_encoding(mut self, encoding: ImageEncoding) -> Self {
        self.options.image_encoding = encoding;
        self
    }

    pub fn hide(mut self, target: impl Into<HideTarget>) -> Self {
        self.options.hide_targets.push(target.into());
        self
    }

    pub fn force_fallback_provider(mut self, force: bool) -> Self {
        self.options.force_fallback_provider = force;
        self
    }

    pub fn before_capture(mut self, hook: CaptureHook) -> Self {
        self.before_capture = Some(hook);
        self
    }

    pub fn after_capture(mut self, hook: CaptureHook) -> Self {
        self.after_capture = Some(hook);
        self
    }
}

impl fmt::Debug for CaptureRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureRequest")
            .field("target", &self.target)
            .field("options", &self.options)
            .field("before_capture", &self.before_capture.is_some())
            .field("after_capture", &self.after_capture.is_some())
            .finish()
    }
}
