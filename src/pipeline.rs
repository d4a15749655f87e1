//! Pipeline – ties together masking, rasterization, probing, pagination and
//! emission into a single export call.
//!
//! Stage order for one request:
//!
//! 1. check the target and validate options (nothing touched yet)
//! 2. `before_capture` hook
//! 3. mask hide targets
//! 4. rasterize (primary, then fallback)
//! 5. probe the raster
//! 6. compute the page layout
//! 7. render the PDF and hand it to the sink
//! 8. restore masked elements, then `after_capture`
//!
//! Step 8 runs whenever step 3 ran, whatever happened in between. If the
//! export future is dropped mid-flight the mask token still restores on drop,
//! but `after_capture` does not run.

use std::sync::Arc;

use serde::Serialize;

use crate::error::{ExportError, Result};
use crate::mask;
use crate::pagination::{compute_layout, PageLayoutPlan};
use crate::probe::{probe, PixelSize};
use crate::raster::{RasterOptions, RasterizerChain};
use crate::render::render_pdf;
use crate::request::{CaptureHook, CaptureRequest, ExportOptions};
use crate::sink::DocumentSink;
use crate::surface::{ElementHandle, VisualSurface};

/// What a successful export produced.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    pub file_name: String,
    pub page_count: usize,
    pub plan: PageLayoutPlan,
    /// Rasterizer that produced the captured image.
    pub provider: String,
    pub pixel_size: PixelSize,
    /// Size of the emitted document.
    pub byte_len: usize,
}

/// Export orchestrator bound to one surface and one sink.
///
/// Concurrent exports on the same surface must not hide overlapping
/// elements; nothing here serialises them.
#[derive(Clone)]
pub struct Exporter {
    surface: Arc<dyn VisualSurface>,
    sink: Arc<dyn DocumentSink>,
    rasterizers: RasterizerChain,
}

impl Exporter {
    /// Exporter with the default strict → lenient scene rasterizer chain.
    pub fn new(surface: Arc<dyn VisualSurface>, sink: Arc<dyn DocumentSink>) -> Self {
        Self {
            surface,
            sink,
            rasterizers: RasterizerChain::default(),
        }
    }

    pub fn with_rasterizers(mut self, rasterizers: RasterizerChain) -> Self {
        self.rasterizers = rasterizers;
        self
    }

    /// Capture `request.target` and save it as a paginated PDF.
    ///
    /// Must be polled inside a Tokio runtime: image probing runs on
    /// `tokio::task::spawn_blocking`, which panics without one. Executors
    /// such as `futures::executor::block_on` are not enough.
    pub async fn export_document(&self, request: &CaptureRequest) -> Result<ExportReport> {
        let surface = self.surface.as_ref();
        let target = match request.target {
            Some(t) if surface.is_attached(t) => t,
            _ => return Err(ExportError::MissingTarget),
        };
        let raster_options = request.options.validate()?;

        if let Some(hook) = &request.before_capture {
            log::debug!("running before_capture hook");
            hook().await.map_err(ExportError::Hook)?;
        }

        let mut masked = mask::mask(surface, &request.options.hide_targets);
        let outcome = self
            .capture(surface, target, &request.options, &raster_options)
            .await;
        masked.restore();

        let after = run_hook(request.after_capture.as_ref()).await;
        match (outcome, after) {
            (Ok(report), Ok(())) => {
                log::info!(
                    "exported '{}' ({} page(s), {} bytes via `{}`)",
                    report.file_name,
                    report.page_count,
                    report.byte_len,
                    report.provider
                );
                Ok(report)
            }
            (Ok(report), Err(hook_err)) => {
                log::error!(
                    "after_capture failed after '{}' was saved: {hook_err:#}",
                    report.file_name
                );
                Err(ExportError::Hook(hook_err))
            }
            (Err(err), after) => {
                if let Err(hook_err) = after {
                    log::warn!("after_capture also failed: {hook_err:#}");
                }
                log::error!("export failed ({}): {err}", err.kind());
                Err(err)
            }
        }
    }

    /// Everything between masking and restoring.
    async fn capture(
        &self,
        surface: &dyn VisualSurface,
        target: ElementHandle,
        options: &ExportOptions,
        raster_options: &RasterOptions,
    ) -> Result<ExportReport> {
        let rendered = self
            .rasterizers
            .rasterize(
                surface,
                target,
                raster_options,
                options.force_fallback_provider,
            )
            .await?;

        let pixel_size = probe(&rendered.image).await?;

        let plan = compute_layout(&options.page, pixel_size.width, pixel_size.height)?;
        log::debug!(
            "layout: {} page(s), image {:.1}x{:.1} pt",
            plan.page_count,
            plan.rendered_image_width_pts,
            plan.rendered_image_height_pts
        );

        let bytes = render_pdf(
            &plan,
            &rendered.image,
            pixel_size,
            options.image_encoding,
            &options.effective_title(),
        )?;
        self.sink.save(&options.file_name, &bytes)?;

        Ok(ExportReport {
            file_name: options.file_name.clone(),
            page_count: plan.page_count,
            plan,
            provider: rendered.provider,
            pixel_size,
            byte_len: bytes.len(),
        })
    }
}

async fn run_hook(hook: Option<&CaptureHook>) -> anyhow::Result<()> {
    match hook {
        Some(hook) => {
            log::debug!("running after_capture hook");
            hook().await
        }
        None => Ok(()),
    }
}
