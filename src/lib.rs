//! # capture-forge – visual subtree → paginated PDF
//!
//! This crate captures a live visual subtree as a raster image and exports
//! it as a paginated PDF, hiding interactive chrome for the duration of the
//! capture. The pipeline stages are:
//!
//! 1. **Mask** – hide buttons and controls without reflowing ([`mask`])
//! 2. **Rasterize** – primary provider with fallback ([`raster`])
//! 3. **Probe** – decode the raster for its pixel size ([`probe`])
//! 4. **Paginate** – slice the image strip into pages ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`]) into a
//!    [`sink::DocumentSink`]
//!
//! [`pipeline::Exporter`] sequences the stages and guarantees that masked
//! elements are restored before the `after_capture` hook runs, on every
//! path. The element tree is reached only through [`surface::VisualSurface`];
//! [`surface::SceneSurface`] is an in-memory implementation built from markup.
//!
//! ## Runtime
//!
//! Exports are async and must run inside a Tokio runtime (the `rt` feature is
//! enough): decoding the captured raster is handed to Tokio's blocking pool.
//! Driving an export with another executor panics when probing starts.

pub mod dom;
pub mod error;
pub mod mask;
pub mod pagination;
pub mod pipeline;
pub mod probe;
pub mod raster;
pub mod render;
pub mod request;
pub mod sink;
pub mod style;
pub mod surface;

// Re-exports for convenience
pub use error::{ExportError, Result};
pub use pagination::{compute_layout, PageFormat, PageGeometry, PageLayoutPlan, PageOrientation};
pub use pipeline::{ExportReport, Exporter};
pub use raster::{ImageData, ImageEncoding, RasterOptions, Rasterizer, RasterizerChain, SceneRasterizer};
pub use request::{hook, CaptureHook, CaptureRequest, ExportOptions};
pub use surface::{ElementHandle, SceneSurface, VisualSurface};
