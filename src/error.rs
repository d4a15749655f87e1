//! Error types for the capture/export pipeline.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Everything that can make an export fail.
///
/// The first four variants are the pipeline's own taxonomy; the remaining
/// ones cover configuration and the external collaborators (hooks, sinks).
#[derive(Error, Debug)]
pub enum ExportError {
    /// The request carried no target, or the target is no longer attached to
    /// the surface. Raised before any hook runs or any element is touched.
    #[error("capture target is missing or detached")]
    MissingTarget,

    /// Every provider in the chain failed. `provider` names the last one
    /// attempted and `cause` its failure.
    #[error("rasterization failed ({provider}): {cause}")]
    Rasterization { provider: String, cause: String },

    /// The raster produced by a provider could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// Page geometry leaves no drawable area, or the image has no extent.
    #[error("invalid page layout: {0}")]
    InvalidLayout(String),

    /// A request option is out of range (scale factor, colour, quality).
    #[error("invalid export request: {0}")]
    InvalidRequest(String),

    /// A `before_capture` / `after_capture` hook failed.
    #[error(transparent)]
    Hook(anyhow::Error),

    /// PDF serialisation or the file sink failed.
    #[error("failed to emit document: {0}")]
    Emit(String),
}

impl ExportError {
    pub fn rasterization(provider: impl Into<String>, cause: impl Into<String>) -> Self {
        ExportError::Rasterization {
            provider: provider.into(),
            cause: cause.into(),
        }
    }

    /// Short machine-friendly name of the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::MissingTarget => "missing_target",
            ExportError::Rasterization { .. } => "rasterization",
            ExportError::ImageDecode(_) => "image_decode",
            ExportError::InvalidLayout(_) => "invalid_layout",
            ExportError::InvalidRequest(_) => "invalid_request",
            ExportError::Hook(_) => "hook",
            ExportError::Emit(_) => "emit",
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::Emit(err.to_string())
    }
}
