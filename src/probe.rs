//! Image probing – intrinsic pixel size of a produced raster.
//!
//! Decoding is CPU-bound, so it runs on tokio's blocking pool and the caller
//! suspends until the image is fully decoded. Any failure is fatal for the
//! export; there is no zero-size fallback.

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::raster::ImageData;

/// Natural size of a decoded raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// Decode `image` and report its intrinsic size.
pub async fn probe(image: &ImageData) -> Result<PixelSize> {
    let bytes = parse_data_uri(image.as_str()).map_err(ExportError::ImageDecode)?;
    let decoded = tokio::task::spawn_blocking(move || ::image::load_from_memory(&bytes))
        .await
        .map_err(|e| ExportError::ImageDecode(format!("decode task failed: {e}")))?
        .map_err(|e| ExportError::ImageDecode(e.to_string()))?;

    let size = PixelSize {
        width: decoded.width(),
        height: decoded.height(),
    };
    if size.width == 0 || size.height == 0 {
        return Err(ExportError::ImageDecode(format!(
            "decoded image is empty ({}x{})",
            size.width, size.height
        )));
    }
    log::debug!("probed raster: {}x{} px", size.width, size.height);
    Ok(size)
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
///
/// Returns `Err` if `src` is not a data URI or does not use base64 encoding.
pub fn parse_data_uri(src: &str) -> std::result::Result<Vec<u8>, String> {
    let Some(rest) = src.strip_prefix("data:") else {
        let preview: String = src.chars().take(80).collect();
        return Err(format!("image is not a data URI: {preview:?}"));
    };
    let (header, data) = rest
        .split_once(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    if !header.split(';').any(|p| p == "base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(data.trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}
