//! Rasterization – turning a surface subtree into an encoded bitmap.
//!
//! Providers implement [`Rasterizer`]; [`RasterizerChain`] owns the selection
//! policy: try providers in order and stop at the first success. The first
//! entry is the primary provider, and a request may skip it outright.
//!
//! [`SceneRasterizer`] paints the absolutely positioned boxes of any
//! [`VisualSurface`]. Its strict flavour rejects colours it cannot parse;
//! the lenient flavour leaves such boxes unpainted.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, Pixel, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ExportError, Result};
use crate::style::{parse_color, Color};
use crate::surface::{ElementHandle, VisualSurface};

/// Largest raster edge, in pixels, a scene rasterizer will allocate.
pub const MAX_RASTER_EDGE_PX: u32 = 16_384;

/// Raster encoding of the captured image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum ImageEncoding {
    /// Lossless.
    #[default]
    Png,
    /// Lossy, quality 1–100.
    Jpeg { quality: u8 },
}

impl ImageEncoding {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageEncoding::Png => "image/png",
            ImageEncoding::Jpeg { .. } => "image/jpeg",
        }
    }
}

/// Options every provider must honour.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterOptions {
    /// Raster pixels per on-screen pixel.
    pub scale_factor: f32,
    /// Fill behind transparent regions.
    pub background_color: Color,
    pub encoding: ImageEncoding,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1.0,
            background_color: Color::WHITE,
            encoding: ImageEncoding::Png,
        }
    }
}

/// An encoded raster image as a `data:<mime>;base64,` URI.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData(String);

impl ImageData {
    pub fn from_encoded(mime_type: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{mime_type};base64,{}", BASE64_STD.encode(bytes)))
    }

    /// Wrap an existing data URI without validating it.
    pub fn from_data_uri(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ImageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.0.split(',').next().unwrap_or_default();
        write!(f, "ImageData({head}, {} bytes)", self.0.len())
    }
}

/// A capability that can rasterize a surface subtree.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Provider name, used in logs and errors.
    fn name(&self) -> &str;

    async fn rasterize(
        &self,
        surface: &dyn VisualSurface,
        target: ElementHandle,
        options: &RasterOptions,
    ) -> anyhow::Result<ImageData>;
}

/// Output of a successful chain run.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub image: ImageData,
    /// Name of the provider that produced `image`.
    pub provider: String,
}

/// Ordered provider list with short-circuit on the first success.
#[derive(Clone)]
pub struct RasterizerChain {
    providers: Vec<Arc<dyn Rasterizer>>,
}

impl RasterizerChain {
    pub fn new(providers: Vec<Arc<dyn Rasterizer>>) -> Self {
        Self { providers }
    }

    pub fn with_fallback(primary: Arc<dyn Rasterizer>, fallback: Arc<dyn Rasterizer>) -> Self {
        Self::new(vec![primary, fallback])
    }

    /// Run the chain. With `skip_primary`, the first provider is not
    /// attempted (unless it is the only one).
    ///
    /// Failures of all but the last attempted provider are logged as
    /// warnings; the last one becomes [`ExportError::Rasterization`].
    pub async fn rasterize(
        &self,
        surface: &dyn VisualSurface,
        target: ElementHandle,
        options: &RasterOptions,
        skip_primary: bool,
    ) -> Result<Rendered> {
        let skip = usize::from(skip_primary && self.providers.len() > 1);
        let candidates = &self.providers[skip..];
        let Some((last, earlier)) = candidates.split_last() else {
            return Err(ExportError::rasterization("none", "no rasterizer configured"));
        };
        if skip == 1 {
            log::debug!("skipping primary rasterizer `{}`", self.providers[0].name());
        } else if skip_primary {
            log::warn!(
                "fallback forced but `{}` is the only rasterizer; using it",
                last.name()
            );
        }

        for provider in earlier {
            match provider.rasterize(surface, target, options).await {
                Ok(image) => return Ok(rendered(provider.as_ref(), image)),
                Err(err) => log::warn!(
                    "rasterizer `{}` failed, falling back: {err:#}",
                    provider.name()
                ),
            }
        }
        match last.rasterize(surface, target, options).await {
            Ok(image) => Ok(rendered(last.as_ref(), image)),
            Err(err) => Err(ExportError::rasterization(last.name(), format!("{err:#}"))),
        }
    }
}

impl Default for RasterizerChain {
    /// Strict scene rasterizer, falling back to the lenient one.
    fn default() -> Self {
        Self::with_fallback(
            Arc::new(SceneRasterizer::strict()),
            Arc::new(SceneRasterizer::lenient()),
        )
    }
}

fn rendered(provider: &dyn Rasterizer, image: ImageData) -> Rendered {
    log::debug!("rasterized with `{}`: {image:?}", provider.name());
    Rendered {
        image,
        provider: provider.name().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Scene rasterizer
// ---------------------------------------------------------------------------

/// Paints element boxes from inline geometry (`left`, `top`, `width`,
/// `height`, in px relative to the parent box) and `background-color`.
///
/// `display: none` drops a subtree; `visibility` inherits and `hidden` /
/// `collapse` suppress painting of a box while its children may still
/// override with `visible`.
#[derive(Debug, Clone)]
pub struct SceneRasterizer {
    strict_colors: bool,
}

impl SceneRasterizer {
    /// Fails on any colour it cannot parse.
    pub fn strict() -> Self {
        Self {
            strict_colors: true,
        }
    }

    /// Skips boxes whose colour it cannot parse.
    pub fn lenient() -> Self {
        Self {
            strict_colors: false,
        }
    }

    /// Paint `target` into an RGBA canvas.
    pub fn paint(
        &self,
        surface: &dyn VisualSurface,
        target: ElementHandle,
        options: &RasterOptions,
    ) -> anyhow::Result<RgbaImage> {
        if !surface.is_attached(target) {
            anyhow::bail!("target {target:?} is not attached");
        }
        let px = |prop: &str| {
            surface
                .style_property(target, prop)
                .and_then(|v| crate::style::parse_px(&v))
        };
        let (width, height) = match (px("width"), px("height")) {
            (Some(w), Some(h)) if w > 0.0 && h > 0.0 => (w, h),
            _ => anyhow::bail!("target {target:?} has no positive width/height"),
        };
        let scale = options.scale_factor;
        let canvas_w = (width * scale).ceil();
        let canvas_h = (height * scale).ceil();
        if !(canvas_w >= 1.0 && canvas_h >= 1.0)
            || canvas_w > MAX_RASTER_EDGE_PX as f32
            || canvas_h > MAX_RASTER_EDGE_PX as f32
        {
            anyhow::bail!("raster size {canvas_w}x{canvas_h} px is out of range");
        }

        let mut canvas = RgbaImage::from_pixel(
            canvas_w as u32,
            canvas_h as u32,
            Rgba(options.background_color.to_rgba8()),
        );
        let root = BoxOrigin {
            x: 0.0,
            y: 0.0,
            width,
            visible: true,
        };
        self.paint_box(surface, target, &root, true, scale, &mut canvas)?;
        Ok(canvas)
    }

    fn paint_box(
        &self,
        surface: &dyn VisualSurface,
        element: ElementHandle,
        parent: &BoxOrigin,
        is_root: bool,
        scale: f32,
        canvas: &mut RgbaImage,
    ) -> anyhow::Result<()> {
        let prop = |name: &str| surface.style_property(element, name);
        let px = |name: &str| prop(name).and_then(|v| crate::style::parse_px(&v));

        if prop("display").is_some_and(|d| d.trim() == "none") {
            return Ok(());
        }
        let visible = match prop("visibility") {
            Some(v) => !matches!(v.trim(), "hidden" | "collapse"),
            None => parent.visible,
        };
        let (left, top) = if is_root {
            (0.0, 0.0)
        } else {
            (px("left").unwrap_or(0.0), px("top").unwrap_or(0.0))
        };
        let this = BoxOrigin {
            x: parent.x + left,
            y: parent.y + top,
            width: px("width").unwrap_or((parent.width - left).max(0.0)),
            visible,
        };
        let height = px("height").unwrap_or(0.0);

        let fill = match prop("background-color").or_else(|| prop("background")) {
            None => None,
            Some(value) => match parse_color(&value) {
                Ok(color) => Some(color),
                Err(msg) if self.strict_colors => anyhow::bail!("{msg}"),
                Err(msg) => {
                    log::debug!("leaving {element:?} unpainted: {msg}");
                    None
                }
            },
        };
        if let Some(color) = fill.filter(|c| visible && !c.is_transparent()) {
            fill_rect(canvas, &this, height, scale, color);
        }

        for child in surface.children(element) {
            self.paint_box(surface, child, &this, false, scale, canvas)?;
        }
        Ok(())
    }
}

struct BoxOrigin {
    x: f32,
    y: f32,
    width: f32,
    visible: bool,
}

fn fill_rect(canvas: &mut RgbaImage, rect: &BoxOrigin, height: f32, scale: f32, color: Color) {
    let clamp = |v: f32, max: u32| (v * scale).round().clamp(0.0, max as f32) as u32;
    let (x0, x1) = (clamp(rect.x, canvas.width()), clamp(rect.x + rect.width, canvas.width()));
    let (y0, y1) = (clamp(rect.y, canvas.height()), clamp(rect.y + height, canvas.height()));
    let src = Rgba(color.to_rgba8());
    for y in y0..y1 {
        for x in x0..x1 {
            canvas.get_pixel_mut(x, y).blend(&src);
        }
    }
}

/// Encode a painted canvas in the requested format.
pub fn encode_canvas(canvas: RgbaImage, encoding: ImageEncoding) -> anyhow::Result<ImageData> {
    let (w, h) = canvas.dimensions();
    let mut buf = Vec::new();
    match encoding {
        ImageEncoding::Png => {
            PngEncoder::new(&mut buf).write_image(canvas.as_raw(), w, h, ExtendedColorType::Rgba8)?
        }
        ImageEncoding::Jpeg { quality } => {
            let rgb = DynamicImage::ImageRgba8(canvas).to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality).write_image(
                rgb.as_raw(),
                w,
                h,
                ExtendedColorType::Rgb8,
            )?
        }
    }
    Ok(ImageData::from_encoded(encoding.mime_type(), &buf))
}

#[async_trait]
impl Rasterizer for SceneRasterizer {
    fn name(&self) -> &str {
        if self.strict_colors {
            "scene-strict"
        } else {
            "scene-lenient"
        }
    }

    async fn rasterize(
        &self,
        surface: &dyn VisualSurface,
        target: ElementHandle,
        options: &RasterOptions,
    ) -> anyhow::Result<ImageData> {
        let canvas = self.paint(surface, target, options)?;
        encode_canvas(canvas, options.encoding)
    }
}
