//! PDF renderer – places the captured raster on every page of a
//! [`PageLayoutPlan`] using `printpdf` (v0.8 ops-based API).
//!
//! The image is registered once as an XObject and drawn on each page shifted
//! up by that page's offset. The margins are then painted white so each page
//! shows only its own window of the strip.
//!
//! The raster is embedded at its full pixel size. PNG captures are stored
//! losslessly (Flate); JPEG captures are stored as DCT at the requested quality.

use printpdf::*;

use crate::error::{ExportError, Result};
use crate::pagination::PageLayoutPlan;
use crate::probe::{parse_data_uri, PixelSize};
use crate::raster::{ImageData, ImageEncoding};

const PT_TO_MM: f32 = 0.352778;

/// Render the paginated document and return the PDF bytes.
pub fn render_pdf(
    plan: &PageLayoutPlan,
    image: &ImageData,
    size: PixelSize,
    encoding: ImageEncoding,
    title: &str,
) -> Result<Vec<u8>> {
    let bytes = parse_data_uri(image.as_str()).map_err(ExportError::ImageDecode)?;

    let mut doc = PdfDocument::new(title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();
    let raw = RawImage::decode_from_bytes(&bytes, &mut warnings)
        .map_err(|e| ExportError::Emit(format!("cannot embed raster: {e}")))?;
    for w in &warnings {
        log::debug!("printpdf: {w:?}");
    }
    let xobj_id = doc.add_image(&raw);

    let page_w = plan.page_width_pts as f32;
    let page_h = plan.page_height_pts as f32;
    let margin = plan.margin_pts as f32;
    let rendered_w = plan.rendered_image_width_pts as f32;
    let rendered_h = plan.rendered_image_height_pts as f32;

    // At dpi=72 printpdf renders 1 px = 1 pt, so scale = desired_pt / px.
    let scale_x = rendered_w / size.width as f32;
    let scale_y = rendered_h / size.height as f32;

    let pages = plan
        .y_offsets_pts
        .iter()
        .map(|&offset| {
            let (x, y) = strip_origin(plan, offset);
            let mut ops = vec![Op::UseXobject {
                id: xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(x)),
                    translate_y: Some(Pt(y)),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            }];
            if margin > 0.0 {
                ops.extend(margin_bands(page_w, page_h, margin));
            }
            PdfPage::new(Mm(page_w * PT_TO_MM), Mm(page_h * PT_TO_MM), ops)
        })
        .collect();

    doc.with_pages(pages);
    let out = doc.save(&save_options(encoding), &mut Vec::new());
    log::debug!("rendered {} page(s), {} bytes", plan.page_count, out.len());
    Ok(out)
}

/// Bottom-left corner of the strip on the page showing `offset`.
///
/// PDF origin is bottom-left; the strip's top edge sits `margin - offset`
/// below the page top.
fn strip_origin(plan: &PageLayoutPlan, offset: f64) -> (f32, f32) {
    let top = plan.page_height_pts - (plan.margin_pts - offset);
    (
        plan.margin_pts as f32,
        (top - plan.rendered_image_height_pts) as f32,
    )
}

/// printpdf's defaults recompress every image as JPEG and shrink it under a
/// size cap; keep the capture's pixels and the requested encoding instead.
fn save_options(encoding: ImageEncoding) -> PdfSaveOptions {
    let (format, quality) = match encoding {
        ImageEncoding::Png => (ImageCompression::Flate, None),
        ImageEncoding::Jpeg { quality } => {
            (ImageCompression::Jpeg, Some(f32::from(quality) / 100.0))
        }
    };
    PdfSaveOptions {
        image_optimization: Some(ImageOptimizationOptions {
            quality,
            max_image_size: None,
            dither_greyscale: None,
            convert_to_greyscale: Some(false),
            auto_optimize: Some(false),
            format: Some(format),
        }),
        ..PdfSaveOptions::default()
    }
}

/// White fills over the four page margins.
fn margin_bands(page_w: f32, page_h: f32, margin: f32) -> Vec<Op> {
    let mut ops = vec![Op::SetFillColor {
        col: Color::Rgb(Rgb {
            r: 1.0,
            g: 1.0,
            b: 1.0,
            icc_profile: None,
        }),
    }];
    for (x1, y1, x2, y2) in [
        (0.0, page_h - margin, page_w, page_h),
        (0.0, 0.0, page_w, margin),
        (0.0, 0.0, margin, page_h),
        (page_w - margin, 0.0, page_w, page_h),
    ] {
        ops.push(filled_rect(x1, y1, x2, y2));
    }
    ops
}

fn filled_rect(x1: f32, y1: f32, x2: f32, y2: f32) -> Op {
    let corner = |x: f32, y: f32| LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    };
    Op::DrawPolygon {
        polygon: Polygon {
            rings: vec![PolygonRing {
                points: vec![corner(x1, y1), corner(x2, y1), corner(x2, y2), corner(x1, y2)],
            }],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        },
    }
}
