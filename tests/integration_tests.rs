//! Integration tests for the capture/export pipeline.
//!
//! These tests validate:
//! - Masked elements are restored on every exit path
//! - Fallback runs only when the primary rasterizer fails (or is skipped)
//! - Pagination of real exports
//! - Hook ordering and failure reporting
//! - The emitted PDF's pages and embedded image

use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use async_trait::async_trait;
use capture_forge::mask::MASK_PROPERTY;
use capture_forge::probe::PixelSize;
use capture_forge::raster::encode_canvas;
use capture_forge::sink::{DirectorySink, DocumentSink, MemorySink};
use capture_forge::{
    hook, CaptureRequest, ElementHandle, ExportError, Exporter, ImageData, ImageEncoding,
    PageFormat, RasterOptions, Rasterizer, RasterizerChain, SceneRasterizer, SceneSurface,
    VisualSurface,
};
use image::{Rgba, RgbaImage};
use sha2::{Digest, Sha256};

// =====================================================================
// Helpers
// =====================================================================

const FORM: &str = r##"
    <div id="form" style="width: 100px; height: 300px; background-color: #fafafa">
        <div id="header" style="height: 40px; background-color: rgb(20, 40, 80)"></div>
        <button id="save" class="no-print" style="left: 10px; top: 250px; width: 30px; height: 20px; background: #00aa00; visibility: visible">Save</button>
        <button id="print" class="no-print" style="left: 50px; top: 250px; width: 30px; height: 20px; background: #0000aa">Print</button>
        <div id="accent" style="top: 100px; height: 20px; background-color: #ff8800"></div>
    </div>
"##;

const ELEMENT_IDS: &[&str] = &["form", "header", "save", "print", "accent"];

/// Records warnings per thread so parallel tests can inspect their own.
struct WarningLog {
    records: Mutex<Vec<(ThreadId, String)>>,
}

static WARNINGS: WarningLog = WarningLog {
    records: Mutex::new(Vec::new()),
};

impl log::Log for WarningLog {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Warn
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            self.records
                .lock()
                .unwrap()
                .push((thread::current().id(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

fn init_logger() {
    if log::set_logger(&WARNINGS).is_ok() {
        log::set_max_level(log::LevelFilter::Warn);
    }
}

/// Warnings logged so far on the current thread. `#[tokio::test]` runs its
/// runtime on the test thread, so this covers everything the export logs
/// outside the blocking pool.
fn warnings_here() -> Vec<String> {
    let me = thread::current().id();
    WARNINGS
        .records
        .lock()
        .unwrap()
        .iter()
        .filter(|(id, _)| *id == me)
        .map(|(_, msg)| msg.clone())
        .collect()
}

/// Wraps a scene and records every style mutation.
struct RecordingSurface {
    scene: SceneSurface,
    writes: Mutex<Vec<(ElementHandle, String, Option<String>)>>,
}

impl RecordingSurface {
    fn new(html: &str) -> Arc<Self> {
        Arc::new(Self {
            scene: SceneSurface::from_html(html),
            writes: Mutex::new(Vec::new()),
        })
    }

    fn id(&self, id: &str) -> ElementHandle {
        self.scene.element_by_id(id).unwrap()
    }

    fn snapshot(&self) -> Vec<Option<String>> {
        ELEMENT_IDS
            .iter()
            .map(|id| self.scene.style_attribute(self.id(id)))
            .collect()
    }

    fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    fn visibility(&self, id: &str) -> Option<String> {
        self.scene.style_property(self.id(id), MASK_PROPERTY)
    }
}

impl VisualSurface for RecordingSurface {
    fn query_selector_all(&self, selector: &str) -> Vec<ElementHandle> {
        self.scene.query_selector_all(selector)
    }
    fn is_attached(&self, element: ElementHandle) -> bool {
        self.scene.is_attached(element)
    }
    fn children(&self, element: ElementHandle) -> Vec<ElementHandle> {
        self.scene.children(element)
    }
    fn style_property(&self, element: ElementHandle, property: &str) -> Option<String> {
        self.scene.style_property(element, property)
    }
    fn set_style_property(&self, element: ElementHandle, property: &str, value: Option<&str>) {
        self.writes.lock().unwrap().push((
            element,
            property.to_string(),
            value.map(str::to_string),
        ));
        self.scene.set_style_property(element, property, value);
    }
}

type Events = Arc<Mutex<Vec<String>>>;

fn events() -> Events {
    Arc::new(Mutex::new(Vec::new()))
}

fn push(events: &Events, e: impl Into<String>) {
    events.lock().unwrap().push(e.into());
}

fn taken(events: &Events) -> Vec<String> {
    events.lock().unwrap().clone()
}

/// Test rasterizer: records calls and whether `#save` was hidden at the time.
struct Scripted {
    name: &'static str,
    outcome: Outcome,
    events: Events,
}

enum Outcome {
    Fail(&'static str),
    Blank { width: u32, height: u32 },
    Garbage,
    Hang,
}

impl Scripted {
    fn new(name: &'static str, outcome: Outcome, events: &Events) -> Arc<Self> {
        Arc::new(Self {
            name,
            outcome,
            events: events.clone(),
        })
    }
}

#[async_trait]
impl Rasterizer for Scripted {
    fn name(&self) -> &str {
        self.name
    }

    async fn rasterize(
        &self,
        surface: &dyn VisualSurface,
        _target: ElementHandle,
        options: &RasterOptions,
    ) -> anyhow::Result<ImageData> {
        let hidden = surface
            .query_selector_all("#save")
            .first()
            .and_then(|el| surface.style_property(*el, MASK_PROPERTY))
            .is_some_and(|v| v == "hidden");
        push(&self.events, format!("{}:hidden={hidden}", self.name));
        match self.outcome {
            Outcome::Fail(msg) => Err(anyhow::anyhow!(msg)),
            Outcome::Blank { width, height } => {
                let canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
                encode_canvas(canvas, options.encoding)
            }
            Outcome::Garbage => Ok(ImageData::from_encoded("image/png", b"not an image")),
            Outcome::Hang => futures::future::pending().await,
        }
    }
}

/// Hooks that log their invocation and what they saw of `#save`.
fn logging_hook(
    name: &'static str,
    surface: &Arc<RecordingSurface>,
    events: &Events,
    fail: bool,
) -> capture_forge::CaptureHook {
    let surface = surface.clone();
    let events = events.clone();
    hook(move || {
        let seen = surface.visibility("save");
        let events = events.clone();
        async move {
            push(&events, format!("{name}:save={}", seen.as_deref().unwrap_or("-")));
            if fail {
                anyhow::bail!("{name} exploded");
            }
            Ok(())
        }
    })
}

fn exporter(
    surface: &Arc<RecordingSurface>,
    sink: &Arc<MemorySink>,
    chain: Option<RasterizerChain>,
) -> Exporter {
    let exporter = Exporter::new(surface.clone(), sink.clone());
    match chain {
        Some(chain) => exporter.with_rasterizers(chain),
        None => exporter,
    }
}

fn base_request(surface: &RecordingSurface) -> CaptureRequest {
    CaptureRequest::new(surface.id("form"))
        .with_page_format(PageFormat::Custom {
            width_pt: 100.0,
            height_pt: 120.0,
        })
        .with_margin(10.0)
        .with_scale_factor(1.0)
        .hide(".no-print")
}

fn count(haystack: &[u8], needle: &[u8]) -> usize {
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn assert_valid_pdf(bytes: &[u8], pages: usize) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
    let page_objects = count(bytes, b"/Type/Page") - count(bytes, b"/Type/Pages");
    assert_eq!(page_objects, pages, "page objects");
}

/// The captured raster is embedded at its own pixel size with `filter`.
fn assert_embedded_image(bytes: &[u8], size: PixelSize, filter: &str) {
    let dims = format!("/Subtype/Image/Width {}/Height {}", size.width, size.height);
    assert!(count(bytes, dims.as_bytes()) >= 1, "no image XObject of {dims}");
    assert!(count(bytes, format!("/Filter/{filter}").as_bytes()) >= 1);
}

// =====================================================================
// Happy path
// =====================================================================

#[tokio::test]
async fn export_masks_paginates_and_restores() {
    init_logger();
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let log = events();
    let warned = warnings_here().len();

    let request = base_request(&surface)
        .with_file_name("claim.pdf")
        .before_capture(logging_hook("before", &surface, &log, false))
        .after_capture(logging_hook("after", &surface, &log, false));
    let report = exporter(&surface, &sink, None)
        .export_document(&request)
        .await
        .unwrap();

    // 100x300 px on an 80x100 pt usable area -> 80x240 pt strip -> 3 pages.
    assert_eq!(report.provider, "scene-strict");
    assert_eq!(report.pixel_size, PixelSize { width: 100, height: 300 });
    assert_eq!(report.page_count, 3);
    assert_eq!(report.plan.y_offsets_pts, vec![0.0, 100.0, 200.0]);

    assert_eq!(surface.snapshot(), before);
    assert_eq!(
        taken(&log),
        ["before:save=visible", "after:save=visible"],
        "hooks must see the unmasked surface"
    );

    let files = sink.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].0, "claim.pdf");
    assert_valid_pdf(&files[0].1, 3);
    assert_embedded_image(&files[0].1, report.pixel_size, "FlateDecode");
    assert_eq!(count(&files[0].1, b"/DCTDecode"), 0, "PNG capture must stay lossless");
    assert_eq!(report.byte_len, files[0].1.len());
    assert!(warnings_here()[warned..].is_empty());
}

#[tokio::test]
async fn rasterizer_sees_masked_surface() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new(
        "only",
        Outcome::Blank { width: 10, height: 10 },
        &log,
    )]);

    exporter(&surface, &sink, Some(chain))
        .export_document(&base_request(&surface))
        .await
        .unwrap();
    assert_eq!(taken(&log), ["only:hidden=true"]);
    assert_eq!(surface.visibility("save").as_deref(), Some("visible"));
    assert_eq!(surface.visibility("print"), None);
}

#[tokio::test]
async fn tall_raster_spills_onto_second_page() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new(
        "fixed",
        Outcome::Blank { width: 1000, height: 2000 },
        &log,
    )]);
    let request = CaptureRequest::new(surface.id("form"))
        .with_page_format(PageFormat::Custom {
            width_pt: 500.0,
            height_pt: 700.0,
        })
        .with_margin(0.0);

    let report = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap();
    assert_eq!(report.plan.rendered_image_height_pts, 1000.0);
    assert_eq!(report.page_count, 2);
}

#[tokio::test]
async fn exactly_fitting_raster_is_one_page() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new(
        "fixed",
        Outcome::Blank { width: 1000, height: 1400 },
        &log,
    )]);
    let request = CaptureRequest::new(surface.id("form"))
        .with_page_format(PageFormat::Custom {
            width_pt: 500.0,
            height_pt: 700.0,
        })
        .with_margin(0.0);

    let report = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap();
    assert_eq!(report.page_count, 1);
}

// =====================================================================
// Fallback policy
// =====================================================================

#[tokio::test]
async fn exotic_color_falls_back_to_lenient_rasterizer() {
    init_logger();
    let surface = RecordingSurface::new(FORM);
    surface.scene.set_style_property(
        surface.id("accent"),
        "background-color",
        Some("oklch(70% 0.15 60)"),
    );
    let sink = Arc::new(MemorySink::new());
    let warned = warnings_here().len();

    let report = exporter(&surface, &sink, None)
        .export_document(&base_request(&surface))
        .await
        .unwrap();
    assert_eq!(report.provider, "scene-lenient");
    assert_eq!(sink.files().len(), 1);

    let new_warnings = &warnings_here()[warned..];
    assert_eq!(new_warnings.len(), 1, "{new_warnings:?}");
    assert!(new_warnings[0].contains("scene-strict"));
    assert!(new_warnings[0].contains("unsupported color function"));
}

#[tokio::test]
async fn forced_fallback_with_single_rasterizer_warns_and_uses_it() {
    init_logger();
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new(
        "only",
        Outcome::Blank { width: 8, height: 8 },
        &log,
    )]);
    let warned = warnings_here().len();

    let report = exporter(&surface, &sink, Some(chain))
        .export_document(&base_request(&surface).force_fallback_provider(true))
        .await
        .unwrap();
    assert_eq!(report.provider, "only");
    assert_eq!(taken(&log), ["only:hidden=true"]);

    let new_warnings = &warnings_here()[warned..];
    assert_eq!(new_warnings.len(), 1, "{new_warnings:?}");
    assert!(new_warnings[0].contains("only rasterizer"));
}

#[tokio::test]
async fn fallback_runs_only_after_primary_failure() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());

    let log = events();
    let ok_chain = RasterizerChain::with_fallback(
        Scripted::new("primary", Outcome::Blank { width: 8, height: 8 }, &log),
        Scripted::new("fallback", Outcome::Blank { width: 8, height: 8 }, &log),
    );
    let report = exporter(&surface, &sink, Some(ok_chain))
        .export_document(&base_request(&surface))
        .await
        .unwrap();
    assert_eq!(report.provider, "primary");
    assert_eq!(taken(&log), ["primary:hidden=true"]);

    let log = events();
    let failing_chain = RasterizerChain::with_fallback(
        Scripted::new("primary", Outcome::Fail("unsupported color function"), &log),
        Scripted::new("fallback", Outcome::Blank { width: 8, height: 8 }, &log),
    );
    let report = exporter(&surface, &sink, Some(failing_chain))
        .export_document(&base_request(&surface))
        .await
        .unwrap();
    assert_eq!(report.provider, "fallback");
    assert_eq!(taken(&log), ["primary:hidden=true", "fallback:hidden=true"]);
}

#[tokio::test]
async fn forced_fallback_never_calls_primary() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::with_fallback(
        Scripted::new("primary", Outcome::Blank { width: 8, height: 8 }, &log),
        Scripted::new("fallback", Outcome::Blank { width: 8, height: 8 }, &log),
    );
    let report = exporter(&surface, &sink, Some(chain))
        .export_document(&base_request(&surface).force_fallback_provider(true))
        .await
        .unwrap();
    assert_eq!(report.provider, "fallback");
    assert_eq!(taken(&log), ["fallback:hidden=true"]);
}

#[tokio::test]
async fn both_rasterizers_failing_restores_and_runs_after_hook() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let log = events();
    let chain = RasterizerChain::with_fallback(
        Scripted::new("primary", Outcome::Fail("unsupported color function"), &log),
        Scripted::new("fallback", Outcome::Fail("canvas allocation failed"), &log),
    );
    let request = base_request(&surface).after_capture(logging_hook("after", &surface, &log, false));

    let err = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap_err();
    match &err {
        ExportError::Rasterization { provider, cause } => {
            assert_eq!(provider, "fallback");
            assert!(cause.contains("canvas allocation failed"));
        }
        other => panic!("expected rasterization error, got {other:?}"),
    }
    assert_eq!(surface.snapshot(), before);
    assert!(taken(&log).contains(&"after:save=visible".to_string()));
    assert!(sink.files().is_empty());
}

// =====================================================================
// Preconditions and eager validation
// =====================================================================

#[tokio::test]
async fn missing_target_touches_nothing() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let mut request = base_request(&surface)
        .before_capture(logging_hook("before", &surface, &log, false))
        .after_capture(logging_hook("after", &surface, &log, false));
    request.target = None;

    let err = exporter(&surface, &sink, None)
        .export_document(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::MissingTarget));
    assert_eq!(surface.write_count(), 0);
    assert!(taken(&log).is_empty());
}

#[tokio::test]
async fn detached_target_is_missing() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let request = base_request(&surface);
    surface.scene.detach(surface.id("form"));

    let err = exporter(&surface, &sink, None)
        .export_document(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "missing_target");
    assert_eq!(surface.write_count(), 0);
}

#[tokio::test]
async fn margins_wider_than_page_fail_before_any_capture() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new(
        "only",
        Outcome::Blank { width: 8, height: 8 },
        &log,
    )]);
    let request = base_request(&surface)
        .with_margin(50.0)
        .before_capture(logging_hook("before", &surface, &log, false))
        .after_capture(logging_hook("after", &surface, &log, false));

    let err = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidLayout(_)));
    assert!(taken(&log).is_empty(), "no hook or rasterizer may run");
    assert_eq!(surface.write_count(), 0);
}

#[tokio::test]
async fn invalid_scale_factor_is_rejected_up_front() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let err = exporter(&surface, &sink, None)
        .export_document(&base_request(&surface).with_scale_factor(-1.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_request");
    assert_eq!(surface.write_count(), 0);
}

// =====================================================================
// Hooks
// =====================================================================

#[tokio::test]
async fn before_hook_failure_aborts_without_masking() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let request = base_request(&surface)
        .before_capture(logging_hook("before", &surface, &log, true))
        .after_capture(logging_hook("after", &surface, &log, false));

    let err = exporter(&surface, &sink, None)
        .export_document(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Hook(_)));
    assert_eq!(err.to_string(), "before exploded");
    assert_eq!(taken(&log), ["before:save=visible"]);
    assert_eq!(surface.write_count(), 0);
}

#[tokio::test]
async fn after_hook_failure_still_restores_first() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let log = events();
    let request = base_request(&surface).after_capture(logging_hook("after", &surface, &log, true));

    let err = exporter(&surface, &sink, None)
        .export_document(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::Hook(_)));
    assert_eq!(taken(&log), ["after:save=visible"]);
    assert_eq!(surface.snapshot(), before);
    // The document was already emitted when the hook ran.
    assert_eq!(sink.files().len(), 1);
}

#[tokio::test]
async fn after_hook_failure_does_not_mask_export_error() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new("only", Outcome::Garbage, &log)]);
    let request = base_request(&surface).after_capture(logging_hook("after", &surface, &log, true));

    let err = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::ImageDecode(_)));
}

// =====================================================================
// Failures past masking
// =====================================================================

#[tokio::test]
async fn undecodable_raster_restores_surface() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new("only", Outcome::Garbage, &log)]);
    let request = base_request(&surface).after_capture(logging_hook("after", &surface, &log, false));

    let err = exporter(&surface, &sink, Some(chain))
        .export_document(&request)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "image_decode");
    assert_eq!(surface.snapshot(), before);
    assert_eq!(taken(&log), ["only:hidden=true", "after:save=visible"]);
    assert!(sink.files().is_empty());
}

struct BrokenSink;

impl DocumentSink for BrokenSink {
    fn save(&self, _file_name: &str, _bytes: &[u8]) -> capture_forge::Result<()> {
        Err(ExportError::Emit("disk full".into()))
    }
}

#[tokio::test]
async fn sink_failure_restores_surface() {
    let surface = RecordingSurface::new(FORM);
    let before = surface.snapshot();
    let exporter = Exporter::new(surface.clone(), Arc::new(BrokenSink));

    let err = exporter
        .export_document(&base_request(&surface))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "emit");
    assert_eq!(surface.snapshot(), before);
}

#[tokio::test]
async fn dropped_export_still_restores_surface() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let log = events();
    let chain = RasterizerChain::new(vec![Scripted::new("stuck", Outcome::Hang, &log)]);
    let exporter = exporter(&surface, &sink, Some(chain));
    let request = base_request(&surface);

    let res = tokio::time::timeout(Duration::from_millis(50), exporter.export_document(&request)).await;
    assert!(res.is_err(), "export should still be pending");
    assert_eq!(taken(&log), ["stuck:hidden=true"]);
    assert_eq!(surface.snapshot(), before);
}

// =====================================================================
// Output formats and sinks
// =====================================================================

#[tokio::test]
async fn jpeg_export_to_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let surface = Arc::new(SceneSurface::from_html(FORM));
    let target = surface.element_by_id("form").unwrap();
    let exporter = Exporter::new(surface, Arc::new(DirectorySink::new(tmp.path())));

    let request = CaptureRequest::new(target)
        .with_file_name("scan.pdf")
        .with_image_encoding(ImageEncoding::Jpeg { quality: 75 })
        .with_background_color("#eeeeee");
    let report = exporter.export_document(&request).await.unwrap();
    // Default scale 2 and A4: 200x600 px -> ~515x1546 pt strip over 762 pt pages.
    assert_eq!(report.pixel_size, PixelSize { width: 200, height: 600 });
    assert_eq!(report.page_count, 3);

    let bytes = std::fs::read(tmp.path().join("scan.pdf")).unwrap();
    assert_valid_pdf(&bytes, 3);
    assert_embedded_image(&bytes, report.pixel_size, "DCTDecode");
}

#[test]
fn export_outside_tokio_panics_but_still_restores() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let before = surface.snapshot();
    let exporter = exporter(&surface, &sink, None);
    let request = base_request(&surface);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        futures::executor::block_on(exporter.export_document(&request))
    }));
    assert!(outcome.is_err(), "probing needs a Tokio runtime");
    assert_eq!(surface.snapshot(), before);
    assert!(sink.files().is_empty());
}

#[test]
fn export_runs_on_a_plain_current_thread_runtime() {
    let surface = RecordingSurface::new(FORM);
    let sink = Arc::new(MemorySink::new());
    let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let report = runtime
        .block_on(exporter(&surface, &sink, None).export_document(&base_request(&surface)))
        .unwrap();
    assert_eq!(report.page_count, 3);
}

#[tokio::test]
async fn masking_changes_the_raster_deterministically() {
    let surface = SceneSurface::from_html(FORM);
    let form = surface.element_by_id("form").unwrap();
    let opts = RasterOptions::default();
    let digest = |data: &ImageData| hex_digest(data.as_str().as_bytes());

    let raster = SceneRasterizer::strict();
    let plain_a = raster.rasterize(&surface, form, &opts).await.unwrap();
    let plain_b = raster.rasterize(&surface, form, &opts).await.unwrap();
    assert_eq!(digest(&plain_a), digest(&plain_b));

    let masked = {
        let mut token = capture_forge::mask::mask(&surface, &[".no-print".into()]);
        let image = raster.rasterize(&surface, form, &opts).await.unwrap();
        token.restore();
        image
    };
    assert_ne!(digest(&plain_a), digest(&masked));
}

fn hex_digest(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
