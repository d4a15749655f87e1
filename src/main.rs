//! capture – command-line scene → paginated PDF exporter.
//!
//! Usage:
//!   capture <scene.html> <target-id> [output.pdf] [--options opts.json]
//!           [--hide SELECTOR]... [--landscape] [--title "My Report"] [--fallback]
//!
//! If `output.pdf` is omitted the PDF is written next to the scene file with
//! the same stem (e.g. `claim.html` → `claim.pdf`).

use std::{env, fs, path::PathBuf, process, sync::Arc};

use capture_forge::sink::DirectorySink;
use capture_forge::{CaptureRequest, ExportOptions, Exporter, PageOrientation, SceneSurface};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut positional: Vec<String> = Vec::new();
    let mut options_path: Option<PathBuf> = None;
    let mut hide: Vec<String> = Vec::new();
    let mut landscape = false;
    let mut title: Option<String> = None;
    let mut fallback = false;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--landscape" | "-l" => landscape = true,
            "--fallback" => fallback = true,
            "--title" | "-t" => title = Some(flag_value(&mut iter, arg, &args[0])),
            "--hide" => hide.push(flag_value(&mut iter, arg, &args[0])),
            "--options" | "-o" => {
                options_path = Some(PathBuf::from(flag_value(&mut iter, arg, &args[0])))
            }
            "--help" | "-h" => {
                print_usage(&args[0]);
                process::exit(0);
            }
            other if other.starts_with('-') => {
                eprintln!("Unknown flag: {other}");
                print_usage(&args[0]);
                process::exit(1);
            }
            value => positional.push(value.to_string()),
        }
    }

    let (input, target_id, output) = match positional.as_slice() {
        [input, target] => {
            let mut out = PathBuf::from(input);
            out.set_extension("pdf");
            (PathBuf::from(input), target.clone(), out)
        }
        [input, target, out] => (PathBuf::from(input), target.clone(), PathBuf::from(out)),
        _ => {
            eprintln!("Error: expected a scene file and a target id.");
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let html = fs::read_to_string(&input).unwrap_or_else(|e| {
        eprintln!("Error reading '{}': {e}", input.display());
        process::exit(1);
    });

    let mut options = match &options_path {
        Some(path) => {
            let json = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading '{}': {e}", path.display());
                process::exit(1);
            });
            ExportOptions::from_json(&json).unwrap_or_else(|e| {
                eprintln!("Error in '{}': {e}", path.display());
                process::exit(1);
            })
        }
        None => ExportOptions::default(),
    };
    if let Some(name) = output.file_name().and_then(|n| n.to_str()) {
        options.file_name = name.to_string();
    }
    if let Some(title) = title {
        options.title = Some(title);
    }
    if landscape {
        options.page.orientation = PageOrientation::Landscape;
    }
    options.force_fallback_provider |= fallback;

    let surface = Arc::new(SceneSurface::from_html(&html));
    let Some(target) = surface.element_by_id(&target_id) else {
        eprintln!("Error: no element with id '{target_id}' in '{}'", input.display());
        process::exit(1);
    };

    let mut request = CaptureRequest::new(target).with_options(options);
    for selector in &hide {
        request = request.hide(selector.as_str());
    }

    let out_dir = match output.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let exporter = Exporter::new(surface, Arc::new(DirectorySink::new(out_dir)));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Error starting runtime: {e}");
            process::exit(1);
        });

    match runtime.block_on(exporter.export_document(&request)) {
        Ok(report) => {
            let pages = report.page_count;
            eprintln!(
                "Wrote '{}' ({} bytes, {} page{}, via {})",
                output.display(),
                report.byte_len,
                pages,
                if pages == 1 { "" } else { "s" },
                report.provider
            );
        }
        Err(e) => {
            eprintln!("Error exporting PDF ({}): {e}", e.kind());
            process::exit(1);
        }
    }
}

fn flag_value<'a>(iter: &mut impl Iterator<Item = &'a String>, flag: &str, prog: &str) -> String {
    match iter.next() {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {flag}");
            print_usage(prog);
            process::exit(1);
        }
    }
}

fn print_usage(prog: &str) {
    eprintln!("capture – scene to paginated PDF exporter (capture-forge)");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  {prog} <scene.html> <target-id> [output.pdf] [flags]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  <scene.html>   Scene markup (inline left/top/width/height and background colours)");
    eprintln!("  <target-id>    id attribute of the element to capture");
    eprintln!("  [output.pdf]   Output path  (default: same stem as the scene with .pdf)");
    eprintln!();
    eprintln!("Flags:");
    eprintln!("  --options, -o  JSON export options (page, scale_factor, image_encoding, ...)");
    eprintln!("  --hide         Selector to hide while capturing (repeatable)");
    eprintln!("  --title, -t    Document title in PDF metadata (default: output filename stem)");
    eprintln!("  --landscape    Use landscape page orientation");
    eprintln!("  --fallback     Skip the strict rasterizer");
    eprintln!("  --help         Print this message");
}
