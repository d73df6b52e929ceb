// ============================================================================
// Sketchpad CLI: replay gesture scripts headlessly and export the result
// ============================================================================
//
// Usage examples:
//   sketchpad --script smiley.rhai --output smiley.png
//   sketchpad -s demo.rhai                          (writes sketch-YYYY-MM-DD.png)
//   sketchpad -s "scripts/*.rhai" --output-dir out/ --format jpeg -q 90
//   sketchpad -s touch_up.rhai --load drawing.skp --save-session drawing.skp
//
// Each script runs against its own fresh session on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::LayoutKind;
use crate::io::{self, ExportFormat};
use crate::ops::scripting::run_script;
use crate::session::Session;
use crate::settings::SketchSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Sketchpad headless renderer.
///
/// Run Rhai gesture scripts against a blank (or loaded) canvas and export
/// the drawing as PNG or JPEG.
#[derive(Parser, Debug)]
#[command(
    name = "sketchpad",
    about = "Sketchpad headless gesture-script renderer",
    long_about = "Replay Rhai gesture scripts (tool, color, down/move_to/up, undo, ...)\n\
                  against a sketch canvas and export the result.\n\n\
                  Example:\n  \
                  sketchpad --script smiley.rhai --output smiley.png\n  \
                  sketchpad -s \"scripts/*.rhai\" --output-dir out/ --format jpeg"
)]
pub struct CliArgs {
    /// Gesture script file(s). Glob patterns accepted (e.g. "scripts/*.rhai").
    #[arg(short, long, required = true, num_args = 1..)]
    pub script: Vec<String>,

    /// Output image path. Only valid for a single script.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch runs. Images are named after each script.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png or jpeg. Inferred from --output's extension when
    /// omitted, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100). Defaults to the configured quality.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Starting layout: portrait, landscape, 8bit, 16bit, two-column.
    #[arg(long, value_name = "NAME")]
    pub layout: Option<String>,

    /// Start from a saved session file instead of a blank canvas.
    #[arg(long, value_name = "FILE.skp")]
    pub load: Option<PathBuf>,

    /// Write the finished session to a session file. Single script only.
    #[arg(long, value_name = "FILE.skp")]
    pub save_session: Option<PathBuf>,

    /// Print script console output and per-script timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run every script and return an OS exit code.
/// `0` = all scripts succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let scripts = resolve_inputs(&args.script);
    if scripts.is_empty() {
        eprintln!("error: no script files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if scripts.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} scripts given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch runs.",
            scripts.len()
        );
        return ExitCode::FAILURE;
    }
    if scripts.len() > 1 && args.save_session.is_some() {
        eprintln!("error: --save-session only accepts a single script.");
        return ExitCode::FAILURE;
    }

    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let layout = match args.layout.as_deref().map(LayoutKind::from_name) {
        Some(None) => {
            eprintln!(
                "error: unknown layout '{}'.",
                args.layout.as_deref().unwrap_or_default()
            );
            return ExitCode::FAILURE;
        }
        Some(Some(kind)) => Some(kind),
        None => None,
    };

    let mut settings = SketchSettings::load();
    if let Some(q) = args.quality {
        settings.jpeg_quality = q.clamp(1, 100);
    }

    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let total = scripts.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, script_path) in scripts.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, script_path.display());
        }
        let start = Instant::now();

        let Some(output_path) = build_output_path(
            script_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
            multi,
        ) else {
            eprintln!("  error: cannot determine output path for '{}'.", script_path.display());
            any_failure = true;
            continue;
        };

        let job = Job {
            script: script_path,
            output: &output_path,
            format,
            layout,
            load: args.load.as_deref(),
            save_session: args.save_session.as_deref(),
            verbose: args.verbose,
        };
        match run_one(&job, settings.clone()) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-script pipeline
// ============================================================================

struct Job<'a> {
    script: &'a Path,
    output: &'a Path,
    format: ExportFormat,
    layout: Option<LayoutKind>,
    load: Option<&'a Path>,
    save_session: Option<&'a Path>,
    verbose: bool,
}

fn run_one(job: &Job<'_>, settings: SketchSettings) -> Result<(), String> {
    let source = std::fs::read_to_string(job.script)
        .map_err(|e| format!("could not read script: {}", e))?;

    // -- Step 1: Starting canvas -----------------------------------------
    let mut session = Session::new(settings);
    if let Some(kind) = job.layout {
        session.set_layout(kind);
    }
    if let Some(path) = job.load {
        io::load_session(&mut session, path).map_err(|e| format!("load failed: {}", e))?;
    }

    // -- Step 2: Replay gestures -----------------------------------------
    let outcome = run_script(&mut session, &source)
        .map_err(|e| format!("script error:\n{}", e.friendly_message()))?;
    if job.verbose {
        for line in &outcome.console_output {
            println!("  [script] {}", line);
        }
    }

    // -- Step 3: Export --------------------------------------------------
    io::export_to_file(&session, job.output, job.format).map_err(|e| format!("export failed: {}", e))?;

    if let Some(path) = job.save_session {
        io::save_session(&mut session, path).map_err(|e| format!("session save failed: {}", e))?;
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the format from `--format` or the output extension, defaulting to PNG.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<ExportFormat, String> {
    if let Some(f) = format_arg {
        return ExportFormat::from_name(f).ok_or_else(|| format!("unsupported format '{}'", f));
    }
    Ok(output.and_then(ExportFormat::from_path).unwrap_or_default())
}

/// Compute the output path for one script.
///
/// Priority:
/// 1. `--output` (explicit path, single script)
/// 2. `--output-dir` (script stem plus the format extension)
/// 3. Current directory, date-stamped (`sketch-YYYY-MM-DD.png`); batch runs
///    prefix the script stem so outputs don't collide
fn build_output_path(
    script: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ExportFormat,
    multi: bool,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = script.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, format.extension())));
    }

    let dated = io::default_export_filename(format);
    if multi {
        Some(PathBuf::from(format!("{}-{}", stem, dated)))
    } else {
        Some(PathBuf::from(dated))
    }
}
