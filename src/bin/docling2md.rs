//! CLI binary for docling2md.
//!
//! A thin shim over the library crate that maps CLI flags and environment
//! variables to `ConversionConfig`, builds the job list and prints the run
//! summary.

use anyhow::{Context, Result};
use clap::Parser;
use docling2md::job::{collect_images, stage_input};
use docling2md::{
    connect, run_with_client, ConversionConfig, ConversionJob, ConversionProgressCallback,
    Docling2MdError, ImageMode, NormalizerConfig, ProgressCallback, RunSummary, ServiceEndpoint,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for the run; the message shows the current job and how long its
/// request has been in flight.
struct CliProgressCallback {
    bar: ProgressBar,
    current: Mutex<String>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:32.green/238}] {pos:>3}/{len} jobs  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            current: Mutex::new(String::new()),
        })
    }

    fn current_label(&self) -> String {
        self.current.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_jobs: usize) {
        self.bar.set_length(total_jobs as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_jobs} job(s)…"))
        ));
    }

    fn on_job_start(&self, _index: usize, _total: usize, label: &str) {
        if let Ok(mut current) = self.current.lock() {
            *current = label.to_string();
        }
        self.bar.set_message(label.to_string());
    }

    fn on_attempt(&self, attempt: u32, max_attempts: u32) {
        if attempt > 1 {
            self.bar.println(format!(
                "  {} retry {attempt}/{max_attempts}  {}",
                cyan("↻"),
                dim(&self.current_label())
            ));
        }
    }

    fn on_heartbeat(&self, elapsed: Duration) {
        self.bar.set_message(format!(
            "{}  {}",
            self.current_label(),
            dim(&format!("{}s", elapsed.as_secs()))
        ));
    }

    fn on_job_complete(&self, index: usize, total: usize, markdown_len: usize) {
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}",
            green("✓"),
            index,
            total,
            self.current_label(),
            dim(&format!("{markdown_len:>7} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_job_error(&self, index: usize, total: usize, error: &str) {
        let msg = match error.char_indices().nth(100) {
            Some((idx, _)) => format!("{}\u{2026}", &error[..idx]),
            None => error.to_string(),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}",
            red("✗"),
            index,
            total,
            self.current_label(),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, _total_jobs: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert two PDFs against a local Docling Serve on port 5001
  docling2md --port 5001 report.pdf scan.pdf

  # Every PDF in a folder, images kept as compact WebP
  docling2md --port 5001 --image-mode embed-full ./inbox -o ./markdown

  # A folder of slide images as one document (writes deck.md)
  docling2md --url http://docling:5001 --images ./deck

  # Copy inputs to a scratch dir first and delete the copies afterwards
  docling2md --port 5001 --stage-dir /tmp/docling-in --cleanup big.pdf

  # Machine-readable summary
  docling2md --port 5001 --json *.pdf > summary.json

IMAGE MODES:
  strip        ask for placeholders, scrub any inline base64 images (default)
  placeholder  ask for placeholders, leave the Markdown untouched
  embed-text   embed images at scale 1, re-encode to WebP
  embed-full   embed images at scale 2, re-encode to WebP

ENVIRONMENT VARIABLES:
  WEBP_ENABLED            Re-encode embedded images (default: true)
  WEBP_QUALITY            Lossy WebP quality 0-100 (default: 65)
  WEBP_METHOD             Encoder effort 0-6 (default: 6)
  WEBP_MAX_WIDTH          Bounding width in px, 0 = unbounded (default: 1920)
  WEBP_MAX_HEIGHT         Bounding height in px, 0 = unbounded (default: 1080)
  SINGLE_PDF_OUTPUT_DIR   Default output directory
  DOCLING2MD_URL          Service base URL
  DOCLING2MD_PORT         Service port on localhost

  Variables are also read from ./docling_settings.env and ./.env if present.
"#;

/// Convert PDFs and slide-image folders to Markdown via Docling Serve.
#[derive(Parser, Debug)]
#[command(
    name = "docling2md",
    version,
    about = "Convert PDFs and slide-image folders to Markdown via a Docling Serve instance",
    long_about = "Send documents one at a time to a running Docling Serve instance, retrying \
transient failures, and write one Markdown file per input. Embedded images can be stripped \
or re-encoded as bounded WebP.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF files, or directories whose *.pdf files are converted.
    inputs: Vec<PathBuf>,

    /// Directory of .jpg/.jpeg/.png slides converted as one document.
    #[arg(long = "images", value_name = "DIR")]
    image_dirs: Vec<PathBuf>,

    /// Service base URL, e.g. http://localhost:5001. Takes precedence over --port.
    #[arg(long, env = "DOCLING2MD_URL")]
    url: Option<String>,

    /// Service port on localhost.
    #[arg(long, env = "DOCLING2MD_PORT")]
    port: Option<u16>,

    /// Directory for the Markdown output.
    #[arg(short, long, env = "SINGLE_PDF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// How images are requested and post-processed.
    #[arg(long, env = "DOCLING2MD_IMAGE_MODE", value_enum, default_value = "strip")]
    image_mode: ImageModeArg,

    /// Copy each PDF here before converting.
    #[arg(long, env = "DOCLING2MD_STAGE_DIR")]
    stage_dir: Option<PathBuf>,

    /// Delete each converted PDF (the staged copy with --stage-dir).
    #[arg(long, env = "DOCLING2MD_CLEANUP")]
    cleanup: bool,

    /// Total attempts per job.
    #[arg(long, env = "DOCLING2MD_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Pause before the health re-probe that precedes a retry, in ms.
    #[arg(long, env = "DOCLING2MD_RETRY_DELAY_MS", default_value_t = 5000)]
    retry_delay_ms: u64,

    /// How long to wait for the service to become ready, in seconds.
    #[arg(long, env = "DOCLING2MD_HEALTH_TIMEOUT", default_value_t = 180)]
    health_timeout: u64,

    /// Interval between readiness probes, in ms.
    #[arg(long, env = "DOCLING2MD_HEALTH_INTERVAL_MS", default_value_t = 3000)]
    health_interval_ms: u64,

    /// Per-request conversion timeout, in seconds.
    #[arg(long, env = "DOCLING2MD_CONVERSION_TIMEOUT", default_value_t = 10_800)]
    conversion_timeout: u64,

    /// Warn about inputs larger than this many MB.
    #[arg(long, env = "DOCLING2MD_MAX_FILE_SIZE_MB", default_value_t = 500)]
    max_file_size_mb: u64,

    /// Re-encode embedded images as WebP in the embed modes.
    #[arg(
        long,
        env = "WEBP_ENABLED",
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    webp_enabled: bool,

    /// Lossy WebP quality (0-100).
    #[arg(long, env = "WEBP_QUALITY", default_value_t = 65,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    webp_quality: u8,

    /// WebP encoder effort (0-6).
    #[arg(long, env = "WEBP_METHOD", default_value_t = 6,
          value_parser = clap::value_parser!(u8).range(0..=6))]
    webp_method: u8,

    /// Bounding width for embedded images; 0 disables.
    #[arg(long, env = "WEBP_MAX_WIDTH", default_value_t = 1920)]
    webp_max_width: u32,

    /// Bounding height for embedded images; 0 disables.
    #[arg(long, env = "WEBP_MAX_HEIGHT", default_value_t = 1080)]
    webp_max_height: u32,

    /// Print the run summary as JSON on stdout.
    #[arg(long, env = "DOCLING2MD_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCLING2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCLING2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCLING2MD_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageModeArg {
    Strip,
    Placeholder,
    EmbedText,
    EmbedFull,
}

impl From<ImageModeArg> for ImageMode {
    fn from(v: ImageModeArg) -> Self {
        match v {
            ImageModeArg::Strip => ImageMode::Strip,
            ImageModeArg::Placeholder => ImageMode::Placeholder,
            ImageModeArg::EmbedText => ImageMode::EmbedText,
            ImageModeArg::EmbedFull => ImageMode::EmbedFull,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Settings files are optional; values already in the environment win.
    for file in ["docling_settings.env", ".env"] {
        let _ = dotenvy::from_filename(file);
    }

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs when active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    // ── Endpoint ─────────────────────────────────────────────────────────
    let endpoint = match (&cli.url, cli.port) {
        (Some(url), _) => ServiceEndpoint::new(url).context("Invalid --url")?,
        (None, Some(port)) => ServiceEndpoint::from_port(port),
        (None, None) => anyhow::bail!(
            "No conversion service given: pass --url <URL> or --port <PORT> \
             (or set DOCLING2MD_URL / DOCLING2MD_PORT)"
        ),
    };

    // ── Build config and jobs ────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;
    let jobs = build_jobs(&cli, config.image_mode)?;
    if jobs.is_empty() {
        anyhow::bail!("Nothing to convert: no PDFs or slide images found in the given inputs");
    }

    // ── Startup gate, then convert ───────────────────────────────────────
    if !cli.quiet && !cli.json {
        eprintln!("{} Waiting for {} …", cyan("◆"), bold(&endpoint.to_string()));
    }
    let client = match connect(&endpoint, &config).await {
        Ok(client) => client,
        Err(e @ Docling2MdError::ServiceNotReady { .. }) => {
            eprintln!("{} {e}", red("✘"));
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to connect to conversion service"),
    };

    let summary = run_with_client(&client, &endpoint, jobs).await;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise run summary")?
        );
    } else if !cli.quiet {
        print_summary(&summary);
    }

    // Per-job failures are reported above; they do not change the exit code.
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let normalizer = NormalizerConfig::new(
        cli.webp_enabled,
        cli.webp_quality,
        cli.webp_method,
        cli.webp_max_width,
        cli.webp_max_height,
    );

    let mut builder = ConversionConfig::builder()
        .max_retries(cli.max_retries)
        .retry_delay_ms(cli.retry_delay_ms)
        .health_timeout_secs(cli.health_timeout)
        .health_interval_ms(cli.health_interval_ms)
        .conversion_timeout_secs(cli.conversion_timeout)
        .max_file_size_mb(cli.max_file_size_mb)
        .image_mode(cli.image_mode.into())
        .cleanup(cli.cleanup)
        .normalizer(normalizer);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Expand positional inputs and `--images` folders into jobs.
///
/// Missing positional files are kept as jobs: the orchestrator reports them
/// as not found without contacting the service.
fn build_jobs(cli: &Cli, mode: ImageMode) -> Result<Vec<ConversionJob>> {
    let mut jobs = Vec::new();

    for input in &cli.inputs {
        let pdfs = if input.is_dir() {
            pdfs_in(input).with_context(|| format!("Failed to list {}", input.display()))?
        } else {
            vec![input.clone()]
        };

        for pdf in pdfs {
            let path = match &cli.stage_dir {
                Some(dir) if pdf.is_file() => stage_input(&pdf, dir)
                    .with_context(|| format!("Failed to stage {}", pdf.display()))?,
                _ => pdf,
            };
            jobs.push(ConversionJob::document(path, &cli.output_dir, mode, cli.cleanup));
        }
    }

    for dir in &cli.image_dirs {
        let images =
            collect_images(dir).with_context(|| format!("Failed to list images in {}", dir.display()))?;
        if images.is_empty() {
            tracing::warn!("No slide images in {}, skipping", dir.display());
            continue;
        }
        let name = folder_name(dir);
        jobs.push(ConversionJob::image_batch(images, &cli.output_dir, &name, mode));
    }

    Ok(jobs)
}

fn pdfs_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut pdfs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
        })
        .collect();
    pdfs.sort();
    Ok(pdfs)
}

fn folder_name(dir: &Path) -> String {
    // `canonicalize` resolves "." and trailing slashes to a real name.
    std::fs::canonicalize(dir)
        .ok()
        .as_deref()
        .unwrap_or(dir)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "slides".into())
}

fn print_summary(summary: &RunSummary) {
    let total = summary.total();
    let ok = summary.succeeded.len();

    eprintln!(
        "{} {}/{} converted  {}",
        if summary.all_succeeded() {
            green("✔")
        } else if ok == 0 {
            red("✘")
        } else {
            cyan("⚠")
        },
        bold(&ok.to_string()),
        total,
        dim(&format!("{:.1}s", summary.total_duration_ms as f64 / 1000.0)),
    );
    for r in &summary.succeeded {
        eprintln!("   {} {}", green("→"), r.output_path.display());
    }
    for f in &summary.failed {
        let reason = f
            .result
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        eprintln!("   {} {}  {}", red("✗"), f.job.label(), dim(&reason));
    }
}
