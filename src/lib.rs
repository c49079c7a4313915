//! # docling2md
//!
//! Drive a running [Docling Serve] instance to turn PDFs and slide-image
//! folders into Markdown files, one job at a time.
//!
//! ## Why this crate?
//!
//! Docling does the hard part (layout analysis, OCR, table structure) but
//! its HTTP API is a single long-running request per document. Around that
//! request a batch tool needs a startup gate, crash-aware retries, response
//! unpacking for both the JSON and zip shapes, and a way to keep embedded
//! images from ballooning the Markdown. That orchestration is what lives here.
//!
//! [Docling Serve]: https://github.com/docling-project/docling-serve
//!
//! ## Pipeline Overview
//!
//! ```text
//! jobs
//!  │
//!  ├─ 1. Gate      poll GET /health until 200 or the deadline passes
//!  ├─ 2. Request   multipart POST /v1/convert/file (heartbeat while waiting)
//!  ├─ 3. Retry     transient fault → sleep → re-probe → next attempt
//!  ├─ 4. Unpack    JSON envelope or zip of per-image Markdown
//!  ├─ 5. Images    strip, or normalize to bounded WebP
//!  └─ 6. Output    <output_dir>/<name>.md, optional input cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docling2md::{run, ConversionConfig, ConversionJob, ImageMode, ServiceEndpoint};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let endpoint = ServiceEndpoint::from_port(5001);
//!     let config = ConversionConfig::builder()
//!         .image_mode(ImageMode::EmbedText)
//!         .build()?;
//!     let jobs = vec![ConversionJob::document(
//!         "scan.pdf",
//!         Path::new("out"),
//!         config.image_mode,
//!         false,
//!     )];
//!
//!     let summary = run(&endpoint, jobs, &config).await?;
//!     eprintln!("{}/{} converted", summary.succeeded.len(), summary.total());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docling2md` binary (clap + anyhow + tracing-subscriber + indicatif + dotenvy) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docling2md = { version = "0.1", default-features = false }
//! ```
//!
//! ## Image Modes
//!
//! | Mode | Service export | Afterwards |
//! |------|----------------|------------|
//! | `strip` | placeholder | inline data URIs removed |
//! | `placeholder` | placeholder | untouched |
//! | `embed_text` | embedded, scale 1 | re-encoded to WebP |
//! | `embed_full` | embedded, scale 2 | re-encoded to WebP |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod convert;
pub mod error;
pub mod job;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::ConversionClient;
pub use config::{ConversionConfig, ConversionConfigBuilder, ImageMode, NormalizerConfig};
pub use convert::{connect, run, run_sync, run_with_client};
pub use error::{Docling2MdError, JobError};
pub use job::{ConversionJob, JobInput};
pub use output::{ConversionResult, FailedJob, RunSummary};
pub use pipeline::normalize::ImageNormalizer;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::ServiceEndpoint;
pub use stream::{run_stream, JobStream};
