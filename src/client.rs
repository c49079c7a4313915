//! ConversionClient: one logical conversion request per job.
//!
//! ## Retry Strategy
//!
//! Each job is driven by a small state machine:
//!
//! ```text
//! Attempting(n) ──ok──────────────────────────────▶ Done(Ok)
//!      │ terminal fault ──────────────────────────▶ Done(Err)
//!      │ transient fault, n == max ───────────────▶ Done(RetriesExhausted)
//!      └ transient fault, n <  max ─▶ Reprobe(n)
//!                                       │ sleep retry_delay, GET /health
//!                                       ├ 200 ──▶ Attempting(n + 1)
//!                                       └ else ─▶ Done(ServiceUnavailable)
//! ```
//!
//! The back-off is a fixed delay rather than exponential: there is only ever
//! one request in flight, so there is no herd to spread out, and a crashed
//! container is detected by the health re-probe instead of by waiting.

use crate::config::ConversionConfig;
use crate::error::{Docling2MdError, JobError};
use crate::job::ConversionJob;
use crate::output::ConversionResult;
use crate::pipeline::health::{self, Readiness};
use crate::pipeline::normalize::ImageNormalizer;
use crate::pipeline::{postprocess, request, response};
use crate::progress::{Heartbeat, HEARTBEAT_INTERVAL};
use crate::service::ServiceEndpoint;
use reqwest::StatusCode;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// TCP connect timeout shared by probes and conversion requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest slice of an error body kept in a [`JobError::HttpStatus`].
const ERROR_BODY_LIMIT: usize = 300;

/// Per-job retry state.
#[derive(Debug)]
enum RetryState {
    Attempting { attempt: u32 },
    Reprobe { attempt: u32, last_error: JobError },
    Done(Result<String, JobError>),
}

/// HTTP client for a Docling Serve instance.
///
/// Holds one connection pool with system proxies disabled: conversion
/// traffic is local-network only and proxy interception has been seen to
/// hang multi-hour uploads.
pub struct ConversionClient {
    http: reqwest::Client,
    config: ConversionConfig,
    normalizer: ImageNormalizer,
}

impl ConversionClient {
    pub fn new(config: &ConversionConfig) -> Result<Self, Docling2MdError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Docling2MdError::HttpClient(e.to_string()))?;

        Ok(Self {
            http,
            config: config.clone(),
            normalizer: ImageNormalizer::new(&config.normalizer),
        })
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &ImageNormalizer {
        &self.normalizer
    }

    /// Poll `/health` using the configured interval and deadline.
    pub async fn wait_until_ready(&self, endpoint: &ServiceEndpoint) -> Readiness {
        health::wait_until_ready(
            &self.http,
            endpoint,
            self.config.health_interval(),
            self.config.health_timeout(),
            self.config.health_probe_timeout(),
        )
        .await
    }

    /// Convert one job and write its Markdown.
    ///
    /// Failures are reported in the returned `ConversionResult`; one bad
    /// document never aborts the batch.
    pub async fn convert(&self, endpoint: &ServiceEndpoint, job: &ConversionJob) -> ConversionResult {
        let start = Instant::now();
        let elapsed_ms = || start.elapsed().as_millis() as u64;

        if job.inputs().is_empty() {
            error!("{}: no input files, skipping", job.label());
            return ConversionResult::failed(job.output_path.clone(), 0, elapsed_ms(), JobError::NoInputs);
        }
        if let Some(missing) = job.inputs().iter().find(|p| !p.is_file()) {
            error!("File not found, skipping: {}", missing.display());
            return ConversionResult::failed(
                job.output_path.clone(),
                0,
                elapsed_ms(),
                JobError::InputNotFound {
                    path: missing.clone(),
                },
            );
        }
        self.warn_if_large(job);

        let (outcome, attempts) = self.drive(endpoint, job).await;

        let markdown = match outcome {
            Ok(md) => self.finish_markdown(md, job).await,
            Err(e) => {
                error!("{}: {}", job.label(), e);
                return ConversionResult::failed(job.output_path.clone(), attempts, elapsed_ms(), e);
            }
        };

        if let Err(e) = write_output(&job.output_path, &markdown).await {
            error!("{}", e);
            return ConversionResult::failed(job.output_path.clone(), attempts, elapsed_ms(), e);
        }
        info!("✅ Saved: {}", job.output_path.display());

        if job.cleanup {
            remove_inputs(job.inputs()).await;
        }

        ConversionResult {
            output_path: job.output_path.clone(),
            attempts,
            markdown_len: markdown.len(),
            duration_ms: elapsed_ms(),
            error: None,
        }
    }

    /// Run the retry state machine. Returns the outcome and attempts issued.
    async fn drive(&self, endpoint: &ServiceEndpoint, job: &ConversionJob) -> (Result<String, JobError>, u32) {
        let max = self.config.max_retries;
        let mut issued = 0u32;
        let mut state = RetryState::Attempting { attempt: 1 };

        loop {
            state = match state {
                RetryState::Attempting { attempt } => {
                    issued = attempt;
                    match self.attempt(endpoint, job, attempt).await {
                        Ok(md) => RetryState::Done(Ok(md)),
                        Err(e) if e.is_transient() => {
                            error!("Attempt {attempt}/{max} — {e}");
                            if attempt < max {
                                RetryState::Reprobe {
                                    attempt,
                                    last_error: e,
                                }
                            } else {
                                RetryState::Done(Err(JobError::RetriesExhausted {
                                    attempts: attempt,
                                    last_error: e.to_string(),
                                }))
                            }
                        }
                        Err(e) => RetryState::Done(Err(e)),
                    }
                }
                RetryState::Reprobe { attempt, last_error } => {
                    let delay = self.config.retry_delay();
                    info!("Retrying in {:.1}s...", delay.as_secs_f64());
                    debug!("Previous attempt failed with: {last_error}");
                    sleep(delay).await;

                    let probe =
                        health::probe_health(&self.http, endpoint, self.config.health_probe_timeout()).await;
                    if probe.is_healthy() {
                        info!("  [Health] Service still alive, proceeding with attempt {}...", attempt + 1);
                        RetryState::Attempting { attempt: attempt + 1 }
                    } else {
                        error!(
                            "❌ Health check failed before retry ({}) — the service has likely crashed.",
                            probe.describe()
                        );
                        RetryState::Done(Err(JobError::ServiceUnavailable {
                            next_attempt: attempt + 1,
                            detail: probe.describe(),
                        }))
                    }
                }
                RetryState::Done(outcome) => return (outcome, issued),
            };
        }
    }

    /// One HTTP round trip, classified.
    async fn attempt(&self, endpoint: &ServiceEndpoint, job: &ConversionJob, attempt: u32) -> Result<String, JobError> {
        if let Some(cb) = &self.config.progress_callback {
            cb.on_attempt(attempt, self.config.max_retries);
        }

        let form = request::build_form(job).await?;
        debug!(
            "Sending {} file(s) with directives {:?}",
            job.inputs().len(),
            request::form_fields(job.image_mode, job.is_batch())
        );

        // The heartbeat only reports elapsed time; it is joined before the
        // response is looked at.
        let heartbeat = Heartbeat::start(self.config.progress_callback.as_ref(), HEARTBEAT_INTERVAL);
        let sent = self.send(endpoint, form).await;
        heartbeat.stop().await;

        let (status, content_type, body) = sent.map_err(|e| JobError::Transport {
            attempt,
            detail: e.to_string(),
        })?;
        debug!(
            "HTTP status: {} | content-type: {}",
            status,
            content_type.as_deref().unwrap_or("?")
        );

        if status != StatusCode::OK {
            return Err(JobError::HttpStatus {
                attempt,
                status: status.as_u16(),
                body: truncate(&String::from_utf8_lossy(&body), ERROR_BODY_LIMIT),
            });
        }

        response::extract_markdown(content_type.as_deref(), &body, attempt)
    }

    async fn send(
        &self,
        endpoint: &ServiceEndpoint,
        form: reqwest::multipart::Form,
    ) -> Result<(StatusCode, Option<String>, Vec<u8>), reqwest::Error> {
        let resp = self
            .http
            .post(endpoint.convert_url())
            .multipart(form)
            .timeout(self.config.conversion_timeout())
            .send()
            .await?;
        let status = resp.status();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = resp.bytes().await?.to_vec();
        Ok((status, content_type, body))
    }

    /// Mode-dependent scrubbing and image normalization.
    async fn finish_markdown(&self, markdown: String, job: &ConversionJob) -> String {
        let mode = job.image_mode;
        let markdown = if mode == crate::config::ImageMode::Strip {
            postprocess::strip_inline_images(&markdown)
        } else {
            markdown
        };

        if !mode.normalizes_images() || !self.normalizer.is_active() {
            return markdown;
        }

        let normalizer = self.normalizer.clone();
        let sidecars: Option<Vec<PathBuf>> = job.is_batch().then(|| job.inputs().to_vec());
        let input = markdown.clone();
        match tokio::task::spawn_blocking(move || normalizer.normalize(&input, sidecars.as_deref())).await {
            Ok(normalized) => normalized,
            Err(e) => {
                warn!("Image normalization task failed, keeping original images: {e}");
                markdown
            }
        }
    }

    fn warn_if_large(&self, job: &ConversionJob) {
        let bytes: u64 = job
            .inputs()
            .iter()
            .filter_map(|p| std::fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        let size_mb = bytes as f64 / (1024.0 * 1024.0);
        if size_mb > self.config.max_file_size_mb as f64 {
            warn!(
                "{:.1} MB — exceeds {} MB threshold, proceeding anyway: {}",
                size_mb,
                self.config.max_file_size_mb,
                job.label()
            );
        } else {
            info!("  File: {}  ({:.1} MB)", job.label(), size_mb);
        }
    }
}

/// Atomic write: temp file in the same directory, then rename.
async fn write_output(path: &Path, markdown: &str) -> Result<(), JobError> {
    let fail = |e: std::io::Error| JobError::OutputWriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }
    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown.as_bytes()).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)
}

async fn remove_inputs(paths: &[PathBuf]) {
    for p in paths {
        match tokio::fs::remove_file(p).await {
            Ok(()) => info!("Cleaned up input: {}", p.display()),
            Err(e) => warn!("Could not remove {}: {}", p.display(), e),
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 300), "short");
        assert_eq!(truncate("ééééé", 2), "éé…");
    }

    #[tokio::test]
    async fn write_output_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested/deeper/doc.md");
        write_output(&out, "# Done\n").await.unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "# Done\n");
        assert!(!dir.path().join("nested/deeper/doc.md.tmp").exists());
    }

    #[tokio::test]
    async fn missing_input_fails_without_attempts() {
        let config = ConversionConfig::default();
        let client = ConversionClient::new(&config).unwrap();
        let ep = ServiceEndpoint::from_port(1);
        let job = ConversionJob::document(
            "/no/such/file.pdf",
            Path::new("/tmp"),
            crate::config::ImageMode::Strip,
            false,
        );
        let result = client.convert(&ep, &job).await;
        assert_eq!(result.attempts, 0);
        assert!(matches!(result.error, Some(JobError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn empty_batch_fails_without_attempts() {
        let client = ConversionClient::new(&ConversionConfig::default()).unwrap();
        let job = ConversionJob::image_batch(
            Vec::new(),
            Path::new("/tmp"),
            "empty",
            crate::config::ImageMode::Strip,
        );
        let result = client.convert(&ServiceEndpoint::from_port(1), &job).await;
        assert_eq!(result.attempts, 0);
        assert!(matches!(result.error, Some(JobError::NoInputs)));
    }
}
