//! Error types for the docling2md library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Docling2MdError`]: **Fatal**: the run cannot proceed at all (the
//!   conversion service never came up, the endpoint is malformed, the
//!   configuration is invalid). Returned as `Err(Docling2MdError)` from the
//!   top-level entry points.
//!
//! * [`JobError`]: **Non-fatal**: one job failed (missing input, service
//!   reported failure, retries exhausted) but the batch carries on. Stored
//!   inside [`crate::output::ConversionResult`] so callers can report every
//!   failure at the end of the run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docling2md library.
///
/// Job-level failures use [`JobError`] and are stored in
/// [`crate::output::ConversionResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Docling2MdError {
    // ── Service errors ────────────────────────────────────────────────────
    /// The endpoint string is not an absolute HTTP/HTTPS URL.
    #[error("Invalid service endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// `/health` never answered 200 within the readiness deadline.
    #[error(
        "Conversion service at '{url}' did not become ready within {secs}s ({probes} probes).\n\
Check that the container is running and the port is correct."
    )]
    ServiceNotReady { url: String, secs: u64, probes: u32 },

    /// The HTTP client itself could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single conversion job.
///
/// The variants double as the failure classification: [`JobError::is_transient`]
/// decides whether the client's retry policy applies.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum JobError {
    /// Primary input did not exist at dispatch time; nothing was sent.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// The job carries no input files at all (an empty image batch).
    #[error("Job has no input files")]
    NoInputs,

    /// An input existed but could not be read into the request body.
    #[error("Failed to read input '{path}': {detail}")]
    InputReadFailed { path: PathBuf, detail: String },

    /// Connection refused, timeout or other transport-level fault.
    #[error("Attempt {attempt}: transport error: {detail}")]
    Transport { attempt: u32, detail: String },

    /// The service answered with a non-200 status.
    #[error("Attempt {attempt}: HTTP {status}: {body}")]
    HttpStatus {
        attempt: u32,
        status: u16,
        body: String,
    },

    /// HTTP 200 but the body was neither a readable zip nor a JSON envelope.
    #[error("Attempt {attempt}: unreadable response: {detail}")]
    InvalidResponse { attempt: u32, detail: String },

    /// The service explicitly reported `status = "failure"`.
    #[error("Service reported failure: {}", errors.join("; "))]
    ServiceFailure { errors: Vec<String> },

    /// HTTP 200 without any Markdown payload.
    #[error("Service returned no Markdown content")]
    EmptyResult,

    /// The health re-probe between attempts failed; the service has most
    /// likely crashed.
    #[error("Service became unavailable before retry {next_attempt}: {detail}\nRestart the conversion service and re-run.")]
    ServiceUnavailable { next_attempt: u32, detail: String },

    /// Every attempt failed with a transient fault.
    #[error("All {attempts} attempts failed. Last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// Markdown was produced but could not be written.
    #[error("Failed to write output file '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },
}

impl JobError {
    /// Whether another attempt may succeed.
    ///
    /// Only faults that say nothing definitive about the document are
    /// transient; explicit service verdicts and local faults are terminal.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JobError::Transport { .. } | JobError::HttpStatus { .. } | JobError::InvalidResponse { .. }
        )
    }
}
