//! Per-job results and the run summary.

use crate::error::JobError;
use crate::job::ConversionJob;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one [`ConversionJob`].
///
/// Success when `error` is `None`; `output_path` then names the written
/// Markdown file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionResult {
    /// Where the Markdown was (or would have been) written.
    pub output_path: PathBuf,
    /// HTTP attempts issued. Zero when the job never reached the network.
    pub attempts: u32,
    /// Byte length of the written Markdown.
    pub markdown_len: usize,
    /// Wall-clock time including retries and back-off.
    pub duration_ms: u64,
    /// Failure classification, if the job failed.
    pub error: Option<JobError>,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub(crate) fn failed(output_path: PathBuf, attempts: u32, duration_ms: u64, error: JobError) -> Self {
        Self {
            output_path,
            attempts,
            markdown_len: 0,
            duration_ms,
            error: Some(error),
        }
    }
}

/// A job that did not convert, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedJob {
    pub job: ConversionJob,
    pub result: ConversionResult,
}

/// Aggregate of a whole run, in job order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: Vec<ConversionResult>,
    pub failed: Vec<FailedJob>,
    pub total_duration_ms: u64,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub(crate) fn record(&mut self, job: ConversionJob, result: ConversionResult) {
        if result.is_success() {
            self.succeeded.push(result);
        } else {
            self.failed.push(FailedJob { job, result });
        }
    }
}
