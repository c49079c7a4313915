//! Batch orchestration entry points.
//!
//! ## Why a startup gate?
//!
//! The conversion service is usually started alongside this tool and can
//! take minutes to load its layout and OCR models. Dispatching before
//! `/health` answers would burn every job's retries on connection refusals,
//! so [`run`] first waits for readiness and fails the whole run with
//! [`Docling2MdError::ServiceNotReady`] if the deadline passes.
//!
//! Jobs are dispatched strictly one at a time: a single Docling instance
//! serialises conversions internally, and parallel uploads only compete for
//! the same worker while multiplying memory use.

use crate::client::ConversionClient;
use crate::config::ConversionConfig;
use crate::error::{Docling2MdError, JobError};
use crate::job::ConversionJob;
use crate::output::{ConversionResult, RunSummary};
use crate::service::ServiceEndpoint;
use std::time::Instant;
use tracing::{error, info};

/// Build a client and wait for the service to become ready.
///
/// # Errors
/// [`Docling2MdError::ServiceNotReady`] when `/health` never answers 200
/// within `config.health_timeout_secs`.
pub async fn connect(
    endpoint: &ServiceEndpoint,
    config: &ConversionConfig,
) -> Result<ConversionClient, Docling2MdError> {
    let client = ConversionClient::new(config)?;
    let readiness = client.wait_until_ready(endpoint).await;
    if !readiness.ready {
        return Err(Docling2MdError::ServiceNotReady {
            url: endpoint.to_string(),
            secs: config.health_timeout_secs,
            probes: readiness.probes,
        });
    }
    Ok(client)
}

/// Convert every job in order, after the service has become ready.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunSummary)` once every job has been attempted, even if some
/// failed (check `summary.failed`).
///
/// # Errors
/// Only fatal, run-level errors: an unbuildable HTTP client or a service
/// that never became ready. No job is dispatched in either case.
pub async fn run(
    endpoint: &ServiceEndpoint,
    jobs: Vec<ConversionJob>,
    config: &ConversionConfig,
) -> Result<RunSummary, Docling2MdError> {
    let client = connect(endpoint, config).await?;
    Ok(run_with_client(&client, endpoint, jobs).await)
}

/// Blocking wrapper around [`run`] for callers without a runtime.
pub fn run_sync(
    endpoint: &ServiceEndpoint,
    jobs: Vec<ConversionJob>,
    config: &ConversionConfig,
) -> Result<RunSummary, Docling2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Docling2MdError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(run(endpoint, jobs, config))
}

/// Convert every job in order with an already-connected client.
///
/// Skips the readiness gate; use after [`connect`] or when the caller has
/// its own notion of service liveness.
pub async fn run_with_client(
    client: &ConversionClient,
    endpoint: &ServiceEndpoint,
    jobs: Vec<ConversionJob>,
) -> RunSummary {
    let start = Instant::now();
    let total = jobs.len();
    let callback = client.config().progress_callback.clone();

    info!("Converting {} job(s) via {}", total, endpoint);
    if let Some(ref cb) = callback {
        cb.on_run_start(total);
    }

    let mut summary = RunSummary::default();
    for (i, job) in jobs.into_iter().enumerate() {
        let result = dispatch(client, endpoint, i + 1, total, &job).await;
        summary.record(job, result);
    }
    summary.total_duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Run complete: {}/{} succeeded in {}ms",
        summary.succeeded.len(),
        total,
        summary.total_duration_ms
    );
    if let Some(ref cb) = callback {
        cb.on_run_complete(total, summary.succeeded.len());
    }
    summary
}

/// Convert one job, firing job-level progress events around it.
///
/// A missing or absent primary input is reported without touching the
/// network.
pub(crate) async fn dispatch(
    client: &ConversionClient,
    endpoint: &ServiceEndpoint,
    index: usize,
    total: usize,
    job: &ConversionJob,
) -> ConversionResult {
    let callback = client.config().progress_callback.as_ref();
    let label = job.label();
    info!("[{index}/{total}] {label}");
    if let Some(cb) = callback {
        cb.on_job_start(index, total, &label);
    }

    let result = match job.primary_input() {
        Some(path) if !path.exists() => {
            error!("File not found, skipping: {}", path.display());
            ConversionResult::failed(
                job.output_path.clone(),
                0,
                0,
                JobError::InputNotFound {
                    path: path.to_path_buf(),
                },
            )
        }
        None => {
            error!("No input files, skipping: {label}");
            ConversionResult::failed(job.output_path.clone(), 0, 0, JobError::NoInputs)
        }
        Some(_) => client.convert(endpoint, job).await,
    };

    if let Some(cb) = callback {
        match &result.error {
            None => cb.on_job_complete(index, total, result.markdown_len),
            Some(e) => cb.on_job_error(index, total, &e.to_string()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageMode;
    use std::path::Path;

    #[tokio::test]
    async fn missing_inputs_are_reported_in_order() {
        let config = ConversionConfig::default();
        let client = ConversionClient::new(&config).unwrap();
        let ep = ServiceEndpoint::from_port(1);
        let jobs = vec![
            ConversionJob::document("/missing/one.pdf", Path::new("/tmp"), ImageMode::Strip, false),
            ConversionJob::document("/missing/two.pdf", Path::new("/tmp"), ImageMode::Strip, false),
        ];

        let summary = run_with_client(&client, &ep, jobs).await;
        assert_eq!(summary.total(), 2);
        assert!(summary.succeeded.is_empty());
        assert!(summary.failed[0].job.output_path.ends_with("one.md"));
        assert!(summary.failed[1].job.output_path.ends_with("two.md"));
        for f in &summary.failed {
            assert_eq!(f.result.attempts, 0);
            assert!(matches!(f.result.error, Some(JobError::InputNotFound { .. })));
        }
    }

    #[tokio::test]
    async fn empty_job_list_is_an_empty_summary() {
        let client = ConversionClient::new(&ConversionConfig::default()).unwrap();
        let summary = run_with_client(&client, &ServiceEndpoint::from_port(1), Vec::new()).await;
        assert_eq!(summary.total(), 0);
        assert!(summary.all_succeeded());
    }
}
