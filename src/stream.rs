//! Streaming orchestration: emit each job's result as soon as it resolves.
//!
//! ## Why stream?
//!
//! A run over a directory of scans can take hours. The eager
//! [`crate::convert::run`] returns only after the last job; [`run_stream`]
//! yields `(job, result)` pairs one by one so callers can report, move or
//! index finished files while later ones are still converting.
//!
//! Jobs are still dispatched one at a time and in order, so the stream's
//! item order always matches the input order.

use crate::client::ConversionClient;
use crate::convert::dispatch;
use crate::job::ConversionJob;
use crate::output::ConversionResult;
use crate::service::ServiceEndpoint;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-job outcomes.
pub type JobStream = Pin<Box<dyn Stream<Item = (ConversionJob, ConversionResult)> + Send>>;

/// Convert `jobs` lazily; nothing is sent until the stream is polled.
///
/// No readiness gate is applied here: obtain `client` from
/// [`crate::convert::connect`] first.
pub fn run_stream(
    client: Arc<ConversionClient>,
    endpoint: ServiceEndpoint,
    jobs: Vec<ConversionJob>,
) -> JobStream {
    let total = jobs.len();
    info!("Streaming {} job(s) via {}", total, endpoint);

    let s = stream::iter(jobs.into_iter().enumerate()).then(move |(i, job)| {
        let client = Arc::clone(&client);
        let endpoint = endpoint.clone();
        async move {
            let result = dispatch(&client, &endpoint, i + 1, total, &job).await;
            (job, result)
        }
    });
    Box::pin(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConversionConfig, ImageMode};
    use crate::error::JobError;
    use std::path::Path;

    #[tokio::test]
    async fn stream_preserves_job_order() {
        let client = Arc::new(ConversionClient::new(&ConversionConfig::default()).unwrap());
        let jobs: Vec<ConversionJob> = ["a", "b", "c"]
            .iter()
            .map(|n| {
                ConversionJob::document(
                    format!("/missing/{n}.pdf"),
                    Path::new("/tmp"),
                    ImageMode::Strip,
                    false,
                )
            })
            .collect();

        let items: Vec<_> = run_stream(client, ServiceEndpoint::from_port(1), jobs.clone())
            .collect()
            .await;

        assert_eq!(items.len(), 3);
        for ((job, result), expected) in items.iter().zip(&jobs) {
            assert_eq!(job, expected);
            assert!(matches!(result.error, Some(JobError::InputNotFound { .. })));
        }
    }
}
