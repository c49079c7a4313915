//! Readiness and liveness probes against `GET {endpoint}/health`.
//!
//! A probe succeeds only on HTTP 200; the body is ignored. Connection
//! faults and other statuses are "not ready yet", never fatal on their own.

use crate::service::ServiceEndpoint;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info};

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Healthy,
    /// The service answered, but not with 200.
    Status(u16),
    /// No HTTP answer at all (refused, timed out, reset).
    Unreachable(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy)
    }

    pub fn describe(&self) -> String {
        match self {
            ProbeOutcome::Healthy => "HTTP 200".into(),
            ProbeOutcome::Status(code) => format!("HTTP {code}"),
            ProbeOutcome::Unreachable(detail) => format!("unreachable: {detail}"),
        }
    }
}

/// Issue one health request with its own short timeout.
pub async fn probe_health(
    http: &reqwest::Client,
    endpoint: &ServiceEndpoint,
    timeout: Duration,
) -> ProbeOutcome {
    match http.get(endpoint.health_url()).timeout(timeout).send().await {
        Ok(resp) if resp.status() == reqwest::StatusCode::OK => ProbeOutcome::Healthy,
        Ok(resp) => ProbeOutcome::Status(resp.status().as_u16()),
        Err(e) => ProbeOutcome::Unreachable(e.to_string()),
    }
}

/// Result of [`wait_until_ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub ready: bool,
    pub probes: u32,
    pub elapsed: Duration,
}

/// Poll `/health` every `interval` until it answers 200 or `timeout` elapses.
///
/// Returns `ready: false` only once the full deadline is spent; the caller
/// must treat that as fatal for the run.
pub async fn wait_until_ready(
    http: &reqwest::Client,
    endpoint: &ServiceEndpoint,
    interval: Duration,
    timeout: Duration,
    probe_timeout: Duration,
) -> Readiness {
    info!(
        "Waiting for conversion service at {} to become ready (up to {}s)...",
        endpoint,
        timeout.as_secs()
    );
    let started = Instant::now();
    let deadline = started + timeout;
    let mut probes = 0u32;

    while Instant::now() < deadline {
        probes += 1;
        let left = deadline.saturating_duration_since(Instant::now()).as_secs();

        match probe_health(http, endpoint, probe_timeout).await {
            ProbeOutcome::Healthy => {
                info!("Conversion service is ready (after {} probe(s))", probes);
                return Readiness {
                    ready: true,
                    probes,
                    elapsed: started.elapsed(),
                };
            }
            ProbeOutcome::Status(code) => {
                info!("  [Health] Probe {probes} — HTTP {code}, retrying... ({left}s left)");
            }
            ProbeOutcome::Unreachable(detail) => {
                info!("  [Health] Probe {probes} — service not up yet: {detail} ({left}s left)");
            }
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        sleep(interval.min(remaining)).await;
    }

    error!(
        "Conversion service did not become ready within {}s after {} probes",
        timeout.as_secs(),
        probes
    );
    Readiness {
        ready: false,
        probes,
        elapsed: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_descriptions() {
        assert!(ProbeOutcome::Healthy.is_healthy());
        assert!(!ProbeOutcome::Status(503).is_healthy());
        assert_eq!(ProbeOutcome::Status(503).describe(), "HTTP 503");
        assert!(ProbeOutcome::Unreachable("refused".into())
            .describe()
            .contains("refused"));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let http = reqwest::Client::builder().no_proxy().build().unwrap();
        let ep = ServiceEndpoint::new(format!("http://127.0.0.1:{port}")).unwrap();
        let outcome = probe_health(&http, &ep, Duration::from_secs(1)).await;
        assert!(matches!(outcome, ProbeOutcome::Unreachable(_)));
    }
}
