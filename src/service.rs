//! The conversion service's address.

use crate::error::Docling2MdError;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Base URL of a running Docling Serve instance.
///
/// Established once before any job is dispatched and immutable for the rest
/// of the run. Trailing slashes are dropped so path joins are predictable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    base: String,
}

impl ServiceEndpoint {
    /// Parse and validate an absolute `http://` or `https://` base URL.
    pub fn new(url: impl AsRef<str>) -> Result<Self, Docling2MdError> {
        let raw = url.as_ref().trim();
        let parsed = Url::parse(raw).map_err(|e| Docling2MdError::InvalidEndpoint {
            url: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Docling2MdError::InvalidEndpoint {
                url: raw.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none() {
            return Err(Docling2MdError::InvalidEndpoint {
                url: raw.to_string(),
                reason: "missing host".into(),
            });
        }

        Ok(Self {
            base: raw.trim_end_matches('/').to_string(),
        })
    }

    /// `http://localhost:{port}`, the address a locally started container
    /// publishes.
    pub fn from_port(port: u16) -> Self {
        Self {
            base: format!("http://localhost:{port}"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// `GET` target for readiness and liveness probes.
    pub fn health_url(&self) -> String {
        format!("{}/health", self.base)
    }

    /// `POST` target for file conversion.
    pub fn convert_url(&self) -> String {
        format!("{}/v1/convert/file", self.base)
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped() {
        let ep = ServiceEndpoint::new("http://127.0.0.1:5001/").unwrap();
        assert_eq!(ep.base_url(), "http://127.0.0.1:5001");
        assert_eq!(ep.health_url(), "http://127.0.0.1:5001/health");
        assert_eq!(ep.convert_url(), "http://127.0.0.1:5001/v1/convert/file");
    }

    #[test]
    fn from_port_targets_localhost() {
        let ep = ServiceEndpoint::from_port(5001);
        assert_eq!(ep.to_string(), "http://localhost:5001");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(ServiceEndpoint::new("ftp://localhost:21").is_err());
        assert!(ServiceEndpoint::new("localhost:5001").is_err());
        assert!(ServiceEndpoint::new("").is_err());
    }
}
