//! Pool and transport error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a client pool
///
/// All of these are configuration errors: they surface at construction time
/// and are not meant to be recovered from.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("client pool requires at least one client")]
    EmptyPool,

    #[error("{}: invalid client configuration: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} environment variable not set")]
    MissingSecret(String),

    #[error("failed to build HTTP client: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to connect tunnel for client {key}: {source}")]
    Tunnel {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("client {0} requires a tunnel connector, but none was provided")]
    TunnelUnsupported(String),
}

/// Failure of a single send through a client
///
/// Produced by the underlying transport and passed through the rate-limit
/// gate and the client untouched.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors returned by the fetch service
#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Send(#[from] SendError),

    #[error("client {key} got unsuccessful status {status}")]
    Status {
        status: reqwest::StatusCode,
        key: String,
    },

    #[error("invalid URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    /// Whether the failure should be pinned on the client that sent the request
    pub fn is_client_fault(&self) -> bool {
        match self {
            FetchError::Send(_) => true,
            FetchError::Status { status, .. } => matches!(status.as_u16(), 401 | 403 | 429),
            FetchError::InvalidUrl { .. } => false,
        }
    }

    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Send(_) => true,
            FetchError::Status { status, .. } => {
                self.is_client_fault() || status.is_server_error()
            }
            FetchError::InvalidUrl { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    fn status(code: u16) -> FetchError {
        FetchError::Status {
            status: StatusCode::from_u16(code).unwrap(),
            key: "k".to_string(),
        }
    }

    #[test]
    fn test_client_fault_classification() {
        assert!(status(429).is_client_fault());
        assert!(status(403).is_client_fault());
        assert!(status(401).is_client_fault());
        assert!(!status(404).is_client_fault());
        assert!(!status(503).is_client_fault());
        assert!(FetchError::Send(SendError::Transport("reset".into())).is_client_fault());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(status(429).is_retryable());
        assert!(status(502).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(400).is_retryable());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PoolError::EmptyPool.to_string(),
            "client pool requires at least one client"
        );
        assert_eq!(
            PoolError::MissingSecret("PKP_KEY".into()).to_string(),
            "PKP_KEY environment variable not set"
        );
    }
}
