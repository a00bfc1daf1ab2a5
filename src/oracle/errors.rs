//! Oracle error types.
//!
//! Call sites inside the crate never propagate these: every oracle failure is
//! mapped to a conservative default. The variants carry enough context to
//! log why the default was taken.

use thiserror::Error;

/// Errors that can occur during an oracle round-trip.
#[derive(Debug, Error)]
pub enum OracleError {
    /// TCP/HTTP connection to the oracle endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed {
        endpoint: String,
        reason: String,
    },

    /// The oracle did not answer within the request's deadline.
    #[error("oracle timeout after {duration_ms}ms")]
    Timeout {
        duration_ms: u64,
    },

    /// The request's cancellation token fired.
    #[error("oracle call cancelled")]
    Cancelled,

    /// Non-2xx HTTP response from the oracle endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError {
        status: u16,
        body: String,
    },

    /// The oracle answered with no usable text.
    #[error("oracle returned an empty response")]
    EmptyResponse,

    /// The response body could not be understood.
    #[error("invalid oracle response: {reason}")]
    InvalidResponse {
        reason: String,
    },

    /// Oracle client configuration is unusable.
    #[error("oracle config error: {reason}")]
    ConfigError {
        reason: String,
    },
}

impl OracleError {
    /// Whether a caller-level retry of the same request could succeed.
    ///
    /// Transport failures, timeouts, rate limits and 5xx responses are
    /// retriable; cancellation and malformed responses are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            OracleError::ConnectionFailed { .. } | OracleError::Timeout { .. } => true,
            OracleError::HttpError { status, .. } => *status == 429 || *status >= 500,
            OracleError::Cancelled
            | OracleError::EmptyResponse
            | OracleError::InvalidResponse { .. }
            | OracleError::ConfigError { .. } => false,
        }
    }
}
