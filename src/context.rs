//! Per-request context threaded through the classifier and the pipeline.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default bound on a single oracle round-trip.
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity, deadline and cancellation for one proxied request.
///
/// Cancelling the token aborts any in-flight oracle call; callers treat the
/// abort like any other oracle failure.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    cancel: CancellationToken,
    oracle_timeout: Duration,
}

impl RequestContext {
    /// Fresh context with a random request id.
    pub fn new() -> Self {
        Self {
            request_id: format!("req_{}", Uuid::new_v4()),
            cancel: CancellationToken::new(),
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }

    /// Tie this context to a caller-owned token (e.g. the client connection's).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn oracle_timeout(&self) -> Duration {
        self.oracle_timeout
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
