//! Oracle port: the LLM consulted when deterministic logic is not enough.
//!
//! The classifier asks it a yes/no question when the rule engine is not
//! confident; the correction pipeline asks it to rewrite a broken tool call.
//! Both call through [`ask`], which applies the request deadline and
//! cancellation and rejects empty answers.

pub mod client;
pub mod condense;
pub mod errors;
pub mod types;
pub mod verdict;

use async_trait::async_trait;

use crate::context::RequestContext;

pub use client::HttpOracle;
pub use errors::OracleError;
pub use verdict::{parse_leading_verdict, verdict_or, Verdict};

/// One single-turn oracle request.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Port for the fallback LLM.
///
/// Implementations must be cheap to share between concurrent requests.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Send one request and return the raw text answer.
    async fn send(&self, request: &OracleRequest) -> Result<String, OracleError>;
}

/// Send `request` under the context's deadline and cancellation token.
///
/// Whitespace-only answers are reported as [`OracleError::EmptyResponse`].
pub async fn ask(
    oracle: &dyn Oracle,
    request: &OracleRequest,
    ctx: &RequestContext,
) -> Result<String, OracleError> {
    if ctx.is_cancelled() {
        return Err(OracleError::Cancelled);
    }

    let timeout = ctx.oracle_timeout();
    let answer = tokio::select! {
        _ = ctx.cancellation().cancelled() => return Err(OracleError::Cancelled),
        result = tokio::time::timeout(timeout, oracle.send(request)) => match result {
            Ok(inner) => inner?,
            Err(_) => {
                return Err(OracleError::Timeout {
                    duration_ms: timeout.as_millis() as u64,
                })
            }
        },
    };

    if answer.trim().is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    Ok(answer)
}

// ─── Test Doubles ────────────────────────────────────────────────────────────
