//! Structured logging.
//!
//! Components report decisions through an injected [`LogSink`] so an embedding
//! proxy can route them into its own request log. [`TracingSink`] forwards to
//! `tracing`; [`NoopSink`] is used when nothing is injected.

use std::sync::Arc;

// ─── Sink ────────────────────────────────────────────────────────────────────

/// One structured log record.
#[derive(Debug, Clone)]
pub struct LogEvent<'a> {
    /// Emitting component, e.g. `"extractor"` or `"pipeline"`.
    pub component: &'a str,
    /// Coarse event kind within the component, e.g. `"decision"`.
    pub category: &'a str,
    pub request_id: &'a str,
    pub message: &'a str,
    /// Free-form structured payload. Always a JSON object.
    pub fields: serde_json::Value,
}

/// Destination for structured component logs.
pub trait LogSink: Send + Sync {
    fn log(&self, event: &LogEvent<'_>);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl LogSink for NoopSink {
    fn log(&self, _event: &LogEvent<'_>) {}
}

/// Forwards events to the `tracing` subscriber at `info` level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, event: &LogEvent<'_>) {
        tracing::info!(
            component = event.component,
            category = event.category,
            request_id = event.request_id,
            fields = %event.fields,
            "{}",
            event.message
        );
    }
}

/// Shared no-op sink used as the default for every component.
pub fn noop_sink() -> Arc<dyn LogSink> {
    Arc::new(NoopSink)
}

// ─── Subscriber Setup ────────────────────────────────────────────────────────

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "callguard=info,warn";

/// Options for [`init_tracing`].
#[derive(Debug, Clone, Default)]
pub struct TracingOptions {
    /// Filter directive; `RUST_LOG` wins when set, then this, then [`DEFAULT_FILTER`].
    pub filter: Option<String>,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
}

/// Install a global `tracing-subscriber` fmt subscriber writing to stderr.
///
/// Returns `false` when a subscriber was already installed; it is left in place.
pub fn init_tracing(options: &TracingOptions) -> bool {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let directive = filter_directive(options, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter {directive:?} ({e}), using {DEFAULT_FILTER}");
        EnvFilter::new(DEFAULT_FILTER)
    });

    let builder = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);
    let installed = if options.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    if installed {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            json = options.json,
            filter = %directive,
            "callguard logging initialised"
        );
    } else {
        tracing::debug!("tracing subscriber already installed");
    }
    installed
}

fn filter_directive(options: &TracingOptions, from_env: Option<String>) -> String {
    from_env
        .filter(|d| !d.trim().is_empty())
        .or_else(|| options.filter.clone())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
