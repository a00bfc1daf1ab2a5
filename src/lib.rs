//! Tool-call correctness layer for LLM proxies.
//!
//! Two independent services sit between a client and a model:
//!
//! - [`NecessityClassifier`] decides, before the model runs, whether the
//!   latest user turn needs tools at all.
//! - [`CorrectionPipeline`] validates the tool calls the model emitted and
//!   repairs them, falling back to the original call when repair fails.
//!
//! Both consult an optional [`Oracle`] only when deterministic logic defers.
//! [`CallGuard`] wires them together from a [`GuardConfig`].

pub mod config;
pub mod context;
pub mod correction;
pub mod logging;
pub mod necessity;
pub mod oracle;
pub mod tools;

use std::path::Path;
use std::sync::Arc;

pub use config::{load_or_default, ConfigError, GuardConfig};
pub use context::RequestContext;
pub use correction::{CorrectionOutcome, CorrectionPipeline, CorrectionStatus, ToolCallValidator};
pub use logging::{init_tracing, LogEvent, LogSink, NoopSink, TracingOptions, TracingSink};
pub use necessity::{NecessityClassifier, NecessityDecision, RuleEngine};
pub use oracle::{HttpOracle, Oracle, OracleError, OracleRequest};
pub use tools::{
    ContentBlock, Message, Role, SchemaRegistry, StaticSchemaRegistry, Tool, ToolCall, ToolInput,
};

/// Errors from assembling a [`CallGuard`].
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Classifier and correction pipeline sharing one oracle and log sink.
pub struct CallGuard {
    classifier: NecessityClassifier,
    pipeline: CorrectionPipeline,
}

impl CallGuard {
    /// Build from `config`. An `oracle` section with a model creates an
    /// [`HttpOracle`]; otherwise both services run rules-only.
    pub fn from_config(
        config: &GuardConfig,
        registry: Arc<dyn SchemaRegistry>,
        sink: Arc<dyn LogSink>,
    ) -> Result<Self, GuardError> {
        let oracle: Option<Arc<dyn Oracle>> = match config.oracle {
            Some(ref oracle_config) if !oracle_config.model.trim().is_empty() => {
                let client = HttpOracle::from_config(oracle_config)?;
                tracing::info!(url = %client.url(), model = %oracle_config.model, "oracle configured");
                Some(Arc::new(client))
            }
            _ => {
                tracing::info!("no oracle configured, running rules-only");
                None
            }
        };
        Ok(Self::with_oracle(config, registry, sink, oracle))
    }

    /// Build from `config` with a caller-supplied oracle.
    pub fn with_oracle(
        config: &GuardConfig,
        registry: Arc<dyn SchemaRegistry>,
        sink: Arc<dyn LogSink>,
        oracle: Option<Arc<dyn Oracle>>,
    ) -> Self {
        let classifier =
            NecessityClassifier::from_config(&config.necessity, oracle.clone()).with_sink(sink.clone());
        let pipeline = CorrectionPipeline::from_config(config, registry, oracle).with_sink(sink);
        Self {
            classifier,
            pipeline,
        }
    }

    /// Find `callguard.yaml` from `start` (or `$CALLGUARD_CONFIG`) and build
    /// with the built-in schema registry and tracing sink.
    pub fn load(start: &Path) -> Result<Self, GuardError> {
        let config = load_or_default(start)?;
        Self::from_config(
            &config,
            Arc::new(StaticSchemaRegistry::with_builtin_tools()),
            Arc::new(TracingSink),
        )
    }

    pub fn classifier(&self) -> &NecessityClassifier {
        &self.classifier
    }

    pub fn pipeline(&self) -> &CorrectionPipeline {
        &self.pipeline
    }

    /// Whether the latest user turn requires tool use.
    pub async fn detect_tool_necessity(
        &self,
        messages: &[Message],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> bool {
        self.classifier.detect_tool_necessity(messages, tools, ctx).await
    }

    /// Correct every tool call in an assistant content batch.
    pub async fn process_batch(
        &self,
        items: &[ContentBlock],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> Vec<ContentBlock> {
        self.pipeline.process_batch(items, tools, ctx).await
    }
}
