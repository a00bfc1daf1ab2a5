//! Per-call correction state machine with a retry circuit breaker.
//!
//! ```text
//! Validating ─┬─ acceptable ───────────────────────────────► Finished(Valid | Corrected)
//!             ├─ retries exhausted ────────────────────────► Finished(CircuitOpen)
//!             ├─ unknown tool ─────────────────────────────► Finished(UnknownTool)
//!             ├─ name issue ─► NameFix ──► Revalidating
//!             └─ otherwise ──► ParamFix ─► ToolSpecificFix ─► OracleFix ─► Revalidating
//! ```
//!
//! `Revalidating` behaves like `Validating` but a failure there costs one
//! retry. A fix stage that changes nothing falls through to the next stage;
//! a failed oracle stage costs one retry and goes back to `Validating`.
//! Every step is appended to a [`CorrectionChain`], so giving up on a call
//! means returning the chain's original.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;

use crate::config::GuardConfig;
use crate::context::RequestContext;
use crate::logging::{noop_sink, LogEvent, LogSink};
use crate::oracle::condense::truncate_utf8;
use crate::oracle::{ask, Oracle, OracleRequest};
use crate::tools::names;
use crate::tools::{ContentBlock, SchemaRegistry, Tool, ToolCall, ToolInput};

use super::correctors::{
    apply_name_correction, correct_semantic_misuse, rename_parameters, tool_specific_repair,
    Corrector,
};
use super::json_extract::parse_json_object;
use super::prompt::{build_repair_prompt, REPAIR_SYSTEM_PROMPT};
use super::types::{
    CorrectionChain, CorrectionOutcome, CorrectionStage, CorrectionStatus, ValidationResult,
};
use super::validator::{todo_issues, ToolCallValidator};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_CONCURRENCY: usize = 4;
const DEFAULT_REPAIR_MAX_TOKENS: u32 = 1024;

/// Keys of a `{name, input}` wrapper an oracle may put around the input.
const ENVELOPE_KEYS: &[&str] = &["name", "input", "arguments", "parameters", "id", "type"];
const ENVELOPE_INPUT_KEYS: &[&str] = &["input", "arguments", "parameters"];

enum State {
    Validating,
    Revalidating,
    NameFix(ValidationResult),
    ParamFix(ValidationResult),
    ToolSpecificFix(ValidationResult),
    OracleFix(ValidationResult),
    Finished(CorrectionStatus),
}

enum RuleStep {
    Clean,
    Pending(ValidationResult),
}

/// Validates and repairs the tool calls of one assistant turn.
pub struct CorrectionPipeline {
    validator: ToolCallValidator,
    oracle: Option<Arc<dyn Oracle>>,
    oracle_enabled: bool,
    oracle_max_tokens: u32,
    oracle_temperature: f32,
    max_retries: u32,
    concurrency: usize,
    sink: Arc<dyn LogSink>,
}

impl CorrectionPipeline {
    /// Rules-only pipeline with default limits.
    pub fn new(registry: Arc<dyn SchemaRegistry>) -> Self {
        Self {
            validator: ToolCallValidator::new(registry),
            oracle: None,
            oracle_enabled: true,
            oracle_max_tokens: DEFAULT_REPAIR_MAX_TOKENS,
            oracle_temperature: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
            concurrency: DEFAULT_CONCURRENCY,
            sink: noop_sink(),
        }
    }

    pub fn from_config(
        config: &GuardConfig,
        registry: Arc<dyn SchemaRegistry>,
        oracle: Option<Arc<dyn Oracle>>,
    ) -> Self {
        let mut pipeline = Self::new(registry);
        pipeline.max_retries = config.max_retries;
        pipeline.concurrency = config.correction.concurrency.max(1);
        pipeline.oracle_enabled = config.correction.enable_oracle_repair;
        if let Some(ref oracle_config) = config.oracle {
            pipeline.oracle_max_tokens = oracle_config.max_tokens;
            pipeline.oracle_temperature = oracle_config.temperature;
        }
        pipeline.oracle = oracle;
        pipeline
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn validator(&self) -> &ToolCallValidator {
        &self.validator
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    // ─── Batches ─────────────────────────────────────────────────────────

    /// Correct every tool call in `items`, one at a time, in order.
    ///
    /// Non-tool items pass through unchanged; nothing is dropped.
    pub async fn process_batch(
        &self,
        items: &[ContentBlock],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> Vec<ContentBlock> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            out.push(self.process_item(item, tools, ctx).await);
        }
        out
    }

    /// Like [`process_batch`](Self::process_batch), with up to
    /// `concurrency` calls in flight. Output order matches input order.
    pub async fn process_batch_concurrent(
        &self,
        items: &[ContentBlock],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> Vec<ContentBlock> {
        stream::iter(items)
            .map(|item| self.process_item(item, tools, ctx))
            .buffered(self.concurrency.max(1))
            .collect()
            .await
    }

    async fn process_item(
        &self,
        item: &ContentBlock,
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> ContentBlock {
        match item {
            ContentBlock::ToolUse(call) => ContentBlock::ToolUse(self.correct(call, tools, ctx).await.call),
            other => other.clone(),
        }
    }

    // ─── Single Call ─────────────────────────────────────────────────────

    /// Run one call through the state machine.
    ///
    /// Never fails: the worst case returns the original call unchanged.
    pub async fn correct(
        &self,
        call: &ToolCall,
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> CorrectionOutcome {
        let mut chain = CorrectionChain::new(call.clone());
        let mut retries = 0u32;
        let mut validations = 0u32;
        let mut state = State::Validating;

        let status = loop {
            state = match state {
                s @ (State::Validating | State::Revalidating) => {
                    validations += 1;
                    let result = self.validator.validate(chain.current(), tools);
                    if result.is_acceptable() {
                        let status = if chain.is_empty() {
                            CorrectionStatus::Valid
                        } else {
                            CorrectionStatus::Corrected
                        };
                        State::Finished(status)
                    } else {
                        if matches!(s, State::Revalidating) {
                            retries += 1;
                        }
                        if retries >= self.max_retries {
                            State::Finished(CorrectionStatus::CircuitOpen)
                        } else if result.unknown_tool {
                            State::Finished(CorrectionStatus::UnknownTool)
                        } else if result.needs_name_fix() {
                            State::NameFix(result)
                        } else {
                            State::ParamFix(result)
                        }
                    }
                }

                State::NameFix(result) => {
                    let current = chain.current();
                    let (stage, (fixed, applied)) = if result.has_case_issue {
                        (CorrectionStage::NameFix, apply_name_correction(current, &result))
                    } else {
                        match correct_semantic_misuse(current) {
                            (fixed, true) => (CorrectionStage::SemanticFix, (fixed, true)),
                            _ => (CorrectionStage::NameFix, apply_name_correction(current, &result)),
                        }
                    };
                    if applied {
                        let description = format!("{} -> {}", current.name, fixed.name);
                        chain.push(stage, description, fixed);
                        State::Revalidating
                    } else {
                        State::ParamFix(result)
                    }
                }

                State::ParamFix(result) => {
                    match self.apply_rule(&mut chain, CorrectionStage::ParamFix, rename_parameters, result, tools) {
                        RuleStep::Clean => State::Finished(CorrectionStatus::Corrected),
                        RuleStep::Pending(result) => State::ToolSpecificFix(result),
                    }
                }

                State::ToolSpecificFix(result) => {
                    match self.apply_rule(&mut chain, CorrectionStage::ToolSpecificFix, tool_specific_repair, result, tools) {
                        RuleStep::Clean => State::Finished(CorrectionStatus::Corrected),
                        RuleStep::Pending(result) => State::OracleFix(result),
                    }
                }

                State::OracleFix(result) => {
                    let candidate = if result.has_repairable_issues() {
                        self.oracle_repair(chain.current(), &result, tools, ctx).await
                    } else {
                        None
                    };
                    match candidate {
                        Some(candidate) => {
                            chain.push(CorrectionStage::OracleFix, "oracle rewrite", candidate);
                            State::Revalidating
                        }
                        None => {
                            retries += 1;
                            State::Validating
                        }
                    }
                }

                State::Finished(status) => break status,
            };
        };

        self.finish(call, chain, status, validations, retries, ctx.request_id())
    }

    /// One rule-based stage. A corrector that applies is kept as the working
    /// call even when the result is still invalid.
    fn apply_rule(
        &self,
        chain: &mut CorrectionChain,
        stage: CorrectionStage,
        corrector: Corrector,
        result: ValidationResult,
        tools: &[Tool],
    ) -> RuleStep {
        let (fixed, applied) = corrector(chain.current());
        if !applied {
            return RuleStep::Pending(result);
        }

        let description = match stage {
            CorrectionStage::ParamFix => "parameter rename".to_string(),
            _ => format!("{} repair", fixed.name),
        };
        chain.push(stage, description, fixed);

        let check = self.validator.validate(chain.current(), tools);
        if check.is_acceptable() {
            RuleStep::Clean
        } else {
            RuleStep::Pending(check)
        }
    }

    // ─── Oracle Stage ────────────────────────────────────────────────────

    /// Ask the oracle for a corrected input. `None` means no usable candidate.
    async fn oracle_repair(
        &self,
        call: &ToolCall,
        result: &ValidationResult,
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> Option<ToolCall> {
        let oracle = match (&self.oracle, self.oracle_enabled) {
            (Some(oracle), true) => oracle,
            _ => return None,
        };
        let schema = self.validator.schema_for(tools, &call.name)?;
        let request_id = ctx.request_id();

        let request = OracleRequest {
            system_prompt: REPAIR_SYSTEM_PROMPT.to_string(),
            user_prompt: build_repair_prompt(call, &schema, result),
            max_tokens: self.oracle_max_tokens,
            temperature: self.oracle_temperature,
        };

        let answer = match ask(oracle.as_ref(), &request, ctx).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(request_id, tool = %call.name, error = %e, "repair oracle failed");
                return None;
            }
        };

        let Some(object) = parse_json_object(&answer) else {
            tracing::warn!(
                request_id,
                tool = %call.name,
                answer = %truncate_utf8(answer.trim(), 120),
                "repair oracle returned no JSON object"
            );
            return None;
        };

        let (name, input) = self.unwrap_candidate(object, call, tools);
        let candidate = call.with_name_and_input(name, input);
        if candidate == *call {
            tracing::debug!(request_id, tool = %call.name, "repair oracle returned the call unchanged");
            return None;
        }

        if candidate.name == names::TODO_WRITE {
            let issues = todo_issues(&candidate.input);
            if !issues.is_empty() {
                tracing::warn!(request_id, issues = ?issues, "repair oracle returned a malformed todo list");
                return None;
            }
        }
        Some(candidate)
    }

    /// Accept either a bare input object or a `{name, input}` envelope.
    ///
    /// A name in the envelope is only honoured when a schema exists for it.
    fn unwrap_candidate(
        &self,
        object: ToolInput,
        call: &ToolCall,
        tools: &[Tool],
    ) -> (String, ToolInput) {
        let is_envelope = object.keys().all(|k| ENVELOPE_KEYS.contains(&k.as_str()))
            && ENVELOPE_INPUT_KEYS.iter().any(|k| object.contains_key(*k));
        if !is_envelope {
            return (call.name.clone(), object);
        }

        let input = ENVELOPE_INPUT_KEYS.iter().find_map(|k| match object.get(*k) {
            Some(Value::Object(map)) => Some(map.clone()),
            Some(Value::String(raw)) => parse_json_object(raw),
            _ => None,
        });
        let Some(input) = input else {
            return (call.name.clone(), object);
        };

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| self.validator.schema_for(tools, name).is_some())
            .unwrap_or(&call.name)
            .to_string();
        (name, input)
    }

    // ─── Reporting ───────────────────────────────────────────────────────

    fn finish(
        &self,
        original: &ToolCall,
        chain: CorrectionChain,
        status: CorrectionStatus,
        validations: u32,
        retries: u32,
        request_id: &str,
    ) -> CorrectionOutcome {
        let call = match status {
            CorrectionStatus::Corrected => chain.current().clone(),
            _ => original.clone(),
        };
        let steps = chain.len();

        match status {
            CorrectionStatus::Valid => {
                tracing::debug!(request_id, tool = %call.name, "tool call valid");
            }
            CorrectionStatus::Corrected => {
                tracing::info!(
                    request_id,
                    from = %original.name,
                    to = %call.name,
                    steps,
                    retries,
                    "tool call corrected"
                );
            }
            CorrectionStatus::CircuitOpen => {
                tracing::warn!(
                    request_id,
                    tool = %original.name,
                    steps,
                    retries,
                    "correction retries exhausted, forwarding original call"
                );
            }
            CorrectionStatus::UnknownTool => {
                tracing::warn!(request_id, tool = %original.name, "unknown tool, forwarding unchanged");
            }
        }

        self.sink.log(&LogEvent {
            component: "pipeline",
            category: "correction",
            request_id,
            message: status_message(status),
            fields: serde_json::json!({
                "tool": original.name,
                "final_tool": call.name,
                "tool_use_id": original.id,
                "status": status,
                "validation_attempts": validations,
                "retries": retries,
                "steps": steps,
            }),
        });

        CorrectionOutcome {
            call,
            status,
            validation_attempts: validations,
            retries,
            chain: chain.into_attempts(),
        }
    }
}

fn status_message(status: CorrectionStatus) -> &'static str {
    match status {
        CorrectionStatus::Valid => "valid",
        CorrectionStatus::Corrected => "corrected",
        CorrectionStatus::CircuitOpen => "circuit open",
        CorrectionStatus::UnknownTool => "unknown tool",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::logging::tests::RecordingSink;
    use crate::oracle::testing::ScriptedOracle;
    use crate::oracle::OracleError;
    use crate::tools::StaticSchemaRegistry;

    fn registry() -> Arc<dyn SchemaRegistry> {
        Arc::new(StaticSchemaRegistry::with_builtin_tools())
    }

    fn pipeline() -> CorrectionPipeline {
        CorrectionPipeline::new(registry())
    }

    fn tools(wanted: &[&str]) -> Vec<Tool> {
        let registry = StaticSchemaRegistry::with_builtin_tools();
        wanted.iter().filter_map(|n| registry.get_schema(n)).collect()
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall::from_value("toolu_42", name, input)
    }

    // ─── Rule Paths ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_valid_call_is_untouched() {
        let original = call("Read", json!({"file_path": "src/lib.rs"}));
        let outcome = pipeline()
            .correct(&original, &tools(&["Read"]), &RequestContext::new())
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Valid);
        assert_eq!(outcome.call, original);
        assert_eq!(outcome.validation_attempts, 1);
        assert!(outcome.chain.is_empty());
    }

    #[tokio::test]
    async fn test_case_fix() {
        let outcome = pipeline()
            .correct(
                &call("read", json!({"file_path": "a.rs"})),
                &tools(&["Read"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.call.name, "Read");
        assert_eq!(outcome.call.id, "toolu_42");
        assert_eq!(outcome.chain[0].stage, CorrectionStage::NameFix);
    }

    #[tokio::test]
    async fn test_case_fix_then_param_rename() {
        let outcome = pipeline()
            .correct(
                &call("grep", json!({"query": "TODO"})),
                &tools(&["Grep"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.call.name, "Grep");
        assert_eq!(outcome.call.input_value(), json!({"pattern": "TODO"}));
        let stages: Vec<_> = outcome.chain.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![CorrectionStage::NameFix, CorrectionStage::ParamFix]);
    }

    #[tokio::test]
    async fn test_semantic_fix() {
        let outcome = pipeline()
            .correct(
                &call("WebFetch", json!({"url": "file:///etc/hosts", "prompt": "show"})),
                &tools(&["WebFetch", "Read"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.call.name, "Read");
        assert_eq!(outcome.call.input_value(), json!({"file_path": "/etc/hosts"}));
        assert_eq!(outcome.chain[0].stage, CorrectionStage::SemanticFix);
    }

    #[tokio::test]
    async fn test_slash_command() {
        let outcome = pipeline()
            .correct(
                &call("/security-review", json!({})),
                &tools(&["Task"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.call.name, "Task");
        assert_eq!(outcome.call.input["description"], "Security Review");
        assert_eq!(outcome.call.input["prompt"], "/security-review");
    }

    #[tokio::test]
    async fn test_todo_round_trip() {
        let p = pipeline();
        let ctx = RequestContext::new();
        let outcome = p
            .correct(&call("TodoWrite", json!({"todo": "Fix bug"})), &tools(&["TodoWrite"]), &ctx)
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(
            outcome.call.input_value(),
            json!({"todos": [{"content": "Fix bug", "status": "pending", "priority": "medium", "id": "fix-bug"}]})
        );

        let again = p.correct(&outcome.call, &tools(&["TodoWrite"]), &ctx).await;
        assert_eq!(again.status, CorrectionStatus::Valid);
        assert_eq!(again.call, outcome.call);
    }

    #[tokio::test]
    async fn test_batch_edit_structural_fix() {
        let outcome = pipeline()
            .correct(
                &call(
                    "MultiEdit",
                    json!({"edits": [{"file_path": "src/a.rs", "old_string": "a", "new_string": "b"}]}),
                ),
                &tools(&["MultiEdit"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(
            outcome.call.input_value(),
            json!({"file_path": "src/a.rs", "edits": [{"old_string": "a", "new_string": "b"}]})
        );
        assert_eq!(outcome.chain.last().unwrap().stage, CorrectionStage::ToolSpecificFix);
    }

    #[tokio::test]
    async fn test_unknown_tool_passes_through() {
        let original = call("Teleport", json!({"to": "mars"}));
        let outcome = pipeline()
            .correct(&original, &tools(&["Read"]), &RequestContext::new())
            .await;

        assert_eq!(outcome.status, CorrectionStatus::UnknownTool);
        assert_eq!(outcome.call, original);
    }

    // ─── Oracle Paths ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_partial_rule_progress_then_oracle() {
        // The rename fixes the path; only the oracle can supply the content.
        let oracle = Arc::new(ScriptedOracle::answering(&[
            "```json\n{\"file_path\": \"notes.md\", \"content\": \"hello\"}\n```",
        ]));
        let p = pipeline().with_oracle(oracle.clone());
        let outcome = p
            .correct(
                &call("Write", json!({"path": "notes.md", "body": "hello"})),
                &tools(&["Write"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(
            outcome.call.input_value(),
            json!({"file_path": "notes.md", "content": "hello"})
        );
        assert_eq!(oracle.calls(), 1);
        assert_eq!(outcome.retries, 0);

        let stages: Vec<_> = outcome.chain.iter().map(|a| a.stage).collect();
        assert_eq!(stages, vec![CorrectionStage::ParamFix, CorrectionStage::OracleFix]);

        // The oracle saw the renamed call, not the original.
        let prompt = &oracle.requests.lock().unwrap()[0].user_prompt;
        assert!(prompt.contains("\"file_path\": \"notes.md\""));
        assert!(prompt.contains("unknown parameter 'body'"));
    }

    #[tokio::test]
    async fn test_oracle_envelope_is_unwrapped() {
        let oracle = Arc::new(ScriptedOracle::answering(&[
            r#"{"name": "Bash", "input": {"command": "cargo fmt"}}"#,
        ]));
        let outcome = pipeline()
            .with_oracle(oracle)
            .correct(
                &call("Bash", json!({"run": "cargo fmt"})),
                &tools(&["Bash"]),
                &RequestContext::new(),
            )
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.call.input_value(), json!({"command": "cargo fmt"}));
        assert_eq!(outcome.call.id, "toolu_42");
    }

    #[tokio::test]
    async fn test_circuit_breaker_returns_original() {
        let oracle = Arc::new(ScriptedOracle::always("I am not sure what you mean.", 10));
        let sink = Arc::new(RecordingSink::default());
        let original = call("Bash", json!({"run": "ls"}));

        let outcome = pipeline()
            .with_oracle(oracle.clone())
            .with_sink(sink.clone())
            .correct(&original, &tools(&["Bash"]), &RequestContext::new())
            .await;

        assert_eq!(outcome.status, CorrectionStatus::CircuitOpen);
        assert_eq!(outcome.call, original);
        assert_eq!(outcome.validation_attempts, DEFAULT_MAX_RETRIES + 1);
        assert_eq!(outcome.retries, DEFAULT_MAX_RETRIES);
        assert_eq!(oracle.calls(), DEFAULT_MAX_RETRIES as usize);

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].2, "circuit open");
    }

    #[tokio::test]
    async fn test_circuit_breaker_discards_oracle_attempts() {
        // Parsable, but no rule maps `exec` to `command`.
        let oracle = Arc::new(ScriptedOracle::always(r#"{"exec": "ls"}"#, 10));
        let original = call("Bash", json!({"run": "ls"}));

        let outcome = pipeline()
            .with_oracle(oracle.clone())
            .correct(&original, &tools(&["Bash"]), &RequestContext::new())
            .await;

        assert!(outcome.circuit_opened());
        assert_eq!(outcome.call, original);
        assert_eq!(outcome.validation_attempts, DEFAULT_MAX_RETRIES + 1);
        assert!(!outcome.chain.is_empty());
    }

    #[tokio::test]
    async fn test_oracle_failure_counts_as_retry() {
        let oracle = Arc::new(ScriptedOracle::new(vec![
            Err(OracleError::Timeout { duration_ms: 10 }),
            Ok(r#"{"command": "ls"}"#.to_string()),
        ]));
        let outcome = pipeline()
            .with_oracle(oracle.clone())
            .correct(&call("Bash", json!({"run": "ls"})), &tools(&["Bash"]), &RequestContext::new())
            .await;

        assert_eq!(outcome.status, CorrectionStatus::Corrected);
        assert_eq!(outcome.retries, 1);
        assert_eq!(oracle.calls(), 2);
    }

    #[tokio::test]
    async fn test_malformed_oracle_todo_is_rejected() {
        // The stray `merge` key survives the rules, so the oracle is consulted.
        let oracle = Arc::new(ScriptedOracle::always(
            r#"{"todos": [{"task": "Fix bug"}]}"#,
            10,
        ));
        let original = call("TodoWrite", json!({"todos": [{"content": "x", "priority": "high"}], "merge": true}));

        let outcome = pipeline()
            .with_oracle(oracle.clone())
            .correct(&original, &tools(&["TodoWrite"]), &RequestContext::new())
            .await;

        assert!(outcome.circuit_opened());
        assert_eq!(outcome.call, original);
        assert!(outcome
            .chain
            .iter()
            .all(|a| a.stage != CorrectionStage::OracleFix));
    }

    #[tokio::test]
    async fn test_oracle_disabled_by_config() {
        let mut config = GuardConfig::default();
        config.correction.enable_oracle_repair = false;
        let oracle = Arc::new(ScriptedOracle::always(r#"{"command": "ls"}"#, 10));

        let outcome = CorrectionPipeline::from_config(&config, registry(), Some(oracle.clone() as Arc<dyn Oracle>))
            .correct(&call("Bash", json!({"run": "ls"})), &tools(&["Bash"]), &RequestContext::new())
            .await;

        assert!(outcome.circuit_opened());
        assert_eq!(oracle.calls(), 0);
    }

    // ─── Batches ─────────────────────────────────────────────────────────

    fn batch() -> Vec<ContentBlock> {
        vec![
            ContentBlock::Other(json!({"type": "text", "text": "Let me look."})),
            call("read", json!({"file_path": "a.rs"})).into(),
            ToolCall::from_value("toolu_2", "Teleport", json!({})).into(),
            ToolCall::from_value("toolu_3", "Grep", json!({"search": "fn main"})).into(),
        ]
    }

    #[tokio::test]
    async fn test_process_batch_preserves_order() {
        let items = batch();
        let out = pipeline()
            .process_batch(&items, &tools(&["Read", "Grep"]), &RequestContext::new())
            .await;

        assert_eq!(out.len(), 4);
        assert_eq!(out[0], items[0]);
        assert_eq!(out[1].as_tool_call().unwrap().name, "Read");
        assert_eq!(out[2], items[2]);
        assert_eq!(
            out[3].as_tool_call().unwrap().input_value(),
            json!({"pattern": "fn main"})
        );
    }

    #[tokio::test]
    async fn test_process_batch_concurrent_matches_sequential() {
        let items = batch();
        let p = pipeline().with_concurrency(2);
        let ctx = RequestContext::new();
        let tools = tools(&["Read", "Grep"]);

        let sequential = p.process_batch(&items, &tools, &ctx).await;
        let concurrent = p.process_batch_concurrent(&items, &tools, &ctx).await;
        assert_eq!(sequential, concurrent);
    }

    #[tokio::test]
    async fn test_pipeline_is_idempotent_on_its_output() {
        let p = pipeline();
        let ctx = RequestContext::new();
        let tools = tools(&["Read", "Grep"]);

        let once = p.process_batch(&batch(), &tools, &ctx).await;
        let twice = p.process_batch(&once, &tools, &ctx).await;
        assert_eq!(once, twice);
    }
}
