//! Hybrid necessity classifier: rules first, oracle only when they defer.

use std::sync::Arc;

use crate::config::NecessityConfig;
use crate::context::RequestContext;
use crate::logging::{noop_sink, LogEvent, LogSink};
use crate::oracle::condense::{condense_transcript, truncate_utf8};
use crate::oracle::{ask, parse_leading_verdict, Oracle, OracleRequest};
use crate::tools::{Message, Tool};

use super::engine::RuleEngine;
use super::extractor::ActionPairExtractor;
use super::types::{DecisionStage, NecessityDecision, RuleDecision};

/// Default number of messages shown to the oracle.
pub const DEFAULT_HISTORY_WINDOW: usize = 10;

/// A one-word answer needs very few tokens.
const NECESSITY_MAX_TOKENS: u32 = 8;

const NECESSITY_SYSTEM_PROMPT: &str = "\
You decide whether an AI coding assistant must call tools to respond to the \
user's latest message. Tools read, search and edit files and run commands.
Answer YES if responding needs file access, code changes, command execution \
or searching the project.
Answer NO if it can be answered from general knowledge or the conversation alone.
Reply with exactly one word: YES or NO.";

/// Decides whether a turn needs tool use.
pub struct NecessityClassifier {
    extractor: ActionPairExtractor,
    engine: RuleEngine,
    oracle: Option<Arc<dyn Oracle>>,
    oracle_enabled: bool,
    history_window: usize,
    sink: Arc<dyn LogSink>,
}

impl NecessityClassifier {
    /// Rules-only classifier with the built-in rule set.
    pub fn new() -> Self {
        Self {
            extractor: ActionPairExtractor::new(),
            engine: RuleEngine::new(),
            oracle: None,
            oracle_enabled: true,
            history_window: DEFAULT_HISTORY_WINDOW,
            sink: noop_sink(),
        }
    }

    pub fn from_config(config: &NecessityConfig, oracle: Option<Arc<dyn Oracle>>) -> Self {
        let mut classifier = Self::new();
        classifier.extractor = ActionPairExtractor::new().with_research_window(config.research_window);
        classifier.history_window = config.history_window;
        classifier.oracle_enabled = config.enable_oracle_fallback;
        classifier.oracle = oracle;
        classifier
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Route this classifier's and its extractor's logs to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.extractor = std::mem::take(&mut self.extractor).with_sink(sink.clone());
        self.sink = sink;
        self
    }

    pub fn with_engine(mut self, engine: RuleEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Mutable access for registering extra rules before first use.
    pub fn engine_mut(&mut self) -> &mut RuleEngine {
        &mut self.engine
    }

    /// Whether the latest user turn requires tool use.
    pub async fn detect_tool_necessity(
        &self,
        messages: &[Message],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> bool {
        self.decide(messages, tools, ctx).await.require_tools()
    }

    /// Full decision with the stage that produced it.
    ///
    /// A confident rule decision is final. Otherwise the oracle is asked; if
    /// it is absent, disabled, fails, or gives no recognisable verdict, the
    /// answer is "no tools".
    pub async fn decide(
        &self,
        messages: &[Message],
        tools: &[Tool],
        ctx: &RequestContext,
    ) -> NecessityDecision {
        let request_id = ctx.request_id();
        let pairs = self.extractor.extract(messages, request_id);
        let (rule, decision) = self.engine.evaluate_named(&pairs, messages);

        if decision.confident {
            self.log(request_id, "rules decided", &decision, &rule);
            return NecessityDecision {
                decision,
                stage: DecisionStage::Rules { rule },
                pairs,
            };
        }

        let oracle = match (&self.oracle, self.oracle_enabled) {
            (Some(oracle), true) => oracle,
            _ => {
                let decision = RuleDecision::new(
                    false,
                    false,
                    format!("{rule} deferred and no oracle is available"),
                );
                self.log(request_id, "no oracle, defaulting to no tools", &decision, &rule);
                return NecessityDecision {
                    decision,
                    stage: DecisionStage::Fallback { rule },
                    pairs,
                };
            }
        };

        let request = self.build_request(messages, tools);
        let outcome = match ask(oracle.as_ref(), &request, ctx).await {
            Ok(answer) => match parse_leading_verdict(&answer) {
                Some(verdict) => Ok(verdict.is_affirmative()),
                None => Err(format!(
                    "unrecognised verdict: {:?}",
                    truncate_utf8(answer.trim(), 40)
                )),
            },
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(require_tools) => {
                let decision = RuleDecision::new(
                    require_tools,
                    true,
                    format!("oracle answered {}", if require_tools { "YES" } else { "NO" }),
                );
                self.log(request_id, "oracle decided", &decision, &rule);
                NecessityDecision {
                    decision,
                    stage: DecisionStage::Oracle,
                    pairs,
                }
            }
            Err(reason) => {
                tracing::warn!(request_id, error = %reason, "necessity oracle failed, defaulting to no tools");
                let decision =
                    RuleDecision::new(false, false, format!("oracle failed: {reason}"));
                self.log(request_id, "oracle failed, defaulting to no tools", &decision, &rule);
                NecessityDecision {
                    decision,
                    stage: DecisionStage::Fallback { rule },
                    pairs,
                }
            }
        }
    }

    fn build_request(&self, messages: &[Message], tools: &[Tool]) -> OracleRequest {
        let tool_names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        let tool_line = if tool_names.is_empty() {
            "(none declared)".to_string()
        } else {
            tool_names.join(", ")
        };

        let user_prompt = format!(
            "Available tools: {tool_line}\n\n\
             Conversation (most recent last):\n{}\n\n\
             Does the assistant need to call a tool to respond to the latest user message?",
            condense_transcript(messages, self.history_window)
        );

        OracleRequest {
            system_prompt: NECESSITY_SYSTEM_PROMPT.to_string(),
            user_prompt,
            max_tokens: NECESSITY_MAX_TOKENS,
            temperature: 0.0,
        }
    }

    fn log(&self, request_id: &str, message: &str, decision: &RuleDecision, rule: &str) {
        tracing::info!(
            request_id,
            rule,
            require_tools = decision.require_tools,
            confident = decision.confident,
            reason = %decision.reason,
            "{message}"
        );
        self.sink.log(&LogEvent {
            component: "classifier",
            category: "decision",
            request_id,
            message,
            fields: serde_json::json!({
                "rule": rule,
                "require_tools": decision.require_tools,
                "confident": decision.confident,
                "reason": decision.reason,
            }),
        });
    }
}

impl Default for NecessityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::logging::tests::RecordingSink;
    use crate::oracle::testing::{ScriptedOracle, StallingOracle};
    use crate::oracle::OracleError;
    use crate::tools::ToolCall;

    fn tools() -> Vec<Tool> {
        vec![
            Tool::new("Read", "", &["file_path"], &["file_path"]),
            Tool::new("Edit", "", &["file_path"], &["file_path"]),
        ]
    }

    async fn decide_with(oracle: Option<Arc<dyn Oracle>>, text: &str) -> NecessityDecision {
        let mut classifier = NecessityClassifier::new();
        if let Some(oracle) = oracle {
            classifier = classifier.with_oracle(oracle);
        }
        classifier
            .decide(&[Message::user(text)], &tools(), &RequestContext::new())
            .await
    }

    #[tokio::test]
    async fn test_negation_precedence() {
        let d = decide_with(None, "explain how to fix the config.yaml file").await;
        assert!(!d.decision.require_tools);
        assert!(d.decision.confident);
        assert_eq!(
            d.stage,
            DecisionStage::Rules {
                rule: "ContextualNegation".into()
            }
        );
    }

    #[tokio::test]
    async fn test_strong_verb_with_file() {
        let d = decide_with(None, "please update CLAUDE.md with the new API docs").await;
        assert!(d.require_tools());
        assert!(d.decision.confident);
        assert_eq!(
            d.stage,
            DecisionStage::Rules {
                rule: "StrongVerbWithFile".into()
            }
        );
    }

    #[tokio::test]
    async fn test_pure_research() {
        let d = decide_with(None, "read the README and explain what it does").await;
        assert!(!d.require_tools());
        assert!(d.decision.confident);
        assert_eq!(
            d.stage,
            DecisionStage::Rules {
                rule: "PureResearch".into()
            }
        );
    }

    #[tokio::test]
    async fn test_weak_change_with_research_verb_defers() {
        let d = decide_with(None, "explain the logic and change it").await;
        assert!(!d.require_tools());
        assert!(!d.decision.confident);
        assert_eq!(
            d.stage,
            DecisionStage::Fallback {
                rule: "AmbiguousRequest".into()
            }
        );
    }

    #[tokio::test]
    async fn test_change_after_search_requires_tools() {
        let messages = vec![
            Message::user("look into the flaky build"),
            Message::assistant_with_tools(
                "Searching the CI config.",
                vec![ToolCall::from_value("toolu_1", "Grep", json!({"pattern": "flaky"}))],
            ),
            Message::user("ok now change it"),
        ];
        let d = NecessityClassifier::new()
            .decide(&messages, &tools(), &RequestContext::new())
            .await;
        assert!(d.require_tools());
        assert!(d.decision.confident);
        assert_eq!(
            d.stage,
            DecisionStage::Rules {
                rule: "ResearchCompletion".into()
            }
        );
    }

    #[tokio::test]
    async fn test_multibyte_text_does_not_panic() {
        let d = decide_with(None, "compare H₂ing samples").await;
        assert!(!d.require_tools());
    }

    #[tokio::test]
    async fn test_confident_rules_skip_oracle() {
        let oracle = Arc::new(ScriptedOracle::answering(&["NO"]));
        let d = decide_with(Some(oracle.clone()), "run the tests").await;
        assert!(d.require_tools());
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_ambiguous_defers_to_oracle() {
        let oracle = Arc::new(ScriptedOracle::answering(&["Yes, it needs to look at files."]));
        let d = decide_with(Some(oracle.clone()), "what's going on with the login flow?").await;
        assert!(d.require_tools());
        assert_eq!(d.stage, DecisionStage::Oracle);
        assert_eq!(oracle.calls(), 1);

        let request = oracle.requests.lock().unwrap()[0].clone();
        assert!(request.user_prompt.contains("Available tools: Read, Edit"));
        assert!(request.user_prompt.contains("user: what's going on with the login flow?"));
        assert_eq!(request.max_tokens, NECESSITY_MAX_TOKENS);
    }

    #[tokio::test]
    async fn test_oracle_no() {
        let oracle = Arc::new(ScriptedOracle::answering(&["no"]));
        assert!(!decide_with(Some(oracle), "hmm, thoughts?").await.require_tools());
    }

    #[tokio::test]
    async fn test_oracle_failure_defaults_to_false() {
        let oracle = Arc::new(ScriptedOracle::new(vec![Err(OracleError::HttpError {
            status: 503,
            body: "overloaded".into(),
        })]));
        let d = decide_with(Some(oracle), "hmm, thoughts?").await;
        assert!(!d.require_tools());
        assert!(matches!(d.stage, DecisionStage::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_unparseable_verdict_defaults_to_false() {
        let oracle = Arc::new(ScriptedOracle::answering(&["Probably, yes."]));
        let d = decide_with(Some(oracle), "hmm, thoughts?").await;
        assert!(!d.require_tools());
        assert!(matches!(d.stage, DecisionStage::Fallback { .. }));
    }

    #[tokio::test]
    async fn test_unconfident_strong_verb_without_oracle_is_false() {
        // "refactor" is strong but not high-certainty, so the rules defer.
        let d = decide_with(None, "refactor it please").await;
        assert!(!d.require_tools());
        assert_eq!(
            d.stage,
            DecisionStage::Fallback {
                rule: "StrongVerbWithoutArtifact".into()
            }
        );
    }

    #[tokio::test]
    async fn test_oracle_timeout_defaults_to_false() {
        let classifier = NecessityClassifier::new().with_oracle(Arc::new(StallingOracle));
        let ctx = RequestContext::new().with_oracle_timeout(Duration::from_millis(10));
        let required = classifier
            .detect_tool_necessity(&[Message::user("hmm, thoughts?")], &tools(), &ctx)
            .await;
        assert!(!required);
    }

    #[tokio::test]
    async fn test_disabled_fallback_never_calls_oracle() {
        let oracle = Arc::new(ScriptedOracle::answering(&["YES"]));
        let config = NecessityConfig {
            enable_oracle_fallback: false,
            ..NecessityConfig::default()
        };
        let classifier = NecessityClassifier::from_config(&config, Some(oracle.clone()));
        let required = classifier
            .detect_tool_necessity(&[Message::user("hmm?")], &tools(), &RequestContext::new())
            .await;
        assert!(!required);
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_sink_receives_extractor_and_classifier_events() {
        let sink = Arc::new(RecordingSink::default());
        let classifier = NecessityClassifier::new().with_sink(sink.clone());
        classifier
            .decide(&[Message::user("run the tests")], &tools(), &RequestContext::new())
            .await;

        let events = sink.events.lock().unwrap();
        let components: Vec<&str> = events.iter().map(|e| e.0.as_str()).collect();
        assert_eq!(components, vec!["extractor", "classifier"]);
    }
}
