use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use callguard::config::parse_config;
use callguard::{
    CallGuard, ContentBlock, CorrectionStatus, LogEvent, LogSink, Message, Oracle, OracleError,
    OracleRequest, RequestContext, SchemaRegistry, StaticSchemaRegistry, Tool, ToolCall,
};

/// Answers necessity questions with `verdict` and repair questions with `repair`.
struct FakeOracle {
    verdict: &'static str,
    repair: &'static str,
    calls: AtomicUsize,
}

impl FakeOracle {
    fn new(verdict: &'static str, repair: &'static str) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            repair,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn send(&self, request: &OracleRequest) -> Result<String, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.user_prompt.contains("Corrected input JSON") {
            Ok(self.repair.to_string())
        } else {
            Ok(self.verdict.to_string())
        }
    }
}

#[derive(Default)]
struct CollectingSink {
    components: Mutex<Vec<String>>,
}

impl LogSink for CollectingSink {
    fn log(&self, event: &LogEvent<'_>) {
        self.components
            .lock()
            .unwrap()
            .push(event.component.to_string());
    }
}

fn builtin_tools() -> Vec<Tool> {
    let registry = StaticSchemaRegistry::with_builtin_tools();
    registry
        .tool_names()
        .into_iter()
        .filter_map(|name| registry.get_schema(name))
        .collect()
}

fn guard_with(oracle: Arc<FakeOracle>, sink: Arc<CollectingSink>) -> CallGuard {
    let config = parse_config("max_retries: 3\ncorrection:\n  concurrency: 2\n").unwrap();
    CallGuard::with_oracle(
        &config,
        Arc::new(StaticSchemaRegistry::with_builtin_tools()),
        sink,
        Some(oracle as Arc<dyn Oracle>),
    )
}

#[tokio::test]
async fn test_necessity_rules_and_oracle_fallback() {
    let oracle = FakeOracle::new("YES, tools are needed.", "{}");
    let guard = guard_with(oracle.clone(), Arc::new(CollectingSink::default()));
    let ctx = RequestContext::new();
    let tools = builtin_tools();

    let negated = vec![Message::user("explain how to fix the config.yaml file")];
    assert!(!guard.detect_tool_necessity(&negated, &tools, &ctx).await);

    let direct = vec![Message::user("please update CLAUDE.md with the new API docs")];
    assert!(guard.detect_tool_necessity(&direct, &tools, &ctx).await);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);

    let vague = vec![Message::user("what's going on with the login flow?")];
    assert!(guard.detect_tool_necessity(&vague, &tools, &ctx).await);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batch_correction_end_to_end() {
    let oracle = FakeOracle::new("NO", r#"{"command": "cargo test"}"#);
    let sink = Arc::new(CollectingSink::default());
    let guard = guard_with(oracle.clone(), sink.clone());
    let ctx = RequestContext::new().with_request_id("req_e2e");
    let tools = builtin_tools();

    let items = vec![
        ContentBlock::Other(json!({"type": "text", "text": "On it."})),
        ToolCall::from_value("toolu_a", "todowrite", json!({"todo": "Fix bug"})).into(),
        ToolCall::from_value("toolu_b", "Bash", json!({"run": "cargo test"})).into(),
        ToolCall::from_value("toolu_c", "Summon", json!({})).into(),
    ];
    let out = guard.process_batch(&items, &tools, &ctx).await;

    assert_eq!(out.len(), items.len());
    assert_eq!(out[0], items[0]);

    let todo = out[1].as_tool_call().unwrap();
    assert_eq!(todo.id, "toolu_a");
    assert_eq!(todo.name, "TodoWrite");
    assert_eq!(
        todo.input_value(),
        json!({"todos": [{"content": "Fix bug", "status": "pending", "priority": "medium", "id": "fix-bug"}]})
    );

    let bash = out[2].as_tool_call().unwrap();
    assert_eq!(bash.id, "toolu_b");
    assert_eq!(bash.input_value(), json!({"command": "cargo test"}));

    assert_eq!(out[3], items[3]);
    assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.components.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_circuit_breaker_and_concurrent_batch() {
    let oracle = FakeOracle::new("NO", "no idea, sorry");
    let guard = guard_with(oracle.clone(), Arc::new(CollectingSink::default()));
    let ctx = RequestContext::new();
    let tools = builtin_tools();

    let broken = ToolCall::from_value("toolu_x", "Write", json!({"body": "hello"}));
    let outcome = guard.pipeline().correct(&broken, &tools, &ctx).await;
    assert_eq!(outcome.status, CorrectionStatus::CircuitOpen);
    assert_eq!(outcome.call, broken);
    assert_eq!(outcome.validation_attempts, 4);

    let items: Vec<ContentBlock> = (0..6)
        .map(|i| {
            ToolCall::from_value(format!("toolu_{i}"), "Glob", json!({"query": format!("**/*.{i}")}))
                .into()
        })
        .collect();
    let out = guard
        .pipeline()
        .process_batch_concurrent(&items, &tools, &ctx)
        .await;

    for (i, item) in out.iter().enumerate() {
        let call = item.as_tool_call().unwrap();
        assert_eq!(call.id, format!("toolu_{i}"));
        assert_eq!(call.input_value(), json!({"pattern": format!("**/*.{i}")}));
    }
}

#[test]
fn test_content_blocks_round_trip_through_json() {
    let raw = json!([
        {"type": "text", "text": "hi"},
        {"type": "tool_use", "id": "toolu_1", "name": "Read", "input": {"file_path": "a.rs"}}
    ]);
    let blocks: Vec<ContentBlock> = serde_json::from_value(raw.clone()).unwrap();
    assert!(blocks[0].as_tool_call().is_none());
    assert_eq!(blocks[1].as_tool_call().unwrap().name, "Read");
    assert_eq!(serde_json::to_value(&blocks).unwrap(), raw);
}
