//! Stage A: scan the conversation for verb, artifact and research signals.

use std::sync::Arc;

use crate::logging::{noop_sink, LogEvent, LogSink};
use crate::tools::names::RESEARCH_TOOLS;
use crate::tools::Message;

use super::types::{ActionPair, Artifact, ArtifactKind, VerbClass};
use super::vocabulary::{
    count_completion_phrases, implementation_lexeme, is_artifact_noun, is_file_like,
    is_strong_verb, match_negation, research_lexeme, tokenize, Token,
};

/// Tokens on each side of a verb searched first for a file-like artifact.
const ARTIFACT_WINDOW: usize = 3;

/// Distinct completion phrases needed to call the last exchange finished.
const COMPLETION_THRESHOLD: usize = 3;

/// Default number of trailing messages scanned for research tool calls.
pub const DEFAULT_RESEARCH_WINDOW: usize = 6;

/// Extracts [`ActionPair`]s from a conversation.
pub struct ActionPairExtractor {
    research_window: usize,
    sink: Arc<dyn LogSink>,
}

impl ActionPairExtractor {
    pub fn new() -> Self {
        Self {
            research_window: DEFAULT_RESEARCH_WINDOW,
            sink: noop_sink(),
        }
    }

    pub fn with_research_window(mut self, window: usize) -> Self {
        self.research_window = window;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Extract signals for the most recent user turn.
    ///
    /// Returns, in order: the negation sentinel (alone, when present), pairs
    /// from the current user message, pairs carried over from the preceding
    /// user message, and research-tool pairs from recent assistant turns.
    pub fn extract(&self, messages: &[Message], request_id: &str) -> Vec<ActionPair> {
        let Some(current_idx) = messages.iter().rposition(Message::is_user) else {
            self.log(request_id, "no user message", &[]);
            return Vec::new();
        };
        let current = &messages[current_idx].content;

        if let Some(family) = match_negation(&current.to_lowercase()) {
            let pairs = vec![ActionPair::negation()];
            self.log_with(
                request_id,
                "negation matched",
                &pairs,
                serde_json::json!({ "family": family.as_str() }),
            );
            return pairs;
        }

        let current_impl = implementation_pairs(current);
        let current_research = research_pairs(current);
        let grounded = current_impl.iter().any(ActionPair::is_grounded_implementation);

        let mut historical = Vec::new();
        if !grounded && !recent_completion(messages, current_idx) {
            if let Some(prev_idx) = messages[..current_idx].iter().rposition(Message::is_user) {
                let trusted = current_impl.is_empty();
                historical = implementation_pairs(&messages[prev_idx].content);
                for pair in &mut historical {
                    pair.confident = trusted;
                }
            }
        }

        let research_done = self.research_done_pairs(messages);

        let mut pairs = current_impl;
        pairs.extend(current_research);
        pairs.extend(historical);
        pairs.extend(research_done);

        self.log(request_id, "extracted action pairs", &pairs);
        pairs
    }

    fn research_done_pairs(&self, messages: &[Message]) -> Vec<ActionPair> {
        let start = messages.len().saturating_sub(self.research_window);
        messages[start..]
            .iter()
            .filter(|m| m.is_assistant())
            .flat_map(|m| m.tool_calls.iter())
            .filter(|call| RESEARCH_TOOLS.contains(&call.name.as_str()))
            .map(|call| ActionPair::research_done(call.name.clone()))
            .collect()
    }

    fn log(&self, request_id: &str, message: &str, pairs: &[ActionPair]) {
        self.log_with(request_id, message, pairs, serde_json::json!({}));
    }

    fn log_with(
        &self,
        request_id: &str,
        message: &str,
        pairs: &[ActionPair],
        mut fields: serde_json::Value,
    ) {
        tracing::debug!(request_id, pair_count = pairs.len(), "{message}");
        if let Some(obj) = fields.as_object_mut() {
            obj.insert(
                "pairs".into(),
                serde_json::to_value(pairs).unwrap_or_default(),
            );
        }
        self.sink.log(&LogEvent {
            component: "extractor",
            category: "signals",
            request_id,
            message,
            fields,
        });
    }
}

impl Default for ActionPairExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Text Scanning ───────────────────────────────────────────────────────────

/// One pair per implementation verb in `text`.
fn implementation_pairs(text: &str) -> Vec<ActionPair> {
    let tokens = tokenize(text);
    tokens
        .iter()
        .enumerate()
        .filter_map(|(i, token)| {
            let lexeme = implementation_lexeme(&token.lower)?;
            let artifact = find_artifact(&tokens, i);
            let confident = artifact.is_some() || is_strong_verb(lexeme);
            Some(ActionPair::verb(
                lexeme,
                VerbClass::Implementation,
                artifact,
                confident,
            ))
        })
        .collect()
}

/// One confident pair per research verb in `text`.
fn research_pairs(text: &str) -> Vec<ActionPair> {
    tokenize(text)
        .iter()
        .filter(|token| implementation_lexeme(&token.lower).is_none())
        .filter_map(|token| research_lexeme(&token.lower))
        .map(|lexeme| ActionPair::verb(lexeme, VerbClass::Research, None, true))
        .collect()
}

/// Artifact for the verb at `verb_idx`: a file-like token near the verb, then
/// anywhere in the message, then the nearest generic noun.
fn find_artifact(tokens: &[Token<'_>], verb_idx: usize) -> Option<Artifact> {
    let by_distance = indices_by_distance(tokens.len(), verb_idx);

    let near_file = by_distance
        .iter()
        .take_while(|&&i| i.abs_diff(verb_idx) <= ARTIFACT_WINDOW)
        .find(|&&i| is_file_like(&tokens[i].lower));
    let file = near_file.copied().or_else(|| {
        (0..tokens.len()).find(|&i| i != verb_idx && is_file_like(&tokens[i].lower))
    });
    if let Some(i) = file {
        return Some(Artifact {
            text: tokens[i].raw.to_string(),
            kind: ArtifactKind::File,
        });
    }

    by_distance
        .iter()
        .find(|&&i| is_artifact_noun(&tokens[i].lower))
        .map(|&i| Artifact {
            text: tokens[i].raw.to_string(),
            kind: ArtifactKind::Noun,
        })
}

/// All indices except `center`, nearest first; after-before on ties.
fn indices_by_distance(len: usize, center: usize) -> Vec<usize> {
    let mut out = Vec::with_capacity(len.saturating_sub(1));
    for d in 1..len {
        if center + d < len {
            out.push(center + d);
        }
        if d <= center {
            out.push(center - d);
        }
    }
    out
}

/// Whether the assistant reported finished work, with a tool call, since the
/// previous user turn.
fn recent_completion(messages: &[Message], current_idx: usize) -> bool {
    let start = messages[..current_idx]
        .iter()
        .rposition(Message::is_user)
        .map(|i| i + 1)
        .unwrap_or(0);
    let window = &messages[start..current_idx];

    let called_tool = window
        .iter()
        .any(|m| m.is_assistant() && m.has_tool_calls());
    if !called_tool {
        return false;
    }

    let text = window
        .iter()
        .filter(|m| m.is_assistant())
        .map(|m| m.content.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n");
    count_completion_phrases(&text) >= COMPLETION_THRESHOLD
}

// ─── Tests ───────────────────────────────────────────────────────────────────
