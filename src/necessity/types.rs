//! Signal and decision types for necessity detection.

use serde::Serialize;

// ─── Signals ─────────────────────────────────────────────────────────────────

/// Where an artifact mention came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A token that looks like a file name or path (`src/main.rs`, `Makefile`).
    File,
    /// A generic noun such as "config" or "script".
    Noun,
}

/// The object a verb acts on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    /// As written in the message, original casing preserved.
    pub text: String,
    pub kind: ArtifactKind,
}

/// Which vocabulary a verb came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerbClass {
    /// Changes something (create, fix, run, …).
    Implementation,
    /// Only looks at something (read, explain, …).
    Research,
}

/// One extracted signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Signal {
    /// A verb from one of the vocabularies, with the artifact it was paired to.
    Verb {
        /// Base form ("running" is reported as "run").
        lexeme: String,
        class: VerbClass,
        artifact: Option<Artifact>,
    },
    /// The assistant already invoked a research tool recently.
    ResearchDone { tool: String },
    /// The request asks for explanation only.
    Negation,
}

/// A signal plus whether the extractor trusts it.
///
/// Rules only look at confident pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionPair {
    pub signal: Signal,
    pub confident: bool,
}

impl ActionPair {
    pub fn negation() -> Self {
        Self {
            signal: Signal::Negation,
            confident: true,
        }
    }

    pub fn research_done(tool: impl Into<String>) -> Self {
        Self {
            signal: Signal::ResearchDone { tool: tool.into() },
            confident: true,
        }
    }

    pub fn verb(
        lexeme: impl Into<String>,
        class: VerbClass,
        artifact: Option<Artifact>,
        confident: bool,
    ) -> Self {
        Self {
            signal: Signal::Verb {
                lexeme: lexeme.into(),
                class,
                artifact,
            },
            confident,
        }
    }

    pub fn is_negation(&self) -> bool {
        matches!(self.signal, Signal::Negation)
    }

    pub fn is_research_done(&self) -> bool {
        matches!(self.signal, Signal::ResearchDone { .. })
    }

    /// `(lexeme, class, artifact)` when this is a verb signal.
    pub fn as_verb(&self) -> Option<(&str, VerbClass, Option<&Artifact>)> {
        match &self.signal {
            Signal::Verb {
                lexeme,
                class,
                artifact,
            } => Some((lexeme.as_str(), *class, artifact.as_ref())),
            _ => None,
        }
    }

    /// Implementation verb with a paired artifact.
    pub fn is_grounded_implementation(&self) -> bool {
        matches!(
            self.as_verb(),
            Some((_, VerbClass::Implementation, Some(_)))
        )
    }
}

// ─── Decisions ───────────────────────────────────────────────────────────────

/// Outcome of a rule, the engine, or the oracle.
///
/// `confident == false` means "defer to the next stage".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleDecision {
    pub require_tools: bool,
    pub confident: bool,
    pub reason: String,
}

impl RuleDecision {
    pub fn new(require_tools: bool, confident: bool, reason: impl Into<String>) -> Self {
        Self {
            require_tools,
            confident,
            reason: reason.into(),
        }
    }
}

/// Which stage produced the final necessity answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum DecisionStage {
    /// A confident rule decided.
    Rules { rule: String },
    /// The rule engine deferred and the oracle answered.
    Oracle,
    /// The rule engine deferred and the oracle was unavailable or failed;
    /// the conservative default (no tools) was applied.
    Fallback { rule: String },
}

/// Full necessity answer with provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NecessityDecision {
    pub decision: RuleDecision,
    pub stage: DecisionStage,
    pub pairs: Vec<ActionPair>,
}

impl NecessityDecision {
    pub fn require_tools(&self) -> bool {
        self.decision.require_tools
    }
}
