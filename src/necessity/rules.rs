//! Stage B rules.
//!
//! Each rule inspects the pairs (and, if it needs to, the raw conversation)
//! and either declines or produces a decision. Verb-plus-artifact rules only
//! trust confident pairs; the presence checks count every implementation verb. The engine
//! evaluates rules from highest to lowest priority and the first match wins,
//! even when that match is itself unconfident.

use crate::tools::Message;

use super::types::{ActionPair, Artifact, RuleDecision, VerbClass};
use super::vocabulary::{is_high_certainty_verb, is_strong_verb};

/// A deterministic necessity rule.
pub trait Rule: Send + Sync {
    fn priority(&self) -> i32;
    fn name(&self) -> &str;
    fn is_satisfied_by(&self, pairs: &[ActionPair], messages: &[Message]) -> Option<RuleDecision>;
}

// ─── Pair Queries ────────────────────────────────────────────────────────────

fn confident_verbs(
    pairs: &[ActionPair],
    class: VerbClass,
) -> impl Iterator<Item = (&str, Option<&Artifact>)> {
    pairs
        .iter()
        .filter(|p| p.confident)
        .filter_map(|p| p.as_verb())
        .filter(move |(_, c, _)| *c == class)
        .map(|(lexeme, _, artifact)| (lexeme, artifact))
}

/// Any implementation verb, confident or not.
fn has_implementation_verb(pairs: &[ActionPair]) -> bool {
    pairs
        .iter()
        .filter_map(|p| p.as_verb())
        .any(|(_, class, _)| class == VerbClass::Implementation)
}

// ─── Rules ───────────────────────────────────────────────────────────────────

/// The request asked for explanation only.
pub struct ContextualNegation;

impl Rule for ContextualNegation {
    fn priority(&self) -> i32 {
        110
    }

    fn name(&self) -> &str {
        "ContextualNegation"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        pairs
            .iter()
            .any(|p| p.confident && p.is_negation())
            .then(|| RuleDecision::new(false, true, "request asks for explanation only"))
    }
}

/// A strong verb aimed at a named artifact.
pub struct StrongVerbWithFile;

impl Rule for StrongVerbWithFile {
    fn priority(&self) -> i32 {
        100
    }

    fn name(&self) -> &str {
        "StrongVerbWithFile"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        confident_verbs(pairs, VerbClass::Implementation)
            .find_map(|(lexeme, artifact)| {
                artifact.filter(|_| is_strong_verb(lexeme)).map(|a| (lexeme, a))
            })
            .map(|(lexeme, artifact)| {
                RuleDecision::new(
                    true,
                    true,
                    format!("strong verb '{lexeme}' targets {}", artifact.text),
                )
            })
    }
}

/// Any implementation verb aimed at a named artifact.
pub struct ImplementationVerbWithFile;

impl Rule for ImplementationVerbWithFile {
    fn priority(&self) -> i32 {
        90
    }

    fn name(&self) -> &str {
        "ImplementationVerbWithFile"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        confident_verbs(pairs, VerbClass::Implementation)
            .find_map(|(lexeme, artifact)| artifact.map(|a| (lexeme, a)))
            .map(|(lexeme, artifact)| {
                RuleDecision::new(
                    true,
                    true,
                    format!("verb '{lexeme}' targets {}", artifact.text),
                )
            })
    }
}

/// Research already happened and the user now wants a change.
pub struct ResearchCompletion;

impl Rule for ResearchCompletion {
    fn priority(&self) -> i32 {
        80
    }

    fn name(&self) -> &str {
        "ResearchCompletion"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        let researched = pairs.iter().any(|p| p.confident && p.is_research_done());
        (researched && has_implementation_verb(pairs)).then(|| {
            RuleDecision::new(true, true, "research done and an implementation verb follows")
        })
    }
}

/// A strong verb with no artifact. Only a handful of verbs are trusted alone.
pub struct StrongVerbWithoutArtifact;

impl Rule for StrongVerbWithoutArtifact {
    fn priority(&self) -> i32 {
        70
    }

    fn name(&self) -> &str {
        "StrongVerbWithoutArtifact"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        let strong: Vec<&str> = confident_verbs(pairs, VerbClass::Implementation)
            .map(|(lexeme, _)| lexeme)
            .filter(|lexeme| is_strong_verb(lexeme))
            .collect();
        if strong.is_empty() {
            return None;
        }

        let certain = strong.iter().find(|lexeme| is_high_certainty_verb(lexeme));
        Some(match certain {
            Some(lexeme) => RuleDecision::new(true, true, format!("high-certainty verb '{lexeme}'")),
            None => RuleDecision::new(
                true,
                false,
                format!("strong verb '{}' without an artifact", strong[0]),
            ),
        })
    }
}

/// Only research verbs.
pub struct PureResearch;

impl Rule for PureResearch {
    fn priority(&self) -> i32 {
        60
    }

    fn name(&self) -> &str {
        "PureResearch"
    }

    fn is_satisfied_by(&self, pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        let research = confident_verbs(pairs, VerbClass::Research).next().is_some();
        (research && !has_implementation_verb(pairs))
            .then(|| RuleDecision::new(false, true, "research verbs only"))
    }
}

/// Always matches; defers to the oracle.
pub struct AmbiguousRequest;

impl Rule for AmbiguousRequest {
    fn priority(&self) -> i32 {
        10
    }

    fn name(&self) -> &str {
        "AmbiguousRequest"
    }

    fn is_satisfied_by(&self, _pairs: &[ActionPair], _messages: &[Message]) -> Option<RuleDecision> {
        Some(RuleDecision::new(false, false, "no decisive signal"))
    }
}

/// The built-in rule set.
pub fn default_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(ContextualNegation),
        Box::new(StrongVerbWithFile),
        Box::new(ImplementationVerbWithFile),
        Box::new(ResearchCompletion),
        Box::new(StrongVerbWithoutArtifact),
        Box::new(PureResearch),
        Box::new(AmbiguousRequest),
    ]
}

// ─── Tests ───────────────────────────────────────────────────────────────────
