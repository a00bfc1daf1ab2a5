//! Priority-ordered rule evaluation.

use crate::tools::Message;

use super::rules::{default_rules, AmbiguousRequest, Rule};
use super::types::{ActionPair, RuleDecision};

/// Holds rules sorted by descending priority; insertion order breaks ties.
///
/// Built once per classifier and read concurrently afterwards; additions
/// take `&mut self`.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// Engine with the built-in rule set.
    pub fn new() -> Self {
        let mut engine = Self { rules: Vec::new() };
        engine.add_rules(default_rules());
        engine
    }

    /// Insert one rule and re-sort.
    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
        self.sort();
    }

    /// Insert a batch of rules and sort once.
    pub fn add_rules(&mut self, rules: impl IntoIterator<Item = Box<dyn Rule>>) {
        self.rules.extend(rules);
        self.sort();
    }

    /// Builder-style [`add_rule`](Self::add_rule).
    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.add_rule(rule);
        self
    }

    fn sort(&mut self) {
        // `sort_by` is stable, so equal priorities keep insertion order.
        self.rules.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// Rule names in evaluation order.
    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// First matching rule's decision.
    pub fn evaluate(&self, pairs: &[ActionPair], messages: &[Message]) -> RuleDecision {
        self.evaluate_named(pairs, messages).1
    }

    /// First matching rule's name and decision.
    ///
    /// Total: the built-in fallback rule always matches, and is re-applied
    /// here if a caller somehow evaluates an engine without it.
    pub fn evaluate_named(&self, pairs: &[ActionPair], messages: &[Message]) -> (String, RuleDecision) {
        for rule in &self.rules {
            if let Some(decision) = rule.is_satisfied_by(pairs, messages) {
                tracing::debug!(
                    rule = rule.name(),
                    priority = rule.priority(),
                    require_tools = decision.require_tools,
                    confident = decision.confident,
                    "rule matched"
                );
                return (rule.name().to_string(), decision);
            }
        }

        let fallback = AmbiguousRequest;
        let decision = fallback
            .is_satisfied_by(pairs, messages)
            .unwrap_or_else(|| RuleDecision::new(false, false, "no decisive signal"));
        (fallback.name().to_string(), decision)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
