//! Tool-necessity detection.
//!
//! Stage A ([`extractor`]) turns the conversation into signals, stage B
//! ([`engine`] + [`rules`]) maps signals to a decision, and the
//! [`classifier`] escalates to the oracle only when stage B is not confident.

pub mod classifier;
pub mod engine;
pub mod extractor;
pub mod rules;
pub mod types;
pub mod vocabulary;

pub use classifier::NecessityClassifier;
pub use engine::RuleEngine;
pub use extractor::ActionPairExtractor;
pub use rules::Rule;
pub use types::{
    ActionPair, Artifact, ArtifactKind, DecisionStage, NecessityDecision, RuleDecision, Signal,
    VerbClass,
};
