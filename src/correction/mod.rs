//! Tool-call validation and correction.
//!
//! [`validator`] reports what is wrong with a call, [`correctors`] hold the
//! deterministic repairs, and [`pipeline`] sequences both with an oracle
//! fallback under a retry budget.

pub mod correctors;
pub mod json_extract;
pub mod pipeline;
pub mod prompt;
pub mod types;
pub mod validator;

pub use pipeline::CorrectionPipeline;
pub use types::{
    CorrectionAttempt, CorrectionChain, CorrectionOutcome, CorrectionStage, CorrectionStatus,
    ValidationResult,
};
pub use validator::ToolCallValidator;
