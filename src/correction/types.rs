//! Validation results and correction bookkeeping.

use serde::Serialize;

use crate::tools::{ToolCall, ToolInput};

// ─── Validation ──────────────────────────────────────────────────────────────

/// What is wrong with one tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    /// No parameter problems and no name problems of any kind.
    pub is_valid: bool,
    /// The name only matched a schema case-insensitively.
    pub has_case_issue: bool,
    /// The call should target a different tool (slash command, semantic misuse).
    pub has_tool_name_issue: bool,
    /// Name to switch to when either name flag is set.
    pub correct_tool_name: Option<String>,
    /// Required keys absent from the input, in schema order.
    pub missing_params: Vec<String>,
    /// Input keys the schema does not declare.
    pub invalid_params: Vec<String>,
    /// Replacement input that goes with `correct_tool_name`, when the input
    /// must change shape along with the name.
    pub corrected_input: Option<ToolInput>,
    /// Shape problems inside otherwise well-named parameters.
    pub structural_issues: Vec<String>,
    /// No schema exists for this tool anywhere.
    pub unknown_tool: bool,
}

impl ValidationResult {
    /// Valid and structurally sound: the pipeline accepts the call as-is.
    pub fn is_acceptable(&self) -> bool {
        self.is_valid && self.structural_issues.is_empty()
    }

    pub fn needs_name_fix(&self) -> bool {
        self.has_case_issue || self.has_tool_name_issue
    }

    pub fn has_param_issues(&self) -> bool {
        !self.missing_params.is_empty() || !self.invalid_params.is_empty()
    }

    /// Something an input rewrite could repair.
    pub fn has_repairable_issues(&self) -> bool {
        self.has_param_issues() || !self.structural_issues.is_empty()
    }

    /// Human-readable issue list, for prompts and logs.
    pub fn describe_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.unknown_tool {
            issues.push("unknown tool".to_string());
        }
        if let Some(ref name) = self.correct_tool_name {
            if self.needs_name_fix() {
                issues.push(format!("tool should be '{name}'"));
            }
        }
        issues.extend(
            self.missing_params
                .iter()
                .map(|p| format!("missing required parameter '{p}'")),
        );
        issues.extend(
            self.invalid_params
                .iter()
                .map(|p| format!("unknown parameter '{p}'")),
        );
        issues.extend(self.structural_issues.iter().cloned());
        issues
    }
}

// ─── Correction Chain ────────────────────────────────────────────────────────

/// Which repair produced an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStage {
    /// Case fix or slash-command rewrite.
    NameFix,
    /// Remote fetch of a local file rewritten as a local read.
    SemanticFix,
    /// Parameter rename.
    ParamFix,
    /// Todo-list or batch-edit reshaping.
    ToolSpecificFix,
    /// Rewrite proposed by the oracle.
    OracleFix,
}

/// One step in the correction chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionAttempt {
    pub stage: CorrectionStage,
    pub description: String,
    pub call: ToolCall,
}

/// `original → attempt₁ → attempt₂ → …`, append-only.
///
/// Entries are never edited; reverting to the original is just reading
/// [`original`](Self::original).
#[derive(Debug, Clone)]
pub struct CorrectionChain {
    original: ToolCall,
    attempts: Vec<CorrectionAttempt>,
}

impl CorrectionChain {
    pub fn new(original: ToolCall) -> Self {
        Self {
            original,
            attempts: Vec::new(),
        }
    }

    pub fn original(&self) -> &ToolCall {
        &self.original
    }

    /// The working call: the latest attempt, or the original if none.
    pub fn current(&self) -> &ToolCall {
        self.attempts
            .last()
            .map(|a| &a.call)
            .unwrap_or(&self.original)
    }

    pub fn push(&mut self, stage: CorrectionStage, description: impl Into<String>, call: ToolCall) {
        self.attempts.push(CorrectionAttempt {
            stage,
            description: description.into(),
            call,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn into_attempts(self) -> Vec<CorrectionAttempt> {
        self.attempts
    }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// How a call left the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    /// Valid on arrival; returned untouched.
    Valid,
    /// Repaired; the final attempt is returned.
    Corrected,
    /// Retries exhausted; the original is returned.
    CircuitOpen,
    /// No schema for the tool; the original is returned.
    UnknownTool,
}

/// Report for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionOutcome {
    /// What to forward to the client.
    pub call: ToolCall,
    pub status: CorrectionStatus,
    /// Entries into the validating state, including the first.
    pub validation_attempts: u32,
    pub retries: u32,
    /// Every attempt made, including ones discarded by the circuit breaker.
    pub chain: Vec<CorrectionAttempt>,
}

impl CorrectionOutcome {
    pub fn circuit_opened(&self) -> bool {
        self.status == CorrectionStatus::CircuitOpen
    }

    pub fn was_corrected(&self) -> bool {
        self.status == CorrectionStatus::Corrected
    }
}
