//! Guard configuration loading and validation.
//!
//! Reads `callguard.yaml` and resolves environment variables. Every field has
//! a default, so an empty file (or no file at all) yields a working
//! rules-only configuration with no oracle.

pub mod errors;

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub use errors::ConfigError;

/// Config file name searched for by [`find_config_path`].
pub const CONFIG_FILE_NAME: &str = "callguard.yaml";

/// Env var pointing directly at a config file.
pub const CONFIG_ENV_VAR: &str = "CALLGUARD_CONFIG";

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Correction retries per tool call before the circuit opens.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fallback LLM. Absent means rules only.
    #[serde(default)]
    pub oracle: Option<OracleConfig>,

    #[serde(default)]
    pub necessity: NecessityConfig,

    #[serde(default)]
    pub correction: CorrectionConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            oracle: None,
            necessity: NecessityConfig::default(),
            correction: CorrectionConfig::default(),
        }
    }
}

/// Connection settings for the fallback LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    /// OpenAI-compatible base URL, e.g. `http://localhost:11434/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    /// Sent as a bearer token when present.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-call deadline, applied both to HTTP and to the request context.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Token budget for correction answers. Necessity answers use far fewer.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: String::new(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

/// Necessity classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NecessityConfig {
    /// Messages included in the condensed oracle prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Trailing messages scanned for research tool calls.
    #[serde(default = "default_research_window")]
    pub research_window: usize,
    #[serde(default = "default_true")]
    pub enable_oracle_fallback: bool,
}

impl Default for NecessityConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            research_window: default_research_window(),
            enable_oracle_fallback: true,
        }
    }
}

/// Correction pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    #[serde(default = "default_true")]
    pub enable_oracle_repair: bool,
    /// In-flight calls for `process_batch_concurrent`.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enable_oracle_repair: true,
            concurrency: default_concurrency(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_history_window() -> usize {
    10
}

fn default_research_window() -> usize {
    6
}

fn default_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl GuardConfig {
    /// Reject values the components cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.necessity.history_window == 0 {
            return Err(invalid("necessity.history_window", "must be at least 1"));
        }
        if self.correction.concurrency == 0 {
            return Err(invalid("correction.concurrency", "must be at least 1"));
        }
        if let Some(ref oracle) = self.oracle {
            if oracle.timeout_secs == 0 {
                return Err(invalid("oracle.timeout_secs", "must be at least 1"));
            }
            if !(0.0..=2.0).contains(&oracle.temperature) {
                return Err(invalid("oracle.temperature", "must be within 0.0..=2.0"));
            }
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// Checks `CALLGUARD_CONFIG` first, then searches upward from `start` for
/// `callguard.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(explicit) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_home(&explicit));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "{CONFIG_ENV_VAR} points at a missing file");
    }

    search_upward(start)
}

fn search_upward(start: &Path) -> Result<PathBuf, ConfigError> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound {
        file_name: CONFIG_FILE_NAME.into(),
        searched_from: start.to_path_buf(),
    })
}

/// Load, interpolate, parse and validate a config file.
///
/// Performs environment-variable interpolation on `${VAR_NAME}` and
/// `${VAR_NAME:-default}` before parsing.
pub fn load_config(path: &Path) -> Result<GuardConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let config = parse_config(&raw)?;
    tracing::info!(
        path = %path.display(),
        max_retries = config.max_retries,
        oracle = config.oracle.is_some(),
        "loaded callguard config"
    );
    Ok(config)
}

/// Parse config YAML text (after env interpolation) and validate it.
pub fn parse_config(raw: &str) -> Result<GuardConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(GuardConfig::default());
    }

    let config: GuardConfig =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::ParseFailed {
            reason: e.to_string(),
        })?;

    config.validate()?;
    Ok(config)
}

/// Find and load the config, falling back to defaults when no file exists.
pub fn load_or_default(start: &Path) -> Result<GuardConfig, ConfigError> {
    match find_config_path(start) {
        Ok(path) => load_config(&path),
        Err(ConfigError::NotFound { .. }) => {
            tracing::debug!("no callguard config found, using defaults");
            Ok(GuardConfig::default())
        }
        Err(e) => Err(e),
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

static ENV_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Substitute `${VAR}` and `${VAR:-default}`.
///
/// An unset or empty variable takes its default (with `~` expanded), or the
/// empty string when there is none. Anything that is not a well-formed
/// reference is kept verbatim.
fn interpolate_env_vars(input: &str) -> Cow<'_, str> {
    ENV_REF_RE.replace_all(input, |caps: &Captures<'_>| {
        let value = std::env::var(&caps[1]).ok().filter(|v| !v.is_empty());
        match (value, caps.get(2)) {
            (Some(value), _) => value,
            (None, Some(default)) => expand_home(default.as_str()),
            (None, None) => String::new(),
        }
    })
}

/// `~` and `~/rest` resolve against the home directory; `~user` does not.
fn expand_home(path: &str) -> String {
    let Some(rest) = path.strip_prefix('~') else {
        return path.to_string();
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{rest}", home.display())
        }
        _ => path.to_string(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
