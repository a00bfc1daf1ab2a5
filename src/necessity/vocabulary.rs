//! Shared vocabulary tables for signal extraction.
//!
//! Verb tables are closed sets of base forms. Lookups accept "-ing" forms by
//! stripping the suffix and trying the stem, the stem plus "e", and the stem
//! with a doubled final consonant removed ("running" → "run").

use once_cell::sync::Lazy;
use regex::Regex;

// ─── Verbs ───────────────────────────────────────────────────────────────────

/// Verbs that strongly imply changing something even without a named artifact.
pub const STRONG_VERBS: &[&str] = &[
    "create", "edit", "fix", "run", "delete", "update", "modify", "write", "implement",
    "build", "refactor", "remove", "install", "deploy", "debug", "rename", "execute",
];

/// Strong verbs that are confident without an artifact.
pub const HIGH_CERTAINTY_VERBS: &[&str] =
    &["run", "build", "fix", "create", "implement", "update", "debug"];

/// Implementation verbs that need an artifact to be trusted.
const WEAK_IMPLEMENTATION_VERBS: &[&str] = &[
    "add", "change", "move", "test", "generate", "make", "replace", "insert", "configure",
    "setup", "patch", "commit", "compile", "format", "migrate", "upgrade", "optimize",
    "apply", "save", "append", "push", "merge", "revert", "rewrite", "convert", "clean",
];

/// Verbs that only look at things. Disjoint from the implementation verbs.
pub const RESEARCH_VERBS: &[&str] = &[
    "read", "analyze", "analyse", "explain", "review", "understand", "describe",
    "summarize", "summarise", "investigate", "explore", "examine", "inspect", "check",
    "find", "search", "look", "show", "list", "compare", "research", "study", "tell",
    "trace", "audit", "evaluate", "assess", "identify", "locate",
];

pub fn is_strong_verb(lexeme: &str) -> bool {
    STRONG_VERBS.contains(&lexeme)
}

pub fn is_high_certainty_verb(lexeme: &str) -> bool {
    HIGH_CERTAINTY_VERBS.contains(&lexeme)
}

/// Base form of an implementation verb, if `word` (lowercase) is one.
pub fn implementation_lexeme(word: &str) -> Option<&'static str> {
    lookup_with_ing(word, |w| {
        STRONG_VERBS
            .iter()
            .chain(WEAK_IMPLEMENTATION_VERBS)
            .find(|v| **v == w)
            .copied()
    })
}

/// Base form of a research verb, if `word` (lowercase) is one.
pub fn research_lexeme(word: &str) -> Option<&'static str> {
    lookup_with_ing(word, |w| RESEARCH_VERBS.iter().find(|v| **v == w).copied())
}

fn lookup_with_ing(
    word: &str,
    find: impl Fn(&str) -> Option<&'static str>,
) -> Option<&'static str> {
    if let Some(hit) = find(word) {
        return Some(hit);
    }

    let stem = word.strip_suffix("ing")?;
    if stem.len() < 2 {
        return None;
    }
    if let Some(hit) = find(stem) {
        return Some(hit);
    }
    if let Some(hit) = find(&format!("{stem}e")) {
        return Some(hit);
    }

    let mut tail = stem.chars().rev();
    match (tail.next(), tail.next()) {
        (Some(last), Some(prev)) if last == prev => find(&stem[..stem.len() - last.len_utf8()]),
        _ => None,
    }
}

// ─── Artifacts ───────────────────────────────────────────────────────────────

/// Extensions that mark a token as a file name.
const FILE_EXTENSIONS: &[&str] = &[
    // Source
    "rs", "go", "py", "js", "ts", "tsx", "jsx", "mjs", "cjs", "java", "kt", "kts", "c", "h",
    "cc", "cpp", "hpp", "cs", "rb", "php", "swift", "scala", "lua", "dart", "ex", "exs", "hs",
    "ml", "r", "pl", "sh", "bash", "zsh", "sql", "proto", "graphql", "vue", "svelte", "tf",
    // Markup / styles
    "md", "mdx", "html", "htm", "css", "scss", "xml", "ipynb",
    // Config / data
    "json", "yaml", "yml", "toml", "ini", "cfg", "conf", "env", "lock", "gradle", "csv", "txt",
    "log",
];

/// Extension-less file names that are still files.
const WELL_KNOWN_FILES: &[&str] = &[
    "makefile", "dockerfile", "readme", "license", "changelog", "gemfile", "rakefile",
    "procfile", "justfile", "jenkinsfile",
];

/// Nouns that name something a change could target.
pub const ARTIFACT_NOUNS: &[&str] = &[
    "file", "files", "config", "configuration", "script", "scripts", "function", "functions",
    "class", "module", "component", "test", "tests", "code", "codebase", "repo",
    "repository", "directory", "folder", "package", "dependency", "dependencies", "endpoint",
    "method", "variable", "docs", "documentation", "database", "schema", "migration",
    "project", "app", "application", "service", "server", "api", "bug", "error", "feature",
    "branch",
];

static FILE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    let pattern = format!(r"^[\w./~-]*\.(?:{})$", FILE_EXTENSIONS.join("|"));
    Regex::new(&pattern).expect("file name pattern is valid")
});

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:~|\.{1,2})?/[\w./-]+$|^[\w.-]+(?:/[\w.-]+){2,}/?$|^[\w.-]+/[\w.-]*/$")
        .expect("path pattern is valid")
});

/// Whether a token (lowercase, punctuation trimmed) names a file or path.
pub fn is_file_like(lower: &str) -> bool {
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return false;
    }
    FILE_NAME_RE.is_match(lower) || PATH_RE.is_match(lower) || WELL_KNOWN_FILES.contains(&lower)
}

pub fn is_artifact_noun(lower: &str) -> bool {
    ARTIFACT_NOUNS.contains(&lower)
}

// ─── Negation ────────────────────────────────────────────────────────────────

/// Phrasings that ask for explanation rather than action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegationFamily {
    /// "show me how to…", "explain how to…"
    Teaching,
    /// "what if…", "hypothetically"
    Hypothetical,
    /// "without fixing…", "just explain…", "don't change…"
    AnalysisOnly,
    /// "how does the … work"
    MetaTool,
}

impl NegationFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Teaching => "teaching",
            Self::Hypothetical => "hypothetical",
            Self::AnalysisOnly => "analysis_only",
            Self::MetaTool => "meta_tool",
        }
    }
}

static NEGATION_PATTERNS: Lazy<Vec<(NegationFamily, Regex)>> = Lazy::new(|| {
    let families: &[(NegationFamily, &[&str])] = &[
        (
            NegationFamily::Teaching,
            &[
                r"\b(?:show|teach|tell) me how\b",
                r"\bexplain (?:to me )?how (?:to|i|we|you|one)\b",
                r"\b(?:walk|guide) me through\b",
                r"\bhow (?:would|should|could) (?:i|one|someone)\b",
                r"\bwhat(?:'s| is) the (?:best |right |proper )?way to\b",
            ],
        ),
        (
            NegationFamily::Hypothetical,
            &[
                r"\bwhat if\b",
                r"\bhypothetical(?:ly)?\b",
                r"\bin theory\b",
                r"\bimagine (?:if|that)\b",
                r"\bsuppose (?:i|we|you)\b",
                r"\bwhat would happen\b",
            ],
        ),
        (
            NegationFamily::AnalysisOnly,
            &[
                r"\bwithout (?:fixing|changing|modifying|editing|touching|writing|running|making)\b",
                r"\bjust (?:explain|describe|tell|analy[sz]e|review|summari[sz]e)\b",
                r"\bonly (?:explain|describe|analy[sz]e|review)\b",
                r"\b(?:don'?t|do not|dont) (?:change|modify|edit|fix|touch|write|implement|run|make any)\b",
                r"\bno (?:code )?changes\b",
            ],
        ),
        (
            NegationFamily::MetaTool,
            &[
                r"\bhow (?:does|do) (?:the |your |this )?[\w\s.-]{0,40}?\bwork\b",
                r"\bwhat (?:does|do) (?:the |your )?[\w-]+ tools? do\b",
                r"\bwhat tools (?:do you|are) (?:have|available)\b",
            ],
        ),
    ];

    families
        .iter()
        .flat_map(|(family, patterns)| {
            patterns.iter().map(move |p| {
                (
                    *family,
                    Regex::new(p).expect("negation pattern is valid"),
                )
            })
        })
        .collect()
});

/// First negation family matching `lower` (already lowercased).
pub fn match_negation(lower: &str) -> Option<NegationFamily> {
    NEGATION_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(lower))
        .map(|(family, _)| *family)
}

// ─── Completion ──────────────────────────────────────────────────────────────

/// Phrases an assistant uses when reporting finished work.
pub const COMPLETION_PHRASES: &[&str] = &[
    "completed",
    "updated",
    "successfully",
    "created",
    "fixed",
    "implemented",
    "done",
    "finished",
    "added",
    "modified",
    "all set",
    "applied",
    "resolved",
];

/// Distinct completion phrases occurring in `lower`.
pub fn count_completion_phrases(lower: &str) -> usize {
    COMPLETION_PHRASES
        .iter()
        .filter(|phrase| lower.contains(*phrase))
        .count()
}

// ─── Tokenizing ──────────────────────────────────────────────────────────────

/// A whitespace token with surrounding punctuation trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Original casing.
    pub raw: &'a str,
    pub lower: String,
}

const LEADING_TRIM: &[char] = &['"', '\'', '`', '(', '[', '{', '<', '*'];
const TRAILING_TRIM: &[char] = &[
    '"', '\'', '`', ')', ']', '}', '>', '*', ',', ';', ':', '!', '?', '.',
];

pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    text.split_whitespace()
        .map(|word| word.trim_start_matches(LEADING_TRIM).trim_end_matches(TRAILING_TRIM))
        .filter(|word| !word.is_empty())
        .map(|raw| Token {
            raw,
            lower: raw.to_lowercase(),
        })
        .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
