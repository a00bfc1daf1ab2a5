//! Leading-verdict parsing for yes/no style oracle answers.
//!
//! Models often wrap a one-word answer in markdown or follow it with an
//! explanation ("**YES** - the user asked to edit a file"). Only the first
//! word counts.

/// A one-word oracle answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    Allow,
    Block,
    Filter,
    Keep,
}

impl Verdict {
    /// `true` for the affirmative member of each pair (YES, ALLOW, FILTER).
    pub fn is_affirmative(self) -> bool {
        matches!(self, Verdict::Yes | Verdict::Allow | Verdict::Filter)
    }

    fn from_word(word: &str) -> Option<Self> {
        match word.to_ascii_uppercase().as_str() {
            "YES" => Some(Verdict::Yes),
            "NO" => Some(Verdict::No),
            "ALLOW" => Some(Verdict::Allow),
            "BLOCK" => Some(Verdict::Block),
            "FILTER" => Some(Verdict::Filter),
            "KEEP" => Some(Verdict::Keep),
            _ => None,
        }
    }
}

/// Parse the first word of `text` as a verdict, case-insensitively.
///
/// Leading punctuation and markdown emphasis are skipped. Returns `None` when
/// the first word is not a recognised verdict.
pub fn parse_leading_verdict(text: &str) -> Option<Verdict> {
    let trimmed = text.trim_start_matches(|c: char| !c.is_ascii_alphanumeric());
    let word: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if word.is_empty() {
        return None;
    }
    Verdict::from_word(&word)
}

/// Parse a verdict as a boolean, returning `default` when unparseable.
pub fn verdict_or(text: &str, default: bool) -> bool {
    parse_leading_verdict(text)
        .map(Verdict::is_affirmative)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_yes_no() {
        assert_eq!(parse_leading_verdict("YES"), Some(Verdict::Yes));
        assert_eq!(parse_leading_verdict("no"), Some(Verdict::No));
    }

    #[test]
    fn test_markdown_and_trailing_explanation() {
        assert_eq!(
            parse_leading_verdict("**Yes** - the user wants a file edited."),
            Some(Verdict::Yes)
        );
        assert_eq!(parse_leading_verdict("  \"NO\"."), Some(Verdict::No));
    }

    #[test]
    fn test_other_verdict_pairs() {
        assert!(parse_leading_verdict("allow").unwrap().is_affirmative());
        assert!(!parse_leading_verdict("BLOCK").unwrap().is_affirmative());
        assert!(parse_leading_verdict("Filter").unwrap().is_affirmative());
        assert!(!parse_leading_verdict("keep it").unwrap().is_affirmative());
    }

    #[test]
    fn test_verdict_must_be_the_first_word() {
        assert_eq!(parse_leading_verdict("I think YES"), None);
        assert_eq!(parse_leading_verdict("Yesterday"), None);
        assert_eq!(parse_leading_verdict(""), None);
    }

    #[test]
    fn test_verdict_or_uses_default() {
        assert!(!verdict_or("maybe", false));
        assert!(verdict_or("maybe", true));
        assert!(verdict_or("yes", false));
    }
}
