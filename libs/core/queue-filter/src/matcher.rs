//! Substring matching over message bodies.
//!
//! A [`Matcher`] is built once from the configured rules and shared read-only
//! across all workers; evaluation is a pure function with no locking.

use crate::error::FilterError;
use std::fmt;
use std::str::FromStr;

/// How multiple match rules combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// At least one rule's pattern must be contained in the body.
    #[default]
    Any,
    /// Every rule's pattern must be contained in the body.
    All,
}

impl FromStr for MatchMode {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            Ok(MatchMode::Any)
        } else if s.eq_ignore_ascii_case("all") {
            Ok(MatchMode::All)
        } else {
            Err(FilterError::config(format!(
                "unknown match mode '{s}', expected 'any' or 'all'"
            )))
        }
    }
}

impl fmt::Display for MatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchMode::Any => f.write_str("any"),
            MatchMode::All => f.write_str("all"),
        }
    }
}

/// Evaluates message bodies against a fixed set of substring rules.
///
/// With `ignore_case`, both the rules (once, at construction) and each body
/// are folded with [`str::to_lowercase`], which is Unicode-aware; byte-wise
/// folding would miss non-ASCII characters.
///
/// With zero rules, `Any` matches nothing (there is no rule to satisfy) and
/// `All` vacuously matches everything.
#[derive(Debug, Clone)]
pub struct Matcher {
    patterns: Vec<String>,
    mode: MatchMode,
    ignore_case: bool,
}

impl Matcher {
    /// Build a matcher, normalizing patterns up front when case-insensitive.
    pub fn new(patterns: Vec<String>, mode: MatchMode, ignore_case: bool) -> Self {
        let patterns = if ignore_case {
            patterns.into_iter().map(|p| p.to_lowercase()).collect()
        } else {
            patterns
        };
        Self {
            patterns,
            mode,
            ignore_case,
        }
    }

    /// Number of configured rules.
    pub fn rule_count(&self) -> usize {
        self.patterns.len()
    }

    /// Whether `body` matches under the configured mode.
    pub fn matches(&self, body: &str) -> bool {
        if self.patterns.is_empty() {
            return match self.mode {
                MatchMode::Any => false,
                MatchMode::All => true,
            };
        }

        let folded;
        let candidate = if self.ignore_case {
            folded = body.to_lowercase();
            folded.as_str()
        } else {
            body
        };

        match self.mode {
            MatchMode::Any => self.patterns.iter().any(|p| candidate.contains(p.as_str())),
            MatchMode::All => self.patterns.iter().all(|p| candidate.contains(p.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str], mode: MatchMode, ignore_case: bool) -> Matcher {
        Matcher::new(
            patterns.iter().map(|p| p.to_string()).collect(),
            mode,
            ignore_case,
        )
    }

    #[test]
    fn test_any_matches_when_one_rule_contained() {
        let m = matcher(&["foo", "bar"], MatchMode::Any, false);
        assert!(m.matches("foo-1"));
        assert!(m.matches("bar-2"));
        assert!(!m.matches("baz-3"));
    }

    #[test]
    fn test_all_requires_every_rule() {
        let m = matcher(&["foo", "bar"], MatchMode::All, false);
        assert!(m.matches("foo and bar together"));
        assert!(!m.matches("foo-1"));
        assert!(!m.matches("bar-2"));
    }

    #[test]
    fn test_case_sensitive_by_default() {
        let m = matcher(&["Error"], MatchMode::Any, false);
        assert!(m.matches("an Error occurred"));
        assert!(!m.matches("an error occurred"));
    }

    #[test]
    fn test_ignore_case_folds_both_sides() {
        let m = matcher(&["ERROR"], MatchMode::Any, true);
        assert!(m.matches("an error occurred"));
        assert!(m.matches("an ERROR occurred"));
    }

    #[test]
    fn test_ignore_case_is_unicode_aware() {
        // Cyrillic has no ASCII case mapping; byte-wise folding would miss it.
        let m = matcher(&["ПРИВЕТ"], MatchMode::Any, true);
        assert!(m.matches("привет мир"));
    }

    #[test]
    fn test_empty_rules_any_matches_nothing() {
        let m = matcher(&[], MatchMode::Any, false);
        assert!(!m.matches("anything at all"));
        assert!(!m.matches(""));
    }

    #[test]
    fn test_empty_rules_all_matches_everything() {
        let m = matcher(&[], MatchMode::All, false);
        assert!(m.matches("anything at all"));
        assert!(m.matches(""));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("any".parse::<MatchMode>().unwrap(), MatchMode::Any);
        assert_eq!("ALL".parse::<MatchMode>().unwrap(), MatchMode::All);
        assert!("most".parse::<MatchMode>().is_err());
    }

    #[test]
    fn test_mode_display_round_trip() {
        assert_eq!(MatchMode::Any.to_string(), "any");
        assert_eq!(MatchMode::All.to_string(), "all");
    }
}
