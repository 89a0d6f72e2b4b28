//! Shared pattern-matching primitive for the guard modules.
//!
//! Every guard is driven by a data table of `(pattern, weight, category)`
//! rules. The tables stay reviewable as plain constants; this module turns
//! them into compiled matchers. Malformed patterns are a build-time concern:
//! they are skipped with a warning at construction, never surfaced as
//! runtime failures.

use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Maximum matched substrings recorded per rule (caps audit log size)
pub const MAX_SAMPLES: usize = 5;

/// Maximum length of a recorded sample in characters
const MAX_SAMPLE_LEN: usize = 100;

/// A detection rule: regex source, numeric weight, category label.
///
/// Weight semantics differ per guard: input-guard weights are severity
/// contributions in [0, 1]; trust-scorer weights are additive deltas and
/// can be negative.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    /// Regex pattern source
    pub pattern: &'static str,
    /// Numeric weight
    pub weight: f32,
    /// Category label
    pub category: &'static str,
}

/// A rule that matched, with bounded sample substrings.
#[derive(Debug, Clone, Serialize)]
pub struct RuleMatch {
    /// Category of the matched rule
    pub category: &'static str,
    /// Weight of the matched rule
    pub weight: f32,
    /// Pattern source, for audit detail
    pub pattern: &'static str,
    /// First few matched substrings, truncated
    pub samples: Vec<String>,
}

/// Compile a single pattern with the guard defaults (case-insensitive,
/// multi-line). Returns `None` with a warning if the pattern is malformed.
pub fn compile_pattern(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!("Skipping malformed guard pattern {pattern:?}: {e}");
            None
        },
    }
}

/// An ordered set of compiled rules.
pub struct PatternMatcher {
    rules: Vec<(Regex, Rule)>,
}

impl PatternMatcher {
    /// Compile a rule table, skipping malformed patterns.
    pub fn compile(rules: &[Rule]) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| compile_pattern(rule.pattern).map(|regex| (regex, *rule)))
            .collect();

        Self { rules }
    }

    /// Evaluate every rule against `text`, returning all matches in rule
    /// order with their weight, category, and bounded samples.
    pub fn find_matches(&self, text: &str) -> Vec<RuleMatch> {
        let mut matches = Vec::new();

        for (regex, rule) in &self.rules {
            let samples: Vec<String> = regex
                .find_iter(text)
                .take(MAX_SAMPLES)
                .map(|m| truncate_chars(m.as_str(), MAX_SAMPLE_LEN))
                .collect();

            if !samples.is_empty() {
                matches.push(RuleMatch {
                    category: rule.category,
                    weight: rule.weight,
                    pattern: rule.pattern,
                    samples,
                });
            }
        }

        matches
    }

    /// Whether any rule matches `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.rules.iter().any(|(regex, _)| regex.is_match(text))
    }

    /// Number of successfully compiled rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules compiled.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Truncate a string to `max` characters, respecting char boundaries.
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}
