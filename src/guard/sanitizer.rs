//! Document sanitizer: strips or redacts embedded instructions from
//! untrusted document text before it can reach the model as context.
//!
//! Two-tier defense, idempotent end to end:
//! 1. Homoglyph normalization (Cyrillic/fullwidth lookalikes of Latin
//!    letters) runs before any pattern matching, so spoofed keywords are
//!    caught identically to plain ASCII.
//! 2. High-confidence embedded-instruction spans are removed entirely;
//!    lower-confidence suspicious phrases are replaced with labeled
//!    redaction markers so document shape survives for audit.
//!
//! Sanitization never fails a request; it only reports what it changed.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use super::matcher::{compile_pattern, truncate_chars};

/// Visually-confusable code points mapped to their Latin equivalents.
const HOMOGLYPH_MAP: &[(char, char)] = &[
    ('\u{0430}', 'a'), // Cyrillic а
    ('\u{0435}', 'e'), // Cyrillic е
    ('\u{043e}', 'o'), // Cyrillic о
    ('\u{0440}', 'p'), // Cyrillic р
    ('\u{0441}', 'c'), // Cyrillic с
    ('\u{0443}', 'y'), // Cyrillic у
    ('\u{0445}', 'x'), // Cyrillic х
    ('\u{0456}', 'i'), // Cyrillic і
    ('\u{0501}', 'd'), // Cyrillic ԁ
    ('\u{ff41}', 'a'), // Fullwidth a
    ('\u{ff45}', 'e'), // Fullwidth e
];

/// High-confidence embedded-instruction markers: matched spans are removed.
const REMOVAL_PATTERNS: &[(&str, &str)] = &[
    // Direct instruction markers
    (
        r"(?s)\[(?:system|instruction|prompt|command)\].*?\[/(?:system|instruction|prompt|command)\]",
        "bracketed_instruction",
    ),
    (
        r"(?s)<(?:system|instruction|prompt|command)>.*?</(?:system|instruction|prompt|command)>",
        "xml_instruction",
    ),
    (
        r"(?s)```(?:system|instruction|prompt)\n.*?```",
        "code_block_instruction",
    ),
    // Labeled imperative blocks targeting the model
    (
        r"^[ \t]*(?:INSTRUCTION|SYSTEM|PROMPT|COMMAND|NOTE TO AI|AI INSTRUCTION)[:\s][^\n]*",
        "labeled_instruction",
    ),
    // Hidden instructions
    (r"(?s)<!--.*?-->", "html_comment"),
    (r"(?s)/\*.*?\*/", "code_comment"),
    (r"(?s)\{#.*?#\}", "template_comment"),
    // Role manipulation embedded in documents
    (
        r"^.*(?:you are|you're|you will be|act as|pretend to be).*(?:evil|malicious|unrestricted|unfiltered|uncensored).*$",
        "roleplay_instruction",
    ),
    // Obfuscated override commands
    (
        r"(?:ignore|disregard|forget)\s+(?:previous|above|all)[^\n]*",
        "override_instruction",
    ),
];

/// Lower-confidence suspicious phrases: matched spans are replaced with a
/// labeled redaction marker instead of deleted.
const REDACT_PATTERNS: &[(&str, &str)] = &[
    (
        r"ignore\s+(?:all\s+)?(?:previous|prior|above)\s+instructions?",
        "[REDACTED: instruction override]",
    ),
    (r"you\s+are\s+now\s+\w+", "[REDACTED: role change]"),
    (r"system\s*prompt\s*:", "[REDACTED: system marker]"),
];

lazy_static! {
    static ref EXCESS_NEWLINES: Regex = Regex::new(r"\n{3,}").expect("static pattern");
}

/// What the sanitizer found and changed, for the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizationReport {
    /// Length of the original text in characters
    pub original_length: usize,
    /// Length of the sanitized text in characters
    pub sanitized_length: usize,
    /// Characters removed (zero if the text grew through redaction markers)
    pub characters_removed: usize,
    /// Removed fraction as a percentage of the original length
    pub removal_percentage: f32,
    /// Instruction patterns detected in the original text
    pub instructions_found: Vec<InstructionFinding>,
}

/// One detected embedded-instruction category.
#[derive(Debug, Clone, Serialize)]
pub struct InstructionFinding {
    /// Removal-pattern category
    pub category: String,
    /// Number of matches
    pub count: usize,
    /// First few matched spans, truncated
    pub samples: Vec<String>,
}

/// Sanitizes untrusted document text.
pub struct DocumentSanitizer {
    removal: Vec<(Regex, &'static str)>,
    redact: Vec<(Regex, &'static str)>,
}

impl Default for DocumentSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSanitizer {
    /// Compile the sanitization tables.
    pub fn new() -> Self {
        let removal = REMOVAL_PATTERNS
            .iter()
            .filter_map(|(pattern, category)| {
                compile_pattern(pattern).map(|regex| (regex, *category))
            })
            .collect();

        let redact = REDACT_PATTERNS
            .iter()
            .filter_map(|(pattern, replacement)| {
                compile_pattern(pattern).map(|regex| (regex, *replacement))
            })
            .collect();

        Self { removal, redact }
    }

    /// Full sanitization for text about to enter a model's context window.
    ///
    /// Idempotent: re-running on already-sanitized text is a no-op.
    pub fn sanitize(&self, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }

        let mut text = normalize_homoglyphs(text);

        for (regex, _) in &self.removal {
            text = regex.replace_all(&text, "").into_owned();
        }

        for (regex, replacement) in &self.redact {
            text = regex.replace_all(&text, *replacement).into_owned();
        }

        let text = EXCESS_NEWLINES.replace_all(&text, "\n\n");
        text.trim().to_string()
    }

    /// Light sanitization for text about to be embedded/indexed: homoglyph
    /// normalization and comment stripping only, content otherwise intact.
    pub fn sanitize_for_embedding(&self, text: &str) -> String {
        let mut text = normalize_homoglyphs(text);

        for (regex, category) in &self.removal {
            if matches!(*category, "html_comment" | "code_comment") {
                text = regex.replace_all(&text, "").into_owned();
            }
        }

        text.trim().to_string()
    }

    /// Full sanitization alias for text placed in the context window.
    pub fn sanitize_for_context(&self, text: &str) -> String {
        self.sanitize(text)
    }

    /// Detection only, no mutation. Homoglyphs are normalized before
    /// matching so spoofed markers are still found.
    pub fn check_for_instructions(&self, text: &str) -> Vec<InstructionFinding> {
        let normalized = normalize_homoglyphs(text);
        let mut found = Vec::new();

        for (regex, category) in &self.removal {
            let samples: Vec<String> = regex
                .find_iter(&normalized)
                .take(3)
                .map(|m| truncate_chars(m.as_str(), 100))
                .collect();

            if !samples.is_empty() {
                found.push(InstructionFinding {
                    category: (*category).to_string(),
                    count: regex.find_iter(&normalized).count(),
                    samples,
                });
            }
        }

        found
    }

    /// Quantify what sanitization changed, for the audit trail.
    pub fn sanitization_report(&self, original: &str, sanitized: &str) -> SanitizationReport {
        let original_length = original.chars().count();
        let sanitized_length = sanitized.chars().count();
        let characters_removed = original_length.saturating_sub(sanitized_length);

        let removal_percentage = if original_length > 0 {
            characters_removed as f32 / original_length as f32 * 100.0
        } else {
            0.0
        };

        SanitizationReport {
            original_length,
            sanitized_length,
            characters_removed,
            removal_percentage,
            instructions_found: self.check_for_instructions(original),
        }
    }
}

/// Map known homoglyphs to their Latin equivalents.
fn normalize_homoglyphs(text: &str) -> String {
    text.chars()
        .map(|c| {
            HOMOGLYPH_MAP
                .iter()
                .find(|(from, _)| *from == c)
                .map_or(c, |(_, to)| *to)
        })
        .collect()
}
