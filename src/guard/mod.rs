//! Guardrail stages.
//!
//! Each guard is an independent, synchronous, pattern-driven stage:
//!
//! - [`InputGuard`] scores user queries for injection attempts before
//!   anything else runs.
//! - [`DocumentSanitizer`] strips or redacts instructions embedded in
//!   untrusted documents at ingestion and again before context assembly.
//! - [`TrustScorer`] rates retrieved chunks and derives the context budget.
//! - [`SystemPromptManager`] locks the system prompt in guarded mode.
//! - [`OutputGuard`] blocks harmful output and redacts sensitive data.
//! - [`SecurityLogger`] records every guard action for audit.
//!
//! Guards return result values, never errors. The pipeline module wires
//! them together; each is usable standalone (the CLI exercises the input
//! guard, sanitizer, and trust scorer directly).

pub mod input;
pub mod logger;
pub mod matcher;
pub mod output;
pub mod prompt;
pub mod sanitizer;
pub mod trust;

pub use input::{InputCheckResult, InputGuard};
pub use logger::{EventSummary, EventType, SecurityEvent, SecurityLogger};
pub use matcher::{PatternMatcher, Rule, RuleMatch};
pub use output::{OutputCheckResult, OutputGuard, OutputIssue};
pub use prompt::{SystemPromptManager, DEFAULT_SYSTEM_PROMPT, LOCKED_SYSTEM_PROMPT};
pub use sanitizer::{DocumentSanitizer, SanitizationReport};
pub use trust::{SourceMetadata, TrustReport, TrustScorer};
