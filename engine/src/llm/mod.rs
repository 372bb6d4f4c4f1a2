//! Reasoning service abstraction layer
//!
//! This module provides a common interface for the text-completion capability
//! consumed by planning, tool-less step execution, synthesis, and replanning.
//! The `LLMProvider` trait defines the contract concrete backends (OpenAI,
//! Anthropic) implement; the router layers failover on top and exposes the
//! `ReasoningService` interface the rest of the engine consumes.
//!
//! Reasoning output is free-form text. Callers that expect structured data
//! parse it through [`parse_structured`], which returns an explicit
//! two-variant [`Parsed`] result so the unstructured case must be handled
//! rather than silently defaulted.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod anthropic;
pub mod mock;
pub mod openai;
pub mod router;

/// Result type for reasoning operations
pub type Result<T> = std::result::Result<T, LLMError>;

/// Errors that can occur during reasoning operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Message in a conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Provider trait that all reasoning backends must implement
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Returns the name of the provider (e.g., "openai", "anthropic")
    fn name(&self) -> &str;

    /// Generate a completion from the conversation history
    ///
    /// Returns the raw assistant text. Providers never interpret the content;
    /// structure extraction happens at the call site.
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Check if the provider is currently usable (credentials present, etc.)
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// The completion capability consumed by the planner, executor, and agent
///
/// `complete` accepts a prompt plus optional structured context and returns
/// free-form text. A non-JSON response is valid degraded output, not an
/// error — callers parse with [`parse_structured`] and handle the raw case.
#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, prompt: &str, context: Option<&serde_json::Value>) -> Result<String>;
}

/// Outcome of best-effort structured parsing of reasoning output
///
/// Callers must handle `Raw` explicitly; the documented fallback defaults
/// live at the call site, not in this type.
#[derive(Debug, Clone)]
pub enum Parsed<T> {
    /// The response contained a parseable value of the expected shape
    Structured(T),

    /// The response did not parse; the raw text is retained for diagnostics
    Raw(String),
}

impl<T> Parsed<T> {
    /// Whether the structured variant was produced
    pub fn is_structured(&self) -> bool {
        matches!(self, Parsed::Structured(_))
    }
}

/// Parse reasoning output into the expected structured shape.
///
/// Handles the formats models actually emit:
/// 1. The entire response is valid JSON
/// 2. JSON inside a markdown code fence (with or without trailing prose)
/// 3. A JSON object embedded in prose — scans for the first balanced `{...}`
///
/// Anything else yields `Parsed::Raw` with the original text.
pub fn parse_structured<T: DeserializeOwned>(content: &str) -> Parsed<T> {
    let trimmed = content.trim();

    // Pattern 1: entire content is valid JSON
    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Parsed::Structured(value);
    }

    // Pattern 2: extract from markdown code fences (even with trailing text)
    if let Some(inner) = extract_fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(inner.trim()) {
            return Parsed::Structured(value);
        }
    }

    // Pattern 3: first balanced JSON object embedded in prose
    if let Some(pos) = trimmed.find('{') {
        if let Some(json_str) = extract_balanced_object(&trimmed[pos..]) {
            if let Ok(value) = serde_json::from_str::<T>(json_str) {
                return Parsed::Structured(value);
            }
        }
    }

    Parsed::Raw(content.to_string())
}

/// Extract the body of the first markdown code fence in the text.
///
/// Works even when there is trailing prose after the closing ```.
/// Returns `None` if no fenced block is found.
fn extract_fenced_block(content: &str) -> Option<&str> {
    // Find opening fence
    let fence_start = content.find("```")?;
    let after_opening = &content[fence_start + 3..];

    // Skip the language tag line (e.g. "json\n")
    let body_start_rel = after_opening.find('\n')? + 1;
    let body_start = fence_start + 3 + body_start_rel;

    // Find closing fence after the body starts
    let closing = content[body_start..].find("```")?;
    let body_end = body_start + closing;

    if body_start >= body_end {
        return None;
    }

    Some(&content[body_start..body_end])
}

/// Extract a balanced JSON object starting at position 0 of `s`.
///
/// Counts `{` / `}` depth, respecting string literals, to find the
/// matching close brace.
fn extract_balanced_object(s: &str) -> Option<&str> {
    if !s.starts_with('{') {
        return None;
    }
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in s.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}
