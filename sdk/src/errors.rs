//! Error types and handling
//!
//! This module provides the error types used throughout the Maestro engine.
//! All errors implement the `MaestroErrorExt` trait which provides
//! user-friendly hints and indicates whether errors are recoverable.
//!
//! Reasoning output that fails to parse as structured data is *not* an error
//! in this taxonomy — callers receive the raw text through an explicit
//! two-variant result and fall back to documented defaults. Step-level tool
//! and reasoning failures are recovered into the step's result record; only
//! errors escaping the per-step boundary surface as `EngineError`.

use thiserror::Error;

/// Trait for Maestro error extensions
///
/// This trait provides additional context for errors, including user-friendly
/// hints and recoverability information. All engine errors implement this trait.
pub trait MaestroErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and does not contain
    /// credentials or internal implementation details.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried or worked around. Non-recoverable
    /// errors typically require configuration changes or manual intervention.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// This enum represents all possible errors that can occur in the Maestro
/// engine.
///
/// # Error Categories
///
/// - **Configuration**: Invalid or missing configuration
/// - **Reasoning**: Reasoning-service (LLM provider) failures
/// - **Agent**: Re-entrancy and lookup failures at the orchestration layer
/// - **Task**: Unknown task ids in the task store
/// - **Tool**: Unknown tools and tool execution failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, MaestroErrorExt};
///
/// let error = EngineError::ToolNotFound("web_scraper".to_string());
/// println!("Hint: {}", error.user_hint());
/// assert!(error.is_recoverable());
///
/// let fatal_error = EngineError::AllProvidersExhausted;
/// assert!(!fatal_error.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Reasoning service errors
    #[error("Reasoning service error: {0}")]
    Reasoning(String),

    #[error("All reasoning providers exhausted")]
    AllProvidersExhausted,

    // Agent orchestration errors
    #[error("Agent is already running a task")]
    AgentBusy,

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    // Task store errors
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    // Tool errors
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    // Memory import/export errors
    #[error("Memory serialization error: {0}")]
    MemorySerialization(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MaestroErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Reasoning(_) => {
                "Reasoning provider unavailable. Check your API keys and network"
            }
            Self::AllProvidersExhausted => "No reasoning providers available. Check configuration",
            Self::AgentBusy => "The agent is already executing a task. Wait for it to finish",
            Self::AgentNotFound(_) => "No agent profile with that name is registered",
            Self::TaskNotFound(_) => "No task with that id exists",
            Self::ToolNotFound(_) => "The requested tool is not available",
            Self::ToolError(_) => "Tool operation failed",
            Self::MemorySerialization(_) => "Memory snapshot is malformed or incompatible",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            // Non-recoverable errors
            Self::AllProvidersExhausted | Self::Config(_) => false,

            // All other errors are potentially recoverable
            _ => true,
        }
    }
}
