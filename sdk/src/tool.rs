//! Tool capability trait and parameter schema
//!
//! This module defines the closed capability interface every tool implements:
//! a name, a parameter schema, and an execute function. The engine dispatches
//! tools by name through its registry; nothing else about a tool is visible
//! to the planner or executor.

use crate::errors::EngineError;
use crate::types::{ToolError, ToolInput, ToolOutput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Type of a declared tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    Object,
}

/// Schema entry for one tool parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Parameter name as it appears in the input map
    pub name: String,

    /// Expected value type
    #[serde(rename = "type")]
    pub param_type: ParameterType,

    /// Human-readable description, surfaced to the reasoning service
    pub description: String,

    /// Whether the parameter must be present
    #[serde(default)]
    pub required: bool,
}

impl ParameterSpec {
    /// Create a required parameter spec
    pub fn required(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    /// Create an optional parameter spec
    pub fn optional(
        name: impl Into<String>,
        param_type: ParameterType,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
        }
    }
}

/// Descriptive summary of a tool, used for listings and prompt building
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

/// Trait that all tools must implement
///
/// Tools are stateless capabilities: the registry owns one instance per name
/// and the executor invokes it with resolved inputs. Errors returned from
/// `execute` are recovered into the step result by the executor, never
/// propagated to the plan loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the name of the tool (the registry key)
    fn name(&self) -> &str;

    /// Returns a one-line description of what the tool does
    fn description(&self) -> &str;

    /// Returns the declared parameter schema
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Execute the tool with the given inputs
    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, EngineError>;

    /// Validate the input against the declared schema
    ///
    /// Checks that every required parameter is present and non-null. Called
    /// by the registry before `execute`.
    fn validate(&self, input: &ToolInput) -> Result<(), ToolError> {
        for spec in self.parameters() {
            if spec.required && !input.has_param(&spec.name) {
                return Err(ToolError::MissingParameter(spec.name));
            }
        }
        Ok(())
    }

    /// Run the tool: validate, then execute
    async fn run(&self, input: ToolInput) -> Result<ToolOutput, EngineError> {
        self.validate(&input)
            .map_err(|e| EngineError::ToolError(e.to_string()))?;
        self.execute(input).await
    }

    /// Build the descriptive summary for this tool
    fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
