//! Tool input/output types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Input to a tool invocation
///
/// A bag of named parameters. Step inputs arrive here after the executor has
/// resolved any references to prior step results, so values are plain JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolInput {
    pub params: HashMap<String, serde_json::Value>,
}

impl ToolInput {
    /// Create an empty ToolInput
    pub fn new() -> Self {
        Self {
            params: HashMap::new(),
        }
    }

    /// Create a ToolInput from an existing parameter map
    pub fn from_map(params: HashMap<String, serde_json::Value>) -> Self {
        Self { params }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Get a string parameter
    pub fn param_str(&self, key: &str) -> Result<String, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an i64 parameter
    pub fn param_i64(&self, key: &str) -> Result<i64, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get a bool parameter
    pub fn param_bool(&self, key: &str) -> Result<bool, ToolError> {
        self.params
            .get(key)
            .and_then(|v| v.as_bool())
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Get an optional string parameter
    pub fn param_str_opt(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
    }

    /// Get an optional i64 parameter
    pub fn param_i64_opt(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(|v| v.as_i64())
    }

    /// Get a parameter as a JSON value
    pub fn param_json(&self, key: &str) -> Result<&serde_json::Value, ToolError> {
        self.params
            .get(key)
            .ok_or_else(|| ToolError::MissingParameter(key.to_string()))
    }

    /// Whether a parameter is present and non-null
    pub fn has_param(&self, key: &str) -> bool {
        self.params.get(key).is_some_and(|v| !v.is_null())
    }
}

/// Output from a tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolOutput {
    /// Create a successful output with text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            data: serde_json::json!({ "text": text.into() }),
            error: None,
        }
    }

    /// Create a successful output with JSON data
    pub fn json(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    /// Create an error output
    pub fn error(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Create an empty successful output
    pub fn empty() -> Self {
        Self {
            success: true,
            data: serde_json::Value::Null,
            error: None,
        }
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Tool-specific errors
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
