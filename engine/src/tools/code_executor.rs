//! Code executor tool
//!
//! Runs a short Python script through the host interpreter with a bounded
//! timeout, capturing stdout and stderr. A forbidden-pattern screen rejects
//! scripts that reach for process or filesystem control before anything is
//! spawned. This is a convenience capability, not a sandbox; it is disabled
//! by default in the configuration.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::{ParameterSpec, ParameterType, Tool};
use sdk::types::{ToolInput, ToolOutput};
use serde_json::json;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

/// Patterns rejected before execution
const FORBIDDEN_PATTERNS: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import shutil",
    "__import__",
    "eval(",
    "exec(",
    "open(",
];

pub struct CodeExecutorTool {
    timeout: Duration,
}

impl CodeExecutorTool {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    async fn run_script(&self, code: &str) -> Result<ToolOutput, String> {
        let mut command = Command::new("python3");
        command
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| format!("execution timed out after {}s", self.timeout.as_secs()))?
            .map_err(|e| format!("failed to start interpreter: {}", e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if output.status.success() {
            Ok(ToolOutput::json(json!({
                "stdout": stdout,
                "stderr": stderr,
                "exit_code": exit_code,
            })))
        } else {
            Err(format!(
                "script exited with code {}: {}",
                exit_code,
                stderr.trim()
            ))
        }
    }
}

#[async_trait]
impl Tool for CodeExecutorTool {
    fn name(&self) -> &str {
        "code_executor"
    }

    fn description(&self) -> &str {
        "Executes a short Python script and returns its output"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![ParameterSpec::required(
            "code",
            ParameterType::String,
            "The Python code to execute",
        )]
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, EngineError> {
        let code = input
            .param_str("code")
            .map_err(|e| EngineError::ToolError(e.to_string()))?;

        info!("Executing code ({} chars)", code.len());

        let lowered = code.to_lowercase();
        for pattern in FORBIDDEN_PATTERNS {
            if lowered.contains(pattern) {
                warn!("Forbidden pattern in script: {}", pattern);
                return Ok(ToolOutput::error(format!(
                    "forbidden pattern detected: {}",
                    pattern
                )));
            }
        }

        Ok(self.run_script(&code).await.unwrap_or_else(ToolOutput::error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn python_available() -> bool {
        Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_forbidden_pattern_rejected_without_spawning() {
        let tool = CodeExecutorTool::new(5);
        let output = tool
            .run(ToolInput::new().with_param("code", json!("import os\nprint(os.getcwd())")))
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.error.as_deref().unwrap().contains("forbidden pattern"));
    }

    #[tokio::test]
    async fn test_missing_code_is_validation_error() {
        let tool = CodeExecutorTool::new(5);
        assert!(tool.run(ToolInput::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        if !python_available().await {
            return;
        }

        let tool = CodeExecutorTool::new(5);
        let output = tool
            .run(ToolInput::new().with_param("code", json!("print(2 + 3)")))
            .await
            .unwrap();

        assert!(output.success);
        assert_eq!(output.data["stdout"], json!("5\n"));
        assert_eq!(output.data["exit_code"], json!(0));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        if !python_available().await {
            return;
        }

        let tool = CodeExecutorTool::new(5);
        let output = tool
            .run(ToolInput::new().with_param("code", json!("raise ValueError('boom')")))
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.error.as_deref().unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout_enforced() {
        if !python_available().await {
            return;
        }

        let tool = CodeExecutorTool::new(1);
        let output = tool
            .run(ToolInput::new().with_param(
                "code",
                json!("while True:\n    pass"),
            ))
            .await
            .unwrap();

        assert!(!output.success);
        assert!(output.error.as_deref().unwrap().contains("timed out"));
    }
}
