//! File operations tool
//!
//! Read, write, list, and delete files confined to a workspace directory.
//! Paths are validated before use: absolute paths and `..` traversal are
//! rejected, so a step cannot reach outside the workspace regardless of
//! what the planner produced.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::{ParameterSpec, ParameterType, Tool};
use sdk::types::{ToolInput, ToolOutput};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

pub struct FileOperationsTool {
    workspace: PathBuf,
}

impl FileOperationsTool {
    pub fn new(workspace: PathBuf) -> Self {
        Self { workspace }
    }

    /// Validate a relative path and anchor it in the workspace
    fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let candidate = Path::new(path);

        if candidate.is_absolute() {
            return Err("access denied: absolute paths are not allowed".to_string());
        }
        for component in candidate.components() {
            if matches!(component, Component::ParentDir) {
                return Err("access denied: path escapes the workspace".to_string());
            }
        }

        Ok(self.workspace.join(candidate))
    }

    async fn read_file(&self, path: &Path) -> Result<ToolOutput, String> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| format!("read failed: {}", e))?;
        let size = content.len();

        Ok(ToolOutput::json(json!({
            "content": content,
            "size": size,
        })))
    }

    async fn write_file(&self, path: &Path, content: &str) -> Result<ToolOutput, String> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("mkdir failed: {}", e))?;
        }
        fs::write(path, content)
            .await
            .map_err(|e| format!("write failed: {}", e))?;

        Ok(ToolOutput::json(json!({
            "bytes_written": content.len(),
        })))
    }

    async fn list_directory(&self, path: &Path) -> Result<ToolOutput, String> {
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(path)
            .await
            .map_err(|e| format!("list failed: {}", e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| format!("list failed: {}", e))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| format!("list failed: {}", e))?;
            entries.push(json!({
                "name": entry.file_name().to_string_lossy(),
                "is_dir": file_type.is_dir(),
            }));
        }

        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        let count = entries.len();

        Ok(ToolOutput::json(json!({
            "entries": entries,
            "count": count,
        })))
    }

    async fn delete_file(&self, path: &Path) -> Result<ToolOutput, String> {
        fs::remove_file(path)
            .await
            .map_err(|e| format!("delete failed: {}", e))?;

        Ok(ToolOutput::json(json!({ "deleted": true })))
    }
}

#[async_trait]
impl Tool for FileOperationsTool {
    fn name(&self) -> &str {
        "file_operations"
    }

    fn description(&self) -> &str {
        "Performs file operations (read, write, list, delete) inside the workspace"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required(
                "operation",
                ParameterType::String,
                "Operation type: read, write, list, delete",
            ),
            ParameterSpec::required(
                "path",
                ParameterType::String,
                "File or directory path, relative to the workspace",
            ),
            ParameterSpec::optional(
                "content",
                ParameterType::String,
                "Content to write (for write)",
            ),
        ]
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, EngineError> {
        let operation = input
            .param_str("operation")
            .map_err(|e| EngineError::ToolError(e.to_string()))?;
        let path = input
            .param_str("path")
            .map_err(|e| EngineError::ToolError(e.to_string()))?;

        info!("File operation: {} {}", operation, path);

        let full_path = match self.resolve(&path) {
            Ok(p) => p,
            Err(e) => return Ok(ToolOutput::error(e)),
        };
        debug!("Resolved path: {:?}", full_path);

        let outcome = match operation.as_str() {
            "read" => self.read_file(&full_path).await,
            "write" => {
                let content = input.param_str_opt("content").unwrap_or_default();
                self.write_file(&full_path, &content).await
            }
            "list" => self.list_directory(&full_path).await,
            "delete" => self.delete_file(&full_path).await,
            other => Err(format!("unsupported operation: {}", other)),
        };

        Ok(outcome.unwrap_or_else(ToolOutput::error))
    }
}
