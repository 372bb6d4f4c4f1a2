//! Built-in tools and the tool registry
//!
//! The registry is the closed dispatch surface for the executor: tools are
//! keyed by name, looked up per step, and invoked through the `sdk::Tool`
//! capability interface. An unknown tool name is a recoverable per-step
//! error, never a startup failure.

pub mod calculator;
pub mod code_executor;
pub mod file_operations;
pub mod web_search;

pub use calculator::CalculatorTool;
pub use code_executor::CodeExecutorTool;
pub use file_operations::FileOperationsTool;
pub use web_search::WebSearchTool;

use crate::config::Config;
use sdk::errors::EngineError;
use sdk::tool::{Tool, ToolInfo};
use sdk::types::{ToolInput, ToolOutput};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of available tools, keyed by name
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry with no tools
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry with the built-in tools enabled by the config
    pub fn with_defaults(config: &Config) -> Self {
        let mut registry = Self::empty();

        if config.tools.calculator {
            registry.register(Arc::new(CalculatorTool));
        }
        if config.tools.web_search {
            registry.register(Arc::new(WebSearchTool::new(None)));
        }
        if config.tools.file_operations {
            registry.register(Arc::new(FileOperationsTool::new(
                config.core.workspace.clone(),
            )));
        }
        if config.tools.code_executor {
            registry.register(Arc::new(CodeExecutorTool::new(
                config.tools.code_timeout_secs,
            )));
        }

        info!("{} tools registered", registry.len());
        registry
    }

    /// Register a tool under its own name
    ///
    /// A tool registered twice replaces the earlier instance.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!("Tool registered: {}", tool.name());
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Validate and execute a tool by name
    ///
    /// An unknown name yields `ToolNotFound`, which callers recover into the
    /// step result rather than propagating.
    pub async fn execute(&self, name: &str, input: ToolInput) -> Result<ToolOutput, EngineError> {
        let tool = self
            .get(name)
            .ok_or_else(|| EngineError::ToolNotFound(name.to_string()))?;
        tool.run(input).await
    }

    /// Descriptive summaries of every registered tool, sorted by name
    pub fn list(&self) -> Vec<ToolInfo> {
        let mut infos: Vec<ToolInfo> = self.tools.values().map(|t| t.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Names of every registered tool, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry holds no tools
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Render the tool inventory as prompt lines ("- name: description")
    pub fn catalog(&self) -> String {
        self.list()
            .iter()
            .map(|info| format!("- {}: {}", info.name, info.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = ToolRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.get("calculator").is_none());
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(CalculatorTool));

        assert_eq!(registry.len(), 1);
        let tool = registry.get("calculator").expect("registered tool");
        assert_eq!(tool.name(), "calculator");
    }

    #[test]
    fn test_unknown_tool_is_none() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(CalculatorTool));

        assert!(registry.get("teleporter").is_none());
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(WebSearchTool::new(None)));
        registry.register(Arc::new(CalculatorTool));

        assert_eq!(registry.names(), vec!["calculator", "web_search"]);
    }

    #[test]
    fn test_catalog_lines() {
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(CalculatorTool));

        let catalog = registry.catalog();
        assert!(catalog.starts_with("- calculator: "));
    }
}
