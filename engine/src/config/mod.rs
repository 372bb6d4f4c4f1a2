//! Configuration management
//!
//! This module handles loading, validation, and management of the Maestro
//! configuration. Configuration is stored in TOML format at
//! ~/.maestro/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Workspace path, log level, data directory
//! - **reasoning**: Reasoning provider settings and preferences
//! - **memory**: Working-memory capacity and retrieval limits
//! - **tools**: Built-in tool enablement flags
//! - **agents**: Specialist profile selection settings
//!
//! # Path Expansion
//!
//! The configuration system automatically:
//! - Expands ~ to the user's home directory
//! - Canonicalizes paths to resolve symlinks and .. patterns
//! - Verifies workspace is a directory
//! - Creates workspace directory if it doesn't exist
//!
//! # Examples
//!
//! ```no_run
//! use maestro_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from default location
//! let config = Config::load_or_create()?;
//!
//! // Access configuration values
//! println!("Workspace: {:?}", config.core.workspace);
//! println!("Default provider: {}", config.reasoning.default_provider);
//! # Ok(())
//! # }
//! ```

use sdk::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
///
/// This structure represents the complete Maestro configuration loaded from
/// ~/.maestro/config.toml. All sections have serde defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Reasoning provider configuration
    #[serde(default)]
    pub reasoning: ReasoningConfig,

    /// Memory system configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Built-in tool enablement
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Specialist profile settings
    #[serde(default)]
    pub agents: AgentsConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Workspace directory for the file_operations tool (supports ~ expansion)
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Data directory path (supports ~ expansion)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

/// Reasoning provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Default reasoning provider (openai, anthropic, mock)
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAIConfig,

    /// Anthropic provider settings
    #[serde(default)]
    pub anthropic: AnthropicConfig,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            openai: OpenAIConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

/// OpenAI provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    /// Base URL for the OpenAI-compatible API
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// API key; prefer the environment variable over putting keys in the file
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_base_url(),
            model: default_openai_model(),
            api_key: None,
            api_key_env: default_openai_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Anthropic provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    /// Base URL for the Anthropic API
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,

    /// Model name
    #[serde(default = "default_anthropic_model")]
    pub model: String,

    /// API key; prefer the environment variable over putting keys in the file
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable consulted when `api_key` is unset
    #[serde(default = "default_anthropic_key_env")]
    pub api_key_env: String,

    /// Completion token limit
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            base_url: default_anthropic_base_url(),
            model: default_anthropic_model(),
            api_key: None,
            api_key_env: default_anthropic_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Memory system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Maximum entries held in working memory (FIFO bound)
    #[serde(default = "default_working_capacity")]
    pub working_capacity: usize,

    /// Default number of memories retrieved for prompt context
    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            working_capacity: default_working_capacity(),
            retrieval_limit: default_retrieval_limit(),
        }
    }
}

/// Built-in tool enablement configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Enable the calculator tool
    #[serde(default = "default_true")]
    pub calculator: bool,

    /// Enable the web_search tool
    #[serde(default = "default_true")]
    pub web_search: bool,

    /// Enable the file_operations tool
    #[serde(default = "default_true")]
    pub file_operations: bool,

    /// Enable the code_executor tool
    #[serde(default)]
    pub code_executor: bool,

    /// Timeout in seconds for code_executor runs
    #[serde(default = "default_code_timeout")]
    pub code_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            calculator: true,
            web_search: true,
            file_operations: true,
            code_executor: false,
            code_timeout_secs: default_code_timeout(),
        }
    }
}

/// Specialist profile selection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    /// Profile used when no specialist scores above the threshold
    #[serde(default = "default_profile")]
    pub default_profile: String,

    /// Minimum can-handle score required to pick a specialist
    #[serde(default = "default_selection_threshold")]
    pub selection_threshold: f64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            default_profile: default_profile(),
            selection_threshold: default_selection_threshold(),
        }
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workspace() -> PathBuf {
    PathBuf::from("~/.maestro/workspace")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("~/.maestro")
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com/v1".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_working_capacity() -> usize {
    10
}

fn default_retrieval_limit() -> usize {
    5
}

fn default_code_timeout() -> u64 {
    30
}

fn default_profile() -> String {
    "generalist".to_string()
}

fn default_selection_threshold() -> f64 {
    0.2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            core: CoreConfig::default(),
            reasoning: ReasoningConfig::default(),
            memory: MemoryConfig::default(),
            tools: ToolsConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location (~/.maestro/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default
    /// configuration. Validates the configuration after loading and returns
    /// descriptive errors if validation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails (invalid paths, unknown provider, bad threshold)
    pub fn load_or_create() -> Result<Self, EngineError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails, or
    /// validation fails.
    pub fn load_from_path(path: &Path) -> Result<Self, EngineError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate_and_process()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    fn create_default(path: &Path) -> Result<Self, EngineError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                EngineError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let mut config = Self::default();
        config.validate_and_process()?;

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| EngineError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| EngineError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.maestro/config.toml)
    fn default_config_path() -> Result<PathBuf, EngineError> {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".maestro").join("config.toml"))
    }

    /// Validate and process configuration
    ///
    /// This method:
    /// - Validates the log level and default provider
    /// - Validates numeric bounds
    /// - Expands ~ in paths
    /// - Creates the workspace and data directories if missing
    fn validate_and_process(&mut self) -> Result<(), EngineError> {
        // Validate log level
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        // Validate default provider
        let valid_providers = ["openai", "anthropic", "mock"];
        if !valid_providers.contains(&self.reasoning.default_provider.as_str()) {
            return Err(EngineError::Config(format!(
                "Invalid default provider '{}'. Must be one of: {}",
                self.reasoning.default_provider,
                valid_providers.join(", ")
            )));
        }

        // Validate selection threshold
        if self.agents.selection_threshold < 0.0 || self.agents.selection_threshold > 1.0 {
            return Err(EngineError::Config(
                "selection_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Working memory must hold at least one entry
        if self.memory.working_capacity == 0 {
            return Err(EngineError::Config(
                "working_capacity must be at least 1".to_string(),
            ));
        }

        // Expand and create workspace
        self.core.workspace = expand_path(&self.core.workspace)?;
        self.core.workspace = canonicalize_or_create(&self.core.workspace)?;

        if !self.core.workspace.is_dir() {
            return Err(EngineError::Config(format!(
                "Workspace path is not a directory: {:?}",
                self.core.workspace
            )));
        }

        // Expand and create data directory
        self.core.data_dir = expand_path(&self.core.data_dir)?;

        if !self.core.data_dir.exists() {
            fs::create_dir_all(&self.core.data_dir).map_err(|e| {
                EngineError::Config(format!("Failed to create data directory: {}", e))
            })?;
        }

        Ok(())
    }
}

/// Expand ~ in path to user's home directory
fn expand_path(path: &Path) -> Result<PathBuf, EngineError> {
    let path_str = path
        .to_str()
        .ok_or_else(|| EngineError::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(rest) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(rest))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| EngineError::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Canonicalize path, creating it if it doesn't exist
fn canonicalize_or_create(path: &Path) -> Result<PathBuf, EngineError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| {
            EngineError::Config(format!("Failed to create directory {:?}: {}", path, e))
        })?;
    }

    path.canonicalize().map_err(|e| {
        EngineError::Config(format!("Failed to canonicalize path {:?}: {}", path, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.core.log_level, "info");
        assert_eq!(config.reasoning.default_provider, "openai");
        assert_eq!(config.memory.working_capacity, 10);
        assert_eq!(config.memory.retrieval_limit, 5);
        assert!(config.tools.calculator);
        assert!(!config.tools.code_executor);
        assert_eq!(config.agents.default_profile, "generalist");
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test");
        let expanded = expand_path(&path).unwrap();

        let home = dirs::home_dir().unwrap();
        assert_eq!(expanded, home.join("test"));
    }

    #[test]
    fn test_expand_path_without_tilde() {
        let path = PathBuf::from("/absolute/path");
        let expanded = expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string(&config).unwrap();

        // Verify it can be deserialized back
        let deserialized: Config = toml::from_str(&toml_string).unwrap();
        assert_eq!(config.core.log_level, deserialized.core.log_level);
        assert_eq!(
            config.reasoning.default_provider,
            deserialized.reasoning.default_provider
        );
        assert_eq!(
            config.memory.working_capacity,
            deserialized.memory.working_capacity
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [reasoning]
            default_provider = "anthropic"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(config.reasoning.default_provider, "anthropic");
        assert_eq!(config.memory.working_capacity, 10);
        assert_eq!(config.core.log_level, "info");
    }

    #[test]
    fn test_invalid_provider_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [reasoning]
            default_provider = "watson"
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [core]
            log_level = "verbose"
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(&path);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_working_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [memory]
            working_capacity = 0
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(&path);
        assert!(result.is_err());
    }
}
