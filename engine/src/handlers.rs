//! Command handlers for CLI operations
//!
//! This module implements the handlers for all CLI commands:
//! - run: Execute a task immediately
//! - status: Show agent status
//! - agents / tools: List the roster and tool inventory
//! - memory: Stats, export, import

use anyhow::{Context, Result};
use std::path::Path;

use crate::agent::Agent;
use crate::config::Config;
use crate::memory::MemoryExport;

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Run a task immediately
pub async fn handle_run(
    task: String,
    profile: Option<String>,
    context: Option<String>,
    config: &Config,
    format: OutputFormat,
) -> Result<()> {
    let context_value = match context {
        Some(raw) => Some(
            serde_json::from_str(&raw).context("--context must be a valid JSON value")?,
        ),
        None => None,
    };

    let agent = Agent::from_config(config);

    let report = match profile {
        Some(name) => agent.run_task_as(&name, &task, context_value).await?,
        None => agent.run_task(&task, context_value).await?,
    };

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if report.success {
                let synthesis = report.result.as_ref();
                let summary = synthesis
                    .and_then(|s| s.summary.as_deref())
                    .unwrap_or("(no summary)");
                println!("Task completed in {}ms as '{}'.", report.duration_ms, report.profile);
                println!("\n{}", summary);

                if let Some(findings) = synthesis.filter(|s| !s.key_findings.is_empty()) {
                    println!("\nKey findings:");
                    for finding in &findings.key_findings {
                        println!("  - {}", finding);
                    }
                }
                if let Some(steps) = synthesis.filter(|s| !s.next_steps.is_empty()) {
                    println!("\nNext steps:");
                    for step in &steps.next_steps {
                        println!("  - {}", step);
                    }
                }
            } else {
                println!(
                    "Task failed after {}ms: {}",
                    report.duration_ms,
                    report.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }

    Ok(())
}

/// Show agent status
pub fn handle_status(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = Agent::from_config(config);
    let status = agent.status();

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Text => {
            println!("Agent: {}", status.name);
            println!("Busy: {}", status.busy);
            println!("Tasks completed: {}", status.tasks_completed);
            println!(
                "Memory: {} working / {} episodic / {} semantic",
                status.memory.working, status.memory.episodic, status.memory.semantic
            );
            println!("Tools: {}", status.tools.join(", "));
            println!("Profiles: {}", status.profiles.join(", "));
        }
    }

    Ok(())
}

/// List specialist profiles
pub fn handle_agents(config: &Config, format: OutputFormat) -> Result<()> {
    let roster = crate::agent::Roster::standard(
        &config.agents.default_profile,
        config.agents.selection_threshold,
    );

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(roster.profiles())?)
        }
        OutputFormat::Text => {
            for profile in roster.profiles() {
                println!("{:<12} {} — {}", profile.name, profile.role, profile.description);
            }
        }
    }

    Ok(())
}

/// List registered tools
pub fn handle_tools(config: &Config, format: OutputFormat) -> Result<()> {
    let registry = crate::tools::ToolRegistry::with_defaults(config);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&registry.list())?),
        OutputFormat::Text => {
            for info in registry.list() {
                println!("{:<16} {}", info.name, info.description);
                for param in &info.parameters {
                    let required = if param.required { "required" } else { "optional" };
                    println!("    {} ({}): {}", param.name, required, param.description);
                }
            }
        }
    }

    Ok(())
}

/// Show memory stats
pub fn handle_memory_stats(config: &Config, format: OutputFormat) -> Result<()> {
    let agent = Agent::from_config(config);
    let snapshot = agent.memory_snapshot(5);

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        OutputFormat::Text => {
            println!(
                "Memory: {} working / {} episodic / {} semantic",
                snapshot.sizes.working, snapshot.sizes.episodic, snapshot.sizes.semantic
            );
            println!(
                "Stats: {} tasks stored, {} knowledge items, {} retrievals",
                snapshot.stats.tasks_stored,
                snapshot.stats.knowledge_items,
                snapshot.stats.total_retrievals
            );
        }
    }

    Ok(())
}

/// Export the memory store to a JSON file
pub fn handle_memory_export(path: &Path, config: &Config) -> Result<()> {
    let agent = Agent::from_config(config);
    let export = agent.export_memory();

    let serialized = serde_json::to_string_pretty(&export)?;
    std::fs::write(path, serialized)
        .with_context(|| format!("Failed to write memory export to {:?}", path))?;

    println!("Memory exported to {:?}", path);
    Ok(())
}

/// Import a memory store from a JSON file
pub fn handle_memory_import(path: &Path, config: &Config) -> Result<()> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read memory export from {:?}", path))?;
    let export: MemoryExport =
        serde_json::from_str(&contents).context("Memory export file is malformed")?;

    let agent = Agent::from_config(config);
    agent.import_memory(export);

    let sizes = agent.status().memory;
    println!(
        "Memory imported: {} working / {} episodic / {} semantic",
        sizes.working, sizes.episodic, sizes.semantic
    );
    Ok(())
}
