// Maestro task agent
// Main entry point for the maestro binary

use clap::Parser;
use maestro_engine::cli::{Cli, Command, MemoryAction};
use maestro_engine::config::Config;
use maestro_engine::handlers::{
    handle_agents, handle_memory_export, handle_memory_import, handle_memory_stats, handle_run,
    handle_status, handle_tools, OutputFormat,
};
use maestro_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    tracing::info!("Maestro v{}", env!("CARGO_PKG_VERSION"));

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with config-driven log level
    // (only takes effect if RUST_LOG env var is not set)
    init_telemetry_with_level(&config.core.log_level);

    match cli.command {
        Command::Run {
            task,
            agent,
            context,
        } => handle_run(task, agent, context, &config, format).await,

        Command::Status => handle_status(&config, format),

        Command::Agents => handle_agents(&config, format),

        Command::Tools => handle_tools(&config, format),

        Command::Memory { action } => match action {
            MemoryAction::Stats => handle_memory_stats(&config, format),
            MemoryAction::Export { path } => handle_memory_export(&path, &config),
            MemoryAction::Import { path } => handle_memory_import(&path, &config),
        },
    }
}
