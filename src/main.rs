//! ARA Bridge soak tool
//!
//! Drives the reader stack under concurrent document edits and renders
//! synthetic sequences for listening checks.

use std::path::Path;

use clap::Parser;
use tracing::info;

use ara_bridge::cli::{commands, Cli, Commands};
use ara_bridge::{logging, ReaderConfig};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(if cli.verbose { "ara_bridge=debug" } else { "info" });
    info!("ARA Bridge soak tool v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Some(cmd) => handle_command(cmd, &config),
        None => {
            println!("ara-soak v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ReaderConfig> {
    let config = match path {
        Some(path) => ReaderConfig::from_file(path)?,
        None => ReaderConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn handle_command(cmd: Commands, config: &ReaderConfig) -> anyhow::Result<()> {
    match cmd {
        Commands::Soak { readers, edits, seconds } => commands::soak(readers, edits, seconds, config),
        Commands::Render { output, regions } => commands::render(&output, regions, config),
        Commands::Factory => commands::print_factory(),
    }
}
