//! CLI Module
//!
//! Command-line interface of the `ara-soak` diagnostic tool.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ARA Bridge soak tool - drives readers under concurrent document edits
#[derive(Parser, Debug)]
#[command(name = "ara-soak")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Reader configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hammer a region sequence reader from several threads while editing
    #[command(name = "soak")]
    Soak {
        /// Number of reader threads
        #[arg(short, long, default_value_t = 4)]
        readers: usize,

        /// Number of document edits spread over the run
        #[arg(short, long, default_value_t = 200)]
        edits: usize,

        /// Run time in seconds
        #[arg(short, long, default_value_t = 5.0)]
        seconds: f64,
    },

    /// Render a synthetic region sequence to a WAV file
    #[command(name = "render")]
    Render {
        /// Output WAV path
        #[arg(short, long)]
        output: PathBuf,

        /// Number of playback regions in the sequence
        #[arg(short, long, default_value_t = 4)]
        regions: usize,
    },

    /// Print the factory descriptor as JSON
    #[command(name = "factory")]
    Factory,
}
