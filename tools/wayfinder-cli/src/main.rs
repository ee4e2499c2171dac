//! Wayfinder CLI - render and audition audio cues
//!
//! # Commands
//!
//! - `wayfinder render` - Write a tone or wall-tone loop to a WAV file
//! - `wayfinder play` - Play a cue on the default output device
//! - `wayfinder config` - Print the default engine config as TOML
//!
//! # Usage
//!
//! ```bash
//! # Beacon ping, 400Hz for 60ms
//! wayfinder render --kind sine --frequency 400 --duration-ms 60 -o ping.wav
//!
//! # Two seconds of the north+east wall loop
//! wayfinder render --directions north,east --repeat-ms 2000 -o walls.wav
//!
//! # Audition a beacon 12 units away, to the right
//! wayfinder play beacon --distance 12 --bearing 1.2
//! ```

mod args;
mod play;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use wayfinder_audio::EngineConfig;

/// Wayfinder CLI - render and audition audio cues
#[derive(Parser)]
#[command(name = "wayfinder")]
#[command(about = "Render and audition Wayfinder audio cues")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a tone or wall-tone loop to a WAV file
    Render(render::RenderArgs),

    /// Play a cue on the default output device
    Play(play::PlayArgs),

    /// Print the default engine config as TOML
    Config {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => render::execute(args),
        Commands::Play(args) => play::execute(args),
        Commands::Config { output } => print_config(output),
    }
}

fn print_config(output: Option<PathBuf>) -> Result<()> {
    let toml = EngineConfig::default()
        .to_toml_string()
        .context("Failed to serialize default config")?;

    match output {
        Some(path) => {
            std::fs::write(&path, toml)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote default config to {}", path.display());
        }
        None => print!("{toml}"),
    }
    Ok(())
}
