//! Argument types shared by the subcommands

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use wayfinder_audio::{Direction, DirectionSet, EngineConfig, ToneKind, ToneParams};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Thud,
    Click,
    Sine,
}

impl From<KindArg> for ToneKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Thud => ToneKind::Thud,
            KindArg::Click => ToneKind::Click,
            KindArg::Sine => ToneKind::Sine,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DirectionArg {
    North,
    East,
    South,
    West,
}

impl From<DirectionArg> for Direction {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::North => Direction::North,
            DirectionArg::East => Direction::East,
            DirectionArg::South => Direction::South,
            DirectionArg::West => Direction::West,
        }
    }
}

pub fn direction_set(directions: &[DirectionArg]) -> DirectionSet {
    directions.iter().map(|&d| Direction::from(d)).collect()
}

/// Tone parameters from the command line
#[derive(Args, Debug, Clone)]
pub struct ToneArgs {
    /// Synthesis mode
    #[arg(long, value_enum, default_value = "sine")]
    pub kind: KindArg,

    /// Frequency in Hz (ignored by click)
    #[arg(long, default_value_t = 440.0)]
    pub frequency: f32,

    /// Duration in milliseconds
    #[arg(long, default_value_t = 200.0)]
    pub duration_ms: f32,

    /// Linear volume, 1.0 = full scale
    #[arg(long, default_value_t = 1.0)]
    pub volume: f32,

    /// Pan, 0.0 = left, 0.5 = center, 1.0 = right
    #[arg(long, default_value_t = 0.5)]
    pub pan: f32,

    /// Generate a cycle-aligned loop buffer (sine only)
    #[arg(long)]
    pub sustain: bool,
}

impl ToneArgs {
    pub fn params(&self) -> ToneParams {
        ToneParams::new(self.frequency, self.duration_ms)
            .with_volume(self.volume)
            .with_pan(self.pan)
            .with_sustain(self.sustain)
    }
}

/// Engine config file to load instead of the defaults
#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ConfigArg {
    pub fn load(&self) -> Result<EngineConfig> {
        match &self.config {
            Some(path) => EngineConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display())),
            None => Ok(EngineConfig::default()),
        }
    }
}
