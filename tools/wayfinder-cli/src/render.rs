//! `wayfinder render` - write cues to WAV

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use wayfinder_audio::buffer::{CHANNELS, frames_for_ms};
use wayfinder_audio::{EngineConfig, SAMPLE_RATE, SampleBuffer, mixer, tone};

use crate::args::{ConfigArg, DirectionArg, ToneArgs, direction_set};

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub tone: ToneArgs,

    /// Render the mixed wall-tone loop for these directions instead of a single tone
    #[arg(long, value_enum, value_delimiter = ',')]
    pub directions: Vec<DirectionArg>,

    /// Volume percent (50 = unity, 100 = 2x)
    #[arg(long, default_value_t = 50)]
    pub percent: u8,

    /// Repeat the buffer back to back to fill this many milliseconds
    #[arg(long)]
    pub repeat_ms: Option<f32>,

    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub config: ConfigArg,
}

pub fn execute(args: RenderArgs) -> Result<()> {
    let config = args.config.load()?;
    let buffer = build_buffer(&args, &config)?;

    let repeats = match args.repeat_ms {
        Some(ms) => repeat_count(buffer.frames(), ms),
        None => 1,
    };

    write_wav(&args.output, &buffer, repeats)?;
    tracing::info!(
        "Wrote {} frames ({} x {}) to {}",
        buffer.frames() * repeats,
        buffer.frames(),
        repeats,
        args.output.display()
    );
    Ok(())
}

fn build_buffer(args: &RenderArgs, config: &EngineConfig) -> Result<SampleBuffer> {
    tone::check_percent(args.percent)?;

    if args.directions.is_empty() {
        let params = args.tone.params().at_percent(args.percent);
        return Ok(tone::generate(args.tone.kind.into(), &params)?);
    }

    let mut tones = Vec::new();
    for direction in direction_set(&args.directions).iter() {
        let params = config
            .wall_tones
            .params(direction, config.sustain_ms)
            .at_percent(args.percent);
        tones.push(
            tone::generate(tone::ToneKind::Sine, &params)
                .with_context(|| format!("Invalid wall tone for {direction}"))?,
        );
    }
    Ok(mixer::mix(tones))
}

/// Whole copies of a `frames`-long buffer needed to cover `ms`
fn repeat_count(frames: usize, ms: f32) -> usize {
    if frames == 0 || !ms.is_finite() || ms <= 0.0 {
        return 1;
    }
    frames_for_ms(ms).div_ceil(frames).max(1)
}

fn write_wav(path: &Path, buffer: &SampleBuffer, repeats: usize) -> Result<()> {
    if buffer.is_empty() {
        bail!("Nothing to write: buffer is empty");
    }

    let spec = hound::WavSpec {
        channels: CHANNELS as u16,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for _ in 0..repeats {
        for &sample in buffer.as_slice() {
            writer.write_sample(sample)?;
        }
    }
    writer.finalize().context("Failed to finalize WAV")?;
    Ok(())
}
