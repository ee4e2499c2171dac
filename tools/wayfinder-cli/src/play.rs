//! `wayfinder play` - audition cues through the engine

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use wayfinder_audio::device::{CpalDevice, MemoryDevice};
use wayfinder_audio::{ChannelId, Engine, EngineConfig, LoopOutcome, OutputDevice, PlayOutcome};

use crate::args::{ConfigArg, DirectionArg, ToneArgs, direction_set};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Cue {
    /// Footstep click
    Footstep,
    /// Wall bump thud
    Bump,
    /// Locator ping (see --distance/--bearing)
    Beacon,
    /// Wall-tone loop (see --directions)
    Walls,
    /// Arbitrary tone (see --kind, --frequency, ...)
    Tone,
}

#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Cue to play
    #[arg(value_enum)]
    pub cue: Cue,

    /// Volume percent (50 = unity, 100 = 2x)
    #[arg(long, default_value_t = 50)]
    pub percent: u8,

    /// Beacon target distance in world units
    #[arg(long, default_value_t = 10.0)]
    pub distance: f32,

    /// Beacon bearing in radians (0 = ahead, positive = right)
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub bearing: f32,

    /// Wall directions for the loop
    #[arg(long, value_enum, value_delimiter = ',', default_value = "north")]
    pub directions: Vec<DirectionArg>,

    /// How long to keep the engine running, in seconds
    #[arg(long, default_value_t = 2.0)]
    pub seconds: f32,

    /// Re-trigger one-shot cues at this interval (ms) while running
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Channel for `tone`
    #[arg(long, value_enum, default_value = "beacon")]
    pub channel: ChannelArg,

    #[command(flatten)]
    pub tone: ToneArgs,

    /// Run against an in-memory device and report what would be submitted
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub config: ConfigArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ChannelArg {
    Movement,
    WallBump,
    WallTone,
    Beacon,
}

impl From<ChannelArg> for ChannelId {
    fn from(channel: ChannelArg) -> Self {
        match channel {
            ChannelArg::Movement => ChannelId::Movement,
            ChannelArg::WallBump => ChannelId::WallBump,
            ChannelArg::WallTone => ChannelId::WallTone,
            ChannelArg::Beacon => ChannelId::Beacon,
        }
    }
}

pub fn execute(args: PlayArgs) -> Result<()> {
    let config = args.config.load()?;

    if args.dry_run {
        let device = MemoryDevice::new();
        run(&args, &device, config)?;
        for submission in device.history() {
            println!(
                "{}: {} frames{}",
                submission.channel,
                submission.frames,
                if submission.looping { " (looped)" } else { "" }
            );
        }
        return Ok(());
    }

    let device = CpalDevice::open().context("Failed to open audio output")?;
    tracing::info!(
        "Output: {} at {}Hz",
        device.name(),
        device.sample_rate()
    );
    run(&args, &device, config)
}

fn run(args: &PlayArgs, device: &dyn OutputDevice, config: EngineConfig) -> Result<()> {
    let engine = Engine::try_new(device, config).context("Failed to start audio engine")?;
    let running = Duration::from_secs_f32(args.seconds.max(0.0));

    if let Cue::Walls = args.cue {
        let set = direction_set(&args.directions);
        let outcome = engine.play_directional_loop(ChannelId::WallTone, set, args.percent)?;
        tracing::info!("Wall loop {}: {:?}", set, outcome);
        if outcome == LoopOutcome::Started && !args.dry_run {
            thread::sleep(running);
        }
        engine.shutdown();
        return Ok(());
    }

    let interval = args.interval_ms.map(Duration::from_millis);
    let mut elapsed = Duration::ZERO;
    loop {
        let outcome = trigger(&engine, args)?;
        if outcome != PlayOutcome::Played {
            tracing::warn!("Cue not played: {:?}", outcome);
        }

        let Some(step) = interval.filter(|step| !step.is_zero()) else {
            break;
        };
        elapsed += step;
        if elapsed > running {
            break;
        }
        if !args.dry_run {
            thread::sleep(step);
        }
    }

    if !args.dry_run {
        // Let the last one-shot finish
        let tail = running.saturating_sub(elapsed.min(running));
        thread::sleep(tail.max(Duration::from_millis(250)));
    }
    engine.shutdown();
    Ok(())
}

fn trigger(engine: &Engine, args: &PlayArgs) -> Result<PlayOutcome> {
    let outcome = match args.cue {
        Cue::Footstep => engine.play_footstep(args.percent)?,
        Cue::Bump => engine.play_wall_bump(args.percent)?,
        Cue::Beacon => engine.play_beacon(args.distance, args.bearing, args.percent)?,
        Cue::Tone => engine.play_one_shot(
            args.channel.into(),
            args.tone.kind.into(),
            args.tone.params(),
            args.percent,
        )?,
        Cue::Walls => bail!("wall loops are not one-shot cues"),
    };
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::KindArg;
    use wayfinder_audio::device::memory::Submission;

    fn args(cue: Cue) -> PlayArgs {
        PlayArgs {
            cue,
            percent: 50,
            distance: 10.0,
            bearing: 0.0,
            directions: vec![DirectionArg::North, DirectionArg::West],
            seconds: 1.0,
            interval_ms: None,
            channel: ChannelArg::Beacon,
            tone: ToneArgs {
                kind: KindArg::Sine,
                frequency: 400.0,
                duration_ms: 60.0,
                volume: 0.3,
                pan: 0.5,
                sustain: false,
            },
            dry_run: true,
            config: ConfigArg { config: None },
        }
    }

    #[test]
    fn test_dry_run_tone() {
        let device = MemoryDevice::new();
        run(&args(Cue::Tone), &device, EngineConfig::default()).unwrap();
        assert_eq!(
            device.history(),
            vec![Submission {
                channel: ChannelId::Beacon,
                frames: 1323,
                looping: false
            }]
        );
    }

    #[test]
    fn test_dry_run_walls_loops() {
        let device = MemoryDevice::new();
        run(&args(Cue::Walls), &device, EngineConfig::default()).unwrap();
        let history = device.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].channel, ChannelId::WallTone);
        assert!(history[0].looping);
        // Shut down afterwards
        assert_eq!(device.open_voices(), 0);
    }

    #[test]
    fn test_dry_run_interval_retriggers() {
        let device = MemoryDevice::new();
        let mut footsteps = args(Cue::Footstep);
        footsteps.interval_ms = Some(250);
        run(&footsteps, &device, EngineConfig::default()).unwrap();
        // t = 0, 250, 500, 750, 1000
        assert_eq!(device.submissions(ChannelId::Movement), 5);
    }
}
