//! Error types for the audio engine
//!
//! None of these are fatal: every failure degrades to "this sound did not
//! play" and nothing is retried automatically.

use crate::channel::ChannelId;

/// Failure to bring up the output device or one of its voices.
///
/// The engine reports this once at startup and then runs disabled.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AudioInitError {
    /// The host has no default output device
    #[error("no audio output device available")]
    NoDevice,

    /// The device only offers a sample format we can't write
    #[error("unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Building or starting the output stream failed
    #[error("failed to start audio stream: {0}")]
    Stream(String),

    /// The device refused to open another voice
    #[error("device refused to open a voice for {channel} ({opened} already open)")]
    VoiceLimit { channel: ChannelId, opened: usize },

    /// The configuration failed validation
    #[error("invalid engine config: {0}")]
    InvalidConfig(String),
}

/// A single play request rejected after validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The device refused the prepared buffer
    #[error("device rejected submission on {0}")]
    Rejected(ChannelId),

    /// The device went away (stream thread exited, device unplugged)
    #[error("device disconnected while submitting on {0}")]
    Disconnected(ChannelId),

    /// The buffer does not fit the channel's scratch buffer
    #[error("{channel}: buffer of {samples} samples exceeds scratch capacity of {capacity}")]
    BufferTooLarge {
        channel: ChannelId,
        samples: usize,
        capacity: usize,
    },
}

/// Tone parameters rejected before any buffer is allocated.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidParameterError {
    /// Frequency must be finite and positive
    #[error("invalid frequency {0} Hz (must be finite and > 0)")]
    Frequency(f32),

    /// Duration must be finite and positive
    #[error("invalid duration {0} ms (must be finite and > 0)")]
    Duration(f32),

    /// Volume must be finite and non-negative
    #[error("invalid volume {0} (must be finite and >= 0)")]
    Volume(f32),

    /// Pan must lie in [0, 1]
    #[error("invalid pan {0} (must be in 0.0..=1.0)")]
    Pan(f32),

    /// Volume percent must lie in 0..=100
    #[error("invalid volume percent {0} (must be 0-100)")]
    VolumePercent(u8),

    /// Beacon distance must be finite and non-negative
    #[error("invalid distance {0} (must be finite and >= 0)")]
    Distance(f32),

    /// Beacon bearing must be finite
    #[error("invalid bearing {0} rad (must be finite)")]
    Bearing(f32),
}

/// Error returned from an engine play call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayError {
    #[error(transparent)]
    InvalidParameter(#[from] InvalidParameterError),

    #[error(transparent)]
    Submit(#[from] SubmitError),
}

/// Error loading an [`EngineConfig`](crate::EngineConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid tone in config section [{section}]: {source}")]
    Tone {
        section: String,
        #[source]
        source: InvalidParameterError,
    },

    #[error("[{section}] needs {frames} frames but the {channel} channel holds {capacity}")]
    Capacity {
        section: String,
        channel: ChannelId,
        frames: usize,
        capacity: usize,
    },
}
