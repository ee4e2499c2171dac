//! Wayfinder audio engine
//!
//! Synthesizes, mixes and plays the non-speech cues of the Wayfinder
//! accessibility layer: wall-proximity tones, footstep and bump clicks, and
//! locator beacons.
//!
//! Architecture:
//! - [`tone`] generates interleaved stereo PCM from [`ToneParams`]
//! - [`mixer`] folds simultaneous tones into one buffer with headroom
//! - [`registry`] owns one [`channel::Channel`] per [`ChannelId`], each with a
//!   persistent voice and scratch buffer
//! - [`policy`] tracks what every loop channel is playing so repeated
//!   requests don't retrigger the loop
//! - [`Engine`] ties it together and is the only type collaborators need
//!
//! Audio specs:
//! - 22,050 Hz source sample rate
//! - 16-bit signed interleaved stereo
//! - samples clamped to `[-32767, 32767]`

pub mod buffer;
pub mod channel;
pub mod config;
pub mod cue;
pub mod device;
pub mod engine;
pub mod error;
pub mod mixer;
pub mod policy;
pub mod registry;
pub mod tone;

// Re-export public API
pub use buffer::{SAMPLE_RATE, SampleBuffer};
pub use channel::{ChannelId, ChannelState, ChannelStats};
pub use config::EngineConfig;
pub use device::{OutputDevice, Voice};
pub use engine::{Engine, PlayOutcome};
pub use error::{AudioInitError, ConfigError, InvalidParameterError, PlayError, SubmitError};
pub use policy::{Direction, DirectionSet, LoopOutcome};
pub use tone::{ToneKind, ToneParams};
