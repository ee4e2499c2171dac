//! Tone generation
//!
//! Pure functions turning [`ToneParams`] into interleaved stereo PCM. No
//! shared state and no device resources: the same parameters always produce
//! the same buffer (noise is seeded).
//!
//! Volume is baked in while synthesizing. Scaling finished i16 samples
//! throws away resolution, which is audible as buzzing on quiet loops, so
//! callers ask for a fresh buffer whenever the volume changes.

use serde::{Deserialize, Serialize};

use crate::buffer::{FRAME_BYTES, SAMPLE_RATE, SampleBuffer, frames_for_ms};
use crate::error::InvalidParameterError;

pub mod pan;
mod synth;


pub use synth::{click, one_shot_sine, sustain_frames, sustain_sine, thud};

/// Volume percent that maps to unity gain
pub const UNITY_PERCENT: u8 = 50;

/// Highest accepted volume percent (2x gain)
pub const MAX_PERCENT: u8 = 100;

/// Synthesis mode for a cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneKind {
    /// Low sine plus filtered noise (wall bump)
    Thud,
    /// Decaying filtered noise (footstep)
    Click,
    /// Sine, enveloped or cycle-aligned depending on [`ToneParams::sustain`]
    Sine,
}

/// Parameters for one generated tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneParams {
    /// Frequency in Hz
    pub frequency: f32,
    /// Duration in milliseconds (target length for sustain tones)
    pub duration_ms: f32,
    /// Linear gain, 1.0 = full scale. Values above 1.0 clip.
    #[serde(default = "default_volume")]
    pub volume: f32,
    /// 0.0 = full left, 0.5 = center, 1.0 = full right
    #[serde(default = "default_pan")]
    pub pan: f32,
    /// Generate a flat, cycle-aligned buffer suitable for looping
    #[serde(default)]
    pub sustain: bool,
}

fn default_volume() -> f32 {
    1.0
}
fn default_pan() -> f32 {
    0.5
}

impl ToneParams {
    /// Centered, full-volume, non-sustained tone.
    pub fn new(frequency: f32, duration_ms: f32) -> Self {
        Self {
            frequency,
            duration_ms,
            volume: default_volume(),
            pan: default_pan(),
            sustain: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_pan(mut self, pan: f32) -> Self {
        self.pan = pan;
        self
    }

    pub fn with_sustain(mut self, sustain: bool) -> Self {
        self.sustain = sustain;
        self
    }

    /// Fold a host volume preference (50 = unity, 0 = silent, 100 = 2x) into `volume`.
    pub fn at_percent(self, percent: u8) -> Self {
        self.with_volume(self.volume * percent_gain(percent))
    }

    /// Reject parameters that can't produce a sound.
    ///
    /// Frequencies at or above Nyquist are rejected too: a sustain tone
    /// there has fewer than two samples per cycle.
    pub fn validate(&self) -> Result<(), InvalidParameterError> {
        let nyquist = SAMPLE_RATE as f32 / 2.0;
        if !self.frequency.is_finite() || self.frequency <= 0.0 || self.frequency >= nyquist {
            return Err(InvalidParameterError::Frequency(self.frequency));
        }
        if !self.duration_ms.is_finite() || self.duration_ms <= 0.0 {
            return Err(InvalidParameterError::Duration(self.duration_ms));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(InvalidParameterError::Volume(self.volume));
        }
        if !(0.0..=1.0).contains(&self.pan) {
            return Err(InvalidParameterError::Pan(self.pan));
        }
        Ok(())
    }
}

/// Linear gain for a volume percent (50 = 1.0).
#[inline]
pub fn percent_gain(percent: u8) -> f32 {
    percent as f32 / UNITY_PERCENT as f32
}

/// Validate a host volume percent.
pub fn check_percent(percent: u8) -> Result<(), InvalidParameterError> {
    if percent > MAX_PERCENT {
        return Err(InvalidParameterError::VolumePercent(percent));
    }
    Ok(())
}

/// Frames [`generate`] produces for these parameters, computed without
/// synthesizing anything.
pub fn frame_count(kind: ToneKind, params: &ToneParams) -> usize {
    match kind {
        ToneKind::Sine if params.sustain => sustain_frames(params.frequency, params.duration_ms).0,
        _ => frames_for_ms(params.duration_ms).max(1),
    }
}

/// Generate a tone of the given kind.
///
/// Parameters are validated first; nothing is allocated for a rejected tone.
/// Durations too long to address in memory are rejected as invalid.
pub fn generate(kind: ToneKind, params: &ToneParams) -> Result<SampleBuffer, InvalidParameterError> {
    params.validate()?;
    let addressable = frame_count(kind, params)
        .checked_mul(FRAME_BYTES)
        .is_some_and(|bytes| bytes <= isize::MAX as usize);
    if !addressable {
        return Err(InvalidParameterError::Duration(params.duration_ms));
    }
    let buffer = match kind {
        ToneKind::Thud => thud(params),
        ToneKind::Click => click(params),
        ToneKind::Sine if params.sustain => sustain_sine(params),
        ToneKind::Sine => one_shot_sine(params),
    };
    Ok(buffer)
}
