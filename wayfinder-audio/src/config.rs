//! Engine configuration (TOML)
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration. Sections:
//!
//! ```toml
//! sustain_ms = 500.0
//! cache_entries = 64
//!
//! [channels]      # scratch capacity per channel, in ms of audio
//! [wall_tones]    # frequency/pan per direction, loop volume
//! [footstep]      # click parameters
//! [bump]          # thud parameters
//! [beacon]        # locator ping pitch/volume range
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::buffer::frames_for_ms;
use crate::channel::ChannelId;
use crate::error::{ConfigError, InvalidParameterError};
use crate::policy::Direction;
use crate::tone::{ToneParams, sustain_frames};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Target loop length before cycle alignment (default: 500)
    #[serde(default = "default_sustain_ms")]
    pub sustain_ms: f32,
    /// Upper bound on cached one-shot buffers (default: 64)
    #[serde(default = "default_cache_entries")]
    pub cache_entries: usize,
    /// Scratch buffer sizes
    #[serde(default)]
    pub channels: ChannelConfig,
    /// Directional wall-proximity loops
    #[serde(default)]
    pub wall_tones: WallToneConfig,
    /// Footstep click (default: 40ms, volume 0.5)
    #[serde(default = "default_footstep")]
    pub footstep: ToneParams,
    /// Wall bump thud (default: 27Hz, 150ms, volume 0.8)
    #[serde(default = "default_bump")]
    pub bump: ToneParams,
    /// Locator pings
    #[serde(default)]
    pub beacon: BeaconConfig,
}

/// Scratch capacity per channel, in milliseconds of audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    #[serde(default = "default_movement_ms")]
    pub movement_ms: f32,
    #[serde(default = "default_wall_bump_ms")]
    pub wall_bump_ms: f32,
    #[serde(default = "default_wall_tone_ms")]
    pub wall_tone_ms: f32,
    #[serde(default = "default_beacon_ms")]
    pub beacon_ms: f32,
}

/// Pitch and position of one direction's wall tone
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionTone {
    pub frequency: f32,
    #[serde(default = "default_center")]
    pub pan: f32,
}

/// Wall-proximity loop configuration.
///
/// The default pitches have whole-sample periods at 22,050 Hz, so every
/// cycle of the loop is bit-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WallToneConfig {
    /// Linear gain of each direction before mixing (default: 0.4)
    #[serde(default = "default_wall_volume")]
    pub volume: f32,
    #[serde(default = "default_north")]
    pub north: DirectionTone,
    #[serde(default = "default_east")]
    pub east: DirectionTone,
    #[serde(default = "default_south")]
    pub south: DirectionTone,
    #[serde(default = "default_west")]
    pub west: DirectionTone,
}

/// Locator ping configuration.
///
/// Pitch falls linearly from `near_frequency` to `far_frequency` as the
/// target moves out to `max_distance`; volume follows an inverse-square
/// style rolloff from `volume`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconConfig {
    #[serde(default = "default_near_frequency")]
    pub near_frequency: f32,
    #[serde(default = "default_far_frequency")]
    pub far_frequency: f32,
    #[serde(default = "default_beacon_duration")]
    pub duration_ms: f32,
    #[serde(default = "default_beacon_volume")]
    pub volume: f32,
    /// Distance (in world units) at which the ping bottoms out
    #[serde(default = "default_max_distance")]
    pub max_distance: f32,
}

fn default_sustain_ms() -> f32 {
    500.0
}
fn default_cache_entries() -> usize {
    64
}
fn default_footstep() -> ToneParams {
    ToneParams::new(1000.0, 40.0).with_volume(0.5)
}
fn default_bump() -> ToneParams {
    ToneParams::new(27.0, 150.0).with_volume(0.8)
}

fn default_movement_ms() -> f32 {
    250.0
}
fn default_wall_bump_ms() -> f32 {
    400.0
}
fn default_wall_tone_ms() -> f32 {
    1000.0
}
fn default_beacon_ms() -> f32 {
    500.0
}

fn default_center() -> f32 {
    0.5
}
fn default_wall_volume() -> f32 {
    0.4
}
fn default_north() -> DirectionTone {
    DirectionTone {
        frequency: 441.0,
        pan: 0.5,
    }
}
fn default_east() -> DirectionTone {
    DirectionTone {
        frequency: 490.0,
        pan: 1.0,
    }
}
fn default_south() -> DirectionTone {
    DirectionTone {
        frequency: 315.0,
        pan: 0.5,
    }
}
fn default_west() -> DirectionTone {
    DirectionTone {
        frequency: 630.0,
        pan: 0.0,
    }
}

fn default_near_frequency() -> f32 {
    880.0
}
fn default_far_frequency() -> f32 {
    400.0
}
fn default_beacon_duration() -> f32 {
    60.0
}
fn default_beacon_volume() -> f32 {
    0.6
}
fn default_max_distance() -> f32 {
    50.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sustain_ms: default_sustain_ms(),
            cache_entries: default_cache_entries(),
            channels: ChannelConfig::default(),
            wall_tones: WallToneConfig::default(),
            footstep: default_footstep(),
            bump: default_bump(),
            beacon: BeaconConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            movement_ms: default_movement_ms(),
            wall_bump_ms: default_wall_bump_ms(),
            wall_tone_ms: default_wall_tone_ms(),
            beacon_ms: default_beacon_ms(),
        }
    }
}

impl Default for WallToneConfig {
    fn default() -> Self {
        Self {
            volume: default_wall_volume(),
            north: default_north(),
            east: default_east(),
            south: default_south(),
            west: default_west(),
        }
    }
}

impl Default for BeaconConfig {
    fn default() -> Self {
        Self {
            near_frequency: default_near_frequency(),
            far_frequency: default_far_frequency(),
            duration_ms: default_beacon_duration(),
            volume: default_beacon_volume(),
            max_distance: default_max_distance(),
        }
    }
}

impl ChannelConfig {
    /// Configured capacity of `channel` in milliseconds
    pub fn capacity_ms(&self, channel: ChannelId) -> f32 {
        match channel {
            ChannelId::Movement => self.movement_ms,
            ChannelId::WallBump => self.wall_bump_ms,
            ChannelId::WallTone => self.wall_tone_ms,
            ChannelId::Beacon => self.beacon_ms,
        }
    }

    /// Scratch capacity of `channel` in frames
    pub fn capacity_frames(&self, channel: ChannelId) -> usize {
        let ms = self.capacity_ms(channel);
        if ms.is_finite() && ms > 0.0 {
            frames_for_ms(ms)
        } else {
            0
        }
    }
}

impl WallToneConfig {
    pub fn direction(&self, direction: Direction) -> DirectionTone {
        match direction {
            Direction::North => self.north,
            Direction::East => self.east,
            Direction::South => self.south,
            Direction::West => self.west,
        }
    }

    /// Sustain parameters for `direction` at full configured volume
    pub fn params(&self, direction: Direction, sustain_ms: f32) -> ToneParams {
        let tone = self.direction(direction);
        ToneParams::new(tone.frequency, sustain_ms)
            .with_volume(self.volume)
            .with_pan(tone.pan)
            .with_sustain(true)
    }
}

impl EngineConfig {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        config.validate()?;
        debug!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load a config file, falling back to defaults if it is missing or invalid.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No config at {}; using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check every configured tone the way a play call would, and that each
    /// fits the channel it is played on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let tone_error = |section: &str| {
            let section = section.to_string();
            move |source| ConfigError::Tone { section, source }
        };

        self.footstep.validate().map_err(tone_error("footstep"))?;
        self.bump.validate().map_err(tone_error("bump"))?;
        self.fits("footstep", ChannelId::Movement, frames_for_ms(self.footstep.duration_ms))?;
        self.fits("bump", ChannelId::WallBump, frames_for_ms(self.bump.duration_ms))?;

        for direction in Direction::ALL {
            let params = self.wall_tones.params(direction, self.sustain_ms);
            let section = format!("wall_tones.{}", direction.name());
            params.validate().map_err(tone_error(&section))?;
            let (frames, _) = sustain_frames(params.frequency, params.duration_ms);
            self.fits(&section, ChannelId::WallTone, frames)?;
        }

        for frequency in [self.beacon.near_frequency, self.beacon.far_frequency] {
            ToneParams::new(frequency, self.beacon.duration_ms)
                .with_volume(self.beacon.volume)
                .validate()
                .map_err(tone_error("beacon"))?;
        }
        if !self.beacon.max_distance.is_finite() || self.beacon.max_distance <= 0.0 {
            return Err(ConfigError::Tone {
                section: "beacon".into(),
                source: InvalidParameterError::Distance(self.beacon.max_distance),
            });
        }
        self.fits("beacon", ChannelId::Beacon, frames_for_ms(self.beacon.duration_ms))?;

        Ok(())
    }

    fn fits(&self, section: &str, channel: ChannelId, frames: usize) -> Result<(), ConfigError> {
        let capacity = self.channels.capacity_frames(channel);
        if frames > capacity {
            return Err(ConfigError::Capacity {
                section: section.to_string(),
                channel,
                frames,
                capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            sustain_ms = 250.0

            [wall_tones.east]
            frequency = 525.0
            "#,
        )
        .unwrap();

        assert_eq!(config.sustain_ms, 250.0);
        assert_eq!(config.wall_tones.east.frequency, 525.0);
        assert_eq!(config.wall_tones.east.pan, 0.5);
        assert_eq!(config.wall_tones.west, default_west());
        assert_eq!(config.channels, ChannelConfig::default());
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = EngineConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(EngineConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_parse_error() {
        let err = EngineConfig::from_toml_str("sustain_ms = \"long\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_invalid_tone_names_section() {
        let mut config = EngineConfig::default();
        config.bump.frequency = -1.0;
        match config.validate().unwrap_err() {
            ConfigError::Tone { section, source } => {
                assert_eq!(section, "bump");
                assert_eq!(source, InvalidParameterError::Frequency(-1.0));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_loop_must_fit_channel() {
        let mut config = EngineConfig::default();
        config.sustain_ms = 2000.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Capacity {
                channel: ChannelId::WallTone,
                ..
            }
        ));
    }

    #[test]
    fn test_zero_capacity_rejects_tones() {
        let mut config = EngineConfig::default();
        config.channels.movement_ms = 0.0;
        assert_eq!(config.channels.capacity_frames(ChannelId::Movement), 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[beacon]\nmax_distance = 20.0").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.beacon.max_distance, 20.0);
        assert_eq!(config.beacon.duration_ms, 60.0);
    }

    #[test]
    fn test_load_or_default_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("wayfinder.toml");
        assert_eq!(EngineConfig::load_or_default(&missing), EngineConfig::default());

        std::fs::write(&missing, "[footstep]\nfrequency = 1000.0\nduration_ms = 0.0").unwrap();
        assert!(EngineConfig::load(&missing).is_err());
        assert_eq!(EngineConfig::load_or_default(&missing), EngineConfig::default());
    }
}
