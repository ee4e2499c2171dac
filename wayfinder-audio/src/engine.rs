//! Audio engine
//!
//! The one type collaborators hold. Owns the channel registry, the loop
//! memos and the tone cache; every call is synchronous and returns as soon
//! as the sound is handed to the device.
//!
//! If the device can't be opened the engine still constructs, in a
//! disabled state where every play is a silent no-op.

use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::buffer::SampleBuffer;
use crate::channel::{ChannelId, ChannelStats};
use crate::config::EngineConfig;
use crate::cue;
use crate::device::OutputDevice;
use crate::error::{AudioInitError, PlayError};
use crate::policy::{DirectionSet, LoopOutcome, LoopPolicy};
use crate::registry::ChannelRegistry;
use crate::tone::{self, ToneKind, ToneParams, UNITY_PERCENT};

/// What a one-shot request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Handed to the device
    Played,
    /// Volume percent was 0; nothing was submitted
    Muted,
    /// The engine has no output device
    Disabled,
}

/// Cache key: tone parameters by bit pattern (f32 isn't `Hash`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ToneKey {
    kind: ToneKind,
    frequency: u32,
    duration_ms: u32,
    volume: u32,
    pan: u32,
    sustain: bool,
}

impl ToneKey {
    fn new(kind: ToneKind, params: &ToneParams) -> Self {
        Self {
            kind,
            frequency: params.frequency.to_bits(),
            duration_ms: params.duration_ms.to_bits(),
            volume: params.volume.to_bits(),
            pan: params.pan.to_bits(),
            sustain: params.sustain,
        }
    }
}

/// Bounded cache of generated one-shots.
///
/// Once full, new tones are generated per call and not stored, so the
/// entries warmed at startup always stay.
#[derive(Debug)]
struct ToneCache {
    entries: HashMap<ToneKey, Arc<SampleBuffer>>,
    capacity: usize,
}

impl ToneCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    fn get_or_generate(
        &mut self,
        kind: ToneKind,
        params: &ToneParams,
    ) -> Result<Arc<SampleBuffer>, PlayError> {
        let key = ToneKey::new(kind, params);
        if let Some(buffer) = self.entries.get(&key) {
            return Ok(Arc::clone(buffer));
        }

        let buffer = Arc::new(tone::generate(kind, params)?);
        if self.entries.len() < self.capacity {
            self.entries.insert(key, Arc::clone(&buffer));
        }
        Ok(buffer)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The audio engine.
#[derive(Debug)]
pub struct Engine {
    registry: Option<ChannelRegistry>,
    policy: LoopPolicy,
    cache: Mutex<ToneCache>,
    config: EngineConfig,
}

impl Engine {
    /// Start the engine on `device`.
    ///
    /// Never fails: an unusable device or config is logged and the engine
    /// runs disabled.
    pub fn new(device: &dyn OutputDevice, config: EngineConfig) -> Self {
        match Self::try_new(device, config.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                warn!("Audio disabled: {}", e);
                Self::disabled(config)
            }
        }
    }

    /// Start the engine on `device`, reporting why it couldn't.
    pub fn try_new(device: &dyn OutputDevice, config: EngineConfig) -> Result<Self, AudioInitError> {
        config
            .validate()
            .map_err(|e| AudioInitError::InvalidConfig(e.to_string()))?;

        let registry = ChannelRegistry::open(device, &config.channels)?;
        let engine = Self {
            registry: Some(registry),
            policy: LoopPolicy::new(),
            cache: Mutex::new(ToneCache::new(config.cache_entries)),
            config,
        };
        engine.warm_cache();

        info!("Audio engine started on '{}'", device.name());
        Ok(engine)
    }

    /// An engine with no device. Every play is a no-op.
    pub fn disabled(config: EngineConfig) -> Self {
        Self {
            registry: None,
            policy: LoopPolicy::new(),
            cache: Mutex::new(ToneCache::new(0)),
            config,
        }
    }

    /// Pre-generate the static cues at unity volume
    fn warm_cache(&self) {
        let mut cache = self.lock_cache();
        for (kind, params) in [cue::footstep(&self.config), cue::wall_bump(&self.config)] {
            // Already validated with the config
            if let Err(e) = cache.get_or_generate(kind, &params.at_percent(UNITY_PERCENT)) {
                warn!("Failed to pre-generate {:?} tone: {}", kind, e);
            }
        }
        debug!("Tone cache warmed ({} entries)", cache.len());
    }

    fn lock_cache(&self) -> MutexGuard<'_, ToneCache> {
        self.cache.lock().unwrap_or_else(|e| {
            warn!("Tone cache mutex poisoned; continuing");
            e.into_inner()
        })
    }

    /// Whether a device is attached
    pub fn is_enabled(&self) -> bool {
        self.registry.is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Play a one-shot tone, cutting off whatever `channel` was playing.
    ///
    /// `percent` is the host volume preference: 50 = unity, 0 = silent,
    /// 100 = 2x. Parameters are validated even when the engine is disabled.
    pub fn play_one_shot(
        &self,
        channel: ChannelId,
        kind: ToneKind,
        params: ToneParams,
        percent: u8,
    ) -> Result<PlayOutcome, PlayError> {
        tone::check_percent(percent)?;
        params.validate()?;

        let Some(registry) = &self.registry else {
            return Ok(PlayOutcome::Disabled);
        };
        if percent == 0 {
            return Ok(PlayOutcome::Muted);
        }

        // Size check before anything is synthesized
        let lane = registry.channel(channel);
        lane.reserve(tone::frame_count(kind, &params))?;

        let buffer = self.lock_cache().get_or_generate(kind, &params.at_percent(percent))?;
        self.policy.take_over(lane, &buffer)?;
        Ok(PlayOutcome::Played)
    }

    /// Loop the wall tones for `directions` on `channel`.
    ///
    /// Repeating the same `(directions, percent)` is free: nothing is
    /// resubmitted. An empty set or zero volume stops the loop.
    pub fn play_directional_loop(
        &self,
        channel: ChannelId,
        directions: DirectionSet,
        percent: u8,
    ) -> Result<LoopOutcome, PlayError> {
        tone::check_percent(percent)?;
        let Some(registry) = &self.registry else {
            return Ok(LoopOutcome::Disabled);
        };
        self.policy
            .request(registry.channel(channel), directions, percent, &self.config)
    }

    /// Stop the loop on `channel`
    pub fn stop_loop(&self, channel: ChannelId) {
        if let Some(registry) = &self.registry {
            self.policy.stop(registry.channel(channel));
        }
    }

    /// Stop whatever `channel` is playing
    pub fn stop(&self, channel: ChannelId) {
        if let Some(registry) = &self.registry {
            self.policy.stop(registry.channel(channel));
        }
    }

    /// Silence every channel
    pub fn stop_all(&self) {
        if let Some(registry) = &self.registry {
            for id in ChannelId::ALL {
                self.policy.stop(registry.channel(id));
            }
        }
    }

    pub fn is_playing(&self, channel: ChannelId) -> bool {
        self.registry
            .as_ref()
            .is_some_and(|registry| registry.is_playing(channel))
    }

    /// Footstep click on the movement channel
    pub fn play_footstep(&self, percent: u8) -> Result<PlayOutcome, PlayError> {
        let (kind, params) = cue::footstep(&self.config);
        self.play_one_shot(ChannelId::Movement, kind, params, percent)
    }

    /// Thud on the wall-bump channel
    pub fn play_wall_bump(&self, percent: u8) -> Result<PlayOutcome, PlayError> {
        let (kind, params) = cue::wall_bump(&self.config);
        self.play_one_shot(ChannelId::WallBump, kind, params, percent)
    }

    /// Locator ping for a target `distance` away at `bearing` radians
    /// (0 ahead, positive to the right).
    pub fn play_beacon(&self, distance: f32, bearing: f32, percent: u8) -> Result<PlayOutcome, PlayError> {
        let params = cue::beacon(&self.config.beacon, distance, bearing)?;
        self.play_one_shot(ChannelId::Beacon, ToneKind::Sine, params, percent)
    }

    /// Counters for `channel`, if the engine is enabled
    pub fn stats(&self, channel: ChannelId) -> Option<ChannelStats> {
        self.registry.as_ref().map(|registry| registry.stats(channel))
    }

    /// Number of cached one-shot buffers
    pub fn cached_tones(&self) -> usize {
        self.lock_cache().len()
    }

    /// Stop everything and release the device.
    pub fn shutdown(mut self) {
        if let Some(registry) = self.registry.take() {
            registry.close();
            info!("Audio engine shut down");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::memory::MemoryDevice;

    #[test]
    fn test_cache_warmed_at_start() {
        let device = MemoryDevice::new();
        let engine = Engine::new(&device, EngineConfig::default());
        assert!(engine.is_enabled());
        assert_eq!(engine.cached_tones(), 2);

        // Unity-volume footsteps reuse the warmed buffer
        engine.play_footstep(UNITY_PERCENT).unwrap();
        assert_eq!(engine.cached_tones(), 2);
        engine.play_footstep(80).unwrap();
        assert_eq!(engine.cached_tones(), 3);
    }

    #[test]
    fn test_cache_is_bounded() {
        let device = MemoryDevice::new();
        let config = EngineConfig {
            cache_entries: 3,
            ..EngineConfig::default()
        };
        let engine = Engine::new(&device, config);

        for distance in [1.0, 2.0, 3.0, 4.0, 5.0] {
            assert_eq!(engine.play_beacon(distance, 0.0, 50).unwrap(), PlayOutcome::Played);
        }
        assert_eq!(engine.cached_tones(), 3);
        assert_eq!(device.submissions(ChannelId::Beacon), 5);
    }

    #[test]
    fn test_cache_key_distinguishes_params() {
        let a = ToneParams::new(400.0, 60.0);
        assert_eq!(ToneKey::new(ToneKind::Sine, &a), ToneKey::new(ToneKind::Sine, &a));
        assert_ne!(ToneKey::new(ToneKind::Sine, &a), ToneKey::new(ToneKind::Click, &a));
        assert_ne!(
            ToneKey::new(ToneKind::Sine, &a),
            ToneKey::new(ToneKind::Sine, &a.with_pan(0.4))
        );
    }

    #[test]
    fn test_invalid_config_disables_engine() {
        let device = MemoryDevice::new();
        let mut config = EngineConfig::default();
        config.footstep.duration_ms = f32::NAN;

        assert!(matches!(
            Engine::try_new(&device, config.clone()),
            Err(AudioInitError::InvalidConfig(_))
        ));
        let engine = Engine::new(&device, config);
        assert!(!engine.is_enabled());
        assert_eq!(device.open_voices(), 0);
    }

    #[test]
    fn test_one_shot_on_loop_channel_drops_memo() {
        let device = MemoryDevice::new();
        let engine = Engine::new(&device, EngineConfig::default());
        let north = DirectionSet::from([crate::policy::Direction::North]);

        engine
            .play_directional_loop(ChannelId::WallTone, north, 50)
            .unwrap();
        engine
            .play_one_shot(ChannelId::WallTone, ToneKind::Sine, ToneParams::new(440.0, 50.0), 50)
            .unwrap();

        // The loop was cut off, so the same request must start it again
        assert_eq!(
            engine
                .play_directional_loop(ChannelId::WallTone, north, 50)
                .unwrap(),
            LoopOutcome::Started
        );
    }

    #[test]
    fn test_shutdown_releases_device() {
        let device = MemoryDevice::new();
        let engine = Engine::new(&device, EngineConfig::default());
        engine
            .play_directional_loop(ChannelId::WallTone, DirectionSet::from_bits(0b11), 50)
            .unwrap();
        engine.shutdown();
        assert!(!device.is_active(ChannelId::WallTone));
        assert_eq!(device.open_voices(), 0);
    }
}
