//! Cue presets
//!
//! Maps gameplay-level events onto tone parameters. Beacons encode where a
//! target is: nearer targets ping higher and louder, and the ping is panned
//! toward the target's bearing.

use std::f32::consts::FRAC_PI_2;

use crate::config::{BeaconConfig, EngineConfig};
use crate::error::InvalidParameterError;
use crate::tone::{ToneKind, ToneParams};

/// Footstep click
pub fn footstep(config: &EngineConfig) -> (ToneKind, ToneParams) {
    (ToneKind::Click, config.footstep)
}

/// Wall collision thud
pub fn wall_bump(config: &EngineConfig) -> (ToneKind, ToneParams) {
    (ToneKind::Thud, config.bump)
}

/// Rolloff of a normalized distance (0 = at the listener, 1 = max range).
///
/// `1 / (1 + d^2)`: full volume up close, half volume at max range.
#[inline]
pub fn attenuation(normalized_distance: f32) -> f32 {
    let d = normalized_distance.clamp(0.0, 1.0);
    1.0 / (1.0 + d * d)
}

/// Pan for a bearing in radians relative to the listener's facing.
///
/// 0 is straight ahead, positive is clockwise (to the right). Targets
/// behind the listener fold back toward the side they are on.
#[inline]
pub fn bearing_pan(bearing: f32) -> f32 {
    (0.5 + 0.5 * bearing.sin()).clamp(0.0, 1.0)
}

/// Locator ping for a target `distance` world units away at `bearing`.
pub fn beacon(
    config: &BeaconConfig,
    distance: f32,
    bearing: f32,
) -> Result<ToneParams, InvalidParameterError> {
    if !distance.is_finite() || distance < 0.0 {
        return Err(InvalidParameterError::Distance(distance));
    }
    if !bearing.is_finite() {
        return Err(InvalidParameterError::Bearing(bearing));
    }

    let t = (distance / config.max_distance).min(1.0);
    let frequency = config.near_frequency + (config.far_frequency - config.near_frequency) * t;

    Ok(ToneParams::new(frequency, config.duration_ms)
        .with_volume(config.volume * attenuation(t))
        .with_pan(bearing_pan(bearing)))
}

/// Bearing pointing straight to the right
pub const RIGHT: f32 = FRAC_PI_2;

/// Bearing pointing straight to the left
pub const LEFT: f32 = -FRAC_PI_2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_come_from_config() {
        let config = EngineConfig::default();
        assert_eq!(footstep(&config), (ToneKind::Click, config.footstep));
        assert_eq!(wall_bump(&config), (ToneKind::Thud, config.bump));
    }

    #[test]
    fn test_attenuation() {
        assert_eq!(attenuation(0.0), 1.0);
        assert_eq!(attenuation(1.0), 0.5);
        assert_eq!(attenuation(4.0), 0.5);
        assert!(attenuation(0.3) > attenuation(0.6));
    }

    #[test]
    fn test_bearing_pan() {
        assert_eq!(bearing_pan(0.0), 0.5);
        assert!((bearing_pan(RIGHT) - 1.0).abs() < 1e-6);
        assert!(bearing_pan(LEFT).abs() < 1e-6);
        // Behind and slightly right is still right of center
        assert!(bearing_pan(std::f32::consts::PI - 0.3) > 0.5);
    }

    #[test]
    fn test_beacon_near_and_far() {
        let config = BeaconConfig::default();

        let near = beacon(&config, 0.0, 0.0).unwrap();
        assert_eq!(near.frequency, config.near_frequency);
        assert_eq!(near.volume, config.volume);
        assert_eq!(near.pan, 0.5);
        assert!(!near.sustain);

        let far = beacon(&config, config.max_distance * 3.0, 0.0).unwrap();
        assert_eq!(far.frequency, config.far_frequency);
        assert_eq!(far.volume, config.volume * 0.5);

        let mid = beacon(&config, config.max_distance / 2.0, 0.0).unwrap();
        assert!(mid.frequency < near.frequency && mid.frequency > far.frequency);
        assert!(mid.volume < near.volume && mid.volume > far.volume);
    }

    #[test]
    fn test_beacon_follows_bearing() {
        let config = BeaconConfig::default();
        let left = beacon(&config, 10.0, LEFT).unwrap();
        let right = beacon(&config, 10.0, RIGHT).unwrap();
        assert!(left.pan < 0.5);
        assert!(right.pan > 0.5);
        assert_eq!(left.frequency, right.frequency);
    }

    #[test]
    fn test_beacon_params_validate() {
        let config = BeaconConfig::default();
        for distance in [0.0, 1.0, 25.0, 50.0, 1000.0] {
            beacon(&config, distance, 1.0).unwrap().validate().unwrap();
        }
    }

    #[test]
    fn test_beacon_rejects_bad_distance() {
        let config = BeaconConfig::default();
        assert_eq!(
            beacon(&config, -1.0, 0.0),
            Err(InvalidParameterError::Distance(-1.0))
        );
        assert!(beacon(&config, f32::NAN, 0.0).is_err());
        assert_eq!(
            beacon(&config, 1.0, f32::INFINITY),
            Err(InvalidParameterError::Bearing(f32::INFINITY))
        );
    }
}
