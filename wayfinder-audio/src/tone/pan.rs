//! Stereo gain laws

use std::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

/// Constant-power pan gains for `pan` in `[0, 1]`.
///
///   - pan = 0.0: full left
///   - pan = 0.5: center (-3dB each channel)
///   - pan = 1.0: full right
#[inline]
pub fn constant_power(pan: f32, volume: f32) -> (f32, f32) {
    // cos and sin of an f32 pi/4 can round apart
    if pan == 0.5 {
        let gain = volume * FRAC_1_SQRT_2;
        return (gain, gain);
    }
    let angle = pan.clamp(0.0, 1.0) * FRAC_PI_2;
    (volume * angle.cos(), volume * angle.sin())
}

/// Both channels at full `volume` (mono duplicated, no pan law).
#[inline]
pub fn unity(volume: f32) -> (f32, f32) {
    (volume, volume)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_power_center() {
        let (l, r) = constant_power(0.5, 1.0);
        assert!((l - 0.707).abs() < 0.001);
        assert!((r - 0.707).abs() < 0.001);
    }

    #[test]
    fn test_center_is_exactly_balanced() {
        for volume in [0.1, 0.3, 1.0, 2.0] {
            let (l, r) = constant_power(0.5, volume);
            assert_eq!(l, r);
        }
    }

    #[test]
    fn test_constant_power_extremes() {
        let (l, r) = constant_power(0.0, 1.0);
        assert!((l - 1.0).abs() < 1e-6);
        assert!(r.abs() < 1e-6);

        let (l, r) = constant_power(1.0, 1.0);
        assert!(l.abs() < 1e-6);
        assert!((r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_constant_power_keeps_energy() {
        for step in 0..=10 {
            let (l, r) = constant_power(step as f32 / 10.0, 0.8);
            assert!((l * l + r * r - 0.64).abs() < 1e-5);
        }
    }

    #[test]
    fn test_unity() {
        assert_eq!(unity(0.25), (0.25, 0.25));
    }
}
