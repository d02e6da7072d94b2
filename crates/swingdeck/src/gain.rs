//! Stereo gain law
//!
//! Maps a linear pan position onto a floored, quadratic left/right gain
//! pair. Both the manual pan path and the modulation loop go through
//! [`stereo_gain`]; nothing else computes channel gains.

use serde::{Deserialize, Serialize};

/// Linear gain for each side of the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoGain {
    pub left: f32,
    pub right: f32,
}

impl StereoGain {
    /// Same gain on both sides (used when a channel first starts).
    pub fn uniform(gain: f32) -> Self {
        Self {
            left: gain,
            right: gain,
        }
    }
}

impl Default for StereoGain {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

/// Compute channel gains for `pan` in [-1, 1] at master `volume`, never
/// letting either side fall below `min_volume * volume`.
///
/// ```text
/// raw_left  = 0.5 * (1 - pan) * volume
/// raw_right = 0.5 * (1 + pan) * volume
/// floor     = min_volume * volume
/// left      = floor + (1 - floor) * raw_left^2
/// right     = floor + (1 - floor) * raw_right^2
/// ```
pub fn stereo_gain(pan: f32, volume: f32, min_volume: f32) -> StereoGain {
    let pan = pan.clamp(-1.0, 1.0);
    let volume = volume.clamp(0.0, 1.0);
    let min_volume = min_volume.clamp(0.0, 1.0);

    let raw_left = 0.5 * (1.0 - pan) * volume;
    let raw_right = 0.5 * (1.0 + pan) * volume;
    let floor = min_volume * volume;

    StereoGain {
        left: floor + (1.0 - floor) * raw_left * raw_left,
        right: floor + (1.0 - floor) * raw_right * raw_right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-6;

    #[test]
    fn test_full_right_floors_left() {
        let gain = stereo_gain(1.0, 1.0, 0.2);
        assert_eq!(gain.left, 0.2);
        assert!((gain.right - 1.0).abs() < EPS);
    }

    #[test]
    fn test_full_left_floors_right() {
        let gain = stereo_gain(-1.0, 1.0, 0.2);
        assert!((gain.left - 1.0).abs() < EPS);
        assert_eq!(gain.right, 0.2);
    }

    #[test]
    fn test_center_half_volume() {
        // raw = 0.25, floor = 0.1 -> 0.1 + 0.9 * 0.0625
        let gain = stereo_gain(0.0, 0.5, 0.2);
        assert!((gain.left - 0.15625).abs() < EPS);
        assert!((gain.right - 0.15625).abs() < EPS);
    }

    #[test]
    fn test_symmetry() {
        for i in 0..=40 {
            let pan = -1.0 + i as f32 * 0.05;
            for volume in [0.0, 0.3, 0.7, 1.0] {
                for min_volume in [0.0, 0.2, 0.9] {
                    let a = stereo_gain(pan, volume, min_volume);
                    let b = stereo_gain(-pan, volume, min_volume);
                    assert!((a.left - b.right).abs() < EPS, "pan={pan} v={volume} m={min_volume}");
                    assert!((a.right - b.left).abs() < EPS, "pan={pan} v={volume} m={min_volume}");
                }
            }
        }
    }

    #[test]
    fn test_never_below_floor() {
        for i in 0..=40 {
            let pan = -1.0 + i as f32 * 0.05;
            for volume in [0.0, 0.25, 0.5, 1.0] {
                for min_volume in [0.0, 0.2, 0.5, 1.0] {
                    let gain = stereo_gain(pan, volume, min_volume);
                    let floor = min_volume * volume;
                    assert!(gain.left >= floor - EPS);
                    assert!(gain.right >= floor - EPS);
                    assert!(gain.left <= 1.0 + EPS);
                    assert!(gain.right <= 1.0 + EPS);
                }
            }
        }
    }

    #[test]
    fn test_unity_volume_bounded_by_volume() {
        for i in 0..=20 {
            let pan = -1.0 + i as f32 * 0.1;
            let gain = stereo_gain(pan, 1.0, 0.2);
            assert!(gain.left >= 0.2 - EPS && gain.left <= 1.0 + EPS);
            assert!(gain.right >= 0.2 - EPS && gain.right <= 1.0 + EPS);
        }
    }

    #[test]
    fn test_silence_at_zero_volume() {
        let gain = stereo_gain(0.3, 0.0, 0.2);
        assert_eq!(gain, StereoGain::uniform(0.0));
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        assert_eq!(stereo_gain(5.0, 1.0, 0.2), stereo_gain(1.0, 1.0, 0.2));
        assert_eq!(stereo_gain(0.0, 3.0, 0.2), stereo_gain(0.0, 1.0, 0.2));
    }
}
