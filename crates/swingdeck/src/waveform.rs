//! Swing waveforms
//!
//! Pure functions from elapsed time to a pan position. Every pattern has
//! period `1 / frequency`, is continuous, and stays inside [-1, 1].

use std::f64::consts::{PI, TAU};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Shape of the automatic left/right swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwingPattern {
    /// `x = sin(2πft)`
    #[default]
    Sine,
    /// `x·|x|` - lingers near the centre
    Parabola,
    /// `x³`
    Cubic,
    /// Linear sweep between the extremes
    Triangle,
    /// `sign(x)·|x|^0.5` - lingers near the sides
    Exponential,
    /// `sign(x)·|x|²`
    Logarithmic,
}

impl SwingPattern {
    pub const ALL: [SwingPattern; 6] = [
        SwingPattern::Sine,
        SwingPattern::Parabola,
        SwingPattern::Cubic,
        SwingPattern::Triangle,
        SwingPattern::Exponential,
        SwingPattern::Logarithmic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SwingPattern::Sine => "sine",
            SwingPattern::Parabola => "parabola",
            SwingPattern::Cubic => "cubic",
            SwingPattern::Triangle => "triangle",
            SwingPattern::Exponential => "exponential",
            SwingPattern::Logarithmic => "logarithmic",
        }
    }

    /// Stable index for lock-free storage.
    pub(crate) fn index(self) -> u8 {
        match self {
            SwingPattern::Sine => 0,
            SwingPattern::Parabola => 1,
            SwingPattern::Cubic => 2,
            SwingPattern::Triangle => 3,
            SwingPattern::Exponential => 4,
            SwingPattern::Logarithmic => 5,
        }
    }

    pub(crate) fn from_index(index: u8) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for SwingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Pattern name not in the closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown swing pattern '{0}' (expected one of: sine, parabola, cubic, triangle, exponential, logarithmic)")]
pub struct UnknownPattern(pub String);

impl FromStr for SwingPattern {
    type Err = UnknownPattern;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPattern(s.to_string()))
    }
}

/// Pan position at time `t` seconds for a swing of `frequency` Hz.
pub fn pan_at(pattern: SwingPattern, t: f64, frequency: f64) -> f64 {
    let phase = TAU * frequency * t;
    let x = phase.sin();

    let pan = match pattern {
        SwingPattern::Sine => x,
        SwingPattern::Parabola => x * x.abs(),
        SwingPattern::Cubic => x * x * x,
        SwingPattern::Triangle => 2.0 * ((phase.rem_euclid(TAU) / PI) - 1.0).abs() - 1.0,
        SwingPattern::Exponential => signum(x) * x.abs().sqrt(),
        SwingPattern::Logarithmic => signum(x) * x * x,
    };

    pan.clamp(-1.0, 1.0)
}

/// Sign with `signum(0) == 0`, unlike `f64::signum`.
fn signum(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_parse_names() {
        for pattern in SwingPattern::ALL {
            assert_eq!(pattern.name().parse::<SwingPattern>(), Ok(pattern));
        }
        assert_eq!("  Cubic ".parse::<SwingPattern>(), Ok(SwingPattern::Cubic));
        assert_eq!(
            "bogus".parse::<SwingPattern>(),
            Err(UnknownPattern("bogus".to_string()))
        );
    }

    #[test]
    fn test_index_roundtrip() {
        for pattern in SwingPattern::ALL {
            assert_eq!(SwingPattern::from_index(pattern.index()), pattern);
        }
        assert_eq!(SwingPattern::from_index(200), SwingPattern::Sine);
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&SwingPattern::Exponential).unwrap();
        assert_eq!(json, "\"exponential\"");
        let back: SwingPattern = serde_json::from_str("\"triangle\"").unwrap();
        assert_eq!(back, SwingPattern::Triangle);
    }

    #[test]
    fn test_periodic() {
        for interval in [0.1, 1.0, 2.0, 3.7] {
            let f = 1.0 / interval;
            for pattern in SwingPattern::ALL {
                for t in [0.013, 0.21, 0.37, 0.5, 0.91, 1.33] {
                    let a = pan_at(pattern, t, f);
                    let b = pan_at(pattern, t + interval, f);
                    assert!(
                        (a - b).abs() < 1e-6,
                        "{pattern} interval={interval} t={t}: {a} vs {b}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_bounded() {
        for pattern in SwingPattern::ALL {
            for i in 0..1000 {
                let pan = pan_at(pattern, i as f64 * 0.0037, 0.5);
                assert!((-1.0..=1.0).contains(&pan), "{pattern}: {pan}");
            }
        }
    }

    #[test]
    fn test_quarter_period_extremes() {
        // At t = interval/4 the sine is at +1, at 3/4 it is at -1
        let f = 1.0;
        for pattern in [
            SwingPattern::Sine,
            SwingPattern::Parabola,
            SwingPattern::Cubic,
            SwingPattern::Exponential,
            SwingPattern::Logarithmic,
        ] {
            assert!((pan_at(pattern, 0.25, f) - 1.0).abs() < EPS, "{pattern}");
            assert!((pan_at(pattern, 0.75, f) + 1.0).abs() < EPS, "{pattern}");
            assert!(pan_at(pattern, 0.0, f).abs() < EPS, "{pattern}");
        }
    }

    #[test]
    fn test_shapes_at_known_point() {
        // t = 1/12 s at 1 Hz -> x = sin(π/6) = 0.5
        let t = 1.0 / 12.0;
        assert!((pan_at(SwingPattern::Sine, t, 1.0) - 0.5).abs() < EPS);
        assert!((pan_at(SwingPattern::Parabola, t, 1.0) - 0.25).abs() < EPS);
        assert!((pan_at(SwingPattern::Cubic, t, 1.0) - 0.125).abs() < EPS);
        assert!((pan_at(SwingPattern::Exponential, t, 1.0) - 0.5f64.sqrt()).abs() < EPS);
        assert!((pan_at(SwingPattern::Logarithmic, t, 1.0) - 0.25).abs() < EPS);
    }

    #[test]
    fn test_negative_half_keeps_sign() {
        // t = 7/12 s at 1 Hz -> x = -0.5
        let t = 7.0 / 12.0;
        assert!((pan_at(SwingPattern::Parabola, t, 1.0) + 0.25).abs() < EPS);
        assert!((pan_at(SwingPattern::Exponential, t, 1.0) + 0.5f64.sqrt()).abs() < EPS);
        assert!((pan_at(SwingPattern::Logarithmic, t, 1.0) + 0.25).abs() < EPS);
    }

    #[test]
    fn test_triangle_sweep() {
        assert!((pan_at(SwingPattern::Triangle, 0.0, 1.0) - 1.0).abs() < EPS);
        assert!((pan_at(SwingPattern::Triangle, 0.25, 1.0) - 0.0).abs() < EPS);
        assert!((pan_at(SwingPattern::Triangle, 0.5, 1.0) + 1.0).abs() < EPS);
        assert!((pan_at(SwingPattern::Triangle, 0.75, 1.0) - 0.0).abs() < EPS);
        // Linear between the corners
        assert!((pan_at(SwingPattern::Triangle, 0.125, 1.0) - 0.5).abs() < EPS);
    }
}
