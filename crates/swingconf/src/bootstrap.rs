//! Bootstrap configuration - seeds the player at startup, then the player owns it.

use serde::{Deserialize, Serialize};

/// Initial player settings.
///
/// Every value here can be changed at runtime through the control surface;
/// these only decide what the player looks like before the first request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDefaults {
    /// Master gain, 0.0-1.0.
    #[serde(default = "PlayerDefaults::default_volume")]
    pub volume: f32,

    /// Gain floor as a fraction of the master gain, 0.0-1.0.
    #[serde(default = "PlayerDefaults::default_min_volume")]
    pub min_volume: f32,

    /// Seconds per full left-right-left oscillation.
    #[serde(default = "PlayerDefaults::default_swing_interval")]
    pub swing_interval: f64,

    /// Waveform name (sine, parabola, cubic, triangle, exponential, logarithmic).
    #[serde(default = "PlayerDefaults::default_pattern")]
    pub pattern: String,

    #[serde(default)]
    pub looping: bool,

    /// Modulation tick period in milliseconds.
    #[serde(default = "PlayerDefaults::default_tick_ms")]
    pub tick_ms: u64,

    /// Queue depth for pushed gain updates before they are dropped.
    #[serde(default = "PlayerDefaults::default_listener_capacity")]
    pub listener_capacity: usize,
}

impl PlayerDefaults {
    fn default_volume() -> f32 {
        1.0
    }

    fn default_min_volume() -> f32 {
        0.2
    }

    fn default_swing_interval() -> f64 {
        2.0
    }

    fn default_pattern() -> String {
        "sine".to_string()
    }

    fn default_tick_ms() -> u64 {
        10
    }

    fn default_listener_capacity() -> usize {
        64
    }
}

impl Default for PlayerDefaults {
    fn default() -> Self {
        Self {
            volume: Self::default_volume(),
            min_volume: Self::default_min_volume(),
            swing_interval: Self::default_swing_interval(),
            pattern: Self::default_pattern(),
            looping: false,
            tick_ms: Self::default_tick_ms(),
            listener_capacity: Self::default_listener_capacity(),
        }
    }
}

/// External downloader settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Program to invoke. Resolved through PATH when not absolute.
    #[serde(default = "FetcherConfig::default_program")]
    pub program: String,

    #[serde(default = "FetcherConfig::default_audio_format")]
    pub audio_format: String,

    #[serde(default = "FetcherConfig::default_audio_quality")]
    pub audio_quality: String,
}

impl FetcherConfig {
    fn default_program() -> String {
        "yt-dlp".to_string()
    }

    fn default_audio_format() -> String {
        "mp3".to_string()
    }

    fn default_audio_quality() -> String {
        "192K".to_string()
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            audio_format: Self::default_audio_format(),
            audio_quality: Self::default_audio_quality(),
        }
    }
}

/// Bootstrap section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapConfig {
    #[serde(default)]
    pub player: PlayerDefaults,

    #[serde(default)]
    pub fetcher: FetcherConfig,
}
