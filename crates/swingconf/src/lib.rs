//! Layered configuration loading for SwingBox.
//!
//! Configuration is split into two categories:
//!
//! - **Infrastructure** (`InfraConfig`): things that cannot change at
//!   runtime - the downloads directory, bind address, telemetry endpoint.
//!
//! - **Bootstrap** (`BootstrapConfig`): initial values that seed the player
//!   and the downloader. After startup the player is the source of truth.
//!
//! # Usage
//!
//! ```rust,no_run
//! use swingconf::SwingConfig;
//!
//! let config = SwingConfig::load().expect("Failed to load config");
//! println!("downloads: {}", config.infra.paths.downloads_dir.display());
//! println!("listening on {}", config.infra.bind.addr());
//! println!("default pattern: {}", config.bootstrap.player.pattern);
//! ```
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/swingbox/config.toml` (system)
//! 2. `~/.config/swingbox/config.toml` (user)
//! 3. `./swingbox.toml` (local override, replaced by `--config`)
//! 4. Environment variables (`SWINGBOX_*`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! downloads_dir = "~/Music/swingbox"
//!
//! [bind]
//! host = "127.0.0.1"
//! http_port = 8000
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "debug"
//!
//! [player]
//! min_volume = 0.2
//! swing_interval = 2.0
//! pattern = "triangle"
//!
//! [fetcher]
//! program = "/usr/local/bin/yt-dlp"
//! ```

pub mod bootstrap;
pub mod infra;
pub mod loader;

pub use bootstrap::{BootstrapConfig, FetcherConfig, PlayerDefaults};
pub use infra::{BindConfig, InfraConfig, PathsConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete SwingBox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SwingConfig {
    /// Infrastructure - cannot change at runtime.
    #[serde(flatten)]
    pub infra: InfraConfig,

    /// Bootstrap - seeds runtime state.
    #[serde(flatten)]
    pub bootstrap: BootstrapConfig,
}

impl SwingConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./swingbox.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from an optional path and report where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = SwingConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::overlay_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# SwingBox Configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!(
            "downloads_dir = \"{}\"\n",
            self.infra.paths.downloads_dir.display()
        ));

        output.push_str("\n[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.infra.bind.host));
        output.push_str(&format!("http_port = {}\n", self.infra.bind.http_port));

        output.push_str("\n[telemetry]\n");
        if let Some(endpoint) = &self.infra.telemetry.otlp_endpoint {
            output.push_str(&format!("otlp_endpoint = \"{}\"\n", endpoint));
        }
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        let player = &self.bootstrap.player;
        output.push_str("\n[player]\n");
        output.push_str(&format!("volume = {:?}\n", player.volume));
        output.push_str(&format!("min_volume = {:?}\n", player.min_volume));
        output.push_str(&format!("swing_interval = {:?}\n", player.swing_interval));
        output.push_str(&format!("pattern = \"{}\"\n", player.pattern));
        output.push_str(&format!("looping = {}\n", player.looping));
        output.push_str(&format!("tick_ms = {}\n", player.tick_ms));
        output.push_str(&format!(
            "listener_capacity = {}\n",
            player.listener_capacity
        ));

        let fetcher = &self.bootstrap.fetcher;
        output.push_str("\n[fetcher]\n");
        output.push_str(&format!("program = \"{}\"\n", fetcher.program));
        output.push_str(&format!("audio_format = \"{}\"\n", fetcher.audio_format));
        output.push_str(&format!("audio_quality = \"{}\"\n", fetcher.audio_quality));

        output
    }
}
