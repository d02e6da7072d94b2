//! Config file discovery, loading, and environment variable overlay.
//!
//! Each file is applied as an overlay: only keys present in the file replace
//! the current value, so a user file that sets one port does not reset the
//! system file's downloads directory.

use crate::{ConfigError, SwingConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli). Only existing
/// files are returned.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/swingbox/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("swingbox/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("swingbox.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay it onto `config`.
pub fn overlay_file(config: &mut SwingConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    overlay_toml(config, &contents, path)
}

/// Overlay a TOML document onto `config`. `path` is only used for error messages.
pub fn overlay_toml(config: &mut SwingConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if let Some(paths) = table.get("paths").and_then(|v| v.as_table()) {
        if let Some(v) = paths.get("downloads_dir").and_then(|v| v.as_str()) {
            config.infra.paths.downloads_dir = expand_path(v);
        }
    }

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.infra.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.infra.bind.http_port = u16::try_from(v)
                .map_err(|_| parse_err(format!("bind.http_port out of range: {}", v)))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.infra.telemetry.otlp_endpoint = non_empty(v);
        }
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.infra.telemetry.log_level = v.to_string();
        }
    }

    if let Some(player) = table.get("player").and_then(|v| v.as_table()) {
        let defaults = &mut config.bootstrap.player;
        if let Some(v) = player.get("volume").and_then(as_f64) {
            defaults.volume = v as f32;
        }
        if let Some(v) = player.get("min_volume").and_then(as_f64) {
            defaults.min_volume = v as f32;
        }
        if let Some(v) = player.get("swing_interval").and_then(as_f64) {
            if !(v.is_finite() && v > 0.0) {
                return Err(parse_err(format!("player.swing_interval must be > 0, got {}", v)));
            }
            defaults.swing_interval = v;
        }
        if let Some(v) = player.get("pattern").and_then(|v| v.as_str()) {
            defaults.pattern = v.to_string();
        }
        if let Some(v) = player.get("looping").and_then(|v| v.as_bool()) {
            defaults.looping = v;
        }
        if let Some(v) = player.get("tick_ms").and_then(|v| v.as_integer()) {
            if v <= 0 {
                return Err(parse_err(format!("player.tick_ms must be > 0, got {}", v)));
            }
            defaults.tick_ms = v as u64;
        }
        if let Some(v) = player.get("listener_capacity").and_then(|v| v.as_integer()) {
            if v <= 0 {
                return Err(parse_err(format!(
                    "player.listener_capacity must be > 0, got {}",
                    v
                )));
            }
            defaults.listener_capacity = v as usize;
        }
    }

    if let Some(fetcher) = table.get("fetcher").and_then(|v| v.as_table()) {
        let settings = &mut config.bootstrap.fetcher;
        if let Some(v) = fetcher.get("program").and_then(|v| v.as_str()) {
            settings.program = v.to_string();
        }
        if let Some(v) = fetcher.get("audio_format").and_then(|v| v.as_str()) {
            settings.audio_format = v.to_string();
        }
        if let Some(v) = fetcher.get("audio_quality").and_then(|v| v.as_str()) {
            settings.audio_quality = v.to_string();
        }
    }

    Ok(())
}

/// TOML numbers may be written as `1` or `1.0`.
fn as_f64(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut SwingConfig, sources: &mut ConfigSources) {
    if let Ok(v) = env::var("SWINGBOX_DOWNLOADS_DIR") {
        config.infra.paths.downloads_dir = expand_path(&v);
        sources.env_overrides.push("SWINGBOX_DOWNLOADS_DIR".to_string());
    }

    if let Ok(v) = env::var("SWINGBOX_HOST") {
        config.infra.bind.host = v;
        sources.env_overrides.push("SWINGBOX_HOST".to_string());
    }
    if let Ok(v) = env::var("SWINGBOX_HTTP_PORT") {
        if let Ok(port) = v.parse() {
            config.infra.bind.http_port = port;
            sources.env_overrides.push("SWINGBOX_HTTP_PORT".to_string());
        }
    }

    if let Ok(v) = env::var("SWINGBOX_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = non_empty(&v);
        sources.env_overrides.push("SWINGBOX_OTLP_ENDPOINT".to_string());
    }
    // Also support standard OTEL env var
    if let Ok(v) = env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.infra.telemetry.otlp_endpoint = non_empty(&v);
        sources.env_overrides.push("OTEL_EXPORTER_OTLP_ENDPOINT".to_string());
    }
    if let Ok(v) = env::var("SWINGBOX_LOG_LEVEL") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("SWINGBOX_LOG_LEVEL".to_string());
    }
    if let Ok(v) = env::var("RUST_LOG") {
        config.infra.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }

    if let Ok(v) = env::var("SWINGBOX_YTDLP") {
        config.bootstrap.fetcher.program = v;
        sources.env_overrides.push("SWINGBOX_YTDLP".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/test/path");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files();
    }

    #[test]
    fn test_overlay_minimal_toml() {
        let toml = r#"
[paths]
downloads_dir = "/srv/clips"
"#;
        let mut config = SwingConfig::default();
        overlay_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.infra.paths.downloads_dir, PathBuf::from("/srv/clips"));
        // Other values should be defaults
        assert_eq!(config.infra.bind.http_port, 8000);
        assert_eq!(config.bootstrap.player.tick_ms, 10);
    }

    #[test]
    fn test_overlay_full_toml() {
        let toml = r#"
[paths]
downloads_dir = "/data/swing"

[bind]
host = "127.0.0.1"
http_port = 9000

[telemetry]
otlp_endpoint = "collector:4317"
log_level = "debug"

[player]
volume = 1
min_volume = 0.25
swing_interval = 4.0
pattern = "triangle"
looping = true
tick_ms = 20
listener_capacity = 8

[fetcher]
program = "/opt/bin/yt-dlp"
audio_quality = "320K"
"#;
        let mut config = SwingConfig::default();
        overlay_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.infra.paths.downloads_dir, PathBuf::from("/data/swing"));
        assert_eq!(config.infra.bind.addr(), "127.0.0.1:9000");
        assert_eq!(config.infra.telemetry.otlp_endpoint.as_deref(), Some("collector:4317"));
        assert_eq!(config.infra.telemetry.log_level, "debug");

        let player = &config.bootstrap.player;
        assert_eq!(player.volume, 1.0);
        assert_eq!(player.min_volume, 0.25);
        assert_eq!(player.swing_interval, 4.0);
        assert_eq!(player.pattern, "triangle");
        assert!(player.looping);
        assert_eq!(player.tick_ms, 20);
        assert_eq!(player.listener_capacity, 8);

        assert_eq!(config.bootstrap.fetcher.program, "/opt/bin/yt-dlp");
        assert_eq!(config.bootstrap.fetcher.audio_format, "mp3");
        assert_eq!(config.bootstrap.fetcher.audio_quality, "320K");
    }

    #[test]
    fn test_overlay_keeps_earlier_values() {
        let mut config = SwingConfig::default();
        overlay_toml(
            &mut config,
            "[bind]\nhttp_port = 9000\n",
            Path::new("system.toml"),
        )
        .unwrap();
        overlay_toml(
            &mut config,
            "[player]\npattern = \"cubic\"\n",
            Path::new("user.toml"),
        )
        .unwrap();

        assert_eq!(config.infra.bind.http_port, 9000);
        assert_eq!(config.bootstrap.player.pattern, "cubic");
    }

    #[test]
    fn test_overlay_rejects_bad_interval() {
        let mut config = SwingConfig::default();
        let err = overlay_toml(
            &mut config,
            "[player]\nswing_interval = 0.0\n",
            Path::new("bad.toml"),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(config.bootstrap.player.swing_interval, 2.0);
    }

    #[test]
    fn test_overlay_rejects_invalid_toml() {
        let mut config = SwingConfig::default();
        let err = overlay_toml(&mut config, "[bind\nhttp_port =", Path::new("broken.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn test_overlay_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swingbox.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[player]\nmin_volume = 0.5").unwrap();

        let mut config = SwingConfig::default();
        overlay_file(&mut config, &path).unwrap();
        assert_eq!(config.bootstrap.player.min_volume, 0.5);
    }

    #[test]
    fn test_overlay_missing_file() {
        let mut config = SwingConfig::default();
        let err = overlay_file(&mut config, Path::new("/nonexistent/swingbox.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_cli_override_replaces_local() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[bind]\nhttp_port = 7000\n").unwrap();

        let files = discover_config_files_with_override(Some(&path));
        assert_eq!(files.last(), Some(&path));
    }
}
