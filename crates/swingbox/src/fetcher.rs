//! Media download through an external tool.

use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use swingconf::FetcherConfig;
use tokio::process::Command;

use crate::library::LibraryError;

/// Fetches remote media into a directory as `<name>.<ext>`.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str, name: &str, dir: &Path) -> Result<(), LibraryError>;

    fn name(&self) -> &'static str;
}

/// Runs `yt-dlp`: best audio stream, extracted and transcoded by its
/// ffmpeg post-processor.
pub struct YtDlpFetcher {
    config: FetcherConfig,
}

impl YtDlpFetcher {
    pub fn new(config: FetcherConfig) -> Self {
        Self { config }
    }

    pub fn args(&self, url: &str, name: &str, dir: &Path) -> Vec<OsString> {
        let template = dir.join(format!("{}.%(ext)s", name));
        vec![
            "-f".into(),
            "bestaudio/best".into(),
            "--extract-audio".into(),
            "--audio-format".into(),
            self.config.audio_format.clone().into(),
            "--audio-quality".into(),
            self.config.audio_quality.clone().into(),
            "-o".into(),
            template.into_os_string(),
            "--quiet".into(),
            "--no-progress".into(),
            "--".into(),
            url.into(),
        ]
    }
}

#[async_trait]
impl MediaFetcher for YtDlpFetcher {
    #[tracing::instrument(name = "fetcher.yt_dlp", skip(self, dir), fields(program = %self.config.program))]
    async fn fetch(&self, url: &str, name: &str, dir: &Path) -> Result<(), LibraryError> {
        let output = Command::new(&self.config.program)
            .args(self.args(url, name, dir))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LibraryError::ExternalTool {
                tool: self.config.program.clone(),
                message: format!("could not run: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(status = %output.status, %stderr, "download failed");
            return Err(LibraryError::ExternalTool {
                tool: self.config.program.clone(),
                message: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr
                },
            });
        }

        tracing::debug!("download finished");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_shape() {
        let fetcher = YtDlpFetcher::new(FetcherConfig::default());
        let args = fetcher.args("https://example.com/v", "tune", Path::new("downloads"));
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(args.last().map(String::as_str), Some("https://example.com/v"));
        assert!(args.windows(2).any(|w| w == ["--audio-format", "mp3"]));
        assert!(args.windows(2).any(|w| w == ["--audio-quality", "192K"]));
        let template = Path::new("downloads").join("tune.%(ext)s");
        assert!(args.windows(2).any(|w| w[0] == "-o" && Path::new(&w[1]) == template));
    }

    #[tokio::test]
    async fn test_missing_program_is_external_tool_error() {
        let fetcher = YtDlpFetcher::new(FetcherConfig {
            program: "/nonexistent/yt-dlp".to_string(),
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher
            .fetch("https://example.com/v", "tune", dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, LibraryError::ExternalTool { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        // `false` ignores its arguments and exits 1
        let fetcher = YtDlpFetcher::new(FetcherConfig {
            program: "false".to_string(),
            ..Default::default()
        });
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher
            .fetch("https://example.com/v", "tune", dir.path())
            .await
            .unwrap_err();
        match err {
            LibraryError::ExternalTool { tool, .. } => assert_eq!(tool, "false"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
