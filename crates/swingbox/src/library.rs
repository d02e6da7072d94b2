//! Flat directory of downloaded sounds.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::fetcher::MediaFetcher;

/// File extensions the player can decode.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "flac", "ogg"];

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{tool} failed: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("Library I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Library {
    root: PathBuf,
}

impl Library {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<(), LibraryError> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Playable file names, sorted. A missing directory is an empty library.
    pub fn list(&self) -> Result<Vec<String>, LibraryError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                LibraryError::Io(
                    e.into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("directory walk failed")),
                )
            })?;
            if !entry.file_type().is_file() || !is_audio(entry.path()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }

        files.sort();
        Ok(files)
    }

    /// Path of an existing file in the library.
    pub fn resolve(&self, file: &str) -> Result<PathBuf, LibraryError> {
        let file = validate_name(file)?;
        let path = self.root.join(file);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LibraryError::NotFound(file.to_string()))
        }
    }

    /// Fetch `url` into the library as `<name>.<ext>` and return the new listing.
    pub async fn download(
        &self,
        fetcher: &dyn MediaFetcher,
        url: &str,
        name: &str,
    ) -> Result<Vec<String>, LibraryError> {
        let name = validate_name(name)?;
        if url.trim().is_empty() || url.starts_with('-') {
            return Err(LibraryError::Validation(format!("invalid url '{}'", url)));
        }

        self.ensure_dir()?;
        tracing::info!(%url, %name, fetcher = fetcher.name(), "downloading");
        fetcher.fetch(url, name, &self.root).await?;
        self.list()
    }
}

/// Reject anything that could escape the library directory.
pub fn validate_name(name: &str) -> Result<&str, LibraryError> {
    let trimmed = name.trim();
    let bad = trimmed.is_empty()
        || trimmed.starts_with('.')
        || trimmed.contains(['/', '\\', '\0'])
        || trimmed.contains("..");

    if bad {
        Err(LibraryError::Validation(format!("invalid file name '{}'", name)))
    } else {
        Ok(trimmed)
    }
}

fn is_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            AUDIO_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}
