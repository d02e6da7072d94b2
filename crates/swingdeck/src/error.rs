//! Errors reported by the swing player.

use std::path::PathBuf;

use crate::output::OutputError;

#[derive(Debug, thiserror::Error)]
pub enum DeckError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to decode {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("{0}")]
    Validation(String),

    #[error("No sound loaded")]
    NothingLoaded,

    #[error(transparent)]
    Output(#[from] OutputError),

    /// Gain update could not be handed to the listener. Never fatal.
    #[error("Listener delivery failed: {0}")]
    Delivery(String),
}

impl From<crate::waveform::UnknownPattern> for DeckError {
    fn from(err: crate::waveform::UnknownPattern) -> Self {
        DeckError::Validation(err.to_string())
    }
}
