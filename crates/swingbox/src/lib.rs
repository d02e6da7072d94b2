//! SwingBox - web-controlled auto-panning audio player
//!
//! Library exposing the server pieces for the binary and for tests.

pub mod error;
pub mod fetcher;
pub mod library;
pub mod telemetry;
pub mod web;

pub use error::ApiError;
pub use fetcher::{MediaFetcher, YtDlpFetcher};
pub use library::{Library, LibraryError};
pub use web::{router, run_control_session, AppState, ClientMessage, ServerMessage};
