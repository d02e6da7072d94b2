//! Swingdeck: the swing player core
//!
//! Loads one sound, plays it on an output channel and continuously sweeps
//! its stereo balance left and right following a selectable waveform.
//!
//! - **gain**: the pan/volume/floor law shared by every gain write
//! - **waveform**: closed set of swing shapes, pure functions of time
//! - **player**: transport control, manual pan, and the modulation loop
//! - **listener**: single subscriber for pushed gain updates
//! - **output**: the channel seam; `NullOutput` always, `CpalOutput` with
//!   the `cpal-output` feature

pub mod decode;
pub mod error;
pub mod gain;
pub mod listener;
pub mod output;
pub mod player;
pub mod waveform;

#[cfg(feature = "cpal-output")]
pub mod cpal_output;

#[cfg(feature = "cpal-output")]
pub use cpal_output::CpalOutput;
pub use decode::{decode_audio, decode_file, decode_wav, DecodedAudio};
pub use error::DeckError;
pub use gain::{stereo_gain, StereoGain};
pub use listener::{ListenerId, ListenerSlot};
pub use output::{AudioOutput, ChannelControl, NullOutput, OutputError, PlaybackChannel};
pub use player::{PlayerSettings, PlayerSnapshot, SwingPlayer};
pub use waveform::{pan_at, SwingPattern, UnknownPattern};
