//! Audio output seam
//!
//! The player only ever talks to a [`PlaybackChannel`]: a handle onto one
//! playing sound with a live stereo gain. Gains are plain atomics so a
//! device callback can read them without locking.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use portable_atomic::AtomicF32;

use crate::decode::DecodedAudio;
use crate::gain::StereoGain;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Audio output not available in this build")]
    NotAvailable,

    #[error("No default output device")]
    NoDevice,

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("Failed to spawn output thread: {0}")]
    ThreadSpawn(String),
}

/// One playing sound.
pub trait PlaybackChannel: Send + Sync {
    /// Set the per-side gain. Takes effect within one device buffer.
    fn set_volume(&self, gain: StereoGain);

    /// Gain currently applied.
    fn gain(&self) -> StereoGain;

    /// True while audio is still being produced.
    fn is_busy(&self) -> bool;

    /// Stop producing audio. Idempotent.
    fn stop(&self);
}

/// Something that can start playing decoded audio.
pub trait AudioOutput: Send + Sync {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        looping: bool,
    ) -> Result<Box<dyn PlaybackChannel>, OutputError>;

    /// Short name for status reporting.
    fn name(&self) -> &'static str;
}

/// Shared state between a channel handle and whatever renders it.
#[derive(Debug)]
pub struct ChannelControl {
    left: AtomicF32,
    right: AtomicF32,
    stopped: AtomicBool,
    finished: AtomicBool,
}

impl ChannelControl {
    pub fn new(gain: StereoGain) -> Self {
        Self {
            left: AtomicF32::new(gain.left),
            right: AtomicF32::new(gain.right),
            stopped: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    pub fn store_gain(&self, gain: StereoGain) {
        self.left.store(gain.left, Ordering::Relaxed);
        self.right.store(gain.right, Ordering::Relaxed);
    }

    pub fn load_gain(&self) -> StereoGain {
        StereoGain {
            left: self.left.load(Ordering::Relaxed),
            right: self.right.load(Ordering::Relaxed),
        }
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Renderer ran off the end of a non-looping sound.
    pub fn mark_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Output that renders nothing but keeps full channel bookkeeping.
///
/// Used with `--no-audio` and in tests. A looping channel stays busy until
/// stopped; a single-shot channel goes idle once its duration has elapsed.
/// Only the most recent [`NullOutput::HISTORY`] channel controls are kept.
#[derive(Default)]
pub struct NullOutput {
    opened: Mutex<Vec<Arc<ChannelControl>>>,
}

impl NullOutput {
    pub const HISTORY: usize = 16;

    pub fn new() -> Self {
        Self::default()
    }

    /// Controls of the most recently opened channels, oldest first.
    pub fn opened(&self) -> Vec<Arc<ChannelControl>> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl AudioOutput for NullOutput {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        looping: bool,
    ) -> Result<Box<dyn PlaybackChannel>, OutputError> {
        let control = Arc::new(ChannelControl::new(StereoGain::default()));
        {
            let mut opened = self.opened.lock().unwrap_or_else(PoisonError::into_inner);
            if opened.len() >= Self::HISTORY {
                let excess = opened.len() + 1 - Self::HISTORY;
                opened.drain(..excess);
            }
            opened.push(Arc::clone(&control));
        }

        let ends_at = if looping {
            None
        } else {
            Some(Instant::now() + Duration::from_secs_f64(audio.duration_seconds()))
        };

        Ok(Box::new(NullChannel { control, ends_at }))
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

struct NullChannel {
    control: Arc<ChannelControl>,
    ends_at: Option<Instant>,
}

impl PlaybackChannel for NullChannel {
    fn set_volume(&self, gain: StereoGain) {
        self.control.store_gain(gain);
    }

    fn gain(&self) -> StereoGain {
        self.control.load_gain()
    }

    fn is_busy(&self) -> bool {
        if self.control.is_stopped() {
            return false;
        }
        match self.ends_at {
            Some(end) if Instant::now() >= end => {
                self.control.mark_finished();
                false
            }
            _ => true,
        }
    }

    fn stop(&self) {
        self.control.request_stop();
    }
}
