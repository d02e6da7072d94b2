//! Swing player
//!
//! Owns the loaded sound, the active output channel and the background
//! modulation loop that sweeps the pan position. Scalar controls are
//! atomics; the channel slot is a mutex, and every gain write plus the
//! swing-enabled check happens under it so a manual pan or a disable can
//! never be overwritten by a tick that was already in flight.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use portable_atomic::{AtomicF32, AtomicF64};
use serde::{Deserialize, Serialize};
use swingconf::PlayerDefaults;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::decode::{decode_file, DecodedAudio};
use crate::error::DeckError;
use crate::gain::{stereo_gain, StereoGain};
use crate::listener::{ListenerId, ListenerSlot};
use crate::output::{AudioOutput, PlaybackChannel};
use crate::waveform::{pan_at, SwingPattern};

/// Startup values for a [`SwingPlayer`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSettings {
    pub volume: f32,
    pub min_volume: f32,
    pub swing_interval: f64,
    pub pattern: SwingPattern,
    pub looping: bool,
    pub tick: Duration,
    pub listener_capacity: usize,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            volume: 1.0,
            min_volume: 0.2,
            swing_interval: 2.0,
            pattern: SwingPattern::Sine,
            looping: false,
            tick: Duration::from_millis(10),
            listener_capacity: 64,
        }
    }
}

impl TryFrom<&PlayerDefaults> for PlayerSettings {
    type Error = DeckError;

    fn try_from(defaults: &PlayerDefaults) -> Result<Self, Self::Error> {
        let pattern: SwingPattern = defaults.pattern.parse()?;
        validate_interval(defaults.swing_interval)?;
        if defaults.tick_ms == 0 {
            return Err(DeckError::Validation("tick_ms must be > 0".to_string()));
        }

        Ok(Self {
            volume: clamp_unit(defaults.volume),
            min_volume: clamp_unit(defaults.min_volume),
            swing_interval: defaults.swing_interval,
            pattern,
            looping: defaults.looping,
            tick: Duration::from_millis(defaults.tick_ms),
            listener_capacity: defaults.listener_capacity,
        })
    }
}

/// Serializable view of the player for status endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// File name of the loaded sound, if any.
    pub loaded: Option<String>,
    pub playing: bool,
    pub looping: bool,
    pub pan: f32,
    pub volume: f32,
    pub min_volume: f32,
    pub swing_enabled: bool,
    pub swing_interval: f64,
    pub pattern: SwingPattern,
    /// Whether a modulation loop is currently alive.
    pub modulating: bool,
    pub gain: StereoGain,
    pub output: String,
}

struct Params {
    pan: AtomicF32,
    volume: AtomicF32,
    min_volume: AtomicF32,
    swing_interval: AtomicF64,
    pattern: AtomicU8,
    swing_enabled: AtomicBool,
    looping: AtomicBool,
    running: AtomicBool,
    gain_left: AtomicF32,
    gain_right: AtomicF32,
}

struct LoadedSound {
    path: PathBuf,
    audio: Arc<DecodedAudio>,
}

struct Modulator {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl Modulator {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

struct PlayerInner {
    output: Arc<dyn AudioOutput>,
    tick: Duration,
    params: Params,
    loaded: RwLock<Option<LoadedSound>>,
    channel: Mutex<Option<Box<dyn PlaybackChannel>>>,
    modulator: Mutex<Option<Modulator>>,
    listener: ListenerSlot,
}

/// Cheaply cloneable handle to the shared player state.
#[derive(Clone)]
pub struct SwingPlayer {
    inner: Arc<PlayerInner>,
}

impl SwingPlayer {
    pub fn new(output: Arc<dyn AudioOutput>, settings: PlayerSettings) -> Self {
        let volume = clamp_unit(settings.volume);
        let initial = StereoGain::uniform(volume);

        let params = Params {
            pan: AtomicF32::new(0.0),
            volume: AtomicF32::new(volume),
            min_volume: AtomicF32::new(clamp_unit(settings.min_volume)),
            swing_interval: AtomicF64::new(settings.swing_interval),
            pattern: AtomicU8::new(settings.pattern.index()),
            swing_enabled: AtomicBool::new(false),
            looping: AtomicBool::new(settings.looping),
            running: AtomicBool::new(false),
            gain_left: AtomicF32::new(initial.left),
            gain_right: AtomicF32::new(initial.right),
        };

        Self {
            inner: Arc::new(PlayerInner {
                output,
                tick: settings.tick,
                params,
                loaded: RwLock::new(None),
                channel: Mutex::new(None),
                modulator: Mutex::new(None),
                listener: ListenerSlot::new(settings.listener_capacity),
            }),
        }
    }

    /// Decode `path` and make it the sound for the next `play()`.
    ///
    /// Blocking; call from `spawn_blocking` inside async handlers. On failure
    /// the previously loaded sound is kept.
    pub fn load(&self, path: &Path) -> Result<(), DeckError> {
        let audio = decode_file(path)?;
        tracing::info!(
            path = %path.display(),
            frames = audio.frames(),
            sample_rate = audio.sample_rate,
            duration_secs = audio.duration_seconds(),
            "sound loaded"
        );

        let mut loaded = self
            .inner
            .loaded
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *loaded = Some(LoadedSound {
            path: path.to_path_buf(),
            audio: Arc::new(audio),
        });
        Ok(())
    }

    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.inner
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| s.path.clone())
    }

    /// Start playback. Returns `false` if a channel is already playing.
    ///
    /// Blocking while the output opens its stream (a device output waits for
    /// the sound card); call from `spawn_blocking` inside async handlers. The
    /// channel lock is not held meanwhile, so modulation ticks keep running.
    pub fn play(&self) -> Result<bool, DeckError> {
        let audio = self
            .inner
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|s| Arc::clone(&s.audio))
            .ok_or(DeckError::NothingLoaded)?;

        if self.is_playing() {
            self.ensure_modulator();
            return Ok(false);
        }

        let p = &self.inner.params;
        let looping = p.looping.load(Ordering::Relaxed);
        let fresh = self.inner.output.play(audio, looping)?;

        let started = {
            let mut channel = lock(&self.inner.channel);
            if channel.as_ref().is_some_and(|current| current.is_busy()) {
                // Lost a race with a concurrent play()
                fresh.stop();
                false
            } else {
                if let Some(finished) = channel.take() {
                    finished.stop();
                }

                let gain = StereoGain::uniform(p.volume.load(Ordering::Relaxed));
                fresh.set_volume(gain);
                self.inner.store_gain(gain);

                *channel = Some(fresh);
                p.running.store(true, Ordering::SeqCst);
                tracing::info!(looping, output = self.inner.output.name(), "playback started");
                true
            }
        };

        self.ensure_modulator();
        Ok(started)
    }

    /// Halt playback and the modulation loop. Returns `false` if nothing was playing.
    pub fn stop(&self) -> bool {
        self.inner.params.running.store(false, Ordering::SeqCst);
        self.inner.cancel_modulator();

        let channel = lock(&self.inner.channel).take();
        match channel {
            Some(channel) => {
                channel.stop();
                tracing::info!("playback stopped");
                true
            }
            None => false,
        }
    }

    /// Takes effect on the next `play()`.
    pub fn set_loop(&self, enabled: bool) {
        self.inner.params.looping.store(enabled, Ordering::Relaxed);
    }

    /// Set the master volume and reapply gains at the current pan.
    pub fn set_volume(&self, volume: f32) -> f32 {
        let volume = clamp_unit(volume);
        self.inner.params.volume.store(volume, Ordering::Relaxed);

        let gain = {
            let channel = lock(&self.inner.channel);
            let pan = self.inner.params.pan.load(Ordering::Relaxed);
            self.inner.apply_gain(channel.as_deref(), pan)
        };
        self.inner.notify(gain);
        volume
    }

    /// Takes effect on the next gain computation.
    pub fn set_min_volume(&self, min_volume: f32) -> f32 {
        let min_volume = clamp_unit(min_volume);
        self.inner
            .params
            .min_volume
            .store(min_volume, Ordering::Relaxed);
        min_volume
    }

    /// Manual pan. Always turns auto-swing off.
    pub fn set_pan(&self, pan: f32) -> StereoGain {
        let pan = if pan.is_nan() { 0.0 } else { pan.clamp(-1.0, 1.0) };

        let gain = {
            let channel = lock(&self.inner.channel);
            let was_swinging = self
                .inner
                .params
                .swing_enabled
                .swap(false, Ordering::SeqCst);
            if was_swinging {
                self.inner.cancel_modulator();
            }
            self.inner.params.pan.store(pan, Ordering::Relaxed);
            self.inner.apply_gain(channel.as_deref(), pan)
        };
        self.inner.notify(gain);
        gain
    }

    /// Turn on auto-swing with one full oscillation every `interval` seconds.
    pub fn enable_auto_swing(&self, interval: f64) -> Result<(), DeckError> {
        validate_interval(interval)?;
        self.inner
            .params
            .swing_interval
            .store(interval, Ordering::Relaxed);
        self.start_swing();
        Ok(())
    }

    /// Turn off auto-swing and recentre the channel.
    pub fn disable_auto_swing(&self) {
        let was_swinging = self
            .inner
            .params
            .swing_enabled
            .swap(false, Ordering::SeqCst);
        if !was_swinging {
            return;
        }
        self.inner.cancel_modulator();

        let gain = {
            let channel = lock(&self.inner.channel);
            self.inner.params.pan.store(0.0, Ordering::Relaxed);
            self.inner.apply_gain(channel.as_deref(), 0.0)
        };
        self.inner.notify(gain);
        tracing::debug!("auto-swing disabled");
    }

    /// Flip auto-swing. Returns the new state.
    pub fn toggle_swing(&self) -> bool {
        if self.is_swing_enabled() {
            self.disable_auto_swing();
            false
        } else {
            self.start_swing();
            true
        }
    }

    /// Select the swing waveform by name. Unknown names change nothing.
    pub fn set_pattern(&self, name: &str) -> Result<SwingPattern, DeckError> {
        let pattern: SwingPattern = name.parse()?;
        self.inner
            .params
            .pattern
            .store(pattern.index(), Ordering::Relaxed);
        Ok(pattern)
    }

    /// Subscribe to gain updates, replacing any current subscriber.
    pub fn attach_listener(&self) -> (ListenerId, tokio::sync::mpsc::Receiver<StereoGain>) {
        self.inner.listener.attach()
    }

    pub fn detach_listener(&self, id: ListenerId) -> bool {
        self.inner.listener.detach(id)
    }

    pub fn pan(&self) -> f32 {
        self.inner.params.pan.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> f32 {
        self.inner.params.volume.load(Ordering::Relaxed)
    }

    pub fn min_volume(&self) -> f32 {
        self.inner.params.min_volume.load(Ordering::Relaxed)
    }

    pub fn pattern(&self) -> SwingPattern {
        SwingPattern::from_index(self.inner.params.pattern.load(Ordering::Relaxed))
    }

    pub fn swing_interval(&self) -> f64 {
        self.inner.params.swing_interval.load(Ordering::Relaxed)
    }

    pub fn is_swing_enabled(&self) -> bool {
        self.inner.params.swing_enabled.load(Ordering::SeqCst)
    }

    pub fn is_looping(&self) -> bool {
        self.inner.params.looping.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.inner.params.running.load(Ordering::SeqCst)
    }

    /// Last gain pair computed.
    pub fn gain(&self) -> StereoGain {
        self.inner.load_gain()
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.inner.channel)
            .as_ref()
            .is_some_and(|channel| channel.is_busy())
    }

    /// True while a modulation loop task is alive.
    pub fn is_modulating(&self) -> bool {
        lock(&self.inner.modulator)
            .as_ref()
            .is_some_and(Modulator::is_alive)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        let loaded = self.loaded_path().map(|path| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });

        PlayerSnapshot {
            loaded,
            playing: self.is_playing(),
            looping: self.is_looping(),
            pan: self.pan(),
            volume: self.volume(),
            min_volume: self.min_volume(),
            swing_enabled: self.is_swing_enabled(),
            swing_interval: self.swing_interval(),
            pattern: self.pattern(),
            modulating: self.is_modulating(),
            gain: self.gain(),
            output: self.inner.output.name().to_string(),
        }
    }

    fn start_swing(&self) {
        self.inner
            .params
            .swing_enabled
            .store(true, Ordering::SeqCst);
        tracing::debug!(
            interval = self.swing_interval(),
            pattern = %self.pattern(),
            "auto-swing enabled"
        );
        self.ensure_modulator();
    }

    /// Spawn a modulation loop unless one is alive or there is nothing to modulate.
    fn ensure_modulator(&self) {
        let p = &self.inner.params;
        if !p.running.load(Ordering::SeqCst) || !p.swing_enabled.load(Ordering::SeqCst) {
            return;
        }

        let mut slot = lock(&self.inner.modulator);
        if slot.as_ref().is_some_and(Modulator::is_alive) {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no tokio runtime; modulation loop not started");
            return;
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_modulator(Arc::clone(&self.inner), cancel.clone()));
        *slot = Some(Modulator { cancel, handle });
    }
}

impl PlayerInner {
    fn store_gain(&self, gain: StereoGain) {
        self.params.gain_left.store(gain.left, Ordering::Relaxed);
        self.params.gain_right.store(gain.right, Ordering::Relaxed);
    }

    fn load_gain(&self) -> StereoGain {
        StereoGain {
            left: self.params.gain_left.load(Ordering::Relaxed),
            right: self.params.gain_right.load(Ordering::Relaxed),
        }
    }

    /// Compute gains for `pan` and write them to `channel`.
    /// Callers hold the channel lock.
    fn apply_gain(&self, channel: Option<&dyn PlaybackChannel>, pan: f32) -> StereoGain {
        let gain = stereo_gain(
            pan,
            self.params.volume.load(Ordering::Relaxed),
            self.params.min_volume.load(Ordering::Relaxed),
        );
        if let Some(channel) = channel {
            channel.set_volume(gain);
        }
        self.store_gain(gain);
        gain
    }

    fn notify(&self, gain: StereoGain) {
        if let Err(e) = self.listener.push(gain) {
            tracing::debug!(error = %e, "gain update dropped");
        }
    }

    fn cancel_modulator(&self) {
        if let Some(modulator) = lock(&self.modulator).as_ref() {
            modulator.cancel.cancel();
        }
    }

    /// One tick. `None` means the loop should exit.
    fn modulate(&self, cancel: &CancellationToken, t: f64) -> Option<StereoGain> {
        let channel = lock(&self.channel);
        let p = &self.params;
        if cancel.is_cancelled()
            || !p.running.load(Ordering::SeqCst)
            || !p.swing_enabled.load(Ordering::SeqCst)
        {
            return None;
        }

        let pattern = SwingPattern::from_index(p.pattern.load(Ordering::Relaxed));
        let frequency = 1.0 / p.swing_interval.load(Ordering::Relaxed);
        let pan = pan_at(pattern, t, frequency) as f32;
        p.pan.store(pan, Ordering::Relaxed);

        Some(self.apply_gain(channel.as_deref(), pan))
    }
}

async fn run_modulator(inner: Arc<PlayerInner>, cancel: CancellationToken) {
    let tick = inner.tick;
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    tracing::debug!(tick_ms = tick.as_millis() as u64, "modulation loop started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let t = ticks as f64 * tick.as_secs_f64();
                ticks += 1;
                match inner.modulate(&cancel, t) {
                    Some(gain) => inner.notify(gain),
                    None => break,
                }
            }
        }
    }

    cancel.cancel();
    tracing::debug!(ticks, "modulation loop exited");
}

fn validate_interval(interval: f64) -> Result<(), DeckError> {
    if interval.is_finite() && interval > 0.0 {
        Ok(())
    } else {
        Err(DeckError::Validation(format!(
            "swing interval must be a positive number of seconds, got {interval}"
        )))
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
