//! End-to-end player behaviour against the null output.
//!
//! Sounds are short WAV files written into a temp dir, so these run
//! without an audio device.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use swingdeck::{
    AudioOutput, DeckError, DecodedAudio, NullOutput, OutputError, PlaybackChannel,
    PlayerSettings, StereoGain, SwingPattern, SwingPlayer,
};
use tempfile::TempDir;

fn write_wav(path: &Path, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (8000.0 * seconds) as usize;
    for i in 0..frames {
        let s = ((i as f32 * 0.07).sin() * 12000.0) as i16;
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

struct Fixture {
    _dir: TempDir,
    wav: PathBuf,
    output: Arc<NullOutput>,
    player: SwingPlayer,
}

fn fixture(looping: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("loop.wav");
    write_wav(&wav, 0.25);

    let output = Arc::new(NullOutput::new());
    let settings = PlayerSettings {
        looping,
        tick: Duration::from_millis(5),
        ..Default::default()
    };
    let player = SwingPlayer::new(output.clone(), settings);

    Fixture {
        _dir: dir,
        wav,
        output,
        player,
    }
}

#[tokio::test]
async fn test_load_and_play() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    assert!(f.player.play().unwrap());
    assert!(f.player.is_playing());
    assert!(f.player.is_running());

    // Second play while busy is a no-op
    assert!(!f.player.play().unwrap());
    assert_eq!(f.output.opened().len(), 1);

    let snap = f.player.snapshot();
    assert_eq!(snap.loaded.as_deref(), Some("loop.wav"));
    assert!(snap.playing);
    assert!(snap.looping);
}

#[tokio::test]
async fn test_play_applies_volume_uniformly() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.set_volume(0.6);
    f.player.play().unwrap();

    let control = &f.output.opened()[0];
    assert_eq!(control.load_gain(), StereoGain::uniform(0.6));
}

#[tokio::test]
async fn test_load_missing_keeps_previous() {
    let f = fixture(false);
    f.player.load(&f.wav).unwrap();

    let missing = f.wav.with_file_name("nope.mp3");
    let err = f.player.load(&missing).unwrap_err();
    assert!(matches!(err, DeckError::NotFound(_)));
    assert_eq!(f.player.loaded_path(), Some(f.wav.clone()));
}

#[tokio::test]
async fn test_stop_halts_channel() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();

    assert!(f.player.stop());
    assert!(!f.player.is_playing());
    assert!(!f.player.is_running());
    assert!(f.output.opened()[0].is_stopped());

    // Nothing left to stop
    assert!(!f.player.stop());
}

#[tokio::test]
async fn test_single_shot_replays_after_finish() {
    let f = fixture(false);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!f.player.is_playing());

    assert!(f.player.play().unwrap());
    assert_eq!(f.output.opened().len(), 2);
}

#[tokio::test]
async fn test_swing_moves_pan_and_pushes_updates() {
    let f = fixture(true);
    let (_id, mut rx) = f.player.attach_listener();

    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();
    f.player.enable_auto_swing(0.2).unwrap();
    assert!(f.player.is_modulating());

    tokio::time::sleep(Duration::from_millis(80)).await;

    let mut updates = Vec::new();
    while let Ok(gain) = rx.try_recv() {
        updates.push(gain);
    }
    assert!(updates.len() >= 3, "got {} updates", updates.len());
    assert!(updates.iter().any(|g| (g.left - g.right).abs() > 1e-3));
    assert!(f.player.pan().abs() > 0.0);

    // The channel follows the loop
    let applied = f.output.opened()[0].load_gain();
    assert_eq!(applied, f.player.gain());

    f.player.stop();
}

#[tokio::test]
async fn test_disable_stops_loop_and_recentres() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();
    f.player.enable_auto_swing(1.0).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(f.player.pan().abs() > 0.1);

    f.player.disable_auto_swing();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(!f.player.is_modulating());
    assert!(!f.player.is_swing_enabled());
    assert_eq!(f.player.pan(), 0.0);

    let gain = f.output.opened()[0].load_gain();
    assert_eq!(gain.left, gain.right);
}

#[tokio::test]
async fn test_manual_pan_wins_over_loop() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();
    f.player.enable_auto_swing(0.5).unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    f.player.set_min_volume(0.2);
    f.player.set_volume(1.0);
    let gain = f.player.set_pan(1.0);
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(!f.player.is_swing_enabled());
    assert!(!f.player.is_modulating());
    assert_eq!(f.player.pan(), 1.0);
    assert_eq!(gain.left, 0.2);
    assert_eq!(f.output.opened()[0].load_gain(), gain);
}

#[tokio::test]
async fn test_swing_enabled_before_play_starts_with_play() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.enable_auto_swing(0.5).unwrap();
    assert!(!f.player.is_modulating());

    f.player.play().unwrap();
    assert!(f.player.is_modulating());
    f.player.stop();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!f.player.is_modulating());
}

#[tokio::test]
async fn test_toggle_restarts_fresh_loop() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();

    assert!(f.player.toggle_swing());
    assert!(f.player.is_modulating());
    assert!(!f.player.toggle_swing());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!f.player.is_modulating());

    assert!(f.player.toggle_swing());
    assert!(f.player.is_modulating());
    f.player.stop();
}

#[tokio::test]
async fn test_pattern_change_while_swinging() {
    let f = fixture(true);
    f.player.load(&f.wav).unwrap();
    f.player.play().unwrap();
    f.player.enable_auto_swing(0.3).unwrap();

    assert!(f.player.set_pattern("bogus").is_err());
    assert_eq!(f.player.pattern(), SwingPattern::Sine);
    assert_eq!(f.player.set_pattern("TRIANGLE").unwrap(), SwingPattern::Triangle);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(f.player.is_modulating());
    f.player.stop();
}

#[tokio::test]
async fn test_replaced_listener_stops_receiving() {
    let f = fixture(true);
    let (first, mut first_rx) = f.player.attach_listener();
    let (_second, mut second_rx) = f.player.attach_listener();

    assert!(!f.player.detach_listener(first));
    f.player.set_pan(-0.5);

    assert!(first_rx.try_recv().is_err());
    let gain = second_rx.try_recv().unwrap();
    assert!(gain.left > gain.right);
}

/// Null output that takes a while to open, like a sound card coming up.
struct SlowOutput {
    inner: NullOutput,
    delay: Duration,
}

impl AudioOutput for SlowOutput {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        looping: bool,
    ) -> Result<Box<dyn PlaybackChannel>, OutputError> {
        std::thread::sleep(self.delay);
        self.inner.play(audio, looping)
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

#[test]
fn test_slow_output_open_leaves_controls_responsive() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("tone.wav");
    write_wav(&wav, 0.25);

    let output = Arc::new(SlowOutput {
        inner: NullOutput::new(),
        delay: Duration::from_millis(300),
    });
    let player = SwingPlayer::new(output, PlayerSettings::default());
    player.load(&wav).unwrap();

    let opener = player.clone();
    let handle = std::thread::spawn(move || opener.play());
    std::thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    player.set_pan(0.5);
    assert!(!player.is_playing());
    assert!(started.elapsed() < Duration::from_millis(150));

    assert!(handle.join().unwrap().unwrap());
    assert!(player.is_playing());
    player.stop();
}
