//! Device output through cpal
//!
//! Each playing sound gets its own stream on a dedicated thread (cpal
//! streams are not `Send` on every platform). The thread opens the stream,
//! reports back, then parks until the channel is stopped or dropped.
//!
//! ```text
//! SwingPlayer ──set_volume──► ChannelControl (atomics)
//!                                   │
//!                          device callback reads gains,
//!                          resamples, writes frames
//! ```

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info};

use crate::decode::DecodedAudio;
use crate::gain::StereoGain;
use crate::output::{AudioOutput, ChannelControl, OutputError, PlaybackChannel};

/// Plays through the host's default output device.
pub struct CpalOutput {
    device_name: String,
}

impl CpalOutput {
    /// Check that a default output device exists.
    pub fn new() -> Result<Self, OutputError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown".to_string());
        info!(host = ?host.id(), device = %device_name, "audio output ready");
        Ok(Self { device_name })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl AudioOutput for CpalOutput {
    fn play(
        &self,
        audio: Arc<DecodedAudio>,
        looping: bool,
    ) -> Result<Box<dyn PlaybackChannel>, OutputError> {
        let control = Arc::new(ChannelControl::new(StereoGain::default()));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), OutputError>>(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread_control = Arc::clone(&control);
        let handle = thread::Builder::new()
            .name("swing-output".to_string())
            .spawn(move || {
                let stream = match open_stream(audio, looping, thread_control) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Parked until stop() or the channel handle is dropped
                let _ = stop_rx.recv();
                drop(stream);
                debug!("output stream closed");
            })
            .map_err(|e| OutputError::ThreadSpawn(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                return Err(OutputError::Stream(
                    "output thread exited during startup".to_string(),
                ))
            }
        }

        Ok(Box::new(CpalChannel {
            control,
            stop_tx: Mutex::new(Some(stop_tx)),
        }))
    }

    fn name(&self) -> &'static str {
        "cpal"
    }
}

struct CpalChannel {
    control: Arc<ChannelControl>,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
}

impl PlaybackChannel for CpalChannel {
    fn set_volume(&self, gain: StereoGain) {
        self.control.store_gain(gain);
    }

    fn gain(&self) -> StereoGain {
        self.control.load_gain()
    }

    fn is_busy(&self) -> bool {
        !self.control.is_stopped() && !self.control.is_finished()
    }

    fn stop(&self) {
        self.control.request_stop();
        let sender = self
            .stop_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sender) = sender {
            let _ = sender.send(());
        }
    }
}

impl Drop for CpalChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_stream(
    audio: Arc<DecodedAudio>,
    looping: bool,
    control: Arc<ChannelControl>,
) -> Result<cpal::Stream, OutputError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
    let config = device
        .default_output_config()
        .map_err(|e| OutputError::Stream(e.to_string()))?;

    let device_rate = config.sample_rate().0;
    let channels = config.channels() as usize;
    let voice = Voice::new(audio, device_rate, looping);

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config.into(), voice, control, channels)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config.into(), voice, control, channels)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config.into(), voice, control, channels)
        }
        other => {
            return Err(OutputError::Stream(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }?;

    stream
        .play()
        .map_err(|e| OutputError::Stream(e.to_string()))?;
    debug!(device_rate, channels, looping, "output stream started");
    Ok(stream)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut voice: Voice,
    control: Arc<ChannelControl>,
    channels: usize,
) -> Result<cpal::Stream, OutputError>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                render(data, channels, &mut voice, &control);
            },
            |err| error!("audio stream error: {}", err),
            None,
        )
        .map_err(|e| OutputError::Stream(e.to_string()))
}

fn render<T>(data: &mut [T], channels: usize, voice: &mut Voice, control: &ChannelControl)
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    if control.is_stopped() || voice.done {
        for sample in data.iter_mut() {
            *sample = T::from_sample(0.0);
        }
        return;
    }

    let gain = control.load_gain();
    for frame in data.chunks_mut(channels.max(1)) {
        let (l, r) = voice.next_frame();
        let (l, r) = (l * gain.left, r * gain.right);

        match frame.len() {
            1 => frame[0] = T::from_sample(0.5 * (l + r)),
            _ => {
                for (i, out) in frame.iter_mut().enumerate() {
                    *out = T::from_sample(match i {
                        0 => l,
                        1 => r,
                        _ => 0.0,
                    });
                }
            }
        }
    }

    if voice.done {
        control.mark_finished();
    }
}

/// Read head over a decoded sound, resampling linearly to the device rate.
struct Voice {
    audio: Arc<DecodedAudio>,
    position: f64,
    step: f64,
    looping: bool,
    done: bool,
}

impl Voice {
    fn new(audio: Arc<DecodedAudio>, device_rate: u32, looping: bool) -> Self {
        let step = if device_rate == 0 {
            1.0
        } else {
            audio.sample_rate as f64 / device_rate as f64
        };
        let done = audio.frames() == 0;
        Self {
            audio,
            position: 0.0,
            step,
            looping,
            done,
        }
    }

    fn next_frame(&mut self) -> (f32, f32) {
        if self.done {
            return (0.0, 0.0);
        }

        let frames = self.audio.frames();
        if self.position >= frames as f64 {
            if self.looping {
                self.position %= frames as f64;
            } else {
                self.done = true;
                return (0.0, 0.0);
            }
        }

        let index = self.position as usize;
        let frac = (self.position - index as f64) as f32;
        let next = if self.looping {
            (index + 1) % frames
        } else {
            index + 1
        };

        let (l0, r0) = self.audio.frame(index);
        let (l1, r1) = self.audio.frame(next);
        self.position += self.step;

        (l0 + (l1 - l0) * frac, r0 + (r1 - r0) * frac)
    }
}
