//! Audio file decoding
//!
//! Supports WAV (via hound) and MP3/FLAC/OGG (via symphonia when the
//! `symphonia-decode` feature is enabled). Everything is decoded up front
//! into interleaved stereo f32 so the output callback never touches a codec.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::error::DeckError;

/// Decoded audio ready for playback
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved stereo samples (L, R, L, R, ...)
    pub samples: Vec<f32>,
    /// Source sample rate
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Build from interleaved samples with any channel count.
    ///
    /// Mono is duplicated to both sides; beyond two channels only the
    /// first two are kept.
    pub fn from_interleaved(samples: &[f32], channels: usize, sample_rate: u32) -> Self {
        let samples = match channels {
            0 => Vec::new(),
            1 => samples.iter().flat_map(|&s| [s, s]).collect(),
            2 => samples.to_vec(),
            n => samples
                .chunks_exact(n)
                .flat_map(|frame| [frame[0], frame[1]])
                .collect(),
        };

        Self {
            samples,
            sample_rate,
        }
    }

    /// Total number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Stereo frame at `index`, silence past the end.
    pub fn frame(&self, index: usize) -> (f32, f32) {
        match self.samples.get(index * 2..index * 2 + 2) {
            Some(&[l, r]) => (l, r),
            _ => (0.0, 0.0),
        }
    }
}

/// Read and decode the file at `path`.
///
/// A missing file is `NotFound`; anything the decoders reject is `Decode`.
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DeckError> {
    if !path.is_file() {
        return Err(DeckError::NotFound(path.to_path_buf()));
    }

    let data = std::fs::read(path).map_err(|e| DeckError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let extension = path.extension().and_then(|e| e.to_str());
    let decoded = decode_audio(&data, extension).map_err(|e| DeckError::Decode {
        path: path.to_path_buf(),
        message: format!("{:#}", e),
    })?;

    if decoded.frames() == 0 {
        return Err(DeckError::Decode {
            path: path.to_path_buf(),
            message: "no audio frames".to_string(),
        });
    }

    Ok(decoded)
}

/// Decode WAV audio using hound (always available)
pub fn decode_wav(data: &[u8]) -> Result<DecodedAudio> {
    let cursor = Cursor::new(data);
    let reader = hound::WavReader::new(cursor).context("failed to parse WAV header")?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    let sample_rate = spec.sample_rate;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("failed to read float samples")?,
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .context("failed to read int samples")?
        }
    };

    Ok(DecodedAudio::from_interleaved(&samples, channels, sample_rate))
}

/// Decode audio using symphonia (MP3, FLAC, OGG, etc.)
#[cfg(feature = "symphonia-decode")]
pub fn decode_audio_symphonia(data: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("failed to probe audio format")?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| anyhow!("no audio track found"))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| anyhow!("no sample rate"))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("failed to create decoder")?;

    let track_id = track.id;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e).context("failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frame: skip it, the rest of the stream is usually fine
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!(error = msg, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e).context("failed to decode packet"),
        };

        let spec = *decoded.spec();
        channels = spec.channels.count();
        let duration = decoded.capacity();

        let mut sample_buf = SampleBuffer::<f32>::new(duration as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        samples.extend(sample_buf.samples());
    }

    Ok(DecodedAudio::from_interleaved(&samples, channels, sample_rate))
}

/// Decode audio from raw bytes
///
/// Tries WAV first (hound), then symphonia formats if the feature is enabled.
/// `extension` is a probe hint only.
pub fn decode_audio(data: &[u8], extension: Option<&str>) -> Result<DecodedAudio> {
    if data.len() >= 4 && &data[0..4] == b"RIFF" {
        return decode_wav(data);
    }

    #[cfg(feature = "symphonia-decode")]
    {
        decode_audio_symphonia(data, extension)
    }

    #[cfg(not(feature = "symphonia-decode"))]
    {
        let _ = extension;
        Err(anyhow!(
            "unsupported audio format (enable symphonia-decode feature for MP3/FLAC/OGG)"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a short 16-bit WAV tone for tests.
    fn write_test_wav(path: &Path, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames {
            let s = ((i as f32 * 0.05).sin() * 16000.0) as i16;
            for _ in 0..channels {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_mono_upmix() {
        let audio = DecodedAudio::from_interleaved(&[0.1, 0.2, 0.3], 1, 44100);
        assert_eq!(audio.samples, vec![0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
        assert_eq!(audio.frames(), 3);
    }

    #[test]
    fn test_multichannel_keeps_front_pair() {
        let audio = DecodedAudio::from_interleaved(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 3, 48000);
        assert_eq!(audio.samples, vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_frame_past_end_is_silent() {
        let audio = DecodedAudio::from_interleaved(&[0.5, -0.5], 2, 48000);
        assert_eq!(audio.frame(0), (0.5, -0.5));
        assert_eq!(audio.frame(1), (0.0, 0.0));
    }

    #[test]
    fn test_decode_wav_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_test_wav(&path, 1, 800);

        let audio = decode_file(&path).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.frames(), 800);
        assert!((audio.duration_seconds() - 0.1).abs() < 1e-9);
        // Upmixed: both sides identical
        let (l, r) = audio.frame(10);
        assert_eq!(l, r);
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/clip.mp3")).unwrap_err();
        assert!(matches!(err, DeckError::NotFound(_)));
    }

    #[test]
    fn test_decode_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let err = decode_file(&path).unwrap_err();
        assert!(matches!(err, DeckError::Decode { .. }));
    }
}
