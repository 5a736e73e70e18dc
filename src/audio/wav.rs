//! WAV decoding and encoding for uploads and playback.
//!
//! Integer PCM is normalized to [-1, 1] by the full scale of its bit depth
//! (16-bit samples are divided by 32768). Playback audio is always written as
//! mono 16-bit PCM.

use std::io::Cursor;

use thiserror::Error;
use tracing::debug;

use super::Waveform;

/// Errors from WAV decoding/encoding
#[derive(Debug, Error)]
pub enum WavError {
    #[error("Failed to read WAV data: {0}")]
    Decode(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    Unsupported(String),

    #[error("Failed to write WAV data: {0}")]
    Encode(String),
}

/// Decoded WAV contents before any channel or sample rate checks
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples normalized to [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl DecodedAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Convert to a mono waveform. Returns `None` unless there is exactly one channel.
    pub fn into_waveform(self) -> Option<Waveform> {
        if self.channels != 1 {
            return None;
        }
        Some(Waveform::new(self.samples, self.sample_rate))
    }
}

/// Decode WAV bytes
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, WavError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(WavError::Unsupported(format!(
                    "{} bits per sample",
                    spec.bits_per_sample
                )));
            }
            let full_scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / full_scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(WavError::Unsupported(format!(
                    "{}-bit float samples",
                    spec.bits_per_sample
                )));
            }
            reader.into_samples::<f32>().collect::<Result<_, _>>()?
        }
    };

    debug!(
        "Decoded WAV: {} Hz, {} channels, {} bits, {} samples",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
    })
}

/// Encode a waveform as mono 16-bit PCM WAV bytes
pub fn encode_wav(waveform: &Waveform) -> Result<Vec<u8>, WavError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + waveform.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| WavError::Encode(e.to_string()))?;
        for &sample in &waveform.samples {
            let value = (sample * 32768.0)
                .round()
                .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            writer
                .write_sample(value)
                .map_err(|e| WavError::Encode(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| WavError::Encode(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
