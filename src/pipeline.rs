//! The upload → validate → decode → conform → enhance flow for one request.

use std::time::Instant;

use thiserror::Error;
use tracing::{info, warn};

use crate::audio::{decode_wav, Waveform};
use crate::config::SampleRatePolicy;
use crate::enhancement::{EnhancementError, SpeechEnhancer};
use crate::validation::{allowed_file, conform_sample_rate, require_mono};

/// Warning shown for uploads that are not WAV files
pub const INVALID_FILE_TYPE_MESSAGE: &str = "Invalid file type. Please upload a WAV file.";

/// An uploaded file, owned for the duration of one request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// Original and enhanced audio for playback, both at 16kHz
#[derive(Debug, Clone)]
pub struct EnhancementResult {
    pub original: Waveform,
    pub enhanced: Waveform,
    /// Sample rate of the file as uploaded
    pub source_sample_rate: u32,
    pub processing_ms: u64,
}

/// Reasons an upload is not enhanced. `Display` is the user-facing message.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Invalid file type. Please upload a WAV file.")]
    InvalidFileType,

    #[error("Could not read WAV file: {0}")]
    Decode(String),

    #[error("The uploaded file contains no audio")]
    EmptyAudio,

    #[error("audio must have exactly one channel, found {0}")]
    UnsupportedChannels(u16),

    #[error("sampling rate must be 16000")]
    SampleRate { found: u32 },

    #[error("Failed to resample audio: {0}")]
    Resample(String),

    #[error("Enhancement failed: {0}")]
    Enhancement(#[from] EnhancementError),
}

impl ProcessError {
    /// Rejected before any processing was attempted
    pub fn is_warning(&self) -> bool {
        matches!(self, ProcessError::InvalidFileType)
    }

    /// Stable identifier for API clients
    pub fn kind(&self) -> &'static str {
        match self {
            ProcessError::InvalidFileType => "invalid_file_type",
            ProcessError::Decode(_) => "decode",
            ProcessError::EmptyAudio => "empty_audio",
            ProcessError::UnsupportedChannels(_) => "unsupported_channels",
            ProcessError::SampleRate { .. } => "sample_rate",
            ProcessError::Resample(_) => "resample",
            ProcessError::Enhancement(_) => "enhancement",
        }
    }
}

/// Validate, decode, and enhance one uploaded file.
///
/// Every failure is returned as a [`ProcessError`]; nothing here panics on bad input.
pub fn process_upload(
    file: &UploadedFile,
    enhancer: &mut SpeechEnhancer,
    policy: SampleRatePolicy,
) -> Result<EnhancementResult, ProcessError> {
    if !allowed_file(&file.filename) {
        warn!("Rejected upload with invalid file type: {}", file.filename);
        return Err(ProcessError::InvalidFileType);
    }

    let start = Instant::now();

    let decoded = decode_wav(&file.bytes).map_err(|e| ProcessError::Decode(e.to_string()))?;
    let source_sample_rate = decoded.sample_rate;

    let waveform = require_mono(decoded)?;
    if waveform.is_empty() {
        return Err(ProcessError::EmptyAudio);
    }

    let original = conform_sample_rate(waveform, policy)?;
    let enhanced = enhancer.enhance(&original)?;

    let processing_ms = start.elapsed().as_millis() as u64;
    info!(
        "Enhanced {} ({:.2}s at {} Hz) in {} ms",
        file.filename,
        original.duration_secs(),
        source_sample_rate,
        processing_ms
    );

    Ok(EnhancementResult {
        original,
        enhanced,
        source_sample_rate,
        processing_ms,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_wav;
    use crate::enhancement::SpectralMaskModel;
    use std::f32::consts::PI;

    fn enhancer() -> SpeechEnhancer {
        SpeechEnhancer::new(Box::new(SpectralMaskModel::new()))
    }

    fn tone_wav(samples: usize, sample_rate: u32) -> Vec<u8> {
        let wave = Waveform::new(
            (0..samples)
                .map(|i| (2.0 * PI * 220.0 * i as f32 / sample_rate as f32).sin() * 0.3)
                .collect(),
            sample_rate,
        );
        encode_wav(&wave).unwrap()
    }

    fn stereo_wav() -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for _ in 0..2000 {
                writer.write_sample(1000i16).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_valid_16k_mono_upload() {
        let file = UploadedFile::new("sample.wav", tone_wav(16000, 16000));
        let result = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap();

        assert_eq!(result.original.sample_rate, 16000);
        assert_eq!(result.enhanced.sample_rate, 16000);
        assert_eq!(result.original.len(), 16000);
        assert_eq!(result.enhanced.len(), result.original.len());
        assert_eq!(result.source_sample_rate, 16000);
    }

    #[test]
    fn test_invalid_extension_is_warning() {
        let file = UploadedFile::new("sample.mp3", tone_wav(1600, 16000));
        let err = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap_err();

        assert!(err.is_warning());
        assert_eq!(err.to_string(), INVALID_FILE_TYPE_MESSAGE);
        assert_eq!(err.kind(), "invalid_file_type");
    }

    #[test]
    fn test_8k_upload_resampled() {
        let file = UploadedFile::new("narrowband.WAV", tone_wav(8000, 8000));
        let result = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap();

        assert_eq!(result.source_sample_rate, 8000);
        assert_eq!(result.original.sample_rate, 16000);
        assert_eq!(result.original.len(), 16000);
        assert_eq!(result.enhanced.len(), 16000);
    }

    #[test]
    fn test_8k_upload_rejected_with_message() {
        let file = UploadedFile::new("narrowband.wav", tone_wav(8000, 8000));
        let err = process_upload(&file, &mut enhancer(), SampleRatePolicy::Reject).unwrap_err();

        assert!(!err.is_warning());
        assert!(matches!(err, ProcessError::SampleRate { found: 8000 }));
        assert_eq!(err.to_string(), "sampling rate must be 16000");
    }

    #[test]
    fn test_stereo_upload_reported() {
        let file = UploadedFile::new("stereo.wav", stereo_wav());
        let err = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap_err();
        assert!(matches!(err, ProcessError::UnsupportedChannels(2)));
    }

    #[test]
    fn test_corrupt_wav_reported() {
        let file = UploadedFile::new("broken.wav", b"RIFF....WAVEjunk".to_vec());
        let err = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap_err();
        assert_eq!(err.kind(), "decode");
    }

    #[test]
    fn test_empty_wav_reported() {
        let file = UploadedFile::new("empty.wav", tone_wav(0, 16000));
        let err = process_upload(&file, &mut enhancer(), SampleRatePolicy::Resample).unwrap_err();
        assert!(matches!(err, ProcessError::EmptyAudio));
    }
}
