//! Upload validation: file extension, channel count, and sample rate.

use tracing::{debug, info};

use crate::audio::{resample_to_target, DecodedAudio, Waveform, TARGET_SAMPLE_RATE};
use crate::config::SampleRatePolicy;
use crate::pipeline::ProcessError;

/// File extensions accepted by the uploader
pub const ALLOWED_EXTENSIONS: &[&str] = &["wav"];

/// Check whether a filename has an allowed extension (case-insensitive).
///
/// The extension is the text after the last `.`; names without a `.` are rejected.
pub fn allowed_file(filename: &str) -> bool {
    match filename.rsplit_once('.') {
        Some((_, ext)) => {
            let ext = ext.to_lowercase();
            ALLOWED_EXTENSIONS.contains(&ext.as_str())
        }
        None => false,
    }
}

/// Require a single channel and convert to a mono waveform
pub fn require_mono(decoded: DecodedAudio) -> Result<Waveform, ProcessError> {
    let channels = decoded.channels;
    decoded
        .into_waveform()
        .ok_or(ProcessError::UnsupportedChannels(channels))
}

/// Bring a waveform to 16kHz according to `policy`
pub fn conform_sample_rate(
    waveform: Waveform,
    policy: SampleRatePolicy,
) -> Result<Waveform, ProcessError> {
    if waveform.sample_rate == TARGET_SAMPLE_RATE {
        debug!("Sample rate already {} Hz", TARGET_SAMPLE_RATE);
        return Ok(waveform);
    }

    match policy {
        SampleRatePolicy::Reject => Err(ProcessError::SampleRate {
            found: waveform.sample_rate,
        }),
        SampleRatePolicy::Resample => {
            info!(
                "Resampling upload from {} Hz to {} Hz",
                waveform.sample_rate, TARGET_SAMPLE_RATE
            );
            resample_to_target(&waveform).map_err(|e| ProcessError::Resample(e.to_string()))
        }
    }
}
