use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::Waveform;

/// Sample rate expected by the enhancement model
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Mono resampler from an upload's sample rate to 16kHz
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
}

impl AudioResampler {
    /// Create a new resampler from `source_rate` to 16kHz
    pub fn new(source_rate: u32) -> Result<Self> {
        if source_rate == 0 {
            anyhow::bail!("Source sample rate must be positive");
        }

        let ratio = TARGET_SAMPLE_RATE as f64 / source_rate as f64;

        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_rate, TARGET_SAMPLE_RATE, ratio
        );

        let channels = 1;

        let resampler = FftFixedIn::new(
            source_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            channels,
        )
        .context("Failed to create resampler")?;

        let input_buffer = vec![vec![0.0f32; CHUNK_FRAMES]; channels];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames: CHUNK_FRAMES,
        })
    }

    /// Get the number of input frames needed for the next process call
    pub fn input_frames_next(&self) -> usize {
        self.input_frames
    }

    /// Number of leading output frames that are resampler latency
    pub fn output_delay(&self) -> usize {
        self.resampler.output_delay()
    }

    /// Process exactly `input_frames_next()` samples and return resampled output
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_frames {
            anyhow::bail!(
                "Input length {} doesn't match expected {}",
                input.len(),
                self.input_frames
            );
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .context("Resampling failed")?;

        Ok(self.output_buffer[0][..output_frames].to_vec())
    }

    /// Process a final short chunk, zero-padded internally.
    ///
    /// An empty `input` flushes the resampler's delay line.
    pub fn process_partial(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() > self.input_frames {
            anyhow::bail!(
                "Partial input length {} exceeds chunk size {}",
                input.len(),
                self.input_frames
            );
        }

        let result = if input.is_empty() {
            self.resampler
                .process_partial_into_buffer(None::<&[Vec<f32>]>, &mut self.output_buffer, None)
        } else {
            let wave_in = [input];
            self.resampler
                .process_partial_into_buffer(Some(&wave_in[..]), &mut self.output_buffer, None)
        };
        let (_, output_frames) = result.context("Resampling failed")?;

        Ok(self.output_buffer[0][..output_frames].to_vec())
    }
}

/// Resample a whole mono waveform to 16kHz.
///
/// Output length is `ceil(len * 16000 / source_rate)` with the resampler
/// latency removed. A waveform already at 16kHz is returned unchanged.
pub fn resample_to_target(waveform: &Waveform) -> Result<Waveform> {
    if waveform.sample_rate == TARGET_SAMPLE_RATE {
        return Ok(waveform.clone());
    }

    let mut resampler = AudioResampler::new(waveform.sample_rate)?;
    let expected_len = (waveform.len() as u64 * TARGET_SAMPLE_RATE as u64)
        .div_ceil(waveform.sample_rate as u64) as usize;
    let delay = resampler.output_delay();
    let chunk = resampler.input_frames_next();

    let mut output = Vec::with_capacity(expected_len + delay + chunk);

    let mut chunks = waveform.samples.chunks_exact(chunk);
    for block in &mut chunks {
        output.extend(resampler.process(block)?);
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        output.extend(resampler.process_partial(remainder)?);
    }

    // Flush the delay line; every flush call yields a full output chunk
    let mut flushes = 0;
    while output.len() < delay + expected_len {
        let flushed = resampler.process_partial(&[])?;
        if flushed.is_empty() || flushes > 16 {
            break;
        }
        output.extend(flushed);
        flushes += 1;
    }

    let mut samples: Vec<f32> = output.into_iter().skip(delay).take(expected_len).collect();
    samples.resize(expected_len, 0.0);

    debug!(
        "Resampled {} samples at {} Hz to {} samples at {} Hz",
        waveform.len(),
        waveform.sample_rate,
        samples.len(),
        TARGET_SAMPLE_RATE
    );

    Ok(Waveform::new(samples, TARGET_SAMPLE_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(samples: usize, freq: f32, sample_rate: u32) -> Vec<f32> {
        (0..samples)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_resampler_48k_to_16k() {
        let mut resampler = AudioResampler::new(48000).expect("Failed to create resampler");

        // FFT-based resamplers have latency, so process multiple chunks
        let input = vec![0.0f32; resampler.input_frames_next()];
        let mut total_output = 0;
        let mut total_input = 0;

        for _ in 0..5 {
            let output = resampler.process(&input).expect("Resampling failed");
            total_output += output.len();
            total_input += input.len();
        }

        let expected_ratio = 16000.0 / 48000.0;
        let actual_ratio = total_output as f64 / total_input as f64;
        assert!(
            (actual_ratio - expected_ratio).abs() < 0.1,
            "Expected ratio ~{:.3}, got {:.3}",
            expected_ratio,
            actual_ratio
        );
    }

    #[test]
    fn test_process_rejects_wrong_length() {
        let mut resampler = AudioResampler::new(44100).unwrap();
        assert!(resampler.process(&[0.0; 10]).is_err());
        assert!(resampler.process_partial(&vec![0.0; 4096]).is_err());
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(AudioResampler::new(0).is_err());
    }

    #[test]
    fn test_resample_8k_to_16k_length() {
        let wave = Waveform::new(sine(8000, 440.0, 8000), 8000);
        let resampled = resample_to_target(&wave).unwrap();

        assert_eq!(resampled.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(resampled.len(), 16000);
    }

    #[test]
    fn test_resample_44100_odd_length() {
        let wave = Waveform::new(sine(44100 + 37, 300.0, 44100), 44100);
        let resampled = resample_to_target(&wave).unwrap();

        let expected = ((44100u64 + 37) * 16000).div_ceil(44100) as usize;
        assert_eq!(resampled.len(), expected);
        assert_eq!(resampled.sample_rate, 16000);
    }

    #[test]
    fn test_resample_preserves_signal_energy() {
        let wave = Waveform::new(sine(48000, 440.0, 48000), 48000);
        let resampled = resample_to_target(&wave).unwrap();

        // Skip the edges and compare RMS of the middle section
        let mid = &resampled.samples[2000..14000];
        let rms = (mid.iter().map(|s| s * s).sum::<f32>() / mid.len() as f32).sqrt();
        let expected_rms = 0.5 / 2.0f32.sqrt();
        assert!(
            (rms - expected_rms).abs() < 0.05,
            "RMS after resampling {} differs from {}",
            rms,
            expected_rms
        );
    }

    #[test]
    fn test_target_rate_is_identity() {
        let wave = Waveform::new(vec![0.1, 0.2, 0.3], TARGET_SAMPLE_RATE);
        let resampled = resample_to_target(&wave).unwrap();
        assert_eq!(resampled, wave);
    }

    #[test]
    fn test_resample_short_input() {
        let wave = Waveform::new(vec![0.25; 10], 8000);
        let resampled = resample_to_target(&wave).unwrap();
        assert_eq!(resampled.len(), 20);
    }
}
