//! STFT spectral mask enhancement.
//!
//! The noise magnitude spectrum is estimated from the quietest frames of the
//! utterance, and every bin is scaled by a subtraction gain clamped to a floor
//! so that residual noise stays smooth instead of turning into musical tones.

use ndarray::{Array2, ArrayView1, ArrayView2};
use tracing::debug;

use super::model::{enhance_rows, EnhancementError, EnhancementModel};
use super::stft::{Stft, FFT_SIZE, FREQ_BINS};

/// Fraction of frames (lowest energy first) used for the noise estimate
const NOISE_FRAME_FRACTION: f32 = 0.1;
/// How aggressively the noise estimate is subtracted
const OVER_SUBTRACTION: f32 = 1.5;
/// Minimum gain applied to any bin
const GAIN_FLOOR: f32 = 0.1;

/// Spectral mask denoiser that needs no model file
pub struct SpectralMaskModel {
    stft: Stft,
    over_subtraction: f32,
    gain_floor: f32,
}

impl Default for SpectralMaskModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralMaskModel {
    pub fn new() -> Self {
        Self {
            stft: Stft::new(),
            over_subtraction: OVER_SUBTRACTION,
            gain_floor: GAIN_FLOOR,
        }
    }

    /// Enhance one utterance at 16kHz. Output length equals input length.
    pub fn enhance(&mut self, audio: &[f32]) -> Vec<f32> {
        if audio.len() < FFT_SIZE {
            // A single frame gives no quiet frames to estimate the noise floor from
            return audio.to_vec();
        }

        let (mut real, mut imag) = self.stft.analyze(audio);
        let magnitudes: Vec<Vec<f32>> = real
            .iter()
            .zip(imag.iter())
            .map(|(re, im)| {
                re.iter()
                    .zip(im.iter())
                    .map(|(r, i)| (r * r + i * i).sqrt())
                    .collect()
            })
            .collect();

        let noise = estimate_noise(&magnitudes);

        for ((re, im), mag) in real.iter_mut().zip(imag.iter_mut()).zip(magnitudes.iter()) {
            for bin in 0..FREQ_BINS {
                let gain = if mag[bin] > 1e-10 {
                    (1.0 - self.over_subtraction * noise[bin] / mag[bin]).max(self.gain_floor)
                } else {
                    self.gain_floor
                };
                re[bin] *= gain;
                im[bin] *= gain;
            }
        }

        debug!(
            "Spectral mask enhanced utterance: {} samples, {} frames",
            audio.len(),
            magnitudes.len()
        );

        self.stft.synthesize(&real, &imag, audio.len())
    }
}

/// Mean magnitude per bin over the lowest-energy frames
fn estimate_noise(magnitudes: &[Vec<f32>]) -> Vec<f32> {
    let mut by_energy: Vec<(usize, f32)> = magnitudes
        .iter()
        .enumerate()
        .map(|(idx, frame)| (idx, frame.iter().map(|m| m * m).sum::<f32>()))
        .collect();
    by_energy.sort_by(|a, b| a.1.total_cmp(&b.1));

    let count = ((magnitudes.len() as f32 * NOISE_FRAME_FRACTION).ceil() as usize).max(1);
    let mut noise = vec![0.0f32; FREQ_BINS];
    for &(idx, _) in by_energy.iter().take(count) {
        for (n, m) in noise.iter_mut().zip(magnitudes[idx].iter()) {
            *n += m;
        }
    }
    for n in noise.iter_mut() {
        *n /= count as f32;
    }
    noise
}

impl EnhancementModel for SpectralMaskModel {
    fn name(&self) -> &str {
        "spectral-mask"
    }

    fn enhance_batch(
        &mut self,
        noisy: ArrayView2<'_, f32>,
        lengths: ArrayView1<'_, f32>,
    ) -> Result<Array2<f32>, EnhancementError> {
        enhance_rows(noisy, lengths, |audio| Ok(self.enhance(audio)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array2};
    use std::f32::consts::PI;

    /// Deterministic pseudo-random noise in [-1, 1]
    fn noise(samples: usize, seed: u32) -> Vec<f32> {
        let mut state = seed;
        (0..samples)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as f32 / (1u32 << 24) as f32 * 2.0 - 1.0
            })
            .collect()
    }

    /// One second of silence-padded tone plus broadband noise
    fn noisy_speech() -> (Vec<f32>, Vec<f32>) {
        let clean: Vec<f32> = (0..16000)
            .map(|i| {
                if (4000..12000).contains(&i) {
                    let t = i as f32 / 16000.0;
                    (2.0 * PI * 200.0 * t).sin() * 0.4 + (2.0 * PI * 400.0 * t).sin() * 0.3
                } else {
                    0.0
                }
            })
            .collect();
        let noisy = clean
            .iter()
            .zip(noise(16000, 7))
            .map(|(c, n)| c + n * 0.05)
            .collect();
        (clean, noisy)
    }

    fn energy(x: &[f32]) -> f32 {
        x.iter().map(|s| s * s).sum()
    }

    #[test]
    fn test_preserves_length() {
        let mut model = SpectralMaskModel::new();
        for samples in [512, 513, 1023, 2048, 16000] {
            let audio = noise(samples, 1);
            assert_eq!(model.enhance(&audio).len(), samples);
        }
    }

    #[test]
    fn test_short_audio_passthrough() {
        let mut model = SpectralMaskModel::new();
        let audio = vec![0.5f32; 256];
        assert_eq!(model.enhance(&audio), audio);
    }

    #[test]
    fn test_reduces_noise_in_silent_region() {
        let (_, noisy) = noisy_speech();
        let mut model = SpectralMaskModel::new();
        let enhanced = model.enhance(&noisy);

        let before = energy(&noisy[1000..3500]);
        let after = energy(&enhanced[1000..3500]);
        assert!(
            after < before * 0.5,
            "noise-only energy not reduced: {} -> {}",
            before,
            after
        );
    }

    #[test]
    fn test_keeps_speech_energy() {
        let (clean, noisy) = noisy_speech();
        let mut model = SpectralMaskModel::new();
        let enhanced = model.enhance(&noisy);

        let speech = energy(&clean[5000..11000]);
        let kept = energy(&enhanced[5000..11000]);
        assert!(kept > speech * 0.5, "speech energy lost: {} -> {}", speech, kept);
    }

    #[test]
    fn test_batch_entry_point() {
        let (_, noisy) = noisy_speech();
        let batch = Array2::from_shape_vec((1, noisy.len()), noisy.clone()).unwrap();
        let lengths = arr1(&[1.0f32]);

        let mut model = SpectralMaskModel::new();
        let out = model.enhance_batch(batch.view(), lengths.view()).unwrap();

        assert_eq!(out.dim(), (1, noisy.len()));
        let direct = SpectralMaskModel::new().enhance(&noisy);
        assert_eq!(out.row(0).to_vec(), direct);
    }
}
