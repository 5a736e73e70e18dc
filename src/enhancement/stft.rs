//! Short-time Fourier transform shared by the enhancement models.
//!
//! 512-point FFT, 256 hop, periodic sqrt-Hann window. With 50% overlap the
//! squared window sums to one, so overlap-add reconstruction is exact away
//! from the signal edges.

use rustfft::{num_complex::Complex, FftPlanner};

pub const FFT_SIZE: usize = 512;
pub const HOP_SIZE: usize = 256;
pub const FREQ_BINS: usize = FFT_SIZE / 2 + 1; // 257

/// STFT analysis/synthesis with a cached FFT planner and window
pub struct Stft {
    planner: FftPlanner<f32>,
    window: Vec<f32>,
}

impl Default for Stft {
    fn default() -> Self {
        Self::new()
    }
}

impl Stft {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            window: sqrt_hann(FFT_SIZE),
        }
    }

    /// Number of frames needed to cover `len` samples (the last frame is zero-padded)
    pub fn frame_count(len: usize) -> usize {
        if len <= FFT_SIZE {
            1
        } else {
            (len - FFT_SIZE).div_ceil(HOP_SIZE) + 1
        }
    }

    /// Compute STFT of one frame of audio.
    /// Returns (real, imag) components for freq bins 0..257
    pub fn analyze_frame(&mut self, audio: &[f32], frame_start: usize) -> (Vec<f32>, Vec<f32>) {
        let fft = self.planner.plan_fft_forward(FFT_SIZE);

        let mut buffer: Vec<Complex<f32>> = (0..FFT_SIZE)
            .map(|i| {
                let sample = audio.get(frame_start + i).copied().unwrap_or(0.0) * self.window[i];
                Complex::new(sample, 0.0)
            })
            .collect();

        fft.process(&mut buffer);

        buffer
            .iter()
            .take(FREQ_BINS)
            .map(|bin| (bin.re, bin.im))
            .unzip()
    }

    /// Compute STFT of audio - returns (real, imag) for all frames
    pub fn analyze(&mut self, audio: &[f32]) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        (0..Self::frame_count(audio.len()))
            .map(|frame_idx| self.analyze_frame(audio, frame_idx * HOP_SIZE))
            .unzip()
    }

    /// Inverse STFT with overlap-add, returning exactly `original_len` samples
    pub fn synthesize(
        &mut self,
        all_real: &[Vec<f32>],
        all_imag: &[Vec<f32>],
        original_len: usize,
    ) -> Vec<f32> {
        let num_frames = all_real.len().min(all_imag.len());
        if num_frames == 0 {
            return vec![0.0; original_len];
        }

        let ifft = self.planner.plan_fft_inverse(FFT_SIZE);
        let output_len = (num_frames - 1) * HOP_SIZE + FFT_SIZE;

        let mut output = vec![0.0f32; output_len];
        let mut window_sum = vec![0.0f32; output_len];

        for (frame_idx, (real, imag)) in all_real.iter().zip(all_imag.iter()).enumerate() {
            let mut buffer: Vec<Complex<f32>> = (0..FFT_SIZE)
                .map(|i| {
                    if i < FREQ_BINS {
                        Complex::new(real[i], imag[i])
                    } else {
                        // Mirror for negative frequencies (conjugate symmetry)
                        let mirror_idx = FFT_SIZE - i;
                        Complex::new(real[mirror_idx], -imag[mirror_idx])
                    }
                })
                .collect();

            ifft.process(&mut buffer);

            let start = frame_idx * HOP_SIZE;
            for (i, sample) in buffer.iter().enumerate() {
                output[start + i] += sample.re * self.window[i] / FFT_SIZE as f32;
                window_sum[start + i] += self.window[i] * self.window[i];
            }
        }

        for (out, win) in output.iter_mut().zip(window_sum.iter()) {
            if *win > 1e-8 {
                *out /= win;
            }
        }

        output.resize(original_len, 0.0);
        output
    }
}

/// Periodic sqrt-Hann window
fn sqrt_hann(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            (0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())).sqrt()
        })
        .collect()
}
