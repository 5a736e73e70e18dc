//! GTCRN speech enhancement via ONNX Runtime.
//!
//! GTCRN (Grouped Temporal Convolutional Recurrent Network) is an ultra-lightweight
//! speech enhancement model with only 48K parameters that runs in real-time.
//!
//! The model operates in the STFT domain:
//! 1. Compute STFT of input audio (512-point FFT, 256 hop, 512 window)
//! 2. Run GTCRN frame by frame, carrying its recurrent caches
//! 3. Compute inverse STFT to get enhanced audio

use ndarray::{Array2, ArrayView1, ArrayView2};
#[cfg(feature = "enhancement")]
use ort::{
    session::{builder::GraphOptimizationLevel, Session},
    value::Value,
};

#[cfg(feature = "enhancement")]
use super::model::enhance_rows;
use super::model::{EnhancementError, EnhancementModel};
#[cfg(feature = "enhancement")]
use super::stft::{Stft, FREQ_BINS, HOP_SIZE};

/// Configuration for the GTCRN model
#[derive(Debug, Clone)]
pub struct GtcrnConfig {
    /// Path to the GTCRN ONNX model
    pub model_path: std::path::PathBuf,
    /// Number of threads for ONNX inference
    pub n_threads: i32,
}

impl Default for GtcrnConfig {
    fn default() -> Self {
        Self {
            model_path: std::path::PathBuf::new(),
            n_threads: 1,
        }
    }
}

/// Cache tensor sizes for GTCRN streaming
#[cfg(feature = "enhancement")]
const CONV_CACHE_SIZE: usize = 2 * 16 * 16 * 33; // [2, 1, 16, 16, 33] = 16896
#[cfg(feature = "enhancement")]
const TRA_CACHE_SIZE: usize = (2 * 3) * 16; // [2, 3, 1, 1, 16] = 96
#[cfg(feature = "enhancement")]
const INTER_CACHE_SIZE: usize = 2 * 33 * 16; // [2, 1, 33, 16] = 1056

/// Pretrained GTCRN enhancement model
#[cfg(feature = "enhancement")]
pub struct GtcrnModel {
    session: Session,
    stft: Stft,
    // Streaming cache state (persists between frames of one utterance)
    conv_cache: Vec<f32>,
    tra_cache: Vec<f32>,
    inter_cache: Vec<f32>,
}

#[cfg(feature = "enhancement")]
impl GtcrnModel {
    /// Load the model from disk
    pub fn new(config: GtcrnConfig) -> Result<Self, EnhancementError> {
        if !config.model_path.exists() {
            return Err(EnhancementError::ModelLoadError(format!(
                "Model not found at {:?}",
                config.model_path
            )));
        }

        let session = Session::builder()
            .map_err(|e: ort::Error| EnhancementError::ModelLoadError(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e: ort::Error| EnhancementError::ModelLoadError(e.to_string()))?
            .with_intra_threads(config.n_threads.max(1) as usize)
            .map_err(|e: ort::Error| EnhancementError::ModelLoadError(e.to_string()))?
            .commit_from_file(&config.model_path)
            .map_err(|e: ort::Error| EnhancementError::ModelLoadError(e.to_string()))?;

        tracing::info!("GTCRN model loaded from {:?}", config.model_path);

        Ok(Self {
            session,
            stft: Stft::new(),
            conv_cache: vec![0.0f32; CONV_CACHE_SIZE],
            tra_cache: vec![0.0f32; TRA_CACHE_SIZE],
            inter_cache: vec![0.0f32; INTER_CACHE_SIZE],
        })
    }

    /// Reset cache state (call before processing a new utterance)
    pub fn reset_cache(&mut self) {
        self.conv_cache.fill(0.0);
        self.tra_cache.fill(0.0);
        self.inter_cache.fill(0.0);
    }

    /// Enhance a single STFT frame, updating the streaming caches
    fn enhance_frame(
        &mut self,
        real: &[f32],
        imag: &[f32],
    ) -> Result<(Vec<f32>, Vec<f32>), EnhancementError> {
        // Input tensor: [1, 257, 1, 2] = [batch, freq_bins, frames, real+imag]
        let mut mix_data = Vec::with_capacity(FREQ_BINS * 2);
        for (re, im) in real.iter().zip(imag.iter()) {
            mix_data.push(*re);
            mix_data.push(*im);
        }

        let mix_tensor = Value::from_array(([1_usize, FREQ_BINS, 1, 2], mix_data))
            .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;

        let conv_cache_tensor =
            Value::from_array(([2_usize, 1, 16, 16, 33], self.conv_cache.clone()))
                .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;

        let tra_cache_tensor = Value::from_array(([2_usize, 3, 1, 1, 16], self.tra_cache.clone()))
            .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;

        let inter_cache_tensor =
            Value::from_array(([2_usize, 1, 33, 16], self.inter_cache.clone()))
                .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![
                "mix" => mix_tensor,
                "conv_cache" => conv_cache_tensor,
                "tra_cache" => tra_cache_tensor,
                "inter_cache" => inter_cache_tensor
            ])
            .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;

        // Output names: "enh", "new_conv_cache", "new_tra_cache", "new_inter_cache"
        let enh_output = outputs
            .get("enh")
            .ok_or_else(|| EnhancementError::InferenceError("Missing 'enh' output".to_string()))?;
        let enh_tensor = enh_output
            .try_extract_tensor::<f32>()
            .map_err(|e: ort::Error| EnhancementError::InferenceError(e.to_string()))?;
        let enh_data: Vec<f32> = enh_tensor.1.to_vec();

        if enh_data.len() < FREQ_BINS * 2 {
            return Err(EnhancementError::InferenceError(format!(
                "'enh' output has {} values, expected {}",
                enh_data.len(),
                FREQ_BINS * 2
            )));
        }

        self.conv_cache =
            extract_cache(outputs.get("new_conv_cache"), "new_conv_cache", CONV_CACHE_SIZE)?;
        self.tra_cache =
            extract_cache(outputs.get("new_tra_cache"), "new_tra_cache", TRA_CACHE_SIZE)?;
        self.inter_cache =
            extract_cache(outputs.get("new_inter_cache"), "new_inter_cache", INTER_CACHE_SIZE)?;

        // [1, 257, 1, 2] -> split into real/imag
        Ok(enh_data
            .chunks_exact(2)
            .take(FREQ_BINS)
            .map(|pair| (pair[0], pair[1]))
            .unzip())
    }

    /// Enhance one utterance of 16kHz mono audio in [-1, 1].
    ///
    /// Returns enhanced audio of the same length.
    pub fn enhance(&mut self, audio: &[f32]) -> Result<Vec<f32>, EnhancementError> {
        // Clips shorter than one frame are zero-padded into a single frame
        self.reset_cache();

        let num_frames = Stft::frame_count(audio.len());
        let mut enhanced_real = Vec::with_capacity(num_frames);
        let mut enhanced_imag = Vec::with_capacity(num_frames);

        for frame_idx in 0..num_frames {
            let (real, imag) = self.stft.analyze_frame(audio, frame_idx * HOP_SIZE);
            let (enh_real, enh_imag) = self.enhance_frame(&real, &imag)?;
            enhanced_real.push(enh_real);
            enhanced_imag.push(enh_imag);
        }

        let enhanced_audio = self
            .stft
            .synthesize(&enhanced_real, &enhanced_imag, audio.len());

        tracing::info!(
            "GTCRN enhanced utterance: {} samples, {} frames",
            audio.len(),
            num_frames
        );

        Ok(enhanced_audio)
    }
}

/// Read an updated streaming cache from the session outputs.
///
/// Every frame must replace all three caches with f32 tensors of the
/// expected size.
#[cfg(feature = "enhancement")]
fn extract_cache(
    output: Option<&ort::value::DynValue>,
    name: &str,
    expected_len: usize,
) -> Result<Vec<f32>, EnhancementError> {
    let output = output
        .ok_or_else(|| EnhancementError::InferenceError(format!("Missing '{}' output", name)))?;
    let (_, data) = output
        .try_extract_tensor::<f32>()
        .map_err(|e: ort::Error| EnhancementError::InferenceError(format!("'{}': {}", name, e)))?;
    check_cache_len(name, data.len(), expected_len)?;
    Ok(data.to_vec())
}

#[cfg(feature = "enhancement")]
fn check_cache_len(name: &str, len: usize, expected_len: usize) -> Result<(), EnhancementError> {
    if len != expected_len {
        return Err(EnhancementError::InferenceError(format!(
            "'{}' has {} values, expected {}",
            name, len, expected_len
        )));
    }
    Ok(())
}

#[cfg(feature = "enhancement")]
impl EnhancementModel for GtcrnModel {
    fn name(&self) -> &str {
        "gtcrn"
    }

    fn enhance_batch(
        &mut self,
        noisy: ArrayView2<'_, f32>,
        lengths: ArrayView1<'_, f32>,
    ) -> Result<Array2<f32>, EnhancementError> {
        enhance_rows(noisy, lengths, |audio| self.enhance(audio))
    }
}

// Stub implementation when feature is not enabled
#[cfg(not(feature = "enhancement"))]
pub struct GtcrnModel;

#[cfg(not(feature = "enhancement"))]
impl GtcrnModel {
    pub fn new(_config: GtcrnConfig) -> Result<Self, EnhancementError> {
        Err(EnhancementError::FeatureNotEnabled)
    }

    pub fn enhance(&mut self, _audio: &[f32]) -> Result<Vec<f32>, EnhancementError> {
        Err(EnhancementError::FeatureNotEnabled)
    }
}

#[cfg(not(feature = "enhancement"))]
impl EnhancementModel for GtcrnModel {
    fn name(&self) -> &str {
        "gtcrn"
    }

    fn enhance_batch(
        &mut self,
        _noisy: ArrayView2<'_, f32>,
        _lengths: ArrayView1<'_, f32>,
    ) -> Result<Array2<f32>, EnhancementError> {
        Err(EnhancementError::FeatureNotEnabled)
    }
}
