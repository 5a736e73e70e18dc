use anyhow::{Context, Result};
use ndarray::{arr1, ArrayView1, Axis};
use tracing::{debug, info};

use super::gtcrn::{GtcrnConfig, GtcrnModel};
use super::model::{absolute_length, EnhancementError, EnhancementModel};
use super::spectral_mask::SpectralMaskModel;
use crate::audio::{Waveform, TARGET_SAMPLE_RATE};
use crate::config::{Config, EnhancementBackend};
use crate::models;

/// Single-utterance front end for a batch enhancement model.
///
/// Created once at startup and reused for every request.
pub struct SpeechEnhancer {
    model: Box<dyn EnhancementModel>,
}

impl SpeechEnhancer {
    pub fn new(model: Box<dyn EnhancementModel>) -> Self {
        Self { model }
    }

    /// Load the model selected in `config`, downloading it first if allowed
    pub fn from_config(config: &Config) -> Result<Self> {
        let model: Box<dyn EnhancementModel> = match config.backend {
            EnhancementBackend::Gtcrn => {
                let model_path = if config.auto_download && config.model_path.is_none() {
                    models::ensure_enhancement_model()?
                } else {
                    config.get_model_path()?
                };
                let gtcrn = GtcrnModel::new(GtcrnConfig {
                    model_path: model_path.clone(),
                    n_threads: config.n_threads,
                })
                .with_context(|| format!("Failed to load GTCRN model from {:?}", model_path))?;
                Box::new(gtcrn)
            }
            EnhancementBackend::SpectralMask => Box::new(SpectralMaskModel::new()),
        };

        info!("Enhancement model ready: {}", model.name());
        Ok(Self::new(model))
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Enhance a 16kHz mono waveform.
    ///
    /// Adds a batch dimension and a relative length of 1.0, makes exactly one
    /// model call, and returns the first batch row. The result has the same
    /// length and sample rate as the input.
    pub fn enhance(&mut self, waveform: &Waveform) -> Result<Waveform, EnhancementError> {
        if waveform.sample_rate != TARGET_SAMPLE_RATE {
            return Err(EnhancementError::InvalidInput(format!(
                "expected {} Hz audio, got {} Hz",
                TARGET_SAMPLE_RATE, waveform.sample_rate
            )));
        }
        if waveform.is_empty() {
            return Err(EnhancementError::InvalidInput("empty audio".to_string()));
        }

        let noisy = ArrayView1::from(waveform.samples.as_slice()).insert_axis(Axis(0));
        let lengths = arr1(&[1.0f32]);

        let batch = self.model.enhance_batch(noisy, lengths.view())?;
        if batch.nrows() == 0 {
            return Err(EnhancementError::InferenceError(
                "model returned an empty batch".to_string(),
            ));
        }

        let keep = absolute_length(lengths[0], batch.ncols())?;
        let enhanced: Vec<f32> = batch.row(0).iter().take(keep).copied().collect();
        if enhanced.len() != waveform.len() {
            return Err(EnhancementError::InferenceError(format!(
                "model returned {} samples for {} input samples",
                enhanced.len(),
                waveform.len()
            )));
        }

        debug!(
            "{} enhanced {:.2}s of audio",
            self.model.name(),
            waveform.duration_secs()
        );

        Ok(Waveform::new(enhanced, TARGET_SAMPLE_RATE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, ArrayView2};

    /// Scales the signal by 0.5, optionally dropping trailing samples
    struct HalfGainModel {
        truncate_to: Option<usize>,
    }

    impl EnhancementModel for HalfGainModel {
        fn name(&self) -> &str {
            "half-gain"
        }

        fn enhance_batch(
            &mut self,
            noisy: ArrayView2<'_, f32>,
            _lengths: ArrayView1<'_, f32>,
        ) -> Result<Array2<f32>, EnhancementError> {
            let out = noisy.mapv(|s| s * 0.5);
            Ok(match self.truncate_to {
                Some(cols) => out.slice(ndarray::s![.., ..cols]).to_owned(),
                None => out,
            })
        }
    }

    #[test]
    fn test_adapter_batches_single_utterance() {
        let mut enhancer = SpeechEnhancer::new(Box::new(HalfGainModel { truncate_to: None }));
        let input = Waveform::new(vec![0.2, -0.4, 0.6, -0.8], 16000);

        let output = enhancer.enhance(&input).unwrap();

        assert_eq!(output.samples, vec![0.1, -0.2, 0.3, -0.4]);
        assert_eq!(output.sample_rate, 16000);
        assert_eq!(enhancer.model_name(), "half-gain");
    }

    #[test]
    fn test_adapter_passes_batch_shape_and_lengths() {
        struct ShapeRecorder(std::sync::Arc<std::sync::Mutex<Vec<(usize, usize, Vec<f32>)>>>);
        impl EnhancementModel for ShapeRecorder {
            fn name(&self) -> &str {
                "shape-recorder"
            }
            fn enhance_batch(
                &mut self,
                noisy: ArrayView2<'_, f32>,
                lengths: ArrayView1<'_, f32>,
            ) -> Result<Array2<f32>, EnhancementError> {
                let (b, t) = noisy.dim();
                self.0.lock().unwrap().push((b, t, lengths.to_vec()));
                Ok(noisy.to_owned())
            }
        }

        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut enhancer = SpeechEnhancer::new(Box::new(ShapeRecorder(seen.clone())));
        enhancer.enhance(&Waveform::new(vec![0.0; 160], 16000)).unwrap();

        let calls = seen.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (1, 160, vec![1.0]));
    }

    #[test]
    fn test_adapter_rejects_wrong_rate() {
        let mut enhancer = SpeechEnhancer::new(Box::new(HalfGainModel { truncate_to: None }));
        let result = enhancer.enhance(&Waveform::new(vec![0.0; 10], 8000));
        assert!(matches!(result, Err(EnhancementError::InvalidInput(_))));
    }

    #[test]
    fn test_adapter_rejects_empty() {
        let mut enhancer = SpeechEnhancer::new(Box::new(HalfGainModel { truncate_to: None }));
        let result = enhancer.enhance(&Waveform::new(Vec::new(), 16000));
        assert!(matches!(result, Err(EnhancementError::InvalidInput(_))));
    }

    #[test]
    fn test_adapter_detects_short_output() {
        let mut enhancer = SpeechEnhancer::new(Box::new(HalfGainModel {
            truncate_to: Some(2),
        }));
        let result = enhancer.enhance(&Waveform::new(vec![0.1; 4], 16000));
        assert!(matches!(result, Err(EnhancementError::InferenceError(_))));
    }

    #[test]
    fn test_spectral_mask_from_config() {
        let config = Config {
            backend: EnhancementBackend::SpectralMask,
            ..Config::default()
        };
        let mut enhancer = SpeechEnhancer::from_config(&config).unwrap();
        assert_eq!(enhancer.model_name(), "spectral-mask");

        let input = Waveform::new(vec![0.01; 4000], 16000);
        assert_eq!(enhancer.enhance(&input).unwrap().len(), 4000);
    }

    #[test]
    fn test_gtcrn_missing_model_fails_to_load() {
        let config = Config {
            backend: EnhancementBackend::Gtcrn,
            model_path: Some(std::path::PathBuf::from("/nonexistent/gtcrn.onnx")),
            auto_download: false,
            ..Config::default()
        };
        assert!(SpeechEnhancer::from_config(&config).is_err());
    }
}
