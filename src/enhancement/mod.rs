//! Speech enhancement.
//!
//! [`SpeechEnhancer`] wraps any [`EnhancementModel`] behind a single-utterance
//! API: it adds the batch dimension and relative-length tensor the models
//! expect and hands back the first (only) batch row. Two models ship:
//!
//! - [`GtcrnModel`]: the pretrained GTCRN (Grouped Temporal Convolutional
//!   Recurrent Network) ONNX model, ultra-lightweight (~523KB) and real-time.
//! - [`SpectralMaskModel`]: an STFT spectral mask that needs no model file.

mod adapter;
mod gtcrn;
mod model;
mod spectral_mask;
mod stft;

pub use adapter::SpeechEnhancer;
pub use gtcrn::{GtcrnConfig, GtcrnModel};
pub use model::{EnhancementError, EnhancementModel};
pub use spectral_mask::SpectralMaskModel;
pub use stft::{Stft, FFT_SIZE, FREQ_BINS, HOP_SIZE};
