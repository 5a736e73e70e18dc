//! Speech enhancement web service.
//!
//! Upload a WAV file, run it through a pretrained speech enhancement model,
//! and play back both the original and the enhanced audio.

pub mod audio;
pub mod config;
pub mod enhancement;
pub mod models;
pub mod pipeline;
pub mod validation;
pub mod web;

pub use audio::{Waveform, TARGET_SAMPLE_RATE};
pub use config::{Config, EnhancementBackend, SampleRatePolicy};
pub use enhancement::{EnhancementError, EnhancementModel, SpeechEnhancer};
pub use pipeline::{process_upload, EnhancementResult, ProcessError, UploadedFile};
