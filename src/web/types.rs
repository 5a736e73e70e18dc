//! JSON bodies for the API endpoints.

use serde::{Deserialize, Serialize};

/// Successful `POST /api/enhance` response
#[derive(Debug, Serialize, Deserialize)]
pub struct EnhanceResponse {
    pub model: String,
    /// Sample rate of both returned WAV files
    pub sample_rate: u32,
    /// Sample rate of the uploaded file
    pub source_sample_rate: u32,
    pub duration_secs: f64,
    pub processing_ms: u64,
    pub original_wav_base64: String,
    pub enhanced_wav_base64: String,
}

/// Error body for rejected API requests
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

impl ErrorResponse {
    pub fn new(kind: &str, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind: kind.to_string(),
        }
    }
}

/// `GET /health` response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub model: String,
    pub timestamp: String,
}
