//! Enhancement model download and lookup.
//!
//! The GTCRN model is fetched from the sherpa-onnx release assets on first use
//! and cached under `~/.speech-enhancer/models`.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;

/// URL for the GTCRN speech enhancement model (~523KB)
const ENHANCEMENT_MODEL_URL: &str =
    "https://github.com/k2-fsa/sherpa-onnx/releases/download/speech-enhancement-models/gtcrn_simple.onnx";

/// File name of the GTCRN model inside the models directory
pub const ENHANCEMENT_MODEL_FILENAME: &str = "gtcrn_simple.onnx";

/// Errors that can occur during model operations
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to download model: {0}")]
    DownloadError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Failed to write model file: {0}")]
    WriteError(String),

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Download a file from URL to the specified path
fn download_file(url: &str, dest_path: &Path) -> Result<(), ModelError> {
    info!("Downloading from {} to {:?}", url, dest_path);

    if let Some(parent) = dest_path.parent() {
        fs::create_dir_all(parent).map_err(|e| ModelError::DirectoryError(e.to_string()))?;
    }

    let response = reqwest::blocking::Client::new()
        .get(url)
        .send()
        .map_err(|e| ModelError::NetworkError(e.to_string()))?;

    if !response.status().is_success() {
        return Err(ModelError::DownloadError(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let total_size = response.content_length();
    info!(
        "Download started, total size: {}",
        total_size
            .map(|s| format!("{:.1} KB", s as f64 / 1_000.0))
            .unwrap_or_else(|| "unknown".to_string())
    );

    // Download to a temporary file, then rename into place
    let temp_path = dest_path.with_extension("download");
    let mut file = File::create(&temp_path).map_err(|e| ModelError::WriteError(e.to_string()))?;

    let bytes = response
        .bytes()
        .map_err(|e| ModelError::NetworkError(e.to_string()))?;

    file.write_all(&bytes)
        .map_err(|e| ModelError::WriteError(e.to_string()))?;
    file.flush()
        .map_err(|e| ModelError::WriteError(e.to_string()))?;

    fs::rename(&temp_path, dest_path).map_err(|e| ModelError::WriteError(e.to_string()))?;

    info!("Download complete: {:?}", dest_path);
    Ok(())
}

/// Path of the enhancement model inside `models_dir`
pub fn enhancement_model_path(models_dir: &Path) -> PathBuf {
    models_dir.join(ENHANCEMENT_MODEL_FILENAME)
}

/// Download the enhancement model into `models_dir` if not already present
pub fn ensure_enhancement_model_in(models_dir: &Path) -> Result<PathBuf> {
    let model_path = enhancement_model_path(models_dir);

    if model_path.exists() {
        debug!("Enhancement model already exists: {:?}", model_path);
        return Ok(model_path);
    }

    info!("Downloading speech enhancement model...");
    download_file(ENHANCEMENT_MODEL_URL, &model_path)
        .context("Failed to download speech enhancement model")?;

    Ok(model_path)
}

/// Download the enhancement model into the default models directory if needed
pub fn ensure_enhancement_model() -> Result<PathBuf> {
    ensure_enhancement_model_in(&Config::default_models_dir()?)
}

/// Check if the enhancement model is available locally
pub fn is_enhancement_model_available() -> bool {
    Config::default_models_dir()
        .map(|dir| enhancement_model_path(&dir).exists())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_in_dir() {
        let path = enhancement_model_path(Path::new("/models"));
        assert_eq!(path, PathBuf::from("/models/gtcrn_simple.onnx"));
    }

    #[test]
    fn test_existing_model_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = enhancement_model_path(dir.path());
        std::fs::write(&path, b"onnx").unwrap();

        let resolved = ensure_enhancement_model_in(dir.path()).unwrap();
        assert_eq!(resolved, path);
        assert_eq!(std::fs::read(&resolved).unwrap(), b"onnx");
    }

    #[test]
    fn test_default_path_matches_config() {
        if let Ok(dir) = Config::default_models_dir() {
            let config = Config::default();
            assert_eq!(config.get_model_path().unwrap(), enhancement_model_path(&dir));
        }
    }
}
