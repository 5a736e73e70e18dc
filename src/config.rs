use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,

    /// Address the web server listens on
    pub bind_addr: String,

    pub backend: EnhancementBackend,
    /// Explicit GTCRN model path; defaults to the models directory
    pub model_path: Option<PathBuf>,
    /// Download the GTCRN model on startup when it is missing
    pub auto_download: bool,
    /// Number of threads for ONNX inference
    pub n_threads: i32,

    /// Largest accepted upload body, in bytes
    pub max_upload_bytes: usize,
    pub sample_rate_policy: SampleRatePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            bind_addr: "127.0.0.1:8501".to_string(),
            backend: EnhancementBackend::Gtcrn,
            model_path: None,
            auto_download: true,
            n_threads: 1,
            max_upload_bytes: 200 * 1024 * 1024,
            sample_rate_policy: SampleRatePolicy::Resample,
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            serde_json::from_str(&content).context("Failed to parse config file")
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from file, falling back to defaults on any error
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                debug!("Failed to load config, using default: {}", e);
                Self::default()
            }
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".speech-enhancer"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Get the default models directory
    pub fn default_models_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("models"))
    }

    /// Get the GTCRN model file path
    pub fn get_model_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.model_path {
            Ok(path.clone())
        } else {
            Ok(Self::default_models_dir()?.join(crate::models::ENHANCEMENT_MODEL_FILENAME))
        }
    }
}

/// Which enhancement model to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnhancementBackend {
    /// Pretrained GTCRN ONNX model
    #[default]
    Gtcrn,
    /// Built-in STFT spectral mask, no model file needed
    SpectralMask,
}

impl std::str::FromStr for EnhancementBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gtcrn" => Ok(Self::Gtcrn),
            "spectral-mask" | "spectral_mask" => Ok(Self::SpectralMask),
            _ => Err(format!("Unknown enhancement backend: {}", s)),
        }
    }
}

/// What to do with uploads whose sample rate is not 16kHz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleRatePolicy {
    /// Resample to 16kHz before enhancement
    #[default]
    Resample,
    /// Report an error to the user
    Reject,
}

impl std::str::FromStr for SampleRatePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "resample" => Ok(Self::Resample),
            "reject" => Ok(Self::Reject),
            _ => Err(format!("Unknown sample rate policy: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.backend, EnhancementBackend::Gtcrn);
        assert_eq!(config.sample_rate_policy, SampleRatePolicy::Resample);
        assert_eq!(config.n_threads, 1);
        assert!(config.auto_download);
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("gtcrn".parse::<EnhancementBackend>().unwrap(), EnhancementBackend::Gtcrn);
        assert_eq!(
            "Spectral-Mask".parse::<EnhancementBackend>().unwrap(),
            EnhancementBackend::SpectralMask
        );
        assert!("metricgan".parse::<EnhancementBackend>().is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("REJECT".parse::<SampleRatePolicy>().unwrap(), SampleRatePolicy::Reject);
        assert!("drop".parse::<SampleRatePolicy>().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let config = Config {
            bind_addr: "0.0.0.0:9000".to_string(),
            backend: EnhancementBackend::SpectralMask,
            sample_rate_policy: SampleRatePolicy::Reject,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.bind_addr, "0.0.0.0:9000");
        assert_eq!(loaded.backend, EnhancementBackend::SpectralMask);
        assert_eq!(loaded.sample_rate_policy, SampleRatePolicy::Reject);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"backend": "spectral-mask"}"#).unwrap();
        assert_eq!(config.backend, EnhancementBackend::SpectralMask);
        assert_eq!(config.bind_addr, "127.0.0.1:8501");
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.schema_version, 1);
    }

    #[test]
    fn test_load_or_default_on_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let config = Config::load_or_default(&path);
        assert_eq!(config.backend, EnhancementBackend::Gtcrn);
    }

    #[test]
    fn test_explicit_model_path() {
        let config = Config {
            model_path: Some(PathBuf::from("/tmp/model.onnx")),
            ..Config::default()
        };
        assert_eq!(config.get_model_path().unwrap(), PathBuf::from("/tmp/model.onnx"));
    }
}
