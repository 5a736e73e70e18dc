use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use speech_enhancer::audio::encode_wav;
use speech_enhancer::config::{Config, EnhancementBackend, SampleRatePolicy};
use speech_enhancer::{models, process_upload, web, SpeechEnhancer, UploadedFile};

/// Denoise speech recordings with a pretrained enhancement model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the JSON config file (default: ~/.speech-enhancer/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the web server with the upload page
    Serve {
        /// Address to listen on, e.g. 127.0.0.1:8501
        #[arg(short, long)]
        bind: Option<String>,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Enhance one WAV file and write the result
    Enhance {
        /// Input WAV file
        input: PathBuf,

        /// Where to write the enhanced 16kHz WAV file
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Write a config file holding the current settings
    InitConfig {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug)]
struct ModelArgs {
    /// Path to the GTCRN model file (.onnx)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Enhancement backend: "gtcrn" or "spectral-mask"
    #[arg(long)]
    backend: Option<EnhancementBackend>,

    /// Sample rate handling: "resample" or "reject"
    #[arg(long)]
    policy: Option<SampleRatePolicy>,

    /// Number of threads for model inference
    #[arg(long)]
    threads: Option<i32>,
}

impl ModelArgs {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.model {
            config.model_path = Some(path);
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(policy) = self.policy {
            config.sample_rate_policy = policy;
        }
        if let Some(threads) = self.threads {
            config.n_threads = threads;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    let mut config = Config::load_or_default(&config_path);

    match args.command {
        Command::Serve { bind, model } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            model.apply(&mut config);

            let enhancer = load_enhancer(&config).await?;
            web::start_server(&config, enhancer).await
        }
        Command::Enhance {
            input,
            output,
            model,
        } => {
            model.apply(&mut config);

            let enhancer = load_enhancer(&config).await?;
            tokio::task::spawn_blocking(move || enhance_file(&input, &output, enhancer, &config))
                .await?
        }
        Command::InitConfig { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?} (use --force to overwrite)",
                    config_path
                );
            }
            config.save(&config_path)?;
            info!("Wrote config to {:?}", config_path);
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

/// Load the configured model off the async runtime
async fn load_enhancer(config: &Config) -> Result<SpeechEnhancer> {
    info!("Speech enhancer starting...");
    info!("Backend: {:?}", config.backend);
    info!("Sample rate policy: {:?}", config.sample_rate_policy);

    if config.backend == EnhancementBackend::Gtcrn && config.model_path.is_none() {
        if models::is_enhancement_model_available() {
            info!("Using cached GTCRN model");
        } else if config.auto_download {
            info!("GTCRN model not found locally, it will be downloaded");
        } else {
            warn!("GTCRN model not found and auto_download is disabled");
        }
    }

    let config = config.clone();
    let enhancer = tokio::task::spawn_blocking(move || SpeechEnhancer::from_config(&config))
        .await?
        .map_err(|e| {
            error!("Failed to load enhancement model: {:#}", e);
            e
        })?;

    info!("Model loaded successfully");
    Ok(enhancer)
}

fn enhance_file(
    input: &Path,
    output: &Path,
    mut enhancer: SpeechEnhancer,
    config: &Config,
) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("Failed to read {:?}", input))?;
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let upload = UploadedFile::new(filename, bytes);
    let result = process_upload(&upload, &mut enhancer, config.sample_rate_policy)?;

    let wav = encode_wav(&result.enhanced)?;
    std::fs::write(output, wav).with_context(|| format!("Failed to write {:?}", output))?;

    println!(
        "Enhanced {:.2}s of audio ({} Hz input) in {} ms -> {}",
        result.original.duration_secs(),
        result.source_sample_rate,
        result.processing_ms,
        output.display()
    );
    Ok(())
}
