//! Animal Classifier Server
//!
//! HTTP API exposing single-image classification. The model and its labels are loaded
//! once at startup; if either fails to load, the server exits without listening.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use animal_classifier::backend::backend_name;
use animal_classifier::utils::logging::{init_logging, LogConfig, LogLevel};
use animal_classifier::Classifier;
use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use crate::state::{AppState, ServerConfig, DEFAULT_MAX_UPLOAD_BYTES};

/// Animal Classifier Server
#[derive(Parser, Debug)]
#[command(name = "animal-classifier-server")]
#[command(version)]
#[command(about = "HTTP API for image classification")]
struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "ANIMAL_CLASSIFIER_PORT", default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, env = "ANIMAL_CLASSIFIER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Model artifact (.mpk Burn record or .onnx export)
    #[arg(long, env = "ANIMAL_CLASSIFIER_MODEL", default_value = "model/tl_model.mpk")]
    model: PathBuf,

    /// Labels file, one class per line in model output order
    #[arg(long, env = "ANIMAL_CLASSIFIER_LABELS", default_value = "model/labels.txt")]
    labels: PathBuf,

    /// Derive labels from the sorted sub-directories of a dataset instead
    #[arg(long, env = "ANIMAL_CLASSIFIER_DATASET_DIR")]
    dataset_dir: Option<PathBuf>,

    /// Apply softmax to ONNX outputs (for exports ending in logits)
    #[arg(long, default_value = "false")]
    onnx_logits: bool,

    /// Maximum upload size in bytes
    #[arg(long, env = "ANIMAL_CLASSIFIER_MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, env = "ANIMAL_CLASSIFIER_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::production()
    };
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(LogLevel::parse(level));
    }
    init_logging(&log_config).map_err(anyhow::Error::msg)?;

    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cli.host, cli.port))?;

    let config = ServerConfig {
        addr,
        model_path: cli.model,
        labels_path: cli.labels,
        dataset_dir: cli.dataset_dir,
        onnx_logits: cli.onnx_logits,
        max_upload_bytes: cli.max_upload_bytes,
    };

    info!("Animal Classifier Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Model:       {:?}", config.model_path);
    match &config.dataset_dir {
        Some(dir) => info!("  Dataset dir: {:?}", dir),
        None => info!("  Labels:      {:?}", config.labels_path),
    }
    info!("  Backend:     {}", backend_name());
    info!("  Max upload:  {} bytes", config.max_upload_bytes);
    info!("  Log level:   {}", log_config.level);

    let classifier = match Classifier::load(&config.classifier_settings()) {
        Ok(classifier) => classifier,
        Err(e) if e.is_startup_failure() => {
            error!("Startup failed: {}", e);
            error!("Check the model and labels paths; the server will not start");
            return Err(e.into());
        }
        Err(e) => {
            error!("Unexpected error while loading the classifier: {}", e);
            return Err(e.into());
        }
    };

    // Create shared state
    let state = Arc::new(AppState::new(config, classifier));
    let app = routes::router(state);

    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
