//! Animal Classifier CLI
//!
//! Offline companion to the HTTP server: classify images from disk, freeze a dataset
//! directory listing into a labels file, and write a freshly initialized model for smoke tests.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use tracing::{debug, info};

use animal_classifier::backend::{backend_name, default_device, DefaultBackend};
use animal_classifier::inference::{save_model, DEFAULT_TOP_K};
use animal_classifier::preprocess::{decode_image, preprocess_image};
use animal_classifier::utils::logging::{init_logging, LogConfig, LogLevel};
use animal_classifier::{
    AnimalClassifier, AnimalClassifierConfig, ClassRegistry, Classifier, ClassifierSettings,
    LabelSource,
};

/// Image classification with a pre-trained CNN
#[derive(Parser, Debug)]
#[command(name = "animal_classifier")]
#[command(version)]
#[command(about = "Classify images with a pre-trained convolutional network", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, env = "ANIMAL_CLASSIFIER_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Label source flags shared by several commands
#[derive(Args, Debug)]
struct LabelArgs {
    /// Labels file, one class per line in model output order
    #[arg(short, long, default_value = "model/labels.txt")]
    labels: PathBuf,

    /// Derive labels from the sorted sub-directories of a dataset instead
    #[arg(long, conflicts_with = "labels")]
    dataset_dir: Option<PathBuf>,
}

impl LabelArgs {
    fn source(&self) -> LabelSource {
        match &self.dataset_dir {
            Some(dir) => LabelSource::DatasetDir(dir.clone()),
            None => LabelSource::File(self.labels.clone()),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a single image or every image in a directory
    Predict {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the trained model (.mpk or .onnx)
        #[arg(short, long, default_value = "model/tl_model.mpk")]
        model: PathBuf,

        #[command(flatten)]
        labels: LabelArgs,

        /// Apply softmax to ONNX outputs (for exports ending in logits)
        #[arg(long, default_value = "false")]
        onnx_logits: bool,

        /// Number of alternatives to show
        #[arg(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },

    /// Write the class names of a dataset directory to a labels file
    Labels {
        /// Dataset root with one sub-directory per class
        #[arg(short, long)]
        dataset_dir: PathBuf,

        /// Output labels file
        #[arg(short, long, default_value = "model/labels.txt")]
        output: PathBuf,
    },

    /// Write a randomly initialized model sized to a labels file
    InitModel {
        /// Labels file the model must match
        #[arg(short, long, default_value = "model/labels.txt")]
        labels: PathBuf,

        /// Output weights path (the config is written next to it as .json)
        #[arg(short, long, default_value = "model/tl_model.mpk")]
        output: PathBuf,

        /// Base number of convolutional filters
        #[arg(long, default_value = "32")]
        base_filters: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config = log_config.with_level(LogLevel::parse(level));
    }
    let _ = init_logging(&log_config);
    debug!("Log level: {}", log_config.level);

    match cli.command {
        Commands::Predict {
            input,
            model,
            labels,
            onnx_logits,
            top_k,
        } => {
            let settings = ClassifierSettings::new(model, labels.source())
                .with_onnx_logits(onnx_logits);
            cmd_predict(&input, &settings, top_k)?;
        }

        Commands::Labels {
            dataset_dir,
            output,
        } => {
            cmd_labels(&dataset_dir, &output)?;
        }

        Commands::InitModel {
            labels,
            output,
            base_filters,
        } => {
            cmd_init_model(&labels, &output, base_filters)?;
        }
    }

    Ok(())
}

fn cmd_predict(input: &Path, settings: &ClassifierSettings, top_k: usize) -> Result<()> {
    info!("Running inference");
    info!("  Input: {:?}", input);
    info!("  Model: {:?}", settings.model_path);

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:   {}", input.display());
    println!("  Model:   {}", settings.model_path.display());
    println!("  Labels:  {}", settings.labels.path().display());
    println!("  Backend: {}", backend_name());
    println!();

    if !input.exists() {
        anyhow::bail!("Input path not found: {}", input.display());
    }

    println!("{}", "Loading model...".cyan());
    let classifier = Classifier::load(settings).context("Failed to load classifier")?;
    println!("  Engine:  {}", classifier.engine_name());
    println!("  Classes: {}", classifier.registry().len());
    println!();

    let files: Vec<PathBuf> = if input.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(input)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| {
                        ["jpg", "jpeg", "png", "bmp", "gif", "webp"]
                            .contains(&e.to_lowercase().as_str())
                    })
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    } else {
        vec![input.to_path_buf()]
    };

    for file_path in &files {
        let name = file_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let image = match std::fs::read(file_path)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| decode_image(&bytes).map_err(anyhow::Error::from))
        {
            Ok(image) => image,
            Err(e) => {
                println!("{} {}: {}", "Skipped".yellow(), name, e);
                continue;
            }
        };

        let start = Instant::now();
        let tensor = preprocess_image(&image);
        let scores = classifier.scores(&tensor)?;
        let prediction = classifier.prediction_for(&scores)?;
        let elapsed = start.elapsed();

        println!("{}", name.bold());
        println!("  Predicted:  {}", prediction.prediction.green());
        println!("  Confidence: {:.1}%", prediction.confidence * 100.0);
        println!("  Time:       {:.2} ms", elapsed.as_secs_f64() * 1000.0);
        if top_k > 1 {
            println!("  Top-{}:", top_k);
            for (rank, (idx, prob)) in scores.top_k(top_k).iter().enumerate() {
                let label = classifier.registry().get(*idx).unwrap_or("Unknown");
                println!("    {}. {} ({:.1}%)", rank + 1, label, prob * 100.0);
            }
        }
        println!();
    }

    Ok(())
}

fn cmd_labels(dataset_dir: &Path, output: &Path) -> Result<()> {
    let registry = ClassRegistry::from_dataset_dir(dataset_dir)
        .with_context(|| format!("Failed to read classes from {}", dataset_dir.display()))?;
    registry.write_labels_file(output)?;

    println!(
        "{} Wrote {} labels to {}",
        "Done:".green(),
        registry.len(),
        output.display()
    );
    for (idx, name) in registry.names().iter().enumerate() {
        println!("  {:>3}  {}", idx, name);
    }

    Ok(())
}

fn cmd_init_model(labels: &Path, output: &Path, base_filters: usize) -> Result<()> {
    let registry = ClassRegistry::from_labels_file(labels)?;
    let config = AnimalClassifierConfig::new(registry.len()).with_base_filters(base_filters);

    let device = default_device();
    let model: AnimalClassifier<DefaultBackend> = config.init(&device);
    save_model(model, &config, output)?;

    println!(
        "{} Initialized untrained model for {} classes at {}",
        "Done:".green(),
        registry.len(),
        output.display()
    );
    println!(
        "{} Predictions from this model are meaningless until real weights replace it.",
        "Note:".yellow()
    );

    Ok(())
}
