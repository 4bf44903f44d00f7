//! ticklab command-line interface.
//!
//! Wires the pipeline stages together:
//!
//! ```bash
//! # Simulate a session of ticks
//! ticklab generate --output ticks.parquet --seed 42
//!
//! # Bars and features as CSV
//! ticklab features --input ticks.parquet --output features.csv --window 20
//!
//! # Ridge baseline on a forward-return target
//! ticklab ridge --input ticks.parquet --alpha 1.0
//!
//! # LSTM/CNN sequence model
//! ticklab train --input ticks.parquet --train-config train.json
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use ticklab_core::{Config, FeatureFrame, TrainConfig};
use ticklab_features::{add_direction_label, add_forward_return, FeatureEngine};
use ticklab_ingestion::{generate_ticks, load_ticks, write_frame_csv, write_ticks, Resampler, SyntheticConfig};
use tracing::info;

/// Column name of the 0/1 label built by `ridge --direction`.
pub const DIRECTION_COLUMN: &str = "direction";

/// Tick-to-model research pipeline.
#[derive(Parser, Debug)]
#[command(name = "ticklab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a synthetic tick file
    Generate(GenerateCommand),

    /// Resample ticks and write the feature table as CSV
    Features(FeaturesCommand),

    /// Fit and evaluate the ridge baseline
    Ridge(RidgeCommand),

    /// Train the LSTM/CNN sequence model
    Train(TrainCommand),
}

impl Commands {
    /// Run the selected command.
    pub fn run(self) -> Result<()> {
        match self {
            Commands::Generate(cmd) => cmd.run(),
            Commands::Features(cmd) => cmd.run(),
            Commands::Ridge(cmd) => cmd.run(),
            Commands::Train(cmd) => cmd.run(),
        }
    }
}

/// Options shared by every command that reads ticks.
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Tick file (.parquet or .csv)
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Pipeline configuration (JSON); missing sections use defaults
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Bar width in milliseconds
    #[arg(long)]
    pub bucket_ms: Option<i64>,

    /// Rolling window in bars
    #[arg(long)]
    pub window: Option<usize>,

    /// Keep close-of-bucket book sizes and derive imbalance
    #[arg(long)]
    pub book_snapshot: bool,
}

impl PipelineArgs {
    /// Load the configuration file (if any) and apply command-line overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_json_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        if let Some(bucket_ms) = self.bucket_ms {
            config.resample.bucket_ms = bucket_ms;
        }
        if let Some(window) = self.window {
            config.features.window = window;
        }
        if self.book_snapshot {
            config.resample.book_snapshot = true;
        }
        Ok(config)
    }
}

/// Ticks -> bars -> features.
pub fn build_features(input: &Path, config: &Config) -> Result<FeatureFrame> {
    let ticks = load_ticks(input).with_context(|| format!("failed to load {}", input.display()))?;
    let bars = Resampler::new(config.resample.bucket_ms)?
        .with_book_snapshot(config.resample.book_snapshot)
        .resample_ticks(&ticks)?;
    info!("Built {} bars of {} ms", bars.len(), config.resample.bucket_ms);
    let frame = FeatureEngine::from_config(&config.features)?.compute_features(&bars)?;
    info!("Derived {} feature rows x {} columns", frame.len(), frame.width());
    Ok(frame)
}

/// Write a synthetic tick file
#[derive(Args, Debug, Clone)]
pub struct GenerateCommand {
    /// Output path (.parquet or .csv)
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Session start
    #[arg(long, default_value = "2021-01-01 09:30:00")]
    pub start: String,

    /// Session end
    #[arg(long, default_value = "2021-01-01 16:00:00")]
    pub end: String,

    /// Average ticks per second
    #[arg(long, default_value = "1.0")]
    pub rate: f64,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl GenerateCommand {
    pub fn run(&self) -> Result<()> {
        let config = SyntheticConfig::session(&self.start, &self.end, self.rate)?;
        let ticks = generate_ticks(&config, &mut StdRng::seed_from_u64(self.seed))?;
        write_ticks(&self.output, &ticks)
            .with_context(|| format!("failed to write {}", self.output.display()))?;
        Ok(())
    }
}

/// Resample ticks and write the feature table as CSV
#[derive(Args, Debug, Clone)]
pub struct FeaturesCommand {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Output CSV path
    #[arg(long, short = 'o')]
    pub output: PathBuf,
}

impl FeaturesCommand {
    pub fn run(&self) -> Result<()> {
        let config = self.pipeline.load_config()?;
        let frame = build_features(&self.pipeline.input, &config)?;
        write_frame_csv(&self.output, &frame)?;
        Ok(())
    }
}

/// Fit and evaluate the ridge baseline
#[derive(Args, Debug, Clone)]
pub struct RidgeCommand {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// L2 penalty
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Forward-return horizon in bars
    #[arg(long)]
    pub horizon: Option<usize>,

    /// Fit the sign of the forward return (0/1) instead of its value
    #[arg(long)]
    pub direction: bool,
}

impl RidgeCommand {
    pub fn run(&self) -> Result<()> {
        let mut config = self.pipeline.load_config()?;
        if let Some(alpha) = self.alpha {
            config.ridge.alpha = alpha;
        }
        if let Some(horizon) = self.horizon {
            config.ridge.horizon = horizon;
        }

        let frame = build_features(&self.pipeline.input, &config)?;
        let frame = add_forward_return(&frame, config.ridge.horizon, &config.ridge.target)?;
        let (frame, target) = if self.direction {
            let labelled = add_direction_label(&frame, &config.ridge.target, DIRECTION_COLUMN)?;
            let (without_return, _) = labelled.drop_column(&config.ridge.target)?;
            (without_return, DIRECTION_COLUMN)
        } else {
            (frame, config.ridge.target.as_str())
        };

        let bundle = ticklab_linear::train_ridge(&frame, target, config.ridge.alpha)?;
        let report = ticklab_linear::evaluate(&bundle)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

/// Train the LSTM/CNN sequence model
#[derive(Args, Debug, Clone)]
pub struct TrainCommand {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Training configuration (flat JSON object)
    #[arg(long, short = 't')]
    pub train_config: PathBuf,
}

impl TrainCommand {
    pub fn run(&self) -> Result<()> {
        let config = self.pipeline.load_config()?;
        let train_config = TrainConfig::from_json_file(&self.train_config)
            .with_context(|| format!("failed to load {}", self.train_config.display()))?;

        // The forward return is available as a column, typically listed first.
        let frame = build_features(&self.pipeline.input, &config)?;
        let frame = add_forward_return(&frame, config.ridge.horizon, &config.ridge.target)?;

        let mut rng = match train_config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let report = ticklab_sequence::train(&train_config, &frame, &mut rng)?;
        println!(
            "best loss {:.6e} at epoch {} -> {}",
            report.best_loss,
            report.best_epoch,
            report.checkpoint_path.display()
        );
        Ok(())
    }
}
