//! Configuration structures for the ticklab pipeline.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Pipeline configuration for the bar and ridge stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Resampling configuration.
    pub resample: ResampleConfig,
    /// Feature derivation configuration.
    pub features: FeatureConfig,
    /// Ridge regression configuration.
    pub ridge: RidgeConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing sections use defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Resampling configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    /// Bucket width in milliseconds.
    pub bucket_ms: i64,
    /// Record close-of-bucket bid/ask sizes in each bar.
    pub book_snapshot: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            bucket_ms: 1_000,
            book_snapshot: false,
        }
    }
}

/// Feature derivation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Rolling window length in bars.
    pub window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { window: 20 }
    }
}

/// Ridge regression configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RidgeConfig {
    /// L2 regularization strength.
    pub alpha: f64,
    /// Target column name.
    pub target: String,
    /// Forward-return horizon in bars used to build the target.
    pub horizon: usize,
}

impl Default for RidgeConfig {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            target: "future_return".to_string(),
            horizon: 1,
        }
    }
}

/// Sequence model training configuration.
///
/// Built from a flat key/value map. Required keys: `features`, `window`,
/// `batch_size`, `epochs`, `lr`, `device`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Ordered feature column names. The first one is the prediction target.
    pub features: Vec<String>,
    /// Sequence window length.
    pub window: usize,
    /// Mini-batch size.
    pub batch_size: usize,
    /// Number of epochs.
    pub epochs: usize,
    /// Peak learning rate.
    pub lr: f64,
    /// Device name: "cpu", "cuda", "cuda:N" or "metal".
    pub device: String,
    /// LSTM hidden size.
    pub hidden_dim: usize,
    /// Directory for the scalar log.
    pub log_dir: PathBuf,
    /// Number of stacked LSTM layers.
    pub num_layers: usize,
    /// Convolution kernel size.
    pub kernel_size: usize,
    /// Best checkpoint path.
    pub checkpoint_path: PathBuf,
    /// Seed for batch shuffling.
    pub seed: Option<u64>,
}

impl TrainConfig {
    pub const DEFAULT_HIDDEN_DIM: usize = 64;
    pub const DEFAULT_LOG_DIR: &'static str = "runs/experiment";
    pub const DEFAULT_CHECKPOINT: &'static str = "best_model.safetensors";

    /// Parse a JSON object string.
    pub fn from_json_str(text: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(map) => Self::from_map(&map),
            _ => Err(Error::config("training config must be a JSON object")),
        }
    }

    /// Parse a JSON file holding a flat object.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Build from a flat key/value map.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let features = match required(map, "features")? {
            Value::Array(items) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| Error::config("features must be a list of column names"))
                })
                .collect::<Result<Vec<_>>>()?,
            _ => return Err(Error::config("features must be a list of column names")),
        };

        let config = Self {
            features,
            window: as_usize(map, "window")?,
            batch_size: as_usize(map, "batch_size")?,
            epochs: as_usize(map, "epochs")?,
            lr: as_f64(map, "lr")?,
            device: as_string(map, "device")?,
            hidden_dim: optional(map, "hidden_dim", as_usize)?.unwrap_or(Self::DEFAULT_HIDDEN_DIM),
            log_dir: optional(map, "log_dir", as_string)?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_LOG_DIR)),
            num_layers: optional(map, "num_layers", as_usize)?.unwrap_or(1),
            kernel_size: optional(map, "kernel_size", as_usize)?.unwrap_or(3),
            checkpoint_path: optional(map, "checkpoint_path", as_string)?
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CHECKPOINT)),
            seed: optional(map, "seed", as_u64)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(Error::config("features must name at least one column"));
        }
        for (key, value) in [
            ("window", self.window),
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("hidden_dim", self.hidden_dim),
            ("num_layers", self.num_layers),
            ("kernel_size", self.kernel_size),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{} must be positive", key)));
            }
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(Error::config(format!("lr must be positive, got {}", self.lr)));
        }
        Ok(())
    }
}

fn required<'a>(map: &'a Map<String, Value>, key: &str) -> Result<&'a Value> {
    map.get(key).ok_or_else(|| Error::missing_config(key))
}

fn optional<T>(
    map: &Map<String, Value>,
    key: &str,
    parse: fn(&Map<String, Value>, &str) -> Result<T>,
) -> Result<Option<T>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => parse(map, key).map(Some),
    }
}

fn as_u64(map: &Map<String, Value>, key: &str) -> Result<u64> {
    required(map, key)?
        .as_u64()
        .ok_or_else(|| Error::config(format!("{} must be a non-negative integer", key)))
}

fn as_usize(map: &Map<String, Value>, key: &str) -> Result<usize> {
    let value = as_u64(map, key)?;
    usize::try_from(value).map_err(|_| Error::config(format!("{} is too large", key)))
}

fn as_f64(map: &Map<String, Value>, key: &str) -> Result<f64> {
    required(map, key)?
        .as_f64()
        .ok_or_else(|| Error::config(format!("{} must be a number", key)))
}

fn as_string(map: &Map<String, Value>, key: &str) -> Result<String> {
    required(map, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| Error::config(format!("{} must be a string", key)))
}
