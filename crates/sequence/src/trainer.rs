//! Sequence model training loop.

use crate::amp::{compute_dtype, GradScaler};
use crate::checkpoint::BestCheckpoint;
use crate::dataset::WindowDataset;
use crate::error::{Error, Result};
use crate::loader::BatchLoader;
use crate::model::{LstmCnn, ModelConfig};
use crate::scalars::ScalarWriter;
use crate::schedule::OneCycleLr;
use candle_core::{DType, Device, Module};
use candle_nn::{loss, AdamW, Optimizer, ParamsAdamW, VarMap};
use rand::Rng;
use std::path::PathBuf;
use ticklab_core::{FeatureFrame, TrainConfig};
use tracing::{debug, info};

/// Tag of the per-epoch training loss in the scalar log.
pub const LOSS_TAG: &str = "train/loss";

/// Outcome of a training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    /// Where the best weights were written.
    pub checkpoint_path: PathBuf,
    /// Lowest mean epoch loss.
    pub best_loss: f64,
    /// Epoch that reached it.
    pub best_epoch: usize,
    /// Mean loss of every epoch.
    pub epoch_losses: Vec<f64>,
    /// Optimizer steps skipped by the loss scaler.
    pub skipped_steps: usize,
}

/// Resolve a device name: `cpu`, `cuda`, `cuda:N` or `metal`.
pub fn parse_device(name: &str) -> Result<Device> {
    let name = name.trim().to_ascii_lowercase();
    match name.as_str() {
        "cpu" => Ok(Device::Cpu),
        "cuda" | "gpu" => Ok(Device::new_cuda(0)?),
        "metal" => Ok(Device::new_metal(0)?),
        other => match other.strip_prefix("cuda:").map(str::parse::<usize>) {
            Some(Ok(ordinal)) => Ok(Device::new_cuda(ordinal)?),
            _ => Err(Error::config(format!("unknown device: {}", other))),
        },
    }
}

/// Train the LSTM/CNN regressor on `frame` and keep the best checkpoint.
///
/// `config.features` selects the input columns; the first one is also the
/// prediction target. `rng` drives batch shuffling.
pub fn train<R: Rng + ?Sized>(
    config: &TrainConfig,
    frame: &FeatureFrame,
    rng: &mut R,
) -> Result<TrainReport> {
    config.validate()?;
    let dataset = WindowDataset::from_frame(frame, config.features.as_slice(), config.window)?;
    train_dataset(config, &dataset, rng)
}

/// Train on a prepared dataset.
pub fn train_dataset<R: Rng + ?Sized>(
    config: &TrainConfig,
    dataset: &WindowDataset,
    rng: &mut R,
) -> Result<TrainReport> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(Error::insufficient_data(format!(
            "window {} leaves no training samples",
            dataset.window()
        )));
    }

    let device = parse_device(&config.device)?;
    let loader = BatchLoader::new(dataset, config.batch_size)?;
    let batches_per_epoch = loader.num_batches();

    let varmap = VarMap::new();
    let model_config = ModelConfig {
        input_dim: dataset.n_features(),
        hidden_dim: config.hidden_dim,
        num_layers: config.num_layers,
        kernel_size: config.kernel_size,
    };
    let model = LstmCnn::with_compute_dtype(&model_config, &varmap, &device, compute_dtype(&device))?;
    let vars = varmap.all_vars();

    let params = ParamsAdamW {
        lr: config.lr,
        ..Default::default()
    };
    let mut optimizer = AdamW::new(vars.clone(), params)?;
    let mut schedule = OneCycleLr::new(config.lr, config.epochs, batches_per_epoch)?;
    schedule.apply(&mut optimizer);
    let mut scaler = GradScaler::for_device(&device);
    let mut writer = ScalarWriter::create(&config.log_dir)?;

    info!(
        "Training on {:?} ({:?}): {} samples, {} batches/epoch, {} epochs",
        device,
        model.compute_dtype(),
        dataset.len(),
        batches_per_epoch,
        config.epochs
    );

    let mut best = BestCheckpoint::new(&config.checkpoint_path);
    let mut epoch_losses = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        let mut total_loss = 0.0;
        for indices in loader.epoch(rng) {
            let (x, y) = dataset.batch(&indices, &device)?;
            let preds = model.forward(&x)?;
            let batch_loss = loss::mse(&preds, &y)?;

            scaler.step(&mut optimizer, &batch_loss, &vars)?;
            schedule.step()?;
            schedule.apply(&mut optimizer);

            total_loss += batch_loss.to_dtype(DType::F64)?.to_scalar::<f64>()?;
        }

        let avg_loss = total_loss / batches_per_epoch as f64;
        writer.add_scalar(LOSS_TAG, avg_loss, epoch)?;
        epoch_losses.push(avg_loss);
        debug!("Epoch {} lr={:.3e} loss={:.6e}", epoch, optimizer.learning_rate(), avg_loss);

        if best.observe(epoch, avg_loss, &varmap)? {
            info!("Epoch {}: new best loss {:.6e}, checkpoint saved", epoch, avg_loss);
        }
    }

    let best_loss = best.best_loss();
    let best_epoch = best.best_epoch().ok_or_else(|| Error::data("training produced no finite epoch loss"))?;
    info!(
        "Training done: best loss {:.6e} at epoch {}, {} skipped steps",
        best_loss,
        best_epoch,
        scaler.skipped_steps()
    );

    Ok(TrainReport {
        checkpoint_path: config.checkpoint_path.clone(),
        best_loss,
        best_epoch,
        epoch_losses,
        skipped_steps: scaler.skipped_steps(),
    })
}
