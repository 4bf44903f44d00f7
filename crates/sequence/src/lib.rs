//! Sequence model training for the ticklab pipeline.
//!
//! This crate handles:
//! - Sliding-window datasets over feature rows
//! - Shuffled mini-batching
//! - The LSTM + convolution regressor
//! - One-cycle learning rate scheduling and dynamic loss scaling
//! - Checkpointing and the scalar training log

pub mod amp;
pub mod checkpoint;
pub mod dataset;
pub mod error;
pub mod loader;
pub mod model;
pub mod scalars;
pub mod schedule;
pub mod trainer;

pub use amp::{compute_dtype, GradScaler};
pub use checkpoint::{load_checkpoint, save_checkpoint, BestCheckpoint};
pub use dataset::WindowDataset;
pub use error::{Error, Result};
pub use loader::BatchLoader;
pub use model::{LstmCnn, ModelConfig};
pub use scalars::{read_events, ScalarEvent, ScalarWriter};
pub use schedule::OneCycleLr;
pub use trainer::{parse_device, train, train_dataset, TrainReport, LOSS_TAG};
