//! Data ingestion for the ticklab pipeline.
//!
//! This crate handles:
//! - Tick file loading (Parquet and CSV) with timestamp sorting
//! - Tick and feature table writing
//! - Fixed-width OHLCV resampling
//! - Synthetic tick generation

pub mod reader;
pub mod resample;
pub mod synthetic;
pub mod writer;

pub use reader::{load_ticks, parse_timestamp, TickFormat};
pub use resample::Resampler;
pub use synthetic::{generate_ticks, SyntheticConfig};
pub use writer::{write_frame_csv, write_ticks};
