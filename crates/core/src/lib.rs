//! Core types and configuration for the ticklab pipeline.
//!
//! This crate provides shared types used across all other crates:
//! - Market data types (ticks, bars)
//! - The column-named feature table
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod frame;
pub mod types;

pub use config::{Config, TrainConfig};
pub use error::{Error, Result};
pub use frame::FeatureFrame;
pub use types::*;
