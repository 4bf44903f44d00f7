//! Feature derivation for the ticklab pipeline.
//!
//! This crate handles:
//! - Rolling window statistics
//! - Price, flow and volatility features from bars
//! - Forward-return and direction targets

pub mod engine;
pub mod rolling;
pub mod targets;

pub use engine::FeatureEngine;
pub use rolling::RollingWindow;
pub use targets::{add_direction_label, add_forward_return};
