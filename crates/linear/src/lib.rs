//! Linear baseline for the ticklab pipeline.
//!
//! This crate handles:
//! - Chronological train/test splitting
//! - Feature standardization
//! - Closed-form ridge regression
//! - Regression and ranking metrics on the held-out split

pub mod evaluate;
pub mod ridge;
pub mod scaler;
pub mod split;
pub mod trainer;

pub use evaluate::{evaluate, evaluate_predictions, roc_auc, EvaluationReport};
pub use ridge::Ridge;
pub use scaler::StandardScaler;
pub use split::{chronological_split, split_index};
pub use trainer::{train_ridge, train_ridge_with_config, RidgeBundle};
