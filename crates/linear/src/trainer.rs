//! Ridge training on a feature frame.

use crate::ridge::Ridge;
use crate::scaler::StandardScaler;
use crate::split::split_index;
use ndarray::{s, Array1, Array2};
use ticklab_core::config::RidgeConfig;
use ticklab_core::{Error, FeatureFrame, Result, TimestampMs};
use tracing::info;

/// Everything needed to evaluate or reuse a fitted ridge model.
#[derive(Debug, Clone)]
pub struct RidgeBundle {
    /// Fitted model on standardized features.
    pub model: Ridge,
    /// Scaler fitted on the training rows.
    pub scaler: StandardScaler,
    /// Standardized test features.
    pub x_test: Array2<f64>,
    /// Raw test targets.
    pub y_test: Array1<f64>,
    /// Timestamps of the training rows.
    pub train_index: Vec<TimestampMs>,
    /// Timestamps of the test rows.
    pub test_index: Vec<TimestampMs>,
    /// Feature columns in model order.
    pub feature_names: Vec<String>,
}

impl RidgeBundle {
    /// Model predictions for the test rows.
    pub fn predict_test(&self) -> Result<Array1<f64>> {
        self.model.predict(self.x_test.view())
    }
}

/// Train ridge on every column except `target`.
///
/// Rows keep their order: the first 80% train the scaler and the model, the
/// remaining rows are held out for evaluation.
pub fn train_ridge(frame: &FeatureFrame, target: &str, alpha: f64) -> Result<RidgeBundle> {
    if !(alpha >= 0.0) {
        return Err(Error::config(format!("ridge alpha must be >= 0, got {}", alpha)));
    }
    let (features, y) = frame.drop_column(target)?;

    let cut = split_index(features.len());
    if cut == 0 || cut == features.len() {
        return Err(Error::insufficient_data(format!(
            "{} rows leave an empty train or test split",
            features.len()
        )));
    }
    let (train, test) = features.split_at(cut);
    let y_train = y.slice(s![..cut]);
    let y_test = y.slice(s![cut..]).to_owned();

    let (scaler, x_train) = StandardScaler::fit_transform(train.values())?;
    let x_test = scaler.transform(test.values())?;
    let model = Ridge::fit(x_train.view(), y_train, alpha)?;

    info!(
        "Trained ridge (alpha={}) on {} rows x {} features, {} held out",
        alpha,
        train.len(),
        features.width(),
        test.len()
    );

    Ok(RidgeBundle {
        model,
        scaler,
        x_test,
        y_test,
        train_index: train.index().to_vec(),
        test_index: test.index().to_vec(),
        feature_names: features.columns().to_vec(),
    })
}

/// Train ridge with the target column and penalty from configuration.
pub fn train_ridge_with_config(frame: &FeatureFrame, config: &RidgeConfig) -> Result<RidgeBundle> {
    train_ridge(frame, &config.target, config.alpha)
}
