//! Prediction targets appended to a feature frame.

use ndarray::Array1;
use ticklab_core::{Error, FeatureFrame, Result};
use tracing::debug;

/// Column the forward return is computed from.
pub const PRICE_COLUMN: &str = "mid_price";

/// Append `mid_price[t + horizon] / mid_price[t] - 1` as `name`.
///
/// The last `horizon` rows have no future price and are dropped, as are rows
/// where the ratio is not finite.
pub fn add_forward_return(frame: &FeatureFrame, horizon: usize, name: &str) -> Result<FeatureFrame> {
    if horizon == 0 {
        return Err(Error::config("forward return horizon must be at least 1"));
    }
    let price = frame.column(PRICE_COLUMN)?;
    let n = frame.len().saturating_sub(horizon);

    let target: Vec<f64> = (0..n)
        .map(|t| price[t + horizon] / price[t] - 1.0)
        .collect();
    let keep: Vec<usize> = (0..n).filter(|&t| target[t].is_finite()).collect();

    let head = frame.slice_rows(0..n).with_column(name, Array1::from(target))?;
    debug!("Forward return over {} rows kept {} of {}", horizon, keep.len(), frame.len());
    if keep.len() == n {
        Ok(head)
    } else {
        Ok(head.take_rows(&keep))
    }
}

/// Append a 0/1 label: `1.0` where `source` is positive, else `0.0`.
pub fn add_direction_label(frame: &FeatureFrame, source: &str, name: &str) -> Result<FeatureFrame> {
    let label = frame
        .column(source)?
        .mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
    frame.with_column(name, label)
}
