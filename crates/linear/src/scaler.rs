//! Per-column standardization.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use ticklab_core::{Error, Result};

/// Centers each column on its mean and divides by its population std.
///
/// Columns with zero variance keep a scale of 1 so they map to 0 instead
/// of NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Per-column mean.
    pub mean: Array1<f64>,
    /// Per-column divisor.
    pub scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn column means and scales.
    pub fn fit(x: ArrayView2<'_, f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(Error::insufficient_data("cannot fit a scaler on zero rows"));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::insufficient_data("cannot fit a scaler on zero rows"))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s == 0.0 || !s.is_finite() { 1.0 } else { s });
        Ok(Self { mean, scale })
    }

    /// Number of columns the scaler was fitted on.
    pub fn width(&self) -> usize {
        self.mean.len()
    }

    /// Standardize a matrix with the learned parameters.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.width() {
            return Err(Error::data(format!(
                "scaler fitted on {} columns, got {}",
                self.width(),
                x.ncols()
            )));
        }
        Ok((&x - &self.mean) / &self.scale)
    }

    /// Fit on `x` and return the standardized matrix.
    pub fn fit_transform(x: ArrayView2<'_, f64>) -> Result<(Self, Array2<f64>)> {
        let scaler = Self::fit(x)?;
        let scaled = scaler.transform(x)?;
        Ok((scaler, scaled))
    }
}
