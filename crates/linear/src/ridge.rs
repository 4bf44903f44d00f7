//! Closed-form ridge regression.
//!
//! Solves `(Xc'Xc + alpha * I) w = Xc'yc` on centered data, so the intercept
//! is never penalized. Cholesky is tried first; LU covers matrices that are
//! not numerically positive definite.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use ticklab_core::{Error, Result};

/// Fitted ridge regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ridge {
    /// L2 penalty used for the fit.
    pub alpha: f64,
    /// One weight per feature column.
    pub coef: Array1<f64>,
    /// Unpenalized intercept.
    pub intercept: f64,
}

impl Ridge {
    /// Fit on `x` (samples x features) against `y`.
    pub fn fit(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, alpha: f64) -> Result<Self> {
        if !(alpha >= 0.0) {
            return Err(Error::config(format!("ridge alpha must be >= 0, got {}", alpha)));
        }
        let (n, p) = x.dim();
        if n == 0 {
            return Err(Error::insufficient_data("cannot fit ridge on zero rows"));
        }
        if y.len() != n {
            return Err(Error::data(format!("{} targets for {} rows", y.len(), n)));
        }

        let y_mean = y.sum() / n as f64;
        let x_mean = x
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(p));
        if p == 0 {
            return Ok(Self {
                alpha,
                coef: Array1::zeros(0),
                intercept: y_mean,
            });
        }

        let xc = DMatrix::from_fn(n, p, |i, j| x[[i, j]] - x_mean[j]);
        let yc = DVector::from_fn(n, |i, _| y[i] - y_mean);

        let xt = xc.transpose();
        let gram = &xt * &xc + DMatrix::identity(p, p) * alpha;
        let rhs = &xt * yc;

        let weights = match gram.clone().cholesky() {
            Some(chol) => chol.solve(&rhs),
            None => gram
                .lu()
                .solve(&rhs)
                .ok_or_else(|| Error::data("ridge system is singular; increase alpha"))?,
        };

        let coef = Array1::from_iter(weights.iter().copied());
        let intercept = y_mean - x_mean.dot(&coef);
        Ok(Self {
            alpha,
            coef,
            intercept,
        })
    }

    /// Predict targets for `x` (samples x features).
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coef.len() {
            return Err(Error::data(format!(
                "model has {} coefficients, got {} columns",
                self.coef.len(),
                x.ncols()
            )));
        }
        Ok(x.dot(&self.coef) + self.intercept)
    }
}
