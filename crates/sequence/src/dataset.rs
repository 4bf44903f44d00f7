//! Sliding-window samples over feature rows.
//!
//! Sample `i` is rows `[i, i + window)` of the feature matrix; its target is
//! column 0 of row `i + window`.

use crate::error::{Error, Result};
use candle_core::{Device, Tensor};
use ndarray::{s, Array2, ArrayView2};
use ticklab_core::FeatureFrame;

/// Window dataset over a `rows x features` matrix.
#[derive(Debug, Clone)]
pub struct WindowDataset {
    values: Array2<f32>,
    window: usize,
}

impl WindowDataset {
    /// Create a dataset; `window` must be at least 1.
    pub fn new(values: Array2<f32>, window: usize) -> Result<Self> {
        if window == 0 {
            return Err(Error::config("window must be at least 1"));
        }
        Ok(Self { values, window })
    }

    /// Build from frame columns in the given order. The first column is the target.
    pub fn from_frame<S: AsRef<str>>(frame: &FeatureFrame, columns: &[S], window: usize) -> Result<Self> {
        let selected = frame.select(columns)?;
        Self::new(selected.values().mapv(|v| v as f32), window)
    }

    /// Number of samples: `rows - window`, or 0 when there are too few rows.
    pub fn len(&self) -> usize {
        self.values.nrows().saturating_sub(self.window)
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Window length.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Features per time step.
    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Input window and target of one sample.
    pub fn get(&self, i: usize) -> Option<(ArrayView2<'_, f32>, f32)> {
        if i >= self.len() {
            return None;
        }
        let x = self.values.slice(s![i..i + self.window, ..]);
        Some((x, self.values[[i + self.window, 0]]))
    }

    /// Stack samples into `x: (batch, window, features)` and `y: (batch, 1)`.
    pub fn batch(&self, indices: &[usize], device: &Device) -> Result<(Tensor, Tensor)> {
        let d = self.n_features();
        let mut xs = Vec::with_capacity(indices.len() * self.window * d);
        let mut ys = Vec::with_capacity(indices.len());
        for &i in indices {
            let (x, y) = self
                .get(i)
                .ok_or_else(|| Error::data(format!("sample {} out of range ({})", i, self.len())))?;
            xs.extend(x.iter().copied());
            ys.push(y);
        }
        let x = Tensor::from_vec(xs, (indices.len(), self.window, d), device)?;
        let y = Tensor::from_vec(ys, (indices.len(), 1), device)?;
        Ok((x, y))
    }
}
