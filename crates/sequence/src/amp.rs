//! Dynamic loss scaling.
//!
//! The loss is multiplied by a running scale before backprop, gradients are
//! unscaled before the optimizer sees them, and any step with a non-finite
//! gradient is skipped while the scale backs off. Clean steps grow the scale
//! again every `growth_interval` steps. A disabled scaler backprops the loss
//! as is and always steps.
//!
//! Scaling pairs with the half-precision forward pass chosen by
//! [`compute_dtype`].

use crate::error::Result;
use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer};
use tracing::debug;

/// Forward-pass dtype for a device: F16 on CUDA, F32 elsewhere.
pub fn compute_dtype(device: &Device) -> DType {
    if device.is_cuda() {
        DType::F16
    } else {
        DType::F32
    }
}

/// Loss scaler for reduced-precision training.
#[derive(Debug, Clone)]
pub struct GradScaler {
    scale: f64,
    growth_factor: f64,
    backoff_factor: f64,
    growth_interval: usize,
    growth_tracker: usize,
    enabled: bool,
    skipped_steps: usize,
}

impl GradScaler {
    pub const INIT_SCALE: f64 = 65536.0;

    /// Create a scaler with the standard growth and backoff settings.
    pub fn new(enabled: bool) -> Self {
        Self {
            scale: Self::INIT_SCALE,
            growth_factor: 2.0,
            backoff_factor: 0.5,
            growth_interval: 2000,
            growth_tracker: 0,
            enabled,
            skipped_steps: 0,
        }
    }

    /// Enabled on CUDA devices only.
    pub fn for_device(device: &Device) -> Self {
        Self::new(device.is_cuda())
    }

    /// Override the number of clean steps between scale increases.
    pub fn with_growth_interval(mut self, interval: usize) -> Self {
        self.growth_interval = interval.max(1);
        self
    }

    /// Whether scaling is active.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current loss scale (1 when disabled).
    pub fn scale(&self) -> f64 {
        if self.enabled {
            self.scale
        } else {
            1.0
        }
    }

    /// Optimizer steps skipped for non-finite gradients.
    pub fn skipped_steps(&self) -> usize {
        self.skipped_steps
    }

    /// Backprop `loss` and step the optimizer unless a gradient overflowed.
    ///
    /// Returns whether the optimizer stepped.
    pub fn step(&mut self, optimizer: &mut AdamW, loss: &Tensor, vars: &[Var]) -> Result<bool> {
        if !self.enabled {
            optimizer.backward_step(loss)?;
            return Ok(true);
        }

        let mut grads = loss.affine(self.scale, 0.0)?.backward()?;
        let inv_scale = 1.0 / self.scale;
        let mut finite = true;
        for var in vars {
            if let Some(grad) = grads.remove(var) {
                let grad = grad.affine(inv_scale, 0.0)?;
                finite &= all_finite(&grad)?;
                grads.insert(var, grad);
            }
        }

        if finite {
            optimizer.step(&grads)?;
        } else {
            self.skipped_steps += 1;
            debug!("Skipped optimizer step: non-finite gradients at scale {}", self.scale);
        }
        self.update(!finite);
        Ok(finite)
    }

    /// Adjust the scale after a step.
    fn update(&mut self, found_inf: bool) {
        if found_inf {
            self.scale *= self.backoff_factor;
            self.growth_tracker = 0;
        } else {
            self.growth_tracker += 1;
            if self.growth_tracker >= self.growth_interval {
                self.scale *= self.growth_factor;
                self.growth_tracker = 0;
            }
        }
    }
}

fn all_finite(tensor: &Tensor) -> Result<bool> {
    let values: Vec<f32> = tensor.flatten_all()?.to_dtype(DType::F32)?.to_vec1()?;
    Ok(values.iter().all(|v| v.is_finite()))
}
