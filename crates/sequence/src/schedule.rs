//! One-cycle learning rate policy.
//!
//! The learning rate warms up from `max_lr / div_factor` to `max_lr` over
//! the first `pct_start` of the steps, then anneals down to
//! `initial_lr / final_div_factor`. AdamW's beta1 moves the opposite way,
//! between `max_momentum` and `base_momentum`. Both phases use cosine
//! annealing.

use crate::error::{Error, Result};
use candle_nn::{AdamW, Optimizer};
use std::f64::consts::PI;

/// One-cycle scheduler over a fixed number of optimizer steps.
#[derive(Debug, Clone)]
pub struct OneCycleLr {
    max_lr: f64,
    total_steps: usize,
    pct_start: f64,
    div_factor: f64,
    final_div_factor: f64,
    base_momentum: f64,
    max_momentum: f64,
    step_num: usize,
}

impl OneCycleLr {
    /// Schedule spanning `epochs * steps_per_epoch` steps.
    pub fn new(max_lr: f64, epochs: usize, steps_per_epoch: usize) -> Result<Self> {
        Self::with_total_steps(max_lr, epochs * steps_per_epoch)
    }

    /// Schedule spanning `total_steps` steps with the standard defaults.
    pub fn with_total_steps(max_lr: f64, total_steps: usize) -> Result<Self> {
        if total_steps == 0 {
            return Err(Error::config("one-cycle schedule needs at least one step"));
        }
        if !(max_lr.is_finite() && max_lr > 0.0) {
            return Err(Error::config(format!("max_lr must be positive, got {}", max_lr)));
        }
        Ok(Self {
            max_lr,
            total_steps,
            pct_start: 0.3,
            div_factor: 25.0,
            final_div_factor: 1e4,
            base_momentum: 0.85,
            max_momentum: 0.95,
            step_num: 0,
        })
    }

    /// Total steps the schedule covers.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Steps taken so far.
    pub fn steps_taken(&self) -> usize {
        self.step_num
    }

    /// Learning rate at the first step.
    pub fn initial_lr(&self) -> f64 {
        self.max_lr / self.div_factor
    }

    /// Learning rate at the last step.
    pub fn min_lr(&self) -> f64 {
        self.initial_lr() / self.final_div_factor
    }

    /// Learning rate for the current step.
    pub fn lr(&self) -> f64 {
        let (phase, pct) = self.phase();
        if phase == 0 {
            cosine(self.initial_lr(), self.max_lr, pct)
        } else {
            cosine(self.max_lr, self.min_lr(), pct)
        }
    }

    /// beta1 for the current step.
    pub fn momentum(&self) -> f64 {
        let (phase, pct) = self.phase();
        if phase == 0 {
            cosine(self.max_momentum, self.base_momentum, pct)
        } else {
            cosine(self.base_momentum, self.max_momentum, pct)
        }
    }

    /// Advance one step and return the new learning rate.
    pub fn step(&mut self) -> Result<f64> {
        if self.step_num >= self.total_steps {
            return Err(Error::config(format!(
                "stepped one-cycle schedule past its {} total steps",
                self.total_steps
            )));
        }
        self.step_num += 1;
        Ok(self.lr())
    }

    /// Push the current learning rate and beta1 into the optimizer.
    pub fn apply(&self, optimizer: &mut AdamW) {
        optimizer.set_learning_rate(self.lr());
        let mut params = optimizer.params().clone();
        params.beta1 = self.momentum();
        optimizer.set_params(params);
    }

    /// Phase index and progress within it.
    fn phase(&self) -> (usize, f64) {
        let step = self.step_num as f64;
        let warmup_end = self.pct_start * self.total_steps as f64 - 1.0;
        let last = self.total_steps as f64 - 1.0;

        if step <= warmup_end {
            (0, progress(step, 0.0, warmup_end))
        } else {
            (1, progress(step, warmup_end, last))
        }
    }
}

fn progress(step: f64, start: f64, end: f64) -> f64 {
    if end > start {
        (step - start) / (end - start)
    } else {
        1.0
    }
}

/// Cosine interpolation from `start` (pct 0) to `end` (pct 1).
fn cosine(start: f64, end: f64, pct: f64) -> f64 {
    end + (start - end) / 2.0 * ((PI * pct).cos() + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shape_of_cycle() {
        let mut schedule = OneCycleLr::new(0.01, 10, 10).unwrap();
        assert_eq!(schedule.total_steps(), 100);
        assert_relative_eq!(schedule.lr(), 0.0004, epsilon = 1e-12);
        assert_relative_eq!(schedule.momentum(), 0.95, epsilon = 1e-12);

        let mut lrs = vec![schedule.lr()];
        for _ in 0..99 {
            lrs.push(schedule.step().unwrap());
        }

        // Peak at the end of warm-up (step 29).
        assert_relative_eq!(lrs[29], 0.01, epsilon = 1e-12);
        assert!(lrs[..29].windows(2).all(|w| w[0] < w[1]));
        assert!(lrs[30..].windows(2).all(|w| w[0] > w[1]));
        assert_relative_eq!(lrs[99], 0.0004 / 1e4, epsilon = 1e-12);
        assert_relative_eq!(schedule.momentum(), 0.95, epsilon = 1e-12);
    }

    #[test]
    fn test_momentum_bottoms_at_peak_lr() {
        let mut schedule = OneCycleLr::with_total_steps(1.0, 10).unwrap();
        // Warm-up ends at step 2.
        schedule.step().unwrap();
        schedule.step().unwrap();
        assert_relative_eq!(schedule.lr(), 1.0, epsilon = 1e-12);
        assert_relative_eq!(schedule.momentum(), 0.85, epsilon = 1e-12);
    }

    #[test]
    fn test_past_total_steps() {
        let mut schedule = OneCycleLr::with_total_steps(0.1, 3).unwrap();
        for _ in 0..3 {
            schedule.step().unwrap();
        }
        assert!(matches!(
            schedule.step(),
            Err(Error::Core(ticklab_core::Error::Config(_)))
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(OneCycleLr::new(0.1, 0, 5).is_err());
        assert!(OneCycleLr::with_total_steps(0.0, 5).is_err());
    }

    #[test]
    fn test_apply_sets_optimizer() {
        use candle_core::{DType, Device, Var};
        use candle_nn::ParamsAdamW;

        let var = Var::zeros(3, DType::F32, &Device::Cpu).unwrap();
        let mut optimizer = AdamW::new(vec![var], ParamsAdamW::default()).unwrap();
        let schedule = OneCycleLr::with_total_steps(0.5, 10).unwrap();

        schedule.apply(&mut optimizer);
        assert_relative_eq!(optimizer.learning_rate(), 0.02, epsilon = 1e-12);
        assert_relative_eq!(optimizer.params().beta1, 0.95, epsilon = 1e-12);
    }
}
