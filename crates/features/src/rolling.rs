//! Fixed-length rolling windows.
//!
//! A window is only defined once it holds `window` observations, and stays
//! undefined while any observation inside it is undefined.

use statrs::statistics::Statistics;
use std::collections::VecDeque;

/// Rolling window over optional observations.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Window size in periods.
    window: usize,
    /// Most recent observations, oldest first.
    values: VecDeque<Option<f64>>,
    /// Undefined observations currently inside the window.
    missing: usize,
}

impl RollingWindow {
    /// Create a new rolling window.
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
            missing: 0,
        }
    }

    /// Add an observation, evicting the oldest once the window is full.
    pub fn push(&mut self, value: Option<f64>) {
        if self.values.len() >= self.window {
            if let Some(None) = self.values.pop_front() {
                self.missing -= 1;
            }
        }

        if value.is_none() {
            self.missing += 1;
        }
        self.values.push_back(value);
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    /// Full and free of undefined observations.
    pub fn is_defined(&self) -> bool {
        self.is_ready() && self.missing == 0
    }

    /// Sum over the window.
    ///
    /// Summed from the stored values on every call, so a window of zeros
    /// sums to exactly zero.
    pub fn sum(&self) -> Option<f64> {
        self.is_defined()
            .then(|| self.values.iter().flatten().copied().sum::<f64>())
    }

    /// Sample standard deviation (n - 1 denominator) over the window.
    pub fn std_dev(&self) -> Option<f64> {
        if !self.is_defined() || self.window < 2 {
            return None;
        }
        Some(self.values.iter().flatten().std_dev())
    }
}
