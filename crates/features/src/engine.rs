//! Feature derivation from bars.
//!
//! Turns a bar series into a [`FeatureFrame`] of price, flow and volatility
//! columns. Rows where any column is undefined or non-finite are dropped.

use crate::rolling::RollingWindow;
use ticklab_core::config::FeatureConfig;
use ticklab_core::{Bar, Error, FeatureFrame, Result, TimestampMs};
use tracing::{debug, warn};

/// OHLCV columns copied from each bar.
pub const BAR_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Book size columns, present when the bars carry book snapshots.
pub const BOOK_COLUMNS: [&str; 2] = ["bid_size", "ask_size"];

/// Derived columns, in output order.
pub const DERIVED_COLUMNS: [&str; 4] = ["mid_price", "return", "vwap", "rv"];

/// Order book imbalance column.
pub const IMBALANCE_COLUMN: &str = "imbalance";

/// Feature computation engine.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    /// Rolling window length in bars.
    window: usize,
}

impl FeatureEngine {
    /// Create an engine with the given rolling window.
    pub fn new(window: usize) -> Result<Self> {
        if window < 2 {
            return Err(Error::config(format!(
                "feature window must be at least 2, got {}",
                window
            )));
        }
        Ok(Self { window })
    }

    /// Create an engine from configuration.
    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        Self::new(config.window)
    }

    /// Rolling window length in bars.
    pub fn window(&self) -> usize {
        self.window
    }

    /// Column names produced for bars with or without book sizes.
    pub fn column_names(with_book: bool) -> Vec<String> {
        let mut names: Vec<String> = BAR_COLUMNS.iter().map(|s| s.to_string()).collect();
        if with_book {
            names.extend(BOOK_COLUMNS.iter().map(|s| s.to_string()));
        }
        names.extend(DERIVED_COLUMNS.iter().map(|s| s.to_string()));
        if with_book {
            names.push(IMBALANCE_COLUMN.to_string());
        }
        names
    }

    /// Derive features from time-ordered bars.
    ///
    /// - `mid_price = (high + low) / 2`
    /// - `return`: percent change of `mid_price` from the previous bar
    /// - `vwap`: rolling sum of `close * volume` over rolling sum of `volume`
    /// - `rv`: rolling sample std of `return`, scaled by `sqrt(window)`
    /// - `imbalance`: `(bid - ask) / (bid + ask)` on book sizes, when present
    pub fn compute_features(&self, bars: &[Bar]) -> Result<FeatureFrame> {
        let with_book = bars.iter().any(Bar::has_book);
        let names = Self::column_names(with_book);

        let mut notional = RollingWindow::new(self.window);
        let mut volume = RollingWindow::new(self.window);
        let mut returns = RollingWindow::new(self.window);
        let scale = (self.window as f64).sqrt();

        let mut index: Vec<TimestampMs> = Vec::with_capacity(bars.len());
        let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(bars.len()); names.len()];
        let mut prev_mid: Option<f64> = None;
        let mut row: Vec<Option<f64>> = Vec::with_capacity(names.len());

        for bar in bars {
            let mid = bar.range_mid();
            let ret = prev_mid.map(|prev| (mid - prev) / prev);
            prev_mid = Some(mid);

            notional.push(Some(bar.close * bar.volume));
            volume.push(Some(bar.volume));
            returns.push(ret);

            let vwap = match (notional.sum(), volume.sum()) {
                (Some(pv), Some(v)) if v != 0.0 => Some(pv / v),
                _ => None,
            };
            let rv = returns.std_dev().map(|s| s * scale);

            row.clear();
            row.extend([bar.open, bar.high, bar.low, bar.close, bar.volume].map(Some));
            if with_book {
                row.push(bar.bid_size);
                row.push(bar.ask_size);
            }
            row.extend([Some(mid), ret, vwap, rv]);
            if with_book {
                row.push(bar.imbalance());
            }

            if row.iter().all(|v| v.is_some_and(f64::is_finite)) {
                index.push(bar.ts_ms);
                for (column, value) in columns.iter_mut().zip(&row) {
                    column.push(value.unwrap_or(f64::NAN));
                }
            }
        }

        let dropped = bars.len() - index.len();
        debug!("Dropped {} of {} rows with undefined features", dropped, bars.len());
        if index.is_empty() && !bars.is_empty() {
            warn!("No complete feature rows from {} bars (window {})", bars.len(), self.window);
        }

        FeatureFrame::from_columns(index, names.into_iter().zip(columns).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn make_bar(i: i64, close: f64, volume: f64) -> Bar {
        Bar {
            ts_ms: i * 60_000,
            open: close,
            high: close + 0.5,
            low: close - 0.5,
            close,
            volume,
            bid_size: None,
            ask_size: None,
        }
    }

    fn random_bars(n: usize, seed: u64) -> Vec<Bar> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                price += rng.gen_range(-0.5..0.5);
                let open = price + rng.gen_range(-0.2..0.2);
                let close = price + rng.gen_range(-0.2..0.2);
                Bar {
                    ts_ms: i as i64 * 60_000,
                    open,
                    high: open.max(close) + rng.gen_range(0.0..0.3),
                    low: open.min(close) - rng.gen_range(0.0..0.3),
                    close,
                    volume: rng.gen_range(1.0..100.0),
                    bid_size: None,
                    ask_size: None,
                }
            })
            .collect()
    }

    #[test]
    fn test_window_too_small() {
        assert!(matches!(FeatureEngine::new(1), Err(Error::Config(_))));
        assert!(FeatureEngine::new(2).is_ok());
    }

    #[test]
    fn test_random_bars_complete_rows() {
        let engine = FeatureEngine::new(5).unwrap();
        let frame = engine.compute_features(&random_bars(100, 7)).unwrap();

        // One row lost to the first return, four more to the rv window.
        assert_eq!(frame.len(), 95);
        for name in ["mid_price", "return", "vwap", "rv"] {
            assert!(frame.has_column(name), "missing {}", name);
        }
        assert!(!frame.has_column("imbalance"));
        assert_eq!(frame.non_finite_count(), 0);
        assert_eq!(frame.index()[0], 5 * 60_000);
    }

    #[test]
    fn test_random_bars_with_book_sizes() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut bars = random_bars(100, 11);
        for bar in &mut bars {
            bar.bid_size = Some(rng.gen_range(1.0..100.0));
            bar.ask_size = Some(rng.gen_range(1.0..100.0));
        }

        let frame = FeatureEngine::new(5).unwrap().compute_features(&bars).unwrap();

        assert_eq!(frame.len(), 95);
        for name in ["open", "high", "low", "close", "volume", "mid_price", "return", "vwap", "rv", "imbalance"] {
            assert!(frame.has_column(name), "missing {}", name);
        }
        assert_eq!(frame.non_finite_count(), 0);
        assert!(frame.column("imbalance").unwrap().iter().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_column_order() {
        let engine = FeatureEngine::new(2).unwrap();
        let frame = engine.compute_features(&random_bars(10, 1)).unwrap();
        assert_eq!(frame.columns(), FeatureEngine::column_names(false).as_slice());
        assert_eq!(frame.columns()[0], "open");
        assert_eq!(frame.columns()[8], "rv");
    }

    #[test]
    fn test_known_values() {
        let engine = FeatureEngine::new(2).unwrap();
        let bars = vec![
            make_bar(0, 100.0, 1.0),
            make_bar(1, 101.0, 3.0),
            make_bar(2, 99.0, 1.0),
        ];

        let frame = engine.compute_features(&bars).unwrap();

        // Row 1 has a return but only one return in the rv window.
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.index(), &[120_000]);

        let ret = frame.column("return").unwrap()[0];
        assert_relative_eq!(ret, 99.0 / 101.0 - 1.0, epsilon = 1e-12);

        // (101 * 3 + 99 * 1) / 4
        let vwap = frame.column("vwap").unwrap()[0];
        assert_relative_eq!(vwap, 100.5, epsilon = 1e-12);

        let r1: f64 = 0.01;
        let r2: f64 = 99.0 / 101.0 - 1.0;
        let mean = (r1 + r2) / 2.0;
        let std = (((r1 - mean).powi(2) + (r2 - mean).powi(2)) / 1.0).sqrt();
        let rv = frame.column("rv").unwrap()[0];
        assert_relative_eq!(rv, std * 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_zero_volume_window_dropped() {
        let engine = FeatureEngine::new(2).unwrap();
        let bars = vec![
            make_bar(0, 100.0, 0.0),
            make_bar(1, 100.0, 0.0),
            make_bar(2, 100.0, 0.0),
            make_bar(3, 101.0, 2.0),
        ];

        let frame = engine.compute_features(&bars).unwrap();

        // Only the last window has non-zero volume.
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.index(), &[180_000]);
    }

    #[test]
    fn test_zero_volume_after_busy_bars() {
        let mut rng = StdRng::seed_from_u64(5);
        let bars: Vec<Bar> = (0..20)
            .map(|i| {
                let volume = if i < 10 { rng.gen_range(0.0..1000.0) } else { 0.0 };
                make_bar(i, 100.0 + (i % 4) as f64, volume)
            })
            .collect();

        let frame = FeatureEngine::new(3).unwrap().compute_features(&bars).unwrap();

        // Windows ending at bar 12 or later hold only zero volume.
        assert!(!frame.is_empty());
        assert!(frame.index().iter().all(|&ts| ts < 12 * 60_000));
        assert_eq!(frame.non_finite_count(), 0);
    }

    #[test]
    fn test_book_imbalance() {
        let engine = FeatureEngine::new(2).unwrap();
        let mut bars: Vec<Bar> = (0..5).map(|i| make_bar(i, 100.0 + i as f64, 1.0)).collect();
        for bar in &mut bars {
            bar.bid_size = Some(30.0);
            bar.ask_size = Some(10.0);
        }
        // Empty book on the last bar leaves imbalance undefined.
        bars[4].bid_size = Some(0.0);
        bars[4].ask_size = Some(0.0);

        let frame = engine.compute_features(&bars).unwrap();

        assert_eq!(frame.columns(), FeatureEngine::column_names(true).as_slice());
        assert_eq!(frame.len(), 2);
        for v in frame.column("imbalance").unwrap() {
            assert_relative_eq!(*v, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_too_few_bars() {
        let engine = FeatureEngine::new(20).unwrap();
        let frame = engine.compute_features(&random_bars(10, 3)).unwrap();
        assert!(frame.is_empty());
        assert_eq!(frame.width(), 9);

        let empty = engine.compute_features(&[]).unwrap();
        assert!(empty.is_empty());
    }
}
