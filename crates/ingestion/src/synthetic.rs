//! Synthetic tick generation for fixtures and experiments.
//!
//! The random generator is always passed in by the caller; nothing here
//! touches process-wide random state.

use crate::reader::parse_timestamp;
use rand::Rng;
use rand_distr::{Distribution, Normal, Poisson, Uniform};
use ticklab_core::{Error, Result, Tick, TimestampMs};
use tracing::debug;

/// Parameters for one simulated trading session.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Session start (inclusive).
    pub start_ms: TimestampMs,
    /// Session end (exclusive).
    pub end_ms: TimestampMs,
    /// Average number of ticks per second.
    pub avg_ticks_per_sec: f64,
    /// Starting mid price.
    pub initial_mid: f64,
    /// Std-dev of each mid-price step.
    pub mid_step_std: f64,
    /// Mean and std-dev of the quoted spread.
    pub spread_mean: f64,
    pub spread_std: f64,
    /// Poisson mean of resting book sizes (before the +1 floor).
    pub book_size_mean: f64,
    /// Poisson mean of trade sizes (before the +1 floor).
    pub trade_size_mean: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            // 2021-01-01 09:30:00 to 16:00:00 UTC
            start_ms: 1_609_493_400_000,
            end_ms: 1_609_516_800_000,
            avg_ticks_per_sec: 1.0,
            initial_mid: 100.0,
            mid_step_std: 0.02,
            spread_mean: 0.01,
            spread_std: 0.005,
            book_size_mean: 50.0,
            trade_size_mean: 10.0,
        }
    }
}

impl SyntheticConfig {
    /// Session between two parseable timestamps at the given tick rate.
    pub fn session(start: &str, end: &str, avg_ticks_per_sec: f64) -> Result<Self> {
        let parse = |s: &str| {
            parse_timestamp(s).ok_or_else(|| Error::config(format!("invalid session time {:?}", s)))
        };
        Ok(Self {
            start_ms: parse(start)?,
            end_ms: parse(end)?,
            avg_ticks_per_sec,
            ..Self::default()
        })
    }

    /// Whole seconds in the session.
    pub fn total_seconds(&self) -> i64 {
        (self.end_ms - self.start_ms) / 1_000
    }

    /// Number of ticks a session produces: floor(seconds * rate).
    pub fn tick_count(&self) -> usize {
        (self.total_seconds() as f64 * self.avg_ticks_per_sec) as usize
    }
}

/// Simulate one session of ticks, sorted by timestamp.
///
/// Mid price is a Gaussian random walk, the spread is |N(mean, std)| split
/// evenly around the mid, and sizes are Poisson counts floored at 1.
pub fn generate_ticks<R: Rng + ?Sized>(config: &SyntheticConfig, rng: &mut R) -> Result<Vec<Tick>> {
    if config.end_ms <= config.start_ms {
        return Err(Error::config("session end must be after start"));
    }
    if !(config.avg_ticks_per_sec > 0.0) {
        return Err(Error::config("avg_ticks_per_sec must be positive"));
    }

    let total_seconds = config.total_seconds() as f64;
    let n = config.tick_count();

    let offsets_dist = Uniform::new(0.0, total_seconds);
    let dist_err = |e: String| Error::config(e);
    let mid_step = Normal::new(0.0, config.mid_step_std).map_err(|e| dist_err(e.to_string()))?;
    let spread_dist = Normal::new(config.spread_mean, config.spread_std)
        .map_err(|e| dist_err(e.to_string()))?;
    let book_dist = Poisson::new(config.book_size_mean).map_err(|e| dist_err(e.to_string()))?;
    let trade_dist = Poisson::new(config.trade_size_mean).map_err(|e| dist_err(e.to_string()))?;

    // Draw each column in full before the next one.
    let mut offsets: Vec<f64> = (0..n).map(|_| offsets_dist.sample(rng)).collect();
    offsets.sort_by(|a, b| a.total_cmp(b));

    let mut mid = Vec::with_capacity(n);
    let mut level = config.initial_mid;
    for _ in 0..n {
        level += mid_step.sample(rng);
        mid.push(level);
    }

    let spread: Vec<f64> = (0..n).map(|_| spread_dist.sample(rng).abs()).collect();
    let bid_size: Vec<f64> = (0..n).map(|_| book_dist.sample(rng) + 1.0).collect();
    let ask_size: Vec<f64> = (0..n).map(|_| book_dist.sample(rng) + 1.0).collect();
    let trade_size: Vec<f64> = (0..n).map(|_| trade_dist.sample(rng) + 1.0).collect();

    let ticks: Vec<Tick> = (0..n)
        .map(|i| Tick {
            ts_ms: config.start_ms + (offsets[i] * 1_000.0).floor() as i64,
            bid: mid[i] - spread[i] / 2.0,
            ask: mid[i] + spread[i] / 2.0,
            bid_size: bid_size[i],
            ask_size: ask_size[i],
            mid_price: mid[i],
            trade_size: trade_size[i],
        })
        .collect();

    debug!("Generated {} synthetic ticks", ticks.len());
    Ok(ticks)
}
