//! Fixed-width bar building from ticks.
//!
//! Buckets ticks (or finer bars) into OHLCV bars. Empty buckets produce no
//! bar; nothing is forward-filled.

use std::collections::BTreeMap;
use ticklab_core::{bucket_start, Bar, Error, Result, Tick, TimestampMs};
use tracing::debug;

/// Resampler producing one bar per non-empty bucket.
#[derive(Debug, Clone)]
pub struct Resampler {
    /// Bucket width in milliseconds.
    width_ms: i64,
    /// Record close-of-bucket bid/ask sizes.
    book_snapshot: bool,
}

/// A bar that's currently being built.
#[derive(Debug, Clone)]
struct BarInProgress {
    ts_ms: TimestampMs,
    open: Option<f64>,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
    bid_size: Option<f64>,
    ask_size: Option<f64>,
}

impl BarInProgress {
    fn new(ts_ms: TimestampMs) -> Self {
        Self {
            ts_ms,
            open: None,
            high: f64::NEG_INFINITY,
            low: f64::INFINITY,
            close: 0.0,
            volume: 0.0,
            bid_size: None,
            ask_size: None,
        }
    }

    fn add_tick(&mut self, tick: &Tick, book_snapshot: bool) {
        self.add_range(tick.mid_price, tick.mid_price, tick.mid_price, tick.mid_price, tick.trade_size);
        if book_snapshot {
            self.bid_size = Some(tick.bid_size);
            self.ask_size = Some(tick.ask_size);
        }
    }

    fn add_bar(&mut self, bar: &Bar) {
        self.add_range(bar.open, bar.high, bar.low, bar.close, bar.volume);
        // Book sizes are a close snapshot: the latest one carrying them wins.
        if bar.bid_size.is_some() || bar.ask_size.is_some() {
            self.bid_size = bar.bid_size;
            self.ask_size = bar.ask_size;
        }
    }

    fn add_range(&mut self, open: f64, high: f64, low: f64, close: f64, volume: f64) {
        if self.open.is_none() {
            self.open = Some(open);
        }
        self.high = self.high.max(high);
        self.low = self.low.min(low);
        self.close = close;
        self.volume += volume;
    }

    fn to_bar(&self) -> Option<Bar> {
        let open = self.open?;
        Some(Bar {
            ts_ms: self.ts_ms,
            open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            bid_size: self.bid_size,
            ask_size: self.ask_size,
        })
    }
}

impl Resampler {
    /// Create a resampler with the given bucket width.
    pub fn new(width_ms: i64) -> Result<Self> {
        if width_ms <= 0 {
            return Err(Error::config(format!(
                "bucket width must be positive, got {} ms",
                width_ms
            )));
        }
        Ok(Self {
            width_ms,
            book_snapshot: false,
        })
    }

    /// Record the last tick's bid/ask sizes in each bar.
    pub fn with_book_snapshot(mut self, enabled: bool) -> Self {
        self.book_snapshot = enabled;
        self
    }

    /// Bucket width in milliseconds.
    pub fn width_ms(&self) -> i64 {
        self.width_ms
    }

    /// Resample time-sorted ticks into bars.
    ///
    /// open/high/low/close come from `mid_price`, volume from `trade_size`.
    pub fn resample_ticks(&self, ticks: &[Tick]) -> Result<Vec<Bar>> {
        ensure_sorted(ticks.iter().map(|t| t.ts_ms), "ticks")?;

        let mut buckets: BTreeMap<TimestampMs, BarInProgress> = BTreeMap::new();
        for tick in ticks {
            let ts = bucket_start(tick.ts_ms, self.width_ms);
            buckets
                .entry(ts)
                .or_insert_with(|| BarInProgress::new(ts))
                .add_tick(tick, self.book_snapshot);
        }

        let bars = finish(buckets);
        debug!("Resampled {} ticks into {} bars of {} ms", ticks.len(), bars.len(), self.width_ms);
        Ok(bars)
    }

    /// Resample time-sorted bars into bars of this resampler's width.
    ///
    /// Bars already aligned to this width come back unchanged.
    pub fn resample_bars(&self, bars: &[Bar]) -> Result<Vec<Bar>> {
        ensure_sorted(bars.iter().map(|b| b.ts_ms), "bars")?;

        let mut buckets: BTreeMap<TimestampMs, BarInProgress> = BTreeMap::new();
        for bar in bars {
            let ts = bucket_start(bar.ts_ms, self.width_ms);
            buckets
                .entry(ts)
                .or_insert_with(|| BarInProgress::new(ts))
                .add_bar(bar);
        }

        Ok(finish(buckets))
    }
}

fn finish(buckets: BTreeMap<TimestampMs, BarInProgress>) -> Vec<Bar> {
    // BTreeMap iteration is already ordered by bucket start.
    buckets.values().filter_map(BarInProgress::to_bar).collect()
}

fn ensure_sorted(mut timestamps: impl Iterator<Item = TimestampMs>, what: &str) -> Result<()> {
    let Some(mut prev) = timestamps.next() else {
        return Ok(());
    };
    for ts in timestamps {
        if ts < prev {
            return Err(Error::data(format!("{} are not sorted by timestamp", what)));
        }
        prev = ts;
    }
    Ok(())
}
