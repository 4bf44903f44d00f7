//! Core data types for the ticklab pipeline.

use serde::{Deserialize, Serialize};

/// Timestamp in milliseconds since Unix epoch (UTC).
pub type TimestampMs = i64;

/// Size/quantity type.
pub type Size = f64;

/// Convert a timestamp to the start of the bucket of `width_ms` that covers it.
#[inline]
pub fn bucket_start(ts_ms: TimestampMs, width_ms: i64) -> TimestampMs {
    ts_ms.div_euclid(width_ms) * width_ms
}

/// A single order-book/trade observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Timestamp in milliseconds.
    pub ts_ms: TimestampMs,
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Resting size at the bid.
    pub bid_size: Size,
    /// Resting size at the ask.
    pub ask_size: Size,
    /// Mid price as recorded with the tick.
    pub mid_price: f64,
    /// Traded size at this tick.
    pub trade_size: Size,
}

impl Tick {
    /// Tick-level mid: (bid + ask) / 2.
    #[inline]
    pub fn book_mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// Calculate spread.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }
}

/// OHLCV bar over one fixed-width time bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bucket start timestamp (ms).
    pub ts_ms: TimestampMs,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Total volume.
    pub volume: Size,
    /// Bid size at bucket close, if recorded.
    pub bid_size: Option<Size>,
    /// Ask size at bucket close, if recorded.
    pub ask_size: Option<Size>,
}

impl Bar {
    /// Bar-level mid: (high + low) / 2.
    ///
    /// Not the same quantity as [`Tick::book_mid`]; features are computed on
    /// this one.
    #[inline]
    pub fn range_mid(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// Whether both book sizes are recorded.
    #[inline]
    pub fn has_book(&self) -> bool {
        self.bid_size.is_some() && self.ask_size.is_some()
    }

    /// Book imbalance at close: (bid_size - ask_size) / (bid_size + ask_size).
    ///
    /// `None` when sizes are missing or sum to zero.
    #[inline]
    pub fn imbalance(&self) -> Option<f64> {
        let (bid, ask) = (self.bid_size?, self.ask_size?);
        let total = bid + ask;
        if total != 0.0 {
            Some((bid - ask) / total)
        } else {
            None
        }
    }
}
