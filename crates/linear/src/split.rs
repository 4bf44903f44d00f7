//! Chronological train/test split.

use ticklab_core::FeatureFrame;

/// Row position where the test split starts: `floor(0.8 * n)`.
pub fn split_index(n: usize) -> usize {
    n * 4 / 5
}

/// Split rows into the first 80% (train) and the rest (test), keeping order.
pub fn chronological_split(frame: &FeatureFrame) -> (FeatureFrame, FeatureFrame) {
    frame.split_at(split_index(frame.len()))
}
