//! Shuffled mini-batch indices.

use crate::dataset::WindowDataset;
use crate::error::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;

/// Splits a dataset into mini-batches of sample indices.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    len: usize,
    batch_size: usize,
    shuffle: bool,
}

impl BatchLoader {
    /// Create a shuffling loader over `dataset`.
    pub fn new(dataset: &WindowDataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch_size must be at least 1"));
        }
        Ok(Self {
            len: dataset.len(),
            batch_size,
            shuffle: true,
        })
    }

    /// Enable or disable shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Batches per epoch: `ceil(len / batch_size)`.
    pub fn num_batches(&self) -> usize {
        self.len.div_ceil(self.batch_size)
    }

    /// Index batches for one epoch. The order is drawn once, up front.
    pub fn epoch<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.len).collect();
        if self.shuffle {
            order.shuffle(rng);
        }
        order.chunks(self.batch_size).map(<[usize]>::to_vec).collect()
    }
}
