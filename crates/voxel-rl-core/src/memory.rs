//! Experience replay memory

use rand::Rng;
use std::collections::VecDeque;
use tracing::trace;

use crate::{RLError, Result};

/// Capacity-bounded FIFO of transitions
///
/// Pushing past capacity drops the oldest entry. Sampling shuffles the
/// tail of the buffer in place, so the stored order is not preserved
/// across [`ReplayMemory::sample_batch`] calls.
#[derive(Debug, Clone)]
pub struct ReplayMemory<T> {
    /// Buffer storage
    buffer: VecDeque<T>,
    /// Maximum capacity
    capacity: usize,
}

impl<T: Clone> ReplayMemory<T> {
    /// Create a new replay memory
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RLError::InvalidConfig(
                "replay memory capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Add an item, evicting the oldest one when full
    pub fn push(&mut self, item: T) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
            trace!(capacity = self.capacity, "replay memory evicted oldest entry");
        }
        self.buffer.push_back(item);
    }

    /// Draw `n` distinct stored items uniformly at random
    ///
    /// Runs a partial Fisher-Yates pass over the last `n` slots and
    /// returns them.
    pub fn sample_batch<R: Rng + ?Sized>(&mut self, n: usize, rng: &mut R) -> Result<Vec<T>> {
        let len = self.buffer.len();
        if n > len {
            trace!(requested = n, available = len, "replay batch larger than memory");
            return Err(RLError::BatchTooLarge {
                requested: n,
                available: len,
            });
        }
        for i in (len - n..len).rev() {
            let j = rng.gen_range(0..=i);
            self.buffer.swap(i, j);
        }
        Ok(self.buffer.range(len - n..).cloned().collect())
    }

    /// Stored items, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.buffer.iter()
    }

    /// Get the current size of the memory
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if memory is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Maximum number of stored items
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear the memory
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
