//! Simple generic replay buffer.
use super::SimpleReplayBufferConfig;
use crate::{error::TankRlError, ExperienceBufferBase, ReplayBufferBase};
use anyhow::Result;
use log::warn;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// A fixed-capacity ring buffer with uniform sampling.
///
/// When the buffer is full, a push overwrites the oldest item. Batches are
/// drawn with replacement, each index chosen independently and uniformly
/// among the stored items.
pub struct SimpleReplayBuffer<T> {
    capacity: usize,

    /// Slot the next push writes to.
    i: usize,
    items: Vec<T>,
    rng: StdRng,
}

impl<T> SimpleReplayBuffer<T> {
    /// The maximum number of items kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over stored items from the oldest to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = if self.items.len() < self.capacity {
            self.items.split_at(self.items.len())
        } else {
            self.items.split_at(self.i)
        };
        older.iter().chain(newer.iter())
    }
}

impl<T> ExperienceBufferBase for SimpleReplayBuffer<T> {
    type Item = T;

    fn push(&mut self, tr: T) -> Result<()> {
        if self.items.len() < self.capacity {
            self.items.push(tr);
        } else {
            self.items[self.i] = tr;
        }
        self.i = (self.i + 1) % self.capacity;
        Ok(())
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl<T: Clone> ReplayBufferBase for SimpleReplayBuffer<T> {
    type Config = SimpleReplayBufferConfig;
    type Batch = Vec<T>;

    fn build(config: &Self::Config) -> Self {
        let capacity = if config.capacity == 0 {
            warn!("Replay buffer capacity 0 is not allowed, using 1");
            1
        } else {
            config.capacity
        };

        Self {
            capacity,
            i: 0,
            items: Vec::with_capacity(capacity.min(1 << 16)),
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    fn batch(&mut self, size: usize) -> Result<Self::Batch> {
        let len = self.items.len();
        if len < size || len == 0 {
            return Err(TankRlError::InsufficientData {
                len,
                batch_size: size,
            }
            .into());
        }

        Ok((0..size)
            .map(|_| self.items[self.rng.gen_range(0..len)].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer(capacity: usize) -> SimpleReplayBuffer<usize> {
        SimpleReplayBuffer::build(&SimpleReplayBufferConfig::default().capacity(capacity))
    }

    #[test]
    fn test_keeps_most_recent_items() -> Result<()> {
        let mut buffer = buffer(5);
        for t in 1..=7 {
            buffer.push(t)?;
        }
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6, 7]);

        let mut batch = buffer.batch(5)?;
        assert_eq!(batch.len(), 5);
        batch.sort();
        batch.dedup();
        assert!(batch.iter().all(|t| (3..=7).contains(t)));
        Ok(())
    }

    #[test]
    fn test_eviction_over_many_wraps() -> Result<()> {
        let capacity = 13;
        let mut buffer = buffer(capacity);
        for n in 0..100 {
            buffer.push(n)?;
            let expected = (n + 1).saturating_sub(capacity)..=n;
            assert_eq!(buffer.len(), (n + 1).min(capacity));
            assert!(buffer.iter().copied().eq(expected));
        }
        Ok(())
    }

    #[test]
    fn test_insufficient_data() -> Result<()> {
        let mut buffer = buffer(10);
        assert!(buffer.is_empty());
        for t in 0..3 {
            buffer.push(t)?;
        }
        let err = buffer.batch(4).unwrap_err();
        match err.downcast_ref::<TankRlError>() {
            Some(TankRlError::InsufficientData { len, batch_size }) => {
                assert_eq!((*len, *batch_size), (3, 4));
            }
            _ => panic!("unexpected error: {:?}", err),
        }
        assert_eq!(buffer.batch(3)?.len(), 3);
        Ok(())
    }

    #[test]
    fn test_sampling_is_uniform() -> Result<()> {
        let n_items = 10;
        let n_draws = 100_000;
        let mut buffer = buffer(n_items);
        for t in 0..n_items {
            buffer.push(t)?;
        }

        let mut counts = vec![0usize; n_items];
        for _ in 0..(n_draws / 50) {
            for t in buffer.batch(50)? {
                counts[t] += 1;
            }
        }

        let expected = (n_draws / n_items) as f64;
        for c in counts {
            assert!((c as f64 - expected).abs() < 0.1 * expected, "count {}", c);
        }
        Ok(())
    }

    #[test]
    fn test_same_seed_same_batches() -> Result<()> {
        let mut b1 = buffer(100);
        let mut b2 = buffer(100);
        for t in 0..100 {
            b1.push(t)?;
            b2.push(t)?;
        }
        assert_eq!(b1.batch(32)?, b2.batch(32)?);
        Ok(())
    }
}
