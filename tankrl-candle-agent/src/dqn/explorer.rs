//! Exploration strategy of DQN.
use anyhow::Result;
use candle_core::Tensor;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Epsilon-greedy explorer with a multiplicative decay schedule.
///
/// The exploration rate only changes through [`EpsilonGreedy::decay`] and
/// never increases.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpsilonGreedy {
    /// Probability of taking a random action.
    pub epsilon: f64,

    /// Lower bound of the exploration rate.
    pub epsilon_min: f64,

    /// Factor applied on each decay step.
    pub epsilon_decay: f64,
}

impl Default for EpsilonGreedy {
    fn default() -> Self {
        Self {
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
        }
    }
}

impl EpsilonGreedy {
    /// Constructs epsilon-greedy explorer.
    pub fn new(epsilon: f64, epsilon_min: f64, epsilon_decay: f64) -> Self {
        Self {
            epsilon,
            epsilon_min,
            epsilon_decay,
        }
    }

    /// Takes an action based on the action values of a single state.
    ///
    /// * `q` - action values, the elements of which are the values of the actions.
    pub fn action(&self, q: &Tensor, rng: &mut impl Rng) -> Result<usize> {
        let n_actions = q.elem_count();
        if rng.gen::<f64>() < self.epsilon {
            Ok(rng.gen_range(0..n_actions))
        } else {
            greedy(q)
        }
    }

    /// Applies one decay step, `epsilon = max(epsilon * epsilon_decay, epsilon_min)`.
    pub fn decay(&mut self) {
        let epsilon = (self.epsilon * self.epsilon_decay).max(self.epsilon_min);
        self.epsilon = epsilon.min(self.epsilon);
    }
}

/// Index of the largest action value.
pub(super) fn greedy(q: &Tensor) -> Result<usize> {
    Ok(q.flatten_all()?.argmax(0)?.to_scalar::<u32>()? as usize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;
    use rand::{rngs::SmallRng, SeedableRng};

    #[test]
    fn test_decay_is_monotone_and_bounded() {
        let mut explorer = EpsilonGreedy::new(1.0, 0.01, 0.9);
        let mut prev = explorer.epsilon;
        for _ in 0..100 {
            explorer.decay();
            assert!(explorer.epsilon <= prev);
            assert!(explorer.epsilon >= 0.01);
            prev = explorer.epsilon;
        }
        assert_eq!(explorer.epsilon, 0.01);

        // Starting below the floor never raises the rate
        let mut explorer = EpsilonGreedy::new(0.001, 0.01, 0.9);
        explorer.decay();
        assert_eq!(explorer.epsilon, 0.001);
    }

    #[test]
    fn test_greedy_and_random_actions() -> Result<()> {
        let q = Tensor::from_slice(&[0.1f32, 0.7, -0.2, 0.3], (1, 4), &Device::Cpu)?;
        let mut rng = SmallRng::seed_from_u64(42);

        let explorer = EpsilonGreedy::new(0.0, 0.0, 1.0);
        assert!((0..100).all(|_| explorer.action(&q, &mut rng).ok() == Some(1)));

        let explorer = EpsilonGreedy::new(1.0, 0.0, 1.0);
        let mut counts = [0usize; 4];
        for _ in 0..4000 {
            counts[explorer.action(&q, &mut rng)?] += 1;
        }
        assert!(counts.iter().all(|c| *c > 800), "{:?}", counts);
        Ok(())
    }
}
