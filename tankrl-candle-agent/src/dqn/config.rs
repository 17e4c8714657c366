//! Configuration of DQN agent.
use super::EpsilonGreedy;
use crate::{mlp::MlpConfig, opt::OptimizerConfig, util::CriticLoss, Device};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Dqn`](super::Dqn) agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct DqnConfig {
    /// Dimension of state vectors.
    pub state_dim: usize,

    /// The number of discrete actions.
    pub n_actions: usize,

    /// The number of units of the hidden layers of the Q-network.
    pub units: Vec<usize>,

    /// Discount factor of future rewards.
    pub discount_factor: f64,

    /// Rate of the soft update of the target network.
    pub tau: f64,

    /// Loss of the action-value regression.
    pub critic_loss: CriticLoss,

    /// Optimizer of the Q-network.
    pub opt_config: OptimizerConfig,

    /// Initial exploration rate.
    pub epsilon: f64,

    /// Lower bound of the exploration rate.
    pub epsilon_min: f64,

    /// Factor applied to the exploration rate per decay step.
    pub epsilon_decay: f64,

    /// Device on which the networks are placed.
    pub device: Device,

    /// Seed of the random number generator for exploration.
    pub seed: u64,
}

impl Default for DqnConfig {
    fn default() -> Self {
        Self {
            state_dim: 1606,
            n_actions: 5,
            units: vec![300, 300],
            discount_factor: 0.95,
            tau: 0.125,
            critic_loss: CriticLoss::Mse,
            opt_config: OptimizerConfig::default(),
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            device: Device::Cpu,
            seed: 42,
        }
    }
}

impl DqnConfig {
    /// Sets the dimension of state vectors.
    pub fn state_dim(mut self, v: usize) -> Self {
        self.state_dim = v;
        self
    }

    /// Sets the number of actions.
    pub fn n_actions(mut self, v: usize) -> Self {
        self.n_actions = v;
        self
    }

    /// Sets the hidden layers of the Q-network.
    pub fn units(mut self, v: Vec<usize>) -> Self {
        self.units = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.discount_factor = v;
        self
    }

    /// Sets the soft update coefficient.
    pub fn tau(mut self, v: f64) -> Self {
        self.tau = v;
        self
    }

    /// Sets the critic loss.
    pub fn critic_loss(mut self, v: CriticLoss) -> Self {
        self.critic_loss = v;
        self
    }

    /// Sets the optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Sets the exploration schedule.
    pub fn epsilon(mut self, epsilon: f64, epsilon_min: f64, epsilon_decay: f64) -> Self {
        self.epsilon = epsilon;
        self.epsilon_min = epsilon_min;
        self.epsilon_decay = epsilon_decay;
        self
    }

    /// Sets the device.
    pub fn device(mut self, v: Device) -> Self {
        self.device = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    pub(super) fn mlp_config(&self) -> MlpConfig {
        MlpConfig::new(self.state_dim, self.units.clone(), self.n_actions, false)
    }

    pub(super) fn explorer(&self) -> EpsilonGreedy {
        EpsilonGreedy::new(self.epsilon, self.epsilon_min, self.epsilon_decay)
    }

    /// Constructs [`DqnConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DqnConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
