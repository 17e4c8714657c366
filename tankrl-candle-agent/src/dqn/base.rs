//! DQN agent implemented with candle.
use super::{config::DqnConfig, explorer::EpsilonGreedy, model::DqnModel};
use crate::{
    mlp::Mlp,
    util::{smooth_l1_loss, track, CriticLoss},
};
use anyhow::{ensure, Result};
use candle_core::{shape::D, Device, Tensor};
use candle_nn::loss::mse;
use log::{info, trace};
use rand::{rngs::SmallRng, SeedableRng};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tankrl_core::{Configurable, PolicyModel, Transition};

/// DQN agent implemented with candle.
///
/// The Q-network is an [`Mlp`] mapping a state vector to the values of the
/// discrete actions. A target network of the same shape provides the TD
/// targets and follows the Q-network through soft updates in
/// [`PolicyModel::target_train`].
pub struct Dqn {
    qnet: DqnModel<Mlp>,
    qnet_tgt: DqnModel<Mlp>,
    state_dim: usize,
    n_actions: usize,
    discount_factor: f64,
    tau: f64,
    critic_loss: CriticLoss,
    explorer: EpsilonGreedy,
    device: Device,
    n_opts: usize,
    rng: SmallRng,
}

impl Dqn {
    fn states_to_tensor<'a>(&self, states: impl Iterator<Item = &'a [f32]>) -> Result<Tensor> {
        let mut data = vec![];
        let mut n = 0;
        for s in states {
            ensure!(
                s.len() == self.state_dim,
                "State dimension is {}, expected {}",
                s.len(),
                self.state_dim
            );
            data.extend_from_slice(s);
            n += 1;
        }
        Ok(Tensor::from_vec(data, (n, self.state_dim), &self.device)?)
    }

    fn update_critic(&mut self, batch: &[Transition]) -> Result<f32> {
        let n = batch.len();
        let obs = self.states_to_tensor(batch.iter().map(|t| t.state.as_slice()))?;
        let next_obs = self.states_to_tensor(batch.iter().map(|t| t.next_state.as_slice()))?;
        let act = {
            let act = batch.iter().map(|t| t.action as u32).collect::<Vec<_>>();
            Tensor::from_vec(act, (n, 1), &self.device)?
        };
        let reward = {
            let reward = batch.iter().map(|t| t.reward).collect::<Vec<_>>();
            Tensor::from_vec(reward, n, &self.device)?
        };
        let is_not_done = {
            let is_not_done = batch
                .iter()
                .map(|t| if t.done { 0f32 } else { 1f32 })
                .collect::<Vec<_>>();
            Tensor::from_vec(is_not_done, n, &self.device)?
        };

        let pred = self
            .qnet
            .forward(&obs)?
            .gather(&act, D::Minus1)?
            .squeeze(D::Minus1)?;

        let tgt = {
            let q = self.qnet_tgt.forward(&next_obs)?.max(D::Minus1)?;
            (reward + ((is_not_done * self.discount_factor)? * q)?)?
        }
        .detach();

        let loss = match self.critic_loss {
            CriticLoss::Mse => mse(&pred, &tgt)?,
            CriticLoss::SmoothL1 => smooth_l1_loss(&pred, &tgt)?,
        };

        // Backprop
        self.qnet.backward_step(&loss)?;

        Ok(loss.to_scalar::<f32>()?)
    }

    /// Action values of the Q-network for a state.
    pub fn q_values(&self, state: &[f32]) -> Result<Vec<f32>> {
        let obs = self.states_to_tensor(std::iter::once(state))?;
        Ok(self.qnet.forward(&obs)?.flatten_all()?.to_vec1()?)
    }

    /// Action values of the target network for a state.
    pub fn target_q_values(&self, state: &[f32]) -> Result<Vec<f32>> {
        let obs = self.states_to_tensor(std::iter::once(state))?;
        Ok(self.qnet_tgt.forward(&obs)?.flatten_all()?.to_vec1()?)
    }

    /// The number of optimization steps done so far.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The number of discrete actions.
    pub fn n_actions(&self) -> usize {
        self.n_actions
    }
}

impl Configurable for Dqn {
    type Config = DqnConfig;

    /// Constructs DQN agent.
    ///
    /// The target network starts as a copy of the Q-network.
    fn build(config: Self::Config) -> Result<Self> {
        ensure!(config.n_actions > 0, "The number of actions must be positive");
        let device: Device = config.device.try_into()?;
        let qnet = DqnModel::build(config.mlp_config(), &config.opt_config, &device)?;
        let qnet_tgt = DqnModel::build(config.mlp_config(), &config.opt_config, &device)?;
        track(qnet_tgt.get_varmap(), qnet.get_varmap(), 1.0)?;

        Ok(Self {
            qnet,
            qnet_tgt,
            state_dim: config.state_dim,
            n_actions: config.n_actions,
            discount_factor: config.discount_factor,
            tau: config.tau,
            critic_loss: config.critic_loss,
            explorer: config.explorer(),
            device,
            n_opts: 0,
            rng: SmallRng::seed_from_u64(config.seed),
        })
    }
}

impl PolicyModel for Dqn {
    fn act(&mut self, state: &[f32]) -> Result<usize> {
        let obs = self.states_to_tensor(std::iter::once(state))?;
        let q = self.qnet.forward(&obs)?;
        self.explorer.action(&q, &mut self.rng)
    }

    fn replay(&mut self, batch: &[Transition], batch_size: usize) -> Result<()> {
        ensure!(batch_size > 0, "Batch size must be positive");
        ensure!(
            batch.len() == batch_size,
            "Batch has {} transitions, expected {}",
            batch.len(),
            batch_size
        );
        let loss = self.update_critic(batch)?;
        self.n_opts += 1;
        trace!("Optimization step {}: loss = {}", self.n_opts, loss);
        Ok(())
    }

    fn target_train(&mut self) -> Result<()> {
        track(self.qnet_tgt.get_varmap(), self.qnet.get_varmap(), self.tau)
    }

    fn update_epsilon(&mut self) {
        self.explorer.decay();
    }

    fn epsilon(&self) -> f32 {
        self.explorer.epsilon as f32
    }

    fn save_model(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        let path = dir.join(name);
        fs::create_dir_all(&path)?;
        self.qnet.save(path.join("qnet.safetensors"))?;
        self.qnet_tgt.save(path.join("qnet_tgt.safetensors"))?;
        info!("Saved DQN model to {:?}", path);
        Ok(path)
    }

    fn load_model(&mut self, path: &Path) -> Result<()> {
        self.qnet.load(path.join("qnet.safetensors"))?;
        self.qnet_tgt.load(path.join("qnet_tgt.safetensors"))?;
        Ok(())
    }
}
