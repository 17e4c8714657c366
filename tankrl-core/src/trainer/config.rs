//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};

/// Configuration of [`Trainer`](super::Trainer).
///
/// Delays, intervals and timeouts are given in milliseconds.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    /// The number of episodes in a training run.
    pub n_episode: usize,

    /// The maximum number of steps in an episode.
    pub max_step: usize,

    /// The number of transitions in a batch.
    pub batch_size: usize,

    /// Replay starts once the buffer holds more transitions than this.
    pub initial_replay_size: usize,

    /// Interval of target network update and checkpoint in episodes.
    pub save_network: usize,

    /// Settling interval after sending an action.
    pub step_delay: u64,

    /// Recovery interval after a round ended.
    pub round_delay: u64,

    /// Recovery interval after an episode ended.
    pub episode_delay: u64,

    /// Interval of the waiting message while the game has not started.
    pub start_poll_interval: u64,

    /// The maximum time to wait for a telemetry frame.
    pub telemetry_timeout: u64,

    /// Where to save checkpoints.
    pub model_dir: String,

    /// Where to write the training log.
    pub log_dir: String,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_episode: 1000,
            max_step: 2000,
            batch_size: 32,
            initial_replay_size: 2000,
            save_network: 10,
            step_delay: 100,
            round_delay: 6000,
            episode_delay: 3000,
            start_poll_interval: 1000,
            telemetry_timeout: 10000,
            model_dir: "./model".to_string(),
            log_dir: "./log".to_string(),
        }
    }
}

impl TrainerConfig {
    /// Sets the number of episodes.
    pub fn n_episode(mut self, v: usize) -> Self {
        self.n_episode = v;
        self
    }

    /// Sets the maximum number of steps in an episode.
    pub fn max_step(mut self, v: usize) -> Self {
        self.max_step = v;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, v: usize) -> Self {
        self.batch_size = v;
        self
    }

    /// Sets the buffer length above which replay starts.
    pub fn initial_replay_size(mut self, v: usize) -> Self {
        self.initial_replay_size = v;
        self
    }

    /// Sets the interval of checkpoints in episodes.
    pub fn save_network(mut self, v: usize) -> Self {
        self.save_network = v;
        self
    }

    /// Sets the settling interval after an action in milliseconds.
    pub fn step_delay(mut self, v: u64) -> Self {
        self.step_delay = v;
        self
    }

    /// Sets the recovery interval after a round in milliseconds.
    pub fn round_delay(mut self, v: u64) -> Self {
        self.round_delay = v;
        self
    }

    /// Sets the recovery interval after an episode in milliseconds.
    pub fn episode_delay(mut self, v: u64) -> Self {
        self.episode_delay = v;
        self
    }

    /// Sets the interval of the waiting message in milliseconds.
    pub fn start_poll_interval(mut self, v: u64) -> Self {
        self.start_poll_interval = v;
        self
    }

    /// Sets the telemetry timeout in milliseconds.
    pub fn telemetry_timeout(mut self, v: u64) -> Self {
        self.telemetry_timeout = v;
        self
    }

    /// Sets the directory of checkpoints.
    pub fn model_dir(mut self, v: impl Into<String>) -> Self {
        self.model_dir = v.into();
        self
    }

    /// Sets the directory of the training log.
    pub fn log_dir(mut self, v: impl Into<String>) -> Self {
        self.log_dir = v.into();
        self
    }

    pub(super) fn duration(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
