//! Configuration of a training run.
use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};
use tankrl_candle_agent::dqn::DqnConfig;
use tankrl_core::{replay_buffer::SimpleReplayBufferConfig, EnvCodec, TrainerConfig};
use tankrl_server::ServerConfig;
use tankrl_tank_env::{TankCodec, TankCodecConfig};

/// Configuration of all components of a training run.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TankRlConfig {
    pub trainer: TrainerConfig,
    pub replay_buffer: SimpleReplayBufferConfig,
    pub agent: DqnConfig,
    pub codec: TankCodecConfig,
    pub server: ServerConfig,
}

impl TankRlConfig {
    /// Constructs [`TankRlConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TankRlConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Checks that the network fits the state vectors and actions of the codec.
    pub fn check(&self) -> Result<()> {
        let codec = TankCodec::new(self.codec.clone());
        ensure!(
            codec.state_dim() == self.agent.state_dim,
            "The codec produces states of dimension {}, but the agent takes {}",
            codec.state_dim(),
            self.agent.state_dim
        );
        ensure!(
            codec.n_actions() == self.agent.n_actions,
            "The codec decodes {} actions, but the agent has {}",
            codec.n_actions(),
            self.agent.n_actions
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_default_config_is_consistent() -> Result<()> {
        TankRlConfig::default().check()
    }

    #[test]
    fn test_mismatched_map_size() {
        let mut config = TankRlConfig::default();
        config.codec = config.codec.map_size(20, 20);
        assert!(config.check().is_err());
        config.agent = config.agent.state_dim(406);
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_serde_tankrl_config() -> Result<()> {
        let mut config = TankRlConfig::default();
        config.trainer = config.trainer.n_episode(5).model_dir("/tmp/model");
        config.server = config.server.port(5000);

        let dir = TempDir::new("tankrl_config")?;
        let path = dir.path().join("tankrl.yaml");
        config.save(&path)?;
        assert_eq!(config, TankRlConfig::load(&path)?);
        Ok(())
    }

    #[test]
    fn test_partial_config() -> Result<()> {
        let config: TankRlConfig = serde_yaml::from_str(
            "---\ntrainer:\n  n_episode: 3\nserver:\n  port: 8000\n",
        )?;
        assert_eq!(config.trainer.n_episode, 3);
        assert_eq!(config.trainer.max_step, 2000);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.address, "0.0.0.0");
        assert_eq!(config.agent, DqnConfig::default());
        Ok(())
    }
}
