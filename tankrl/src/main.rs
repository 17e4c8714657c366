//! Trains a DQN agent against a running tank game client.
//!
//! The network thread serves the game client over WebSocket and feeds the
//! telemetry into the bridge. The training thread runs the episodes. Both
//! stop when training completes or Ctrl-C is pressed.
mod config;
use anyhow::{anyhow, Result};
use clap::Parser;
use config::TankRlConfig;
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};
use tankrl_candle_agent::dqn::Dqn;
use tankrl_core::{
    record::CsvRecorder,
    replay_buffer::SimpleReplayBuffer,
    Bridge, Configurable, PolicyModel, ReplayBufferBase, Trainer, TrainingSummary,
};
use tankrl_server::TankServer;
use tankrl_tank_env::TankCodec;
use tokio::sync::watch;

/// Train a DQN agent against a running tank game client
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file in YAML, the defaults are used if not given
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective configuration to this file and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    address: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// The number of episodes
    #[arg(long)]
    episodes: Option<usize>,

    /// Checkpoint directory to resume from
    #[arg(long)]
    load: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> Result<TankRlConfig> {
        let mut config = match &self.config {
            Some(path) => TankRlConfig::load(path)?,
            None => TankRlConfig::default(),
        };
        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(n) = self.episodes {
            config.trainer.n_episode = n;
        }
        Ok(config)
    }
}

fn train(
    config: TankRlConfig,
    bridge: &Bridge<TankCodec>,
    load: Option<&Path>,
) -> Result<TrainingSummary> {
    let mut agent = Dqn::build(config.agent)?;
    if let Some(path) = load {
        agent.load_model(path)?;
        info!("Loaded model from {:?}", path);
    }
    let mut buffer = SimpleReplayBuffer::build(&config.replay_buffer);
    let mut recorder = CsvRecorder::new(&config.trainer.log_dir)?;
    let mut trainer = Trainer::build(config.trainer)?;

    trainer.train(bridge, &mut agent, &mut buffer, &mut recorder)
}

fn run(config: TankRlConfig, load: Option<PathBuf>) -> Result<()> {
    config.check()?;
    let bridge = Arc::new(Bridge::new(TankCodec::new(config.codec.clone())));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let server = runtime.block_on(TankServer::bind(config.server.clone(), bridge.clone()))?;

    let network = {
        let bridge = bridge.clone();
        thread::spawn(move || {
            runtime.block_on(async move {
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupted");
                        bridge.shutdown();
                    }
                });
                server.serve(shutdown_rx).await
            })
        })
    };

    let training = {
        let bridge = bridge.clone();
        thread::spawn(move || train(config, &bridge, load.as_deref()))
    };

    let res = training
        .join()
        .map_err(|_| anyhow!("Training thread panicked"));
    bridge.shutdown();
    if shutdown_tx.send(true).is_err() {
        warn!("Server has already stopped");
    }
    network
        .join()
        .map_err(|_| anyhow!("Network thread panicked"))??;

    let summary = res??;
    info!(
        "Finished: {} episodes ({} abandoned), {} steps, {} checkpoints",
        summary.n_episodes,
        summary.n_abandoned,
        summary.n_steps,
        summary.checkpoints.len()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.config()?;

    if let Some(path) = &args.dump_config {
        config.save(path)?;
        info!("Saved configuration to {:?}", path);
        return Ok(());
    }

    run(config, args.load)
}
