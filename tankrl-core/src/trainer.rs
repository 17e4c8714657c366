//! Train a [`PolicyModel`] against the game through the [`Bridge`].
mod config;
use crate::{
    error::TankRlError,
    record::{EpisodeRecord, Recorder},
    Bridge, EnvCodec, ExperienceBufferBase, PolicyModel, ReplayBufferBase, Transition,
};
use anyhow::{ensure, Result};
use chrono::Local;
pub use config::TrainerConfig;
use log::{debug, error, info, trace, warn};
use std::{
    fmt,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// States of the training loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrainerState {
    /// Waiting for the game client to report the start of the game.
    WaitingForGameStart,

    /// Running the steps of an episode.
    EpisodeRunning,

    /// Pausing after a round ended, within the same episode.
    RoundBoundaryPause,

    /// Pausing after the episode ended.
    EpisodeTerminalPause,

    /// The training run is over.
    TrainingComplete,
}

impl fmt::Display for TrainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::WaitingForGameStart => "waiting for game start",
            Self::EpisodeRunning => "episode running",
            Self::RoundBoundaryPause => "round boundary pause",
            Self::EpisodeTerminalPause => "episode terminal pause",
            Self::TrainingComplete => "training complete",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of a step that did not fail.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// The episode continues from the given state.
    Continue(Vec<f32>),

    /// A round ended; the next state is obtained after the recovery pause.
    RoundEnd,

    /// The episode ended. `round_end` is set when the same frame also
    /// closed a round.
    EpisodeEnd { round_end: bool },
}

/// Failure of a step, telling how far the training loop backs off.
#[derive(Debug, Error)]
pub enum StepError {
    /// The episode is abandoned and the run continues with the next one.
    #[error("Episode abandoned: {0:#}")]
    AbandonEpisode(anyhow::Error),

    /// The run is abandoned.
    #[error("Run abandoned: {0:#}")]
    AbandonRun(anyhow::Error),

    /// The bridge has been shut down.
    #[error("Shutdown")]
    Shutdown,
}

impl From<anyhow::Error> for StepError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<TankRlError>() {
            Some(TankRlError::Shutdown) => Self::Shutdown,
            Some(TankRlError::TelemetryTimeout(_)) => Self::AbandonEpisode(e),
            _ => Self::AbandonRun(e),
        }
    }
}

/// Statistics of a finished training run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingSummary {
    /// The number of episodes that completed.
    pub n_episodes: usize,

    /// The number of episodes abandoned because telemetry stopped.
    pub n_abandoned: usize,

    /// The number of steps over all episodes.
    pub n_steps: usize,

    /// Replay has started.
    pub replay_active: bool,

    /// Checkpoints written.
    pub checkpoints: Vec<PathBuf>,
}

/// Manages the training loop.
///
/// # Training loop
///
/// For each episode `1..=n_episode`:
///
/// 1. Wait until the game has started, logging a message every
///    `start_poll_interval`.
/// 2. Take a fresh state from the [`Bridge`], then run up to `max_step` steps:
///     1. Choose an action with [`PolicyModel::act`], decode it and send it
///        to the game client.
///     2. Sleep for `step_delay`, then wait for the next frame, which carries
///        the next state and the reward.
///     3. Push the transition into the replay buffer. If the buffer holds
///        more than `initial_replay_size` transitions, sample a batch and
///        call [`PolicyModel::replay`]. The first replay latches the
///        *replay active* flag for the rest of the run.
///     4. Append an [`EpisodeRecord`] to the recorder.
///     5. If the frame ended a round, sleep for `round_delay` and take a
///        fresh state. If it ended the episode, sleep for `episode_delay`
///        and leave the step loop. A frame ending both sleeps for
///        `round_delay`, then for `episode_delay`.
/// 3. If replay is active and the episode index is a multiple of
///    `save_network`, soft-update the target network and save a checkpoint.
///    If replay is active, decay the exploration rate.
///
/// A telemetry timeout abandons the current episode. Any other failure of a
/// step abandons the run and is returned as an error. When the bridge is shut
/// down, the run ends without an error.
pub struct Trainer {
    config: TrainerConfig,
    state: TrainerState,
    replay_active: bool,
    summary: TrainingSummary,
}

impl Trainer {
    /// Constructs a trainer.
    ///
    /// Fails if `batch_size` is zero, since replay could never update the
    /// model.
    pub fn build(config: TrainerConfig) -> Result<Self> {
        ensure!(config.batch_size > 0, "Batch size must be positive");
        Ok(Self {
            config,
            state: TrainerState::WaitingForGameStart,
            replay_active: false,
            summary: TrainingSummary::default(),
        })
    }

    /// The configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// The current state of the training loop.
    pub fn state(&self) -> TrainerState {
        self.state
    }

    fn set_state(&mut self, state: TrainerState) {
        if self.state != state {
            debug!("Trainer state: {} -> {}", self.state, state);
            self.state = state;
        }
    }

    fn wait_game_start<C: EnvCodec>(&mut self, bridge: &Bridge<C>) -> Result<(), StepError> {
        self.set_state(TrainerState::WaitingForGameStart);
        let poll = TrainerConfig::duration(self.config.start_poll_interval);
        while !bridge.wait_game_started(poll)? {
            info!("Waiting game start...");
        }
        Ok(())
    }

    /// Performs a step from `state`.
    #[allow(clippy::too_many_arguments)]
    pub fn step<C, P, R>(
        &mut self,
        bridge: &Bridge<C>,
        agent: &mut P,
        buffer: &mut R,
        recorder: &mut dyn Recorder,
        state: Vec<f32>,
        episode: usize,
        step: usize,
        total_reward: &mut f32,
    ) -> Result<StepOutcome, StepError>
    where
        C: EnvCodec,
        P: PolicyModel,
        R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase<Batch = Vec<Transition>>,
    {
        let action = agent.act(&state)?;
        let command = bridge.decode_action(action)?;
        bridge.send_action(&command)?;
        trace!("Sent {} for action {}", command, action);

        // The command takes effect asynchronously
        bridge.pause(TrainerConfig::duration(self.config.step_delay))?;
        let frame = bridge.wait_frame(TrainerConfig::duration(self.config.telemetry_timeout))?;
        let done = frame.is_episode_end;
        let reward = frame.reward;

        buffer.push(Transition::new(
            state,
            action,
            reward,
            done,
            frame.state.clone(),
        ))?;

        if buffer.len() > self.config.initial_replay_size {
            match buffer.batch(self.config.batch_size) {
                Ok(batch) => {
                    agent.replay(&batch, self.config.batch_size)?;
                    if !self.replay_active {
                        info!(
                            "Replay started at episode {}, step {} (buffer length {})",
                            episode,
                            step,
                            buffer.len()
                        );
                        self.replay_active = true;
                    }
                }
                Err(e) => match e.downcast_ref::<TankRlError>() {
                    Some(TankRlError::InsufficientData { .. }) => {
                        debug!("Skip replay: {}", e);
                    }
                    _ => return Err(e.into()),
                },
            }
        }

        *total_reward += reward;
        recorder.write(EpisodeRecord {
            episode,
            step,
            reward,
            total_reward: *total_reward,
            action,
            epsilon: agent.epsilon(),
            done,
            termination_code: frame.termination_code,
        })?;
        debug!(
            "Episode {}, step {}: action = {}, reward = {}, total reward = {}",
            episode, step, action, reward, total_reward
        );

        if done {
            Ok(StepOutcome::EpisodeEnd {
                round_end: frame.is_round_end,
            })
        } else if frame.is_round_end {
            Ok(StepOutcome::RoundEnd)
        } else {
            Ok(StepOutcome::Continue(frame.state))
        }
    }

    fn run_episode<C, P, R>(
        &mut self,
        bridge: &Bridge<C>,
        agent: &mut P,
        buffer: &mut R,
        recorder: &mut dyn Recorder,
        episode: usize,
    ) -> Result<(), StepError>
    where
        C: EnvCodec,
        P: PolicyModel,
        R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase<Batch = Vec<Transition>>,
    {
        let timeout = TrainerConfig::duration(self.config.telemetry_timeout);
        self.wait_game_start(bridge)?;
        self.set_state(TrainerState::EpisodeRunning);
        let mut state = bridge.wait_state(timeout)?;
        let mut total_reward = 0f32;
        let mut n_steps = 0;

        while n_steps < self.config.max_step {
            n_steps += 1;
            let outcome = self.step(
                bridge,
                agent,
                buffer,
                recorder,
                state,
                episode,
                n_steps,
                &mut total_reward,
            );
            if outcome.is_ok() {
                self.summary.n_steps += 1;
            }
            match outcome? {
                StepOutcome::Continue(next_state) => state = next_state,
                StepOutcome::RoundEnd => {
                    self.set_state(TrainerState::RoundBoundaryPause);
                    info!("Next round...");
                    bridge.pause(TrainerConfig::duration(self.config.round_delay))?;
                    self.set_state(TrainerState::EpisodeRunning);
                    state = bridge.wait_state(timeout)?;
                }
                StepOutcome::EpisodeEnd { round_end } => {
                    if round_end {
                        self.set_state(TrainerState::RoundBoundaryPause);
                        info!("Next round...");
                        bridge.pause(TrainerConfig::duration(self.config.round_delay))?;
                    }
                    self.set_state(TrainerState::EpisodeTerminalPause);
                    info!(
                        "Episode {} ended at step {} (termination code {})",
                        episode,
                        n_steps,
                        bridge.termination_code()
                    );
                    bridge.pause(TrainerConfig::duration(self.config.episode_delay))?;
                    break;
                }
            }
        }
        if n_steps == self.config.max_step && !bridge.check_episode_end() {
            info!("Episode {} reached the step limit", episode);
        }

        self.complete_episode(agent, episode, n_steps, total_reward)
    }

    fn complete_episode<P: PolicyModel>(
        &mut self,
        agent: &mut P,
        episode: usize,
        n_steps: usize,
        total_reward: f32,
    ) -> Result<(), StepError> {
        let save_network = self.config.save_network;
        if self.replay_active && save_network > 0 && episode % save_network == 0 {
            agent.target_train()?;
            let name = format!(
                "DQNmodel_{}_ep{}",
                Local::now().format("%Y%m%d-%H%M"),
                episode
            );
            match agent.save_model(Path::new(&self.config.model_dir), &name) {
                Ok(path) => {
                    info!("Saved the model in {:?}", path);
                    self.summary.checkpoints.push(path);
                }
                Err(e) => warn!("Failed to save the model {}: {:#}", name, e),
            }
        }

        info!(
            "Episode: {}/{}, steps: {}, total reward: {}, epsilon: {:.4}",
            episode, self.config.n_episode, n_steps, total_reward, agent.epsilon()
        );

        if self.replay_active {
            agent.update_epsilon();
        }
        self.summary.n_episodes += 1;
        Ok(())
    }

    /// Trains the agent.
    ///
    /// Returns an error if a step failed for a reason other than a telemetry
    /// timeout or a shutdown of the bridge.
    pub fn train<C, P, R>(
        &mut self,
        bridge: &Bridge<C>,
        agent: &mut P,
        buffer: &mut R,
        recorder: &mut dyn Recorder,
    ) -> Result<TrainingSummary>
    where
        C: EnvCodec,
        P: PolicyModel,
        R: ExperienceBufferBase<Item = Transition> + ReplayBufferBase<Batch = Vec<Transition>>,
    {
        self.replay_active = false;
        self.summary = TrainingSummary::default();

        for episode in 1..=self.config.n_episode {
            match self.run_episode(bridge, agent, buffer, recorder, episode) {
                Ok(()) => {}
                Err(StepError::AbandonEpisode(e)) => {
                    warn!("Abandoned episode {}: {:#}", episode, e);
                    self.summary.n_abandoned += 1;
                }
                Err(StepError::AbandonRun(e)) => {
                    error!("Abandoned the training run at episode {}: {:#}", episode, e);
                    self.set_state(TrainerState::TrainingComplete);
                    recorder.flush()?;
                    return Err(e.context(format!("Training failed at episode {}", episode)));
                }
                Err(StepError::Shutdown) => {
                    info!("Training interrupted at episode {}", episode);
                    break;
                }
            }
        }

        self.set_state(TrainerState::TrainingComplete);
        recorder.flush()?;
        self.summary.replay_active = self.replay_active;
        info!(
            "Training complete: {} episodes, {} steps",
            self.summary.n_episodes, self.summary.n_steps
        );

        Ok(self.summary.clone())
    }
}
