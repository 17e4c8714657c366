//! This module is used for tests.
//!
//! It provides a codec for a minimal telemetry format, a policy model that
//! counts calls instead of learning, a control sink backed by a channel and
//! a scripted game client answering commands with prepared frames.
use crate::{
    error::TankRlError, Bridge, Command, ControlCommand, ControlSink, EnvCodec, Frame,
    PolicyModel, Transition,
};
use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde_json::{json, Value};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

/// Creates a telemetry payload understood by [`DummyCodec`].
///
/// The game is started, an action is requested and no boundary is reached.
pub fn frame_json(state: &[f32], reward: f32) -> Value {
    json!({
        "state": state,
        "reward": reward,
        "round_end": false,
        "game_end": false,
        "termination_code": 0,
        "started": true,
        "request_action": true,
    })
}

/// Creates the frames of one episode of `n_steps` steps.
///
/// The first frame is the initial state, followed by one frame per step.
/// Frames of the steps in `round_ends` close a round and the last frame
/// closes the episode with `termination_code`.
pub fn episode_frames(
    n_steps: usize,
    round_ends: &[usize],
    termination_code: i32,
) -> Vec<Value> {
    (0..=n_steps)
        .map(|step| {
            let mut frame = frame_json(&[step as f32, 0.0], 1.0);
            if round_ends.contains(&step) {
                frame["round_end"] = json!(true);
            }
            if step == n_steps {
                frame["game_end"] = json!(true);
                frame["termination_code"] = json!(termination_code);
            }
            frame
        })
        .collect()
}

/// Codec of a flat telemetry format.
///
/// The payload carries the state vector in `state` and the flags under the
/// names used by the game client. Action 0 is [`Command::Fire`], the others
/// are [`Command::MoveTo`] with the action index as the x coordinate.
pub struct DummyCodec {
    state_dim: usize,
    n_actions: usize,
}

impl DummyCodec {
    /// Constructs the codec.
    pub fn new(state_dim: usize, n_actions: usize) -> Self {
        Self {
            state_dim,
            n_actions,
        }
    }
}

impl EnvCodec for DummyCodec {
    type Context = ();

    fn decode(&self, payload: &Value) -> Result<Frame<()>> {
        let state = payload["state"]
            .as_array()
            .ok_or_else(|| TankRlError::Codec("state is not an array".to_string()))?
            .iter()
            .map(|v| v.as_f64().map(|v| v as f32))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| TankRlError::Codec("state has a non-numeric value".to_string()))?;
        if state.len() != self.state_dim {
            return Err(TankRlError::Codec(format!(
                "state has {} values, expected {}",
                state.len(),
                self.state_dim
            ))
            .into());
        }
        let flag = |key: &str| payload[key].as_bool().unwrap_or(false);

        Ok(Frame {
            state,
            reward: payload["reward"].as_f64().unwrap_or(0.0) as f32,
            is_round_end: flag("round_end"),
            is_episode_end: flag("game_end"),
            termination_code: payload["termination_code"].as_i64().unwrap_or(0) as i32,
            is_started: flag("started"),
            action_request: flag("request_action"),
            context: (),
        })
    }

    fn decode_action(&self, index: usize, _context: &()) -> Result<ControlCommand> {
        match index {
            0 => Ok(ControlCommand::new(Command::Fire, (0, 0))),
            i if i < self.n_actions => Ok(ControlCommand::new(Command::MoveTo, (i as i32, 0))),
            i => Err(TankRlError::Codec(format!("action index {} out of range", i)).into()),
        }
    }

    fn state_dim(&self) -> usize {
        self.state_dim
    }

    fn n_actions(&self) -> usize {
        self.n_actions
    }
}

/// Policy model recording how the training loop drives it.
#[derive(Debug, Clone)]
pub struct DummyPolicy {
    n_actions: usize,
    epsilon: f32,
    epsilon_min: f32,

    /// The number of calls of [`PolicyModel::act`].
    pub n_act: usize,

    /// Values of `n_act` when [`PolicyModel::replay`] was called.
    pub replays: Vec<usize>,

    /// The number of calls of [`PolicyModel::target_train`].
    pub n_target_train: usize,

    /// The number of calls of [`PolicyModel::update_epsilon`].
    pub n_update_epsilon: usize,

    /// Makes [`PolicyModel::save_model`] fail.
    pub fail_save: bool,

    /// Makes the n-th call of [`PolicyModel::act`] fail, counted from 1.
    pub fail_act_at: Option<usize>,
}

impl DummyPolicy {
    /// Constructs a policy with exploration rate 1.0, halved on every decay step.
    pub fn new(n_actions: usize) -> Self {
        Self {
            n_actions,
            epsilon: 1.0,
            epsilon_min: 0.01,
            n_act: 0,
            replays: vec![],
            n_target_train: 0,
            n_update_epsilon: 0,
            fail_save: false,
            fail_act_at: None,
        }
    }
}

impl PolicyModel for DummyPolicy {
    fn act(&mut self, state: &[f32]) -> Result<usize> {
        self.n_act += 1;
        if self.fail_act_at == Some(self.n_act) {
            anyhow::bail!("act failed at call {}", self.n_act);
        }
        Ok((self.n_act + state.len()) % self.n_actions)
    }

    fn replay(&mut self, batch: &[Transition], batch_size: usize) -> Result<()> {
        assert_eq!(batch.len(), batch_size);
        self.replays.push(self.n_act);
        Ok(())
    }

    fn target_train(&mut self) -> Result<()> {
        self.n_target_train += 1;
        Ok(())
    }

    fn update_epsilon(&mut self) {
        self.n_update_epsilon += 1;
        self.epsilon = (self.epsilon * 0.5).max(self.epsilon_min);
    }

    fn epsilon(&self) -> f32 {
        self.epsilon
    }

    fn save_model(&self, dir: &Path, name: &str) -> Result<PathBuf> {
        if self.fail_save {
            anyhow::bail!("failed to save {}", name);
        }
        Ok(dir.join(name))
    }

    fn load_model(&mut self, _path: &Path) -> Result<()> {
        Ok(())
    }
}

/// Forwards commands to a channel.
pub struct ChannelSink {
    tx: Sender<ControlCommand>,
}

impl ChannelSink {
    /// Constructs a sink and the receiving end of its channel.
    pub fn channel() -> (Self, Receiver<ControlCommand>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl ControlSink for ChannelSink {
    fn emit_control(&self, command: &ControlCommand) -> Result<()> {
        self.tx.send(*command)?;
        Ok(())
    }
}

/// A game client playing back prepared frames in lockstep.
///
/// The first frame is ingested right away. Each following frame is ingested
/// as the answer to a command. After a frame closing a round or an episode,
/// or one that does not request an action, the next frame is sent without a
/// command, as soon as the training loop has taken that frame.
pub struct ScriptedGame {
    handle: JoinHandle<Vec<ControlCommand>>,
}

impl ScriptedGame {
    /// Installs a [`ChannelSink`] in `bridge` and starts playing `frames`.
    ///
    /// The game stops sending frames when they are exhausted or when no
    /// command arrives within `timeout`. It keeps receiving commands until
    /// the bridge is shut down.
    pub fn spawn<C: EnvCodec + 'static>(
        bridge: Arc<Bridge<C>>,
        frames: Vec<Value>,
        timeout: Duration,
    ) -> Self {
        let (sink, rx) = ChannelSink::channel();
        bridge.set_control_sink(Arc::new(sink));

        let handle = thread::spawn(move || {
            let mut commands = vec![];
            let mut boundary = false;
            for (i, frame) in frames.into_iter().enumerate() {
                if i > 0 && boundary {
                    while bridge.poll_ready() && !bridge.is_shutdown() {
                        thread::sleep(Duration::from_millis(1));
                    }
                } else if i > 0 {
                    match rx.recv_timeout(timeout) {
                        Ok(command) => commands.push(command),
                        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                            break
                        }
                    }
                }
                if bridge.is_shutdown() {
                    break;
                }
                boundary = frame["round_end"].as_bool().unwrap_or(false)
                    || frame["game_end"].as_bool().unwrap_or(false)
                    || !frame["request_action"].as_bool().unwrap_or(true);
                if bridge.ingest(frame).is_err() {
                    break;
                }
            }

            // Stay connected until the run is over
            while !bridge.is_shutdown() {
                if let Ok(command) = rx.recv_timeout(Duration::from_millis(10)) {
                    commands.push(command);
                }
            }
            commands
        });

        Self { handle }
    }

    /// Waits for the game to finish, returning the commands it received.
    pub fn join(self) -> Vec<ControlCommand> {
        self.handle.join().unwrap_or_default()
    }
}
