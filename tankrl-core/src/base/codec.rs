//! Environment codec and control interfaces.
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Commands understood by the game client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Command {
    /// Move the tank toward the target position.
    MoveTo,

    /// Fire at the target position.
    Fire,
}

impl Command {
    /// Numeric code of the command on the wire.
    pub fn code(&self) -> u8 {
        match self {
            Self::MoveTo => 0,
            Self::Fire => 1,
        }
    }
}

/// A decoded action ready to be sent to the game client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControlCommand {
    /// What to do.
    pub command: Command,

    /// Target position `(x, y)` in map cells.
    pub pos: (i32, i32),
}

impl ControlCommand {
    /// Constructs a command.
    pub fn new(command: Command, pos: (i32, i32)) -> Self {
        Self { command, pos }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({}, {})", self.command, self.pos.0, self.pos.1)
    }
}

/// A telemetry payload decoded by an [`EnvCodec`].
///
/// `context` carries whatever the codec needs later to turn an action index
/// into a [`ControlCommand`], for example the player's position.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame<X> {
    /// State vector fed to the policy model.
    pub state: Vec<f32>,

    /// Reward carried by this frame.
    pub reward: f32,

    /// A round of the match ended with this frame.
    pub is_round_end: bool,

    /// The episode ended with this frame.
    pub is_episode_end: bool,

    /// Reason of the episode end reported by the game, `0` while running.
    pub termination_code: i32,

    /// The game has started.
    pub is_started: bool,

    /// The game client waits for a control response before sending more telemetry.
    pub action_request: bool,

    /// Codec specific data kept for decoding actions.
    pub context: X,
}

/// Converts raw telemetry into frames and action indices into commands.
pub trait EnvCodec: Send + Sync {
    /// Data kept from the latest frame for decoding actions.
    type Context: Clone + fmt::Debug + Send;

    /// Decodes a telemetry payload.
    fn decode(&self, payload: &Value) -> Result<Frame<Self::Context>>;

    /// Maps a discrete action index to a game command.
    fn decode_action(&self, index: usize, context: &Self::Context) -> Result<ControlCommand>;

    /// Dimension of the state vectors produced by [`EnvCodec::decode`].
    fn state_dim(&self) -> usize;

    /// Number of discrete actions accepted by [`EnvCodec::decode_action`].
    fn n_actions(&self) -> usize;
}

/// Delivers control commands back to the game client.
pub trait ControlSink: Send + Sync {
    /// Emits a command to the connected client.
    ///
    /// Called while the bridge is locked, so this must not block on the
    /// client or call back into the bridge.
    fn emit_control(&self, command: &ControlCommand) -> Result<()>;
}
