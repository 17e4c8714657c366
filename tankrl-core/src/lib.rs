#![warn(missing_docs)]
//! Episodic training controller for a tank game played over a telemetry stream.
//!
//! The game client pushes telemetry frames over the network. A transport
//! hands them to the [`Bridge`], a single-slot mailbox shared with the
//! [`Trainer`]. The trainer pulls one state per step, asks a
//! [`PolicyModel`] for an action, sends the decoded command back through
//! the bridge and stores the resulting [`Transition`] in a replay buffer
//! implementing [`ReplayBufferBase`].
pub mod bridge;
pub mod dummy;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Command, Configurable, ControlCommand, ControlSink, EnvCodec, ExperienceBufferBase, Frame,
    PolicyModel, ReplayBufferBase, Transition,
};
pub use bridge::Bridge;

mod trainer;
pub use trainer::{StepError, StepOutcome, Trainer, TrainerConfig, TrainerState, TrainingSummary};
