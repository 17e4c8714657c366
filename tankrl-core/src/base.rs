//! Core functionalities.
mod codec;
mod policy;
mod replay_buffer;
mod transition;
pub use codec::{Command, ControlCommand, ControlSink, EnvCodec, Frame};
pub use policy::{Configurable, PolicyModel};
pub use replay_buffer::{ExperienceBufferBase, ReplayBufferBase};
pub use transition::Transition;
