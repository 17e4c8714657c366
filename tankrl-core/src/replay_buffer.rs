//! A generic implementation of replay buffer.
mod base;
mod config;
pub use base::SimpleReplayBuffer;
pub use config::SimpleReplayBufferConfig;
