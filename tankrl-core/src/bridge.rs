//! Environment bridge between the telemetry stream and the training loop.
//!
//! The game client pushes telemetry whenever it is ready for the next
//! decision. The network task hands every payload to [`Bridge::ingest`],
//! while the training loop pulls decoded states one at a time with
//! [`Bridge::take_state`] or [`Bridge::wait_state`].
//!
//! The bridge is a single-slot mailbox: a state that has not been read yet
//! is overwritten by the next one instead of being queued. Reading a state
//! clears the slot, so a decoded state is handed to the training loop at
//! most once.
mod base;
pub use base::Bridge;
