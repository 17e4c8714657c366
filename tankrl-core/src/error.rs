//! Errors in the library.
use std::time::Duration;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum TankRlError {
    /// No new decoded frame is available in the bridge.
    #[error("No new frame is ready in the environment bridge")]
    NotReady,

    /// The replay buffer holds fewer transitions than requested.
    #[error("Insufficient data in replay buffer: len = {len}, batch size = {batch_size}")]
    InsufficientData {
        /// The number of transitions in the buffer.
        len: usize,

        /// The requested batch size.
        batch_size: usize,
    },

    /// No telemetry frame arrived within the bounded wait.
    #[error("No telemetry frame within {0:?}")]
    TelemetryTimeout(Duration),

    /// The bridge has been shut down.
    #[error("Environment bridge has been shut down")]
    Shutdown,

    /// Telemetry could not be decoded into a frame, or an action index could not be decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// An action was sent before any transport installed its control sink.
    #[error("No control sink is installed in the environment bridge")]
    NoControlSink,
}
