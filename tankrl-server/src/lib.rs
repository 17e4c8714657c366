//! WebSocket transport between the tank game client and the training loop.
//!
//! Every WebSocket text frame carries a JSON envelope
//! `{"event": <name>, "data": <object>}`. Telemetry events are handed to the
//! [`Bridge`](tankrl_core::Bridge), and commands sent through the bridge go
//! out as `control` events to the most recently connected client, with all
//! fields stringified:
//!
//! ```json
//! {"event": "control", "data": {"action": "1", "pos_x": "3", "pos_y": "7"}}
//! ```
mod config;
mod message;
mod server;
mod sink;
pub use config::ServerConfig;
pub use message::{ControlData, Envelope};
pub use server::TankServer;
pub use sink::WsControlSink;
