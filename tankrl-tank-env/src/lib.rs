//! Telemetry codec of the tank game.
//!
//! [`TankCodec`] implements [`EnvCodec`](tankrl_core::EnvCodec) for the JSON
//! telemetry sent by the game client:
//!
//! ```json
//! { "started": true, "round_end": false, "game_end": false, "termination_code": 0,
//!   "reward": 0.5, "request_action": true,
//!   "player": {"x": 3, "y": 4, "hp": 100, "ammo": 10, "angle": 90, "score": 0},
//!   "enemies": [{"x": 10, "y": 12}], "map": [[0, 1, 0], [0, 0, 0]] }
//! ```
//!
//! The state vector is the map grid in row-major order, where the cells
//! occupied by enemies are overwritten with
//! [`TankCodecConfig::enemy_mark`], followed by six player features.
//!
//! Actions:
//!
//! | Index | Command | Target |
//! |---|---|---|
//! | 0 | `Fire` | nearest enemy, or the player itself if no enemy is visible |
//! | 1 | `MoveTo` | up |
//! | 2 | `MoveTo` | down |
//! | 3 | `MoveTo` | left |
//! | 4 | `MoveTo` | right |
mod codec;
mod config;
mod telemetry;
pub use codec::{TankCodec, TankContext, N_PLAYER_FEATURES};
pub use config::TankCodecConfig;
pub use telemetry::{Player, Position, Telemetry};
