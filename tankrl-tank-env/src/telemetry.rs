//! Telemetry sent by the game client.
use serde::{Deserialize, Serialize};

/// A cell position on the map.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

/// Status of the controlled tank.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Player {
    pub x: i32,
    pub y: i32,
    pub hp: f32,
    pub ammo: f32,
    pub angle: f32,
    pub score: f32,
}

/// A single telemetry message.
///
/// Missing flags are read as `false`, a missing reward as `0`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Telemetry {
    pub started: bool,
    pub round_end: bool,
    pub game_end: bool,
    pub termination_code: i32,
    pub reward: f32,
    pub request_action: bool,
    pub player: Player,
    pub enemies: Vec<Position>,
    pub map: Vec<Vec<f32>>,
}

impl Player {
    /// Position of the tank.
    pub fn position(&self) -> Position {
        Position {
            x: self.x,
            y: self.y,
        }
    }
}
