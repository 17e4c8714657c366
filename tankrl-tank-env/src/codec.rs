use crate::{Position, TankCodecConfig, Telemetry};
use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;
use tankrl_core::{error::TankRlError, Command, ControlCommand, EnvCodec, Frame};

/// The number of player features appended to the map cells.
pub const N_PLAYER_FEATURES: usize = 6;

/// Data of the latest frame needed to decode actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TankContext {
    /// Position of the controlled tank.
    pub player: Position,

    /// Positions of the visible enemies.
    pub enemies: Vec<Position>,
}

impl TankContext {
    /// The enemy closest to the player, the first one on ties.
    pub fn nearest_enemy(&self) -> Option<Position> {
        let p = self.player;
        self.enemies
            .iter()
            .min_by_key(|e| {
                let dx = i128::from(e.x) - i128::from(p.x);
                let dy = i128::from(e.y) - i128::from(p.y);
                dx * dx + dy * dy
            })
            .copied()
    }
}

/// Codec of the tank game telemetry.
pub struct TankCodec {
    config: TankCodecConfig,
}

impl TankCodec {
    /// Constructs the codec.
    pub fn new(config: TankCodecConfig) -> Self {
        Self { config }
    }

    /// Configuration of the codec.
    pub fn config(&self) -> &TankCodecConfig {
        &self.config
    }

    fn check_map(&self, map: &[Vec<f32>]) -> Result<()> {
        let (w, h) = (self.config.map_width, self.config.map_height);
        if map.len() != h {
            return Err(codec_error(format!(
                "map has {} rows, expected {}",
                map.len(),
                h
            )));
        }
        if let Some((y, row)) = map.iter().enumerate().find(|(_, row)| row.len() != w) {
            return Err(codec_error(format!(
                "map row {} has {} cells, expected {}",
                y,
                row.len(),
                w
            )));
        }
        Ok(())
    }

    fn cell_index(&self, pos: &Position) -> Option<usize> {
        let (w, h) = (self.config.map_width as i32, self.config.map_height as i32);
        if (0..w).contains(&pos.x) && (0..h).contains(&pos.y) {
            Some((pos.y * w + pos.x) as usize)
        } else {
            None
        }
    }

    fn encode_state(&self, t: &Telemetry) -> Vec<f32> {
        let mut state = Vec::with_capacity(self.state_dim());
        for row in t.map.iter() {
            state.extend_from_slice(row);
        }
        for e in t.enemies.iter() {
            if let Some(i) = self.cell_index(e) {
                state[i] = self.config.enemy_mark;
            }
        }

        let c = &self.config;
        let p = &t.player;
        let ammo = if c.max_ammo > 0.0 {
            p.ammo / c.max_ammo
        } else {
            0.0
        };
        state.extend_from_slice(&[
            p.x as f32 / c.map_width as f32,
            p.y as f32 / c.map_height as f32,
            p.hp / 100.0,
            ammo,
            p.angle / 360.0,
            p.score,
        ]);
        state
    }

    fn clamp(&self, x: i32, y: i32) -> (i32, i32) {
        let max_x = (self.config.map_width as i32 - 1).max(0);
        let max_y = (self.config.map_height as i32 - 1).max(0);
        (x.clamp(0, max_x), y.clamp(0, max_y))
    }
}

impl Default for TankCodec {
    fn default() -> Self {
        Self::new(TankCodecConfig::default())
    }
}

impl EnvCodec for TankCodec {
    type Context = TankContext;

    fn decode(&self, payload: &Value) -> Result<Frame<TankContext>> {
        let t = Telemetry::deserialize(payload)
            .map_err(|e| codec_error(format!("malformed telemetry: {}", e)))?;
        self.check_map(&t.map)?;
        let state = self.encode_state(&t);

        Ok(Frame {
            state,
            reward: t.reward,
            is_round_end: t.round_end,
            is_episode_end: t.game_end,
            termination_code: t.termination_code,
            is_started: t.started,
            action_request: t.request_action,
            context: TankContext {
                player: t.player.position(),
                enemies: t.enemies,
            },
        })
    }

    fn decode_action(&self, index: usize, context: &TankContext) -> Result<ControlCommand> {
        let p = context.player;
        let d = self.config.move_step;
        let command = match index {
            0 => {
                let target = context.nearest_enemy().unwrap_or(p);
                ControlCommand::new(Command::Fire, (target.x, target.y))
            }
            // Saturate before clamping to the map
            1 => ControlCommand::new(Command::MoveTo, self.clamp(p.x, p.y.saturating_sub(d))),
            2 => ControlCommand::new(Command::MoveTo, self.clamp(p.x, p.y.saturating_add(d))),
            3 => ControlCommand::new(Command::MoveTo, self.clamp(p.x.saturating_sub(d), p.y)),
            4 => ControlCommand::new(Command::MoveTo, self.clamp(p.x.saturating_add(d), p.y)),
            _ => {
                return Err(codec_error(format!(
                    "action index {} is out of range 0..{}",
                    index,
                    self.n_actions()
                )))
            }
        };
        Ok(command)
    }

    fn state_dim(&self) -> usize {
        self.config.map_width * self.config.map_height + N_PLAYER_FEATURES
    }

    fn n_actions(&self) -> usize {
        5
    }
}

fn codec_error(msg: String) -> anyhow::Error {
    TankRlError::Codec(msg).into()
}
