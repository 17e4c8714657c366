//! Configuration of [`TankCodec`](crate::TankCodec).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`TankCodec`](crate::TankCodec).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TankCodecConfig {
    /// Width of the map in cells.
    pub map_width: usize,

    /// Height of the map in cells.
    pub map_height: usize,

    /// Distance of a single move in cells.
    pub move_step: i32,

    /// Ammunition capacity of the tank, used to normalize the ammo count.
    pub max_ammo: f32,

    /// Value written to the map cells occupied by enemies.
    pub enemy_mark: f32,
}

impl Default for TankCodecConfig {
    fn default() -> Self {
        Self {
            map_width: 40,
            map_height: 40,
            move_step: 1,
            max_ammo: 10.0,
            enemy_mark: 2.0,
        }
    }
}

impl TankCodecConfig {
    /// Sets the map size.
    pub fn map_size(mut self, width: usize, height: usize) -> Self {
        self.map_width = width;
        self.map_height = height;
        self
    }

    /// Sets the distance of a single move.
    pub fn move_step(mut self, v: i32) -> Self {
        self.move_step = v;
        self
    }

    /// Sets the ammunition capacity.
    pub fn max_ammo(mut self, v: f32) -> Self {
        self.max_ammo = v;
        self
    }

    /// Sets the value of enemy cells.
    pub fn enemy_mark(mut self, v: f32) -> Self {
        self.enemy_mark = v;
        self
    }

    /// Constructs [`TankCodecConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TankCodecConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
