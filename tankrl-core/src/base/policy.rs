//! Policy model.
use super::Transition;
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// A trainable value-function model choosing discrete actions.
///
/// The training loop only talks to the model through this trait, so the
/// network architecture and optimizer stay behind it.
pub trait PolicyModel {
    /// Chooses an action index for the given state.
    ///
    /// The choice between exploration and exploitation is governed by the
    /// current exploration rate, see [`PolicyModel::epsilon`].
    fn act(&mut self, state: &[f32]) -> Result<usize>;

    /// Performs one update step with a sampled batch of transitions.
    fn replay(&mut self, batch: &[Transition], batch_size: usize) -> Result<()>;

    /// Soft-copies the online weights into the target weights.
    fn target_train(&mut self) -> Result<()>;

    /// Applies one decay step to the exploration rate.
    fn update_epsilon(&mut self);

    /// The current exploration rate.
    fn epsilon(&self) -> f32;

    /// Writes a snapshot of the model weights as `dir/name`, returning the written path.
    fn save_model(&self, dir: &Path, name: &str) -> Result<PathBuf>;

    /// Loads the model weights from a snapshot written by [`PolicyModel::save_model`].
    fn load_model(&mut self, path: &Path) -> Result<()>;
}

/// A configurable object.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}
