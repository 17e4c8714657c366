//! Per-step log record.
use serde::{Deserialize, Serialize};

/// One row of the training log, written once per environment step.
///
/// Column names follow the header of the persisted log:
/// `Episode,Step,Reward,Total_reward,Action,Epsilon,Done,Termination_Code`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EpisodeRecord {
    /// Episode index, starting from 1.
    #[serde(rename = "Episode")]
    pub episode: usize,

    /// Step index within the episode, starting from 1.
    #[serde(rename = "Step")]
    pub step: usize,

    /// Reward of this step.
    #[serde(rename = "Reward")]
    pub reward: f32,

    /// Cumulative reward of the episode up to this step.
    #[serde(rename = "Total_reward")]
    pub total_reward: f32,

    /// Action index taken.
    #[serde(rename = "Action")]
    pub action: usize,

    /// Exploration rate at this step.
    #[serde(rename = "Epsilon")]
    pub epsilon: f32,

    /// The episode ended with this step.
    #[serde(rename = "Done")]
    pub done: bool,

    /// Termination code reported by the game.
    #[serde(rename = "Termination_Code")]
    pub termination_code: i32,
}
