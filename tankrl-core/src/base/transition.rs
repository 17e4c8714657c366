//! Transition.

/// A single `(state, action, reward, done, next_state)` tuple recorded for replay.
///
/// A transition is never modified after construction. Once pushed, it is owned
/// by the replay buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// State vector observed before the action.
    pub state: Vec<f32>,

    /// Discrete action index chosen by the policy.
    pub action: usize,

    /// Reward received for the action.
    pub reward: f32,

    /// If the action terminated the episode.
    pub done: bool,

    /// State vector observed after the action.
    pub next_state: Vec<f32>,
}

impl Transition {
    /// Constructs a transition.
    pub fn new(
        state: Vec<f32>,
        action: usize,
        reward: f32,
        done: bool,
        next_state: Vec<f32>,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            done,
            next_state,
        }
    }
}
