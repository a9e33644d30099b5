//! Reward.

/// Reward function `R(o, a)`.
///
/// Rewards are supplied by the agent; the environment only calls them once
/// per step with the vectorized observation and the action that led to it.
pub trait Reward<O, A> {
    /// Get the reward earned by executing `action` and observing `observation`.
    fn get(&self, observation: &O, action: &A) -> f64;
}

/// Reward of one for every step survived.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SurvivalReward;

impl<O, A> Reward<O, A> for SurvivalReward {
    fn get(&self, _observation: &O, _action: &A) -> f64 {
        1.0
    }
}
