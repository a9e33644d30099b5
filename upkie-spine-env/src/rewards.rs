//! Reward functions for wheeled balancing.
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;
use upkie_core::Reward;
pub use upkie_core::SurvivalReward;

/// Observation exposing the state of a wheeled inverted pendulum.
pub trait PendulumState {
    /// Returns `[pitch, ground_position, angular_velocity, ground_velocity]`.
    ///
    /// The pitch is in radians, positive when leaning forward. The angular
    /// velocity is the one of the base around its lateral axis.
    fn pendulum_state(&self) -> [f64; 4];
}

/// Reward for balancing in place, evaluated on a short lookahead.
///
/// The reward is `1 - w_p |(θ + T θ̇) / θ_max| - w_x |(p + T v) / p_max|`,
/// at most one.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StandingReward {
    /// Length `T` of the receding horizon, in seconds.
    pub lookahead_duration: f64,

    /// Maximum pitch angle expected, in radians.
    pub max_pitch: f64,

    /// Maximum ground position expected, in meters.
    pub max_position: f64,

    /// Weight of the pitch term.
    pub pitch_weight: f64,

    /// Weight of the position term.
    pub position_weight: f64,
}

impl Default for StandingReward {
    fn default() -> Self {
        Self {
            lookahead_duration: 0.1,
            max_pitch: FRAC_PI_2,
            max_position: 0.5,
            pitch_weight: 1.0,
            position_weight: 1.0,
        }
    }
}

impl StandingReward {
    /// Range of the reward.
    pub fn range() -> (f64, f64) {
        (f64::NEG_INFINITY, 1.0)
    }

    /// Sets the lookahead duration.
    pub fn lookahead_duration(mut self, v: f64) -> Self {
        self.lookahead_duration = v;
        self
    }

    /// Sets the weights of the pitch and position terms.
    pub fn weights(mut self, pitch_weight: f64, position_weight: f64) -> Self {
        self.pitch_weight = pitch_weight;
        self.position_weight = position_weight;
        self
    }

    /// Reward for a pendulum state.
    pub fn evaluate(&self, state: [f64; 4]) -> f64 {
        let [pitch, ground_position, angular_velocity, ground_velocity] = state;
        let t = self.lookahead_duration;
        let lookahead_pitch = pitch + t * angular_velocity;
        let lookahead_position = ground_position + t * ground_velocity;
        1.0 - self.pitch_weight * (lookahead_pitch / self.max_pitch).abs()
            - self.position_weight * (lookahead_position / self.max_position).abs()
    }
}

impl<O: PendulumState, A> Reward<O, A> for StandingReward {
    fn get(&self, observation: &O, _action: &A) -> f64 {
        self.evaluate(observation.pendulum_state())
    }
}

/// Height of the pendulum tip above the wheel axle, in meters.
pub const TIP_HEIGHT: f64 = 0.58;

/// Standard deviation of the tip position kernel, in meters.
pub const TIP_POSITION_STD: f64 = 0.05;

/// Reward keeping the tip of the pendulum above the contact point.
///
/// The reward is `w_p exp(-(x_tip / σ)²) - w_v |v_tip|`.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WheeledInvertedPendulumReward {
    /// Weight of the position term.
    pub position_weight: f64,

    /// Weight of the velocity term.
    pub velocity_weight: f64,
}

impl Default for WheeledInvertedPendulumReward {
    fn default() -> Self {
        Self {
            position_weight: 1.0,
            velocity_weight: 1.0,
        }
    }
}

impl WheeledInvertedPendulumReward {
    /// Sets the weights of the position and velocity terms.
    pub fn weights(mut self, position_weight: f64, velocity_weight: f64) -> Self {
        self.position_weight = position_weight;
        self.velocity_weight = velocity_weight;
        self
    }

    /// Reward for a pendulum state.
    pub fn evaluate(&self, state: [f64; 4]) -> f64 {
        let [pitch, ground_position, angular_velocity, ground_velocity] = state;
        let tip_position = ground_position + TIP_HEIGHT * pitch.sin();
        let tip_velocity = ground_velocity + TIP_HEIGHT * angular_velocity * pitch.cos();
        let position_reward = (-(tip_position / TIP_POSITION_STD).powi(2)).exp();
        let velocity_penalty = -tip_velocity.abs();
        self.position_weight * position_reward + self.velocity_weight * velocity_penalty
    }
}

impl<O: PendulumState, A> Reward<O, A> for WheeledInvertedPendulumReward {
    fn get(&self, observation: &O, _action: &A) -> f64 {
        self.evaluate(observation.pendulum_state())
    }
}
