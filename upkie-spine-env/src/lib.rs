//! Environments exchanging observations and actions with a robot spine.
//!
//! The spine is the process that runs the actuation and sensing loop of a
//! wheeled biped. An agent talks to it through [`SpineEnv`], which owns the
//! episode lifecycle:
//!
//! * [`Env::reset`](upkie_core::Env::reset) samples an initial state with
//!   [`InitRandomization`], writes it into the spine configuration, starts
//!   the spine and returns the first observation.
//! * [`Env::step`](upkie_core::Env::step) and
//!   [`Env::async_step`](upkie_core::Env::async_step) wait for the next tick
//!   of a [`Ticker`], send an action, read the resulting observation and
//!   detect falls from the base pitch computed by [`ImuCalibration`].
//!
//! ## Observation and action
//!
//! Observations and actions travel as JSON-like mappings between the engine
//! and the spine. Concrete environments implement [`SpineEnvConverter`] to
//! convert them to and from the vectors agents work with.
//! [`GroundVelocity`] is the built-in converter for balancing by commanding
//! a ground velocity, and [`Servos`] gives joint-level control of every
//! servo.
//!
//! ## Spine
//!
//! [`SpineInterface`] is the contract with the spine process.
//! [`MockSpine`] answers in-process and is what the tests run against.
//!
//! ## Example
//!
//! ```no_run
//! use anyhow::Result;
//! use upkie_core::{Env, SurvivalReward};
//! use upkie_spine_env::{
//!     GroundVelocity, GroundVelocityAct, GroundVelocityConfig, GroundVelocityEnv,
//!     MockSpine, SpineEnvConfig,
//! };
//!
//! fn main() -> Result<()> {
//!     let converter = GroundVelocity::new(GroundVelocityConfig::default())?;
//!     let mut env: GroundVelocityEnv<MockSpine> = GroundVelocityEnv::new(
//!         SpineEnvConfig::default(),
//!         MockSpine::new(),
//!         converter,
//!         SurvivalReward,
//!     )?;
//!     let (mut obs, _info) = env.reset(None)?;
//!     loop {
//!         let act = GroundVelocityAct(0.5 * obs.pitch());
//!         let (step, _record) = env.step(&act)?;
//!         if step.is_done() {
//!             break;
//!         }
//!         obs = step.obs;
//!     }
//!     env.close()
//! }
//! ```
pub mod filters;
pub mod init_randomization;
pub mod orientation;
pub mod rate;
pub mod rewards;
pub mod spine;
pub mod util;

mod base;
mod config;
mod ground_velocity;
mod servos;
pub use base::{EpisodeState, SpineEnv, SpineEnvConverter, SpineInfo};
pub use config::SpineEnvConfig;
pub use ground_velocity::{
    GroundVelocity, GroundVelocityAct, GroundVelocityConfig, GroundVelocityEnv, GroundVelocityObs,
    LEG_JOINTS,
};
pub use init_randomization::{InitRandomization, InitRandomizationUpdate, InitState};
pub use orientation::ImuCalibration;
pub use rate::{regulate, SchedulingMode, Ticker};
pub use rewards::{PendulumState, StandingReward, WheeledInvertedPendulumReward};
pub use servos::{
    JointLimit, ServoCommand, Servos, ServosAct, ServosConfig, ServosEnv, ServosObs, SERVO_JOINTS,
};
pub use spine::{MockSpine, SpineInterface};
