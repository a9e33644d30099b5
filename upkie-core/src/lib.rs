#![warn(missing_docs)]
//! Core traits for environments exchanging observations and actions with a
//! robot spine.
//!
//! This crate does not know about any concrete robot or spine. It defines the
//! vocabulary shared by agents and environments:
//!
//! * [`Env`] with its blocking [`Env::step`] and suspending [`Env::async_step`],
//! * [`Step`], the outcome of one control tick,
//! * [`Policy`] and [`Reward`],
//! * [`record`] for per-step diagnostics,
//! * [`UpkieError`], the error kinds raised by the runtime.
pub mod error;
pub mod record;
pub mod util;

mod base;
pub use base::{Act, Env, Info, Obs, Policy, Reward, Step, SurvivalReward};
pub use error::UpkieError;

#[cfg(test)]
mod dummy;
