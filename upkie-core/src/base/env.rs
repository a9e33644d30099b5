//! Environment.
use super::{Act, Info, Obs, Step};
use crate::record::Record;
use anyhow::Result;
use async_trait::async_trait;

/// Represents an environment paced by a control loop.
///
/// An episode starts with [`Env::reset`]. Steps are then taken either with
/// [`Env::step`] from a plain blocking call sequence, or with
/// [`Env::async_step`] from a single task of a cooperative event loop.
/// Implementations may reject mixing both forms within one episode.
#[async_trait(?Send)]
pub trait Env: Sized {
    /// Observation of the environment.
    type Obs: Obs;

    /// Action of the environment.
    type Act: Act;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Resets the environment and returns the first observation.
    ///
    /// `seed`, when given, re-seeds the random number generator of the
    /// environment before the new episode is drawn.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Self::Obs, Self::Info)>;

    /// Performs an environment step, blocking until the next control tick.
    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>;

    /// Performs an environment step, suspending until the next control tick.
    async fn async_step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)>;

    /// Releases the resources held by the environment.
    ///
    /// Calling this method more than once is not an error.
    fn close(&mut self) -> Result<()>;
}
