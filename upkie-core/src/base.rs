//! Core functionalities.
mod env;
mod policy;
mod reward;
mod step;
pub use env::Env;
pub use policy::Policy;
pub use reward::{Reward, SurvivalReward};
use std::fmt::Debug;
pub use step::{Info, Step};

/// Vectorized observation of an environment.
///
/// This is what agents consume. The full observation mapping sent by the
/// spine travels separately in [`Env::Info`].
pub trait Obs: Clone + Debug {
    /// Returns the number of entries in the observation vector.
    fn len(&self) -> usize;
}

/// Vectorized action of an environment.
pub trait Act: Clone + Debug {}
