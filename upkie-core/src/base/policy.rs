//! Policy.
use super::Env;

/// A policy on an environment.
///
/// Policy is a mapping from an observation to an action. It can be a
/// classical balancer or a learned model.
pub trait Policy<E: Env> {
    /// Sample an action given an observation.
    fn sample(&mut self, obs: &E::Obs) -> E::Act;
}
