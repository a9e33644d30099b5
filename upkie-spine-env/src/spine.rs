//! Interface to the spine, the process that talks to actuators and sensors.
//!
//! The spine runs its own loop and exchanges observation and action mappings
//! with the agent. Mappings are opaque to the environment engine apart from
//! the few entries it reads, so they are carried as [`serde_json::Value`].
mod mock;
use crate::init_randomization::InitState;
use anyhow::Result;
pub use mock::MockSpine;
use serde_json::{json, Value};

/// Request/response contract with a spine.
///
/// The engine owns its spine exclusively and always stops a running session
/// before starting a new one.
pub trait SpineInterface {
    /// Starts a new session with the given configuration mapping.
    ///
    /// May fail, e.g. while the spine process is still booting.
    fn start(&mut self, config: &Value) -> Result<()>;

    /// Stops the current session. Stopping a stopped spine is not an error.
    fn stop(&mut self) -> Result<()>;

    /// Blocks until the spine sends its latest observation.
    ///
    /// The first observation after [`SpineInterface::start`] may predate the
    /// new session.
    fn get_observation(&mut self) -> Result<Value>;

    /// Sends an action mapping without waiting for any acknowledgment.
    fn set_action(&mut self, action: &Value) -> Result<()>;
}

/// Default spine configuration used by environments.
pub fn default_spine_config() -> Value {
    json!({
        "bullet": {
            "follower_camera": false,
            "gui": true,
            "reset": {
                "orientation_base_in_world": [1.0, 0.0, 0.0, 0.0],
                "position_base_in_world": [0.0, 0.0, 0.6],
            },
            "torque_control": {
                "kp": 20.0,
                "kd": 1.0,
            },
        },
        "floor_contact": {
            "upper_leg_torque_threshold": 10.0,
        },
        "wheel_contact": {
            "cutoff_period": 0.2,
            "liftoff_inertia": 0.001,
            "min_touchdown_acceleration": 2.0,
            "min_touchdown_torque": 0.015,
            "touchdown_inertia": 0.004,
        },
        "wheel_odometry": {
            "signed_radius": {
                "left_wheel": 0.05,
                "right_wheel": -0.05,
            },
        },
    })
}

/// Merges `overrides` into `base` recursively.
///
/// Mappings present on both sides are merged key by key, any other value in
/// `overrides` replaces the one in `base`.
pub fn merge_config(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(key) {
                    Some(entry) => merge_config(entry, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Writes a sampled initial state under `bullet.reset` of a spine configuration.
pub fn write_init_state(config: &mut Value, state: &InitState) {
    merge_config(
        config,
        &json!({
            "bullet": {
                "reset": {
                    "orientation_base_in_world": state.orientation,
                    "position_base_in_world": state.position,
                    "linear_velocity_base_to_world_in_world": state.linear_velocity,
                    "angular_velocity_base_in_base": state.angular_velocity,
                }
            }
        }),
    );
}
