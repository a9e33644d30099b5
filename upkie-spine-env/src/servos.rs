//! Joint-level control of every servo.
use crate::{
    base::{SpineEnv, SpineEnvConverter},
    filters::clamp_and_warn,
    util::get_f64,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use upkie_core::{Act, Obs, SurvivalReward, UpkieError};

/// Servos in the order of observation and action vectors.
pub const SERVO_JOINTS: [&str; 6] = [
    "left_hip",
    "left_knee",
    "left_wheel",
    "right_hip",
    "right_knee",
    "right_wheel",
];

/// Observation of [`Servos`].
///
/// | Index | Description |
/// |-------|-------------|
/// | `0..6` | Joint positions, in rad. |
/// | `6..12` | Joint velocities, in rad/s. |
/// | `12..18` | Joint torques, in N.m. |
///
/// Joints follow the order of [`SERVO_JOINTS`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServosObs(pub [f64; 18]);

impl Obs for ServosObs {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl ServosObs {
    /// Position of the `i`-th joint.
    pub fn position(&self, i: usize) -> f64 {
        self.0[i]
    }

    /// Velocity of the `i`-th joint.
    pub fn velocity(&self, i: usize) -> f64 {
        self.0[6 + i]
    }

    /// Torque of the `i`-th joint.
    pub fn torque(&self, i: usize) -> f64 {
        self.0[12 + i]
    }
}

/// Command sent to one servo.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ServoCommand {
    /// Target position in rad, `None` to control velocity only.
    pub position: Option<f64>,

    /// Target velocity in rad/s.
    pub velocity: f64,

    /// Feedforward torque in N.m.
    pub feedforward_torque: f64,

    /// Scale of the proportional gain, in `[0, 1]`.
    pub kp_scale: f64,

    /// Scale of the derivative gain, in `[0, 1]`.
    pub kd_scale: f64,

    /// Maximum torque in N.m, `None` for the effort limit of the joint.
    pub maximum_torque: Option<f64>,
}

impl Default for ServoCommand {
    fn default() -> Self {
        Self {
            position: None,
            velocity: 0.0,
            feedforward_torque: 0.0,
            kp_scale: 1.0,
            kd_scale: 1.0,
            maximum_torque: None,
        }
    }
}

impl ServoCommand {
    /// Position command with default gains.
    pub fn position(position: f64) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    /// Velocity command with default gains.
    pub fn velocity(velocity: f64) -> Self {
        Self {
            velocity,
            ..Default::default()
        }
    }
}

/// Commands of every servo, in the order of [`SERVO_JOINTS`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ServosAct(pub [ServoCommand; 6]);

impl Act for ServosAct {}

/// Limits of a joint.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct JointLimit {
    /// Lower position limit, in rad.
    pub lower: f64,

    /// Upper position limit, in rad.
    pub upper: f64,

    /// Velocity limit, in rad/s.
    pub velocity: f64,

    /// Torque limit, in N.m.
    pub effort: f64,
}

impl JointLimit {
    fn validate(&self, label: &str) -> Result<(), UpkieError> {
        if !(self.lower <= self.upper && self.velocity >= 0.0 && self.effort >= 0.0) {
            return Err(UpkieError::ConfigurationError(format!(
                "invalid {} joint limit {:?}",
                label, self
            )));
        }
        Ok(())
    }
}

/// Configuration of [`Servos`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServosConfig {
    /// Limits of hip and knee joints.
    pub leg_limit: JointLimit,

    /// Limits of wheel joints, which turn freely.
    pub wheel_limit: JointLimit,
}

impl Default for ServosConfig {
    fn default() -> Self {
        Self {
            leg_limit: JointLimit {
                lower: -1.5,
                upper: 1.5,
                velocity: 10.0,
                effort: 16.0,
            },
            wheel_limit: JointLimit {
                lower: f64::NEG_INFINITY,
                upper: f64::INFINITY,
                velocity: 100.0,
                effort: 1.7,
            },
        }
    }
}

impl ServosConfig {
    /// Sets the limits of hip and knee joints.
    pub fn leg_limit(mut self, v: JointLimit) -> Self {
        self.leg_limit = v;
        self
    }

    /// Sets the limits of wheel joints.
    pub fn wheel_limit(mut self, v: JointLimit) -> Self {
        self.wheel_limit = v;
        self
    }

    /// Limits of a joint of [`SERVO_JOINTS`].
    pub fn limit(&self, joint: &str) -> &JointLimit {
        if joint.ends_with("wheel") {
            &self.wheel_limit
        } else {
            &self.leg_limit
        }
    }
}

/// Converter giving agents direct control of every servo.
///
/// Commands are clamped to the joint limits, with a warning for every
/// clamped entry.
#[derive(Clone, Debug)]
pub struct Servos {
    config: ServosConfig,
}

impl Servos {
    /// Constructs the converter.
    pub fn new(config: ServosConfig) -> Result<Self> {
        config.leg_limit.validate("leg")?;
        config.wheel_limit.validate("wheel")?;
        Ok(Self { config })
    }

    /// Configuration of the converter.
    pub fn config(&self) -> &ServosConfig {
        &self.config
    }

    fn command(&self, joint: &str, command: &ServoCommand) -> Result<Value> {
        let limit = self.config.limit(joint);
        let maximum_torque = command.maximum_torque.unwrap_or(limit.effort);
        let entries = [
            ("velocity", command.velocity),
            ("feedforward_torque", command.feedforward_torque),
            ("kp_scale", command.kp_scale),
            ("kd_scale", command.kd_scale),
            ("maximum_torque", maximum_torque),
        ];
        let position = command.position.map(|p| ("position", p));
        if let Some((key, value)) = position
            .iter()
            .chain(entries.iter())
            .find(|(_, value)| !value.is_finite())
        {
            let msg = format!("{}: {} is {}", joint, key, value);
            return Err(UpkieError::ActionError(msg).into());
        }

        let clamp = |value: f64, lower: f64, upper: f64, key: &str| {
            clamp_and_warn(value, lower, upper, &format!("{}: {}", joint, key))
        };
        let position = command
            .position
            .map(|p| clamp(p, limit.lower, limit.upper, "position"));
        Ok(json!({
            "position": position,
            "velocity": clamp(command.velocity, -limit.velocity, limit.velocity, "velocity"),
            "feedforward_torque": clamp(
                command.feedforward_torque,
                -limit.effort,
                limit.effort,
                "feedforward_torque"
            ),
            "kp_scale": clamp(command.kp_scale, 0.0, 1.0, "kp_scale"),
            "kd_scale": clamp(command.kd_scale, 0.0, 1.0, "kd_scale"),
            "maximum_torque": clamp(maximum_torque, 0.0, limit.effort, "maximum_torque"),
        }))
    }
}

impl SpineEnvConverter for Servos {
    type Obs = ServosObs;
    type Act = ServosAct;

    fn parse_first_observation(&mut self, _observation: &Value) -> Result<()> {
        Ok(())
    }

    fn vectorize_observation(&self, observation: &Value) -> Result<ServosObs> {
        let mut obs = [0.0; 18];
        for (i, joint) in SERVO_JOINTS.iter().enumerate() {
            obs[i] = get_f64(observation, &["servo", joint, "position"])?;
            obs[6 + i] = get_f64(observation, &["servo", joint, "velocity"])?;
            obs[12 + i] = get_f64(observation, &["servo", joint, "torque"])?;
        }
        Ok(ServosObs(obs))
    }

    fn dictionarize_action(&mut self, act: &ServosAct) -> Result<Value> {
        let mut servo = Map::new();
        for (joint, command) in SERVO_JOINTS.iter().zip(act.0.iter()) {
            servo.insert(joint.to_string(), self.command(joint, command)?);
        }
        Ok(json!({ "servo": servo }))
    }
}

/// Spine environment with joint-level control of every servo.
pub type ServosEnv<S, R = SurvivalReward> = SpineEnv<S, Servos, R>;

#[cfg(test)]
mod test {
    use super::*;
    use test_log::test;

    fn observation() -> Value {
        let servo = |i: f64| json!({"position": i, "velocity": 10.0 + i, "torque": 20.0 + i});
        json!({
            "servo": {
                "left_hip": servo(0.0),
                "left_knee": servo(1.0),
                "left_wheel": servo(2.0),
                "right_hip": servo(3.0),
                "right_knee": servo(4.0),
                "right_wheel": servo(5.0),
            },
        })
    }

    #[test]
    fn test_vectorize_observation() -> Result<()> {
        let converter = Servos::new(ServosConfig::default())?;
        let obs = converter.vectorize_observation(&observation())?;
        assert_eq!(obs.len(), 18);
        assert_eq!(obs.position(2), 2.0);
        assert_eq!(obs.velocity(4), 14.0);
        assert_eq!(obs.torque(5), 25.0);

        let mut incomplete = observation();
        incomplete["servo"]["right_knee"] = json!({"position": 0.0});
        assert!(converter.vectorize_observation(&incomplete).is_err());
        Ok(())
    }

    #[test]
    fn test_default_action() -> Result<()> {
        let mut converter = Servos::new(ServosConfig::default())?;
        let action = converter.dictionarize_action(&ServosAct::default())?;
        for joint in SERVO_JOINTS {
            let command = &action["servo"][joint];
            assert!(command["position"].is_null());
            assert_eq!(command["velocity"], json!(0.0));
            assert_eq!(command["kp_scale"], json!(1.0));
            let effort = converter.config().limit(joint).effort;
            assert_eq!(command["maximum_torque"], json!(effort));
        }
        Ok(())
    }

    #[test]
    fn test_action_is_clamped() -> Result<()> {
        let mut converter = Servos::new(ServosConfig::default())?;
        let mut act = ServosAct::default();
        act.0[0] = ServoCommand::position(3.0);
        act.0[2] = ServoCommand {
            kd_scale: 2.0,
            maximum_torque: Some(-1.0),
            ..ServoCommand::velocity(500.0)
        };
        act.0[5] = ServoCommand::position(1e3);
        let action = converter.dictionarize_action(&act)?;
        let servo = &action["servo"];
        assert_eq!(servo["left_hip"]["position"], json!(1.5));
        assert_eq!(servo["left_wheel"]["velocity"], json!(100.0));
        assert_eq!(servo["left_wheel"]["kd_scale"], json!(1.0));
        assert_eq!(servo["left_wheel"]["maximum_torque"], json!(0.0));
        // wheels have no position limits
        assert_eq!(servo["right_wheel"]["position"], json!(1e3));
        Ok(())
    }

    #[test]
    fn test_non_finite_command() -> Result<()> {
        let mut converter = Servos::new(ServosConfig::default())?;
        let mut act = ServosAct::default();
        act.0[1] = ServoCommand::velocity(f64::NAN);
        let err = converter.dictionarize_action(&act).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpkieError>(),
            Some(UpkieError::ActionError(_))
        ));
        Ok(())
    }

    #[test]
    fn test_invalid_limits() {
        let limit = JointLimit {
            lower: 1.0,
            upper: -1.0,
            velocity: 1.0,
            effort: 1.0,
        };
        assert!(Servos::new(ServosConfig::default().leg_limit(limit)).is_err());
    }
}
