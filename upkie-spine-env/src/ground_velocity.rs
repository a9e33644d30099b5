//! Balancing by ground velocity control.
use crate::{
    base::{SpineEnv, SpineEnvConverter},
    filters::{clamp_abs, low_pass_filter},
    orientation::{base_angular_velocity_from_imu, ImuCalibration},
    rewards::PendulumState,
    util::{get_f64, get_f64_array},
};
use anyhow::Result;
use log::debug;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use upkie_core::{Act, Obs, SurvivalReward, UpkieError};

/// Hip and knee joints, held at their initial positions.
pub const LEG_JOINTS: [&str; 4] = ["left_hip", "left_knee", "right_hip", "right_knee"];

/// Observation of [`GroundVelocity`].
///
/// | Index | Description |
/// |-------|-------------|
/// | 0 | Pitch of the base in the world, in rad, positive when leaning forward. |
/// | 1 | Position of the average wheel contact point, in m. |
/// | 2 | Angular velocity of the base around its lateral axis, in rad/s. |
/// | 3 | Velocity of the average wheel contact point, in m/s. |
/// | 4 | Commanded ground velocity after filtering, in m/s. |
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundVelocityObs(pub [f64; 5]);

impl Obs for GroundVelocityObs {
    fn len(&self) -> usize {
        self.0.len()
    }
}

impl PendulumState for GroundVelocityObs {
    fn pendulum_state(&self) -> [f64; 4] {
        [self.0[0], self.0[1], self.0[2], self.0[3]]
    }
}

impl GroundVelocityObs {
    /// Pitch of the base in the world.
    pub fn pitch(&self) -> f64 {
        self.0[0]
    }

    /// Commanded ground velocity.
    pub fn commanded_velocity(&self) -> f64 {
        self.0[4]
    }
}

/// Ground velocity in m/s. `[-1, 1]` is a reasonable range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundVelocityAct(pub f64);

impl Act for GroundVelocityAct {}

/// Configuration of [`GroundVelocity`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GroundVelocityConfig {
    /// Maximum commanded ground velocity, in m/s.
    pub max_ground_velocity: f64,

    /// Cutoff period of a low-pass filter on commanded velocities, in s.
    pub velocity_filter: Option<f64>,

    /// Bounds of a cutoff period sampled at every reset, replacing
    /// `velocity_filter`.
    pub velocity_filter_rand: Option<(f64, f64)>,

    /// Wheel radius, in m.
    pub wheel_radius: f64,
}

impl Default for GroundVelocityConfig {
    fn default() -> Self {
        Self {
            max_ground_velocity: 1.0,
            velocity_filter: None,
            velocity_filter_rand: None,
            wheel_radius: 0.06,
        }
    }
}

impl GroundVelocityConfig {
    /// Sets the maximum ground velocity.
    pub fn max_ground_velocity(mut self, v: f64) -> Self {
        self.max_ground_velocity = v;
        self
    }

    /// Sets the cutoff period of the velocity filter.
    pub fn velocity_filter(mut self, v: Option<f64>) -> Self {
        self.velocity_filter = v;
        self
    }

    /// Sets the bounds of the randomized cutoff period.
    pub fn velocity_filter_rand(mut self, v: Option<(f64, f64)>) -> Self {
        self.velocity_filter_rand = v;
        self
    }

    /// Sets the wheel radius.
    pub fn wheel_radius(mut self, v: f64) -> Self {
        self.wheel_radius = v;
        self
    }

    fn validate(&self) -> Result<(), UpkieError> {
        let error = |msg: String| Err(UpkieError::ConfigurationError(msg));
        if !(self.max_ground_velocity >= 0.0) {
            return error(format!(
                "maximum ground velocity should be non-negative, got {}",
                self.max_ground_velocity
            ));
        }
        if !(self.wheel_radius > 0.0) {
            return error(format!("wheel radius should be positive, got {}", self.wheel_radius));
        }
        if let Some(cutoff) = self.velocity_filter {
            if !(cutoff > 0.0) {
                return error(format!("velocity filter should be positive, got {}", cutoff));
            }
        }
        if let Some((low, high)) = self.velocity_filter_rand {
            if !(low > 0.0 && low <= high) {
                return error(format!("invalid velocity filter range ({}, {})", low, high));
            }
        }
        Ok(())
    }
}

/// Converter of an environment where the robot balances by commanding a
/// ground velocity.
///
/// Wheels spin at `±v / r` and the legs keep the joint positions read in the
/// first observation of the episode. The loop frequency must be configured.
#[derive(Clone, Debug)]
pub struct GroundVelocity {
    config: GroundVelocityConfig,
    imu: ImuCalibration,
    dt: Option<f64>,
    velocity_filter: Option<f64>,
    ground_velocity: f64,
    leg_positions: Option<[f64; 4]>,
}

impl GroundVelocity {
    /// Constructs the converter.
    ///
    /// The IMU calibration is the one of the environment, received at reset.
    pub fn new(config: GroundVelocityConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            velocity_filter: config.velocity_filter,
            config,
            imu: ImuCalibration::default(),
            dt: None,
            ground_velocity: 0.0,
            leg_positions: None,
        })
    }

    /// Cutoff period of the velocity filter in the current episode.
    pub fn velocity_filter(&self) -> Option<f64> {
        self.velocity_filter
    }

    /// Last commanded ground velocity, after filtering.
    pub fn ground_velocity(&self) -> f64 {
        self.ground_velocity
    }

    /// Leg joint positions held during the episode, in [`LEG_JOINTS`] order.
    pub fn leg_positions(&self) -> Option<[f64; 4]> {
        self.leg_positions
    }
}

impl SpineEnvConverter for GroundVelocity {
    type Obs = GroundVelocityObs;
    type Act = GroundVelocityAct;

    fn reset(&mut self, dt: Option<f64>, imu: &ImuCalibration, rng: &mut StdRng) -> Result<()> {
        let dt = dt.ok_or_else(|| {
            UpkieError::ConfigurationError(
                "ground velocity control needs a loop frequency".to_string(),
            )
        })?;
        self.dt = Some(dt);
        self.imu = imu.clone();
        self.ground_velocity = 0.0;
        self.leg_positions = None;
        if let Some((low, high)) = self.config.velocity_filter_rand {
            let cutoff = if high > low { rng.gen_range(low..=high) } else { low };
            debug!("Velocity filter cutoff period: {} s", cutoff);
            self.velocity_filter = Some(cutoff);
        }
        Ok(())
    }

    fn parse_first_observation(&mut self, observation: &Value) -> Result<()> {
        let mut positions = [0.0; 4];
        for (position, joint) in positions.iter_mut().zip(LEG_JOINTS) {
            *position = get_f64(observation, &["servo", joint, "position"])?;
        }
        self.leg_positions = Some(positions);
        Ok(())
    }

    fn vectorize_observation(&self, observation: &Value) -> Result<GroundVelocityObs> {
        let quat = get_f64_array::<4>(observation, &["imu", "orientation"])?;
        let omega = get_f64_array::<3>(observation, &["imu", "angular_velocity"])?;
        let pitch = self.imu.base_pitch(quat)?;
        let angular_velocity = base_angular_velocity_from_imu(omega, None);
        Ok(GroundVelocityObs([
            pitch,
            get_f64(observation, &["wheel_odometry", "position"])?,
            angular_velocity[1],
            get_f64(observation, &["wheel_odometry", "velocity"])?,
            self.ground_velocity,
        ]))
    }

    fn dictionarize_action(&mut self, act: &GroundVelocityAct) -> Result<Value> {
        if !act.0.is_finite() {
            let msg = format!("non-finite ground velocity {}", act.0);
            return Err(UpkieError::ActionError(msg).into());
        }
        // Leg positions come from the first observation of the episode.
        let leg_positions = self.leg_positions.ok_or(UpkieError::NotReset)?;
        let commanded = clamp_abs(act.0, self.config.max_ground_velocity);
        self.ground_velocity = match (self.velocity_filter, self.dt) {
            (Some(cutoff), Some(dt)) => {
                low_pass_filter(self.ground_velocity, cutoff, commanded, dt)?
            }
            (Some(_), None) => return Err(UpkieError::NotReset.into()),
            (None, _) => commanded,
        };

        let wheel_velocity = self.ground_velocity / self.config.wheel_radius;
        let mut servo = Map::new();
        for (joint, position) in LEG_JOINTS.iter().zip(leg_positions) {
            servo.insert(joint.to_string(), json!({"position": position, "velocity": 0.0}));
        }
        // null position: velocity control only
        servo.insert(
            "left_wheel".to_string(),
            json!({"position": null, "velocity": wheel_velocity}),
        );
        servo.insert(
            "right_wheel".to_string(),
            json!({"position": null, "velocity": -wheel_velocity}),
        );
        Ok(json!({ "servo": servo }))
    }
}

/// Spine environment balancing by ground velocity control.
pub type GroundVelocityEnv<S, R = SurvivalReward> = SpineEnv<S, GroundVelocity, R>;

#[cfg(test)]
mod test {
    use super::*;
    use rand::SeedableRng;

    fn observation() -> Value {
        json!({
            "imu": {
                "orientation": [1.0, 0.0, 0.0, 0.0],
                "angular_velocity": [0.0, 0.2, 0.0],
            },
            "wheel_odometry": {"position": 0.3, "velocity": -0.1},
            "servo": {
                "left_hip": {"position": 0.1},
                "left_knee": {"position": 0.2},
                "right_hip": {"position": 0.3},
                "right_knee": {"position": 0.4},
            },
        })
    }

    fn converter(config: GroundVelocityConfig) -> Result<GroundVelocity> {
        let mut converter = GroundVelocity::new(config)?;
        converter.reset(Some(0.005), &ImuCalibration::default(), &mut StdRng::seed_from_u64(0))?;
        converter.parse_first_observation(&observation())?;
        Ok(converter)
    }

    #[test]
    fn test_vectorize_observation() -> Result<()> {
        let converter = converter(GroundVelocityConfig::default())?;
        let obs = converter.vectorize_observation(&observation())?;
        assert_eq!(obs.len(), 5);
        assert!(obs.pitch().abs() < 1e-12);
        assert_eq!(obs.0[1], 0.3);
        // lateral axes of the base and the IMU agree
        assert!((obs.0[2] - 0.2).abs() < 1e-12);
        assert_eq!(obs.0[3], -0.1);
        assert_eq!(obs.commanded_velocity(), 0.0);
        Ok(())
    }

    #[test]
    fn test_pitch_follows_calibration() -> Result<()> {
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let imu = ImuCalibration::default()
            .rotation_base_to_imu(identity)
            .rotation_ars_to_world(identity);
        let mut converter = GroundVelocity::new(GroundVelocityConfig::default())?;
        converter.reset(Some(0.005), &imu, &mut StdRng::seed_from_u64(0))?;

        // 0.3 rad around the y axis
        let quat = [0.15f64.cos(), 0.0, 0.15f64.sin(), 0.0];
        let mut observation = observation();
        observation["imu"]["orientation"] = json!(quat);
        let pitch = converter.vectorize_observation(&observation)?.pitch();
        assert_eq!(pitch, imu.base_pitch(quat)?);
        assert!((pitch - 0.3).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_dictionarize_action() -> Result<()> {
        let mut converter = converter(GroundVelocityConfig::default().wheel_radius(0.05))?;
        let action = converter.dictionarize_action(&GroundVelocityAct(0.5))?;
        let servo = &action["servo"];
        assert!((servo["left_wheel"]["velocity"].as_f64().unwrap() - 10.0).abs() < 1e-12);
        assert!((servo["right_wheel"]["velocity"].as_f64().unwrap() + 10.0).abs() < 1e-12);
        assert!(servo["left_wheel"]["position"].is_null());
        assert_eq!(servo["left_hip"]["position"], json!(0.1));
        assert_eq!(servo["right_knee"]["position"], json!(0.4));
        assert_eq!(servo["right_knee"]["velocity"], json!(0.0));

        let obs = converter.vectorize_observation(&observation())?;
        assert_eq!(obs.commanded_velocity(), 0.5);
        Ok(())
    }

    #[test]
    fn test_action_is_clamped() -> Result<()> {
        let mut converter = converter(GroundVelocityConfig::default().max_ground_velocity(0.8))?;
        converter.dictionarize_action(&GroundVelocityAct(-3.0))?;
        assert_eq!(converter.ground_velocity(), -0.8);
        let err = converter.dictionarize_action(&GroundVelocityAct(f64::NAN)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpkieError>(),
            Some(UpkieError::ActionError(_))
        ));
        Ok(())
    }

    #[test]
    fn test_velocity_filter() -> Result<()> {
        let mut converter = converter(GroundVelocityConfig::default().velocity_filter(Some(0.1)))?;
        converter.dictionarize_action(&GroundVelocityAct(1.0))?;
        assert!((converter.ground_velocity() - 0.05).abs() < 1e-12);
        for _ in 0..1000 {
            converter.dictionarize_action(&GroundVelocityAct(1.0))?;
        }
        assert!((converter.ground_velocity() - 1.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_velocity_filter_rand() -> Result<()> {
        let config = GroundVelocityConfig::default().velocity_filter_rand(Some((0.1, 0.2)));
        let mut converter = GroundVelocity::new(config)?;
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            converter.reset(Some(0.005), &ImuCalibration::default(), &mut rng)?;
            let cutoff = converter.velocity_filter().unwrap();
            assert!((0.1..=0.2).contains(&cutoff));
        }
        Ok(())
    }

    #[test]
    fn test_needs_frequency_and_first_observation() -> Result<()> {
        let imu = ImuCalibration::default();
        let mut rng = StdRng::seed_from_u64(0);
        let mut converter = GroundVelocity::new(GroundVelocityConfig::default())?;
        assert!(converter.reset(None, &imu, &mut rng).is_err());
        converter.reset(Some(0.01), &imu, &mut rng)?;
        let err = converter.dictionarize_action(&GroundVelocityAct(0.1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<UpkieError>(),
            Some(UpkieError::NotReset)
        ));
        assert!(GroundVelocity::new(GroundVelocityConfig::default().wheel_radius(0.0)).is_err());
        Ok(())
    }
}
