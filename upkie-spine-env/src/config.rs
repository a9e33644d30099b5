//! Configuration of [`SpineEnv`](crate::SpineEnv).
use crate::{
    init_randomization::InitRandomization, orientation::ImuCalibration, rate::SchedulingMode,
};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
    time::Duration,
};
use upkie_core::UpkieError;

/// Configuration of [`SpineEnv`](crate::SpineEnv).
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SpineEnvConfig {
    /// Fall pitch angle, in radians.
    pub fall_pitch: f64,

    /// Frequency of the control loop, in Hz.
    ///
    /// May be set without regulation, as some environments use the period
    /// to integrate commands.
    pub frequency: Option<f64>,

    /// Enables loop frequency regulation.
    pub regulate_frequency: bool,

    /// How steps wait for the next tick.
    pub scheduling: SchedulingMode,

    /// Disturbances of the initial state.
    pub init_rand: InitRandomization,

    /// Name of the shared-memory channel to the spine.
    pub shm_name: String,

    /// Entries merged over the default spine configuration.
    pub spine_config: Value,

    /// Number of attempts to start the spine before giving up.
    pub spine_retries: usize,

    /// Time between two start attempts, in seconds.
    pub spine_retry_interval: f64,

    /// IMU mounting and tolerance.
    pub imu: ImuCalibration,

    /// Seed of the random number generator of the environment.
    pub seed: u64,
}

impl Default for SpineEnvConfig {
    fn default() -> Self {
        Self {
            fall_pitch: 1.0,
            frequency: Some(200.0),
            regulate_frequency: true,
            scheduling: SchedulingMode::Blocking,
            init_rand: InitRandomization::default(),
            shm_name: "/vulp".to_string(),
            spine_config: Value::Object(Default::default()),
            spine_retries: 10,
            spine_retry_interval: 1.0,
            imu: ImuCalibration::default(),
            seed: 42,
        }
    }
}

impl SpineEnvConfig {
    /// Sets the fall pitch angle.
    pub fn fall_pitch(mut self, v: f64) -> Self {
        self.fall_pitch = v;
        self
    }

    /// Sets the loop frequency.
    pub fn frequency(mut self, v: Option<f64>) -> Self {
        self.frequency = v;
        self
    }

    /// Enables or disables loop frequency regulation.
    pub fn regulate_frequency(mut self, v: bool) -> Self {
        self.regulate_frequency = v;
        self
    }

    /// Sets the scheduling mode.
    pub fn scheduling(mut self, v: SchedulingMode) -> Self {
        self.scheduling = v;
        self
    }

    /// Sets the init randomization bounds.
    pub fn init_rand(mut self, v: InitRandomization) -> Self {
        self.init_rand = v;
        self
    }

    /// Sets the name of the shared-memory channel.
    pub fn shm_name(mut self, v: impl Into<String>) -> Self {
        self.shm_name = v.into();
        self
    }

    /// Sets the spine configuration overrides.
    pub fn spine_config(mut self, v: Value) -> Self {
        self.spine_config = v;
        self
    }

    /// Sets the number of start attempts.
    pub fn spine_retries(mut self, v: usize) -> Self {
        self.spine_retries = v;
        self
    }

    /// Sets the time between start attempts.
    pub fn spine_retry_interval(mut self, v: f64) -> Self {
        self.spine_retry_interval = v;
        self
    }

    /// Sets the IMU calibration.
    pub fn imu(mut self, v: ImuCalibration) -> Self {
        self.imu = v;
        self
    }

    /// Sets the seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Checks the consistency of the configuration.
    pub fn validate(&self) -> Result<(), UpkieError> {
        let error = |msg: String| Err(UpkieError::ConfigurationError(msg));
        if self.regulate_frequency && self.frequency.is_none() {
            return error("frequency regulation is enabled but no frequency is set".to_string());
        }
        if let Some(f) = self.frequency {
            if !(f.is_finite() && f > 0.0) {
                return error(format!("frequency should be positive, got {}", f));
            }
            if Duration::try_from_secs_f64(1.0 / f).is_err() {
                return error(format!("frequency {} Hz is too low", f));
            }
        }
        if !(self.fall_pitch > 0.0) {
            return error(format!("fall pitch should be positive, got {}", self.fall_pitch));
        }
        if self.spine_retries == 0 {
            return error("at least one spine start attempt is needed".to_string());
        }
        if !(self.spine_retry_interval.is_finite() && self.spine_retry_interval >= 0.0) {
            return error(format!(
                "spine retry interval should be finite and non-negative, got {}",
                self.spine_retry_interval
            ));
        }
        if !self.spine_config.is_object() {
            return error(format!("spine config should be a mapping, got {}", self.spine_config));
        }
        if !(self.imu.quaternion_tolerance >= 0.0) {
            return error(format!(
                "quaternion tolerance should be non-negative, got {}",
                self.imu.quaternion_tolerance
            ));
        }
        self.init_rand.validate()
    }

    /// Constructs [`SpineEnvConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`SpineEnvConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
