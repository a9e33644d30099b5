//! In-process spine for tests and dry runs.
use super::SpineInterface;
use anyhow::{bail, Result};
use log::debug;
use serde_json::{json, Value};

/// Spine answering with a scripted observation mapping.
///
/// Like a real spine, the first observation after [`SpineInterface::start`]
/// is stale: it still carries the last number of the previous session. Every
/// later observation increments the `number` entry.
#[derive(Clone, Debug)]
pub struct MockSpine {
    observation: Value,
    running: bool,
    stale: bool,
    number: u64,
    start_failures: usize,
    configs: Vec<Value>,
    actions: Vec<Value>,
    stop_count: usize,
}

impl Default for MockSpine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSpine {
    /// Creates a stopped spine with an upright robot standing still.
    pub fn new() -> Self {
        let servo = |position: f64| json!({"position": position, "velocity": 0.0, "torque": 0.0});
        Self {
            observation: json!({
                "imu": {
                    "orientation": [1.0, 0.0, 0.0, 0.0],
                    "angular_velocity": [0.0, 0.0, 0.0],
                    "linear_acceleration": [0.0, 0.0, 9.81],
                },
                "wheel_odometry": {"position": 0.0, "velocity": 0.0},
                "servo": {
                    "left_hip": servo(0.1),
                    "left_knee": servo(-0.2),
                    "left_wheel": servo(0.0),
                    "right_hip": servo(-0.1),
                    "right_knee": servo(0.2),
                    "right_wheel": servo(0.0),
                },
                "number": 0,
            }),
            running: false,
            stale: false,
            number: 0,
            start_failures: 0,
            configs: vec![],
            actions: vec![],
            stop_count: 0,
        }
    }

    /// Makes the next `n` calls to [`SpineInterface::start`] fail.
    pub fn fail_starts(mut self, n: usize) -> Self {
        self.start_failures = n;
        self
    }

    /// Sets the IMU orientation reported from now on, `[w, x, y, z]`.
    pub fn set_imu_orientation(&mut self, quat: [f64; 4]) {
        self.observation["imu"]["orientation"] = json!(quat);
    }

    /// Sets the raw IMU angular velocity reported from now on.
    pub fn set_imu_angular_velocity(&mut self, omega: [f64; 3]) {
        self.observation["imu"]["angular_velocity"] = json!(omega);
    }

    /// Sets the wheel odometry reported from now on.
    pub fn set_wheel_odometry(&mut self, position: f64, velocity: f64) {
        self.observation["wheel_odometry"] = json!({"position": position, "velocity": velocity});
    }

    /// Mutable access to the observation template.
    pub fn observation_mut(&mut self) -> &mut Value {
        &mut self.observation
    }

    /// Configurations of every successful start, oldest first.
    pub fn configs(&self) -> &[Value] {
        &self.configs
    }

    /// Actions received since creation, oldest first.
    pub fn actions(&self) -> &[Value] {
        &self.actions
    }

    /// Number of calls to [`SpineInterface::stop`].
    pub fn stop_count(&self) -> usize {
        self.stop_count
    }

    /// Whether a session is running.
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl SpineInterface for MockSpine {
    fn start(&mut self, config: &Value) -> Result<()> {
        if self.start_failures > 0 {
            self.start_failures -= 1;
            bail!("spine is not ready ({} failures left)", self.start_failures);
        }
        debug!("MockSpine::start()");
        self.configs.push(config.clone());
        self.running = true;
        self.stale = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        self.stop_count += 1;
        Ok(())
    }

    fn get_observation(&mut self) -> Result<Value> {
        if !self.running {
            bail!("spine is stopped");
        }
        if self.stale {
            self.stale = false;
        } else {
            self.number += 1;
        }
        let mut observation = self.observation.clone();
        observation["number"] = json!(self.number);
        Ok(observation)
    }

    fn set_action(&mut self, action: &Value) -> Result<()> {
        if !self.running {
            bail!("spine is stopped");
        }
        self.actions.push(action.clone());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_stale_first_observation() -> Result<()> {
        let mut spine = MockSpine::new();
        spine.start(&json!({}))?;
        assert_eq!(spine.get_observation()?["number"], json!(0));
        assert_eq!(spine.get_observation()?["number"], json!(1));
        assert_eq!(spine.get_observation()?["number"], json!(2));

        spine.stop()?;
        assert!(spine.get_observation().is_err());
        spine.start(&json!({}))?;
        assert_eq!(spine.get_observation()?["number"], json!(2));
        assert_eq!(spine.get_observation()?["number"], json!(3));
        Ok(())
    }

    #[test]
    fn test_start_failures() {
        let mut spine = MockSpine::new().fail_starts(2);
        assert!(spine.start(&json!({})).is_err());
        assert!(spine.start(&json!({})).is_err());
        assert!(spine.start(&json!({})).is_ok());
        assert_eq!(spine.configs().len(), 1);
    }
}
