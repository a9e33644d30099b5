//! Domain randomization of the initial state.
use nalgebra::UnitQuaternion;
use rand::Rng;
use serde::{Deserialize, Serialize};
use upkie_core::UpkieError;

/// Default position of the base in the world, in meters.
pub const DEFAULT_POSITION: [f64; 3] = [0.0, 0.0, 0.6];

/// Bounds of the random disturbance added to the default initial state.
///
/// Every bound is non-negative. Angles are in radians, positions in meters,
/// velocities in meters per second and angular velocities in radians per
/// second.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct InitRandomization {
    /// Roll angle, sampled in `[-roll, roll]`.
    pub roll: f64,

    /// Pitch angle, sampled in `[-pitch, pitch]`.
    pub pitch: f64,

    /// Position along the world x-axis, sampled in `[-x, x]`.
    pub x: f64,

    /// Upward offset of the base, sampled in `[0, z]`.
    pub z: f64,

    /// Linear velocity along the x-axis, sampled in `[-v_x, v_x]`.
    pub v_x: f64,

    /// Linear velocity along the z-axis, sampled in `[-v_z, v_z]`.
    pub v_z: f64,

    /// Angular velocity around the x-axis, sampled in `[-omega_x, omega_x]`.
    pub omega_x: f64,

    /// Angular velocity around the y-axis, sampled in `[-omega_y, omega_y]`.
    pub omega_y: f64,
}

/// Partial update of [`InitRandomization`]: only the bounds set are replaced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InitRandomizationUpdate {
    /// New roll bound.
    pub roll: Option<f64>,
    /// New pitch bound.
    pub pitch: Option<f64>,
    /// New x bound.
    pub x: Option<f64>,
    /// New z bound.
    pub z: Option<f64>,
    /// New x-velocity bound.
    pub v_x: Option<f64>,
    /// New z-velocity bound.
    pub v_z: Option<f64>,
    /// New roll-rate bound.
    pub omega_x: Option<f64>,
    /// New pitch-rate bound.
    pub omega_y: Option<f64>,
}

/// Initial state of the base drawn by [`InitRandomization::sample`].
#[derive(Clone, Debug, PartialEq)]
pub struct InitState {
    /// Orientation of the base in the world, `[w, x, y, z]`.
    pub orientation: [f64; 4],

    /// Position of the base in the world.
    pub position: [f64; 3],

    /// Linear velocity of the base in the world.
    pub linear_velocity: [f64; 3],

    /// Angular velocity of the base in the base frame.
    pub angular_velocity: [f64; 3],
}

fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if high > low {
        rng.gen_range(low..=high)
    } else {
        low
    }
}

impl InitRandomization {
    /// Sets the roll bound.
    pub fn roll(mut self, v: f64) -> Self {
        self.roll = v;
        self
    }

    /// Sets the pitch bound.
    pub fn pitch(mut self, v: f64) -> Self {
        self.pitch = v;
        self
    }

    /// Sets the x bound.
    pub fn x(mut self, v: f64) -> Self {
        self.x = v;
        self
    }

    /// Sets the z bound.
    pub fn z(mut self, v: f64) -> Self {
        self.z = v;
        self
    }

    /// Sets the linear velocity bounds.
    pub fn linear_velocity(mut self, v_x: f64, v_z: f64) -> Self {
        self.v_x = v_x;
        self.v_z = v_z;
        self
    }

    /// Sets the angular velocity bounds.
    pub fn angular_velocity(mut self, omega_x: f64, omega_y: f64) -> Self {
        self.omega_x = omega_x;
        self.omega_y = omega_y;
        self
    }

    /// Replaces the bounds set in `update`, leaving the others untouched.
    pub fn update(&mut self, update: InitRandomizationUpdate) {
        let targets = [
            (&mut self.roll, update.roll),
            (&mut self.pitch, update.pitch),
            (&mut self.x, update.x),
            (&mut self.z, update.z),
            (&mut self.v_x, update.v_x),
            (&mut self.v_z, update.v_z),
            (&mut self.omega_x, update.omega_x),
            (&mut self.omega_y, update.omega_y),
        ];
        for (bound, value) in targets {
            if let Some(value) = value {
                *bound = value;
            }
        }
    }

    /// Checks that every bound is finite and non-negative.
    pub fn validate(&self) -> Result<(), UpkieError> {
        let bounds = [
            ("roll", self.roll),
            ("pitch", self.pitch),
            ("x", self.x),
            ("z", self.z),
            ("v_x", self.v_x),
            ("v_z", self.v_z),
            ("omega_x", self.omega_x),
            ("omega_y", self.omega_y),
        ];
        match bounds.iter().find(|(_, v)| !(v.is_finite() && *v >= 0.0)) {
            Some((name, v)) => Err(UpkieError::ConfigurationError(format!(
                "init randomization bound {} = {} should be non-negative",
                name, v
            ))),
            None => Ok(()),
        }
    }

    /// Samples an orientation with zero yaw, as an intrinsic Z-Y-X rotation.
    pub fn sample_orientation<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 4] {
        let pitch = uniform(rng, -self.pitch, self.pitch);
        let roll = uniform(rng, -self.roll, self.roll);
        let rotation = UnitQuaternion::from_euler_angles(roll, pitch, 0.0);
        let c = rotation.quaternion().coords;
        [c[3], c[0], c[1], c[2]]
    }

    /// Samples a position around [`DEFAULT_POSITION`].
    pub fn sample_position<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        [
            DEFAULT_POSITION[0] + uniform(rng, -self.x, self.x),
            DEFAULT_POSITION[1],
            DEFAULT_POSITION[2] + uniform(rng, 0.0, self.z),
        ]
    }

    /// Samples a linear velocity in the sagittal plane.
    pub fn sample_linear_velocity<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        [
            uniform(rng, -self.v_x, self.v_x),
            0.0,
            uniform(rng, -self.v_z, self.v_z),
        ]
    }

    /// Samples an angular velocity around the roll and pitch axes.
    pub fn sample_angular_velocity<R: Rng + ?Sized>(&self, rng: &mut R) -> [f64; 3] {
        [
            uniform(rng, -self.omega_x, self.omega_x),
            uniform(rng, -self.omega_y, self.omega_y),
            0.0,
        ]
    }

    /// Samples a full initial state.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> InitState {
        InitState {
            orientation: self.sample_orientation(rng),
            position: self.sample_position(rng),
            linear_velocity: self.sample_linear_velocity(rng),
            angular_velocity: self.sample_angular_velocity(rng),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn bounds() -> InitRandomization {
        InitRandomization::default()
            .roll(0.1)
            .pitch(0.2)
            .x(0.05)
            .z(0.01)
            .linear_velocity(0.3, 0.4)
            .angular_velocity(0.5, 0.6)
    }

    #[test]
    fn test_zero_bounds_give_default_state() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..10 {
            let state = InitRandomization::default().sample(&mut rng);
            assert_eq!(state.orientation, [1.0, 0.0, 0.0, 0.0]);
            assert_eq!(state.position, DEFAULT_POSITION);
            assert_eq!(state.linear_velocity, [0.0; 3]);
            assert_eq!(state.angular_velocity, [0.0; 3]);
        }
    }

    #[test]
    fn test_samples_within_bounds() {
        let bounds = bounds();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let state = bounds.sample(&mut rng);
            let norm2: f64 = state.orientation.iter().map(|v| v * v).sum();
            assert!((norm2 - 1.0).abs() < 1e-12);
            assert!(state.position[0].abs() <= 0.05);
            assert_eq!(state.position[1], 0.0);
            assert!(state.position[2] >= 0.6 && state.position[2] <= 0.61);
            assert!(state.linear_velocity[0].abs() <= 0.3);
            assert_eq!(state.linear_velocity[1], 0.0);
            assert!(state.linear_velocity[2].abs() <= 0.4);
            assert!(state.angular_velocity[0].abs() <= 0.5);
            assert!(state.angular_velocity[1].abs() <= 0.6);
            assert_eq!(state.angular_velocity[2], 0.0);
        }
    }

    #[test]
    fn test_orientation_has_no_yaw() {
        let bounds = bounds();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let [w, x, y, z] = bounds.sample_orientation(&mut rng);
            let rotation =
                UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(w, x, y, z));
            let (roll, pitch, yaw) = rotation.euler_angles();
            assert!(yaw.abs() < 1e-12);
            assert!(roll.abs() <= 0.1 + 1e-12);
            assert!(pitch.abs() <= 0.2 + 1e-12);
        }
    }

    #[test]
    fn test_same_seed_same_state() {
        let bounds = bounds();
        let a = bounds.sample(&mut StdRng::seed_from_u64(11));
        let b = bounds.sample(&mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
    }

    #[test]
    fn test_update_and_validate() {
        let mut bounds = InitRandomization::default();
        bounds.update(InitRandomizationUpdate {
            pitch: Some(0.3),
            omega_y: Some(1.0),
            ..Default::default()
        });
        assert_eq!(bounds.pitch, 0.3);
        assert_eq!(bounds.omega_y, 1.0);
        assert_eq!(bounds.roll, 0.0);
        assert!(bounds.validate().is_ok());

        bounds.update(InitRandomizationUpdate {
            x: Some(-1.0),
            ..Default::default()
        });
        assert!(matches!(
            bounds.validate(),
            Err(UpkieError::ConfigurationError(_))
        ));
    }
}
