//! Base orientation estimated from IMU readings.
//!
//! Frames involved:
//!
//! * `ars`: attitude reference system of the IMU, +x forward, +y right, +z down,
//! * `imu`: frame of the sensor itself, mounted reversed relative to the base,
//! * `base`: body frame of the robot, +x forward, +y left, +z up,
//! * `world`: inertial frame, +z opposite to gravity.
//!
//! The IMU reports the orientation of the `imu` frame in the `ars` frame as a
//! quaternion. Composing it with the two fixed rotations of
//! [`ImuCalibration`] yields the orientation of the base in the world, from
//! which the pitch angle is read.
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use upkie_core::UpkieError;

/// Rotation matrix in row-major order, as stored in configuration files.
pub type Rows = [[f64; 3]; 3];

/// Default tolerance on the squared norm of IMU quaternions.
pub const QUATERNION_TOLERANCE: f64 = 1e-5;

/// Rotation from the base frame to the IMU frame: 180 degrees around the yaw axis.
pub const ROTATION_BASE_TO_IMU: Rows = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];

/// Rotation from the ARS frame (+z down) to the world frame (+z up).
pub const ROTATION_ARS_TO_WORLD: Rows = [[1.0, 0.0, 0.0], [0.0, -1.0, 0.0], [0.0, 0.0, -1.0]];

/// Calibration of an IMU mounting.
///
/// The defaults correspond to an IMU whose attitude reference has +z pointing
/// down, mounted turned 180 degrees around the yaw axis of the base.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct ImuCalibration {
    /// Rotation matrix from the base frame to the IMU frame.
    pub rotation_base_to_imu: Rows,

    /// Rotation matrix from the attitude reference frame to the world frame.
    pub rotation_ars_to_world: Rows,

    /// Maximum deviation of the squared norm of a quaternion from one.
    pub quaternion_tolerance: f64,
}

impl Default for ImuCalibration {
    fn default() -> Self {
        Self {
            rotation_base_to_imu: ROTATION_BASE_TO_IMU,
            rotation_ars_to_world: ROTATION_ARS_TO_WORLD,
            quaternion_tolerance: QUATERNION_TOLERANCE,
        }
    }
}

impl ImuCalibration {
    /// Sets the rotation from the base frame to the IMU frame.
    pub fn rotation_base_to_imu(mut self, v: Rows) -> Self {
        self.rotation_base_to_imu = v;
        self
    }

    /// Sets the rotation from the attitude reference frame to the world frame.
    pub fn rotation_ars_to_world(mut self, v: Rows) -> Self {
        self.rotation_ars_to_world = v;
        self
    }

    /// Sets the quaternion normalization tolerance.
    pub fn quaternion_tolerance(mut self, v: f64) -> Self {
        self.quaternion_tolerance = v;
        self
    }

    /// Pitch angle of the base in the world from an IMU quaternion.
    pub fn base_pitch(&self, quat_imu_in_ars: [f64; 4]) -> Result<f64, UpkieError> {
        let rotation_imu_to_ars =
            rotation_matrix_from_quaternion(quat_imu_in_ars, self.quaternion_tolerance)?;
        let rotation_base_to_world = matrix(&self.rotation_ars_to_world)
            * rotation_imu_to_ars
            * matrix(&self.rotation_base_to_imu);
        Ok(pitch_frame_in_parent(&rotation_base_to_world))
    }
}

/// Converts row-major rows to a matrix.
pub fn matrix(rows: &Rows) -> Matrix3<f64> {
    Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
        rows[2][1], rows[2][2],
    )
}

/// Converts a matrix to row-major rows.
pub fn rows(matrix: &Matrix3<f64>) -> Rows {
    std::array::from_fn(|i| std::array::from_fn(|j| matrix[(i, j)]))
}

/// Converts a unit quaternion `[w, x, y, z]` to the matrix of the same rotation.
///
/// Fails with [`UpkieError::InvalidQuaternion`] when the squared norm of the
/// quaternion is further than `tolerance` from one, or is not a number.
pub fn rotation_matrix_from_quaternion(
    quat: [f64; 4],
    tolerance: f64,
) -> Result<Matrix3<f64>, UpkieError> {
    let [w, x, y, z] = quat;
    let norm2 = w * w + x * x + y * y + z * z;
    if !((norm2 - 1.0).abs() <= tolerance) {
        return Err(UpkieError::InvalidQuaternion {
            quat,
            norm2,
            tolerance,
        });
    }
    Ok(Matrix3::new(
        1.0 - 2.0 * (y * y + z * z),
        2.0 * (x * y - z * w),
        2.0 * (w * y + x * z),
        2.0 * (x * y + z * w),
        1.0 - 2.0 * (x * x + z * z),
        2.0 * (y * z - x * w),
        2.0 * (x * z - y * w),
        2.0 * (y * z + x * w),
        1.0 - 2.0 * (x * x + y * y),
    ))
}

/// Pitch angle of a frame relative to the vertical of its parent.
///
/// ```text
///     parent z
///       ^    frame z
///       |     /
///       |    /
///       |   /
///       |  /
///       | /
///       |/
///      (x)-----------> heading vector
///        \  )
///         \+  positive pitch
///          \
///           \
///          frame x
/// ```
///
/// The angle goes from the heading vector (sagittal vector projected on the
/// horizontal plane) to the sagittal vector, counterclockwise around the
/// lateral axis `(x)` pointing away from the reader. It is positive when the
/// frame leans forward and lies in `(-pi, pi]`.
///
/// `orientation_frame_in_parent` is the rotation matrix from the frame to
/// its parent. Its first column does not need to be exactly normalized.
pub fn pitch_frame_in_parent(orientation_frame_in_parent: &Matrix3<f64>) -> f64 {
    let sagittal = orientation_frame_in_parent.column(0).normalize();
    let sign = if sagittal.z < 0.0 { 1.0 } else { -1.0 };

    let horizontal = Vector3::new(sagittal.x, sagittal.y, 0.0);
    let horizontal_norm = horizontal.norm();
    if horizontal_norm < f64::EPSILON {
        // Sagittal vector along the vertical, no heading to measure from.
        return sign * FRAC_PI_2;
    }
    let mut heading = horizontal / horizontal_norm;
    if orientation_frame_in_parent[(2, 2)] < 0.0 {
        heading = -heading;
    }

    let cos_pitch = sagittal.dot(&heading).clamp(-1.0, 1.0);
    let pitch = sign * cos_pitch.acos();
    if pitch <= -PI {
        PI
    } else {
        pitch
    }
}

/// Pitch angle of the base in the world from an IMU quaternion.
///
/// `rotation_base_to_imu` defaults to [`ROTATION_BASE_TO_IMU`]. The ARS
/// frame and quaternion tolerance take their default values; use
/// [`ImuCalibration::base_pitch`] for other sensor placements.
pub fn pitch_from_imu(
    quat_imu_in_ars: [f64; 4],
    rotation_base_to_imu: Option<&Matrix3<f64>>,
) -> Result<f64, UpkieError> {
    let mut calibration = ImuCalibration::default();
    if let Some(rotation) = rotation_base_to_imu {
        calibration.rotation_base_to_imu = rows(rotation);
    }
    calibration.base_pitch(quat_imu_in_ars)
}

/// Body angular velocity of the base frame from IMU readings.
///
/// With `R_BI` the rotation from the IMU to the base frame, the angular
/// velocity of the base in the base frame is `R_BI · ω_I`.
/// `rotation_base_to_imu` defaults to `diag(-1, 1, -1)`.
pub fn base_angular_velocity_from_imu(
    angular_velocity_imu_in_imu: [f64; 3],
    rotation_base_to_imu: Option<&Matrix3<f64>>,
) -> Vector3<f64> {
    let rotation_base_to_imu = rotation_base_to_imu
        .copied()
        .unwrap_or_else(|| Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, -1.0)));
    rotation_base_to_imu.transpose() * Vector3::from(angular_velocity_imu_in_imu)
}

#[cfg(test)]
mod test {
    use super::*;
    use nalgebra::UnitQuaternion;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn rotation_y(theta: f64) -> Matrix3<f64> {
        Matrix3::new(
            theta.cos(),
            0.0,
            theta.sin(),
            0.0,
            1.0,
            0.0,
            -theta.sin(),
            0.0,
            theta.cos(),
        )
    }

    fn wxyz(rotation: &UnitQuaternion<f64>) -> [f64; 4] {
        let c = rotation.quaternion().coords;
        [c[3], c[0], c[1], c[2]]
    }

    /// IMU quaternion for which the base pitches by `theta` in the world.
    fn imu_quaternion_for_base_pitch(theta: f64) -> [f64; 4] {
        [(0.5 * theta).cos(), 0.0, -(0.5 * theta).sin(), 0.0]
    }

    #[test]
    fn test_identity_is_upright() {
        let identity = Matrix3::identity();
        assert_eq!(pitch_from_imu([1.0, 0.0, 0.0, 0.0], Some(&identity)).unwrap(), 0.0);
        assert_eq!(pitch_from_imu([1.0, 0.0, 0.0, 0.0], None).unwrap(), 0.0);
    }

    #[test]
    fn test_close_to_zero() {
        let theta = 1e-3;
        let pitch = pitch_frame_in_parent(&rotation_y(theta));
        assert!((pitch - theta).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_not_neatly_normalized() {
        let theta = 1e-3;
        let mut orientation = rotation_y(theta);
        orientation.column_mut(0).scale_mut(1.0 - 1e-2);
        let pitch = pitch_frame_in_parent(&orientation);
        assert!((pitch - theta).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_beyond_horizontal() {
        for theta in [2.5, -2.5, 1.7, -1.7, 0.4, -0.4] {
            let pitch = pitch_frame_in_parent(&rotation_y(theta));
            assert!((pitch - theta).abs() < 1e-9, "{} != {}", pitch, theta);
        }
    }

    #[test]
    fn test_sagittal_along_vertical() {
        let pitch = pitch_frame_in_parent(&rotation_y(FRAC_PI_2));
        assert!((pitch - FRAC_PI_2).abs() < 1e-9);
    }

    #[test]
    fn test_imu_quaternion_convention() {
        for theta in [1.2, 0.3, -0.3, -1.2] {
            let pitch = pitch_from_imu(imu_quaternion_for_base_pitch(theta), None).unwrap();
            assert!((pitch - theta).abs() < 1e-9);
        }
    }

    #[test]
    fn test_invalid_quaternion() {
        let err = pitch_from_imu([1.0, 1.0, 1.0, 1.0], None).unwrap_err();
        assert!(matches!(err, UpkieError::InvalidQuaternion { norm2, .. } if norm2 == 4.0));
        assert!(pitch_from_imu([f64::NAN, 0.0, 0.0, 0.0], None).is_err());
        assert!(pitch_from_imu([1.0 + 1e-7, 0.0, 0.0, 0.0], None).is_ok());
    }

    #[test]
    fn test_calibrated_tolerance() {
        let calibration = ImuCalibration::default().quaternion_tolerance(1e-1);
        assert!(calibration.base_pitch([1.02, 0.0, 0.0, 0.0]).is_ok());
        assert!(ImuCalibration::default().base_pitch([1.02, 0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_mounting_offset_matches_calibration() {
        let offset = rotation_y(0.2);
        let calibration = ImuCalibration::default().rotation_base_to_imu(rows(&offset));
        for theta in [-1.0, 0.0, 0.4] {
            let quat = imu_quaternion_for_base_pitch(theta);
            assert_eq!(
                pitch_from_imu(quat, Some(&offset)).unwrap(),
                calibration.base_pitch(quat).unwrap()
            );
        }
        assert_eq!(matrix(&rows(&offset)), offset);
    }

    #[test]
    fn test_pitch_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..10_000 {
            let q: [f64; 4] = [
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            ];
            let norm = q.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm < 1e-3 {
                continue;
            }
            let q = q.map(|v| v / norm);
            let pitch = pitch_from_imu(q, None).unwrap();
            assert!(pitch > -PI && pitch <= PI, "pitch {} out of range", pitch);
        }
    }

    #[test]
    fn test_yaw_does_not_leak_into_pitch() {
        for theta in [0.0, 0.3, -0.8] {
            for yaw in [-3.0, -1.0, 0.5, 2.0, 3.1] {
                // Rotation of the IMU in the ARS frame for a base yawing by `yaw`
                // and pitching by `theta` in the world.
                let rotation = UnitQuaternion::from_euler_angles(0.0, -theta, -yaw);
                let pitch = pitch_from_imu(wxyz(&rotation), None).unwrap();
                assert!((pitch - theta).abs() < 1e-9, "yaw {} gave {}", yaw, pitch);
            }
        }
    }

    #[test]
    fn test_angular_velocity() {
        let omega = base_angular_velocity_from_imu([0.1, 0.2, 0.3], None);
        assert_eq!(omega, Vector3::new(-0.1, 0.2, -0.3));
        let identity = Matrix3::identity();
        let omega = base_angular_velocity_from_imu([0.1, 0.2, 0.3], Some(&identity));
        assert_eq!(omega, Vector3::new(0.1, 0.2, 0.3));
    }
}
