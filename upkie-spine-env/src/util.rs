//! Accessors into observation and configuration mappings.
use serde_json::Value;
use upkie_core::UpkieError;

/// Returns the entry at `path`, e.g. `["imu", "orientation"]`.
pub fn get_path<'a>(mapping: &'a Value, path: &[&str]) -> Result<&'a Value, UpkieError> {
    path.iter().enumerate().try_fold(mapping, |value, (i, key)| {
        value.get(key).ok_or_else(|| {
            UpkieError::ObservationError(format!("missing key {}", path[..=i].join(".")))
        })
    })
}

/// Returns the number at `path`.
pub fn get_f64(mapping: &Value, path: &[&str]) -> Result<f64, UpkieError> {
    let value = get_path(mapping, path)?;
    value.as_f64().ok_or_else(|| {
        UpkieError::ObservationError(format!("{} is not a number: {}", path.join("."), value))
    })
}

/// Returns the array of `N` numbers at `path`.
pub fn get_f64_array<const N: usize>(
    mapping: &Value,
    path: &[&str],
) -> Result<[f64; N], UpkieError> {
    let value = get_path(mapping, path)?;
    let malformed = || {
        UpkieError::ObservationError(format!(
            "{} is not an array of {} numbers: {}",
            path.join("."),
            N,
            value
        ))
    };
    let entries = value.as_array().ok_or_else(malformed)?;
    if entries.len() != N {
        return Err(malformed());
    }
    let mut out = [0.0; N];
    for (x, entry) in out.iter_mut().zip(entries) {
        *x = entry.as_f64().ok_or_else(malformed)?;
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accessors() -> Result<(), UpkieError> {
        let observation = json!({
            "imu": {"orientation": [1.0, 0.0, 0.0, 0.0]},
            "wheel_odometry": {"position": 0.25, "velocity": "fast"},
        });
        assert_eq!(get_f64(&observation, &["wheel_odometry", "position"])?, 0.25);
        assert_eq!(
            get_f64_array::<4>(&observation, &["imu", "orientation"])?,
            [1.0, 0.0, 0.0, 0.0]
        );
        Ok(())
    }

    #[test]
    fn test_malformed_entries() {
        let observation = json!({"imu": {"orientation": [1.0, 0.0]}});
        match get_f64(&observation, &["imu", "angular_velocity"]) {
            Err(UpkieError::ObservationError(msg)) => assert!(msg.contains("imu.angular_velocity")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(get_f64(&observation, &["imu"]).is_err());
        assert!(get_f64_array::<4>(&observation, &["imu", "orientation"]).is_err());
    }
}
