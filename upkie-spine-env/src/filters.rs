//! Scalar filters applied to actions.
use log::warn;
use upkie_core::UpkieError;

/// Clamps a value between optional lower and upper bounds.
pub fn clamp(value: f64, lower: Option<f64>, upper: Option<f64>) -> f64 {
    match (lower, upper) {
        (Some(lower), _) if value < lower => lower,
        (_, Some(upper)) if value > upper => upper,
        _ => value,
    }
}

/// Clamps the absolute value of a value, keeping its sign.
pub fn clamp_abs(value: f64, bound: f64) -> f64 {
    clamp(value, Some(-bound), Some(bound))
}

/// Same as [`clamp`] with both bounds, logging a warning when the value changes.
pub fn clamp_and_warn(value: f64, lower: f64, upper: f64, label: &str) -> f64 {
    if value < lower {
        warn!("{}={} clamped to lower={}", label, value, lower);
        lower
    } else if value > upper {
        warn!("{}={} clamped to upper={}", label, value, upper);
        upper
    } else {
        value
    }
}

/// First-order low-pass filter.
///
/// `cutoff_period` is the time constant of the filter and `dt` the sampling
/// period, both in seconds. Their ratio must stay below 0.5 to respect the
/// sampling theorem.
pub fn low_pass_filter(
    prev_output: f64,
    cutoff_period: f64,
    new_input: f64,
    dt: f64,
) -> Result<f64, UpkieError> {
    let alpha = dt / cutoff_period;
    if !(alpha < 0.5) || alpha < 0.0 {
        return Err(UpkieError::ConfigurationError(format!(
            "low-pass filter with dt = {} and cutoff period = {} is aliased (alpha = {})",
            dt, cutoff_period, alpha
        )));
    }
    Ok(prev_output + alpha * (new_input - prev_output))
}

/// Filters a signal so that its output and output derivative stay within bounds.
pub fn bounded_derivative_filter(
    prev_output: f64,
    new_input: f64,
    dt: f64,
    output_bounds: (f64, f64),
    derivative_bounds: (f64, f64),
) -> f64 {
    let derivative = (new_input - prev_output) / dt;
    let derivative = clamp(
        derivative,
        Some(derivative_bounds.0),
        Some(derivative_bounds.1),
    );
    let output = prev_output + derivative * dt;
    clamp(output, Some(output_bounds.0), Some(output_bounds.1))
}

/// [`bounded_derivative_filter`] with symmetric bounds.
pub fn abs_bounded_derivative_filter(
    prev_output: f64,
    new_input: f64,
    dt: f64,
    max_output: f64,
    max_derivative: f64,
) -> f64 {
    bounded_derivative_filter(
        prev_output,
        new_input,
        dt,
        (-max_output, max_output),
        (-max_derivative, max_derivative),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0, Some(-1.0), Some(1.0)), 1.0);
        assert_eq!(clamp(-2.0, Some(-1.0), Some(1.0)), -1.0);
        assert_eq!(clamp(0.5, Some(-1.0), Some(1.0)), 0.5);
        assert_eq!(clamp(-5.0, None, Some(1.0)), -5.0);
        assert_eq!(clamp(5.0, Some(1.0), None), 5.0);
        assert_eq!(clamp_abs(-3.0, 2.0), -2.0);
        assert_eq!(clamp_and_warn(3.0, 0.0, 1.0, "gain"), 1.0);
    }

    #[test]
    fn test_low_pass_filter() -> Result<(), UpkieError> {
        let mut output = 0.0;
        for _ in 0..1000 {
            output = low_pass_filter(output, 0.1, 1.0, 0.01)?;
        }
        assert!((output - 1.0).abs() < 1e-6);
        assert_eq!(low_pass_filter(0.5, 1.0, 0.5, 0.01)?, 0.5);
        Ok(())
    }

    #[test]
    fn test_low_pass_filter_aliasing() {
        assert!(matches!(
            low_pass_filter(0.0, 0.01, 1.0, 0.01),
            Err(UpkieError::ConfigurationError(_))
        ));
        assert!(low_pass_filter(0.0, 0.0, 1.0, 0.01).is_err());
    }

    #[test]
    fn test_bounded_derivative_filter() {
        // derivative 100 clamped to 10, output 0.1 after one step
        let output = abs_bounded_derivative_filter(0.0, 1.0, 0.01, 1.0, 10.0);
        assert!((output - 0.1).abs() < 1e-12);
        let output = abs_bounded_derivative_filter(0.9, 2.0, 1.0, 1.0, 10.0);
        assert_eq!(output, 1.0);
    }
}
