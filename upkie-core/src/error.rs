//! Errors in the library.
use thiserror::Error;

/// Errors in the library.
///
/// Trait methods return [`anyhow::Result`]; use
/// `err.downcast_ref::<UpkieError>()` to tell the kinds apart.
#[derive(Error, Debug)]
pub enum UpkieError {
    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),

    /// Quaternion whose squared norm is too far from one.
    #[error("Quaternion {quat:?} is not normalized (squared norm {norm2}, tolerance {tolerance})")]
    InvalidQuaternion {
        /// Offending quaternion in `[w, x, y, z]` format.
        quat: [f64; 4],
        /// Its squared norm.
        norm2: f64,
        /// Tolerance on `|norm2 - 1|`.
        tolerance: f64,
    },

    /// Blocking and suspending waits were mixed within one episode.
    #[error("Ticker is bound in {bound} mode but was waited on in {requested} mode")]
    SchedulingModeError {
        /// Mode the ticker was bound in.
        bound: &'static str,
        /// Mode of the offending call.
        requested: &'static str,
    },

    /// Inconsistent configuration, detected before any spine session opens.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The spine could not be started within the configured number of attempts.
    #[error("Spine {shm_name} unavailable after {attempts} attempts: {reason}")]
    SpineRetriesExhausted {
        /// Name of the shared-memory channel.
        shm_name: String,
        /// Number of attempts made.
        attempts: usize,
        /// Error returned by the last attempt.
        reason: String,
    },

    /// Observation or action mapping with a missing or malformed entry.
    #[error("Observation error: {0}")]
    ObservationError(String),

    /// Action vector that cannot be sent to the spine.
    #[error("Action error: {0}")]
    ActionError(String),

    /// The environment was stepped before being reset.
    #[error("Environment is not reset, call reset() before stepping")]
    NotReset,
}
