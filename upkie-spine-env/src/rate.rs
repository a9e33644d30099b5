//! Loop frequency regulation.
//!
//! A [`Ticker`] paces a control loop at a fixed frequency. It is bound to one
//! [`SchedulingMode`] for its whole lifetime: blocking tickers put the thread
//! to sleep in [`Ticker::wait`], suspending tickers yield to the tokio event
//! loop in [`Ticker::wait_async`]. Calling the other form is an error.
use log::{trace, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use upkie_core::UpkieError;

/// How the caller of a [`Ticker`] waits for the next tick.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum SchedulingMode {
    /// Plain blocking calls, sleeping the current thread.
    #[default]
    Blocking,

    /// Single task in a cooperative event loop, suspending until the tick.
    Suspending,

    /// Suspending if a tokio runtime is running when the ticker is built,
    /// blocking otherwise.
    Detect,
}

impl SchedulingMode {
    /// Replaces [`SchedulingMode::Detect`] with the mode of the calling context.
    pub fn resolve(self) -> Self {
        match self {
            Self::Detect => match tokio::runtime::Handle::try_current() {
                Ok(_) => Self::Suspending,
                Err(_) => Self::Blocking,
            },
            mode => mode,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Suspending => "suspending",
            Self::Detect => "detect",
        }
    }
}

/// Regulates a loop at `frequency` Hz, or not at all if `frequency` is `None`.
pub fn regulate(frequency: Option<f64>, mode: SchedulingMode) -> Result<Ticker, UpkieError> {
    Ticker::new(frequency, mode)
}

/// Fixed-period loop regulator.
///
/// Deadlines are `t0 + k * period` where `t0` is the construction time: a
/// late tick does not shift the following ones. Slack and measured period
/// are kept for diagnostics only.
#[derive(Debug)]
pub struct Ticker {
    name: String,
    mode: SchedulingMode,
    period: Option<Duration>,
    next_tick: Instant,
    last_tick: Instant,
    slack: f64,
    measured_period: f64,
}

impl Ticker {
    /// Builds a ticker. Fails if the frequency is not a positive number.
    pub fn new(frequency: Option<f64>, mode: SchedulingMode) -> Result<Self, UpkieError> {
        let period = match frequency {
            None => None,
            Some(f) if f.is_finite() && f > 0.0 => {
                let period = Duration::try_from_secs_f64(1.0 / f).map_err(|e| {
                    UpkieError::ConfigurationError(format!(
                        "loop frequency {} Hz gives an invalid period: {}",
                        f, e
                    ))
                })?;
                Some(period)
            }
            Some(f) => {
                return Err(UpkieError::ConfigurationError(format!(
                    "loop frequency should be positive, got {}",
                    f
                )))
            }
        };
        let now = Instant::now();
        let next_tick = now.checked_add(period.unwrap_or_default()).ok_or_else(|| {
            UpkieError::ConfigurationError(format!(
                "loop period {:?} is out of range",
                period.unwrap_or_default()
            ))
        })?;
        Ok(Self {
            name: "ticker".to_string(),
            mode: mode.resolve(),
            period,
            next_tick,
            last_tick: now,
            slack: 0.0,
            measured_period: 0.0,
        })
    }

    /// Sets the name used in log messages.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Scheduling mode the ticker is bound to, never [`SchedulingMode::Detect`].
    pub fn mode(&self) -> SchedulingMode {
        self.mode
    }

    /// Regulated period, `None` when regulation is disabled.
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Time left before the deadline at the last call, in seconds.
    ///
    /// Negative when the call came after its deadline.
    pub fn slack(&self) -> f64 {
        self.slack
    }

    /// Time between the last two ticks, in seconds.
    pub fn measured_period(&self) -> f64 {
        self.measured_period
    }

    /// Blocks the current thread until the next tick.
    pub fn wait(&mut self) -> Result<(), UpkieError> {
        self.check_mode(SchedulingMode::Blocking)?;
        if let Some(remaining) = self.remaining() {
            std::thread::sleep(remaining);
        }
        self.complete_tick();
        Ok(())
    }

    /// Suspends the calling task until the next tick.
    pub async fn wait_async(&mut self) -> Result<(), UpkieError> {
        self.check_mode(SchedulingMode::Suspending)?;
        if self.remaining().is_some() {
            let deadline = tokio::time::Instant::from_std(self.next_tick);
            tokio::time::sleep_until(deadline).await;
        }
        self.complete_tick();
        Ok(())
    }

    fn check_mode(&self, requested: SchedulingMode) -> Result<(), UpkieError> {
        if self.mode == requested {
            Ok(())
        } else {
            Err(UpkieError::SchedulingModeError {
                bound: self.mode.name(),
                requested: requested.name(),
            })
        }
    }

    /// Updates the slack and returns the time left before the deadline.
    fn remaining(&mut self) -> Option<Duration> {
        let period = self.period?;
        let now = Instant::now();
        let remaining = self.next_tick.checked_duration_since(now);
        self.slack = match remaining {
            Some(d) => d.as_secs_f64(),
            None => -now.duration_since(self.next_tick).as_secs_f64(),
        };
        if self.slack < -period.as_secs_f64() {
            warn!(
                "{} is late by {:.1} ms (period {:.1} ms)",
                self.name,
                -1e3 * self.slack,
                1e3 * period.as_secs_f64()
            );
        }
        remaining
    }

    fn complete_tick(&mut self) {
        if let Some(period) = self.period {
            let now = Instant::now();
            self.measured_period = now.duration_since(self.last_tick).as_secs_f64();
            self.last_tick = now;
            self.next_tick += period;
            trace!(
                "{}: slack = {:.6} s, measured period = {:.6} s",
                self.name,
                self.slack,
                self.measured_period
            );
        }
    }
}
