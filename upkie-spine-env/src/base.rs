//! Environment exchanging observations and actions with a spine.
use crate::{
    init_randomization::InitRandomization,
    orientation::ImuCalibration,
    rate::Ticker,
    spine::{default_spine_config, merge_config, write_init_state, SpineInterface},
    util::get_f64_array,
    SpineEnvConfig,
};
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde_json::Value;
use std::time::Duration;
use upkie_core::{
    record::{Record, RecordValue},
    Act, Env, Info, Obs, Reward, Step, UpkieError,
};

/// Conversions between the mappings of the spine and vectors of an agent.
///
/// Every concrete environment implements this trait and plugs into
/// [`SpineEnv`], which takes care of the lifecycle.
pub trait SpineEnvConverter {
    /// Vectorized observation.
    type Obs: Obs;

    /// Vectorized action.
    type Act: Act;

    /// Called at every reset before the spine starts.
    ///
    /// `dt` is the period of the control loop if a frequency is configured.
    /// `imu` is the calibration the environment detects falls with, so that
    /// pitches seen by the agent agree with it.
    fn reset(&mut self, _dt: Option<f64>, _imu: &ImuCalibration, _rng: &mut StdRng) -> Result<()> {
        Ok(())
    }

    /// Reads what the converter needs from the first observation of an episode.
    fn parse_first_observation(&mut self, observation: &Value) -> Result<()>;

    /// Extracts the observation vector from a full observation mapping.
    fn vectorize_observation(&self, observation: &Value) -> Result<Self::Obs>;

    /// Converts an action vector into an action mapping for the spine.
    fn dictionarize_action(&mut self, act: &Self::Act) -> Result<Value>;
}

/// Full mappings exchanged with the spine.
#[derive(Clone, Debug, PartialEq)]
pub struct SpineInfo {
    /// Observation mapping sent by the spine.
    pub observation: Value,

    /// Action mapping sent to the spine, empty after a reset.
    pub action: Value,
}

impl Info for SpineInfo {}

/// Where [`SpineEnv`] stands in its episode lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EpisodeState {
    /// Not reset yet, or closed.
    Uninitialized,

    /// Inside [`Env::reset`], or after a reset that failed.
    Resetting,

    /// Stepping.
    Running,

    /// A fall was detected. Stepping is still allowed until the next reset.
    Terminated,
}

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Environment paced by a control loop and backed by a spine.
///
/// # Lifecycle
///
/// ```mermaid
/// stateDiagram-v2
///     [*] --> Uninitialized
///     Uninitialized --> Resetting: reset
///     Resetting --> Running: first observation
///     Running --> Running: step
///     Running --> Terminated: fall
///     Terminated --> Resetting: reset
///     Running --> Resetting: reset
///     Running --> Uninitialized: close
///     Terminated --> Uninitialized: close
/// ```
///
/// [`Env::reset`] stops any running session, builds a new [`Ticker`],
/// samples an initial state that goes into the spine configuration, and
/// starts the spine. The first observation after a start may come from the
/// previous session, so it is discarded before the first real observation is
/// fetched and handed to [`SpineEnvConverter::parse_first_observation`].
///
/// A step waits for the next tick, sends the action, reads the resulting
/// observation and detects falls. Episodes terminate when the base pitch
/// exceeds the fall pitch; they are never truncated here.
///
/// [`Env::step`] and [`Env::async_step`] are bound to the scheduling mode of
/// the configuration and fail with [`UpkieError::SchedulingModeError`] when
/// the other one is used.
pub struct SpineEnv<S, C, R>
where
    S: SpineInterface,
    C: SpineEnvConverter,
    R: Reward<C::Obs, C::Act>,
{
    config: SpineEnvConfig,

    spine: S,

    converter: C,

    reward: R,

    /// Default configuration with overrides and the last initial state.
    spine_config: Value,

    rng: StdRng,

    ticker: Option<Ticker>,

    state: EpisodeState,
}

impl<S, C, R> SpineEnv<S, C, R>
where
    S: SpineInterface,
    C: SpineEnvConverter,
    R: Reward<C::Obs, C::Act>,
{
    /// Constructs [`SpineEnv`].
    ///
    /// The configuration is checked before the spine is touched.
    pub fn new(config: SpineEnvConfig, spine: S, converter: C, reward: R) -> Result<Self> {
        config.validate()?;
        let mut spine_config = default_spine_config();
        merge_config(&mut spine_config, &config.spine_config);
        info!(
            "SpineEnv on {} at {:?} Hz (regulated: {}, {:?})",
            config.shm_name, config.frequency, config.regulate_frequency, config.scheduling
        );
        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            spine,
            converter,
            reward,
            spine_config,
            ticker: None,
            state: EpisodeState::Uninitialized,
        })
    }

    /// Period of the control loop in seconds, `None` without frequency.
    pub fn dt(&self) -> Option<f64> {
        self.config.frequency.map(|f| 1.0 / f)
    }

    /// Frequency of the control loop in Hz, `None` without frequency.
    pub fn frequency(&self) -> Option<f64> {
        self.config.frequency
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EpisodeState {
        self.state
    }

    /// Init randomization bounds, taken into account at the next reset.
    pub fn init_rand_mut(&mut self) -> &mut InitRandomization {
        &mut self.config.init_rand
    }

    /// Spine configuration sent at the last reset.
    pub fn spine_config(&self) -> &Value {
        &self.spine_config
    }

    /// Configuration of the environment.
    pub fn config(&self) -> &SpineEnvConfig {
        &self.config
    }

    /// Ticker of the current episode.
    pub fn ticker(&self) -> Option<&Ticker> {
        self.ticker.as_ref()
    }

    /// Spine of the environment.
    pub fn spine(&self) -> &S {
        &self.spine
    }

    /// Mutable spine of the environment.
    pub fn spine_mut(&mut self) -> &mut S {
        &mut self.spine
    }

    /// Converter of the environment.
    pub fn converter(&self) -> &C {
        &self.converter
    }

    /// Reward function of the environment.
    pub fn reward(&self) -> &R {
        &self.reward
    }

    /// Detects a fall from the IMU orientation of an observation mapping.
    ///
    /// Returns the base pitch and whether it exceeds the fall pitch.
    pub fn detect_fall(&self, observation: &Value) -> Result<(f64, bool)> {
        let quat = get_f64_array::<4>(observation, &["imu", "orientation"])?;
        let pitch = self.config.imu.base_pitch(quat)?;
        Ok((pitch, pitch.abs() > self.config.fall_pitch))
    }

    fn start_spine(&mut self) -> Result<()> {
        let attempts = self.config.spine_retries;
        let interval = Duration::try_from_secs_f64(self.config.spine_retry_interval)
            .map_err(|e| {
                UpkieError::ConfigurationError(format!(
                    "invalid spine retry interval {}: {}",
                    self.config.spine_retry_interval, e
                ))
            })?;
        let mut reason = String::new();
        for attempt in 1..=attempts {
            match self.spine.start(&self.spine_config) {
                Ok(()) => {
                    info!("Spine {} started", self.config.shm_name);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Starting spine {} failed (attempt {}/{}): {}",
                        self.config.shm_name, attempt, attempts, e
                    );
                    reason = e.to_string();
                    if attempt < attempts {
                        std::thread::sleep(interval);
                    }
                }
            }
        }
        Err(UpkieError::SpineRetriesExhausted {
            shm_name: self.config.shm_name.clone(),
            attempts,
            reason,
        }
        .into())
    }

    fn check_reset(&self) -> Result<()> {
        match self.state {
            EpisodeState::Running | EpisodeState::Terminated => Ok(()),
            EpisodeState::Uninitialized | EpisodeState::Resetting => {
                Err(UpkieError::NotReset.into())
            }
        }
    }

    fn ticker_mut(&mut self) -> Result<&mut Ticker> {
        Ok(self.ticker.as_mut().ok_or(UpkieError::NotReset)?)
    }

    /// Sends an action and reads back the resulting observation.
    fn exchange(&mut self, a: &C::Act) -> Result<(Step<Self>, Record)> {
        let action = self.converter.dictionarize_action(a)?;
        self.spine.set_action(&action)?;
        let observation = self.spine.get_observation()?;
        let obs = self.converter.vectorize_observation(&observation)?;
        let reward = self.reward.get(&obs, a);
        let (pitch, is_terminated) = self.detect_fall(&observation)?;
        if is_terminated && self.state != EpisodeState::Terminated {
            info!(
                "Fall detected: pitch {:.3} rad beyond {:.3} rad",
                pitch, self.config.fall_pitch
            );
            self.state = EpisodeState::Terminated;
        }

        let mut record = Record::empty();
        if let Some(ticker) = self.ticker.as_ref() {
            record.insert("slack", RecordValue::Scalar(ticker.slack()));
            record.insert(
                "measured_period",
                RecordValue::Scalar(ticker.measured_period()),
            );
        }
        record.insert("pitch", RecordValue::Scalar(pitch));
        record.insert("reward", RecordValue::Scalar(reward));

        let info = SpineInfo {
            observation,
            action,
        };
        let step = Step::new(obs, a.clone(), reward, is_terminated, false, info);
        Ok((step, record))
    }
}

#[async_trait(?Send)]
impl<S, C, R> Env for SpineEnv<S, C, R>
where
    S: SpineInterface,
    C: SpineEnvConverter,
    R: Reward<C::Obs, C::Act>,
{
    type Obs = C::Obs;
    type Act = C::Act;
    type Info = SpineInfo;

    /// Resets the spine and returns the first observation of a new episode.
    ///
    /// The info carries the full observation mapping.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Self::Obs, Self::Info)> {
        trace!("SpineEnv::reset()");
        self.state = EpisodeState::Resetting;
        self.config.init_rand.validate()?;
        if let Some(seed) = seed {
            info!("Seeding SpineEnv with {}", seed);
            self.rng = StdRng::seed_from_u64(seed);
        }

        self.spine.stop()?;
        let frequency = if self.config.regulate_frequency {
            self.config.frequency
        } else {
            None
        };
        let ticker = Ticker::new(frequency, self.config.scheduling)?
            .name(format!("SpineEnv {}", self.config.shm_name));
        self.ticker = Some(ticker);

        let dt = self.dt();
        self.converter.reset(dt, &self.config.imu, &mut self.rng)?;
        let init_state = self.config.init_rand.sample(&mut self.rng);
        debug!("Initial state: {:?}", init_state);
        write_init_state(&mut self.spine_config, &init_state);
        self.start_spine()?;

        // The first observation after a start may predate the new session.
        let _stale = self.spine.get_observation()?;
        let observation = self.spine.get_observation()?;
        self.converter.parse_first_observation(&observation)?;
        let obs = self.converter.vectorize_observation(&observation)?;
        self.state = EpisodeState::Running;

        let info = SpineInfo {
            observation,
            action: Value::Object(Default::default()),
        };
        Ok((obs, info))
    }

    /// Waits for the next tick, blocking the thread, then steps.
    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        trace!("SpineEnv::step()");
        self.check_reset()?;
        self.ticker_mut()?.wait()?;
        self.exchange(a)
    }

    /// Waits for the next tick, suspending the task, then steps.
    async fn async_step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        trace!("SpineEnv::async_step()");
        self.check_reset()?;
        self.ticker_mut()?.wait_async().await?;
        self.exchange(a)
    }

    fn close(&mut self) -> Result<()> {
        if self.state != EpisodeState::Uninitialized {
            info!("Stopping spine {}", self.config.shm_name);
        }
        self.spine.stop()?;
        self.ticker = None;
        self.state = EpisodeState::Uninitialized;
        Ok(())
    }
}
