//! Utilities for interaction of agents and environments.
use crate::{
    record::{RecordValue, Recorder},
    Env, Policy,
};
use anyhow::Result;
use log::info;

/// Run episodes with a policy and a recorder, blocking at every tick.
///
/// Environments never truncate episodes on their own: truncation after
/// `max_steps` is done here. A record is written for every step with the
/// reward, the episode and step indices, on top of what the environment
/// reports. Returns the sum of rewards of each episode.
pub fn run_episodes<E, P, R>(
    env: &mut E,
    policy: &mut P,
    n_episodes: usize,
    max_steps: Option<usize>,
    recorder: &mut R,
) -> Result<Vec<f64>>
where
    E: Env,
    P: Policy<E>,
    R: Recorder,
{
    let mut returns = Vec::with_capacity(n_episodes);

    for episode in 0..n_episodes {
        let (mut prev_obs, _) = env.reset(None)?;
        let mut count_step = 0;
        let mut r_total = 0.0;

        loop {
            let act = policy.sample(&prev_obs);
            let (mut step, mut record) = env.step(&act)?;
            count_step += 1;
            r_total += step.reward;
            step.is_truncated |= max_steps.map_or(false, |n| count_step >= n);

            record.insert("reward", RecordValue::Scalar(step.reward));
            record.insert("episode", RecordValue::Scalar(episode as _));
            record.insert("step", RecordValue::Scalar(count_step as _));
            recorder.write(record);

            if step.is_done() {
                break;
            }
            prev_obs = step.obs;
        }
        info!(
            "Episode {}, {} steps, return = {}",
            episode, count_step, r_total
        );
        returns.push(r_total);
    }

    Ok(returns)
}

/// Same as [`run_episodes`] but steps with [`Env::async_step`].
///
/// Meant to run as a single task of a cooperative event loop.
pub async fn run_episodes_async<E, P, R>(
    env: &mut E,
    policy: &mut P,
    n_episodes: usize,
    max_steps: Option<usize>,
    recorder: &mut R,
) -> Result<Vec<f64>>
where
    E: Env,
    P: Policy<E>,
    R: Recorder,
{
    let mut returns = Vec::with_capacity(n_episodes);

    for episode in 0..n_episodes {
        let (mut prev_obs, _) = env.reset(None)?;
        let mut count_step = 0;
        let mut r_total = 0.0;

        loop {
            let act = policy.sample(&prev_obs);
            let (mut step, mut record) = env.async_step(&act).await?;
            count_step += 1;
            r_total += step.reward;
            step.is_truncated |= max_steps.map_or(false, |n| count_step >= n);

            record.insert("reward", RecordValue::Scalar(step.reward));
            record.insert("episode", RecordValue::Scalar(episode as _));
            record.insert("step", RecordValue::Scalar(count_step as _));
            recorder.write(record);

            if step.is_done() {
                break;
            }
            prev_obs = step.obs;
        }
        info!(
            "Episode {}, {} steps, return = {}",
            episode, count_step, r_total
        );
        returns.push(r_total);
    }

    Ok(returns)
}
