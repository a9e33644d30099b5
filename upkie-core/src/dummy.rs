//! This module is used for tests.
use crate::{record::Record, Act, Env, Info, Obs, Step};
use anyhow::Result;
use async_trait::async_trait;

#[derive(Clone, Debug)]
/// Remaining steps before termination.
pub struct CountdownObs(pub usize);

impl Obs for CountdownObs {
    fn len(&self) -> usize {
        1
    }
}

#[derive(Clone, Debug)]
/// Number of steps to count down.
pub struct CountdownAct(pub usize);

impl Act for CountdownAct {}

#[derive(Clone, Debug)]
/// Dummy info.
pub struct CountdownInfo;

impl Info for CountdownInfo {}

/// Environment terminating after a fixed number of unit steps.
pub struct CountdownEnv {
    length: usize,
    remaining: usize,
}

impl CountdownEnv {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            remaining: length,
        }
    }

    fn count_down(&mut self, a: &CountdownAct) -> (Step<Self>, Record) {
        self.remaining = self.remaining.saturating_sub(a.0);
        let step = Step::new(
            CountdownObs(self.remaining),
            a.clone(),
            1.0,
            self.remaining == 0,
            false,
            CountdownInfo,
        );
        (step, Record::empty())
    }
}

#[async_trait(?Send)]
impl Env for CountdownEnv {
    type Obs = CountdownObs;
    type Act = CountdownAct;
    type Info = CountdownInfo;

    fn reset(&mut self, _seed: Option<u64>) -> Result<(Self::Obs, Self::Info)> {
        self.remaining = self.length;
        Ok((CountdownObs(self.remaining), CountdownInfo))
    }

    fn step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        Ok(self.count_down(a))
    }

    async fn async_step(&mut self, a: &Self::Act) -> Result<(Step<Self>, Record)> {
        Ok(self.count_down(a))
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
