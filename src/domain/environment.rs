//! Single-series and multi-dataset trading environments.
//!
//! Both wrap a [`StepEngine`]; the multi-dataset variant swaps the engine's
//! series through a [`DatasetRotator`] between episodes.

use tracing::info;

use super::engine::{EnvHooks, EpisodeState, Observation, ObservationShape, StepEngine, StepResult};
use super::env_config::EnvConfig;
use super::error::GymError;
use super::history::{EpisodeHistory, HistoryRecord};
use super::metrics::{Metric, MetricValue};
use super::rotation::DatasetRotator;
use super::series::MarketSeries;

pub struct TradingEnv {
    engine: StepEngine,
}

impl TradingEnv {
    pub fn new(series: MarketSeries, config: EnvConfig) -> Result<Self, GymError> {
        Self::with_hooks(series, config, EnvHooks::default())
    }

    pub fn with_hooks(
        series: MarketSeries,
        config: EnvConfig,
        hooks: EnvHooks,
    ) -> Result<Self, GymError> {
        Ok(TradingEnv {
            engine: StepEngine::new(config, hooks, series)?,
        })
    }

    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, HistoryRecord), GymError> {
        self.engine.reset(seed)
    }

    pub fn step(&mut self, action: usize) -> Result<StepResult, GymError> {
        self.engine.step(action)
    }

    pub fn add_limit_order(
        &mut self,
        position: f64,
        limit_price: f64,
        persistent: bool,
    ) -> Result<(), GymError> {
        self.engine.add_limit_order(position, limit_price, persistent)
    }

    pub fn add_metric(&mut self, metric: Metric) {
        self.engine.add_metric(metric);
    }

    pub fn sample_action(&mut self) -> usize {
        self.engine.sample_action()
    }

    pub fn action_space(&self) -> usize {
        self.engine.action_space()
    }

    pub fn observation_shape(&self) -> ObservationShape {
        self.engine.observation_shape()
    }

    pub fn state(&self) -> EpisodeState {
        self.engine.state()
    }

    pub fn history(&self) -> Option<&EpisodeHistory> {
        self.engine.history()
    }

    pub fn results(&self) -> &[MetricValue] {
        self.engine.results()
    }

    pub fn engine(&self) -> &StepEngine {
        &self.engine
    }
}

pub struct MultiDatasetTradingEnv {
    engine: StepEngine,
    rotator: DatasetRotator,
    episodes_between_dataset_switch: usize,
    resets: usize,
}

impl MultiDatasetTradingEnv {
    /// Loads the first dataset and names the environment after it.
    pub fn new(
        config: EnvConfig,
        hooks: EnvHooks,
        mut rotator: DatasetRotator,
        episodes_between_dataset_switch: usize,
    ) -> Result<Self, GymError> {
        if episodes_between_dataset_switch == 0 {
            return Err(GymError::config_invalid(
                "data",
                "episodes_between_dataset_switch",
                "episodes_between_dataset_switch must be at least 1",
            ));
        }
        let (id, series) = rotator.pick_next()?;
        let mut engine = StepEngine::new(config, hooks, series)?;
        engine.set_name(id);
        Ok(MultiDatasetTradingEnv {
            engine,
            rotator,
            episodes_between_dataset_switch,
            resets: 0,
        })
    }

    /// Starts a new episode, switching dataset every
    /// `episodes_between_dataset_switch` resets.
    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, HistoryRecord), GymError> {
        if let Some(seed) = seed {
            self.rotator.reseed(seed);
        }
        if self.resets > 0 && self.resets % self.episodes_between_dataset_switch == 0 {
            if let Err(err) = self.switch_dataset() {
                self.engine.abort();
                return Err(err);
            }
        }
        self.resets += 1;
        self.engine.reset(seed)
    }

    fn switch_dataset(&mut self) -> Result<(), GymError> {
        let (id, series) = self.rotator.pick_next()?;
        self.engine.set_series(series)?;
        info!(dataset = %id, "switched dataset");
        self.engine.set_name(id);
        Ok(())
    }

    pub fn step(&mut self, action: usize) -> Result<StepResult, GymError> {
        self.engine.step(action)
    }

    pub fn add_limit_order(
        &mut self,
        position: f64,
        limit_price: f64,
        persistent: bool,
    ) -> Result<(), GymError> {
        self.engine.add_limit_order(position, limit_price, persistent)
    }

    pub fn add_metric(&mut self, metric: Metric) {
        self.engine.add_metric(metric);
    }

    pub fn sample_action(&mut self) -> usize {
        self.engine.sample_action()
    }

    /// Identifier of the dataset currently loaded.
    pub fn name(&self) -> &str {
        self.engine.name()
    }

    pub fn action_space(&self) -> usize {
        self.engine.action_space()
    }

    pub fn observation_shape(&self) -> ObservationShape {
        self.engine.observation_shape()
    }

    pub fn state(&self) -> EpisodeState {
        self.engine.state()
    }

    pub fn history(&self) -> Option<&EpisodeHistory> {
        self.engine.history()
    }

    pub fn results(&self) -> &[MetricValue] {
        self.engine.results()
    }

    pub fn rotator(&self) -> &DatasetRotator {
        &self.rotator
    }

    pub fn engine(&self) -> &StepEngine {
        &self.engine
    }
}
