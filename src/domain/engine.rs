//! Step/reset state machine shared by the environment types.
//!
//! The engine owns the market series it steps through, one portfolio ledger
//! and one episode history per episode, and its own random stream. Any error
//! raised inside `reset` or `step` drops the episode and returns the engine to
//! [`EpisodeState::Unreset`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::env_config::{EnvConfig, InitialPosition};
use super::error::GymError;
use super::execution::{trade_to_position, FeeRate};
use super::features::{default_dynamic_features, DynamicFeature};
use super::history::{EpisodeHistory, HistoryRecord, InfoSnapshot, REWARD_COLUMN};
use super::metrics::{compute_all, default_metrics, Metric, MetricValue};
use super::portfolio::PortfolioLedger;
use super::reward::{LogReturn, RewardFunction};
use super::series::MarketSeries;

/// Share of `max_leverage` at which a leveraged account is liquidated.
const LEVERAGE_MARGIN: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeState {
    Unreset,
    Ready,
    Terminated,
    Truncated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LimitOrder {
    pub position: f64,
    pub limit_price: f64,
    pub persistent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationShape {
    Flat(usize),
    Windowed { window: usize, features: usize },
}

impl ObservationShape {
    pub fn dims(&self) -> Vec<usize> {
        match *self {
            ObservationShape::Flat(n) => vec![n],
            ObservationShape::Windowed { window, features } => vec![window, features],
        }
    }

    pub fn features_per_row(&self) -> usize {
        match *self {
            ObservationShape::Flat(n) => n,
            ObservationShape::Windowed { features, .. } => features,
        }
    }
}

/// Row-major feature block handed to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub features: Vec<f64>,
    pub shape: ObservationShape,
}

impl Observation {
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        self.features
            .chunks(self.shape.features_per_row().max(1))
    }

    /// Features of the most recent tick.
    pub fn latest(&self) -> &[f64] {
        let n = self.shape.features_per_row();
        &self.features[self.features.len() - n..]
    }
}

#[derive(Debug, Clone)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
    pub info: HistoryRecord,
}

/// Pluggable collaborators of an environment.
pub struct EnvHooks {
    pub reward_function: Box<dyn RewardFunction>,
    pub dynamic_features: Vec<DynamicFeature>,
    pub metrics: Vec<Metric>,
    pub seed: Option<u64>,
}

impl Default for EnvHooks {
    fn default() -> Self {
        EnvHooks {
            reward_function: Box::new(LogReturn),
            dynamic_features: default_dynamic_features(),
            metrics: default_metrics(),
            seed: None,
        }
    }
}

struct Episode {
    ledger: PortfolioLedger,
    history: EpisodeHistory,
    idx: usize,
    step: usize,
    position: f64,
    /// Dynamic feature values per series row, written as rows are observed.
    dynamic_values: Vec<f64>,
}

pub struct StepEngine {
    config: EnvConfig,
    fee: FeeRate,
    series: MarketSeries,
    reward_function: Box<dyn RewardFunction>,
    dynamic_features: Vec<DynamicFeature>,
    metrics: Vec<Metric>,
    rng: StdRng,
    state: EpisodeState,
    episode: Option<Episode>,
    limit_orders: Vec<LimitOrder>,
    results: Vec<MetricValue>,
}

impl StepEngine {
    pub fn new(config: EnvConfig, hooks: EnvHooks, series: MarketSeries) -> Result<Self, GymError> {
        config.validate()?;
        let fee = config.fee_rate()?;
        check_series_fits(&config, &series)?;
        let rng = match hooks.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(StepEngine {
            config,
            fee,
            series,
            reward_function: hooks.reward_function,
            dynamic_features: hooks.dynamic_features,
            metrics: hooks.metrics,
            rng,
            state: EpisodeState::Unreset,
            episode: None,
            limit_orders: Vec::new(),
            results: Vec::new(),
        })
    }

    /// Swaps the market series. The current episode, if any, is dropped.
    pub fn set_series(&mut self, series: MarketSeries) -> Result<(), GymError> {
        check_series_fits(&self.config, &series)?;
        self.series = series;
        self.episode = None;
        self.state = EpisodeState::Unreset;
        Ok(())
    }

    pub fn series(&self) -> &MarketSeries {
        &self.series
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.config.name = name.into();
    }

    pub fn state(&self) -> EpisodeState {
        self.state
    }

    pub fn action_space(&self) -> usize {
        self.config.positions.len()
    }

    pub fn sample_action(&mut self) -> usize {
        self.rng.gen_range(0..self.config.positions.len())
    }

    pub fn observation_shape(&self) -> ObservationShape {
        let features = self.series.nb_features() + self.dynamic_features.len();
        match self.config.windows {
            Some(window) => ObservationShape::Windowed { window, features },
            None => ObservationShape::Flat(features),
        }
    }

    pub fn history(&self) -> Option<&EpisodeHistory> {
        self.episode.as_ref().map(|e| &e.history)
    }

    pub fn ledger(&self) -> Option<&PortfolioLedger> {
        self.episode.as_ref().map(|e| &e.ledger)
    }

    pub fn position(&self) -> Option<f64> {
        self.episode.as_ref().map(|e| e.position)
    }

    pub fn limit_orders(&self) -> &[LimitOrder] {
        &self.limit_orders
    }

    /// Metrics of the last finished episode.
    pub fn results(&self) -> &[MetricValue] {
        &self.results
    }

    pub fn add_metric(&mut self, metric: Metric) {
        self.metrics.push(metric);
    }

    /// Registers a conditional re-balance to `position`, replacing any order
    /// already targeting that position.
    pub fn add_limit_order(
        &mut self,
        position: f64,
        limit_price: f64,
        persistent: bool,
    ) -> Result<(), GymError> {
        if !position.is_finite() {
            return Err(GymError::config_invalid("limit_order", "position", "position must be finite"));
        }
        if !limit_price.is_finite() || limit_price <= 0.0 {
            return Err(GymError::config_invalid(
                "limit_order",
                "limit_price",
                "limit_price must be positive",
            ));
        }
        let order = LimitOrder {
            position,
            limit_price,
            persistent,
        };
        match self.limit_orders.iter_mut().find(|o| o.position == position) {
            Some(existing) => *existing = order,
            None => self.limit_orders.push(order),
        }
        Ok(())
    }

    pub fn reset(&mut self, seed: Option<u64>) -> Result<(Observation, HistoryRecord), GymError> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let result = self.start_episode();
        if result.is_err() {
            self.abort();
        }
        result
    }

    pub fn step(&mut self, action: usize) -> Result<StepResult, GymError> {
        match self.state {
            EpisodeState::Unreset => return Err(GymError::NotReset),
            EpisodeState::Terminated | EpisodeState::Truncated => {
                return Err(GymError::EpisodeOver);
            }
            EpisodeState::Ready => {}
        }
        if action >= self.config.positions.len() {
            return Err(GymError::InvalidAction {
                index: action,
                count: self.config.positions.len(),
            });
        }
        let result = self.advance(action);
        if result.is_err() {
            self.abort();
        }
        result
    }

    pub(crate) fn abort(&mut self) {
        self.episode = None;
        self.state = EpisodeState::Unreset;
    }

    fn start_episode(&mut self) -> Result<(Observation, HistoryRecord), GymError> {
        let len = self.series.len();
        let min_start = self.config.min_start();
        let idx = match self.config.max_episode_duration {
            Some(duration) => self.rng.gen_range(min_start..=len - duration),
            None => min_start,
        };

        let positions = &self.config.positions;
        let position_index = match self.config.initial_position {
            InitialPosition::Fixed(p) => positions.iter().position(|&q| q == p).unwrap_or(0),
            InitialPosition::Random => self.rng.gen_range(0..positions.len()),
        };
        let position = positions[position_index];

        let price = self.series.close(idx);
        let value = self.config.portfolio_initial_value;
        let ledger = PortfolioLedger::with_target(position, value, price)?;

        let record = HistoryRecord {
            idx,
            step: 0,
            date: self.series.timestamp(idx),
            position_index,
            position,
            real_position: ledger.real_position(price)?,
            data: snapshot(&self.series, idx),
            portfolio_valuation: value,
            portfolio_distribution: ledger.distribution(),
            reward: 0.0,
        };
        let history = EpisodeHistory::new(len, record.clone())?;

        self.limit_orders.clear();
        self.results.clear();
        let episode = self.episode.insert(Episode {
            ledger,
            history,
            idx,
            step: 0,
            position,
            dynamic_values: vec![0.0; len * self.dynamic_features.len()],
        });
        self.state = EpisodeState::Ready;

        debug!(env = %self.config.name, idx, position, "episode reset");
        let observation = observe(
            &self.series,
            &self.dynamic_features,
            self.config.windows,
            episode,
        )?;
        Ok((observation, record))
    }

    fn advance(&mut self, action: usize) -> Result<StepResult, GymError> {
        let target = self.config.positions[action];
        let episode = self.episode.as_mut().ok_or(GymError::NotReset)?;

        if target != episode.position {
            let price = self.series.close(episode.idx);
            let fill = trade_to_position(&mut episode.ledger, target, price, self.fee)?;
            debug!(
                idx = episode.idx,
                from = episode.position,
                to = target,
                price,
                fee = fill.fee_paid,
                "trade"
            );
            episode.position = target;
        }

        episode.idx += 1;
        episode.step += 1;
        let idx = episode.idx;

        fill_limit_orders(&mut self.limit_orders, &self.series, self.fee, episode)?;

        let price = self.series.close(idx);
        episode.ledger.accrue_interest(self.config.borrow_interest_rate);
        let valuation = episode.ledger.valuation(price);
        let distribution = episode.ledger.distribution();

        let mut terminated = valuation <= 0.0;
        if let Some(max_leverage) = self.config.max_leverage {
            let borrowed = distribution.borrowed_asset * price + distribution.borrowed_fiat;
            let owned = distribution.asset * price + distribution.fiat;
            if borrowed > LEVERAGE_MARGIN * max_leverage * owned {
                terminated = true;
            }
        }
        let truncated = idx >= self.series.len() - 1
            || self
                .config
                .max_episode_duration
                .is_some_and(|d| episode.step >= d - 1);

        let real_position = if valuation > 0.0 {
            episode.ledger.real_position(price)?
        } else {
            episode.position
        };

        episode.history.append(HistoryRecord {
            idx,
            step: episode.step,
            date: self.series.timestamp(idx),
            position_index: action,
            position: episode.position,
            real_position,
            data: snapshot(&self.series, idx),
            portfolio_valuation: valuation,
            portfolio_distribution: distribution,
            reward: 0.0,
        })?;

        if !terminated {
            let reward = self.reward_function.reward(&episode.history)?;
            episode.history.set(REWARD_COLUMN, -1, reward)?;
        }

        self.state = if terminated {
            warn!(env = %self.config.name, idx, valuation, "episode terminated");
            EpisodeState::Terminated
        } else if truncated {
            EpisodeState::Truncated
        } else {
            EpisodeState::Ready
        };

        if terminated || truncated {
            self.results = compute_all(&self.metrics, &episode.history)?;
            if self.config.verbose {
                let summary = self
                    .results
                    .iter()
                    .map(|m| format!("{}: {:.2}%", m.name, m.value))
                    .collect::<Vec<_>>()
                    .join(" | ");
                info!(env = %self.config.name, steps = episode.step, "{summary}");
            }
        }

        let observation = observe(
            &self.series,
            &self.dynamic_features,
            self.config.windows,
            episode,
        )?;
        let info = episode.history.last().clone();
        Ok(StepResult {
            observation,
            reward: info.reward,
            terminated,
            truncated,
            info,
        })
    }
}

fn check_series_fits(config: &EnvConfig, series: &MarketSeries) -> Result<(), GymError> {
    let min_start = config.min_start();
    if series.len() < min_start + 2 {
        return Err(GymError::SeriesInvalid {
            reason: format!(
                "series has {} rows, need at least {} to take one step",
                series.len(),
                min_start + 2
            ),
        });
    }
    if let Some(duration) = config.max_episode_duration {
        if series.len() < min_start + duration {
            return Err(GymError::config_invalid(
                "env",
                "max_episode_duration",
                format!(
                    "max_episode_duration {duration} does not fit a series of {} rows",
                    series.len()
                ),
            ));
        }
    }
    Ok(())
}

fn snapshot(series: &MarketSeries, idx: usize) -> InfoSnapshot {
    InfoSnapshot {
        columns: Arc::clone(series.info_names()),
        values: series.info_snapshot(idx),
    }
}

fn fill_limit_orders(
    orders: &mut Vec<LimitOrder>,
    series: &MarketSeries,
    fee: FeeRate,
    episode: &mut Episode,
) -> Result<(), GymError> {
    let (low, high) = (series.low(episode.idx), series.high(episode.idx));
    let mut i = 0;
    while i < orders.len() {
        let order = orders[i];
        if order.position != episode.position && (low..=high).contains(&order.limit_price) {
            let fill = trade_to_position(&mut episode.ledger, order.position, order.limit_price, fee)?;
            debug!(
                idx = episode.idx,
                to = order.position,
                price = order.limit_price,
                fee = fill.fee_paid,
                "limit order filled"
            );
            episode.position = order.position;
            if !order.persistent {
                orders.remove(i);
                continue;
            }
        }
        i += 1;
    }
    Ok(())
}

fn observe(
    series: &MarketSeries,
    dynamic_features: &[DynamicFeature],
    windows: Option<usize>,
    episode: &mut Episode,
) -> Result<Observation, GymError> {
    let n_dynamic = dynamic_features.len();
    for (j, feature) in dynamic_features.iter().enumerate() {
        episode.dynamic_values[episode.idx * n_dynamic + j] = feature.compute(&episode.history)?;
    }

    let features = series.nb_features() + n_dynamic;
    let (first, shape) = match windows {
        Some(window) => (
            episode.idx + 1 - window,
            ObservationShape::Windowed { window, features },
        ),
        None => (episode.idx, ObservationShape::Flat(features)),
    };

    let mut values = Vec::with_capacity((episode.idx + 1 - first) * features);
    for row in first..=episode.idx {
        series.extend_features(row, &mut values);
        values.extend_from_slice(&episode.dynamic_values[row * n_dynamic..(row + 1) * n_dynamic]);
    }
    Ok(Observation {
        features: values,
        shape,
    })
}
