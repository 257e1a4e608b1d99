//! End-of-episode metrics computed from the full history.

use std::fmt;

use super::error::{checked_div, GymError};
use super::history::EpisodeHistory;

type MetricFn = Box<dyn Fn(&EpisodeHistory) -> Result<f64, GymError>>;

pub struct Metric {
    name: String,
    func: MetricFn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    pub name: String,
    pub value: f64,
}

impl Metric {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&EpisodeHistory) -> Result<f64, GymError> + 'static,
    {
        Metric {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Close-to-close change of the asset over the episode, in percent.
    pub fn market_return() -> Self {
        Metric::new("Market Return", |h| {
            let last = h.get_f64("data_close", -1)?;
            let first = h.get_f64("data_close", 0)?;
            Ok((checked_div(last, first, "market return")? - 1.0) * 100.0)
        })
    }

    /// Change of the portfolio valuation over the episode, in percent.
    pub fn portfolio_return() -> Self {
        Metric::new("Portfolio Return", |h| {
            let last = h.valuation(-1)?;
            let first = h.valuation(0)?;
            Ok((checked_div(last, first, "portfolio return")? - 1.0) * 100.0)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compute(&self, history: &EpisodeHistory) -> Result<MetricValue, GymError> {
        Ok(MetricValue {
            name: self.name.clone(),
            value: (self.func)(history)?,
        })
    }
}

impl fmt::Debug for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub fn default_metrics() -> Vec<Metric> {
    vec![Metric::market_return(), Metric::portfolio_return()]
}

pub fn compute_all(metrics: &[Metric], history: &EpisodeHistory) -> Result<Vec<MetricValue>, GymError> {
    metrics.iter().map(|m| m.compute(history)).collect()
}
