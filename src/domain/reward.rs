//! Reward functions evaluated over the episode history after every tick.

use super::error::{checked_div, GymError};
use super::history::EpisodeHistory;

pub trait RewardFunction {
    fn reward(&self, history: &EpisodeHistory) -> Result<f64, GymError>;
}

impl<F> RewardFunction for F
where
    F: Fn(&EpisodeHistory) -> Result<f64, GymError>,
{
    fn reward(&self, history: &EpisodeHistory) -> Result<f64, GymError> {
        self(history)
    }
}

/// `ln(v[-1] / v[-2])` over portfolio valuations.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReturn;

impl RewardFunction for LogReturn {
    fn reward(&self, history: &EpisodeHistory) -> Result<f64, GymError> {
        let current = history.valuation(-1)?;
        let previous = history.valuation(-2)?;
        if previous <= 0.0 || current <= 0.0 {
            return Err(GymError::non_finite("log return"));
        }
        Ok(checked_div(current, previous, "log return")?.ln())
    }
}
