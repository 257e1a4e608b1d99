//! Environment configuration.

use super::error::GymError;
use super::execution::FeeRate;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InitialPosition {
    Fixed(f64),
    /// Uniform draw from the position set at every reset.
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub name: String,
    /// Allowed exposures, strictly increasing. The action space indexes this list.
    pub positions: Vec<f64>,
    pub initial_position: InitialPosition,
    pub portfolio_initial_value: f64,
    pub trading_fees: f64,
    /// Per-tick rate charged on borrowed balances.
    pub borrow_interest_rate: f64,
    pub max_leverage: Option<f64>,
    pub windows: Option<usize>,
    pub max_episode_duration: Option<usize>,
    pub verbose: bool,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            name: "Stock".to_string(),
            positions: vec![0.0, 1.0],
            initial_position: InitialPosition::Fixed(0.0),
            portfolio_initial_value: 1000.0,
            trading_fees: 0.0,
            borrow_interest_rate: 0.0,
            max_leverage: None,
            windows: None,
            max_episode_duration: None,
            verbose: false,
        }
    }
}

impl EnvConfig {
    pub fn fee_rate(&self) -> Result<FeeRate, GymError> {
        FeeRate::new(self.trading_fees)
    }

    /// First series row an episode may start on.
    pub fn min_start(&self) -> usize {
        self.windows.map_or(0, |w| w.saturating_sub(1))
    }

    pub fn validate(&self) -> Result<(), GymError> {
        if self.positions.is_empty() {
            return Err(invalid("positions", "at least one position is required"));
        }
        if self.positions.iter().any(|p| !p.is_finite()) {
            return Err(invalid("positions", "positions must be finite"));
        }
        if self.positions.windows(2).any(|w| w[1] <= w[0]) {
            return Err(invalid("positions", "positions must be strictly increasing"));
        }
        if let InitialPosition::Fixed(p) = self.initial_position {
            if !self.positions.contains(&p) {
                return Err(invalid(
                    "initial_position",
                    format!("initial_position {p} is not one of the configured positions"),
                ));
            }
        }
        if !self.portfolio_initial_value.is_finite() || self.portfolio_initial_value <= 0.0 {
            return Err(invalid(
                "portfolio_initial_value",
                "portfolio_initial_value must be positive",
            ));
        }
        self.fee_rate()?;
        if !self.borrow_interest_rate.is_finite() || self.borrow_interest_rate < 0.0 {
            return Err(invalid(
                "borrow_interest_rate",
                "borrow_interest_rate must be non-negative",
            ));
        }
        if let Some(leverage) = self.max_leverage {
            if !leverage.is_finite() || leverage <= 0.0 {
                return Err(invalid("max_leverage", "max_leverage must be positive"));
            }
        }
        if self.windows == Some(0) {
            return Err(invalid("windows", "windows must be at least 1"));
        }
        if let Some(duration) = self.max_episode_duration {
            if duration < 2 {
                return Err(invalid(
                    "max_episode_duration",
                    "max_episode_duration must be at least 2",
                ));
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> GymError {
    GymError::config_invalid("env", key, reason)
}
