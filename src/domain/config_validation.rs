//! Configuration parsing and validation.
//!
//! Every key is checked before an environment is built; the typed results
//! feed the CLI.

use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::env_config::{EnvConfig, InitialPosition};
use crate::domain::error::GymError;
use crate::ports::config_port::ConfigPort;

const ENV: &str = "env";
const DATA: &str = "data";
const RUN: &str = "run";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    File(PathBuf),
    Directory {
        dir: PathBuf,
        episodes_between_dataset_switch: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub episodes: usize,
    pub seed: Option<u64>,
    pub render_dir: Option<PathBuf>,
}

/// Checks all three sections without building anything.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), GymError> {
    build_env_config(config)?;
    build_data_source(config)?;
    build_run_options(config)?;
    Ok(())
}

pub fn build_env_config(config: &dyn ConfigPort) -> Result<EnvConfig, GymError> {
    let defaults = EnvConfig::default();
    let positions = match non_empty(config, ENV, "positions") {
        Some(raw) => parse_positions(&raw)?,
        None => defaults.positions,
    };
    let env = EnvConfig {
        name: non_empty(config, ENV, "name").unwrap_or(defaults.name),
        positions,
        initial_position: parse_initial_position(config)?
            .unwrap_or(defaults.initial_position),
        portfolio_initial_value: optional::<f64>(config, ENV, "portfolio_initial_value")?
            .unwrap_or(defaults.portfolio_initial_value),
        trading_fees: optional::<f64>(config, ENV, "trading_fees")?
            .unwrap_or(defaults.trading_fees),
        borrow_interest_rate: optional::<f64>(config, ENV, "borrow_interest_rate")?
            .unwrap_or(defaults.borrow_interest_rate),
        max_leverage: optional::<f64>(config, ENV, "max_leverage")?,
        windows: optional::<usize>(config, ENV, "windows")?,
        max_episode_duration: optional::<usize>(config, ENV, "max_episode_duration")?,
        verbose: config.get_bool(ENV, "verbose", defaults.verbose),
    };
    env.validate()?;
    Ok(env)
}

/// Parses a comma separated position list such as `-1, 0, 0.5, 1`.
pub fn parse_positions(raw: &str) -> Result<Vec<f64>, GymError> {
    raw.split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<f64>().map_err(|_| {
                GymError::config_invalid(ENV, "positions", format!("invalid position '{item}'"))
            })
        })
        .collect()
}

fn parse_initial_position(config: &dyn ConfigPort) -> Result<Option<InitialPosition>, GymError> {
    let Some(raw) = non_empty(config, ENV, "initial_position") else {
        return Ok(None);
    };
    if raw.eq_ignore_ascii_case("random") {
        return Ok(Some(InitialPosition::Random));
    }
    raw.parse::<f64>()
        .map(|p| Some(InitialPosition::Fixed(p)))
        .map_err(|_| {
            GymError::config_invalid(
                ENV,
                "initial_position",
                "initial_position must be a number or 'random'",
            )
        })
}

pub fn build_data_source(config: &dyn ConfigPort) -> Result<DataSource, GymError> {
    let path = non_empty(config, DATA, "path");
    let dir = non_empty(config, DATA, "dataset_dir");
    match (path, dir) {
        (Some(_), Some(_)) => Err(GymError::config_invalid(
            DATA,
            "dataset_dir",
            "set either path or dataset_dir, not both",
        )),
        (Some(path), None) => Ok(DataSource::File(PathBuf::from(path))),
        (None, Some(dir)) => {
            let every = optional::<usize>(config, DATA, "episodes_between_dataset_switch")?
                .unwrap_or(1);
            if every == 0 {
                return Err(GymError::config_invalid(
                    DATA,
                    "episodes_between_dataset_switch",
                    "episodes_between_dataset_switch must be at least 1",
                ));
            }
            Ok(DataSource::Directory {
                dir: PathBuf::from(dir),
                episodes_between_dataset_switch: every,
            })
        }
        (None, None) => Err(GymError::ConfigMissing {
            section: DATA.to_string(),
            key: "path".to_string(),
        }),
    }
}

pub fn build_run_options(config: &dyn ConfigPort) -> Result<RunOptions, GymError> {
    let episodes = optional::<usize>(config, RUN, "episodes")?.unwrap_or(1);
    if episodes == 0 {
        return Err(GymError::config_invalid(
            RUN,
            "episodes",
            "episodes must be at least 1",
        ));
    }
    Ok(RunOptions {
        episodes,
        seed: optional::<u64>(config, RUN, "seed")?,
        render_dir: non_empty(config, RUN, "render_dir").map(PathBuf::from),
    })
}

fn non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn optional<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, GymError> {
    non_empty(config, section, key)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| {
                GymError::config_invalid(section, key, format!("cannot parse '{raw}' for {key}"))
            })
        })
        .transpose()
}
