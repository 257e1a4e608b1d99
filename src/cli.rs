//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_render_adapter::CsvRenderAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{
    build_data_source, build_env_config, build_run_options, validate_config, DataSource,
    RunOptions,
};
use crate::domain::engine::{EnvHooks, StepEngine, StepResult};
use crate::domain::env_config::EnvConfig;
use crate::domain::environment::{MultiDatasetTradingEnv, TradingEnv};
use crate::domain::error::GymError;
use crate::domain::metrics::MetricValue;
use crate::domain::rotation::DatasetRotator;
use crate::domain::series::MarketSeries;
use crate::ports::data_port::DataPort;
use crate::ports::render_port::RenderPort;

#[derive(Parser, Debug)]
#[command(name = "tradegym", about = "Trading environment simulator for reinforcement learning")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play episodes with a uniformly random policy
    Run {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        episodes: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        render_dir: Option<PathBuf>,
    },
    /// Validate a configuration and the data it points to
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Command-line values that take precedence over the `[run]` section.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub episodes: Option<usize>,
    pub seed: Option<u64>,
    pub render_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeSummary {
    pub episode: usize,
    pub dataset: String,
    pub steps: usize,
    pub final_valuation: f64,
    pub terminated: bool,
    pub metrics: Vec<MetricValue>,
    pub render_path: Option<PathBuf>,
}

pub fn run(cli: Cli) -> ExitCode {
    init_logging();
    let result = match cli.command {
        Command::Run {
            config,
            episodes,
            seed,
            render_dir,
        } => {
            let overrides = RunOverrides {
                episodes,
                seed,
                render_dir,
            };
            run_episodes(&config, &overrides).map(|summaries| print_summaries(&summaries))
        }
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, GymError> {
    info!("loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn resolve_run_options(
    adapter: &FileConfigAdapter,
    overrides: &RunOverrides,
) -> Result<RunOptions, GymError> {
    let mut options = build_run_options(adapter)?;
    if let Some(episodes) = overrides.episodes {
        if episodes == 0 {
            return Err(GymError::config_invalid(
                "run",
                "episodes",
                "episodes must be at least 1",
            ));
        }
        options.episodes = episodes;
    }
    if overrides.seed.is_some() {
        options.seed = overrides.seed;
    }
    if overrides.render_dir.is_some() {
        options.render_dir = overrides.render_dir.clone();
    }
    Ok(options)
}

/// Loads the configuration and data, then plays `episodes` random-policy
/// episodes back to back.
pub fn run_episodes(
    config_path: &Path,
    overrides: &RunOverrides,
) -> Result<Vec<EpisodeSummary>, GymError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    let env_config = build_env_config(&adapter)?;
    let options = resolve_run_options(&adapter, overrides)?;
    let hooks = EnvHooks {
        seed: options.seed,
        ..EnvHooks::default()
    };
    let renderer = options.render_dir.clone().map(CsvRenderAdapter::new);

    match build_data_source(&adapter)? {
        DataSource::File(path) => {
            let series = CsvAdapter::load_path(&path)?;
            info!(rows = series.len(), "loaded {}", path.display());
            let mut env = TradingEnv::with_hooks(series, env_config, hooks)?;
            play(&mut env, &options, renderer.as_ref())
        }
        DataSource::Directory {
            dir,
            episodes_between_dataset_switch,
        } => {
            let mut rotator = DatasetRotator::new(Box::new(CsvAdapter::new(dir)))?;
            if let Some(seed) = options.seed {
                rotator = rotator.with_seed(seed);
            }
            info!(datasets = rotator.catalogue().len(), "dataset catalogue ready");
            let mut env = MultiDatasetTradingEnv::new(
                env_config,
                hooks,
                rotator,
                episodes_between_dataset_switch,
            )?;
            play(&mut env, &options, renderer.as_ref())
        }
    }
}

trait Playable {
    fn reset(&mut self, seed: Option<u64>) -> Result<(), GymError>;
    fn step(&mut self, action: usize) -> Result<StepResult, GymError>;
    fn sample_action(&mut self) -> usize;
    fn engine(&self) -> &StepEngine;
}

impl Playable for TradingEnv {
    fn reset(&mut self, seed: Option<u64>) -> Result<(), GymError> {
        TradingEnv::reset(self, seed).map(|_| ())
    }

    fn step(&mut self, action: usize) -> Result<StepResult, GymError> {
        TradingEnv::step(self, action)
    }

    fn sample_action(&mut self) -> usize {
        TradingEnv::sample_action(self)
    }

    fn engine(&self) -> &StepEngine {
        TradingEnv::engine(self)
    }
}

impl Playable for MultiDatasetTradingEnv {
    fn reset(&mut self, seed: Option<u64>) -> Result<(), GymError> {
        MultiDatasetTradingEnv::reset(self, seed).map(|_| ())
    }

    fn step(&mut self, action: usize) -> Result<StepResult, GymError> {
        MultiDatasetTradingEnv::step(self, action)
    }

    fn sample_action(&mut self) -> usize {
        MultiDatasetTradingEnv::sample_action(self)
    }

    fn engine(&self) -> &StepEngine {
        MultiDatasetTradingEnv::engine(self)
    }
}

fn play(
    env: &mut dyn Playable,
    options: &RunOptions,
    renderer: Option<&CsvRenderAdapter>,
) -> Result<Vec<EpisodeSummary>, GymError> {
    let mut summaries = Vec::with_capacity(options.episodes);
    for episode in 1..=options.episodes {
        // seed once; later episodes continue the same random stream
        let seed = if episode == 1 { options.seed } else { None };
        env.reset(seed)?;

        let last = loop {
            let action = env.sample_action();
            let result = env.step(action)?;
            if result.terminated || result.truncated {
                break result;
            }
        };

        let engine = env.engine();
        let render_path = match (renderer, engine.history()) {
            (Some(renderer), Some(history)) => {
                Some(renderer.write(engine.series(), history, engine.name())?)
            }
            _ => None,
        };
        summaries.push(EpisodeSummary {
            episode,
            dataset: engine.name().to_string(),
            steps: last.info.step,
            final_valuation: last.info.portfolio_valuation,
            terminated: last.terminated,
            metrics: engine.results().to_vec(),
            render_path,
        });
    }
    Ok(summaries)
}

fn print_summaries(summaries: &[EpisodeSummary]) {
    for s in summaries {
        let metrics = s
            .metrics
            .iter()
            .map(|m| format!("{}: {:.2}%", m.name, m.value))
            .collect::<Vec<_>>()
            .join(" | ");
        let ending = if s.terminated { "terminated" } else { "truncated" };
        println!(
            "episode {} [{}] {} after {} steps, valuation {:.2} | {}",
            s.episode, s.dataset, ending, s.steps, s.final_valuation, metrics
        );
        if let Some(path) = &s.render_path {
            println!("  render log: {}", path.display());
        }
    }
}

/// Checks the configuration, then loads every referenced series and makes
/// sure an environment can be built on it.
pub fn run_validate(config_path: &Path) -> Result<(), GymError> {
    let adapter = load_config(config_path)?;
    validate_config(&adapter)?;
    let env_config = build_env_config(&adapter)?;

    let checked = match build_data_source(&adapter)? {
        DataSource::File(path) => {
            check_series(CsvAdapter::load_path(&path)?, &env_config)?;
            1
        }
        DataSource::Directory { dir, .. } => {
            let source = CsvAdapter::new(dir);
            let ids = source.list_datasets()?;
            if ids.is_empty() {
                return Err(GymError::Data {
                    reason: "no datasets found".to_string(),
                });
            }
            for id in &ids {
                check_series(source.load_series(id)?, &env_config)?;
            }
            ids.len()
        }
    };
    println!("configuration OK ({} dataset(s))", checked);
    Ok(())
}

fn check_series(series: MarketSeries, config: &EnvConfig) -> Result<(), GymError> {
    TradingEnv::new(series, config.clone()).map(|_| ())
}
