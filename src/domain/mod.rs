//! Core domain types and logic.

pub mod error;
pub mod series;
pub mod portfolio;
pub mod execution;
pub mod history;
pub mod reward;
pub mod features;
pub mod metrics;
pub mod env_config;
pub mod config_validation;
pub mod engine;
pub mod environment;
pub mod rotation;
