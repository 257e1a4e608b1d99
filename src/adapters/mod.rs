//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod csv_render_adapter;
pub mod file_config_adapter;
