//! Port for persisting finished episodes for later rendering.

use std::path::PathBuf;

use crate::domain::error::GymError;
use crate::domain::history::EpisodeHistory;
use crate::domain::series::MarketSeries;

pub trait RenderPort {
    /// Writes the episode joined onto its market series, returning the file written.
    fn write(
        &self,
        series: &MarketSeries,
        history: &EpisodeHistory,
        name: &str,
    ) -> Result<PathBuf, GymError>;
}
