//! Market data access port.

use crate::domain::error::GymError;
use crate::domain::series::MarketSeries;

pub trait DataPort {
    /// Loads the series registered under `id`.
    fn load_series(&self, id: &str) -> Result<MarketSeries, GymError>;

    /// Identifiers of every series this source can load, sorted.
    fn list_datasets(&self) -> Result<Vec<String>, GymError>;
}
