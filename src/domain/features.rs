//! Dynamic observation features recomputed from the running history.

use std::fmt;

use super::error::GymError;
use super::history::EpisodeHistory;

type FeatureFn = Box<dyn Fn(&EpisodeHistory) -> Result<f64, GymError>>;

pub struct DynamicFeature {
    name: String,
    func: FeatureFn,
}

impl DynamicFeature {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&EpisodeHistory) -> Result<f64, GymError> + 'static,
    {
        DynamicFeature {
            name: name.into(),
            func: Box::new(func),
        }
    }

    /// Exposure chosen on the latest tick.
    pub fn last_position() -> Self {
        DynamicFeature::new("dynamic_feature_last_position", |h| h.get_f64("position", -1))
    }

    /// Interest-adjusted exposure on the latest tick.
    pub fn real_position() -> Self {
        DynamicFeature::new("dynamic_feature_real_position", |h| {
            h.get_f64("real_position", -1)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn compute(&self, history: &EpisodeHistory) -> Result<f64, GymError> {
        let value = (self.func)(history)?;
        if !value.is_finite() {
            return Err(GymError::non_finite(format!("dynamic feature {}", self.name)));
        }
        Ok(value)
    }
}

impl fmt::Debug for DynamicFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicFeature")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub fn default_dynamic_features() -> Vec<DynamicFeature> {
    vec![DynamicFeature::last_position(), DynamicFeature::real_position()]
}
