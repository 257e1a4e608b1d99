//! Least-used-first dataset rotation for multi-series training.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::fmt;
use tracing::debug;

use super::error::GymError;
use super::series::MarketSeries;
use crate::ports::data_port::DataPort;

/// Keeps the rotation stream apart from an engine seeded with the same value.
const SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Transform applied to every series after loading.
pub type Preprocess = Box<dyn Fn(MarketSeries) -> Result<MarketSeries, GymError>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub id: String,
    pub uses: usize,
}

pub struct DatasetRotator {
    catalogue: Vec<DatasetEntry>,
    source: Box<dyn DataPort>,
    preprocess: Option<Preprocess>,
    rng: StdRng,
}

impl DatasetRotator {
    /// Builds the catalogue from every dataset the source lists.
    pub fn new(source: Box<dyn DataPort>) -> Result<Self, GymError> {
        let catalogue: Vec<DatasetEntry> = source
            .list_datasets()?
            .into_iter()
            .map(|id| DatasetEntry { id, uses: 0 })
            .collect();
        if catalogue.is_empty() {
            return Err(GymError::Data {
                reason: "no datasets found".to_string(),
            });
        }
        Ok(DatasetRotator {
            catalogue,
            source,
            preprocess: None,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_preprocess<F>(mut self, preprocess: F) -> Self
    where
        F: Fn(MarketSeries) -> Result<MarketSeries, GymError> + 'static,
    {
        self.preprocess = Some(Box::new(preprocess));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed ^ SEED_SALT);
    }

    pub fn catalogue(&self) -> &[DatasetEntry] {
        &self.catalogue
    }

    /// Picks uniformly among the least-used datasets and loads it.
    pub fn pick_next(&mut self) -> Result<(String, MarketSeries), GymError> {
        let fewest = self
            .catalogue
            .iter()
            .map(|e| e.uses)
            .min()
            .unwrap_or_default();
        let candidates: Vec<usize> = self
            .catalogue
            .iter()
            .enumerate()
            .filter(|(_, e)| e.uses == fewest)
            .map(|(i, _)| i)
            .collect();
        let &chosen = candidates.choose(&mut self.rng).ok_or_else(|| GymError::Data {
            reason: "dataset catalogue is empty".to_string(),
        })?;

        let id = self.catalogue[chosen].id.clone();
        let series = self.source.load_series(&id)?;
        let series = match &self.preprocess {
            Some(preprocess) => preprocess(series)?,
            None => series,
        };

        let entry = &mut self.catalogue[chosen];
        entry.uses += 1;
        debug!(dataset = %id, uses = entry.uses, "dataset selected");
        Ok((id, series))
    }
}

impl fmt::Debug for DatasetRotator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetRotator")
            .field("catalogue", &self.catalogue)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rand::Rng;

    struct FlatSource {
        ids: Vec<String>,
    }

    impl FlatSource {
        fn boxed(n: usize) -> Box<dyn DataPort> {
            Box::new(FlatSource {
                ids: (0..n).map(|i| format!("set_{i}")).collect(),
            })
        }
    }

    impl DataPort for FlatSource {
        fn load_series(&self, id: &str) -> Result<MarketSeries, GymError> {
            if !self.ids.iter().any(|known| known == id) {
                return Err(GymError::Data {
                    reason: format!("unknown dataset {id}"),
                });
            }
            let start = NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            MarketSeries::new(
                vec![start, start + chrono::Duration::days(1)],
                ["open", "high", "low", "close"]
                    .iter()
                    .map(|c| (c.to_string(), vec![100.0, 100.0]))
                    .collect(),
            )
        }

        fn list_datasets(&self) -> Result<Vec<String>, GymError> {
            Ok(self.ids.clone())
        }
    }

    #[test]
    fn empty_source_is_rejected() {
        assert!(matches!(
            DatasetRotator::new(FlatSource::boxed(0)),
            Err(GymError::Data { .. })
        ));
    }

    #[test]
    fn every_dataset_used_before_any_repeat() {
        let mut rotator = DatasetRotator::new(FlatSource::boxed(4)).unwrap().with_seed(3);
        let mut seen: Vec<String> = (0..4).map(|_| rotator.pick_next().unwrap().0).collect();
        seen.sort();
        assert_eq!(seen, vec!["set_0", "set_1", "set_2", "set_3"]);
    }

    #[test]
    fn preprocess_is_applied() {
        let mut rotator = DatasetRotator::new(FlatSource::boxed(1))
            .unwrap()
            .with_preprocess(|s| {
                let n = s.len();
                s.with_column("feature_one", vec![1.0; n])
            });
        let (_, series) = rotator.pick_next().unwrap();
        assert_eq!(series.nb_features(), 1);
    }

    #[test]
    fn failing_preprocess_propagates() {
        let mut rotator = DatasetRotator::new(FlatSource::boxed(2))
            .unwrap()
            .with_preprocess(|_| Err(GymError::non_finite("preprocess")));
        assert!(rotator.pick_next().is_err());
    }

    #[test]
    fn failed_load_is_not_counted() {
        struct HalfBroken;

        impl DataPort for HalfBroken {
            fn load_series(&self, id: &str) -> Result<MarketSeries, GymError> {
                match id {
                    "good" => FlatSource { ids: vec!["good".into()] }.load_series(id),
                    _ => Err(GymError::Data {
                        reason: format!("corrupt dataset {id}"),
                    }),
                }
            }

            fn list_datasets(&self) -> Result<Vec<String>, GymError> {
                Ok(vec!["bad".into(), "good".into()])
            }
        }

        let mut rotator = DatasetRotator::new(Box::new(HalfBroken)).unwrap().with_seed(11);
        let mut loaded = 0;
        let mut failed = false;
        for _ in 0..2 {
            match rotator.pick_next() {
                Ok(_) => loaded += 1,
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }
        assert!(failed);
        let uses: Vec<usize> = rotator.catalogue().iter().map(|e| e.uses).collect();
        assert_eq!(uses[0], 0);
        assert_eq!(uses.iter().sum::<usize>(), loaded);
    }

    #[test]
    fn rotation_stream_differs_from_plain_seed() {
        let mut rotator = DatasetRotator::new(FlatSource::boxed(2)).unwrap().with_seed(42);
        let mut plain = StdRng::seed_from_u64(42);
        let a: [u64; 4] = std::array::from_fn(|_| rotator.rng.r#gen());
        let b: [u64; 4] = std::array::from_fn(|_| plain.r#gen());
        assert_ne!(a, b);

        rotator.reseed(42);
        let again: [u64; 4] = std::array::from_fn(|_| rotator.rng.r#gen());
        assert_eq!(a, again);
    }

    proptest! {
        #[test]
        fn usage_counts_stay_balanced(n in 1usize..8, picks in 0usize..40, seed in any::<u64>()) {
            let mut rotator = DatasetRotator::new(FlatSource::boxed(n)).unwrap().with_seed(seed);
            for _ in 0..picks {
                rotator.pick_next().unwrap();
            }
            let uses: Vec<usize> = rotator.catalogue().iter().map(|e| e.uses).collect();
            let max = *uses.iter().max().unwrap();
            let min = *uses.iter().min().unwrap();
            prop_assert!(max - min <= 1);
            prop_assert_eq!(uses.iter().sum::<usize>(), picks);
        }
    }
}
