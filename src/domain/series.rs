//! Market series representation.
//!
//! A series is a chronologically ordered table of OHLC bars plus any number of
//! extra numeric columns. Columns whose name contains `feature` make up the
//! static observation; every other column is carried in the per-tick history
//! snapshot.

use chrono::NaiveDateTime;
use std::sync::Arc;

use super::error::GymError;

const REQUIRED_COLUMNS: [&str; 4] = ["open", "high", "low", "close"];

#[derive(Debug, Clone, PartialEq)]
struct SeriesColumn {
    name: String,
    values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarketSeries {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<SeriesColumn>,
    ohlc: [usize; 4],
    feature_idx: Vec<usize>,
    feature_names: Vec<String>,
    info_idx: Vec<usize>,
    info_names: Arc<[String]>,
}

pub fn is_feature_column(name: &str) -> bool {
    name.contains("feature")
}

impl MarketSeries {
    /// Builds a series, rejecting empty, ragged, non-finite or non-monotonic input.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self, GymError> {
        if timestamps.is_empty() {
            return Err(invalid("series has no rows"));
        }
        if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(invalid(format!(
                "timestamps not strictly increasing at row {}",
                pos + 1
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for (name, values) in &columns {
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("duplicate column {name}")));
            }
            if values.len() != timestamps.len() {
                return Err(invalid(format!(
                    "column {name} has {} rows, expected {}",
                    values.len(),
                    timestamps.len()
                )));
            }
            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(invalid(format!("column {name} is not finite at row {row}")));
            }
        }

        let mut ohlc = [0usize; 4];
        for (slot, required) in ohlc.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = columns
                .iter()
                .position(|(name, _)| name == required)
                .ok_or_else(|| invalid(format!("missing required column {required}")))?;
        }

        let (high, low) = (&columns[ohlc[1]].1, &columns[ohlc[2]].1);
        if let Some(row) = high.iter().zip(low).position(|(h, l)| h < l) {
            return Err(invalid(format!("high below low at row {row}")));
        }

        let feature_idx: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| is_feature_column(name))
            .map(|(i, _)| i)
            .collect();
        let info_idx: Vec<usize> = columns
            .iter()
            .enumerate()
            .filter(|(_, (name, _))| !is_feature_column(name))
            .map(|(i, _)| i)
            .collect();

        let feature_names = feature_idx.iter().map(|&i| columns[i].0.clone()).collect();
        let info_names: Arc<[String]> = info_idx.iter().map(|&i| columns[i].0.clone()).collect();

        Ok(MarketSeries {
            timestamps,
            columns: columns
                .into_iter()
                .map(|(name, values)| SeriesColumn { name, values })
                .collect(),
            ohlc,
            feature_idx,
            feature_names,
            info_idx,
            info_names,
        })
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn timestamp(&self, row: usize) -> NaiveDateTime {
        self.timestamps[row]
    }

    pub fn open(&self, row: usize) -> f64 {
        self.columns[self.ohlc[0]].values[row]
    }

    pub fn high(&self, row: usize) -> f64 {
        self.columns[self.ohlc[1]].values[row]
    }

    pub fn low(&self, row: usize) -> f64 {
        self.columns[self.ohlc[2]].values[row]
    }

    pub fn close(&self, row: usize) -> f64 {
        self.columns[self.ohlc[3]].values[row]
    }

    pub fn nb_features(&self) -> usize {
        self.feature_idx.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Appends the static features of `row` to `out`.
    pub fn extend_features(&self, row: usize, out: &mut Vec<f64>) {
        out.extend(self.feature_idx.iter().map(|&i| self.columns[i].values[row]));
    }

    /// Names of the non-feature columns, shared with every history snapshot.
    pub fn info_names(&self) -> &Arc<[String]> {
        &self.info_names
    }

    pub fn info_snapshot(&self, row: usize) -> Vec<f64> {
        self.info_idx
            .iter()
            .map(|&i| self.columns[i].values[row])
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Columns in their original order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.values.as_slice()))
    }

    /// Adds or replaces a column, revalidating the result.
    pub fn with_column(self, name: &str, values: Vec<f64>) -> Result<Self, GymError> {
        let mut columns: Vec<(String, Vec<f64>)> = self
            .columns
            .into_iter()
            .map(|c| (c.name, c.values))
            .collect();
        match columns.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = values,
            None => columns.push((name.to_string(), values)),
        }
        MarketSeries::new(self.timestamps, columns)
    }

    /// Drops the first `count` rows, e.g. the warm-up rows of a rolling feature.
    pub fn skip_rows(self, count: usize) -> Result<Self, GymError> {
        let timestamps = self.timestamps.into_iter().skip(count).collect();
        let columns = self
            .columns
            .into_iter()
            .map(|c| (c.name, c.values.into_iter().skip(count).collect()))
            .collect();
        MarketSeries::new(timestamps, columns)
    }
}

fn invalid(reason: impl Into<String>) -> GymError {
    GymError::SeriesInvalid {
        reason: reason.into(),
    }
}
