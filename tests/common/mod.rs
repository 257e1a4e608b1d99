#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tradegym::domain::error::GymError;
use tradegym::domain::series::MarketSeries;
use tradegym::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, MarketSeries>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, id: &str, series: MarketSeries) -> Self {
        self.data.insert(id.to_string(), series);
        self
    }

    pub fn with_error(mut self, id: &str, reason: &str) -> Self {
        self.errors.insert(id.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_series(&self, id: &str) -> Result<MarketSeries, GymError> {
        if let Some(reason) = self.errors.get(id) {
            return Err(GymError::Data {
                reason: reason.clone(),
            });
        }
        self.data.get(id).cloned().ok_or_else(|| GymError::Data {
            reason: format!("unknown dataset {id}"),
        })
    }

    fn list_datasets(&self) -> Result<Vec<String>, GymError> {
        let mut ids: Vec<String> = self.data.keys().chain(self.errors.keys()).cloned().collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

pub fn hour(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::hours(i as i64)
}

/// Flat bars (open = high = low = close) with one `feature_close` column.
pub fn make_series(closes: &[f64]) -> MarketSeries {
    make_series_with_range(closes, 0.0)
}

/// Bars whose high and low sit `spread` (a fraction of close) around close.
pub fn make_series_with_range(closes: &[f64], spread: f64) -> MarketSeries {
    let n = closes.len();
    MarketSeries::new(
        (0..n).map(hour).collect(),
        vec![
            ("open".into(), closes.to_vec()),
            ("high".into(), closes.iter().map(|c| c * (1.0 + spread)).collect()),
            ("low".into(), closes.iter().map(|c| c * (1.0 - spread)).collect()),
            ("close".into(), closes.to_vec()),
            ("volume".into(), vec![1000.0; n]),
            (
                "feature_close".into(),
                closes.iter().map(|c| c / closes[0] - 1.0).collect(),
            ),
        ],
    )
    .unwrap()
}

pub fn csv_text(closes: &[f64]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for (i, c) in closes.iter().enumerate() {
        out.push_str(&format!(
            "{},{c},{},{},{c},1000\n",
            hour(i).format("%Y-%m-%d %H:%M:%S"),
            c * 1.01,
            c * 0.99
        ));
    }
    out
}
