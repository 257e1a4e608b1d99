//! CSV file data adapter.
//!
//! Each `<id>.csv` under the base directory is one dataset. The first column
//! holds the timestamp; every other column must be numeric.

use crate::domain::error::GymError;
use crate::domain::series::MarketSeries;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, id: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", id))
    }

    /// Reads one CSV file into a validated series, sorted by date.
    pub fn load_path(path: &Path) -> Result<MarketSeries, GymError> {
        let content = fs::read_to_string(path).map_err(|e| GymError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| GymError::Data {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();
        if names.is_empty() {
            return Err(GymError::Data {
                reason: format!("{} has no value columns", path.display()),
            });
        }

        let mut rows: Vec<(NaiveDateTime, Vec<f64>)> = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| GymError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(0).ok_or_else(|| GymError::Data {
                reason: "missing date column".into(),
            })?;
            let date = parse_timestamp(date_str.trim()).ok_or_else(|| GymError::Data {
                reason: format!("invalid date '{}' on row {}", date_str, line + 1),
            })?;

            let mut values = Vec::with_capacity(names.len());
            for (i, name) in names.iter().enumerate() {
                let value: f64 = record
                    .get(i + 1)
                    .ok_or_else(|| GymError::Data {
                        reason: format!("missing {} column on row {}", name, line + 1),
                    })?
                    .trim()
                    .parse()
                    .map_err(|e| GymError::Data {
                        reason: format!("invalid {} value on row {}: {}", name, line + 1, e),
                    })?;
                values.push(value);
            }
            rows.push((date, values));
        }

        if rows.windows(2).any(|w| w[1].0 < w[0].0) {
            warn!(path = %path.display(), "rows out of date order, sorting");
            rows.sort_by_key(|(date, _)| *date);
        }

        let timestamps = rows.iter().map(|(date, _)| *date).collect();
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name, rows.iter().map(|(_, values)| values[i]).collect()))
            .collect();
        MarketSeries::new(timestamps, columns)
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

impl DataPort for CsvAdapter {
    fn load_series(&self, id: &str) -> Result<MarketSeries, GymError> {
        Self::load_path(&self.csv_path(id))
    }

    fn list_datasets(&self) -> Result<Vec<String>, GymError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| GymError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| GymError::Data {
                reason: format!("directory entry error: {}", e),
            })?;

            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    ids.push(stem.to_string_lossy().into_owned());
                }
            }
        }

        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume,feature_close\n\
            2024-01-15 10:00:00,105.0,115.0,100.0,110.0,60000,0.1\n\
            2024-01-15 09:00:00,100.0,110.0,90.0,105.0,50000,0.0\n\
            2024-01-15 11:00:00,110.0,120.0,105.0,115.0,55000,0.2\n";

        fs::write(path.join("BTCUSD.csv"), csv_content).unwrap();
        fs::write(
            path.join("ETHUSD.csv"),
            "date,open,high,low,close\n2024-01-15,1,1,1,1\n2024-01-16,1,1,1,1\n",
        )
        .unwrap();
        fs::write(path.join("notes.txt"), "not a dataset").unwrap();

        (dir, path)
    }

    #[test]
    fn load_series_sorts_rows_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.load_series("BTCUSD").unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.close(0), 105.0);
        assert_eq!(series.close(2), 115.0);
        assert_eq!(series.high(1), 115.0);
        assert_eq!(series.feature_names(), &["feature_close".to_string()]);
        assert_eq!(series.column("volume").unwrap(), &[50000.0, 60000.0, 55000.0]);
    }

    #[test]
    fn duplicate_timestamps_are_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("DUP.csv");
        fs::write(
            &path,
            "date,open,high,low,close\n\
             2024-01-15 10:00:00,1,1,1,1\n\
             2024-01-15 09:00:00,1,1,1,1\n\
             2024-01-15 10:00:00,2,2,2,2\n",
        )
        .unwrap();

        let err = CsvAdapter::load_path(&path).unwrap_err();
        assert!(matches!(err, GymError::SeriesInvalid { .. }));
    }

    #[test]
    fn date_only_rows_start_at_midnight() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let series = adapter.load_series("ETHUSD").unwrap();
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(series.timestamp(0), expected);
    }

    #[test]
    fn iso_timestamps_parse() {
        let parsed = parse_timestamp("2024-03-01T12:30:00").unwrap();
        assert_eq!(parsed.format("%H:%M").to_string(), "12:30");
        assert!(parse_timestamp("01/03/2024").is_none());
    }

    #[test]
    fn load_series_fails_for_missing_file() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert!(matches!(
            adapter.load_series("XYZ"),
            Err(GymError::Data { .. })
        ));
    }

    #[test]
    fn non_numeric_value_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.csv");
        fs::write(&file, "date,open,high,low,close\n2024-01-15,1,1,1,abc\n").unwrap();
        let err = CsvAdapter::load_path(&file).unwrap_err();
        assert!(err.to_string().contains("close"));
    }

    #[test]
    fn missing_close_column_is_invalid_series() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("bad.csv");
        fs::write(&file, "date,open,high,low\n2024-01-15,1,1,1\n").unwrap();
        assert!(matches!(
            CsvAdapter::load_path(&file),
            Err(GymError::SeriesInvalid { .. })
        ));
    }

    #[test]
    fn list_datasets_returns_sorted_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);
        assert_eq!(adapter.list_datasets().unwrap(), vec!["BTCUSD", "ETHUSD"]);
    }
}
