//! Render log writer: one CSV per finished episode.
//!
//! The episode history is inner-joined onto its market series by timestamp so
//! a chart tool can replay prices, positions and valuations together.

use crate::domain::error::GymError;
use crate::domain::history::EpisodeHistory;
use crate::domain::series::MarketSeries;
use crate::ports::render_port::RenderPort;
use chrono::{Local, NaiveDateTime};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

pub struct CsvRenderAdapter {
    dir: PathBuf,
}

impl CsvRenderAdapter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl RenderPort for CsvRenderAdapter {
    fn write(
        &self,
        series: &MarketSeries,
        history: &EpisodeHistory,
        name: &str,
    ) -> Result<PathBuf, GymError> {
        fs::create_dir_all(&self.dir)?;
        let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let mut path = self.dir.join(format!("{}_{}.csv", name, stamp));
        let mut n = 1;
        while path.exists() {
            path = self.dir.join(format!("{}_{}_{}.csv", name, stamp, n));
            n += 1;
        }

        let export = history.export();
        // series columns already carry every data_* value
        let kept: Vec<usize> = export
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.as_str() != "date" && !c.starts_with("data_"))
            .map(|(i, _)| i)
            .collect();

        let rows_by_date: HashMap<NaiveDateTime, usize> = series
            .timestamps()
            .iter()
            .enumerate()
            .map(|(row, ts)| (*ts, row))
            .collect();
        let series_columns: Vec<(&str, &[f64])> = series.columns().collect();

        let mut writer = csv::Writer::from_path(&path).map_err(std::io::Error::from)?;
        let mut header = vec!["date".to_string()];
        header.extend(series_columns.iter().map(|(name, _)| name.to_string()));
        header.extend(kept.iter().map(|&i| export.columns[i].clone()));
        writer.write_record(&header).map_err(std::io::Error::from)?;

        for (record, values) in history.records().iter().zip(&export.rows) {
            let Some(&row) = rows_by_date.get(&record.date) else {
                continue;
            };
            let mut line = vec![series.timestamp(row).format("%Y-%m-%d %H:%M:%S").to_string()];
            line.extend(series_columns.iter().map(|(_, col)| col[row].to_string()));
            line.extend(kept.iter().map(|&i| values[i].to_string()));
            writer.write_record(&line).map_err(std::io::Error::from)?;
        }
        writer.flush()?;
        Ok(path)
    }
}
