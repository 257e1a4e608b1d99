//! Episode history: a fixed-capacity, append-only log of per-tick records.
//!
//! Records are stored typed. Their flattened column view (`data_close`,
//! `portfolio_distribution_borrowed_fiat`, ...) is frozen from the first
//! record and used for name-based lookups and for [`EpisodeHistory::export`].

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::GymError;
use super::portfolio::PortfolioDistribution;

/// Snapshot of the non-feature columns of one series row.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoSnapshot {
    pub columns: Arc<[String]>,
    pub values: Vec<f64>,
}

impl InfoSnapshot {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .position(|c| c == name)
            .and_then(|i| self.values.get(i).copied())
    }
}

/// One simulated tick.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    /// Row of the market series.
    pub idx: usize,
    /// Tick count since reset.
    pub step: usize,
    pub date: NaiveDateTime,
    /// Action taken, as an index into the position set.
    pub position_index: usize,
    pub position: f64,
    pub real_position: f64,
    pub data: InfoSnapshot,
    pub portfolio_valuation: f64,
    pub portfolio_distribution: PortfolioDistribution,
    pub reward: f64,
}

/// A single flattened cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HistoryValue {
    Int(i64),
    Float(f64),
    Time(NaiveDateTime),
}

impl HistoryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            HistoryValue::Int(v) => Some(v as f64),
            HistoryValue::Float(v) => Some(v),
            HistoryValue::Time(_) => None,
        }
    }
}

impl fmt::Display for HistoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryValue::Int(v) => write!(f, "{v}"),
            HistoryValue::Float(v) => write!(f, "{v}"),
            HistoryValue::Time(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Idx,
    Step,
    Date,
    PositionIndex,
    Position,
    RealPosition,
    Data(usize),
    Valuation,
    Distribution(usize),
    Reward,
}

pub const REWARD_COLUMN: &str = "reward";

impl HistoryRecord {
    fn layout(data_columns: &[String]) -> Vec<(String, Column)> {
        let mut layout = vec![
            ("idx".to_string(), Column::Idx),
            ("step".to_string(), Column::Step),
            ("date".to_string(), Column::Date),
            ("position_index".to_string(), Column::PositionIndex),
            ("position".to_string(), Column::Position),
            ("real_position".to_string(), Column::RealPosition),
        ];
        layout.extend(
            data_columns
                .iter()
                .enumerate()
                .map(|(i, name)| (format!("data_{name}"), Column::Data(i))),
        );
        layout.push(("portfolio_valuation".to_string(), Column::Valuation));
        layout.extend(
            PortfolioDistribution::FIELDS
                .iter()
                .enumerate()
                .map(|(i, name)| (format!("portfolio_distribution_{name}"), Column::Distribution(i))),
        );
        layout.push((REWARD_COLUMN.to_string(), Column::Reward));
        layout
    }

    /// Flattened column names of this record.
    pub fn columns(&self) -> Vec<String> {
        Self::layout(&self.data.columns)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    fn value(&self, column: Column) -> HistoryValue {
        match column {
            Column::Idx => HistoryValue::Int(self.idx as i64),
            Column::Step => HistoryValue::Int(self.step as i64),
            Column::Date => HistoryValue::Time(self.date),
            Column::PositionIndex => HistoryValue::Int(self.position_index as i64),
            Column::Position => HistoryValue::Float(self.position),
            Column::RealPosition => HistoryValue::Float(self.real_position),
            Column::Data(i) => HistoryValue::Float(self.data.values[i]),
            Column::Valuation => HistoryValue::Float(self.portfolio_valuation),
            Column::Distribution(i) => HistoryValue::Float(self.portfolio_distribution.field(i)),
            Column::Reward => HistoryValue::Float(self.reward),
        }
    }
}

#[derive(Debug, Clone)]
struct Schema {
    names: Vec<String>,
    columns: Vec<Column>,
    lookup: HashMap<String, usize>,
    data_columns: Arc<[String]>,
}

impl Schema {
    fn of(record: &HistoryRecord) -> Self {
        let (names, columns): (Vec<String>, Vec<Column>) =
            HistoryRecord::layout(&record.data.columns).into_iter().unzip();
        let lookup = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Schema {
            names,
            columns,
            lookup,
            data_columns: Arc::clone(&record.data.columns),
        }
    }

    /// Fails when a record carries a different number of values than columns.
    fn check_shape(record: &HistoryRecord) -> Result<(), GymError> {
        let data = &record.data;
        if data.values.len() == data.columns.len() {
            return Ok(());
        }
        Err(GymError::SchemaMismatch {
            expected: data.columns.to_vec(),
            found: data.values.iter().map(|v| v.to_string()).collect(),
        })
    }

    fn matches(&self, record: &HistoryRecord) -> bool {
        Arc::ptr_eq(&self.data_columns, &record.data.columns)
            || self.data_columns[..] == record.data.columns[..]
    }

    fn column(&self, name: &str) -> Result<Column, GymError> {
        self.lookup
            .get(name)
            .map(|&i| self.columns[i])
            .ok_or_else(|| GymError::UnknownColumn {
                column: name.to_string(),
            })
    }
}

/// Flattened history handed to reporting collaborators.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryExport {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<HistoryValue>>,
}

#[derive(Debug, Clone)]
pub struct EpisodeHistory {
    capacity: usize,
    schema: Schema,
    records: Vec<HistoryRecord>,
}

impl EpisodeHistory {
    /// Creates a history of `capacity` rows whose schema is taken from `first`.
    pub fn new(capacity: usize, first: HistoryRecord) -> Result<Self, GymError> {
        if capacity == 0 {
            return Err(GymError::HistoryFull { capacity });
        }
        Schema::check_shape(&first)?;
        let schema = Schema::of(&first);
        let mut records = Vec::with_capacity(capacity);
        records.push(first);
        Ok(EpisodeHistory {
            capacity,
            schema,
            records,
        })
    }

    pub fn append(&mut self, record: HistoryRecord) -> Result<(), GymError> {
        if !self.schema.matches(&record) {
            return Err(GymError::SchemaMismatch {
                expected: self.schema.names.clone(),
                found: record.columns(),
            });
        }
        Schema::check_shape(&record)?;
        if self.records.len() == self.capacity {
            return Err(GymError::HistoryFull {
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn columns(&self) -> &[String] {
        &self.schema.names
    }

    fn resolve(&self, index: isize) -> Result<usize, GymError> {
        let len = self.records.len();
        let row = if index < 0 {
            len.checked_sub(index.unsigned_abs())
        } else {
            Some(index as usize).filter(|&row| row < len)
        };
        row.ok_or(GymError::IndexOutOfRange { index, len })
    }

    pub fn get(&self, column: &str, index: isize) -> Result<HistoryValue, GymError> {
        let column = self.schema.column(column)?;
        let row = self.resolve(index)?;
        Ok(self.records[row].value(column))
    }

    /// Numeric cell; timestamps are rejected as unknown numeric columns.
    pub fn get_f64(&self, column: &str, index: isize) -> Result<f64, GymError> {
        self.get(column, index)?
            .as_f64()
            .ok_or_else(|| GymError::UnknownColumn {
                column: column.to_string(),
            })
    }

    pub fn get_row(&self, index: isize) -> Result<&HistoryRecord, GymError> {
        let row = self.resolve(index)?;
        Ok(&self.records[row])
    }

    pub fn last(&self) -> &HistoryRecord {
        &self.records[self.records.len() - 1]
    }

    pub fn valuation(&self, index: isize) -> Result<f64, GymError> {
        Ok(self.get_row(index)?.portfolio_valuation)
    }

    /// Patches the reward of the latest row. Earlier rows are sealed.
    pub fn set(&mut self, column: &str, index: isize, value: f64) -> Result<(), GymError> {
        if column != REWARD_COLUMN {
            self.schema.column(column)?;
            return Err(GymError::ReadOnlyColumn {
                column: column.to_string(),
            });
        }
        if !value.is_finite() {
            return Err(GymError::non_finite("reward"));
        }
        let row = self.resolve(index)?;
        if row + 1 != self.records.len() {
            return Err(GymError::SealedRow { index });
        }
        self.records[row].reward = value;
        Ok(())
    }

    /// Every written value of one column.
    pub fn column(&self, name: &str) -> Result<Vec<HistoryValue>, GymError> {
        let column = self.schema.column(name)?;
        Ok(self.records.iter().map(|r| r.value(column)).collect())
    }

    pub fn records(&self) -> &[HistoryRecord] {
        &self.records
    }

    pub fn export(&self) -> HistoryExport {
        HistoryExport {
            columns: self.schema.names.clone(),
            rows: self
                .records
                .iter()
                .map(|r| self.schema.columns.iter().map(|&c| r.value(c)).collect())
                .collect(),
        }
    }
}
