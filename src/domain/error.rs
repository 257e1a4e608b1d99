//! Domain error types.

/// Top-level error type for tradegym.
#[derive(Debug, thiserror::Error)]
pub enum GymError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid market series: {reason}")]
    SeriesInvalid { reason: String },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("history schema mismatch: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("history index {index} out of range for {len} written rows")]
    IndexOutOfRange { index: isize, len: usize },

    #[error("unknown history column: {column}")]
    UnknownColumn { column: String },

    #[error("history column {column} is read-only")]
    ReadOnlyColumn { column: String },

    #[error("history row {index} is sealed, only the latest row is writable")]
    SealedRow { index: isize },

    #[error("history is full ({capacity} rows)")]
    HistoryFull { capacity: usize },

    #[error("non-finite result computing {context}")]
    NonFinite { context: String },

    #[error("action index {index} out of range for {count} positions")]
    InvalidAction { index: usize, count: usize },

    #[error("environment must be reset before stepping")]
    NotReset,

    #[error("episode is over, call reset")]
    EpisodeOver,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl GymError {
    pub(crate) fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        GymError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn non_finite(context: impl Into<String>) -> Self {
        GymError::NonFinite {
            context: context.into(),
        }
    }
}

/// Divides, failing instead of producing NaN or infinity.
pub fn checked_div(numerator: f64, denominator: f64, context: &str) -> Result<f64, GymError> {
    let value = numerator / denominator;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GymError::non_finite(context))
    }
}

impl GymError {
    /// Process exit status for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            GymError::Io(_) => 1,
            GymError::ConfigParse { .. }
            | GymError::ConfigMissing { .. }
            | GymError::ConfigInvalid { .. } => 2,
            GymError::SeriesInvalid { .. } | GymError::Data { .. } => 3,
            GymError::SchemaMismatch { .. }
            | GymError::IndexOutOfRange { .. }
            | GymError::UnknownColumn { .. }
            | GymError::ReadOnlyColumn { .. }
            | GymError::SealedRow { .. }
            | GymError::HistoryFull { .. }
            | GymError::NonFinite { .. }
            | GymError::InvalidAction { .. }
            | GymError::NotReset
            | GymError::EpisodeOver => 4,
        }
    }
}

impl From<&GymError> for std::process::ExitCode {
    fn from(err: &GymError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_div_passes_finite() {
        assert_eq!(checked_div(10.0, 4.0, "ratio").unwrap(), 2.5);
    }

    #[test]
    fn checked_div_rejects_zero_denominator() {
        let err = checked_div(1.0, 0.0, "position").unwrap_err();
        assert!(matches!(err, GymError::NonFinite { ref context } if context == "position"));
    }

    #[test]
    fn checked_div_rejects_nan() {
        assert!(checked_div(0.0, 0.0, "nan").is_err());
    }

    #[test]
    fn display_includes_section_and_key() {
        let err = GymError::config_invalid("env", "trading_fees", "must be below 1");
        assert_eq!(
            err.to_string(),
            "invalid config value [env] trading_fees: must be below 1"
        );
    }

    #[test]
    fn exit_codes_follow_category() {
        assert_eq!(GymError::Io(std::io::Error::other("disk")).exit_code(), 1);
        assert_eq!(
            GymError::ConfigMissing {
                section: "data".into(),
                key: "path".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(GymError::Data { reason: "x".into() }.exit_code(), 3);
        assert_eq!(GymError::NotReset.exit_code(), 4);
    }
}
