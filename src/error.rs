use thiserror::Error;

/// Everything that can stop a risk computation.
///
/// Degenerate statistics are deliberately absent: a zero-variance or
/// non-positive series falls back to a flagged sentinel fit instead of
/// failing (see `GammaFit::degenerate`).
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("no row has a parseable date")]
    NoValidDates,

    #[error("invalid value on line {line}: {detail}")]
    InvalidValue { line: u64, detail: String },

    /// First offending element plus the total number of offenders.
    #[error(
        "quasi-random value {value} at index {index} is outside [0, 1] ({count} value(s) out of range)"
    )]
    QuasiRandomOutOfRange { index: usize, value: f64, count: usize },

    #[error("{what} requires at least {needed} value(s), got {got}")]
    InsufficientData { what: &'static str, needed: usize, got: usize },

    #[error("length mismatch: {years} years vs {values} values")]
    LengthMismatch { years: usize, values: usize },

    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("gamma distribution: {0}")]
    Gamma(#[from] statrs::distribution::GammaError),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RiskError>;

impl RiskError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        RiskError::InvalidParameter { name, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_message_names_offender_and_count() {
        let err = RiskError::QuasiRandomOutOfRange { index: 3, value: 1.5, count: 2 };
        let msg = err.to_string();
        assert!(msg.contains("1.5"), "{msg}");
        assert!(msg.contains("index 3"), "{msg}");
        assert!(msg.contains("2 value(s)"), "{msg}");
    }

    #[test]
    fn invalid_parameter_message() {
        let err = RiskError::invalid("bandwidth", "must be > 0");
        assert_eq!(err.to_string(), "invalid parameter 'bandwidth': must be > 0");
    }
}
