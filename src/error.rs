//! Error types for sales feature extraction and per-entity modelling

use crate::preprocessing::TransformError;
use thiserror::Error;

/// Result type alias for forecast operations
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum ForecastError {
    /// A file's field count matches neither the test nor the train schema.
    #[error("Schema error in {file}: expected {expected} fields, got {actual}")]
    SchemaError {
        file: String,
        expected: String,
        actual: usize,
    },

    /// A raw value broke the column's data contract (e.g. a non-boolean holiday flag).
    #[error("Value error in {file}, column '{column}': {source}")]
    ValueError {
        file: String,
        column: String,
        #[source]
        source: TransformError,
    },

    #[error("Insufficient data for {key}: need at least {required} rows, got {actual}")]
    DataInsufficient {
        key: String,
        required: usize,
        actual: usize,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<polars::error::PolarsError> for ForecastError {
    fn from(err: polars::error::PolarsError) -> Self {
        ForecastError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<bincode::Error> for ForecastError {
    fn from(err: bincode::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ForecastError {
    fn from(err: ndarray::ShapeError) -> Self {
        ForecastError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ForecastError::DataError("test error".to_string());
        assert_eq!(err.to_string(), "Data error: test error");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ForecastError = io_err.into();
        assert!(matches!(err, ForecastError::IoError(_)));
    }

    #[test]
    fn test_value_error_carries_row_context() {
        let err = ForecastError::ValueError {
            file: "1-1".to_string(),
            column: "is_holiday".to_string(),
            source: TransformError::new(3, "yes", "must be TRUE or FALSE"),
        };
        let msg = err.to_string();
        assert!(msg.contains("1-1"));
        assert!(msg.contains("is_holiday"));
        assert!(msg.contains("row 3"));
    }

    #[test]
    fn test_insufficient_data_display() {
        let err = ForecastError::DataInsufficient {
            key: "store 1 / dept 2".to_string(),
            required: 2,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data for store 1 / dept 2: need at least 2 rows, got 1"
        );
    }
}
