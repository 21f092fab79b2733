//! Error types for geokrig

use thiserror::Error;

/// Caller-supplied data violates a precondition of the imputation.
///
/// These are diagnosed before any numerical work starts; they always carry
/// the offending column name and, where it exists, the row index.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DataError {
    #[error("column '{name}' not found in frame")]
    MissingColumn { name: String },

    #[error("column '{name}' is not numeric at row {row}")]
    NotNumeric { name: String, row: usize },

    #[error("frame contains no spatial units")]
    EmptyFrame,

    #[error("column '{column}' is entirely missing ({rows} rows): nothing to fit against")]
    AllMissing { column: String, rows: usize },

    #[error("column '{column}' has no missing values ({rows} rows): nothing to impute")]
    NothingToImpute { column: String, rows: usize },

    #[error("drift column '{column}' is missing a value at row {row}: drift must be populated at every unit")]
    MissingDrift { column: String, row: usize },

    #[error("column '{column}' has negative value {value} at row {row}: log transform undefined")]
    NegativeValue {
        column: String,
        row: usize,
        value: f64,
    },

    #[error("unit at row {row} has no geometry or an undefined centroid")]
    MissingGeometry { row: usize },

    #[error("only {observed} observed units, kriging with {drifts} drift variable(s) needs at least {needed}")]
    TooFewObserved {
        observed: usize,
        drifts: usize,
        needed: usize,
    },
}

/// Main error type for geokrig operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("variogram fit failed: {0}")]
    Fit(String),

    #[error("conditional simulation failed: {0}")]
    Simulation(String),

    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Result type alias for geokrig operations
pub type Result<T> = std::result::Result<T, Error>;
