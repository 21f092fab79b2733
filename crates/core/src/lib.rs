//! # geokrig-core
//!
//! Core types for the geokrig imputation library.
//!
//! This crate provides:
//! - `GeoFrame` / `Feature`: ordered spatial units with geometry and attributes
//! - `AttributeValue`: typed attribute storage with explicit missingness
//! - `Error` / `DataError`: the error taxonomy shared across the workspace

pub mod error;
pub mod frame;

pub use error::{DataError, Error, Result};
pub use frame::{AttributeValue, Feature, GeoFrame};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{DataError, Error, Result};
    pub use crate::frame::{AttributeValue, Feature, GeoFrame};
}
