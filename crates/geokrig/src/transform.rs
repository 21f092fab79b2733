//! Reversible value transforms applied before variogram fitting.
//!
//! Rate-like variables are strongly right-skewed; kriging on the log scale
//! stabilizes the variance. The transform is a value object so the
//! orchestration (and its conditioning tests) stay independent of the
//! particular choice.

use geokrig_core::{DataError, Result};

/// The shifted log transform: forward `ln(1 + v)`, inverse `exp(v) - 1`.
///
/// Defined for `v >= 0`; negative inputs are a data error because the
/// target is a rate and `ln` of a value below -1 is undefined.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogShift;

impl LogShift {
    /// Transform one value to the log scale.
    ///
    /// `column` and `row` identify the source cell for error context.
    pub fn forward(&self, value: f64, column: &str, row: usize) -> Result<f64> {
        if value < 0.0 {
            return Err(DataError::NegativeValue {
                column: column.into(),
                row,
                value,
            }
            .into());
        }
        Ok(value.ln_1p())
    }

    /// Map a transformed value back to the original scale.
    pub fn inverse(&self, value: f64) -> f64 {
        value.exp_m1()
    }
}
