//! The imputation output: one row per spatial unit, one column per realization.

use ndarray::{Array2, ArrayView1};

/// Ensemble of conditional realizations, on the original (non-log) scale.
///
/// Rows follow the input frame order exactly; column k is the k-th
/// realization. The kriging point estimate and variance computed alongside
/// the realizations are kept for convenience.
#[derive(Debug, Clone)]
pub struct SimulationEnsemble {
    realizations: Array2<f64>,
    kriging_mean: Vec<f64>,
    kriging_variance: Vec<f64>,
}

impl SimulationEnsemble {
    pub(crate) fn new(
        realizations: Array2<f64>,
        kriging_mean: Vec<f64>,
        kriging_variance: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(realizations.nrows(), kriging_mean.len());
        debug_assert_eq!(realizations.nrows(), kriging_variance.len());
        Self {
            realizations,
            kriging_mean,
            kriging_variance,
        }
    }

    /// Number of spatial units (rows).
    pub fn n_units(&self) -> usize {
        self.realizations.nrows()
    }

    /// Number of realizations (columns).
    pub fn iterations(&self) -> usize {
        self.realizations.ncols()
    }

    /// Value of realization `k` at unit `unit`, if in bounds.
    pub fn get(&self, unit: usize, k: usize) -> Option<f64> {
        self.realizations.get((unit, k)).copied()
    }

    /// All realized values for one unit, in realization order.
    pub fn unit(&self, unit: usize) -> ArrayView1<'_, f64> {
        self.realizations.row(unit)
    }

    /// One full realization over all units, in frame order.
    pub fn realization(&self, k: usize) -> ArrayView1<'_, f64> {
        self.realizations.column(k)
    }

    /// Ensemble mean for one unit.
    pub fn unit_mean(&self, unit: usize) -> f64 {
        let row = self.realizations.row(unit);
        row.sum() / row.len() as f64
    }

    /// Kriging point estimate per unit (conditional mean, original scale).
    pub fn kriging_mean(&self) -> &[f64] {
        &self.kriging_mean
    }

    /// Kriging variance per unit, on the transformed (log) scale. Zero at
    /// observed units.
    pub fn kriging_variance(&self) -> &[f64] {
        &self.kriging_variance
    }

    /// The full unit × realization matrix.
    pub fn realizations(&self) -> &Array2<f64> {
        &self.realizations
    }

    /// Consume the ensemble, returning the realization matrix.
    pub fn into_array(self) -> Array2<f64> {
        self.realizations
    }
}
