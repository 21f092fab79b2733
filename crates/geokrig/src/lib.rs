//! # geokrig
//!
//! External-drift kriging imputation with conditional simulation for areal
//! data. Given an ordered frame of polygon units, a partially-missing target
//! column, and one or two fully-observed drift covariates, [`impute`]
//! returns an ensemble of stochastic realizations of the target over every
//! unit — observed values reproduced exactly, missing ones drawn from the
//! fitted spatial model.
//!
//! ## Pipeline
//!
//! - **transform**: shifted log transform stabilizing rate-like targets
//! - **variogram**: empirical variogram (Matheron / Cressie) and parametric
//!   model fitting (spherical, exponential, Gaussian, Matérn)
//! - **kriging**: external-drift kriging on a global neighborhood
//! - **simulation**: conditional random fields via the residual construction
//! - **impute**: the orchestrator wiring the above together
//!
//! ```no_run
//! use geokrig::{impute, ImputeParams};
//! use geokrig_core::GeoFrame;
//!
//! # fn run(counties: GeoFrame) -> geokrig_core::Result<()> {
//! let ensemble = impute(
//!     &counties,
//!     "abortion_rate",
//!     "distance_to_clinic",
//!     Some("poverty_rate"),
//!     &ImputeParams { iterations: 100, ..Default::default() },
//! )?;
//! assert_eq!(ensemble.n_units(), counties.len());
//! # Ok(())
//! # }
//! ```

pub mod ensemble;
pub mod impute;
pub mod kriging;
pub mod simulation;
pub mod transform;
pub mod variogram;

pub use ensemble::SimulationEnsemble;
pub use impute::{DEFAULT_SEED, ImputeParams, impute};
pub use kriging::{DriftKriging, Weights};
pub use simulation::{ConditionalSimulator, cholesky};
pub use transform::LogShift;
pub use variogram::{
    EmpiricalVariogram, Estimator, FitOptions, FittedVariogram, MaternSmoothness, ModelSelection,
    VariogramModel, VariogramParams, empirical_variogram, fit_best_variogram, fit_variogram,
};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::SamplePoint;
    pub use crate::ensemble::SimulationEnsemble;
    pub use crate::impute::{ImputeParams, impute};
    pub use crate::variogram::{
        Estimator, MaternSmoothness, ModelSelection, VariogramModel, VariogramParams,
    };
    pub use geokrig_core::prelude::*;
}

/// A sample point with x, y coordinates and a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

impl SamplePoint {
    pub fn new(x: f64, y: f64, value: f64) -> Self {
        Self { x, y, value }
    }

    /// Squared Euclidean distance to another point
    #[inline]
    pub fn dist_sq(&self, other_x: f64, other_y: f64) -> f64 {
        let dx = self.x - other_x;
        let dy = self.y - other_y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    #[inline]
    pub fn dist(&self, other_x: f64, other_y: f64) -> f64 {
        self.dist_sq(other_x, other_y).sqrt()
    }
}
