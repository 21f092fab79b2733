//! External-drift kriging (EDK)
//!
//! Extends Ordinary Kriging by incorporating auxiliary covariates (the
//! "external drift") into the kriging system. The drift basis at a location
//! x is {1, d₁(x)} or {1, d₁(x), d₂(x)} — a constant plus the covariate
//! values, instead of coordinate monomials.
//!
//! The EDK system for n conditioning points with p drift functions:
//! ```text
//! [γ(xᵢ,xⱼ) | fₖ(xᵢ)] [wᵢ]   [γ(xᵢ,x₀)]
//! [-----------+--------] [  ] = [----------]
//! [fₖ(xᵢ)ᵀ  |    0   ] [μₖ]   [fₖ(x₀)   ]
//! ```
//! The constant drift row enforces Σwᵢ = 1 (unbiasedness); the covariate
//! rows make the predictor exact for any field linear in the drift.
//!
//! The solved weight vector is exposed so that conditional simulation can
//! apply the same weights to a simulated field (see [`crate::simulation`]).
//!
//! Reference:
//! Matheron, G. (1969). Le Krigeage Universel. Cahiers du CMMM.
//! Hengl, T. et al. (2007). About regression-kriging. Computers & Geosciences.

use geokrig_core::{DataError, Error, Result};

use crate::SamplePoint;
use crate::variogram::FittedVariogram;

/// Distance below which a prediction location is treated as coincident with
/// a conditioning point and snapped to it.
const SNAP_DISTANCE: f64 = 1e-12;

/// Solved kriging weights for one prediction location.
#[derive(Debug, Clone)]
pub struct Weights {
    /// One weight per conditioning point; Σwᵢ = 1.
    pub weights: Vec<f64>,
    /// Lagrange multipliers: constant term first, then one per covariate.
    pub multipliers: Vec<f64>,
    /// Index of the conditioning point this location snapped to, if any.
    pub snapped_to: Option<usize>,
}

impl Weights {
    /// Weighted combination of per-conditioning-point values.
    ///
    /// With the conditioning values this is the kriging estimate; with a
    /// simulated field sampled at the conditioning points it is the kriged
    /// surface of that field, as used by conditional simulation.
    pub fn apply(&self, values: &[f64]) -> f64 {
        debug_assert_eq!(values.len(), self.weights.len());
        self.weights
            .iter()
            .zip(values)
            .map(|(w, v)| w * v)
            .sum()
    }
}

/// External-drift kriging predictor.
///
/// Holds the conditioning points (coordinates and values on the transformed
/// scale), their drift covariates, and the fitted covariance model. Uses a
/// global neighborhood: every conditioning point enters every system, which
/// suits the modest unit counts of areal datasets.
#[derive(Debug, Clone)]
pub struct DriftKriging {
    points: Vec<SamplePoint>,
    drift: Vec<Vec<f64>>,
    n_drift: usize,
    variogram: FittedVariogram,
}

impl DriftKriging {
    /// Build a predictor from conditioning data.
    ///
    /// `drift[i]` holds the covariate values at `points[i]` (the constant
    /// basis function is implicit). All rows must have the same length.
    ///
    /// # Errors
    /// - [`DataError::TooFewObserved`] if there are not enough points to
    ///   support the drift block (needs n ≥ covariates + 2).
    /// - `InvalidParameter` on mismatched drift rows.
    pub fn new(
        points: Vec<SamplePoint>,
        drift: Vec<Vec<f64>>,
        variogram: FittedVariogram,
    ) -> Result<Self> {
        let n = points.len();
        if drift.len() != n {
            return Err(Error::InvalidParameter {
                name: "drift",
                value: drift.len().to_string(),
                reason: format!("expected one drift row per conditioning point ({n})"),
            });
        }
        let n_drift = drift.first().map_or(0, Vec::len);
        if drift.iter().any(|row| row.len() != n_drift) {
            return Err(Error::InvalidParameter {
                name: "drift",
                value: "ragged".into(),
                reason: "all drift rows must have the same length".into(),
            });
        }
        // Constant + covariates + at least one spare point
        let needed = n_drift + 2;
        if n < needed {
            return Err(DataError::TooFewObserved {
                observed: n,
                drifts: n_drift,
                needed,
            }
            .into());
        }
        Ok(Self {
            points,
            drift,
            n_drift,
            variogram,
        })
    }

    /// Conditioning point count.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of drift covariates (excluding the implicit constant).
    pub fn n_drift(&self) -> usize {
        self.n_drift
    }

    /// The fitted covariance model backing this predictor.
    pub fn variogram(&self) -> &FittedVariogram {
        &self.variogram
    }

    /// Values at the conditioning points, in conditioning order.
    pub fn conditioning_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    /// Solve the kriging system for one prediction location.
    ///
    /// `ext` carries the drift covariate values at (x, y) and must have
    /// length [`Self::n_drift`]. If the location coincides with a
    /// conditioning point the weights snap to that point exactly.
    ///
    /// # Errors
    /// `Error::Simulation` if the kriging system is singular (duplicate
    /// conditioning points or collinear drift). Not retried.
    pub fn weights(&self, x: f64, y: f64, ext: &[f64]) -> Result<Weights> {
        if ext.len() != self.n_drift {
            return Err(Error::InvalidParameter {
                name: "ext",
                value: ext.len().to_string(),
                reason: format!("expected {} drift value(s) at the target", self.n_drift),
            });
        }

        let n = self.points.len();

        // Coincident with a conditioning point: exact reproduction.
        if let Some(idx) = self
            .points
            .iter()
            .position(|p| p.dist(x, y) < SNAP_DISTANCE)
        {
            let mut weights = vec![0.0; n];
            weights[idx] = 1.0;
            return Ok(Weights {
                weights,
                multipliers: vec![0.0; 1 + self.n_drift],
                snapped_to: Some(idx),
            });
        }

        let p = 1 + self.n_drift;
        let m = n + p;
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];

        // Upper-left: variogram matrix (n × n)
        for i in 0..n {
            let pi = &self.points[i];
            for j in (i + 1)..n {
                let pj = &self.points[j];
                let h = pi.dist(pj.x, pj.y);
                let g = self.variogram.evaluate(h);
                mat[i * m + j] = g;
                mat[j * m + i] = g;
            }
            // γ(0) = 0 on the diagonal by convention
        }

        // Drift block: constant column, then covariates
        for i in 0..n {
            mat[i * m + n] = 1.0;
            mat[n * m + i] = 1.0;
            for (l, &d) in self.drift[i].iter().enumerate() {
                mat[i * m + n + 1 + l] = d;
                mat[(n + 1 + l) * m + i] = d;
            }
        }
        // Lower-right (p × p) stays zero

        // RHS: variogram to target, then drift at target
        for i in 0..n {
            rhs[i] = self.variogram.evaluate(self.points[i].dist(x, y));
        }
        rhs[n] = 1.0;
        for (l, &d) in ext.iter().enumerate() {
            rhs[n + 1 + l] = d;
        }

        let solution = solve(m, &mut mat, &mut rhs).map_err(|e| {
            Error::Simulation(format!(
                "singular kriging system at ({x:.6}, {y:.6}) with {n} conditioning points: {e}"
            ))
        })?;

        Ok(Weights {
            weights: solution[..n].to_vec(),
            multipliers: solution[n..].to_vec(),
            snapped_to: None,
        })
    }

    /// Kriging estimate from solved weights: Σwᵢ·zᵢ.
    pub fn estimate_with(&self, w: &Weights) -> f64 {
        w.weights
            .iter()
            .zip(&self.points)
            .map(|(wi, p)| wi * p.value)
            .sum()
    }

    /// Kriging variance at (x, y) from solved weights:
    /// σ² = Σwᵢ·γ(xᵢ,x₀) + Σμₖ·fₖ(x₀), clamped at zero.
    pub fn variance_with(&self, w: &Weights, x: f64, y: f64, ext: &[f64]) -> f64 {
        if w.snapped_to.is_some() {
            return 0.0;
        }
        let mut var = 0.0;
        for (wi, p) in w.weights.iter().zip(&self.points) {
            var += wi * self.variogram.evaluate(p.dist(x, y));
        }
        var += w.multipliers[0];
        for (l, &d) in ext.iter().enumerate() {
            var += w.multipliers[1 + l] * d;
        }
        var.max(0.0)
    }

    /// Kriging estimate and variance at one location.
    pub fn predict(&self, x: f64, y: f64, ext: &[f64]) -> Result<(f64, f64)> {
        let w = self.weights(x, y, ext)?;
        let estimate = self.estimate_with(&w);
        let variance = self.variance_with(&w, x, y, ext);
        Ok((estimate, variance))
    }
}

/// Solve Ax = b using Gaussian elimination with partial pivoting.
/// Sized for the dense global kriging systems of areal datasets.
fn solve(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> std::result::Result<Vec<f64>, String> {
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < 1e-14 {
            return Err(format!("zero pivot at column {col}"));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}
