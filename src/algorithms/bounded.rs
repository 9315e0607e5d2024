//! Box-constrained nonlinear least-squares multilateration
//!
//! Minimizes `sum_i (|x - p_i| - d_i)^2` with a projected Levenberg-Marquardt
//! iteration. The search starts at the anchor centroid and every iterate is
//! clamped into the configured [`BoundingBox`]. A solve succeeds only when one
//! of the tolerance tests fires inside the iteration budget.

use super::{check_inputs, MultilaterationSolver, SolveError};
use crate::core::{DEFAULT_FTOL, DEFAULT_GTOL, DEFAULT_MAX_ITERATIONS, DEFAULT_XTOL};
use nalgebra::{DMatrix, DVector, Vector3};
use serde::{Deserialize, Serialize};

const INITIAL_DAMPING: f64 = 1e-3;
const MIN_DAMPING: f64 = 1e-12;
const MAX_DAMPING: f64 = 1e10;
const DAMPING_FACTOR: f64 = 10.0;
/// Relative singular value of the seed Jacobian below which the seed is moved
const DEGENERATE_SEED_TOLERANCE: f64 = 1e-6;

/// Axis-aligned physical volume, e.g. the room extents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl BoundingBox {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    /// True when every axis has `min <= max` and all limits are finite
    pub fn is_valid(&self) -> bool {
        (0..3).all(|i| self.min[i].is_finite() && self.max[i].is_finite() && self.min[i] <= self.max[i])
    }

    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        (0..3).all(|i| point[i] >= self.min[i] && point[i] <= self.max[i])
    }

    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(
            0.5 * (self.min[0] + self.max[0]),
            0.5 * (self.min[1] + self.max[1]),
            0.5 * (self.min[2] + self.max[2]),
        )
    }

    pub fn clamp(&self, point: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            point.x.clamp(self.min[0], self.max[0]),
            point.y.clamp(self.min[1], self.max[1]),
            point.z.clamp(self.min[2], self.max[2]),
        )
    }
}

/// Projected Levenberg-Marquardt solver
#[derive(Debug, Clone)]
pub struct BoundedSolver {
    pub bounds: BoundingBox,
    /// Relative cost reduction below which an accepted step counts as converged
    pub ftol: f64,
    /// Relative step length below which the iterate counts as converged
    pub xtol: f64,
    /// Projected gradient magnitude below which the iterate counts as converged
    pub gtol: f64,
    pub max_iterations: usize,
}

impl BoundedSolver {
    pub fn new(bounds: BoundingBox) -> Self {
        Self {
            bounds,
            ftol: DEFAULT_FTOL,
            xtol: DEFAULT_XTOL,
            gtol: DEFAULT_GTOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Residuals `|x - p_i| - d_i` and their Jacobian with respect to `x`
    fn compute_residuals_and_jacobian(
        anchors: &[Vector3<f64>],
        distances: &[f64],
        estimate: &Vector3<f64>,
    ) -> (DVector<f64>, DMatrix<f64>) {
        let n = anchors.len();
        let mut residuals = DVector::zeros(n);
        let mut jacobian = DMatrix::zeros(n, 3);

        for (i, (anchor, distance)) in anchors.iter().zip(distances).enumerate() {
            let diff = estimate - anchor;
            let predicted = diff.norm();
            residuals[i] = predicted - distance;

            // Gradient is undefined on top of an anchor; leave the row at zero.
            if predicted > 1e-12 {
                let unit = diff / predicted;
                jacobian[(i, 0)] = unit.x;
                jacobian[(i, 1)] = unit.y;
                jacobian[(i, 2)] = unit.z;
            }
        }

        (residuals, jacobian)
    }

    /// Axes pinned at a bound with the descent direction pointing outward
    fn active_axes(&self, x: &Vector3<f64>, gradient: &Vector3<f64>) -> [bool; 3] {
        let mut active = [false; 3];
        for (i, flag) in active.iter_mut().enumerate() {
            let at_lower = x[i] <= self.bounds.min[i] && gradient[i] > 0.0;
            let at_upper = x[i] >= self.bounds.max[i] && gradient[i] < 0.0;
            *flag = at_lower || at_upper;
        }
        active
    }

    fn centroid(anchors: &[Vector3<f64>]) -> Vector3<f64> {
        let sum: Vector3<f64> = anchors.iter().sum();
        sum / anchors.len() as f64
    }

    /// Anchor centroid clamped into the box.
    ///
    /// For a coplanar layout the centroid lies in the anchor plane, where the
    /// gradient across the plane vanishes and the iteration could never leave
    /// it. Such a seed is moved halfway towards the box centre.
    fn seed(&self, anchors: &[Vector3<f64>]) -> Vector3<f64> {
        let seed = self.bounds.clamp(&Self::centroid(anchors));

        let jacobian = DMatrix::from_fn(anchors.len(), 3, |r, c| {
            let diff = seed - anchors[r];
            let norm = diff.norm();
            if norm > 1e-12 {
                diff[c] / norm
            } else {
                0.0
            }
        });
        let singular = jacobian.singular_values();
        if singular.min() <= DEGENERATE_SEED_TOLERANCE * singular.max() {
            log::trace!("seed {:?} is degenerate for this layout, moving towards box centre", seed);
            return (seed + self.bounds.center()) * 0.5;
        }
        seed
    }
}

impl MultilaterationSolver for BoundedSolver {
    fn solve(&self, anchors: &[Vector3<f64>], distances: &[f64]) -> Result<Vector3<f64>, SolveError> {
        check_inputs(anchors, distances)?;

        let mut x = self.seed(anchors);
        let (mut residuals, mut jacobian) = Self::compute_residuals_and_jacobian(anchors, distances, &x);
        let mut cost = 0.5 * residuals.norm_squared();
        let mut lambda = INITIAL_DAMPING;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;
            let jt = jacobian.transpose();
            let gradient = &jt * &residuals;
            let gradient = Vector3::new(gradient[0], gradient[1], gradient[2]);

            let active = self.active_axes(&x, &gradient);
            let mut projected = gradient;
            for i in (0..3).filter(|&i| active[i]) {
                projected[i] = 0.0;
            }
            if projected.amax() <= self.gtol {
                return Ok(x);
            }

            // Damped normal equations over the free axes only.
            let jtj = &jt * &jacobian;
            let mut damped = jtj.clone();
            for i in 0..3 {
                damped[(i, i)] += lambda * (1.0 + jtj[(i, i)]);
            }
            for i in (0..3).filter(|&i| active[i]) {
                for j in 0..3 {
                    damped[(i, j)] = 0.0;
                    damped[(j, i)] = 0.0;
                }
                damped[(i, i)] = 1.0;
            }

            let rhs = DVector::from_column_slice(&[-projected.x, -projected.y, -projected.z]);
            let step = match damped.lu().solve(&rhs) {
                Some(step) => Vector3::new(step[0], step[1], step[2]),
                None => {
                    lambda *= DAMPING_FACTOR;
                    if lambda > MAX_DAMPING {
                        break;
                    }
                    continue;
                }
            };

            let candidate = self.bounds.clamp(&(x + step));
            if (candidate - x).norm() <= self.xtol * (self.xtol + x.norm()) {
                return Ok(x);
            }

            let (new_residuals, new_jacobian) =
                Self::compute_residuals_and_jacobian(anchors, distances, &candidate);
            let new_cost = 0.5 * new_residuals.norm_squared();

            if new_cost < cost {
                let reduction = cost - new_cost;
                let previous = cost;

                x = candidate;
                residuals = new_residuals;
                jacobian = new_jacobian;
                cost = new_cost;
                lambda = (lambda / DAMPING_FACTOR).max(MIN_DAMPING);

                if reduction <= self.ftol * previous {
                    return Ok(x);
                }
            } else {
                lambda *= DAMPING_FACTOR;
                if lambda > MAX_DAMPING {
                    break;
                }
            }
        }

        Err(SolveError::NotConverged { iterations, cost })
    }

    fn name(&self) -> &'static str {
        "bounded"
    }
}
