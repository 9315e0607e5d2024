//! Closed-form multilateration for three or four anchors
//!
//! Subtracting the first sphere equation from the others removes the quadratic
//! term and leaves the linear system
//!
//! ```text
//! 2(p_i - p_1) . x = d_1^2 - d_i^2 - |p_1|^2 + |p_i|^2      i = 2..N
//! ```
//!
//! With four anchors the system is square; with three it is underdetermined
//! and the minimum-norm least-squares solution is returned.

use super::{check_inputs, MultilaterationSolver, SolveError};
use crate::core::{CLOSED_FORM_ANCHOR_COUNTS, SINGULAR_VALUE_EPSILON};
use nalgebra::{DMatrix, DVector, Vector3};

#[derive(Debug, Clone)]
pub struct ClosedFormSolver {
    /// Singular values below `singular_epsilon * max_singular_value` count as zero
    pub singular_epsilon: f64,
}

impl Default for ClosedFormSolver {
    fn default() -> Self {
        Self {
            singular_epsilon: SINGULAR_VALUE_EPSILON,
        }
    }
}

impl ClosedFormSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the linearized system `A x = b` relative to the first anchor
    pub fn linearize(
        anchors: &[Vector3<f64>],
        distances: &[f64],
    ) -> Result<(DMatrix<f64>, DVector<f64>), SolveError> {
        check_inputs(anchors, distances)?;
        let rows = anchors.len().saturating_sub(1);
        let mut a = DMatrix::zeros(rows, 3);
        let mut b = DVector::zeros(rows);

        let p1 = anchors[0];
        let d1 = distances[0];
        for (row, (pi, di)) in anchors.iter().zip(distances).skip(1).enumerate() {
            let diff = pi - p1;
            a[(row, 0)] = 2.0 * diff.x;
            a[(row, 1)] = 2.0 * diff.y;
            a[(row, 2)] = 2.0 * diff.z;
            b[row] = d1 * d1 - di * di - p1.norm_squared() + pi.norm_squared();
        }

        Ok((a, b))
    }
}

impl MultilaterationSolver for ClosedFormSolver {
    fn solve(&self, anchors: &[Vector3<f64>], distances: &[f64]) -> Result<Vector3<f64>, SolveError> {
        check_inputs(anchors, distances)?;
        let count = anchors.len();
        if !CLOSED_FORM_ANCHOR_COUNTS.contains(&count) {
            return Err(SolveError::UnsupportedAnchorCount { count });
        }

        let (a, b) = Self::linearize(anchors, distances)?;
        let required = a.nrows();

        let svd = a.svd(true, true);
        let max_singular = svd.singular_values.max();
        if !max_singular.is_finite() || max_singular <= 0.0 {
            return Err(SolveError::Singular { rank: 0, required });
        }

        let threshold = self.singular_epsilon * max_singular;
        let rank = svd.rank(threshold);
        if rank < required {
            return Err(SolveError::Singular { rank, required });
        }

        let x = svd
            .solve(&b, threshold)
            .map_err(|e| SolveError::Decomposition(e.to_string()))?;
        let point = Vector3::new(x[0], x[1], x[2]);

        if point.iter().all(|v| v.is_finite()) {
            Ok(point)
        } else {
            Err(SolveError::NonFinite)
        }
    }

    fn name(&self) -> &'static str {
        "closed_form"
    }
}
