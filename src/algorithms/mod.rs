//! Multilateration solvers
//!
//! Two strategies share the [`MultilaterationSolver`] contract: a closed-form
//! linear least-squares solve for exactly three or four anchors, and a bounded
//! Levenberg-Marquardt refinement for any anchor count. [`Multilaterator`]
//! dispatches between them according to [`SolverStrategy`].

pub mod bounded;
pub mod closed_form;
pub mod geometry;

pub use bounded::{BoundedSolver, BoundingBox};
pub use closed_form::ClosedFormSolver;
pub use geometry::{assess_geometry, GeometryQuality};

use crate::core::{
    CLOSED_FORM_ANCHOR_COUNTS, DEFAULT_FTOL, DEFAULT_GTOL, DEFAULT_MAX_ITERATIONS, DEFAULT_XTOL,
    MIN_ANCHORS_3D,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a single solve attempt produced no position
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("need at least {required} anchors, got {available}")]
    TooFewAnchors { available: usize, required: usize },
    #[error("{anchors} anchor positions but {distances} distances")]
    LengthMismatch { anchors: usize, distances: usize },
    #[error("closed-form solver supports 3 or 4 anchors, got {count}")]
    UnsupportedAnchorCount { count: usize },
    #[error("linear system is rank deficient (rank {rank}, need {required})")]
    Singular { rank: usize, required: usize },
    #[error("least-squares decomposition failed: {0}")]
    Decomposition(String),
    #[error("solution is not finite")]
    NonFinite,
    #[error("no convergence after {iterations} iterations (cost {cost:.3e})")]
    NotConverged { iterations: usize, cost: f64 },
    #[error("no solver configured for {count} anchors")]
    NoSolverAvailable { count: usize },
}

/// Contract shared by every multilateration strategy.
///
/// `anchors[i]` is paired with `distances[i]`. Failures are values, never panics.
pub trait MultilaterationSolver {
    fn solve(&self, anchors: &[Vector3<f64>], distances: &[f64]) -> Result<Vector3<f64>, SolveError>;

    fn name(&self) -> &'static str;
}

/// Which solver the engine runs for a ready snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverStrategy {
    /// Closed form for 3 or 4 anchors, bounded solver otherwise or on failure
    #[default]
    Auto,
    ClosedForm,
    Bounded,
}

/// Solver tuning shared by all technologies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default)]
    pub strategy: SolverStrategy,
    /// Physical volume the bounded solver searches; required for `bounded`
    #[serde(default)]
    pub bounds: Option<BoundingBox>,
    #[serde(default = "default_ftol")]
    pub ftol: f64,
    #[serde(default = "default_xtol")]
    pub xtol: f64,
    #[serde(default = "default_gtol")]
    pub gtol: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

fn default_ftol() -> f64 {
    DEFAULT_FTOL
}

fn default_xtol() -> f64 {
    DEFAULT_XTOL
}

fn default_gtol() -> f64 {
    DEFAULT_GTOL
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            strategy: SolverStrategy::Auto,
            bounds: None,
            ftol: DEFAULT_FTOL,
            xtol: DEFAULT_XTOL,
            gtol: DEFAULT_GTOL,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl SolverSettings {
    /// Whether the configured strategy can handle a snapshot of `count` anchors
    pub fn supports(&self, count: usize) -> bool {
        let closed_form = CLOSED_FORM_ANCHOR_COUNTS.contains(&count);
        match self.strategy {
            SolverStrategy::ClosedForm => closed_form,
            SolverStrategy::Bounded => self.bounds.is_some(),
            SolverStrategy::Auto => closed_form || self.bounds.is_some(),
        }
    }
}

/// Which strategy produced a solution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    ClosedForm,
    Bounded,
}

/// Successful solve with its fit quality
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub point: Vector3<f64>,
    pub kind: SolverKind,
    /// Root mean square of `|point - anchor_i| - distance_i`
    pub rms_residual: f64,
}

/// Strategy dispatcher built once from [`SolverSettings`]
#[derive(Debug, Clone)]
pub struct Multilaterator {
    strategy: SolverStrategy,
    closed_form: ClosedFormSolver,
    bounded: Option<BoundedSolver>,
}

impl Multilaterator {
    pub fn new(settings: &SolverSettings) -> Self {
        let bounded = settings.bounds.clone().map(|bounds| BoundedSolver {
            bounds,
            ftol: settings.ftol,
            xtol: settings.xtol,
            gtol: settings.gtol,
            max_iterations: settings.max_iterations,
        });

        Self {
            strategy: settings.strategy,
            closed_form: ClosedFormSolver::default(),
            bounded,
        }
    }

    pub fn strategy(&self) -> SolverStrategy {
        self.strategy
    }

    pub fn solve(&self, anchors: &[Vector3<f64>], distances: &[f64]) -> Result<Solution, SolveError> {
        let count = anchors.len();
        let closed_form_applies = CLOSED_FORM_ANCHOR_COUNTS.contains(&count);

        let (point, kind) = match self.strategy {
            SolverStrategy::ClosedForm => (self.closed_form.solve(anchors, distances)?, SolverKind::ClosedForm),
            SolverStrategy::Bounded => (self.run_bounded(anchors, distances)?, SolverKind::Bounded),
            SolverStrategy::Auto if closed_form_applies => match self.closed_form.solve(anchors, distances) {
                Ok(point) => (point, SolverKind::ClosedForm),
                Err(err) if self.bounded.is_some() => {
                    log::debug!("closed form failed ({}), falling back to bounded solver", err);
                    (self.run_bounded(anchors, distances)?, SolverKind::Bounded)
                }
                Err(err) => return Err(err),
            },
            SolverStrategy::Auto => (self.run_bounded(anchors, distances)?, SolverKind::Bounded),
        };

        Ok(Solution {
            point,
            kind,
            rms_residual: rms_residual(anchors, distances, &point),
        })
    }

    fn run_bounded(&self, anchors: &[Vector3<f64>], distances: &[f64]) -> Result<Vector3<f64>, SolveError> {
        match &self.bounded {
            Some(solver) => solver.solve(anchors, distances),
            None => Err(SolveError::NoSolverAvailable { count: anchors.len() }),
        }
    }
}

/// Shared input checks for all solvers
pub(crate) fn check_inputs(anchors: &[Vector3<f64>], distances: &[f64]) -> Result<(), SolveError> {
    if anchors.len() != distances.len() {
        return Err(SolveError::LengthMismatch {
            anchors: anchors.len(),
            distances: distances.len(),
        });
    }
    if anchors.len() < MIN_ANCHORS_3D {
        return Err(SolveError::TooFewAnchors {
            available: anchors.len(),
            required: MIN_ANCHORS_3D,
        });
    }
    Ok(())
}

/// RMS range residual of `point` against the measured distances
pub fn rms_residual(anchors: &[Vector3<f64>], distances: &[f64], point: &Vector3<f64>) -> f64 {
    if anchors.is_empty() {
        return 0.0;
    }
    let sum: f64 = anchors
        .iter()
        .zip(distances)
        .map(|(anchor, distance)| {
            let r = (point - anchor).norm() - distance;
            r * r
        })
        .sum();
    (sum / anchors.len() as f64).sqrt()
}
