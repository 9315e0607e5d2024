//! Anchor layout assessment

use nalgebra::{DMatrix, Vector3};
use serde::{Deserialize, Serialize};

/// Spread of singular values below which an axis counts as collapsed
const FLATNESS_TOLERANCE: f64 = 1e-6;

/// How well an anchor layout constrains a 3D position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeometryQuality {
    /// Anchors span all three axes
    WellSpread,
    /// Anchors lie in one plane; height is ambiguous
    Coplanar,
    /// Anchors lie on one line
    Collinear,
    /// All anchors at the same point (or fewer than two anchors)
    Coincident,
}

impl GeometryQuality {
    /// Whether a four-anchor closed-form solve can succeed on this layout
    pub fn supports_closed_form_3d(&self) -> bool {
        matches!(self, GeometryQuality::WellSpread)
    }
}

/// Classify a layout from the singular values of its centred coordinates
pub fn assess_geometry(positions: &[Vector3<f64>]) -> GeometryQuality {
    if positions.len() < 2 {
        return GeometryQuality::Coincident;
    }

    let n = positions.len();
    let centroid: Vector3<f64> = positions.iter().sum::<Vector3<f64>>() / n as f64;
    let centred = DMatrix::from_fn(n, 3, |r, c| positions[r][c] - centroid[c]);

    let mut singular: Vec<f64> = centred.singular_values().iter().copied().collect();
    singular.sort_by(|a, b| b.total_cmp(a));
    singular.resize(3, 0.0);

    let largest = singular[0];
    if largest <= f64::EPSILON {
        GeometryQuality::Coincident
    } else if singular[1] / largest < FLATNESS_TOLERANCE {
        GeometryQuality::Collinear
    } else if singular[2] / largest < FLATNESS_TOLERANCE {
        GeometryQuality::Coplanar
    } else {
        GeometryQuality::WellSpread
    }
}
