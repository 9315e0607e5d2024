//! Engine-wide constants and defaults

/// Decimal places kept in emitted fix coordinates and distances
pub const FIX_DECIMALS: i32 = 2;

/// Fewest anchors that can constrain a 3D position
pub const MIN_ANCHORS_3D: usize = 3;

/// Anchor counts the closed-form solver accepts
pub const CLOSED_FORM_ANCHOR_COUNTS: [usize; 2] = [3, 4];

/// Relative singular value below which a linear system is treated as rank deficient
pub const SINGULAR_VALUE_EPSILON: f64 = 1e-10;

pub const DEFAULT_FTOL: f64 = 1e-8;
pub const DEFAULT_XTOL: f64 = 1e-8;
pub const DEFAULT_GTOL: f64 = 1e-8;
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Round to the fixed output precision
pub fn round_fixed(value: f64) -> f64 {
    let scale = 10f64.powi(FIX_DECIMALS);
    (value * scale).round() / scale
}
