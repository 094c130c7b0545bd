//! Interpolation trait

use crate::Float;

/// Evaluate a continuous extension of the solution inside the last step.
pub trait Interpolate {
    /// Interpolate the solution at the given abscissa `xi`.
    fn interpolate(&self, xi: Float, yi: &mut [Float]);
}
