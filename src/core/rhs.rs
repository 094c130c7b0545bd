//! User-supplied model functions.

use crate::{Float, core::adapter::CallbackError};

/// Right-hand side of an ODE system `dy/dt = f(t, y, p)`.
///
/// The integrator never inspects the function; it hands over the current time,
/// a private copy of the state and the caller's parameter vector and expects
/// exactly one derivative entry per state.
///
/// Any closure `Fn(f64, &[f64], &[f64]) -> Vec<f64>` implements this trait.
///
/// # Example
///
/// ```
/// use ivpdose::core::rhs::RhsFunction;
///
/// let decay = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0]];
/// assert_eq!(decay.evaluate(0.0, &[2.0], &[0.5]).unwrap(), vec![-1.0]);
/// ```
pub trait RhsFunction {
    fn evaluate(&self, t: Float, y: &[Float], p: &[Float]) -> Result<Vec<Float>, CallbackError>;

    /// Checked before every evaluation. Bindings to dynamic hosts override
    /// this to reject objects that cannot be called.
    fn check_callable(&self) -> Result<(), CallbackError> {
        Ok(())
    }
}

impl<F> RhsFunction for F
where
    F: Fn(Float, &[Float], &[Float]) -> Vec<Float>,
{
    fn evaluate(&self, t: Float, y: &[Float], p: &[Float]) -> Result<Vec<Float>, CallbackError> {
        Ok(self(t, y, p))
    }
}

/// Residual of an implicit system `F(t, y, y', p) = 0`.
///
/// Any closure `Fn(f64, &[f64], &[f64], &[f64]) -> Vec<f64>` implements this trait.
pub trait ResidualFunction {
    fn evaluate(
        &self,
        t: Float,
        y: &[Float],
        yp: &[Float],
        p: &[Float],
    ) -> Result<Vec<Float>, CallbackError>;

    fn check_callable(&self) -> Result<(), CallbackError> {
        Ok(())
    }
}

impl<F> ResidualFunction for F
where
    F: Fn(Float, &[Float], &[Float], &[Float]) -> Vec<Float>,
{
    fn evaluate(
        &self,
        t: Float,
        y: &[Float],
        yp: &[Float],
        p: &[Float],
    ) -> Result<Vec<Float>, CallbackError> {
        Ok(self(t, y, yp, p))
    }
}
