//! Bridges the solver's native callback shape to user functions.
//!
//! The solver calls back with `(t, y, out, user_data)`. The user data is a
//! context object owned by the integration driver for the duration of one
//! call; it carries the user function and the parameter vector. The adapter
//! copies the state into a fresh buffer, evaluates the user function and
//! copies the result element by element into the solver-owned output buffer.

use thiserror::Error;

use crate::{
    Float,
    core::rhs::{ResidualFunction, RhsFunction},
};

/// Failure raised while calling back into user code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallbackError {
    #[error("no user context is bound to the solver")]
    MissingContext,
    #[error("user function is not callable: {0}")]
    NotCallable(String),
    #[error("user function returned {actual} values for {expected} states")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("user function raised: {0}")]
    Raised(String),
}

/// Native derivative callback: `(t, y, ydot, user_data)`.
pub type RhsCallback =
    fn(Float, &[Float], &mut [Float], Option<&RhsContext<'_>>) -> Result<(), CallbackError>;

/// Native residual callback: `(t, y, yp, residual, user_data)`.
pub type ResidualCallback = fn(
    Float,
    &[Float],
    &[Float],
    &mut [Float],
    Option<&ResidualContext<'_>>,
) -> Result<(), CallbackError>;

/// User data for ODE callbacks.
pub struct RhsContext<'a> {
    function: &'a dyn RhsFunction,
    params: Vec<Float>,
}

impl<'a> RhsContext<'a> {
    pub fn new(function: &'a dyn RhsFunction, params: &[Float]) -> Self {
        Self {
            function,
            params: params.to_vec(),
        }
    }

    pub fn params(&self) -> &[Float] {
        &self.params
    }

    /// Same function, different parameter vector.
    pub fn with_params(&self, params: Vec<Float>) -> RhsContext<'a> {
        RhsContext {
            function: self.function,
            params,
        }
    }
}

/// User data for residual callbacks.
pub struct ResidualContext<'a> {
    function: &'a dyn ResidualFunction,
    params: Vec<Float>,
}

impl<'a> ResidualContext<'a> {
    pub fn new(function: &'a dyn ResidualFunction, params: &[Float]) -> Self {
        Self {
            function,
            params: params.to_vec(),
        }
    }

    pub fn params(&self) -> &[Float] {
        &self.params
    }
}

/// Derivative callback handed to the solver.
pub fn rhs_adapter(
    t: Float,
    y: &[Float],
    ydot: &mut [Float],
    user_data: Option<&RhsContext<'_>>,
) -> Result<(), CallbackError> {
    let ctx = user_data.ok_or(CallbackError::MissingContext)?;
    ctx.function.check_callable()?;
    let state = y.to_vec();
    let derivative = ctx.function.evaluate(t, &state, &ctx.params)?;
    copy_out(&derivative, ydot)
}

/// Residual callback handed to the solver.
pub fn residual_adapter(
    t: Float,
    y: &[Float],
    yp: &[Float],
    residual: &mut [Float],
    user_data: Option<&ResidualContext<'_>>,
) -> Result<(), CallbackError> {
    let ctx = user_data.ok_or(CallbackError::MissingContext)?;
    ctx.function.check_callable()?;
    let state = y.to_vec();
    let rate = yp.to_vec();
    let values = ctx.function.evaluate(t, &state, &rate, &ctx.params)?;
    copy_out(&values, residual)
}

fn copy_out(values: &[Float], out: &mut [Float]) -> Result<(), CallbackError> {
    if values.len() != out.len() {
        return Err(CallbackError::LengthMismatch {
            expected: out.len(),
            actual: values.len(),
        });
    }
    for (slot, v) in out.iter_mut().zip(values) {
        *slot = *v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_derivative_into_solver_buffer() {
        let rhs = |t: f64, y: &[f64], p: &[f64]| vec![p[0] * y[0] + t, -y[1]];
        let ctx = RhsContext::new(&rhs, &[2.0]);
        let mut ydot = [0.0; 2];
        rhs_adapter(1.0, &[3.0, 4.0], &mut ydot, Some(&ctx)).unwrap();
        assert_eq!(ydot, [7.0, -4.0]);
    }

    #[test]
    fn rejects_wrong_length() {
        let rhs = |_t: f64, _y: &[f64], _p: &[f64]| vec![1.0, 2.0];
        let ctx = RhsContext::new(&rhs, &[]);
        let mut ydot = [0.0; 3];
        let err = rhs_adapter(0.0, &[0.0; 3], &mut ydot, Some(&ctx)).unwrap_err();
        assert_eq!(err, CallbackError::LengthMismatch { expected: 3, actual: 2 });
    }

    #[test]
    fn missing_context_is_an_error() {
        let mut ydot = [0.0; 1];
        let err = rhs_adapter(0.0, &[1.0], &mut ydot, None).unwrap_err();
        assert_eq!(err, CallbackError::MissingContext);

        let mut rr = [0.0; 1];
        let err = residual_adapter(0.0, &[1.0], &[0.0], &mut rr, None).unwrap_err();
        assert_eq!(err, CallbackError::MissingContext);
    }

    #[test]
    fn residual_sees_state_rate_and_params() {
        let res = |_t: f64, y: &[f64], yp: &[f64], p: &[f64]| vec![yp[0] + p[0] * y[0]];
        let ctx = ResidualContext::new(&res, &[0.5]);
        let mut rr = [0.0];
        residual_adapter(0.0, &[2.0], &[1.0], &mut rr, Some(&ctx)).unwrap();
        assert_eq!(rr, [2.0]);
    }

    #[test]
    fn with_params_keeps_the_function() {
        let rhs = |_t: f64, y: &[f64], p: &[f64]| vec![p[0] * y[0]];
        let ctx = RhsContext::new(&rhs, &[1.0]);
        let scaled = ctx.with_params(vec![3.0]);
        let mut ydot = [0.0];
        rhs_adapter(0.0, &[2.0], &mut ydot, Some(&scaled)).unwrap();
        assert_eq!(ydot, [6.0]);
        assert_eq!(ctx.params(), &[1.0]);
    }
}
