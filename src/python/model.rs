//! Python callables as model functions.
//!
//! The solver only ever sees [`RhsFunction`] / [`ResidualFunction`]; these
//! wrappers hand the state and parameters over as numpy arrays and read the
//! returned array_like back.

use numpy::{PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;

use crate::{
    Float,
    core::{
        adapter::CallbackError,
        rhs::{ResidualFunction, RhsFunction},
    },
};

/// `fun(t, y, p) -> array_like`
pub struct PyRhs<'py> {
    fun: Bound<'py, PyAny>,
}

impl<'py> PyRhs<'py> {
    pub fn new(fun: Bound<'py, PyAny>) -> Self {
        Self { fun }
    }
}

impl RhsFunction for PyRhs<'_> {
    fn evaluate(&self, t: Float, y: &[Float], p: &[Float]) -> Result<Vec<Float>, CallbackError> {
        let py = self.fun.py();
        let args = (t, PyArray1::from_slice(py, y), PyArray1::from_slice(py, p));
        let result = self.fun.call1(args).map_err(raised)?;
        parse_values(&result)
    }

    fn check_callable(&self) -> Result<(), CallbackError> {
        callable(&self.fun)
    }
}

/// `fun(t, y, yp, p) -> array_like`
pub struct PyResidual<'py> {
    fun: Bound<'py, PyAny>,
}

impl<'py> PyResidual<'py> {
    pub fn new(fun: Bound<'py, PyAny>) -> Self {
        Self { fun }
    }
}

impl ResidualFunction for PyResidual<'_> {
    fn evaluate(
        &self,
        t: Float,
        y: &[Float],
        yp: &[Float],
        p: &[Float],
    ) -> Result<Vec<Float>, CallbackError> {
        let py = self.fun.py();
        let args = (
            t,
            PyArray1::from_slice(py, y),
            PyArray1::from_slice(py, yp),
            PyArray1::from_slice(py, p),
        );
        let result = self.fun.call1(args).map_err(raised)?;
        parse_values(&result)
    }

    fn check_callable(&self) -> Result<(), CallbackError> {
        callable(&self.fun)
    }
}

fn callable(fun: &Bound<'_, PyAny>) -> Result<(), CallbackError> {
    if fun.is_callable() {
        return Ok(());
    }
    let type_name = fun
        .get_type()
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|_| "object".to_string());
    Err(CallbackError::NotCallable(format!("'{type_name}' object is not callable")))
}

fn raised(err: PyErr) -> CallbackError {
    CallbackError::Raised(err.to_string())
}

/// Float64 arrays are read directly; anything else goes through the
/// sequence protocol.
fn parse_values(result: &Bound<'_, PyAny>) -> Result<Vec<Float>, CallbackError> {
    if let Ok(array) = result.extract::<PyReadonlyArray1<Float>>() {
        return Ok(array.as_array().to_vec());
    }
    result.extract::<Vec<Float>>().map_err(|_| {
        CallbackError::Raised("model function must return a 1-D array_like of floats".into())
    })
}
