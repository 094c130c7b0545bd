//! Python module `ivpdose`.
//!
//! ```python
//! import numpy as np
//! import ivpdose
//!
//! def rhs(t, y, p):
//!     return -p[0] * y
//!
//! table = ivpdose.integrate(np.linspace(0, 10, 11), [1.0], rhs, [0.3],
//!                           events=[(1, 5.0, 1.0)])
//! ```

mod model;

use numpy::{PyArray1, PyArray2, PyArrayMethods};
use pyo3::{
    exceptions::{PyRuntimeError, PyValueError},
    prelude::*,
};

use crate::{
    Float,
    core::tolerance::Tolerance,
    error::Error,
    schedule::EventRecord,
    solve::{self, Options},
};

use model::{PyResidual, PyRhs};

/// Input errors become `ValueError`, solver failures `RuntimeError`. The
/// message carries the whole source chain.
fn to_py_err(err: Error) -> PyErr {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if err.is_input() {
        PyValueError::new_err(message)
    } else {
        PyRuntimeError::new_err(message)
    }
}

/// `atol` as a float or a sequence of floats.
fn tolerance(atol: Option<&Bound<'_, PyAny>>) -> PyResult<Tolerance> {
    let Some(atol) = atol else {
        return Ok(Tolerance::default());
    };
    if let Ok(value) = atol.extract::<Float>() {
        return Ok(Tolerance::Scalar(value));
    }
    Ok(Tolerance::Vector(atol.extract::<Vec<Float>>()?))
}

fn options(rtol: Float, atol: Option<&Bound<'_, PyAny>>, non_negative: bool) -> PyResult<Options> {
    Ok(Options::builder()
        .rtol(rtol)
        .atol(tolerance(atol)?)
        .non_negative(non_negative)
        .build())
}

/// Row-major table to a `(rows, cols)` array.
fn to_array<'py>(
    py: Python<'py>,
    table: Vec<Vec<Float>>,
    cols: usize,
) -> PyResult<Bound<'py, PyArray2<Float>>> {
    let rows = table.len();
    let flat: Vec<Float> = table.into_iter().flatten().collect();
    PyArray1::from_vec(py, flat).reshape((rows, cols))
}

#[pyfunction]
#[pyo3(signature = (time_points, initial_state, rhs, parameters, events=None, rtol=1e-4, atol=None, non_negative=true))]
/// Integrate ``dy/dt = rhs(t, y, p)`` with optional scheduled jumps.
///
/// ``events`` is a sequence of ``(state, time, delta)`` with 1-based
/// ``state``. Returns an array with one row ``[t, y_0, .., y_{n-1}]`` per
/// merged output time.
#[allow(clippy::too_many_arguments)]
fn integrate<'py>(
    py: Python<'py>,
    time_points: Vec<Float>,
    initial_state: Vec<Float>,
    rhs: Bound<'py, PyAny>,
    parameters: Vec<Float>,
    events: Option<Vec<(i64, Float, Float)>>,
    rtol: Float,
    atol: Option<Bound<'py, PyAny>>,
    non_negative: bool,
) -> PyResult<Bound<'py, PyArray2<Float>>> {
    let options = options(rtol, atol.as_ref(), non_negative)?;
    let events: Vec<EventRecord> = events
        .unwrap_or_default()
        .into_iter()
        .map(EventRecord::from)
        .collect();
    let trajectory = solve::integrate_with_events(
        &time_points,
        &initial_state,
        &PyRhs::new(rhs),
        &parameters,
        &events,
        &options,
    )
    .map_err(to_py_err)?;
    to_array(py, trajectory.to_table(), 1 + initial_state.len())
}

#[pyfunction]
#[pyo3(signature = (time_points, initial_state, rhs, parameters, rtol=1e-4, atol=None, method="STG", error_control=true))]
/// Integrate ``dy/dt = rhs(t, y, p)`` with forward sensitivities.
///
/// ``method`` is ``"STG"`` or ``"SIM"``. Returns an array of width
/// ``1 + n_states * n_params``: time, then ``dy/dp_0``, ``dy/dp_1``, ...
#[allow(clippy::too_many_arguments)]
fn integrate_with_sensitivities<'py>(
    py: Python<'py>,
    time_points: Vec<Float>,
    initial_state: Vec<Float>,
    rhs: Bound<'py, PyAny>,
    parameters: Vec<Float>,
    rtol: Float,
    atol: Option<Bound<'py, PyAny>>,
    method: &str,
    error_control: bool,
) -> PyResult<Bound<'py, PyArray2<Float>>> {
    let options = options(rtol, atol.as_ref(), true)?;
    let table = solve::integrate_with_sensitivities(
        &time_points,
        &initial_state,
        &PyRhs::new(rhs),
        &parameters,
        &options,
        method,
        error_control,
    )
    .map_err(to_py_err)?;
    let width = table.width();
    to_array(py, table.to_table(), width)
}

#[pyfunction]
#[pyo3(signature = (time_points, initial_value, initial_rate, residual, parameters, rtol=1e-4, atol=None))]
/// Integrate ``residual(t, y, yp, p) = 0`` from a consistent ``(y, yp)``.
#[allow(clippy::too_many_arguments)]
fn integrate_dae<'py>(
    py: Python<'py>,
    time_points: Vec<Float>,
    initial_value: Vec<Float>,
    initial_rate: Vec<Float>,
    residual: Bound<'py, PyAny>,
    parameters: Vec<Float>,
    rtol: Float,
    atol: Option<Bound<'py, PyAny>>,
) -> PyResult<Bound<'py, PyArray2<Float>>> {
    let options = options(rtol, atol.as_ref(), false)?;
    let trajectory = solve::integrate_dae(
        &time_points,
        &initial_value,
        &initial_rate,
        &PyResidual::new(residual),
        &parameters,
        &options,
    )
    .map_err(to_py_err)?;
    to_array(py, trajectory.to_table(), 1 + initial_value.len())
}

#[pymodule]
fn ivpdose(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(integrate, m)?)?;
    m.add_function(wrap_pyfunction!(integrate_with_sensitivities, m)?)?;
    m.add_function(wrap_pyfunction!(integrate_dae, m)?)?;
    m.setattr(
        "__doc__",
        "Stiff ODE/DAE integration with scheduled state jumps and forward sensitivities.",
    )?;
    Ok(())
}
