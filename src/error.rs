//! Errors returned by the integration entry points.

use std::fmt;

use thiserror::Error;

use crate::{Float, core::adapter::CallbackError, status::SolverFlag};

/// Everything that can stop an integration call.
///
/// Input validation variants are raised before any solver memory exists.
/// [`Error::Allocation`] and [`Error::Solver`] name the lifecycle [`Step`]
/// that failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("time vector is empty")]
    EmptyTimePoints,

    #[error("{what} {index} is not finite (got {value})")]
    NonFiniteTime {
        what: &'static str,
        index: usize,
        value: Float,
    },

    #[error("time vector must be non-decreasing (t[{index}] = {value} follows {previous})")]
    UnsortedTimePoints {
        index: usize,
        previous: Float,
        value: Float,
    },

    #[error(
        "absolute tolerance must be a scalar or have one entry per state \
         (got {actual} entries for {expected} states)"
    )]
    ToleranceShape { expected: usize, actual: usize },

    #[error("relative tolerance must be finite and non-negative (got {0})")]
    RelativeTolerance(Float),

    #[error("absolute tolerance entry {index} must be finite and non-negative (got {value})")]
    AbsoluteTolerance { index: usize, value: Float },

    #[error("event record {record} targets state {index}, expected a value in 1..={n_states}")]
    EventTarget {
        record: usize,
        index: i64,
        n_states: usize,
    },

    #[error("event record {record} at t = {time} precedes the first output time {start}")]
    EventBeforeStart {
        record: usize,
        time: Float,
        start: Float,
    },

    #[error("initial value and initial rate differ in length ({value} vs {rate})")]
    RateLength { value: usize, rate: usize },

    #[error("unrecognised sensitivity method `{0}`, expected `STG` or `SIM`")]
    SensitivityMethod(String),

    #[error("user function cannot be used")]
    NotCallable(#[source] CallbackError),

    #[error("{step} failed: returned no memory")]
    Allocation { step: Step },

    #[error("{step} failed with flag {}", .flag.code())]
    Solver {
        step: Step,
        #[source]
        flag: SolverFlag,
    },
}

impl Error {
    /// True for errors raised while validating arguments, before the solver exists.
    pub fn is_input(&self) -> bool {
        !matches!(self, Error::Allocation { .. } | Error::Solver { .. })
    }

    /// Solver flag behind a lifecycle failure.
    pub fn flag(&self) -> Option<&SolverFlag> {
        match self {
            Error::Solver { flag, .. } => Some(flag),
            _ => None,
        }
    }
}

/// Lifecycle calls made against the solver, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    SetUserData,
    Init,
    SetTolerances,
    DenseMatrix,
    DenseLinearSolver,
    SetLinearSolver,
    SetConstraints,
    SetSettings,
    SetStopTime,
    Advance,
    ReInit,
    SensInit,
    SetSensParams,
    SetSensErrorControl,
    SetErrorWeight,
    GetSens,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::Create => "solver creation",
            Step::SetUserData => "user data binding",
            Step::Init => "solver initialization",
            Step::SetTolerances => "tolerance setup",
            Step::DenseMatrix => "dense matrix creation",
            Step::DenseLinearSolver => "dense linear solver creation",
            Step::SetLinearSolver => "linear solver attachment",
            Step::SetConstraints => "constraint setup",
            Step::SetSettings => "solver settings",
            Step::SetStopTime => "stop time setup",
            Step::Advance => "advance",
            Step::ReInit => "re-initialization",
            Step::SensInit => "sensitivity initialization",
            Step::SetSensParams => "sensitivity parameter setup",
            Step::SetSensErrorControl => "sensitivity error control setup",
            Step::SetErrorWeight => "error weight function setup",
            Step::GetSens => "sensitivity retrieval",
        };
        f.write_str(name)
    }
}

/// Memory-allocating calls report failure as an absent value.
pub(crate) fn check_alloc<T>(step: Step, value: Option<T>) -> Result<T, Error> {
    value.ok_or_else(|| {
        log::error!("{step} returned no memory");
        Error::Allocation { step }
    })
}

/// Status-returning calls report failure as a [`SolverFlag`].
pub(crate) trait CheckFlag<T> {
    fn check(self, step: Step) -> Result<T, Error>;
}

impl<T> CheckFlag<T> for Result<T, SolverFlag> {
    fn check(self, step: Step) -> Result<T, Error> {
        self.map_err(|flag| {
            log::error!("{step} failed with flag {}: {flag}", flag.code());
            Error::Solver { step, flag }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_messages_name_the_step() {
        let err = Err::<(), _>(SolverFlag::NotInitialized)
            .check(Step::Advance)
            .unwrap_err();
        assert!(err.to_string().starts_with("advance failed with flag"));
        assert!(!err.is_input());
        assert_eq!(err.flag().map(SolverFlag::code), Some(SolverFlag::NotInitialized.code()));

        let err = check_alloc::<()>(Step::Create, None).unwrap_err();
        assert_eq!(err.to_string(), "solver creation failed: returned no memory");
    }

    #[test]
    fn tolerance_shape_mentions_both_lengths() {
        let err = Error::ToleranceShape { expected: 3, actual: 2 };
        let msg = err.to_string();
        assert!(msg.contains("2 entries"));
        assert!(msg.contains("3 states"));
        assert!(err.is_input());
    }
}
