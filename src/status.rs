//! Status codes for solver calls

use thiserror::Error;

use crate::{Float, core::adapter::CallbackError};

/// Failure reported by a solver lifecycle call.
///
/// Every variant maps to a stable negative code, see [`SolverFlag::code`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverFlag {
    #[error("reached {steps} steps before the output time (t = {t})")]
    TooMuchWork { t: Float, steps: usize },
    #[error("step size {h} fell below the minimum at t = {t}")]
    StepTooSmall { t: Float, h: Float },
    #[error("error test failed repeatedly at t = {t} with h = {h}")]
    ErrorTestFailure { t: Float, h: Float },
    #[error("corrector failed to converge repeatedly at t = {t} with h = {h}")]
    ConvergenceFailure { t: Float, h: Float },
    #[error("constraints could not be satisfied at t = {t}")]
    ConstraintFailure { t: Float },
    #[error("user function failed")]
    CallbackFailure(#[source] CallbackError),
    #[error("error weight component {index} is not positive")]
    ErrorWeight { index: usize },
    #[error("illegal input: {0}")]
    IllInput(String),
    #[error("requested time {tout} is outside the reachable interval [{t_lo}, {t_hi}]")]
    BadTime { tout: Float, t_lo: Float, t_hi: Float },
    #[error("solver is not initialized")]
    NotInitialized,
    #[error("no linear solver attached")]
    LinearSolverMissing,
    #[error("sensitivities were not initialized")]
    NoSensitivities,
}

impl SolverFlag {
    /// Negative integer status associated with the flag.
    pub fn code(&self) -> i32 {
        match self {
            SolverFlag::TooMuchWork { .. } => -1,
            SolverFlag::StepTooSmall { .. } => -2,
            SolverFlag::ErrorTestFailure { .. } => -3,
            SolverFlag::ConvergenceFailure { .. } => -4,
            SolverFlag::LinearSolverMissing => -5,
            SolverFlag::CallbackFailure(_) => -8,
            SolverFlag::ConstraintFailure { .. } => -15,
            SolverFlag::IllInput(_) => -22,
            SolverFlag::NotInitialized => -23,
            SolverFlag::BadTime { .. } => -25,
            SolverFlag::ErrorWeight { .. } => -26,
            SolverFlag::NoSensitivities => -40,
        }
    }
}

impl From<CallbackError> for SolverFlag {
    fn from(err: CallbackError) -> Self {
        SolverFlag::CallbackFailure(err)
    }
}
