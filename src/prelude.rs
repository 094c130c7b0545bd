//! Convenient prelude: the model traits, the entry points and their types.
//!
//! ```rust
//! use ivpdose::prelude::*;
//! ```

pub use crate::{
    Float,
    core::{
        interpolate::Interpolate,
        rhs::{ResidualFunction, RhsFunction},
        tolerance::Tolerance,
    },
    error::{Error, Step},
    methods::{bdf::SensitivityMethod, result::Stats, settings::Settings},
    schedule::{EventRecord, RowKind, Schedule, ScheduleRow},
    solve::{
        Options, SensitivityTable, Trajectory, integrate, integrate_dae, integrate_with_events,
        integrate_with_sensitivities,
    },
    status::SolverFlag,
};
