//! Stiff ODE and DAE integration driven by late-bound right-hand sides.
//!
//! The crate integrates `dy/dt = f(t, y, p)` (or a residual `F(t, y, y', p) = 0`)
//! with a variable-order BDF method and reports a dense table of states at the
//! requested output times. Scheduled instantaneous jumps (doses, boluses,
//! resets) are merged into the output schedule and applied exactly at their
//! time, after which the solver is re-initialized. Forward parameter
//! sensitivities are available for the ODE form.
//!
//! ```rust
//! use ivpdose::prelude::*;
//!
//! // One-compartment elimination with a second dose at t = 2.
//! let rhs = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0]];
//! let events = [EventRecord::new(1, 2.0, 1.0)];
//! let table = integrate_with_events(
//!     &[0.0, 1.0, 2.0, 3.0],
//!     &[1.0],
//!     &rhs,
//!     &[0.5],
//!     &events,
//!     &Options::default(),
//! )
//! .unwrap();
//! assert_eq!(table.len(), 4);
//! ```

pub mod core;
pub mod error;
pub mod matrix;
pub mod methods;
pub mod prelude;
pub mod schedule;
pub mod solve;
pub mod status;

#[cfg(feature = "python")]
mod python;

pub use error::{Error, Step};
pub use status::SolverFlag;

/// Floating point type used throughout the crate.
pub type Float = f64;
