//! Dense matrices and the dense direct linear solver.

mod base;
mod linear;

pub use base::Matrix;
pub use linear::{DenseLinearSolver, Singular};
