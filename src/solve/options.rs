//! Options shared by every integration entry point.

use bon::Builder;

use crate::{Float, core::tolerance::Tolerance, methods::settings::Settings};

#[derive(Builder, Clone, Debug, PartialEq)]
/// Tolerances, constraint policy and step control for one integration call.
pub struct Options {
    /// Relative tolerance, shared by all states.
    #[builder(default = 1e-4)]
    pub rtol: Float,
    /// Absolute tolerance: one scalar or one entry per state.
    #[builder(default = Tolerance::Scalar(1e-4), into)]
    pub atol: Tolerance,
    /// Keep every state non-negative. Ignored by the DAE variant.
    #[builder(default = true)]
    pub non_negative: bool,
    /// Step control of the underlying BDF solver.
    #[builder(default)]
    pub settings: Settings,
}

impl Default for Options {
    fn default() -> Self {
        Options::builder().build()
    }
}
