//! Settings for the BDF integrator

use bon::Builder;

use crate::Float;

#[derive(Builder, Clone, Debug, PartialEq)]
/// Step control settings for the BDF integrator.
pub struct Settings {
    /// Maximum number of internal steps per advance call.
    #[builder(default = 500)]
    pub max_steps: usize,
    /// Initial step size. None will result in an initial guess
    /// from the starting slope.
    pub h0: Option<Float>,
    /// Maximal step size.
    pub hmax: Option<Float>,
    /// Minimum step size.
    pub hmin: Option<Float>,
    /// Highest BDF order used, between 1 and 5.
    #[builder(default = 5)]
    pub max_order: usize,
    /// Max number of iterations in Newton solver.
    #[builder(default = 4)]
    pub newton_maxiter: usize,
    /// Error test failures tolerated on a single step.
    #[builder(default = 7)]
    pub max_error_test_failures: usize,
    /// Newton failures tolerated on a single step.
    #[builder(default = 10)]
    pub max_convergence_failures: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings::builder().build()
    }
}

impl Settings {
    /// Describe the first invalid field, if any.
    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.max_steps == 0 {
            return Err("max_steps must be positive".into());
        }
        if !(1..=5).contains(&self.max_order) {
            return Err(format!("max_order must be in 1..=5 (got {})", self.max_order));
        }
        if self.newton_maxiter == 0 {
            return Err("newton_maxiter must be positive".into());
        }
        if self.max_error_test_failures == 0 || self.max_convergence_failures == 0 {
            return Err("failure limits must be positive".into());
        }
        for (name, v) in [("h0", self.h0), ("hmax", self.hmax), ("hmin", self.hmin)] {
            if let Some(v) = v {
                if v.is_nan() || v <= 0.0 {
                    return Err(format!("{name} must be positive (got {v})"));
                }
            }
        }
        if let (Some(hmin), Some(hmax)) = (self.hmin, self.hmax) {
            if hmin > hmax {
                return Err(format!("hmin {hmin} exceeds hmax {hmax}"));
            }
        }
        Ok(())
    }
}
