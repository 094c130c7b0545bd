//! Variable-order Backward Differentiation Formulas (BDF) for stiff systems.
//!
//! The integrator works on the residual form `F(t, y, y') = 0`; an explicit
//! ODE `y' = f(t, y)` is handled as `F = y' − f`. Orders 1 to 5 are used with
//! a quasi-constant step size, the history being kept as a backward
//! difference array that is rescaled whenever the step changes.
//!
//! [`Bdf`] exposes a create / configure / advance / re-initialize lifecycle.
//! Every fallible call returns a [`SolverFlag`](crate::status::SolverFlag).
//!
//! Reference: Shampine & Reichelt, "The MATLAB ODE Suite" (1997);
//! Byrne & Hindmarsh, "A polyalgorithm for the numerical solution of ODEs" (1975).

mod sens;
mod solver;
mod step;

use std::str::FromStr;

use crate::{Float, core::interpolate::Interpolate, error::Error};

pub use solver::{Bdf, ErrorWeightFn, UserData};

pub(crate) const MAX_ORDER: usize = 5;
const MIN_FACTOR: Float = 0.2;
const MAX_FACTOR: Float = 10.0;

/// How far [`Bdf::advance`] goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Step past the output time and interpolate back to it.
    Normal,
    /// Take a single internal step and return its end point.
    OneStep,
}

/// Corrector strategy for forward sensitivities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensitivityMethod {
    /// State corrector converges first, then the sensitivity correctors.
    #[default]
    Staggered,
    /// One corrector over state and sensitivities together.
    Simultaneous,
}

impl FromStr for SensitivityMethod {
    type Err = Error;

    /// Accepts `STG` or `SIM` in any letter case.
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        if token.eq_ignore_ascii_case("stg") {
            Ok(SensitivityMethod::Staggered)
        } else if token.eq_ignore_ascii_case("sim") {
            Ok(SensitivityMethod::Simultaneous)
        } else {
            Err(Error::SensitivityMethod(token.to_string()))
        }
    }
}

/// `γ_k = Σ_{j=1..k} 1/j`; with zero κ this is also `α_k`.
fn gamma(k: usize) -> Float {
    (1..=k).map(|j| 1.0 / j as Float).sum()
}

fn error_const(k: usize) -> Float {
    1.0 / (k as Float + 1.0)
}

/// Weighted root-mean-square norm.
pub(crate) fn wrms(v: &[Float], w: &[Float]) -> Float {
    if v.is_empty() {
        return 0.0;
    }
    let sum: Float = v.iter().zip(w).map(|(vi, wi)| (vi * wi) * (vi * wi)).sum();
    (sum / v.len() as Float).sqrt()
}

fn compute_r(order: usize, factor: Float) -> Vec<Vec<Float>> {
    let n = order + 1;
    let mut m = vec![vec![0.0; n]; n];
    m[0].fill(1.0);
    for (i, row) in m.iter_mut().enumerate().skip(1) {
        for (j, v) in row.iter_mut().enumerate().skip(1) {
            *v = (i as Float - 1.0 - factor * j as Float) / i as Float;
        }
    }
    for i in 1..n {
        for j in 0..n {
            m[i][j] *= m[i - 1][j];
        }
    }
    m
}

/// Rescale the first `order + 1` differences for a step multiplied by `factor`.
pub(crate) fn change_d(d: &mut [Vec<Float>], order: usize, factor: Float) {
    let n = order + 1;
    let r = compute_r(order, factor);
    let u = compute_r(order, 1.0);
    let mut ru = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            ru[i][j] = (0..n).map(|k| r[i][k] * u[k][j]).sum();
        }
    }
    let old: Vec<Vec<Float>> = d[..n].to_vec();
    for (i, row) in d[..n].iter_mut().enumerate() {
        row.fill(0.0);
        for (k, old_row) in old.iter().enumerate() {
            let coef = ru[k][i];
            if coef != 0.0 {
                for (x, o) in row.iter_mut().zip(old_row) {
                    *x += coef * o;
                }
            }
        }
    }
}

/// Dense output of the last step: the interpolating polynomial held by the
/// difference array, for the components starting at `offset`.
pub(crate) struct BdfInterpolant<'b> {
    pub t: Float,
    pub h: Float,
    pub order: usize,
    pub d: &'b [Vec<Float>],
    pub offset: usize,
}

impl Interpolate for BdfInterpolant<'_> {
    fn interpolate(&self, xi: Float, yi: &mut [Float]) {
        let range = self.offset..self.offset + yi.len();
        yi.copy_from_slice(&self.d[0][range.clone()]);
        let mut p = 1.0;
        for k in 0..self.order {
            let shift = self.t - self.h * k as Float;
            let denom = self.h * (k + 1) as Float;
            p *= (xi - shift) / denom;
            for (y, dk) in yi.iter_mut().zip(&self.d[k + 1][range.clone()]) {
                *y += dk * p;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn method_tokens_ignore_case() {
        for token in ["STG", "stg", "Stg"] {
            assert_eq!(token.parse::<SensitivityMethod>().unwrap(), SensitivityMethod::Staggered);
        }
        for token in ["SIM", "sim", "sIm"] {
            assert_eq!(token.parse::<SensitivityMethod>().unwrap(), SensitivityMethod::Simultaneous);
        }
        assert!(matches!(
            "FOO".parse::<SensitivityMethod>(),
            Err(Error::SensitivityMethod(t)) if t == "FOO"
        ));
    }

    #[test]
    fn unit_factor_leaves_differences_unchanged() {
        let mut d = vec![vec![1.0, 2.0], vec![0.5, -0.25], vec![0.1, 0.2], vec![0.0; 2]];
        let before = d.clone();
        change_d(&mut d, 2, 1.0);
        for (row, old) in d.iter().zip(&before) {
            for (a, b) in row.iter().zip(old) {
                assert_relative_eq!(*a, *b, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn halving_a_linear_history() {
        // y(t) = 1 + t sampled with h = 1: D0 = 1, D1 = h·y' = 1.
        let mut d = vec![vec![1.0], vec![1.0], vec![0.0]];
        change_d(&mut d, 1, 0.5);
        assert_relative_eq!(d[0][0], 1.0);
        assert_relative_eq!(d[1][0], 0.5);
    }

    #[test]
    fn interpolant_reproduces_the_history() {
        // Quadratic y(t) = t², current t = 2, h = 1, order 2:
        // D0 = y(2) = 4, D1 = y(2) - y(1) = 3, D2 = D1 - (y(1) - y(0)) = 2.
        let d = vec![vec![4.0], vec![3.0], vec![2.0]];
        let interp = BdfInterpolant { t: 2.0, h: 1.0, order: 2, d: &d, offset: 0 };
        let mut y = [0.0];
        for t in [0.0, 0.5, 1.0, 1.5, 2.0] {
            interp.interpolate(t, &mut y);
            assert_relative_eq!(y[0], t * t, epsilon = 1e-12);
        }
    }

    #[test]
    fn wrms_of_unit_weights() {
        assert_relative_eq!(wrms(&[3.0, 4.0], &[1.0, 1.0]), (12.5 as Float).sqrt());
        assert_eq!(wrms(&[], &[]), 0.0);
        assert_relative_eq!(gamma(3), 1.0 + 0.5 + 1.0 / 3.0);
        assert_relative_eq!(error_const(1), 0.5);
    }
}
