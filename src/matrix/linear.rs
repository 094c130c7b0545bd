//! Linear solves: A x = b via LU with partial pivoting.

use thiserror::Error;

use crate::Float;

use super::base::Matrix;

/// A zero pivot was met while factoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("singular matrix: zero pivot in column {column}")]
pub struct Singular {
    pub column: usize,
}

/// Dense direct solver. Factors once with [`setup`](Self::setup), then
/// solves any number of right-hand sides with [`solve`](Self::solve).
#[derive(Clone, Debug)]
pub struct DenseLinearSolver {
    n: usize,
    lu: Vec<Float>,
    pivots: Vec<usize>,
    factored: bool,
}

impl DenseLinearSolver {
    /// Solver for systems shaped like `template`, with vectors of length `n`.
    ///
    /// Returns `None` when the template is not square or does not match `n`.
    pub fn new(n: usize, template: &Matrix) -> Option<Self> {
        if n == 0 || !template.is_square() || template.nrows() != n {
            return None;
        }
        Some(Self {
            n,
            lu: vec![0.0; n * n],
            pivots: (0..n).collect(),
            factored: false,
        })
    }

    pub fn dim(&self) -> usize {
        self.n
    }

    /// Factor `a` in place of the previous factorization.
    pub fn setup(&mut self, a: &Matrix) -> Result<(), Singular> {
        let n = self.n;
        debug_assert_eq!(a.nrows(), n);
        self.factored = false;
        self.lu.copy_from_slice(&a.data[0..n * n]);
        let lu = &mut self.lu;

        for k in 0..n {
            // pivot
            let mut pivot_row = k;
            let mut pivot_val = lu[k * n + k].abs();
            for i in (k + 1)..n {
                let val = lu[i * n + k].abs();
                if val > pivot_val {
                    pivot_val = val;
                    pivot_row = i;
                }
            }
            if pivot_val == 0.0 || !pivot_val.is_finite() {
                return Err(Singular { column: k });
            }
            self.pivots[k] = pivot_row;
            if pivot_row != k {
                for j in 0..n {
                    lu.swap(k * n + j, pivot_row * n + j);
                }
            }
            // Eliminate below the pivot
            let akk = lu[k * n + k];
            for i in (k + 1)..n {
                let factor = lu[i * n + k] / akk;
                lu[i * n + k] = factor;
                for j in (k + 1)..n {
                    lu[i * n + j] -= factor * lu[k * n + j];
                }
            }
        }
        self.factored = true;
        Ok(())
    }

    pub fn is_factored(&self) -> bool {
        self.factored
    }

    /// In-place solve: overwrites `b` with `x`. Requires a successful `setup`.
    pub fn solve(&self, b: &mut [Float]) {
        let n = self.n;
        debug_assert!(self.factored);
        debug_assert_eq!(b.len(), n);
        let lu = &self.lu;

        for k in 0..n {
            let p = self.pivots[k];
            if p != k {
                b.swap(k, p);
            }
        }
        // Forward solve Ly = Pb
        for i in 0..n {
            let mut sum = b[i];
            for k in 0..i {
                sum -= lu[i * n + k] * b[k];
            }
            b[i] = sum;
        }
        // Backward solve Ux = y
        for i in (0..n).rev() {
            let mut sum = b[i];
            for k in (i + 1)..n {
                sum -= lu[i * n + k] * b[k];
            }
            b[i] = sum / lu[i * n + i];
        }
    }
}
