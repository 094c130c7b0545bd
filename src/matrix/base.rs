//! Row-major dense storage.

use std::ops::{Index, IndexMut};

use crate::Float;

/// Dense `nrows × ncols` matrix stored row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    pub(crate) n: usize,
    pub(crate) m: usize,
    pub(crate) data: Vec<Float>,
}

impl Matrix {
    /// Zero-filled matrix. Returns `None` for an empty shape.
    pub fn dense(n: usize, m: usize) -> Option<Self> {
        if n == 0 || m == 0 {
            return None;
        }
        Some(Self::zeros(n, m))
    }

    pub fn zeros(n: usize, m: usize) -> Self {
        Self {
            n,
            m,
            data: vec![0.0; n * m],
        }
    }

    pub fn identity(n: usize) -> Self {
        let mut id = Self::zeros(n, n);
        for i in 0..n {
            id[(i, i)] = 1.0;
        }
        id
    }

    pub fn nrows(&self) -> usize {
        self.n
    }

    pub fn ncols(&self) -> usize {
        self.m
    }

    pub fn is_square(&self) -> bool {
        self.n == self.m
    }

    /// Overwrite with `a·x + b·y`.
    pub(crate) fn assign_combination(&mut self, a: Float, x: &Matrix, b: Float, y: &Matrix) {
        for ((out, xi), yi) in self.data.iter_mut().zip(&x.data).zip(&y.data) {
            *out = a * xi + b * yi;
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = Float;

    fn index(&self, (i, j): (usize, usize)) -> &Float {
        &self.data[i * self.m + j]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Float {
        &mut self.data[i * self.m + j]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_shape_has_no_memory() {
        assert!(Matrix::dense(0, 3).is_none());
        assert!(Matrix::dense(2, 2).is_some());
    }

    #[test]
    fn combination_of_identity_and_matrix() {
        let mut j = Matrix::zeros(2, 2);
        j[(0, 1)] = 3.0;
        let mut out = Matrix::zeros(2, 2);
        out.assign_combination(2.0, &j, 1.0, &Matrix::identity(2));
        assert_eq!(out.data, vec![1.0, 6.0, 0.0, 1.0]);
    }
}
