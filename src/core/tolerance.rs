//! Scalar or per-state absolute tolerances.

use std::ops::Index;

use crate::{Float, error::Error};

/// Tolerance enum to allow scalar or vector tolerances
/// using [`Into`] trait for easy conversion from `Float`, `[Float; N]`, or `Vec<Float>`.
#[derive(Clone, Debug, PartialEq)]
pub enum Tolerance {
    Scalar(Float),
    Vector(Vec<Float>),
}

impl Tolerance {
    /// Expand to one entry per state.
    ///
    /// A scalar or a single-entry vector is repeated `n` times; any other
    /// vector must already have length `n`. Entries must be finite and
    /// non-negative.
    pub fn broadcast(&self, n: usize) -> Result<Vec<Float>, Error> {
        if let Tolerance::Vector(v) = self {
            if v.len() == 1 {
                return Tolerance::Scalar(v[0]).broadcast(n);
            }
            if v.len() != n {
                return Err(Error::ToleranceShape {
                    expected: n,
                    actual: v.len(),
                });
            }
        }
        let atol: Vec<Float> = (0..n).map(|i| self[i]).collect();
        if let Some((index, &value)) = atol
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(Error::AbsoluteTolerance { index, value });
        }
        Ok(atol)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Scalar(1e-4)
    }
}

impl From<Float> for Tolerance {
    fn from(val: Float) -> Self {
        Tolerance::Scalar(val)
    }
}

impl From<&[Float]> for Tolerance {
    fn from(val: &[Float]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl<const N: usize> From<[Float; N]> for Tolerance {
    fn from(val: [Float; N]) -> Self {
        Tolerance::Vector(val.to_vec())
    }
}

impl From<Vec<Float>> for Tolerance {
    fn from(val: Vec<Float>) -> Self {
        Tolerance::Vector(val)
    }
}

impl Index<usize> for Tolerance {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        match self {
            Tolerance::Scalar(v) => v,
            Tolerance::Vector(vs) => &vs[index],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_repeats_for_every_state() {
        let atol = Tolerance::from(1e-6).broadcast(3).unwrap();
        assert_eq!(atol, vec![1e-6; 3]);
    }

    #[test]
    fn vector_passes_through() {
        let atol = Tolerance::from([1e-8, 1e-14, 1e-6]).broadcast(3).unwrap();
        assert_eq!(atol, vec![1e-8, 1e-14, 1e-6]);
    }

    #[test]
    fn single_entry_vector_broadcasts() {
        assert_eq!(Tolerance::from(vec![1e-3]).broadcast(2).unwrap(), vec![1e-3; 2]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let err = Tolerance::from(vec![1e-6, 1e-6]).broadcast(3).unwrap_err();
        assert!(matches!(err, Error::ToleranceShape { expected: 3, actual: 2 }));
    }

    #[test]
    fn negative_entry_is_rejected() {
        let err = Tolerance::from(vec![1e-6, -1.0]).broadcast(2).unwrap_err();
        assert!(matches!(err, Error::AbsoluteTolerance { index: 1, .. }));
    }
}
