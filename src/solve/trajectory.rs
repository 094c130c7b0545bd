//! Output tables of the integration entry points.

use crate::{Float, methods::result::Stats};

/// States sampled along the merged schedule.
///
/// Row `i` is `[t[i], y[i][0], .., y[i][n - 1]]`; row 0 is the initial
/// condition (after any jump scheduled at the first output time).
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub t: Vec<Float>,
    pub y: Vec<Vec<Float>>,
    pub stats: Stats,
}

impl Trajectory {
    pub(crate) fn with_capacity(rows: usize, stats: Stats) -> Self {
        Self {
            t: Vec::with_capacity(rows),
            y: Vec::with_capacity(rows),
            stats,
        }
    }

    pub(crate) fn push(&mut self, t: Float, y: &[Float]) {
        self.t.push(t);
        self.y.push(y.to_vec());
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    pub fn n_states(&self) -> usize {
        self.y.first().map_or(0, Vec::len)
    }

    /// Row `i` in table layout: time first, then the states.
    pub fn row(&self, i: usize) -> Option<Vec<Float>> {
        let y = self.y.get(i)?;
        let mut row = Vec::with_capacity(1 + y.len());
        row.push(self.t[i]);
        row.extend_from_slice(y);
        Some(row)
    }

    /// All rows in table layout.
    pub fn to_table(&self) -> Vec<Vec<Float>> {
        (0..self.len()).filter_map(|i| self.row(i)).collect()
    }

    /// History of one state.
    pub fn column(&self, state: usize) -> Option<Vec<Float>> {
        self.y.iter().map(|y| y.get(state).copied()).collect()
    }

    /// Iterate over `(t, y)` pairs.
    pub fn iter(&self) -> TrajectoryIter<'_> {
        TrajectoryIter {
            t_iter: self.t.iter(),
            y_iter: self.y.iter(),
        }
    }
}

/// Iterator over `(t, y)` rows of a [`Trajectory`].
pub struct TrajectoryIter<'a> {
    t_iter: std::slice::Iter<'a, Float>,
    y_iter: std::slice::Iter<'a, Vec<Float>>,
}

impl<'a> Iterator for TrajectoryIter<'a> {
    type Item = (Float, &'a [Float]);

    fn next(&mut self) -> Option<Self::Item> {
        match (self.t_iter.next(), self.y_iter.next()) {
            (Some(&t), Some(y)) => Some((t, y.as_slice())),
            _ => None,
        }
    }
}

impl<'a> IntoIterator for &'a Trajectory {
    type Item = (Float, &'a [Float]);
    type IntoIter = TrajectoryIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Forward sensitivities at every output time.
///
/// `sens[i]` holds `∂y/∂p` at `t[i]` with the states of parameter 0 first,
/// then parameter 1 and so on, so a table row is
/// `[t, ∂y_0/∂p_0, .., ∂y_{n-1}/∂p_0, ∂y_0/∂p_1, ..]`. The states themselves
/// are kept alongside in `states`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensitivityTable {
    pub t: Vec<Float>,
    pub states: Vec<Vec<Float>>,
    pub sens: Vec<Vec<Float>>,
    pub n_states: usize,
    pub n_params: usize,
    pub stats: Stats,
}

impl SensitivityTable {
    pub(crate) fn new(n_states: usize, n_params: usize, rows: usize) -> Self {
        Self {
            t: Vec::with_capacity(rows),
            states: Vec::with_capacity(rows),
            sens: Vec::with_capacity(rows),
            n_states,
            n_params,
            stats: Stats::default(),
        }
    }

    pub(crate) fn push(&mut self, t: Float, y: &[Float], per_param: &[Vec<Float>]) {
        self.t.push(t);
        self.states.push(y.to_vec());
        self.sens.push(per_param.concat());
    }

    pub fn len(&self) -> usize {
        self.t.len()
    }

    pub fn is_empty(&self) -> bool {
        self.t.is_empty()
    }

    /// Width of a table row, `1 + n_states·n_params`.
    pub fn width(&self) -> usize {
        1 + self.n_states * self.n_params
    }

    /// `∂y_state/∂p_param` at row `i`.
    pub fn sensitivity(&self, i: usize, state: usize, param: usize) -> Option<Float> {
        if state >= self.n_states || param >= self.n_params {
            return None;
        }
        self.sens.get(i).map(|row| row[param * self.n_states + state])
    }

    /// Row `i` in table layout.
    pub fn row(&self, i: usize) -> Option<Vec<Float>> {
        let sens = self.sens.get(i)?;
        let mut row = Vec::with_capacity(self.width());
        row.push(self.t[i]);
        row.extend_from_slice(sens);
        Some(row)
    }

    pub fn to_table(&self) -> Vec<Vec<Float>> {
        (0..self.len()).filter_map(|i| self.row(i)).collect()
    }
}
