//! Merging scheduled state jumps with the requested sampling times.
//!
//! Callers describe discontinuities as [`EventRecord`]s with a 1-based state
//! index. [`Schedule::merge`] turns them, together with the sampling times,
//! into one time-ordered list of [`ScheduleRow`]s that the integration
//! driver walks from start to end.

mod merge;

use crate::Float;

/// An instantaneous additive change of one state variable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventRecord {
    /// Target state, 1-based.
    pub state: i64,
    pub time: Float,
    pub delta: Float,
}

impl EventRecord {
    pub fn new(state: i64, time: Float, delta: Float) -> Self {
        Self { state, time, delta }
    }
}

impl From<(i64, Float, Float)> for EventRecord {
    fn from((state, time, delta): (i64, Float, Float)) -> Self {
        Self::new(state, time, delta)
    }
}

/// What happens at a schedule row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowKind {
    /// Record the state, nothing else.
    Sample,
    /// Add `delta` to state `state` (0-based), then record.
    Jump { state: usize, delta: Float },
}

/// One entry of the merged schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleRow {
    pub time: Float,
    pub kind: RowKind,
}

impl ScheduleRow {
    pub fn sample(time: Float) -> Self {
        Self {
            time,
            kind: RowKind::Sample,
        }
    }

    pub fn jump(state: usize, time: Float, delta: Float) -> Self {
        Self {
            time,
            kind: RowKind::Jump { state, delta },
        }
    }

    pub fn is_event(&self) -> bool {
        matches!(self.kind, RowKind::Jump { .. })
    }

    /// 0-based target state, or `-1` for a sampling row.
    pub fn state_index(&self) -> isize {
        match self.kind {
            RowKind::Sample => -1,
            RowKind::Jump { state, .. } => state as isize,
        }
    }

    /// Jump magnitude, zero for sampling rows.
    pub fn delta(&self) -> Float {
        match self.kind {
            RowKind::Sample => 0.0,
            RowKind::Jump { delta, .. } => delta,
        }
    }
}

/// Time-ordered output schedule.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    rows: Vec<ScheduleRow>,
}

impl Schedule {
    pub fn rows(&self) -> &[ScheduleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScheduleRow> {
        self.rows.iter()
    }

    /// Time of the first jump strictly after `t`.
    pub fn next_event_after(&self, t: Float) -> Option<Float> {
        self.rows
            .iter()
            .find(|row| row.is_event() && row.time > t)
            .map(|row| row.time)
    }
}

impl<'a> IntoIterator for &'a Schedule {
    type Item = &'a ScheduleRow;
    type IntoIter = std::slice::Iter<'a, ScheduleRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
