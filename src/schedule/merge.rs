use crate::{Float, error::Error};

use super::{EventRecord, Schedule, ScheduleRow};

impl Schedule {
    /// Combine jumps and sampling times into one ascending schedule.
    ///
    /// - Rows are sorted by time with a stable sort; jumps are placed before
    ///   sampling rows, so at equal times jumps come first and keep their
    ///   input order.
    /// - A sampling row whose time equals the time of the row emitted just
    ///   before it, when that row is a jump, is dropped. The jump row already
    ///   records the post-jump state at that instant.
    /// - With no jumps the schedule is just the sampling times.
    ///
    /// Event targets are converted from 1-based to 0-based and must lie in
    /// `1..=n_states`.
    pub fn merge(
        events: &[EventRecord],
        sampling: &[Float],
        n_states: usize,
    ) -> Result<Schedule, Error> {
        let mut combined = Vec::with_capacity(events.len() + sampling.len());
        for (record, event) in events.iter().enumerate() {
            if event.state < 1 || event.state as u64 > n_states as u64 {
                return Err(Error::EventTarget {
                    record,
                    index: event.state,
                    n_states,
                });
            }
            if !event.time.is_finite() {
                return Err(Error::NonFiniteTime {
                    what: "event time",
                    index: record,
                    value: event.time,
                });
            }
            combined.push(ScheduleRow::jump(
                (event.state - 1) as usize,
                event.time,
                event.delta,
            ));
        }
        combined.extend(sampling.iter().map(|&t| ScheduleRow::sample(t)));
        combined.sort_by(|a, b| a.time.total_cmp(&b.time));

        let mut rows: Vec<ScheduleRow> = Vec::with_capacity(combined.len());
        for row in combined {
            let shadowed = !row.is_event()
                && rows
                    .last()
                    .is_some_and(|prev| prev.is_event() && prev.time == row.time);
            if !shadowed {
                rows.push(row);
            }
        }
        Ok(Schedule { rows })
    }
}
