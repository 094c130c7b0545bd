//! Event-aware integration driver.
//!
//! One call walks the merged schedule from the first output time to the
//! last. Between rows the solver advances in normal mode, never past the
//! next scheduled jump. At a jump row the delta is added to the target state
//! and the solver is re-initialized from the updated state before it moves
//! on; the row records the post-jump state.
//!
//! The solver and the context it calls back into live on this function's
//! stack, so both are released on every exit path.

use crate::{
    Float,
    core::{
        adapter::{RhsContext, rhs_adapter},
        rhs::RhsFunction,
    },
    error::{CheckFlag, Error, Step, check_alloc},
    matrix::{DenseLinearSolver, Matrix},
    methods::{
        bdf::{Bdf, Mode, UserData},
        settings::Settings,
    },
    schedule::{EventRecord, RowKind, Schedule},
};

use super::{options::Options, trajectory::Trajectory};

/// Where a driver call stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    #[default]
    Uninitialized,
    Configured,
    Running,
    ApplyingEvent,
    Done,
    Failed,
}

impl Phase {
    pub(crate) fn enter(&mut self, next: Phase) {
        if *self != next {
            log::debug!("driver {self:?} -> {next:?}");
            *self = next;
        }
    }

    /// Final transition once the call has an outcome.
    pub(crate) fn settle<T>(&mut self, result: &Result<T, Error>) {
        self.enter(if result.is_ok() { Phase::Done } else { Phase::Failed });
    }
}

/// Integrate `dy/dt = rhs(t, y, parameters)` and sample at `time_points`.
///
/// Row 0 of the returned trajectory is the initial condition at
/// `time_points[0]`, then one row per remaining time point.
///
/// # Errors
///
/// Input errors ([`Error::is_input`]) before the solver is created, or the
/// failing lifecycle [`Step`] with the solver's flag.
pub fn integrate<F>(
    time_points: &[Float],
    initial_state: &[Float],
    rhs: &F,
    parameters: &[Float],
    options: &Options,
) -> Result<Trajectory, Error>
where
    F: RhsFunction,
{
    integrate_with_events(time_points, initial_state, rhs, parameters, &[], options)
}

/// Integrate with scheduled state jumps.
///
/// `events` are 1-based `(state, time, delta)` records. They are merged with
/// `time_points` by [`Schedule::merge`] and the trajectory has one row per
/// merged row. Jumps at the first output time shape the initial condition;
/// jumps before it are rejected.
pub fn integrate_with_events<F>(
    time_points: &[Float],
    initial_state: &[Float],
    rhs: &F,
    parameters: &[Float],
    events: &[EventRecord],
    options: &Options,
) -> Result<Trajectory, Error>
where
    F: RhsFunction,
{
    let mut phase = Phase::default();
    let result = run(time_points, initial_state, rhs, parameters, events, options, &mut phase);
    phase.settle(&result);
    result
}

fn run<F>(
    time_points: &[Float],
    initial_state: &[Float],
    rhs: &F,
    parameters: &[Float],
    events: &[EventRecord],
    options: &Options,
    phase: &mut Phase,
) -> Result<Trajectory, Error>
where
    F: RhsFunction,
{
    check_time_points(time_points)?;
    check_rtol(options.rtol)?;
    rhs.check_callable().map_err(Error::NotCallable)?;
    let n = initial_state.len();
    let atol = options.atol.broadcast(n)?;
    let schedule = Schedule::merge(events, time_points, n)?;
    let t0 = time_points[0];
    if let Some((record, event)) = events.iter().enumerate().find(|(_, e)| e.time < t0) {
        return Err(Error::EventBeforeStart {
            record,
            time: event.time,
            start: t0,
        });
    }

    let rows = schedule.rows();
    let mut trajectory = Trajectory::with_capacity(rows.len(), Default::default());
    let mut y = initial_state.to_vec();

    let leading = rows
        .iter()
        .take_while(|row| row.time == t0 && row.is_event())
        .count();
    for row in &rows[..leading] {
        if let RowKind::Jump { state, delta } = row.kind {
            y[state] += delta;
            log::trace!("initial jump of {delta} on state {state}");
        }
        trajectory.push(row.time, &y);
    }

    let ctx = RhsContext::new(rhs, parameters);
    let mut solver = configure_rhs(&ctx, t0, &y, &atol, options)?;
    phase.enter(Phase::Configured);

    let mut t_now = t0;
    let mut reinit_pending = false;
    for row in &rows[leading..] {
        if row.time > t_now {
            if reinit_pending {
                solver.reinit(t_now, &y).check(Step::ReInit)?;
                reinit_pending = false;
            }
            if let Some(t_stop) = schedule.next_event_after(t_now) {
                solver.set_stop_time(t_stop).check(Step::SetStopTime)?;
            }
            phase.enter(Phase::Running);
            t_now = solver
                .advance(row.time, &mut y, Mode::Normal)
                .check(Step::Advance)?;
        }
        if let RowKind::Jump { state, delta } = row.kind {
            phase.enter(Phase::ApplyingEvent);
            y[state] += delta;
            reinit_pending = true;
            log::trace!("jump of {delta} on state {state} at t = {t_now}");
        }
        trajectory.push(row.time, &y);
    }

    trajectory.stats = solver.stats();
    log::info!(
        "integrated {} rows to t = {t_now}: {:?}",
        trajectory.len(),
        trajectory.stats
    );
    Ok(trajectory)
}

/// Reject empty, non-finite or decreasing output times.
pub(crate) fn check_time_points(time_points: &[Float]) -> Result<(), Error> {
    if time_points.is_empty() {
        return Err(Error::EmptyTimePoints);
    }
    for (index, &value) in time_points.iter().enumerate() {
        if !value.is_finite() {
            return Err(Error::NonFiniteTime {
                what: "time point",
                index,
                value,
            });
        }
        if index > 0 && value < time_points[index - 1] {
            return Err(Error::UnsortedTimePoints {
                index,
                previous: time_points[index - 1],
                value,
            });
        }
    }
    Ok(())
}

pub(crate) fn check_rtol(rtol: Float) -> Result<(), Error> {
    if !rtol.is_finite() || rtol < 0.0 {
        return Err(Error::RelativeTolerance(rtol));
    }
    Ok(())
}

/// Create and configure a solver for an explicit right-hand side.
pub(crate) fn configure_rhs<'a>(
    ctx: &'a RhsContext<'a>,
    t0: Float,
    y0: &[Float],
    atol: &[Float],
    options: &Options,
) -> Result<Bdf<'a>, Error> {
    let n = y0.len();
    let mut solver = check_alloc(Step::Create, Bdf::create(n))?;
    solver.set_user_data(UserData::Rhs(ctx)).check(Step::SetUserData)?;
    solver.init_rhs(rhs_adapter, t0, y0).check(Step::Init)?;
    attach(&mut solver, options.rtol, atol, &options.settings)?;
    if options.non_negative {
        solver.set_constraints(&vec![true; n]).check(Step::SetConstraints)?;
    }
    Ok(solver)
}

/// Tolerances, dense linear algebra and step settings.
pub(crate) fn attach(
    solver: &mut Bdf<'_>,
    rtol: Float,
    atol: &[Float],
    settings: &Settings,
) -> Result<(), Error> {
    let n = solver.n_equations();
    solver.set_tolerances(rtol, atol).check(Step::SetTolerances)?;
    let matrix = check_alloc(Step::DenseMatrix, Matrix::dense(n, n))?;
    let linsol = check_alloc(Step::DenseLinearSolver, DenseLinearSolver::new(n, &matrix))?;
    solver.set_linear_solver(linsol, matrix).check(Step::SetLinearSolver)?;
    solver.set_settings(settings.clone()).check(Step::SetSettings)
}
