//! Residual-form counterpart of the driver.

use crate::{
    Float,
    core::{
        adapter::{ResidualContext, residual_adapter},
        rhs::ResidualFunction,
    },
    error::{CheckFlag, Error, Step, check_alloc},
    methods::bdf::{Bdf, Mode, UserData},
};

use super::{
    driver::{Phase, attach, check_rtol, check_time_points},
    options::Options,
    trajectory::Trajectory,
};

/// Integrate `residual(t, y, y', p) = 0` from a consistent `(y0, y'0)`.
///
/// There is no jump handling and no sign constraint; the solver advances
/// through `time_points` in order.
pub fn integrate_dae<F>(
    time_points: &[Float],
    initial_value: &[Float],
    initial_rate: &[Float],
    residual: &F,
    parameters: &[Float],
    options: &Options,
) -> Result<Trajectory, Error>
where
    F: ResidualFunction,
{
    let mut phase = Phase::default();
    let result = run(
        time_points,
        initial_value,
        initial_rate,
        residual,
        parameters,
        options,
        &mut phase,
    );
    phase.settle(&result);
    result
}

fn run<F>(
    time_points: &[Float],
    initial_value: &[Float],
    initial_rate: &[Float],
    residual: &F,
    parameters: &[Float],
    options: &Options,
    phase: &mut Phase,
) -> Result<Trajectory, Error>
where
    F: ResidualFunction,
{
    check_time_points(time_points)?;
    if initial_value.len() != initial_rate.len() {
        return Err(Error::RateLength {
            value: initial_value.len(),
            rate: initial_rate.len(),
        });
    }
    check_rtol(options.rtol)?;
    residual.check_callable().map_err(Error::NotCallable)?;
    let n = initial_value.len();
    let atol = options.atol.broadcast(n)?;
    let t0 = time_points[0];

    let ctx = ResidualContext::new(residual, parameters);
    let mut solver = check_alloc(Step::Create, Bdf::create(n))?;
    solver
        .set_user_data(UserData::Residual(&ctx))
        .check(Step::SetUserData)?;
    solver
        .init_residual(residual_adapter, t0, initial_value, initial_rate)
        .check(Step::Init)?;
    attach(&mut solver, options.rtol, &atol, &options.settings)?;
    phase.enter(Phase::Configured);

    let mut trajectory = Trajectory::with_capacity(time_points.len(), Default::default());
    let mut y = initial_value.to_vec();
    let mut t_now = t0;
    trajectory.push(t0, &y);
    for &t in &time_points[1..] {
        if t > t_now {
            phase.enter(Phase::Running);
            t_now = solver.advance(t, &mut y, Mode::Normal).check(Step::Advance)?;
        }
        trajectory.push(t, &y);
    }

    trajectory.stats = solver.stats();
    log::info!(
        "integrated {} residual rows to t = {t_now}: {:?}",
        trajectory.len(),
        trajectory.stats
    );
    Ok(trajectory)
}
