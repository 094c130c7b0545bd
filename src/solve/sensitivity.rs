//! Forward sensitivities of the explicit problem.

use crate::{
    Float,
    core::{adapter::RhsContext, rhs::RhsFunction},
    error::{CheckFlag, Error, Step},
    methods::bdf::{ErrorWeightFn, Mode, SensitivityMethod},
};

use super::{
    driver::{Phase, check_rtol, check_time_points, configure_rhs},
    options::Options,
    trajectory::SensitivityTable,
};

/// Integrate `dy/dt = rhs(t, y, p)` together with `∂y/∂p` for every parameter.
///
/// `method` selects the corrector strategy, `"STG"` (staggered) or `"SIM"`
/// (simultaneous), in any letter case. With `error_control` the
/// sensitivities take part in the local error test.
///
/// Sensitivities start at zero, so the first table row is all zeros after
/// the time column.
pub fn integrate_with_sensitivities<F>(
    time_points: &[Float],
    initial_state: &[Float],
    rhs: &F,
    parameters: &[Float],
    options: &Options,
    method: &str,
    error_control: bool,
) -> Result<SensitivityTable, Error>
where
    F: RhsFunction,
{
    let mut phase = Phase::default();
    let result = run(
        time_points,
        initial_state,
        rhs,
        parameters,
        options,
        method,
        error_control,
        &mut phase,
    );
    phase.settle(&result);
    result
}

#[allow(clippy::too_many_arguments)]
fn run<F>(
    time_points: &[Float],
    initial_state: &[Float],
    rhs: &F,
    parameters: &[Float],
    options: &Options,
    method: &str,
    error_control: bool,
    phase: &mut Phase,
) -> Result<SensitivityTable, Error>
where
    F: RhsFunction,
{
    check_time_points(time_points)?;
    check_rtol(options.rtol)?;
    let method: SensitivityMethod = method.parse()?;
    rhs.check_callable().map_err(Error::NotCallable)?;
    let n = initial_state.len();
    let n_params = parameters.len();
    let atol = options.atol.broadcast(n)?;
    let t0 = time_points[0];

    let ctx = RhsContext::new(rhs, parameters);
    let mut solver = configure_rhs(&ctx, t0, initial_state, &atol, options)?;

    let zeros = vec![vec![0.0; n]; n_params];
    solver
        .sens_init(n_params, method, &zeros)
        .check(Step::SensInit)?;
    let pbar: Vec<Float> = parameters
        .iter()
        .map(|p| if *p == 0.0 { 1.0 } else { p.abs() })
        .collect();
    solver.set_sens_params(&pbar).check(Step::SetSensParams)?;
    solver
        .set_sens_error_control(error_control)
        .check(Step::SetSensErrorControl)?;
    solver
        .set_error_weight_fn(error_weights(options.rtol, atol))
        .check(Step::SetErrorWeight)?;
    phase.enter(Phase::Configured);

    let mut table = SensitivityTable::new(n, n_params, time_points.len());
    let mut y = initial_state.to_vec();
    let mut sens = zeros;
    let mut t_now = t0;
    table.push(t0, &y, &sens);
    for &t in &time_points[1..] {
        if t > t_now {
            phase.enter(Phase::Running);
            t_now = solver.advance(t, &mut y, Mode::Normal).check(Step::Advance)?;
            solver.get_sens(t_now, &mut sens).check(Step::GetSens)?;
        }
        table.push(t, &y, &sens);
    }

    table.stats = solver.stats();
    log::info!(
        "integrated {} rows with {n_params} sensitivities ({method:?}): {:?}",
        table.len(),
        table.stats
    );
    Ok(table)
}

/// `w_i = 1 / (rtol·|y_i| + atol_i)`, failing on a non-positive denominator.
fn error_weights(rtol: Float, atol: Vec<Float>) -> ErrorWeightFn<'static> {
    Box::new(move |y: &[Float], w: &mut [Float]| {
        for (i, (wi, yi)) in w.iter_mut().zip(y).enumerate() {
            let denom = rtol * yi.abs() + atol[i];
            if denom <= 0.0 {
                return Err(i);
            }
            *wi = 1.0 / denom;
        }
        Ok(())
    })
}
