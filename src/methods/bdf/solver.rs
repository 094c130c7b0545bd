//! Solver memory and its lifecycle calls.

use crate::{
    Float,
    core::{
        adapter::{ResidualCallback, ResidualContext, RhsCallback, RhsContext},
        interpolate::Interpolate,
    },
    matrix::{DenseLinearSolver, Matrix},
    methods::{result::Stats, settings::Settings},
    status::SolverFlag,
};

use super::{BdfInterpolant, MAX_ORDER, Mode, SensitivityMethod};

const MIN_RTOL: Float = 100.0 * Float::EPSILON;

/// Custom error weights: fill `w` from `y`, or report the offending index.
pub type ErrorWeightFn<'a> = Box<dyn Fn(&[Float], &mut [Float]) -> Result<(), usize> + 'a>;

/// Context handed back to the native callback on every evaluation.
#[derive(Clone, Copy)]
pub enum UserData<'a> {
    Rhs(&'a RhsContext<'a>),
    Residual(&'a ResidualContext<'a>),
}

#[derive(Clone, Copy)]
pub(super) enum Callback {
    Rhs(RhsCallback),
    Residual(ResidualCallback),
}

pub(super) struct Sensitivity {
    pub n_params: usize,
    pub method: SensitivityMethod,
    pub pbar: Vec<Float>,
    pub error_control: bool,
}

/// Variable-order BDF solver memory.
///
/// Fields are declared in release order: state vectors, tolerances, dense
/// matrices, linear solver, then the handle itself.
pub struct Bdf<'a> {
    /// Backward differences, `MAX_ORDER + 3` rows over state and sensitivities.
    pub(super) d: Vec<Vec<Float>>,
    /// Starting point set by `init` / `reinit`, sensitivities appended.
    pub(super) y0: Vec<Float>,
    /// Starting slope of residual problems.
    pub(super) yp0: Vec<Float>,

    pub(super) rtol: Float,
    pub(super) atol: Vec<Float>,
    pub(super) weight_fn: Option<ErrorWeightFn<'a>>,
    pub(super) constraints: Option<Vec<bool>>,

    pub(super) matrix: Option<Matrix>,
    pub(super) jac_y: Option<Matrix>,
    pub(super) jac_yp: Option<Matrix>,

    pub(super) linsol: Option<DenseLinearSolver>,

    pub(super) n: usize,
    pub(super) callback: Option<Callback>,
    pub(super) user_data: Option<UserData<'a>>,
    pub(super) sens: Option<Sensitivity>,
    pub(super) settings: Settings,
    pub(super) t: Float,
    pub(super) t_old: Option<Float>,
    pub(super) h_abs: Float,
    pub(super) order: usize,
    pub(super) n_equal_steps: usize,
    pub(super) started: bool,
    pub(super) lu_valid: bool,
    pub(super) tolerances_set: bool,
    pub(super) stop_time: Option<Float>,
    pub(super) stats: Stats,
}

impl<'a> Bdf<'a> {
    /// Allocate solver memory for `n` equations. Returns `None` when `n == 0`.
    pub fn create(n: usize) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Some(Self {
            d: vec![vec![0.0; n]; MAX_ORDER + 3],
            y0: vec![0.0; n],
            yp0: Vec::new(),
            rtol: 0.0,
            atol: Vec::new(),
            weight_fn: None,
            constraints: None,
            matrix: None,
            jac_y: None,
            jac_yp: None,
            linsol: None,
            n,
            callback: None,
            user_data: None,
            sens: None,
            settings: Settings::default(),
            t: 0.0,
            t_old: None,
            h_abs: 0.0,
            order: 1,
            n_equal_steps: 0,
            started: false,
            lu_valid: false,
            tolerances_set: false,
            stop_time: None,
            stats: Stats::default(),
        })
    }

    pub fn set_user_data(&mut self, data: UserData<'a>) -> Result<(), SolverFlag> {
        self.user_data = Some(data);
        Ok(())
    }

    /// Initialize an explicit ODE `y' = f(t, y)` at `(t0, y0)`.
    pub fn init_rhs(&mut self, f: RhsCallback, t0: Float, y0: &[Float]) -> Result<(), SolverFlag> {
        self.check_start(t0, y0)?;
        self.callback = Some(Callback::Rhs(f));
        self.reset(t0, y0);
        Ok(())
    }

    /// Initialize an implicit system `F(t, y, y') = 0` at `(t0, y0, yp0)`.
    ///
    /// `(y0, yp0)` must be consistent; no correction is attempted.
    pub fn init_residual(
        &mut self,
        f: ResidualCallback,
        t0: Float,
        y0: &[Float],
        yp0: &[Float],
    ) -> Result<(), SolverFlag> {
        self.check_start(t0, y0)?;
        if yp0.len() != self.n {
            return Err(SolverFlag::IllInput(format!(
                "initial rate has length {}, expected {}",
                yp0.len(),
                self.n
            )));
        }
        self.callback = Some(Callback::Residual(f));
        self.yp0 = yp0.to_vec();
        self.reset(t0, y0);
        Ok(())
    }

    /// Scalar relative and per-state absolute tolerances.
    pub fn set_tolerances(&mut self, rtol: Float, atol: &[Float]) -> Result<(), SolverFlag> {
        if atol.len() != self.n {
            return Err(SolverFlag::IllInput(format!(
                "absolute tolerance has length {}, expected {}",
                atol.len(),
                self.n
            )));
        }
        if !rtol.is_finite() || rtol < 0.0 {
            return Err(SolverFlag::IllInput(format!("rtol must be non-negative (got {rtol})")));
        }
        if let Some(bad) = atol.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(SolverFlag::IllInput(format!("atol must be non-negative (got {bad})")));
        }
        if rtol < MIN_RTOL {
            log::warn!("rtol {rtol} is too small, using {MIN_RTOL}");
        }
        self.rtol = rtol.max(MIN_RTOL);
        self.atol = atol.to_vec();
        self.tolerances_set = true;
        Ok(())
    }

    /// Replace the default error weights `1 / (rtol·|y| + atol)`.
    pub fn set_error_weight_fn(&mut self, f: ErrorWeightFn<'a>) -> Result<(), SolverFlag> {
        self.weight_fn = Some(f);
        Ok(())
    }

    /// Attach the dense linear solver and its matrix workspace.
    pub fn set_linear_solver(
        &mut self,
        linsol: DenseLinearSolver,
        matrix: Matrix,
    ) -> Result<(), SolverFlag> {
        if linsol.dim() != self.n || matrix.nrows() != self.n || !matrix.is_square() {
            return Err(SolverFlag::IllInput(format!(
                "linear solver of dimension {} for {} equations",
                linsol.dim(),
                self.n
            )));
        }
        self.linsol = Some(linsol);
        self.matrix = Some(matrix);
        self.lu_valid = false;
        Ok(())
    }

    /// Mark components that must stay non-negative.
    pub fn set_constraints(&mut self, non_negative: &[bool]) -> Result<(), SolverFlag> {
        if non_negative.len() != self.n {
            return Err(SolverFlag::IllInput(format!(
                "constraint mask has length {}, expected {}",
                non_negative.len(),
                self.n
            )));
        }
        self.constraints = non_negative.iter().any(|&c| c).then(|| non_negative.to_vec());
        Ok(())
    }

    pub fn set_settings(&mut self, settings: Settings) -> Result<(), SolverFlag> {
        settings.validate().map_err(SolverFlag::IllInput)?;
        if self.order > settings.max_order {
            self.order = settings.max_order;
        }
        self.settings = settings;
        Ok(())
    }

    /// The solver will not step past `t_stop`. Cleared once reached.
    pub fn set_stop_time(&mut self, t_stop: Float) -> Result<(), SolverFlag> {
        if !t_stop.is_finite() || t_stop < self.t {
            return Err(SolverFlag::IllInput(format!(
                "stop time {t_stop} is behind the current time {}",
                self.t
            )));
        }
        self.stop_time = Some(t_stop);
        Ok(())
    }

    /// Enable forward sensitivities with respect to `n_params` parameters,
    /// starting from `s0` (one state-sized vector per parameter).
    pub fn sens_init(
        &mut self,
        n_params: usize,
        method: SensitivityMethod,
        s0: &[Vec<Float>],
    ) -> Result<(), SolverFlag> {
        match self.callback {
            Some(Callback::Rhs(_)) => {}
            Some(Callback::Residual(_)) => {
                return Err(SolverFlag::IllInput(
                    "sensitivities require an explicit right-hand side".into(),
                ));
            }
            None => return Err(SolverFlag::NotInitialized),
        }
        if n_params == 0 || s0.len() != n_params || s0.iter().any(|s| s.len() != self.n) {
            return Err(SolverFlag::IllInput(format!(
                "initial sensitivities must be {n_params} vectors of length {}",
                self.n
            )));
        }
        let mut y0 = self.y0[..self.n].to_vec();
        for s in s0 {
            y0.extend_from_slice(s);
        }
        self.sens = Some(Sensitivity {
            n_params,
            method,
            pbar: vec![1.0; n_params],
            error_control: true,
        });
        let t0 = self.t;
        self.reset(t0, &y0);
        Ok(())
    }

    /// Scaling factors `p̄` of the sensitivity parameters.
    pub fn set_sens_params(&mut self, pbar: &[Float]) -> Result<(), SolverFlag> {
        let sens = self.sens.as_mut().ok_or(SolverFlag::NoSensitivities)?;
        if pbar.len() != sens.n_params || pbar.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(SolverFlag::IllInput(
                "parameter scales must be positive, one per parameter".into(),
            ));
        }
        sens.pbar = pbar.to_vec();
        Ok(())
    }

    /// Include sensitivities in the local error test.
    pub fn set_sens_error_control(&mut self, error_control: bool) -> Result<(), SolverFlag> {
        let sens = self.sens.as_mut().ok_or(SolverFlag::NoSensitivities)?;
        sens.error_control = error_control;
        Ok(())
    }

    /// Integrate towards `tout` and write the state there into `yout`.
    ///
    /// Returns the time actually reached: `tout`, or the stop time when it
    /// comes first (normal mode), or the end of the internal step (one-step mode).
    pub fn advance(&mut self, tout: Float, yout: &mut [Float], mode: Mode) -> Result<Float, SolverFlag> {
        if self.callback.is_none() {
            return Err(SolverFlag::NotInitialized);
        }
        if self.linsol.is_none() || self.matrix.is_none() {
            return Err(SolverFlag::LinearSolverMissing);
        }
        if yout.len() != self.n || !tout.is_finite() {
            return Err(SolverFlag::IllInput(format!(
                "output buffer of length {} at t = {tout}",
                yout.len()
            )));
        }

        if !self.started {
            if tout == self.t && mode == Mode::Normal {
                yout.copy_from_slice(&self.y0[..self.n]);
                return Ok(self.t);
            }
            if tout <= self.t {
                return Err(SolverFlag::BadTime {
                    tout,
                    t_lo: self.t,
                    t_hi: Float::INFINITY,
                });
            }
            self.start(tout)?;
        }

        match mode {
            Mode::Normal => {
                let t_lo = self.t_old.unwrap_or(self.t);
                if tout < t_lo - self.fuzz() {
                    return Err(SolverFlag::BadTime {
                        tout,
                        t_lo,
                        t_hi: self.t,
                    });
                }
                let mut steps = 0;
                while self.t < tout && !self.at_stop_time() {
                    if steps >= self.settings.max_steps {
                        return Err(SolverFlag::TooMuchWork { t: self.t, steps });
                    }
                    self.step()?;
                    steps += 1;
                }
                let tret = tout.min(self.t);
                self.output(tret, yout);
                self.clear_reached_stop_time();
                Ok(tret)
            }
            Mode::OneStep => {
                if !self.at_stop_time() {
                    self.step()?;
                }
                let t = self.t;
                self.output(t, yout);
                self.clear_reached_stop_time();
                Ok(t)
            }
        }
    }

    /// Sensitivities at `t`, which must lie in the last step.
    pub fn get_sens(&self, t: Float, ys: &mut [Vec<Float>]) -> Result<Float, SolverFlag> {
        let sens = self.sens.as_ref().ok_or(SolverFlag::NoSensitivities)?;
        let n = self.n;
        if ys.len() != sens.n_params || ys.iter().any(|s| s.len() != n) {
            return Err(SolverFlag::IllInput(format!(
                "sensitivity buffer must be {} vectors of length {n}",
                sens.n_params
            )));
        }
        if !self.started {
            for (j, s) in ys.iter_mut().enumerate() {
                s.copy_from_slice(&self.y0[(j + 1) * n..(j + 2) * n]);
            }
            return Ok(self.t);
        }
        let t_lo = self.t_old.unwrap_or(self.t);
        if t < t_lo - self.fuzz() || t > self.t + self.fuzz() {
            return Err(SolverFlag::BadTime {
                tout: t,
                t_lo,
                t_hi: self.t,
            });
        }
        for (j, s) in ys.iter_mut().enumerate() {
            self.interpolant((j + 1) * n).interpolate(t, s);
        }
        Ok(t)
    }

    /// Restart from `(t0, y0)` keeping tolerances, settings and the linear solver.
    /// Sensitivities continue from their current values.
    pub fn reinit(&mut self, t0: Float, y0: &[Float]) -> Result<(), SolverFlag> {
        match self.callback {
            Some(Callback::Rhs(_)) => {}
            Some(Callback::Residual(_)) => {
                return Err(SolverFlag::IllInput(
                    "residual problems cannot be restarted without a rate".into(),
                ));
            }
            None => return Err(SolverFlag::NotInitialized),
        }
        self.check_start(t0, y0)?;
        let mut start = y0.to_vec();
        let tail = if self.started { &self.d[0] } else { &self.y0 };
        start.extend_from_slice(&tail[self.n..]);
        self.reset(t0, &start);
        self.stats.nreinit += 1;
        Ok(())
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn time(&self) -> Float {
        self.t
    }

    /// Order used for the next step.
    pub fn order(&self) -> usize {
        self.order
    }

    /// Size of the next step.
    pub fn step_size(&self) -> Float {
        self.h_abs
    }

    pub fn n_equations(&self) -> usize {
        self.n
    }

    fn check_start(&self, t0: Float, y0: &[Float]) -> Result<(), SolverFlag> {
        if y0.len() != self.n {
            return Err(SolverFlag::IllInput(format!(
                "initial state has length {}, expected {}",
                y0.len(),
                self.n
            )));
        }
        if !t0.is_finite() {
            return Err(SolverFlag::IllInput(format!("initial time {t0} is not finite")));
        }
        Ok(())
    }

    /// Forget the history and wait for the next advance to start over.
    fn reset(&mut self, t0: Float, y0: &[Float]) {
        let n_total = y0.len();
        self.y0 = y0.to_vec();
        for row in &mut self.d {
            row.clear();
            row.resize(n_total, 0.0);
        }
        self.d[0].copy_from_slice(y0);
        self.t = t0;
        self.t_old = None;
        self.h_abs = 0.0;
        self.order = 1;
        self.n_equal_steps = 0;
        self.started = false;
        self.lu_valid = false;
        self.jac_y = None;
        self.jac_yp = None;
    }

    fn fuzz(&self) -> Float {
        100.0 * Float::EPSILON * (self.t.abs() + self.h_abs)
    }

    fn at_stop_time(&self) -> bool {
        self.stop_time.is_some_and(|ts| self.t >= ts)
    }

    fn clear_reached_stop_time(&mut self) {
        if self.at_stop_time() {
            log::trace!("stop time {:?} reached", self.stop_time);
            self.stop_time = None;
        }
    }

    pub(super) fn interpolant(&self, offset: usize) -> BdfInterpolant<'_> {
        BdfInterpolant {
            t: self.t,
            h: self.h_abs,
            order: self.order,
            d: &self.d,
            offset,
        }
    }

    /// State at `t` inside the last step, projected onto the constraints.
    fn output(&self, t: Float, yout: &mut [Float]) {
        self.interpolant(0).interpolate(t, yout);
        if let Some(mask) = &self.constraints {
            for (y, &c) in yout.iter_mut().zip(mask) {
                if c && *y < 0.0 {
                    *y = 0.0;
                }
            }
        }
    }
}

impl Drop for Bdf<'_> {
    fn drop(&mut self) {
        log::trace!(
            "releasing solver memory: {} equations, {} accepted steps",
            self.n,
            self.stats.naccpt
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::adapter::rhs_adapter;
    use approx::assert_relative_eq;

    fn decay_solver<'a>(ctx: &'a RhsContext<'a>, y0: Float, rtol: Float, atol: Float) -> Bdf<'a> {
        let mut s = Bdf::create(1).unwrap();
        s.set_user_data(UserData::Rhs(ctx)).unwrap();
        s.init_rhs(rhs_adapter, 0.0, &[y0]).unwrap();
        s.set_tolerances(rtol, &[atol]).unwrap();
        let m = Matrix::dense(1, 1).unwrap();
        let ls = DenseLinearSolver::new(1, &m).unwrap();
        s.set_linear_solver(ls, m).unwrap();
        s
    }

    #[test]
    fn exponential_decay() {
        let rhs = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0]];
        let ctx = RhsContext::new(&rhs, &[2.0]);
        let mut s = decay_solver(&ctx, 1.0, 1e-8, 1e-10);
        let mut y = [0.0];
        for t in [0.5, 1.0, 2.0] {
            let tret = s.advance(t, &mut y, Mode::Normal).unwrap();
            assert_eq!(tret, t);
            assert_relative_eq!(y[0], (-2.0 * t).exp(), max_relative = 1e-5);
        }
        let stats = s.stats();
        assert!(stats.naccpt > 0);
        assert!(stats.nlu > 0);
        assert!(s.order() >= 1 && s.order() <= MAX_ORDER);
    }

    #[test]
    fn stop_time_is_hit_exactly_and_reinit_restarts() {
        let rhs = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0]];
        let ctx = RhsContext::new(&rhs, &[2.0]);
        let mut s = decay_solver(&ctx, 1.0, 1e-8, 1e-10);
        let mut y = [0.0];
        s.set_stop_time(0.3).unwrap();
        let tret = s.advance(1.0, &mut y, Mode::Normal).unwrap();
        assert_eq!(tret, 0.3);
        assert_eq!(s.time(), 0.3);
        assert_relative_eq!(y[0], (-0.6 as Float).exp(), max_relative = 1e-5);

        let jumped = y[0] + 1.0;
        s.reinit(0.3, &[jumped]).unwrap();
        let tret = s.advance(0.6, &mut y, Mode::Normal).unwrap();
        assert_eq!(tret, 0.6);
        assert_relative_eq!(y[0], jumped * (-0.6 as Float).exp(), max_relative = 1e-5);
        assert_eq!(s.stats().nreinit, 1);
    }

    #[test]
    fn one_step_mode_returns_internal_times() {
        let rhs = |_t: f64, y: &[f64], _p: &[f64]| vec![-y[0]];
        let ctx = RhsContext::new(&rhs, &[]);
        let mut s = decay_solver(&ctx, 1.0, 1e-6, 1e-8);
        let mut y = [0.0];
        let t1 = s.advance(10.0, &mut y, Mode::OneStep).unwrap();
        let t2 = s.advance(10.0, &mut y, Mode::OneStep).unwrap();
        assert!(0.0 < t1 && t1 < t2 && t2 < 10.0);
        assert_eq!(t2, s.time());
    }

    #[test]
    fn lifecycle_misuse_is_flagged() {
        assert!(Bdf::create(0).is_none());

        let mut bare = Bdf::create(1).unwrap();
        let mut y = [0.0];
        assert_eq!(bare.advance(1.0, &mut y, Mode::Normal), Err(SolverFlag::NotInitialized));
        assert_eq!(bare.set_sens_params(&[1.0]), Err(SolverFlag::NoSensitivities));
        assert!(matches!(bare.set_tolerances(1e-4, &[1e-4, 1e-4]), Err(SolverFlag::IllInput(_))));

        let rhs = |_t: f64, y: &[f64], _p: &[f64]| vec![-y[0]];
        let ctx = RhsContext::new(&rhs, &[]);
        let mut s = decay_solver(&ctx, 1.0, 1e-6, 1e-8);
        s.advance(1.0, &mut y, Mode::Normal).unwrap();
        assert!(matches!(s.advance(0.01, &mut y, Mode::Normal), Err(SolverFlag::BadTime { .. })));
        assert!(matches!(s.set_stop_time(0.5), Err(SolverFlag::IllInput(_))));
    }

    #[test]
    fn negative_start_violates_constraints() {
        let rhs = |_t: f64, y: &[f64], _p: &[f64]| vec![-y[0]];
        let ctx = RhsContext::new(&rhs, &[]);
        let mut s = decay_solver(&ctx, -1.0, 1e-6, 1e-8);
        s.set_constraints(&[true]).unwrap();
        let mut y = [0.0];
        assert!(matches!(s.advance(1.0, &mut y, Mode::Normal), Err(SolverFlag::IllInput(_))));
    }

    #[test]
    fn missing_user_data_surfaces_as_callback_failure() {
        let mut s = Bdf::create(1).unwrap();
        s.init_rhs(rhs_adapter, 0.0, &[1.0]).unwrap();
        s.set_tolerances(1e-6, &[1e-8]).unwrap();
        let m = Matrix::dense(1, 1).unwrap();
        let ls = DenseLinearSolver::new(1, &m).unwrap();
        s.set_linear_solver(ls, m).unwrap();
        let mut y = [0.0];
        assert_eq!(
            s.advance(1.0, &mut y, Mode::Normal),
            Err(SolverFlag::CallbackFailure(
                crate::core::adapter::CallbackError::MissingContext
            ))
        );
    }
}
