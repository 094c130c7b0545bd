//! Starting, stepping and correcting.

use std::ops::Range;

use crate::{
    Float,
    matrix::Matrix,
    methods::hinit::hinit,
    status::SolverFlag,
};

use super::{
    MAX_FACTOR, MIN_FACTOR, SensitivityMethod, change_d, error_const, gamma,
    solver::{Bdf, Callback, UserData},
    wrms,
};

const SQRT_EPS: Float = 1.490_116_119_384_765_6e-8;
/// Newton corrections below this fraction of the tolerance end the iteration.
const NEGLIGIBLE_UPDATE: Float = 1e-2;

/// Outcome of one corrector solve.
pub(super) struct Corrector {
    pub converged: bool,
    pub n_iter: usize,
}

impl Bdf<'_> {
    /// Residual `F(t, y, y')` of the state block.
    pub(super) fn residual(
        &mut self,
        t: Float,
        y: &[Float],
        yp: &[Float],
        out: &mut [Float],
    ) -> Result<(), SolverFlag> {
        match self.callback {
            Some(Callback::Rhs(_)) => {
                self.derivative(t, y, None, out)?;
                for (r, p) in out.iter_mut().zip(yp) {
                    *r = p - *r;
                }
                Ok(())
            }
            Some(Callback::Residual(f)) => {
                self.stats.nfev += 1;
                let ctx = match self.user_data {
                    Some(UserData::Residual(ctx)) => Some(ctx),
                    _ => None,
                };
                f(t, y, yp, out, ctx)?;
                Ok(())
            }
            None => Err(SolverFlag::NotInitialized),
        }
    }

    /// `f(t, y)` of an explicit problem, optionally with replaced parameters.
    pub(super) fn derivative(
        &mut self,
        t: Float,
        y: &[Float],
        params: Option<Vec<Float>>,
        out: &mut [Float],
    ) -> Result<(), SolverFlag> {
        let Some(Callback::Rhs(f)) = self.callback else {
            return Err(SolverFlag::IllInput(
                "derivative requested from a residual problem".into(),
            ));
        };
        self.stats.nfev += 1;
        let ctx = match self.user_data {
            Some(UserData::Rhs(ctx)) => Some(ctx),
            _ => None,
        };
        match (params, ctx) {
            (Some(params), Some(ctx)) => {
                let perturbed = ctx.with_params(params);
                f(t, y, out, Some(&perturbed))?;
            }
            _ => f(t, y, out, ctx)?,
        }
        Ok(())
    }

    /// Error weights of the state block.
    pub(super) fn state_weights(&self, y: &[Float], w: &mut [Float]) -> Result<(), SolverFlag> {
        if let Some(f) = &self.weight_fn {
            return f(y, w).map_err(|index| SolverFlag::ErrorWeight { index });
        }
        if !self.tolerances_set {
            return Err(SolverFlag::IllInput("tolerances were never set".into()));
        }
        for (i, (wi, yi)) in w.iter_mut().zip(y).enumerate() {
            let denom = self.rtol * yi.abs() + self.atol[i];
            if !(denom > 0.0) {
                return Err(SolverFlag::ErrorWeight { index: i });
            }
            *wi = 1.0 / denom;
        }
        Ok(())
    }

    /// Error weights of the whole vector, sensitivities included.
    pub(super) fn weights(&self, y: &[Float]) -> Result<Vec<Float>, SolverFlag> {
        let n = self.n;
        let mut w = vec![0.0; y.len()];
        self.state_weights(&y[..n], &mut w[..n])?;
        self.sens_weights(y, &mut w)?;
        Ok(w)
    }

    /// Norm of `scale·v` used by the error test.
    pub(super) fn error_norm(&self, v: &[Float], w: &[Float], scale: Float) -> Float {
        let scaled: Vec<Float> = v.iter().map(|x| scale * x).collect();
        let blocks = if self.sens.as_ref().is_some_and(|s| s.error_control) {
            0..self.n_blocks()
        } else {
            0..1
        };
        self.block_norm(&scaled, w, blocks)
    }

    /// Largest weighted norm over the given blocks of a full-length vector.
    pub(super) fn block_norm(&self, v: &[Float], w: &[Float], blocks: Range<usize>) -> Float {
        let n = self.n;
        blocks
            .map(|b| wrms(&v[b * n..(b + 1) * n], &w[b * n..(b + 1) * n]))
            .fold(0.0, Float::max)
    }

    /// Build the first difference array from the starting point.
    pub(super) fn start(&mut self, tout: Float) -> Result<(), SolverFlag> {
        let n = self.n;
        let t = self.t;
        let y = self.y0.clone();
        let n_total = y.len();

        if let Some(mask) = &self.constraints {
            if let Some(i) = (0..n).find(|&i| mask[i] && y[i] < 0.0) {
                return Err(SolverFlag::IllInput(format!(
                    "initial state component {i} = {} violates its constraint",
                    y[i]
                )));
            }
        }
        let ewt = self.weights(&y)?;

        let mut slope = vec![0.0; n_total];
        let residual_form = matches!(self.callback, Some(Callback::Residual(_)));
        if residual_form {
            slope[..n].copy_from_slice(&self.yp0);
        } else {
            self.derivative(t, &y[..n], None, &mut slope[..n])?;
            let f0 = slope[..n].to_vec();
            let zeros = vec![0.0; n];
            for j in 0..self.n_blocks() - 1 {
                let block = (j + 1) * n..(j + 2) * n;
                let mut g = vec![0.0; n];
                self.sens_residual(j, t, &y[..n], &f0, &y[block.clone()], &zeros, &ewt[..n], &mut g)?;
                for (s, gi) in slope[block].iter_mut().zip(&g) {
                    *s = -gi;
                }
            }
        }

        let t_end = match self.stop_time {
            Some(ts) if ts > t && ts < tout => ts,
            _ => tout,
        };
        let interval = t_end - t;
        let hmax = self.settings.hmax.unwrap_or(Float::INFINITY).min(interval);
        let h = match self.settings.h0 {
            Some(h0) => h0.min(hmax),
            None if residual_form => {
                let mut h = 0.001 * interval;
                let ypnorm = wrms(&slope[..n], &ewt[..n]);
                if ypnorm * h > 0.5 {
                    h = 0.5 / ypnorm;
                }
                h.min(hmax)
            }
            None => {
                let sk: Vec<Float> = ewt[..n].iter().map(|w| 1.0 / w).collect();
                let f0 = slope[..n].to_vec();
                hinit(
                    |ti, yi, out| self.derivative(ti, yi, None, out),
                    t,
                    &y[..n],
                    &f0,
                    &sk,
                    2,
                    hmax,
                )?
            }
        };

        for row in &mut self.d {
            row.fill(0.0);
        }
        self.d[0].copy_from_slice(&y);
        for (d1, s) in self.d[1].iter_mut().zip(&slope) {
            *d1 = h * s;
        }
        self.h_abs = h;
        self.order = 1;
        self.n_equal_steps = 0;
        self.lu_valid = false;
        self.jac_y = None;
        self.jac_yp = None;
        self.t_old = None;
        self.started = true;
        log::trace!("starting at t = {t} with h = {h}");
        Ok(())
    }

    /// Change the step size by `factor`, keeping the order.
    fn rescale(&mut self, factor: Float) {
        change_d(&mut self.d, self.order, factor);
        self.h_abs *= factor;
        self.n_equal_steps = 0;
        self.lu_valid = false;
    }

    /// Take one accepted step.
    pub(super) fn step(&mut self) -> Result<(), SolverFlag> {
        let n = self.n;
        let n_total = self.d[0].len();
        let t = self.t;
        let maxiter = self.settings.newton_maxiter;
        let max_order = self.settings.max_order;
        let t_bound = self.stop_time.unwrap_or(Float::INFINITY);
        let max_step = self.settings.hmax.unwrap_or(Float::INFINITY);
        let min_step = (10.0 * Float::EPSILON * t.abs())
            .max(self.settings.hmin.unwrap_or(0.0))
            .max(Float::MIN_POSITIVE);

        if self.h_abs > max_step {
            self.rescale(max_step / self.h_abs);
        } else if self.h_abs < min_step {
            self.rescale(min_step / self.h_abs);
        }

        let order = self.order;
        let alpha = gamma(order);
        let newton_tol = (10.0 * Float::EPSILON / self.rtol.max(Float::EPSILON))
            .max((0.03 as Float).min(self.rtol.sqrt()));
        let mut current_jac = false;
        let mut error_fails = 0;
        let mut conv_fails = 0;

        let (d_new, ewt_new, error_norm, safety, t_new) = loop {
            if self.h_abs < min_step {
                return Err(SolverFlag::StepTooSmall { t, h: self.h_abs });
            }
            self.stats.nstep += 1;

            let mut t_new = t + self.h_abs;
            if t_new > t_bound {
                t_new = t_bound;
                change_d(&mut self.d, order, (t_new - t) / self.h_abs);
                self.n_equal_steps = 0;
                self.lu_valid = false;
            }
            let h = t_new - t;
            self.h_abs = h;

            let mut y_predict = vec![0.0; n_total];
            for row in &self.d[..=order] {
                for (yp, r) in y_predict.iter_mut().zip(row) {
                    *yp += r;
                }
            }
            let mut psi = vec![0.0; n_total];
            for k in 1..=order {
                let g = gamma(k);
                for (p, r) in psi.iter_mut().zip(&self.d[k]) {
                    *p += g * r;
                }
            }
            for p in &mut psi {
                *p /= alpha;
            }
            let c = h / alpha;
            let ewt = self.weights(&y_predict)?;
            let yp_predict: Vec<Float> = psi[..n].iter().map(|p| p / c).collect();

            let mut y = y_predict.clone();
            let mut d = vec![0.0; n_total];
            let corrector = loop {
                y.copy_from_slice(&y_predict);
                d.fill(0.0);
                if !self.lu_valid {
                    if self.jac_y.is_none() {
                        self.update_jacobian(t_new, &y_predict[..n], &yp_predict, h, &ewt[..n])?;
                        current_jac = true;
                    }
                    self.lu_valid = self.factor(c)?;
                    if !self.lu_valid {
                        if current_jac {
                            break None;
                        }
                        self.update_jacobian(t_new, &y_predict[..n], &yp_predict, h, &ewt[..n])?;
                        current_jac = true;
                        continue;
                    }
                }
                let result = self.correct(t_new, &mut y, &mut d, &psi, c, &ewt, newton_tol)?;
                if result.converged || current_jac {
                    break Some(result);
                }
                self.update_jacobian(t_new, &y_predict[..n], &yp_predict, h, &ewt[..n])?;
                current_jac = true;
                self.lu_valid = false;
            };

            let corrector = match corrector {
                Some(c) if c.converged => c,
                _ => {
                    conv_fails += 1;
                    self.stats.nncf += 1;
                    if conv_fails >= self.settings.max_convergence_failures {
                        return Err(SolverFlag::ConvergenceFailure { t, h });
                    }
                    self.rescale(0.5);
                    continue;
                }
            };

            if let Some(eta) = self.enforce_constraints(&mut y, &mut d, &ewt, newton_tol) {
                self.stats.nconstr += 1;
                if self.h_abs * eta < min_step {
                    return Err(SolverFlag::ConstraintFailure { t });
                }
                self.rescale(eta);
                continue;
            }

            let safety = 0.9 * (2 * maxiter + 1) as Float / (2 * maxiter + corrector.n_iter) as Float;
            let ewt_new = self.weights(&y)?;
            let error_norm = self.error_norm(&d, &ewt_new, error_const(order));
            if error_norm > 1.0 {
                error_fails += 1;
                self.stats.nrejct += 1;
                if error_fails >= self.settings.max_error_test_failures {
                    return Err(SolverFlag::ErrorTestFailure { t, h });
                }
                let factor =
                    MIN_FACTOR.max(safety * error_norm.powf(-1.0 / (order as Float + 1.0)));
                change_d(&mut self.d, order, factor);
                self.h_abs *= factor;
                self.n_equal_steps = 0;
                continue;
            }
            break (d, ewt_new, error_norm, safety, t_new);
        };

        // accept
        self.n_equal_steps += 1;
        self.t_old = Some(t);
        self.t = t_new;
        self.stats.naccpt += 1;

        let next: Vec<Float> = d_new
            .iter()
            .zip(&self.d[order + 1])
            .map(|(a, b)| a - b)
            .collect();
        self.d[order + 2] = next;
        self.d[order + 1] = d_new;
        for i in (0..=order).rev() {
            let (lo, hi) = self.d.split_at_mut(i + 1);
            for (a, b) in lo[i].iter_mut().zip(&hi[0]) {
                *a += b;
            }
        }

        if self.n_equal_steps < order + 1 {
            return Ok(());
        }

        let error_m_norm = if order > 1 {
            self.error_norm(&self.d[order], &ewt_new, error_const(order - 1))
        } else {
            Float::INFINITY
        };
        let error_p_norm = if order < max_order {
            self.error_norm(&self.d[order + 2], &ewt_new, error_const(order + 1))
        } else {
            Float::INFINITY
        };
        let norms = [error_m_norm, error_norm, error_p_norm];
        let factors: Vec<Float> = norms
            .iter()
            .enumerate()
            .map(|(k, e)| e.powf(-1.0 / (order + k) as Float))
            .collect();
        let mut best = 0;
        for k in 1..factors.len() {
            if factors[k] > factors[best] {
                best = k;
            }
        }
        let new_order = order + best - 1;
        let factor = MAX_FACTOR.min(safety * factors[best]);
        self.order = new_order;
        change_d(&mut self.d, new_order, factor);
        self.h_abs *= factor;
        self.n_equal_steps = 0;
        self.lu_valid = false;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn correct(
        &mut self,
        t_new: Float,
        y: &mut [Float],
        d: &mut [Float],
        psi: &[Float],
        c: Float,
        ewt: &[Float],
        tol: Float,
    ) -> Result<Corrector, SolverFlag> {
        let n_blocks = self.n_blocks();
        let Some((method, error_control)) = self.sens.as_ref().map(|s| (s.method, s.error_control))
        else {
            return self.newton(0..1, 0..1, t_new, y, d, psi, c, ewt, tol);
        };
        match method {
            // Sensitivities ride along with every state iteration, but only the
            // state increments drive the rate test. With error control the
            // sensitivity blocks must then pass their own test at the
            // converged state.
            SensitivityMethod::Simultaneous => {
                let joint = self.newton(0..n_blocks, 0..1, t_new, y, d, psi, c, ewt, tol)?;
                if !joint.converged || !error_control {
                    return Ok(joint);
                }
                let sens =
                    self.newton(1..n_blocks, 1..n_blocks, t_new, y, d, psi, c, ewt, tol)?;
                Ok(Corrector {
                    converged: sens.converged,
                    n_iter: joint.n_iter,
                })
            }
            SensitivityMethod::Staggered => {
                let state = self.newton(0..1, 0..1, t_new, y, d, psi, c, ewt, tol)?;
                if !state.converged {
                    return Ok(state);
                }
                let sens =
                    self.newton(1..n_blocks, 1..n_blocks, t_new, y, d, psi, c, ewt, tol)?;
                Ok(Corrector {
                    converged: sens.converged,
                    n_iter: state.n_iter,
                })
            }
        }
    }

    /// Simplified Newton iteration over `blocks`, updating `y` and `d`.
    /// Convergence is judged on the `tested` blocks alone.
    #[allow(clippy::too_many_arguments)]
    fn newton(
        &mut self,
        blocks: Range<usize>,
        tested: Range<usize>,
        t_new: Float,
        y: &mut [Float],
        d: &mut [Float],
        psi: &[Float],
        c: Float,
        ewt: &[Float],
        tol: Float,
    ) -> Result<Corrector, SolverFlag> {
        let n = self.n;
        let maxiter = self.settings.newton_maxiter;
        let with_sens = blocks.end > 1;
        let mut inc = vec![0.0; n * blocks.len()];
        let mut dy_norm_old: Option<Float> = None;

        for k in 0..maxiter {
            let f0 = if with_sens {
                let mut f0 = vec![0.0; n];
                self.derivative(t_new, &y[..n], None, &mut f0)?;
                Some(f0)
            } else {
                None
            };
            for (bi, b) in blocks.clone().enumerate() {
                let range = b * n..(b + 1) * n;
                let yp: Vec<Float> = psi[range.clone()]
                    .iter()
                    .zip(&d[range.clone()])
                    .map(|(p, di)| (p + di) / c)
                    .collect();
                let out = &mut inc[bi * n..(bi + 1) * n];
                if b == 0 {
                    self.residual(t_new, &y[range], &yp, out)?;
                } else {
                    let base = f0.as_deref().ok_or(SolverFlag::NoSensitivities)?;
                    self.sens_residual(b - 1, t_new, &y[..n], base, &y[range], &yp, &ewt[..n], out)?;
                }
            }
            if inc.iter().any(|v| !v.is_finite()) {
                return Ok(Corrector { converged: false, n_iter: k + 1 });
            }

            let linsol = self.linsol.as_ref().ok_or(SolverFlag::LinearSolverMissing)?;
            for chunk in inc.chunks_mut(n) {
                for v in chunk.iter_mut() {
                    *v *= -c;
                }
                linsol.solve(chunk);
            }

            let dy_norm = tested
                .clone()
                .map(|b| {
                    let bi = b - blocks.start;
                    wrms(&inc[bi * n..(bi + 1) * n], &ewt[b * n..(b + 1) * n])
                })
                .fold(0.0, Float::max);
            let rate = dy_norm_old.map(|old| dy_norm / old);
            // A correction this small is below the noise of the difference
            // quotients; its rate says nothing about divergence.
            let negligible = dy_norm <= NEGLIGIBLE_UPDATE * tol;
            if let Some(rate) = rate.filter(|_| !negligible) {
                if rate >= 1.0 || rate.powi((maxiter - k) as i32) / (1.0 - rate) * dy_norm > tol {
                    return Ok(Corrector { converged: false, n_iter: k + 1 });
                }
            }

            for (bi, b) in blocks.clone().enumerate() {
                let src = &inc[bi * n..(bi + 1) * n];
                for (i, v) in src.iter().enumerate() {
                    y[b * n + i] += v;
                    d[b * n + i] += v;
                }
            }

            if negligible || rate.is_some_and(|r| r / (1.0 - r) * dy_norm < tol) {
                return Ok(Corrector { converged: true, n_iter: k + 1 });
            }
            dy_norm_old = Some(dy_norm);
        }
        Ok(Corrector { converged: false, n_iter: maxiter })
    }

    /// Forward-difference `∂F/∂y` and `∂F/∂y'` of the state block.
    fn update_jacobian(
        &mut self,
        t: Float,
        y: &[Float],
        yp: &[Float],
        h: Float,
        ewt: &[Float],
    ) -> Result<(), SolverFlag> {
        let n = self.n;
        let mut r0 = vec![0.0; n];
        self.residual(t, y, yp, &mut r0)?;
        let residual_form = matches!(self.callback, Some(Callback::Residual(_)));
        let slope: Vec<Float> = if residual_form {
            yp.to_vec()
        } else {
            yp.iter().zip(&r0).map(|(p, r)| p - r).collect()
        };
        let fnorm = wrms(&slope, ewt);
        let min_inc = if fnorm != 0.0 {
            1000.0 * h * Float::EPSILON * n as Float * fnorm
        } else {
            1.0
        };

        let mut jac_y = Matrix::zeros(n, n);
        let mut y_pert = y.to_vec();
        let mut r1 = vec![0.0; n];
        for j in 0..n {
            let saved = y_pert[j];
            y_pert[j] = saved + (SQRT_EPS * saved.abs()).max(min_inc / ewt[j]);
            let inc = y_pert[j] - saved;
            self.residual(t, &y_pert, yp, &mut r1)?;
            y_pert[j] = saved;
            for i in 0..n {
                jac_y[(i, j)] = (r1[i] - r0[i]) / inc;
            }
        }

        let jac_yp = if residual_form {
            let mut jac_yp = Matrix::zeros(n, n);
            let mut yp_pert = yp.to_vec();
            for j in 0..n {
                let saved = yp_pert[j];
                yp_pert[j] = saved + SQRT_EPS * saved.abs().max(1.0);
                let inc = yp_pert[j] - saved;
                self.residual(t, y, &yp_pert, &mut r1)?;
                yp_pert[j] = saved;
                for i in 0..n {
                    jac_yp[(i, j)] = (r1[i] - r0[i]) / inc;
                }
            }
            jac_yp
        } else {
            Matrix::identity(n)
        };

        self.jac_y = Some(jac_y);
        self.jac_yp = Some(jac_yp);
        self.stats.njev += 1;
        Ok(())
    }

    /// Factor `c·∂F/∂y + ∂F/∂y'`. `Ok(false)` when the matrix is singular.
    fn factor(&mut self, c: Float) -> Result<bool, SolverFlag> {
        let (Some(jac_y), Some(jac_yp)) = (&self.jac_y, &self.jac_yp) else {
            return Err(SolverFlag::IllInput("no Jacobian to factor".into()));
        };
        let matrix = self.matrix.as_mut().ok_or(SolverFlag::LinearSolverMissing)?;
        let linsol = self.linsol.as_mut().ok_or(SolverFlag::LinearSolverMissing)?;
        matrix.assign_combination(c, jac_y, 1.0, jac_yp);
        self.stats.nlu += 1;
        match linsol.setup(matrix) {
            Ok(()) => Ok(true),
            Err(singular) => {
                log::debug!("iteration matrix is singular: {singular}");
                Ok(false)
            }
        }
    }

    /// Check the non-negativity constraints on a converged step.
    ///
    /// Small violations are projected away (adjusting `d` accordingly) and the
    /// step is kept. Otherwise returns the factor by which to shrink the step.
    fn enforce_constraints(
        &self,
        y: &mut [Float],
        d: &mut [Float],
        ewt: &[Float],
        tol: Float,
    ) -> Option<Float> {
        let mask = self.constraints.as_ref()?;
        let n = self.n;
        let violated: Vec<usize> = (0..n).filter(|&i| mask[i] && y[i] < 0.0).collect();
        if violated.is_empty() {
            return None;
        }
        let mut v = vec![0.0; n];
        for &i in &violated {
            v[i] = y[i];
        }
        if wrms(&v, &ewt[..n]) <= tol {
            for &i in &violated {
                d[i] -= y[i];
                y[i] = 0.0;
            }
            return None;
        }
        let y_old = &self.d[0];
        let ratio = violated
            .iter()
            .map(|&i| y_old[i] / (y_old[i] - y[i]))
            .fold(Float::INFINITY, Float::min);
        Some((0.9 * ratio).clamp(0.1, 0.9))
    }
}
