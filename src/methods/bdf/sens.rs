//! Forward sensitivity equations by difference quotients.
//!
//! For parameter `p_j` the sensitivity `s_j = ∂y/∂p_j` obeys
//! `s_j' = J·s_j + ∂f/∂p_j`. Both terms are approximated with forward
//! differences of the user function, so nothing beyond `f` is required:
//!
//! - `J·s_j ≈ (f(t, y + σ·s_j, p) − f(t, y, p)) / σ` with
//!   `σ = p̄_j / max(‖p̄_j·s_j‖, 1/δ)`,
//! - `∂f/∂p_j ≈ (f(t, y, p + Δp·e_j) − f(t, y, p)) / Δp` with `Δp = p̄_j·δ`,
//!
//! where `δ = √max(rtol, ε)` and `p̄_j` is the parameter scale.

use crate::{Float, core::adapter::CallbackError, status::SolverFlag};

use super::{
    solver::{Bdf, UserData},
    wrms,
};

impl Bdf<'_> {
    /// State block plus one block per sensitivity parameter.
    pub(super) fn n_blocks(&self) -> usize {
        1 + self.sens.as_ref().map_or(0, |s| s.n_params)
    }

    /// Weights of sensitivity block `j`: `p̄_j · w(p̄_j · s_j)`.
    pub(super) fn sens_weights(&self, y: &[Float], w: &mut [Float]) -> Result<(), SolverFlag> {
        let Some(sens) = &self.sens else {
            return Ok(());
        };
        let n = self.n;
        for (j, &pbar) in sens.pbar.iter().enumerate() {
            let block = (j + 1) * n..(j + 2) * n;
            let scaled: Vec<Float> = y[block.clone()].iter().map(|s| pbar * s).collect();
            self.state_weights(&scaled, &mut w[block.clone()])?;
            for wi in &mut w[block] {
                *wi *= pbar;
            }
        }
        Ok(())
    }

    /// Residual `s' − (J·s + ∂f/∂p_j)` of sensitivity block `j` at state `y`,
    /// given `f0 = f(t, y, p)` and the state error weights.
    #[allow(clippy::too_many_arguments)]
    pub(super) fn sens_residual(
        &mut self,
        j: usize,
        t: Float,
        y: &[Float],
        f0: &[Float],
        s: &[Float],
        sp: &[Float],
        ewt: &[Float],
        out: &mut [Float],
    ) -> Result<(), SolverFlag> {
        let n = self.n;
        let pbar = self
            .sens
            .as_ref()
            .ok_or(SolverFlag::NoSensitivities)?
            .pbar[j];
        let delta = self.rtol.max(Float::EPSILON).sqrt();
        let params = match self.user_data {
            Some(UserData::Rhs(ctx)) => ctx.params().to_vec(),
            _ => return Err(CallbackError::MissingContext.into()),
        };
        if j >= params.len() {
            return Err(SolverFlag::IllInput(format!(
                "sensitivity parameter {j} outside the {} model parameters",
                params.len()
            )));
        }

        out.copy_from_slice(sp);

        let scaled: Vec<Float> = s.iter().map(|v| pbar * v).collect();
        let norms = wrms(&scaled, ewt);
        if norms > 0.0 {
            let sigma = pbar / norms.max(1.0 / delta);
            let y_pert: Vec<Float> = y.iter().zip(s).map(|(yi, si)| yi + sigma * si).collect();
            let mut f1 = vec![0.0; n];
            self.derivative(t, &y_pert, None, &mut f1)?;
            for i in 0..n {
                out[i] -= (f1[i] - f0[i]) / sigma;
            }
        }

        let mut perturbed = params;
        let saved = perturbed[j];
        perturbed[j] = saved + pbar * delta;
        let dp = perturbed[j] - saved;
        let mut f2 = vec![0.0; n];
        self.derivative(t, y, Some(perturbed), &mut f2)?;
        for i in 0..n {
            out[i] -= (f2[i] - f0[i]) / dp;
        }
        Ok(())
    }
}
