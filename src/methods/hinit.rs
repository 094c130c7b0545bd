//! Compute an initial step size guess

use crate::{Float, status::SolverFlag};

/// Initial step size for an ODE `y' = f(t, y)` started at `(x, y)` with slope `f0`.
///
/// `sk` holds the error scale `atol_i + rtol·|y_i|` of every component and
/// `iord` the order of the local error estimate of the first step.
pub(crate) fn hinit<F>(
    mut f: F,
    x: Float,
    y: &[Float],
    f0: &[Float],
    sk: &[Float],
    iord: usize,
    hmax: Float,
) -> Result<Float, SolverFlag>
where
    F: FnMut(Float, &[Float], &mut [Float]) -> Result<(), SolverFlag>,
{
    let n = y.len();
    let mut dnf: Float = 0.0;
    let mut dny: Float = 0.0;

    for i in 0..n {
        dnf += (f0[i] / sk[i]) * (f0[i] / sk[i]);
        dny += (y[i] / sk[i]) * (y[i] / sk[i]);
    }

    let mut h: Float = if dnf <= 1e-10 || dny <= 1e-10 {
        1.0e-6
    } else {
        (dny / dnf).sqrt() * 0.01
    };
    h = h.min(hmax);

    // Explicit Euler step: y1 = y + h * f0
    let y1: Vec<Float> = y.iter().zip(f0).map(|(yi, fi)| yi + h * fi).collect();
    let mut f1 = vec![0.0; n];
    f(x + h, &y1, &mut f1)?;

    // Estimate second derivative
    let mut der2: Float = 0.0;
    for i in 0..n {
        let df = (f1[i] - f0[i]) / sk[i];
        der2 += df * df;
    }
    der2 = der2.sqrt() / h;

    let der12 = der2.max(dnf.sqrt());
    let h1 = if der12 <= 1.0e-15 {
        (1.0e-6 as Float).max(h * 1.0e-3)
    } else {
        (0.01 / der12).powf(1.0 / iord as Float)
    };

    Ok((100.0 * h).min(h1).min(hmax))
}
