#![allow(dead_code)]

/// Everything stays where it is.
pub fn zero(_t: f64, y: &[f64], _p: &[f64]) -> Vec<f64> {
    vec![0.0; y.len()]
}

/// First-order elimination of every state with rate `p[0]`.
pub fn decay(_t: f64, y: &[f64], p: &[f64]) -> Vec<f64> {
    y.iter().map(|v| -p[0] * v).collect()
}

/// `y' = -k·y + c` with `p = [k, c]`.
pub fn decay_with_input(_t: f64, y: &[f64], p: &[f64]) -> Vec<f64> {
    vec![-p[0] * y[0] + p[1]]
}

/// Depot to central compartment: `p = [ka, ke]`.
pub fn oral_dosing(_t: f64, y: &[f64], p: &[f64]) -> Vec<f64> {
    let (ka, ke) = (p[0], p[1]);
    vec![-ka * y[0], ka * y[0] - ke * y[1]]
}

/// Saturable elimination that explicit steps push below zero.
pub fn michaelis_menten(_t: f64, y: &[f64], _p: &[f64]) -> Vec<f64> {
    vec![-10.0 * y[0] / (1e-6 + y[0])]
}

/// Robertson's stiff chemical kinetics.
pub fn robertson(_t: f64, y: &[f64], _p: &[f64]) -> Vec<f64> {
    let r0 = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
    let r2 = 3.0e7 * y[1] * y[1];
    vec![r0, -r0 - r2, r2]
}

/// Robertson kinetics with its rate constants taken from `p`.
pub fn robertson_rates(_t: f64, y: &[f64], p: &[f64]) -> Vec<f64> {
    let r0 = -p[0] * y[0] + p[1] * y[1] * y[2];
    let r2 = p[2] * y[1] * y[1];
    vec![r0, -r0 - r2, r2]
}

/// Output grid of the Robertson problem: 0, 0.4, 4, .., 4e10.
pub fn robertson_times() -> Vec<f64> {
    let mut t = vec![0.0];
    t.extend((0..12).map(|k| 0.4 * 10f64.powi(k)));
    t
}

/// `y0' = -k·y0`, `0 = y1 - y0`.
pub fn decay_dae(_t: f64, y: &[f64], yp: &[f64], p: &[f64]) -> Vec<f64> {
    vec![yp[0] + p[0] * y[0], y[1] - y[0]]
}
