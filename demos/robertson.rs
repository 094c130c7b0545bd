//! # Example: Robertson chemical kinetics
//!
//! Classic stiff three-species reaction system.
//!
//! Equations:
//! y0' = -0.04 y0 + 1e4 y1 y2
//! y1' =  0.04 y0 - 1e4 y1 y2 - 3e7 y1^2
//! y2' =  3e7 y1^2
//!
//! Initial condition: (1, 0, 0)
//!

use ivpdose::prelude::*;

fn main() {
    let robertson = |_t: f64, y: &[f64], _p: &[f64]| {
        let r0 = -0.04 * y[0] + 1.0e4 * y[1] * y[2];
        let r2 = 3.0e7 * y[1] * y[1];
        vec![r0, -r0 - r2, r2]
    };
    let mut times = vec![0.0];
    times.extend((0..12).map(|k| 0.4 * 10f64.powi(k)));

    match integrate(&times, &[1.0, 0.0, 0.0], &robertson, &[], &Options::default()) {
        Ok(traj) => {
            for (t, y) in &traj {
                let total: f64 = y.iter().sum();
                println!("t = {t:9.2e}  y = {y:.6?}  sum - 1 = {:+.2e}", total - 1.0);
            }
            let stats = traj.stats;
            println!("Number of function evaluations: {}", stats.nfev);
            println!("Number of Jacobian evaluations: {}", stats.njev);
            println!("Number of accepted steps: {}", stats.naccpt);
            println!("Number of rejected steps: {}", stats.nrejct);
        }
        Err(e) => eprintln!("Integration failed: {e}"),
    }
}
