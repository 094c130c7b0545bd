//! # Example: Parameter sensitivities
//!
//! Elimination with a constant infusion, y' = -k y + c, and the sensitivities
//! of y with respect to k and c.
//!

use ivpdose::prelude::*;

fn main() {
    let model = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0] + p[1]];
    let times: Vec<f64> = (0..=10).map(|i| i as f64).collect();
    let options = Options::builder().rtol(1e-6).atol(1e-8).build();

    for method in ["STG", "SIM"] {
        match integrate_with_sensitivities(&times, &[1.0], &model, &[0.5, 0.2], &options, method, true) {
            Ok(table) => {
                println!("{method}:");
                for i in 0..table.len() {
                    println!(
                        "  t = {:4.1}  y = {:.6}  dy/dk = {:+.6}  dy/dc = {:+.6}",
                        table.t[i],
                        table.states[i][0],
                        table.sensitivity(i, 0, 0).unwrap_or(f64::NAN),
                        table.sensitivity(i, 0, 1).unwrap_or(f64::NAN),
                    );
                }
                println!("  {:?}", table.stats);
            }
            Err(e) => eprintln!("Integration failed: {e}"),
        }
    }
}
