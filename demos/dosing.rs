//! # Example: Repeated oral dosing
//!
//! Two-compartment absorption model with a dose into the depot every 12 hours.
//!
//! Equations:
//! depot'   = -ka * depot
//! central' =  ka * depot - ke * central
//!

use ivpdose::prelude::*;

fn main() {
    let model = |_t: f64, y: &[f64], p: &[f64]| vec![-p[0] * y[0], p[0] * y[0] - p[1] * y[1]];
    let params = [1.2, 0.15];
    let times: Vec<f64> = (0..=48).map(|h| h as f64).collect();
    let doses: Vec<EventRecord> = (0..4)
        .map(|i| EventRecord::new(1, 12.0 * i as f64, 250.0))
        .collect();

    let options = Options::builder().rtol(1e-6).atol(1e-8).build();

    match integrate_with_events(&times, &[0.0, 0.0], &model, &params, &doses, &options) {
        Ok(traj) => {
            for row in traj.to_table() {
                println!("t = {:5.1}  depot = {:9.4}  central = {:9.4}", row[0], row[1], row[2]);
            }
            println!("{:?}", traj.stats);
        }
        Err(e) => eprintln!("Integration failed: {e}"),
    }
}
