use approx::assert_relative_eq;
use ivpdose::prelude::*;

mod common;
use common::{decay, michaelis_menten, oral_dosing, zero};

fn tight() -> Options {
    Options::builder().rtol(1e-8).atol(1e-10).build()
}

#[test]
fn zero_rhs_keeps_the_initial_condition() {
    let y0 = [1.0, 2.0, 3.0];
    let times = [0.0, 0.5, 1.0, 2.0, 5.0];
    let traj = integrate(&times, &y0, &zero, &[], &Options::default()).unwrap();
    assert_eq!(traj.t, times.to_vec());
    for (_, y) in &traj {
        assert_eq!(y, &y0[..]);
    }
}

#[test]
fn jump_adds_exactly_its_delta() {
    let events = [EventRecord::new(2, 1.0, 3.5)];
    let traj =
        integrate_with_events(&[0.0, 0.5, 1.0, 2.0], &[1.0, 0.0], &zero, &[], &events, &Options::default())
            .unwrap();
    assert_eq!(traj.t, vec![0.0, 0.5, 1.0, 2.0]);
    assert_eq!(traj.y[1], vec![1.0, 0.0]);
    assert_eq!(traj.y[2], vec![1.0, 3.5]);
    assert_eq!(traj.y[3], vec![1.0, 3.5]);
    assert_eq!(traj.stats.nreinit, 1);
}

#[test]
fn schedule_rows_drive_the_table() {
    // Jump on a grid point replaces that sample; one off the grid adds a row.
    let events = [EventRecord::new(1, 2.5, 1.0), EventRecord::new(1, 1.0, 1.0)];
    let traj =
        integrate_with_events(&[0.0, 1.0, 2.0, 3.0], &[1.0], &decay, &[0.1], &events, &Options::default())
            .unwrap();
    assert_eq!(traj.t, vec![0.0, 1.0, 2.0, 2.5, 3.0]);
    assert_eq!(traj.to_table()[3].len(), 2);
}

#[test]
fn repeated_doses_follow_the_closed_form() {
    let k = 0.5;
    let events = [EventRecord::new(1, 0.0, 1.0), EventRecord::new(1, 2.0, 1.0)];
    let times = [0.0, 1.0, 2.0, 3.0, 4.0];
    let traj = integrate_with_events(&times, &[0.0], &decay, &[k], &events, &tight()).unwrap();

    assert_eq!(traj.len(), 5);
    assert_eq!(traj.y[0], vec![1.0]);
    for (t, y) in &traj {
        let mut expected = (-k * t).exp();
        if t >= 2.0 {
            expected += (-k * (t - 2.0)).exp();
        }
        assert_relative_eq!(y[0], expected, max_relative = 1e-5);
    }
    assert_eq!(traj.stats.nreinit, 1);
}

#[test]
fn oral_dose_moves_from_depot_to_central() {
    let (ka, ke) = (1.2, 0.3);
    let events = [EventRecord::new(1, 0.0, 100.0)];
    let times: Vec<f64> = (0..=12).map(|i| i as f64).collect();
    let traj = integrate_with_events(&times, &[0.0, 0.0], &oral_dosing, &[ka, ke], &events, &tight())
        .unwrap();
    for (t, y) in &traj {
        let central = 100.0 * ka / (ka - ke) * ((-ke * t).exp() - (-ka * t).exp());
        assert_relative_eq!(y[0], 100.0 * (-ka * t).exp(), max_relative = 1e-5, epsilon = 1e-6);
        assert_relative_eq!(y[1], central, max_relative = 1e-5, epsilon = 1e-6);
    }
}

#[test]
fn simultaneous_jumps_apply_in_order_with_one_restart() {
    let events = [
        EventRecord::new(1, 1.0, 0.5),
        EventRecord::new(2, 1.0, 2.0),
        EventRecord::new(1, 3.0, 1.0),
    ];
    let traj =
        integrate_with_events(&[0.0, 1.0, 2.0], &[1.0, 1.0], &zero, &[], &events, &Options::default())
            .unwrap();
    assert_eq!(traj.t, vec![0.0, 1.0, 1.0, 2.0, 3.0]);
    assert_eq!(traj.y[1], vec![1.5, 1.0]);
    assert_eq!(traj.y[2], vec![1.5, 3.0]);
    assert_eq!(traj.y[3], vec![1.5, 3.0]);
    assert_eq!(traj.y[4], vec![2.5, 3.0]);
    // the jump on the last row needs no restart
    assert_eq!(traj.stats.nreinit, 1);
}

#[test]
fn jump_at_the_first_time_adds_to_the_initial_condition() {
    let events = [EventRecord::new(1, 0.0, 2.0)];
    let traj = integrate_with_events(&[0.0, 1.0], &[1.5], &zero, &[], &events, &Options::default())
        .unwrap();
    assert_eq!(traj.t, vec![0.0, 1.0]);
    assert_eq!(traj.row(0), Some(vec![0.0, 3.5]));
    assert_eq!(traj.row(1), Some(vec![1.0, 3.5]));
    assert_eq!(traj.stats.nreinit, 0);
}

#[test]
fn constrained_states_never_go_negative() {
    let times: Vec<f64> = (0..=20).map(|i| 0.5 * i as f64).collect();
    let traj = integrate(&times, &[1.0], &michaelis_menten, &[], &Options::default()).unwrap();
    for (t, y) in &traj {
        assert!(y[0] >= 0.0, "negative state {} at t = {t}", y[0]);
    }
    assert!(traj.y[traj.len() - 1][0] < 1e-3);
}

#[test]
fn repeated_output_times_repeat_rows() {
    let traj = integrate(&[0.0, 1.0, 1.0, 2.0], &[1.0], &decay, &[1.0], &tight()).unwrap();
    assert_eq!(traj.len(), 4);
    assert_eq!(traj.y[1], traj.y[2]);
    assert_relative_eq!(traj.y[3][0], (-2.0f64).exp(), max_relative = 1e-5);
}
