use ivpdose::{core::adapter::CallbackError, prelude::*};

mod common;
use common::{decay, zero};

#[test]
fn atol_shape_mismatch_is_an_input_error() {
    let options = Options::builder().atol([1e-6, 1e-6]).build();
    let err = integrate(&[0.0, 1.0], &[1.0, 0.0, 0.0], &zero, &[], &options).unwrap_err();
    assert!(matches!(err, Error::ToleranceShape { expected: 3, actual: 2 }));
    assert!(err.is_input());
}

#[test]
fn single_atol_entry_broadcasts() {
    let options = Options::builder().atol([1e-6]).build();
    let traj = integrate(&[0.0, 1.0], &[1.0, 0.0, 0.0], &zero, &[], &options).unwrap();
    assert_eq!(traj.len(), 2);
}

#[test]
fn wrong_length_derivative_aborts_the_call() {
    let rhs = |_t: f64, _y: &[f64], _p: &[f64]| vec![0.0];
    let err = integrate(&[0.0, 1.0], &[1.0, 1.0], &rhs, &[], &Options::default()).unwrap_err();
    match err {
        Error::Solver { step: Step::Advance, flag } => assert_eq!(
            flag,
            SolverFlag::CallbackFailure(CallbackError::LengthMismatch { expected: 2, actual: 1 })
        ),
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn event_target_out_of_range() {
    for state in [0, 4] {
        let events = [EventRecord::new(state, 0.5, 1.0)];
        let err = integrate_with_events(&[0.0, 1.0], &[1.0; 3], &zero, &[], &events, &Options::default())
            .unwrap_err();
        assert!(matches!(err, Error::EventTarget { record: 0, n_states: 3, .. }));
    }
}

#[test]
fn empty_state_fails_at_creation() {
    let err = integrate(&[0.0, 1.0], &[], &zero, &[], &Options::default()).unwrap_err();
    assert!(matches!(err, Error::Allocation { step: Step::Create }));
    assert!(!err.is_input());
}

#[test]
fn bad_time_vectors_and_rtol() {
    let options = Options::default();
    assert!(matches!(
        integrate(&[], &[1.0], &zero, &[], &options),
        Err(Error::EmptyTimePoints)
    ));
    assert!(matches!(
        integrate(&[0.0, 2.0, 1.0], &[1.0], &zero, &[], &options),
        Err(Error::UnsortedTimePoints { index: 2, .. })
    ));
    let negative = Options::builder().rtol(-1.0).build();
    assert!(matches!(
        integrate(&[0.0, 1.0], &[1.0], &zero, &[], &negative),
        Err(Error::RelativeTolerance(_))
    ));
}

struct Opaque;

impl RhsFunction for Opaque {
    fn evaluate(&self, _t: f64, _y: &[f64], _p: &[f64]) -> Result<Vec<f64>, CallbackError> {
        Err(CallbackError::Raised("never called".into()))
    }

    fn check_callable(&self) -> Result<(), CallbackError> {
        Err(CallbackError::NotCallable("opaque handle".into()))
    }
}

struct Failing;

impl RhsFunction for Failing {
    fn evaluate(&self, _t: f64, _y: &[f64], _p: &[f64]) -> Result<Vec<f64>, CallbackError> {
        Err(CallbackError::Raised("domain error".into()))
    }
}

#[test]
fn non_callable_model_is_rejected_up_front() {
    let err = integrate(&[0.0, 1.0], &[1.0], &Opaque, &[], &Options::default()).unwrap_err();
    assert!(matches!(err, Error::NotCallable(CallbackError::NotCallable(_))));
    assert!(err.is_input());
}

#[test]
fn raised_error_propagates_with_the_failing_step() {
    let err = integrate(&[0.0, 1.0], &[1.0], &Failing, &[], &Options::default()).unwrap_err();
    assert!(err.to_string().starts_with("advance failed"));
    assert_eq!(
        err.flag(),
        Some(&SolverFlag::CallbackFailure(CallbackError::Raised("domain error".into())))
    );
}

#[test]
fn step_budget_exhaustion_is_fatal() {
    let settings = Settings::builder().max_steps(1).build();
    let options = Options::builder().rtol(1e-8).atol(1e-10).settings(settings).build();
    let err = integrate(&[0.0, 100.0], &[1.0], &decay, &[1.0], &options).unwrap_err();
    let flag = err.flag().cloned();
    assert!(matches!(flag, Some(SolverFlag::TooMuchWork { steps: 1, .. })));
    assert_eq!(flag.map(|f| f.code()), Some(-1));
}

#[test]
fn jump_below_zero_breaks_the_constraint() {
    let events = [EventRecord::new(1, 1.0, -2.0)];
    let err = integrate_with_events(&[0.0, 1.0, 2.0], &[1.0], &zero, &[], &events, &Options::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Solver { step: Step::Advance, flag: SolverFlag::IllInput(_) }
    ));

    let free = Options::builder().non_negative(false).build();
    let traj = integrate_with_events(&[0.0, 1.0, 2.0], &[1.0], &zero, &[], &events, &free).unwrap();
    assert_eq!(traj.y[2], vec![-1.0]);
}
