//! Run statistics of the integrator.

/// Counters accumulated over the lifetime of one solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// The number of right-hand side or residual evaluations
    pub nfev: usize,
    /// The number of Jacobian evaluations
    pub njev: usize,
    /// The number of LU factorizations
    pub nlu: usize,
    /// The number of steps attempted
    pub nstep: usize,
    /// The number of accepted steps
    pub naccpt: usize,
    /// The number of steps rejected by the error test
    pub nrejct: usize,
    /// The number of corrector convergence failures
    pub nncf: usize,
    /// The number of step reductions forced by constraints
    pub nconstr: usize,
    /// The number of re-initializations
    pub nreinit: usize,
}
