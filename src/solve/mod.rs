//! Integration entry points: the event-aware driver, its sensitivity
//! extension and the residual (DAE) variant.

pub mod dae;
pub mod driver;
pub mod options;
pub mod sensitivity;
pub mod trajectory;

pub use dae::integrate_dae;
pub use driver::{integrate, integrate_with_events};
pub use options::Options;
pub use sensitivity::integrate_with_sensitivities;
pub use trajectory::{SensitivityTable, Trajectory, TrajectoryIter};
