// Numerical methods

pub(crate) mod hinit;

pub mod bdf;
pub mod result;
pub mod settings;
