//! Core traits and types used throughout the library.

pub mod adapter;
pub mod interpolate;
pub mod rhs;
pub mod tolerance;
