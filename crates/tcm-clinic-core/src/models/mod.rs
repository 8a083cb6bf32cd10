//! Domain models for the clinic system.

mod formula;
mod herb;
mod patient;
mod prescription;

pub use formula::*;
pub use herb::*;
pub use patient::*;
pub use prescription::*;
