//! Export functionality for dispensing and catalog audits.

mod audit;
mod prescription;

pub use audit::*;
pub use prescription::*;
