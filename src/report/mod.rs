//! Chart documents and report output.

pub mod chart;
pub mod generator;

pub use chart::*;
pub use generator::*;
