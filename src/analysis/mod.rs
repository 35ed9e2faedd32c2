//! Analytics engine.
//!
//! Pure transformations from stored simulation runs to time series and
//! grouped statistics. Nothing in here performs I/O.

pub mod aggregator;
pub mod resampler;
pub mod selection;
pub mod trust;

pub use aggregator::*;
pub use resampler::*;
pub use selection::*;
pub use trust::*;
