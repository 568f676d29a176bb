//! Analysis modules.
//!
//! Grouping and scoring of survey answers, plus aggregation of the
//! per-category results.

pub mod aggregator;
pub mod grouper;
pub mod scoring;

pub use aggregator::*;
pub use grouper::*;
pub use scoring::*;
