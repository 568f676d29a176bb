//! Concurrent survey analysis.
//!
//! [`SurveyAnalysisPipeline`] runs one [`worker::CategoryAnalysisWorker`] per
//! category and assembles the final result.

pub mod runner;
pub mod worker;

pub use runner::{PipelineOptions, SurveyAnalysisPipeline};
