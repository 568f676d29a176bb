//! Survey input handling.

pub mod loader;

pub use loader::{load_submission, SurveySubmission};
