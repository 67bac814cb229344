//! Progress reporting for analysis runs.
//!
//! A [`ProgressTracker`] is created per run and wraps whatever
//! [`ProgressPublisher`] the application provides. It keeps its own copy of
//! the run's [`ProgressState`] so that checkpoints reach the publisher with a
//! non-decreasing percent, and nothing at all is sent after a terminal status.

mod logging;
mod tracker;
pub mod test_utils;

pub use fl_core::{AnalysisStatus, ProgressPublisher, ProgressState, ProgressUpdate};
pub use logging::LoggingPublisher;
pub use tracker::ProgressTracker;
