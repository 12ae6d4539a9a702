//! Run orchestration
//!
//! - [`coordinator`] - Bounded concurrent execution of reports
//! - [`summary`] - Per-run results and exit reporting

pub mod coordinator;
pub mod summary;

pub use coordinator::ReportCoordinator;
pub use summary::{CompletedReport, ReportFailure, RunSummary};
