//! Run summary and reporting
//!
//! This module defines structures for tracking and reporting the results of
//! one run across all selected reports.

use crate::domain::{ExtractError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// A report that wrote its outputs
#[derive(Debug, Clone)]
pub struct CompletedReport {
    pub report: String,
    pub rows: usize,
    pub files: Vec<PathBuf>,
}

/// A report that failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFailure {
    pub report: String,
    pub message: String,
}

impl ReportFailure {
    pub fn new(report: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            report: report.into(),
            message: message.into(),
        }
    }
}

/// Summary of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Reports that wrote their outputs
    pub completed: Vec<CompletedReport>,

    /// Reports that stopped early for lack of data, with the stage that was empty
    pub no_data: Vec<(String, String)>,

    /// Reports that failed
    pub failures: Vec<ReportFailure>,

    /// Duration of the run
    pub duration: Duration,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn total_reports(&self) -> usize {
        self.completed.len() + self.no_data.len() + self.failures.len()
    }

    pub fn total_rows(&self) -> usize {
        self.completed.iter().map(|r| r.rows).sum()
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.completed.iter().flat_map(|r| r.files.iter())
    }

    /// Check if the run was successful (no report failed)
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turns collected failures into one aggregated error
    ///
    /// # Errors
    ///
    /// Returns `ReportExecution` listing every failed report.
    pub fn ensure_success(&self) -> Result<()> {
        if self.failures.is_empty() {
            return Ok(());
        }
        let details: Vec<String> = self
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.report, f.message))
            .collect();
        Err(ExtractError::ReportExecution(format!(
            "{} of {} reports failed: {}",
            self.failures.len(),
            self.total_reports(),
            details.join("; ")
        )))
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            reports = self.total_reports(),
            completed = self.completed.len(),
            no_data = self.no_data.len(),
            failed = self.failures.len(),
            rows = self.total_rows(),
            duration_secs = self.duration.as_secs(),
            "Run completed"
        );

        for (report, stage) in &self.no_data {
            tracing::info!(report = %report, stage = %stage, "Report had no data");
        }
        for failure in &self.failures {
            tracing::warn!(
                report = %failure.report,
                message = %failure.message,
                "Report failed"
            );
        }
    }
}
