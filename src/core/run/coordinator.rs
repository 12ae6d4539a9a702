//! Report coordinator - runs the selected reports of one invocation
//!
//! Reports are independent of each other and run concurrently, bounded by
//! `max_concurrent_reports`. Without fail-fast every report runs to its own
//! conclusion and failures are collected in the [`RunSummary`]; with fail-fast
//! the first failure cancels the reports still in flight.

use super::summary::{CompletedReport, ReportFailure, RunSummary};
use crate::core::pipeline::{PipelineRunner, ReportDefinition, ReportOutcome};
use crate::domain::{ExtractError, Result};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

/// Runs many reports through one [`PipelineRunner`]
pub struct ReportCoordinator {
    runner: Arc<PipelineRunner>,
    max_concurrent: usize,
    fail_fast: bool,
}

impl ReportCoordinator {
    pub fn new(runner: Arc<PipelineRunner>, max_concurrent: usize, fail_fast: bool) -> Self {
        Self {
            runner,
            max_concurrent: max_concurrent.max(1),
            fail_fast,
        }
    }

    /// Executes `reports` and summarizes the outcome
    ///
    /// # Errors
    ///
    /// With fail-fast, returns `ReportExecution` for the first failed report.
    /// Otherwise failures are recorded in the summary and this returns `Ok`.
    pub async fn execute(&self, reports: Vec<ReportDefinition>) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::new();

        tracing::info!(
            reports = reports.len(),
            max_concurrent = self.max_concurrent,
            fail_fast = self.fail_fast,
            "Starting run"
        );

        let mut results = stream::iter(reports.into_iter().enumerate())
            .map(|(index, report)| {
                let runner = Arc::clone(&self.runner);
                async move {
                    let outcome = runner.run(&report).await;
                    (index, report.name, outcome)
                }
            })
            .buffer_unordered(self.max_concurrent);

        let mut finished = Vec::new();
        while let Some((index, name, outcome)) = results.next().await {
            if let Err(e) = &outcome {
                tracing::error!(report = %name, error = %e, "Report failed");
                if self.fail_fast {
                    return Err(ExtractError::ReportExecution(format!(
                        "report '{name}' failed: {e}"
                    )));
                }
            }
            finished.push((index, name, outcome));
        }

        // keep configuration order regardless of completion order
        finished.sort_by_key(|(index, _, _)| *index);
        for (_, name, outcome) in finished {
            match outcome {
                Ok(ReportOutcome::Completed { files, rows }) => {
                    summary.completed.push(CompletedReport {
                        report: name,
                        rows,
                        files,
                    })
                }
                Ok(ReportOutcome::NoData { stage }) => summary.no_data.push((name, stage)),
                Err(e) => summary
                    .failures
                    .push(ReportFailure::new(name, e.to_string())),
            }
        }

        let summary = summary.with_duration(started.elapsed());
        summary.log_summary();
        Ok(summary)
    }
}
