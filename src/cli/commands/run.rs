//! Run command implementation
//!
//! This module implements the `run` command: it resolves the report window,
//! authenticates once against the OData service and runs the selected reports
//! into CSV files.

use crate::adapters::csv::CsvSink;
use crate::adapters::odata::ODataClient;
use crate::config::{load_config, P21Config};
use crate::core::pipeline::{PipelineRunner, ReportDefinition};
use crate::core::run::{ReportCoordinator, RunSummary};
use chrono::NaiveDate;
use clap::Args;
use std::sync::Arc;

/// Arguments for the run command
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// First day of the report window (YYYY-MM-DD)
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the report window (YYYY-MM-DD)
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Only run reports in this group (repeatable)
    #[arg(long)]
    pub group: Vec<String>,

    /// Only run the named report (repeatable)
    #[arg(long)]
    pub report: Vec<String>,

    /// Override the output directory
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Stop at the first failed report
    #[arg(long)]
    pub fail_fast: bool,

    /// Export intermediate datasets and stop at the first failure
    #[arg(long)]
    pub debug: bool,
}

impl RunArgs {
    /// Execute the run command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Starting run command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load configuration");
                eprintln!("Failed to load configuration: {e}");
                return Ok(2); // Configuration error exit code
            }
        };
        self.apply_overrides(&mut config);

        if let Err(e) = config.validate() {
            tracing::error!(error = %e, "Configuration validation failed");
            eprintln!("Configuration validation failed: {e}");
            return Ok(2);
        }

        let window = match config.run.date_range(today()) {
            Ok(w) => w,
            Err(e) => {
                eprintln!("Invalid report window: {e}");
                return Ok(2);
            }
        };

        let reports = self.select_reports(&config);
        if reports.is_empty() {
            println!("⚠️  No reports selected; nothing to do");
            return Ok(0);
        }

        let debug = config.application.debug;
        let fail_fast = config.run.fail_fast || debug;

        let client = match ODataClient::new(&config.api) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create OData client");
                eprintln!("Failed to create OData client: {e}");
                return Ok(2);
            }
        };

        if let Err(e) = client.authenticate().await {
            tracing::error!(error = %e, "Authentication failed");
            eprintln!("Authentication failed: {e}");
            return Ok(4); // Connection error exit code
        }

        let sink = Arc::new(CsvSink::new(&config.run.output_dir, window.start().date()));
        let runner = Arc::new(PipelineRunner::new(client, sink, window, debug));
        let coordinator =
            ReportCoordinator::new(runner, config.run.max_concurrent_reports, fail_fast);

        println!(
            "🚀 Running {} report(s) for {} to {}",
            reports.len(),
            window.start().date(),
            window.end().date()
        );
        println!();

        let summary = match coordinator.execute(reports).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "Run stopped");
                eprintln!("Run stopped: {e}");
                return Ok(1);
            }
        };

        print_summary(&summary);

        if let Err(e) = summary.ensure_success() {
            tracing::warn!(error = %e, "Run completed with failures");
            return Ok(1); // Partial success exit code
        }
        Ok(0)
    }

    fn apply_overrides(&self, config: &mut P21Config) {
        if let Some(start) = self.start_date {
            tracing::info!(start_date = %start, "Overriding start date from CLI");
            config.run.start_date = Some(start);
            // A configured end belongs to the configured start
            if self.end_date.is_none() {
                config.run.end_date = None;
            }
        }
        if let Some(end) = self.end_date {
            tracing::info!(end_date = %end, "Overriding end date from CLI");
            config.run.end_date = Some(end);
        }
        if !self.group.is_empty() {
            tracing::info!(groups = ?self.group, "Overriding report groups from CLI");
            config.run.report_groups = self.group.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.run.output_dir = dir.clone();
        }
        if self.fail_fast {
            config.run.fail_fast = true;
        }
        if self.debug {
            tracing::info!("Debug mode enabled from CLI");
            config.application.debug = true;
        }
    }

    /// Reports selected by group, then narrowed by `--report`
    fn select_reports(&self, config: &P21Config) -> Vec<ReportDefinition> {
        let mut reports = config.selected_reports();
        if !self.report.is_empty() {
            for name in &self.report {
                if !reports.iter().any(|r| &r.name == name) {
                    tracing::warn!(report = %name, "Requested report is not configured or not in the selected groups");
                }
            }
            reports.retain(|r| self.report.contains(&r.name));
        }
        reports
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("📊 Run Summary:");
    println!("  Reports: {}", summary.total_reports());
    println!("  Completed: {}", summary.completed.len());
    println!("  No Data: {}", summary.no_data.len());
    println!("  Failed: {}", summary.failures.len());
    println!("  Rows Written: {}", summary.total_rows());
    println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
    println!();

    for path in summary.files() {
        println!("  📄 {}", path.display());
    }
    for (report, stage) in &summary.no_data {
        println!("  ⏭️  {report}: no data at '{stage}'");
    }
    if !summary.failures.is_empty() {
        println!();
        println!("  ⚠️  Failures:");
        for failure in &summary.failures {
            println!("    - {}: {}", failure.report, failure.message);
        }
    }
    println!();
}
