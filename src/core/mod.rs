//! Core business logic for p21-extract.
//!
//! # Modules
//!
//! - [`pipeline`] - Report definitions, joins and step execution
//! - [`run`] - Concurrent execution of the selected reports
//!
//! # Run Workflow
//!
//! 1. **Select**: Pick reports by group and name from the configuration
//! 2. **Fetch**: Query each view, narrowing later views by earlier keys
//! 3. **Join**: Combine datasets in memory
//! 4. **Write**: Project, sort and hand each output to the sink
//! 5. **Report**: Summarize completed, empty and failed reports
//!
//! # Example
//!
//! ```rust,no_run
//! use p21_extract::adapters::csv::CsvSink;
//! use p21_extract::adapters::odata::ODataClient;
//! use p21_extract::config::load_config;
//! use p21_extract::core::pipeline::PipelineRunner;
//! use p21_extract::core::run::ReportCoordinator;
//! use chrono::NaiveDate;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("p21-extract.toml")?;
//! let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let window = config.run.date_range(today)?;
//!
//! let client = Arc::new(ODataClient::new(&config.api)?);
//! let sink = Arc::new(CsvSink::new(&config.run.output_dir, window.start().date()));
//! let runner = Arc::new(PipelineRunner::new(client, sink, window, false));
//!
//! let coordinator = ReportCoordinator::new(runner, 5, false);
//! let summary = coordinator.execute(config.selected_reports()).await?;
//! println!("Completed: {}", summary.completed.len());
//! println!("Failed: {}", summary.failures.len());
//! # Ok(())
//! # }
//! ```

pub mod pipeline;
pub mod run;
