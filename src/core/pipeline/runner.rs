//! Report execution
//!
//! [`PipelineRunner`] walks the steps of one [`ReportDefinition`], keeping
//! every produced dataset by alias. A fetch whose key source yields no keys,
//! or that returns no rows, ends the report early with
//! [`ReportOutcome::NoData`] unless the step is marked optional; later views
//! are then never queried.

use super::definition::{FetchStep, JoinStep, OutputDefinition, ReportDefinition, StepDefinition};
use super::join::{build_disjunction, distinct_by, distinct_values, join, project, sort_by};
use crate::adapters::traits::{DataSource, DatasetSink};
use crate::domain::{Dataset, DateRange, ExtractError, QuerySpec, Result};
use crate::{log_report_complete, log_report_start};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// How a report ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// All outputs were written
    Completed { files: Vec<PathBuf>, rows: usize },

    /// A required step produced nothing; no outputs were written
    NoData { stage: String },
}

impl ReportOutcome {
    pub fn files(&self) -> &[PathBuf] {
        match self {
            ReportOutcome::Completed { files, .. } => files,
            ReportOutcome::NoData { .. } => &[],
        }
    }
}

/// Runs report definitions against a data source and a sink
pub struct PipelineRunner {
    source: Arc<dyn DataSource>,
    sink: Arc<dyn DatasetSink>,
    window: DateRange,
    export_intermediates: bool,
}

impl PipelineRunner {
    pub fn new(
        source: Arc<dyn DataSource>,
        sink: Arc<dyn DatasetSink>,
        window: DateRange,
        export_intermediates: bool,
    ) -> Self {
        Self {
            source,
            sink,
            window,
            export_intermediates,
        }
    }

    pub fn window(&self) -> DateRange {
        self.window
    }

    /// Executes every step of `report`, then writes its outputs
    ///
    /// # Errors
    ///
    /// Returns `ReportExecution` naming the failing step when a fetch or join
    /// fails, and propagates sink errors.
    pub async fn run(&self, report: &ReportDefinition) -> Result<ReportOutcome> {
        let started = Instant::now();
        let prefix = report.file_prefix();
        log_report_start!(report.name, report.steps.len());

        let mut datasets: HashMap<String, Dataset> = HashMap::new();
        let mut files = Vec::new();

        for step in &report.steps {
            let (dataset, export_part) = match step {
                StepDefinition::Fetch(fetch) => {
                    match self.run_fetch(&report.name, fetch, &datasets).await? {
                        Some(dataset) => (dataset, fetch.export_part.as_deref()),
                        None => {
                            tracing::info!(
                                report = %report.name,
                                stage = %fetch.alias,
                                "No data; skipping remaining steps"
                            );
                            return Ok(ReportOutcome::NoData {
                                stage: fetch.alias.clone(),
                            });
                        }
                    }
                }
                StepDefinition::Join(step) => (self.run_join(&report.name, step, &datasets)?, None),
            };

            if self.export_intermediates {
                let part = export_part.unwrap_or(step.alias());
                let path = self.sink.write(&prefix, part, &[], &dataset).await?;
                files.push(path);
            }
            datasets.insert(step.alias().to_string(), dataset);
        }

        let mut rows = 0;
        for output in &report.outputs {
            let dataset = lookup(&datasets, &output.dataset, &report.name)?;
            let rendered = render_output(dataset, output);
            rows += rendered.len();
            let path = self
                .sink
                .write(&prefix, &output.part, &output.columns, &rendered)
                .await?;
            files.push(path);
        }

        log_report_complete!(report.name, rows, started.elapsed());
        Ok(ReportOutcome::Completed { files, rows })
    }

    /// Fetches one view; `None` means the report has nothing further to do
    async fn run_fetch(
        &self,
        report: &str,
        step: &FetchStep,
        datasets: &HashMap<String, Dataset>,
    ) -> Result<Option<Dataset>> {
        let spec = match self.fetch_spec(report, step, datasets)? {
            Some(spec) => spec,
            None if step.optional => return Ok(Some(Dataset::new())),
            None => return Ok(None),
        };

        let outcome = self.source.fetch(&spec).await.map_err(|e| {
            ExtractError::ReportExecution(format!(
                "step '{}' on '{}': {e}",
                step.alias, step.endpoint
            ))
        })?;

        tracing::info!(
            report = %report,
            step = %step.alias,
            endpoint = %step.endpoint,
            records = outcome.dataset.len(),
            chunks = outcome.chunks,
            url = %outcome.url,
            "Fetched dataset"
        );

        if outcome.dataset.is_empty() && !step.optional {
            return Ok(None);
        }

        let mut dataset = outcome.dataset;
        if !step.distinct_on.is_empty() {
            let before = dataset.len();
            dataset = distinct_by(dataset, &step.distinct_on);
            tracing::debug!(
                report = %report,
                step = %step.alias,
                before,
                after = dataset.len(),
                "Dropped duplicate keys"
            );
        }
        Ok(Some(dataset))
    }

    /// Builds the query for a fetch step; `None` when its key source is empty
    fn fetch_spec(
        &self,
        report: &str,
        step: &FetchStep,
        datasets: &HashMap<String, Dataset>,
    ) -> Result<Option<QuerySpec>> {
        let mut builder = QuerySpec::builder(&step.endpoint)
            .select(&step.select)
            .filters(&step.filters)
            .order_by(&step.order_by);

        if step.date_window {
            let range = match step.lookback_days {
                Some(days) => self.window.lookback(days),
                None => self.window,
            };
            builder = builder.date_range(range);
        }
        if let Some(field) = &step.date_field {
            builder = builder.date_field(field);
        }
        if let Some(page_size) = step.page_size {
            builder = builder.page_size(page_size);
        }

        if let Some(keys) = &step.keys {
            let source = lookup(datasets, &keys.from, report)?;
            for field in &keys.fields {
                let values = distinct_values(source, &field.source);
                match build_disjunction(field.target(), &values) {
                    Some(disjunction) => builder = builder.filter(disjunction),
                    None => {
                        tracing::debug!(
                            report = %report,
                            step = %step.alias,
                            field = %field.source,
                            "Key source has no usable values"
                        );
                        return Ok(None);
                    }
                }
            }
        }

        builder.build().map(Some).map_err(|e| {
            ExtractError::ReportExecution(format!(
                "step '{}' on '{}': {e}",
                step.alias, step.endpoint
            ))
        })
    }

    fn run_join(
        &self,
        report: &str,
        step: &JoinStep,
        datasets: &HashMap<String, Dataset>,
    ) -> Result<Dataset> {
        let left = lookup(datasets, &step.left, report)?;
        let right = lookup(datasets, &step.right, report)?;
        let joined = join(left, right, &step.on, step.right_keys(), step.how);

        tracing::info!(
            report = %report,
            step = %step.into,
            left = left.len(),
            right = right.len(),
            rows = joined.len(),
            how = ?step.how,
            "Joined datasets"
        );
        Ok(joined)
    }
}

fn lookup<'a>(
    datasets: &'a HashMap<String, Dataset>,
    alias: &str,
    report: &str,
) -> Result<&'a Dataset> {
    datasets.get(alias).ok_or_else(|| {
        ExtractError::ReportExecution(format!("report '{report}' has no dataset '{alias}'"))
    })
}

/// Sorts on the full records, then projects, so sort keys need not be output columns
fn render_output(dataset: &Dataset, output: &OutputDefinition) -> Dataset {
    let sorted = sort_by(dataset.clone(), &output.sort_by);
    project(&sorted, &output.columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pipeline::definition::{KeyField, KeySource};
    use chrono::NaiveDate;

    fn fetch(alias: &str) -> FetchStep {
        FetchStep {
            alias: alias.to_string(),
            endpoint: format!("p21_view_{alias}"),
            select: vec!["id".to_string()],
            filters: Vec::new(),
            order_by: Vec::new(),
            date_window: true,
            date_field: Some("invoice_date".to_string()),
            lookback_days: None,
            page_size: Some(250),
            keys: None,
            distinct_on: Vec::new(),
            optional: false,
            export_part: None,
        }
    }

    struct NoSource;

    #[async_trait::async_trait]
    impl DataSource for NoSource {
        async fn fetch(&self, _spec: &QuerySpec) -> Result<crate::adapters::FetchOutcome> {
            Err(ExtractError::ReportExecution("unused".to_string()))
        }
    }

    struct NoSink;

    #[async_trait::async_trait]
    impl DatasetSink for NoSink {
        async fn write(&self, _: &str, _: &str, _: &[String], _: &Dataset) -> Result<PathBuf> {
            Ok(PathBuf::new())
        }
    }

    fn runner() -> PipelineRunner {
        let window =
            DateRange::from_dates(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), None).unwrap();
        PipelineRunner::new(Arc::new(NoSource), Arc::new(NoSink), window, false)
    }

    #[test]
    fn test_fetch_spec_applies_window_and_paging() {
        let spec = runner()
            .fetch_spec("r", &fetch("invoice"), &HashMap::new())
            .unwrap()
            .unwrap();
        assert_eq!(spec.page_size(), 250);
        assert_eq!(
            spec.filter_expression().unwrap(),
            "invoice_date ge 2024-03-01T00:00:00Z and invoice_date le 2024-03-31T23:59:59Z"
        );
    }

    #[test]
    fn test_fetch_spec_uses_lookback_window() {
        let mut step = fetch("sales");
        step.lookback_days = Some(365);
        let spec = runner().fetch_spec("r", &step, &HashMap::new()).unwrap().unwrap();
        assert_eq!(
            spec.filter_expression().unwrap(),
            "invoice_date ge 2023-03-02T00:00:00Z and invoice_date le 2024-03-01T00:00:00Z"
        );
    }

    #[test]
    fn test_fetch_spec_adds_key_disjunction() {
        let mut datasets = HashMap::new();
        datasets.insert(
            "invoice".to_string(),
            vec![
                crate::domain::record::record_from_value(serde_json::json!({"invoice_no": "1"})),
                crate::domain::record::record_from_value(serde_json::json!({"invoice_no": "2"})),
            ]
            .into(),
        );

        let mut step = fetch("line");
        step.date_window = false;
        step.keys = Some(KeySource {
            from: "invoice".to_string(),
            fields: vec![KeyField {
                source: "invoice_no".to_string(),
                target: Some("inv_no".to_string()),
            }],
        });

        let spec = runner().fetch_spec("r", &step, &datasets).unwrap().unwrap();
        assert_eq!(spec.filters(), ["(inv_no eq '1' or inv_no eq '2')"]);
    }

    #[test]
    fn test_empty_key_source_yields_no_spec() {
        let mut datasets = HashMap::new();
        datasets.insert("invoice".to_string(), Dataset::new());

        let mut step = fetch("line");
        step.keys = Some(KeySource {
            from: "invoice".to_string(),
            fields: vec![KeyField {
                source: "invoice_no".to_string(),
                target: None,
            }],
        });

        assert!(runner().fetch_spec("r", &step, &datasets).unwrap().is_none());
    }

    #[test]
    fn test_render_output_sorts_on_unprojected_field() {
        let dataset: Dataset = vec![
            crate::domain::record::record_from_value(serde_json::json!({"id": 1, "d": "2024-02"})),
            crate::domain::record::record_from_value(serde_json::json!({"id": 2, "d": "2024-01"})),
        ]
        .into();
        let output = OutputDefinition {
            dataset: "x".to_string(),
            part: "report".to_string(),
            columns: vec!["id".to_string()],
            sort_by: vec!["d".to_string()],
        };
        let rendered = render_output(&dataset, &output);
        let ids: Vec<i64> = rendered.iter().map(|r| r["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(rendered.columns(), vec!["id"]);
    }
}
