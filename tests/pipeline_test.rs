//! Integration tests for report pipelines and the run coordinator
//!
//! Reports run against an in-memory data source that records every query, and
//! write real CSV files into a temporary directory.

use async_trait::async_trait;
use chrono::NaiveDate;
use p21_extract::adapters::csv::CsvSink;
use p21_extract::adapters::{DataSource, FetchOutcome};
use p21_extract::core::pipeline::{PipelineRunner, ReportDefinition, ReportOutcome};
use p21_extract::core::run::ReportCoordinator;
use p21_extract::domain::record::record_from_value;
use p21_extract::domain::{DataFetchError, Dataset, DateRange, ExtractError, QuerySpec, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Serves canned rows per endpoint and records every query
#[derive(Default)]
struct FakeSource {
    rows: HashMap<String, Vec<Value>>,
    failing: Vec<String>,
    calls: Mutex<Vec<QuerySpec>>,
}

impl FakeSource {
    fn with(mut self, endpoint: &str, rows: Vec<Value>) -> Self {
        self.rows.insert(endpoint.to_string(), rows);
        self
    }

    fn failing(mut self, endpoint: &str) -> Self {
        self.failing.push(endpoint.to_string());
        self
    }

    fn endpoints_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.endpoint().to_string())
            .collect()
    }

    fn call_for(&self, endpoint: &str) -> QuerySpec {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.endpoint() == endpoint)
            .cloned()
            .unwrap()
    }
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch(&self, spec: &QuerySpec) -> Result<FetchOutcome> {
        self.calls.lock().unwrap().push(spec.clone());
        if self.failing.iter().any(|e| e == spec.endpoint()) {
            return Err(DataFetchError::RequestFailed {
                status: 500,
                body: "view unavailable".to_string(),
            }
            .into());
        }
        let dataset: Dataset = self
            .rows
            .get(spec.endpoint())
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(record_from_value)
            .collect();
        Ok(FetchOutcome::single(dataset, format!("fake://{}", spec.endpoint())))
    }
}

#[derive(Deserialize)]
struct Reports {
    reports: Vec<ReportDefinition>,
}

fn reports(text: &str) -> Vec<ReportDefinition> {
    let parsed: Reports = toml::from_str(text).unwrap();
    for report in &parsed.reports {
        report.validate().unwrap();
    }
    parsed.reports
}

fn window() -> DateRange {
    DateRange::from_dates(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None).unwrap()
}

fn runner(source: Arc<FakeSource>, dir: &Path, export_intermediates: bool) -> PipelineRunner {
    let sink = Arc::new(CsvSink::new(dir, window().start().date()));
    PipelineRunner::new(source, sink, window(), export_intermediates)
}

const JARP: &str = r#"
[[reports]]
name = "jarp"
file_prefix = "jarp_"

[[reports.steps]]
kind = "fetch"
alias = "invoice"
endpoint = "p21_view_invoice_hdr"
select = ["invoice_no", "invoice_date", "bill2_name"]
filters = ["(ship_to_id eq 12755 or ship_to_id eq 15097)"]
date_window = true
date_field = "invoice_date"

[[reports.steps]]
kind = "fetch"
alias = "line"
endpoint = "p21_view_invoice_line"
select = ["invoice_no", "item_id", "qty_shipped"]
keys = { from = "invoice", fields = [{ source = "invoice_no" }] }

[[reports.steps]]
kind = "fetch"
alias = "supplier"
endpoint = "p21_view_inventory_supplier"
select = ["item_id", "supplier_id"]
keys = { from = "line", fields = [{ source = "item_id" }] }
optional = true

[[reports.steps]]
kind = "join"
left = "invoice"
right = "line"
on = ["invoice_no"]
into = "invoice_lines"

[[reports.steps]]
kind = "join"
left = "invoice_lines"
right = "supplier"
on = ["item_id"]
how = "outer"
into = "combined"

[[reports.outputs]]
dataset = "combined"
part = "combined"
columns = ["invoice_no", "bill2_name", "item_id", "qty_shipped", "supplier_id"]
sort_by = ["invoice_date", "invoice_no"]
"#;

fn jarp_source() -> FakeSource {
    FakeSource::default()
        .with(
            "p21_view_invoice_hdr",
            vec![
                json!({"invoice_no": "1002", "invoice_date": "2024-01-09", "bill2_name": "Acme, Inc."}),
                json!({"invoice_no": "1001", "invoice_date": "2024-01-03", "bill2_name": "O'Brien"}),
            ],
        )
        .with(
            "p21_view_invoice_line",
            vec![
                json!({"invoice_no": "1001", "item_id": "A-1", "qty_shipped": 2}),
                json!({"invoice_no": "1001", "item_id": "B-2", "qty_shipped": 1}),
                json!({"invoice_no": "1002", "item_id": "A-1", "qty_shipped": 5}),
            ],
        )
        .with(
            "p21_view_inventory_supplier",
            vec![json!({"item_id": "A-1", "supplier_id": 77})],
        )
}

#[tokio::test]
async fn test_multi_stage_report_writes_joined_output() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(jarp_source());
    let report = reports(JARP).remove(0);

    let outcome = runner(source.clone(), dir.path(), false)
        .run(&report)
        .await
        .unwrap();

    match &outcome {
        ReportOutcome::Completed { files, rows } => {
            assert_eq!(*rows, 3);
            assert_eq!(files.len(), 1);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let invoice = source.call_for("p21_view_invoice_hdr");
    assert_eq!(
        invoice.filter_expression().unwrap(),
        "invoice_date ge 2024-01-01T00:00:00Z and invoice_date le 2024-01-31T23:59:59Z \
         and (ship_to_id eq 12755 or ship_to_id eq 15097)"
    );

    let line = source.call_for("p21_view_invoice_line");
    assert_eq!(
        line.filters(),
        ["(invoice_no eq '1002' or invoice_no eq '1001')"]
    );
    assert!(line.date_range().is_none());

    let supplier = source.call_for("p21_view_inventory_supplier");
    assert_eq!(supplier.filters(), ["(item_id eq 'A-1' or item_id eq 'B-2')"]);

    let contents =
        std::fs::read_to_string(dir.path().join("jarp_combined_2024-01-01.csv")).unwrap();
    assert_eq!(
        contents,
        "invoice_no,bill2_name,item_id,qty_shipped,supplier_id\n\
         1001,O'Brien,A-1,2,77\n\
         1001,O'Brien,B-2,1,\n\
         1002,\"Acme, Inc.\",A-1,5,77\n"
    );
}

#[tokio::test]
async fn test_empty_first_stage_skips_later_views() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(jarp_source().with("p21_view_invoice_hdr", Vec::new()));
    let report = reports(JARP).remove(0);

    let outcome = runner(source.clone(), dir.path(), false)
        .run(&report)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        ReportOutcome::NoData {
            stage: "invoice".to_string()
        }
    );
    assert_eq!(source.endpoints_called(), vec!["p21_view_invoice_hdr"]);
    assert!(!dir.path().join("jarp_combined_2024-01-01.csv").exists());
}

#[tokio::test]
async fn test_empty_optional_stage_does_not_stop_report() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(jarp_source().with("p21_view_inventory_supplier", Vec::new()));
    let report = reports(JARP).remove(0);

    let outcome = runner(source, dir.path(), false)
        .run(&report)
        .await
        .unwrap();

    assert!(matches!(outcome, ReportOutcome::Completed { rows: 3, .. }));
    let contents =
        std::fs::read_to_string(dir.path().join("jarp_combined_2024-01-01.csv")).unwrap();
    assert!(contents.lines().skip(1).all(|line| line.ends_with(',')));
}

#[tokio::test]
async fn test_debug_mode_exports_intermediate_datasets() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(jarp_source());
    let report = reports(JARP).remove(0);

    let outcome = runner(source, dir.path(), true)
        .run(&report)
        .await
        .unwrap();

    assert_eq!(outcome.files().len(), 6);
    for part in ["invoice", "line", "supplier", "invoice_lines", "combined"] {
        assert!(
            dir.path().join(format!("jarp_{part}_2024-01-01.csv")).exists(),
            "missing {part}"
        );
    }
}

#[tokio::test]
async fn test_failed_step_names_step_and_endpoint() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(jarp_source().failing("p21_view_invoice_line"));
    let report = reports(JARP).remove(0);

    let err = runner(source, dir.path(), false)
        .run(&report)
        .await
        .unwrap_err();

    match err {
        ExtractError::ReportExecution(message) => {
            assert!(message.contains("step 'line' on 'p21_view_invoice_line'"));
            assert!(message.contains("view unavailable"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

const TWO_REPORTS: &str = r#"
[[reports]]
name = "broken"

[[reports.steps]]
kind = "fetch"
alias = "po"
endpoint = "p21_view_po_hdr"
select = ["po_no"]
filters = ["complete eq 'N'"]

[[reports.outputs]]
dataset = "po"
part = "open_po"
columns = ["po_no"]

[[reports]]
name = "inventory"

[[reports.steps]]
kind = "fetch"
alias = "inv"
endpoint = "p21_view_inv_mast"
select = ["item_id"]
filters = ["delete_flag eq 'N'"]

[[reports.outputs]]
dataset = "inv"
part = "items"
columns = ["item_id"]

[[reports]]
name = "quiet"

[[reports.steps]]
kind = "fetch"
alias = "orders"
endpoint = "p21_view_oe_hdr"
select = ["order_no"]
date_window = true
"#;

fn two_report_source() -> FakeSource {
    FakeSource::default()
        .failing("p21_view_po_hdr")
        .with(
            "p21_view_inv_mast",
            vec![json!({"item_id": "A-1"}), json!({"item_id": "B-2"})],
        )
}

#[tokio::test]
async fn test_coordinator_collects_failures() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(two_report_source());
    let coordinator =
        ReportCoordinator::new(Arc::new(runner(source, dir.path(), false)), 2, false);

    let summary = coordinator.execute(reports(TWO_REPORTS)).await.unwrap();

    assert_eq!(summary.total_reports(), 3);
    assert_eq!(summary.completed.len(), 1);
    assert_eq!(summary.completed[0].report, "inventory");
    assert_eq!(summary.completed[0].rows, 2);
    assert_eq!(
        summary.no_data,
        vec![("quiet".to_string(), "orders".to_string())]
    );
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].report, "broken");
    assert!(!summary.is_successful());

    let err = summary.ensure_success().unwrap_err();
    assert!(err.to_string().contains("1 of 3 reports failed"));
    assert!(dir.path().join("inventory_items_2024-01-01.csv").exists());
}

#[tokio::test]
async fn test_coordinator_fail_fast_stops_run() {
    let dir = TempDir::new().unwrap();
    let source = Arc::new(two_report_source());
    let coordinator =
        ReportCoordinator::new(Arc::new(runner(source, dir.path(), false)), 1, true);

    let err = coordinator
        .execute(reports(TWO_REPORTS))
        .await
        .unwrap_err();

    match err {
        ExtractError::ReportExecution(message) => {
            assert!(message.starts_with("report 'broken' failed:"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}
