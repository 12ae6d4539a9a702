//! CSV sink
//!
//! Files are named `<prefix><part>_<YYYY-MM-DD>.csv` inside the output
//! directory, where the date is the start of the report window. Null values
//! become empty cells, strings are written as-is and everything else as JSON
//! text.

use crate::adapters::traits::DatasetSink;
use crate::domain::{Dataset, ExtractError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Output file name for one report part
pub fn file_name(prefix: &str, part: &str, date: NaiveDate) -> String {
    format!("{prefix}{part}_{}.csv", date.format("%Y-%m-%d"))
}

/// Writes datasets as CSV files into one directory
#[derive(Debug, Clone)]
pub struct CsvSink {
    output_dir: PathBuf,
    file_date: NaiveDate,
}

impl CsvSink {
    pub fn new(output_dir: impl Into<PathBuf>, file_date: NaiveDate) -> Self {
        Self {
            output_dir: output_dir.into(),
            file_date,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path a part would be written to
    pub fn path_for(&self, prefix: &str, part: &str) -> PathBuf {
        self.output_dir.join(file_name(prefix, part, self.file_date))
    }
}

#[async_trait]
impl DatasetSink for CsvSink {
    async fn write(
        &self,
        prefix: &str,
        part: &str,
        columns: &[String],
        dataset: &Dataset,
    ) -> Result<PathBuf> {
        let columns = if columns.is_empty() {
            dataset.columns()
        } else {
            columns.to_vec()
        };
        let bytes = render_csv(&columns, dataset)?;

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            ExtractError::Sink(format!(
                "Failed to create output directory {}: {e}",
                self.output_dir.display()
            ))
        })?;

        let path = self.path_for(prefix, part);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ExtractError::Sink(format!("Failed to write {}: {e}", path.display())))?;

        tracing::info!(path = %path.display(), rows = dataset.len(), "Wrote CSV file");
        Ok(path)
    }
}

fn render_csv(columns: &[String], dataset: &Dataset) -> Result<Vec<u8>> {
    if columns.is_empty() {
        return Ok(Vec::new());
    }
    let mut writer = ::csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for record in dataset {
        writer.write_record(
            columns
                .iter()
                .map(|c| cell(record.get(c).unwrap_or(&Value::Null))),
        )?;
    }
    writer
        .into_inner()
        .map_err(|e| ExtractError::Sink(format!("Failed to flush CSV buffer: {e}")))
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::record_from_value;
    use serde_json::json;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("jarp_", "report", date()), "jarp_report_2024-01-01.csv");
    }

    #[test]
    fn test_render_csv_cells() {
        let dataset: Dataset = vec![
            record_from_value(json!({"a": "x, y", "b": 1.5, "c": null})),
            record_from_value(json!({"a": "plain", "b": true})),
        ]
        .into();
        let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let text = String::from_utf8(render_csv(&columns, &dataset).unwrap()).unwrap();
        assert_eq!(text, "a,b,c\n\"x, y\",1.5,\nplain,true,\n");
    }

    #[tokio::test]
    async fn test_write_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let sink = CsvSink::new(temp_dir.path().join("nested"), date());
        let dataset: Dataset = vec![record_from_value(json!({"invoice_no": "100"}))].into();

        let path = sink.write("jarp_", "invoice", &[], &dataset).await.unwrap();

        assert_eq!(path.file_name().unwrap(), "jarp_invoice_2024-01-01.csv");
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "invoice_no\n100\n");
    }
}
