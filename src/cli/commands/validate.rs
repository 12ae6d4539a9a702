//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the p21-extract configuration file.

use crate::config::load_config;
use crate::core::pipeline::StepDefinition;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates, so any error here is reported as a
    /// configuration error.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                println!();
                return Ok(2); // Configuration error exit code
            }
        };

        println!("✅ Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Debug: {}", config.application.debug);
        println!("  P21 Server: {}", config.api.base_url);
        println!("  Service Path: {}", config.api.service_path);
        println!("  Method: {:?}", config.api.method);
        println!("  Max Retries: {}", config.api.retry.max_retries);
        println!(
            "  Chunking: {} chars, {} conditions per chunk",
            config.api.chunking.max_url_length, config.api.chunking.chunk_size
        );
        println!("  Output Directory: {}", config.run.output_dir);
        println!(
            "  Concurrent Reports: {}",
            config.run.max_concurrent_reports
        );
        println!(
            "  Report Groups: {}",
            if config.run.report_groups.is_empty() {
                "All".to_string()
            } else {
                format!("{:?}", config.run.report_groups)
            }
        );
        println!();

        let selected: Vec<String> = config
            .selected_reports()
            .into_iter()
            .map(|r| r.name)
            .collect();
        println!("Reports ({} configured):", config.reports.len());
        for report in &config.reports {
            let fetches = report
                .steps
                .iter()
                .filter(|s| matches!(s, StepDefinition::Fetch(_)))
                .count();
            let marker = if selected.contains(&report.name) {
                "▶"
            } else {
                " "
            };
            println!(
                "  {marker} {} [{}]: {} fetches, {} joins, {} outputs",
                report.name,
                report.group.as_deref().unwrap_or("-"),
                fetches,
                report.steps.len() - fetches,
                report.outputs.len()
            );
        }
        println!();
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let code = ValidateArgs {}
            .execute(&path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(code, 2);
    }

    #[tokio::test]
    async fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p21-extract.toml");
        std::fs::write(
            &path,
            r#"
[api]
base_url = "https://p21.example.com"
username = "u"
password = "p"
"#,
        )
        .unwrap();

        let code = ValidateArgs {}
            .execute(&path.to_string_lossy())
            .await
            .unwrap();
        assert_eq!(code, 0);
    }
}
