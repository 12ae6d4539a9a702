//! Configuration schema types
//!
//! This module defines the TOML configuration structure for p21-extract.

use crate::config::SecretString;
use crate::core::pipeline::ReportDefinition;
use crate::domain::query::start_of_month;
use crate::domain::{Credential, DateRange};
use chrono::NaiveDate;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

/// Root configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct P21Config {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// OData service connection settings
    pub api: ApiConfig,

    /// Batch run settings
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report pipeline definitions
    #[serde(default)]
    pub reports: Vec<ReportDefinition>,
}

impl P21Config {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.api.validate()?;
        self.run.validate()?;
        self.logging.validate()?;

        let mut seen: Vec<&str> = Vec::new();
        for report in &self.reports {
            if seen.contains(&report.name.as_str()) {
                return Err(format!("Duplicate report name '{}'", report.name));
            }
            seen.push(&report.name);
            report
                .validate()
                .map_err(|e| format!("report '{}': {e}", report.name))?;
        }
        Ok(())
    }

    /// Reports selected by `run.report_groups`; an empty group list selects all
    pub fn selected_reports(&self) -> Vec<ReportDefinition> {
        self.reports
            .iter()
            .filter(|r| self.run.selects_group(r.group.as_deref()))
            .cloned()
            .collect()
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Debug mode: export intermediate datasets and stop on the first failure
    #[serde(default)]
    pub debug: bool,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            debug: false,
        }
    }
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

/// HTTP method used for data requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    fn validate(&self) -> Result<(), String> {
        if self.backoff_multiplier < 1.0 {
            return Err("retry.backoff_multiplier must be >= 1.0".to_string());
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err("retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string());
        }
        Ok(())
    }
}

/// Settings for splitting oversized OR filters into several requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Encoded URL length above which chunking is attempted
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    /// Equality conditions per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// A disjunction needs more than this many conditions to be chunked
    #[serde(default = "default_min_conditions")]
    pub min_conditions: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_url_length: default_max_url_length(),
            chunk_size: default_chunk_size(),
            min_conditions: default_min_conditions(),
        }
    }
}

impl ChunkingConfig {
    fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunking.chunk_size must be greater than 0".to_string());
        }
        if self.max_url_length < 256 {
            return Err("chunking.max_url_length must be at least 256".to_string());
        }
        Ok(())
    }
}

/// OData service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the ERP server, e.g. `https://p21.example.com`
    pub base_url: String,

    /// Path between the base URL and the view name
    #[serde(default = "default_service_path")]
    pub service_path: String,

    /// Username sent to the identity endpoint
    #[serde(default)]
    pub username: Option<String>,

    /// Password sent to the identity endpoint
    /// Stored securely in memory and automatically zeroized on drop
    #[serde(default)]
    pub password: Option<SecretString>,

    /// Method used for data requests
    #[serde(default)]
    pub method: HttpMethod,

    /// Data request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Token request timeout in seconds
    #[serde(default = "default_auth_timeout_seconds")]
    pub auth_timeout_seconds: u64,

    /// Idle connections kept per host
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,

    /// Optional cap on requests per second across all workers
    #[serde(default)]
    pub requests_per_second: Option<f64>,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

impl ApiConfig {
    /// Creates a config with defaults for everything but the connection details
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            service_path: default_service_path(),
            username: Some(username.into()),
            password: Some(password),
            method: HttpMethod::default(),
            timeout_seconds: default_timeout_seconds(),
            auth_timeout_seconds: default_auth_timeout_seconds(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            requests_per_second: None,
            retry: RetryConfig::default(),
            chunking: ChunkingConfig::default(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.base_url)
            .map_err(|e| format!("api.base_url '{}' is not a valid URL: {e}", self.base_url))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!(
                "api.base_url must use http or https, got '{}'",
                parsed.scheme()
            ));
        }

        match &self.username {
            Some(u) if !u.trim().is_empty() => {}
            _ => return Err("api.username is required".to_string()),
        }
        match &self.password {
            Some(p) if !p.expose_secret().is_empty() => {}
            _ => return Err("api.password is required".to_string()),
        }

        if self.timeout_seconds == 0 || self.auth_timeout_seconds == 0 {
            return Err("api timeouts must be greater than 0".to_string());
        }
        if let Some(rps) = self.requests_per_second {
            if rps <= 0.0 {
                return Err("api.requests_per_second must be greater than 0".to_string());
            }
        }

        self.retry.validate()?;
        self.chunking.validate()?;
        Ok(())
    }

    /// Builds the credential from the configured username and password
    pub fn credential(&self) -> Result<Credential, String> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Credential::new(username, password.clone())),
            _ => Err("api.username and api.password are required".to_string()),
        }
    }
}

/// Batch run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// First day of the report window; defaults to the first of the current month
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Last day of the report window; defaults to the end of the start month
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Directory receiving CSV files
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Groups to run; empty runs every report
    #[serde(default)]
    pub report_groups: Vec<String>,

    /// Reports running at the same time
    #[serde(default = "default_max_concurrent_reports")]
    pub max_concurrent_reports: usize,

    /// Stop at the first failed report
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            output_dir: default_output_dir(),
            report_groups: Vec::new(),
            max_concurrent_reports: default_max_concurrent_reports(),
            fail_fast: false,
        }
    }
}

impl RunConfig {
    fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_reports == 0 {
            return Err("run.max_concurrent_reports must be greater than 0".to_string());
        }
        if self.output_dir.trim().is_empty() {
            return Err("run.output_dir cannot be empty".to_string());
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(format!(
                    "run.end_date {end} is before run.start_date {start}"
                ));
            }
        }
        Ok(())
    }

    /// Resolves the report window relative to `today`
    pub fn date_range(&self, today: NaiveDate) -> crate::domain::Result<DateRange> {
        let start = self.start_date.unwrap_or_else(|| start_of_month(today));
        DateRange::from_dates(start, self.end_date)
    }

    fn selects_group(&self, group: Option<&str>) -> bool {
        if self.report_groups.is_empty() {
            return true;
        }
        group.is_some_and(|g| self.report_groups.iter().any(|wanted| wanted == g))
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Write JSON logs to a local file
    #[serde(default)]
    pub local_enabled: bool,

    /// Directory for log files
    #[serde(default = "default_log_path")]
    pub local_path: String,

    /// Rotation policy (daily, hourly, never)
    #[serde(default = "default_log_rotation")]
    pub local_rotation: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: false,
            local_path: default_log_path(),
            local_rotation: default_log_rotation(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        if self.local_enabled && self.local_path.trim().is_empty() {
            return Err("logging.local_path is required when local_enabled = true".to_string());
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_url_length() -> usize {
    2048
}

fn default_chunk_size() -> usize {
    50
}

fn default_min_conditions() -> usize {
    3
}

fn default_service_path() -> String {
    "odataservice/odata/view".to_string()
}

fn default_timeout_seconds() -> u64 {
    60
}

fn default_auth_timeout_seconds() -> u64 {
    30
}

fn default_pool_max_idle_per_host() -> usize {
    10
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_max_concurrent_reports() -> usize {
    5
}

fn default_log_path() -> String {
    "logs".to_string()
}

fn default_log_rotation() -> String {
    "daily".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;

    fn minimal_toml() -> &'static str {
        r#"
[api]
base_url = "https://p21.example.com"
username = "api_user"
password = "secret"
"#
    }

    #[test]
    fn test_minimal_config_defaults() {
        let config: P21Config = toml::from_str(minimal_toml()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.application.log_level, "info");
        assert_eq!(config.api.service_path, "odataservice/odata/view");
        assert_eq!(config.api.method, HttpMethod::Get);
        assert_eq!(config.api.retry.max_retries, 3);
        assert_eq!(config.api.chunking.max_url_length, 2048);
        assert_eq!(config.api.chunking.chunk_size, 50);
        assert_eq!(config.run.max_concurrent_reports, 5);
        assert!(config.reports.is_empty());
    }

    #[test]
    fn test_missing_password_is_invalid() {
        let mut config: P21Config = toml::from_str(minimal_toml()).unwrap();
        config.api.password = None;
        let err = config.validate().unwrap_err();
        assert!(err.contains("password"));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config: P21Config = toml::from_str(minimal_toml()).unwrap();
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config: P21Config = toml::from_str(minimal_toml()).unwrap();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_chunk_size_is_invalid() {
        let mut config: P21Config = toml::from_str(minimal_toml()).unwrap();
        config.api.chunking.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_run_date_range_defaults_to_current_month() {
        let run = RunConfig::default();
        let today = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();
        let range = run.date_range(today).unwrap();
        assert_eq!(range.start().date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(range.end().date(), NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn test_run_rejects_inverted_dates() {
        let run = RunConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1),
            ..RunConfig::default()
        };
        assert!(run.validate().is_err());
    }

    #[test]
    fn test_group_selection() {
        let run = RunConfig {
            report_groups: vec!["monthly".to_string()],
            ..RunConfig::default()
        };
        assert!(run.selects_group(Some("monthly")));
        assert!(!run.selects_group(Some("daily")));
        assert!(!run.selects_group(None));
        assert!(RunConfig::default().selects_group(None));
    }

    #[test]
    fn test_credential_from_api_config() {
        let api = ApiConfig::new("https://p21.example.com", "u", secret_string("p".to_string()));
        let credential = api.credential().unwrap();
        assert_eq!(credential.username(), "u");
        assert_eq!(credential.password(), "p");
    }
}
