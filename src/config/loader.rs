//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::{HttpMethod, P21Config};
use crate::config::secret_string;
use crate::domain::errors::ExtractError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into [`P21Config`]
/// 4. Applies environment variable overrides (P21_* prefix)
/// 5. Validates the configuration
///
/// # Errors
///
/// Returns `Configuration` if the file cannot be read or parsed, a referenced
/// environment variable is missing, or validation fails.
///
/// # Examples
///
/// ```no_run
/// use p21_extract::config::loader::load_config;
///
/// let config = load_config("p21-extract.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<P21Config> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(ExtractError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        ExtractError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses configuration text with the same steps as [`load_config`]
pub fn parse_config(contents: &str) -> Result<P21Config> {
    let contents = substitute_env_vars(contents)?;

    let mut config: P21Config = toml::from_str(&contents)
        .map_err(|e| ExtractError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        ExtractError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error if a referenced environment variable is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| ExtractError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut result = String::with_capacity(input.len());
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            result.push_str(line);
            result.push('\n');
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    let placeholder = format!("${{{}}}", var_name);
                    processed_line = processed_line.replace(&placeholder, &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        result.push_str(&processed_line);
        result.push('\n');
    }

    if !missing_vars.is_empty() {
        return Err(ExtractError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(result)
}

/// Applies environment variable overrides using the P21_* prefix
///
/// Environment variables follow the pattern: P21_<SECTION>_<KEY>
/// For example: P21_API_BASE_URL, P21_RUN_OUTPUT_DIR
fn apply_env_overrides(config: &mut P21Config) -> Result<()> {
    // Application overrides
    if let Ok(val) = std::env::var("P21_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("P21_APPLICATION_DEBUG") {
        config.application.debug = val.parse().unwrap_or(false);
    }

    // API overrides
    if let Ok(val) = std::env::var("P21_API_BASE_URL") {
        config.api.base_url = val;
    }
    if let Ok(val) = std::env::var("P21_API_USERNAME") {
        config.api.username = Some(val);
    }
    if let Ok(val) = std::env::var("P21_API_PASSWORD") {
        config.api.password = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("P21_API_METHOD") {
        config.api.method = match val.to_lowercase().as_str() {
            "get" => HttpMethod::Get,
            "post" => HttpMethod::Post,
            other => {
                return Err(ExtractError::Configuration(format!(
                    "P21_API_METHOD must be 'get' or 'post', got '{other}'"
                )))
            }
        };
    }
    if let Ok(val) = std::env::var("P21_API_MAX_RETRIES") {
        if let Ok(retries) = val.parse() {
            config.api.retry.max_retries = retries;
        }
    }

    // Run overrides
    if let Ok(val) = std::env::var("P21_RUN_START_DATE") {
        config.run.start_date = Some(parse_date("P21_RUN_START_DATE", &val)?);
    }
    if let Ok(val) = std::env::var("P21_RUN_END_DATE") {
        config.run.end_date = Some(parse_date("P21_RUN_END_DATE", &val)?);
    }
    if let Ok(val) = std::env::var("P21_RUN_OUTPUT_DIR") {
        config.run.output_dir = val;
    }
    if let Ok(val) = std::env::var("P21_RUN_REPORT_GROUPS") {
        config.run.report_groups = val
            .split(',')
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty())
            .collect();
    }
    if let Ok(val) = std::env::var("P21_RUN_MAX_CONCURRENT_REPORTS") {
        if let Ok(workers) = val.parse() {
            config.run.max_concurrent_reports = workers;
        }
    }

    // Logging overrides
    if let Ok(val) = std::env::var("P21_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(false);
    }
    if let Ok(val) = std::env::var("P21_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }

    Ok(())
}

fn parse_date(var: &str, value: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| {
        ExtractError::Configuration(format!("{var} must be YYYY-MM-DD, got '{value}': {e}"))
    })
}
