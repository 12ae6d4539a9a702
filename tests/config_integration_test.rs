//! Integration tests for configuration loading and validation
//!
//! Tests that touch environment variables hold `ENV_MUTEX` so they do not
//! observe each other's overrides.

use p21_extract::config::{load_config, HttpMethod};
use p21_extract::core::pipeline::{JoinKind, StepDefinition};
use secrecy::ExposeSecret;
use std::io::Write;
use std::sync::Mutex;
use tempfile::NamedTempFile;

static ENV_MUTEX: Mutex<()> = Mutex::new(());

fn cleanup_env_vars() {
    for var in [
        "P21_APPLICATION_LOG_LEVEL",
        "P21_APPLICATION_DEBUG",
        "P21_API_BASE_URL",
        "P21_API_USERNAME",
        "P21_API_PASSWORD",
        "P21_API_METHOD",
        "P21_RUN_START_DATE",
        "P21_RUN_END_DATE",
        "P21_RUN_OUTPUT_DIR",
        "P21_RUN_REPORT_GROUPS",
        "TEST_P21_PASSWORD",
    ] {
        std::env::remove_var(var);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const MINIMAL: &str = r#"
[api]
base_url = "https://p21.example.com"
username = "api_user"
password = "api_pass"
"#;

#[test]
fn test_load_complete_config() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[application]
log_level = "debug"
debug = true

[api]
base_url = "https://p21.example.com"
service_path = "odataservice/odata/view"
username = "api_user"
password = "api_pass"
method = "post"
timeout_seconds = 90
requests_per_second = 4.0

[api.retry]
max_retries = 5
initial_delay_ms = 500
max_delay_ms = 10000
backoff_multiplier = 3.0

[api.chunking]
max_url_length = 4096
chunk_size = 100
min_conditions = 5

[run]
start_date = "2024-01-01"
end_date = "2024-01-31"
output_dir = "extracts"
report_groups = ["monthly"]
max_concurrent_reports = 2
fail_fast = true

[logging]
local_enabled = false
local_rotation = "hourly"

[[reports]]
name = "jarp"
group = "monthly"

[[reports.steps]]
kind = "fetch"
alias = "invoice"
endpoint = "p21_view_invoice_hdr"
select = ["invoice_no", "invoice_date"]
date_window = true
date_field = "invoice_date"

[[reports.steps]]
kind = "fetch"
alias = "line"
endpoint = "p21_view_invoice_line"
select = ["invoice_no", "item_id"]
keys = { from = "invoice", fields = [{ source = "invoice_no" }] }

[[reports.steps]]
kind = "join"
left = "invoice"
right = "line"
on = ["invoice_no"]
how = "left"
into = "report"

[[reports.outputs]]
dataset = "report"
part = "report"
columns = ["invoice_no", "item_id"]

[[reports]]
name = "inventory"
group = "weekly"

[[reports.steps]]
kind = "fetch"
alias = "inv"
endpoint = "p21_view_inv_mast"
select = ["item_id"]
filters = ["delete_flag eq 'N'"]
"#,
    );

    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "debug");
    assert!(config.application.debug);
    assert_eq!(config.api.method, HttpMethod::Post);
    assert_eq!(config.api.timeout_seconds, 90);
    assert_eq!(config.api.requests_per_second, Some(4.0));
    assert_eq!(config.api.retry.max_retries, 5);
    assert_eq!(config.api.chunking.max_url_length, 4096);
    assert_eq!(config.run.output_dir, "extracts");
    assert_eq!(config.run.max_concurrent_reports, 2);
    assert!(config.run.fail_fast);
    assert_eq!(config.logging.local_rotation, "hourly");

    assert_eq!(config.reports.len(), 2);
    let selected = config.selected_reports();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].name, "jarp");
    match &selected[0].steps[2] {
        StepDefinition::Join(join) => assert_eq!(join.how, JoinKind::Outer),
        other => panic!("unexpected step {other:?}"),
    }
}

#[test]
fn test_load_minimal_config_with_defaults() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(MINIMAL);
    let config = load_config(file.path()).unwrap();

    assert_eq!(config.application.log_level, "info");
    assert!(!config.application.debug);
    assert_eq!(config.api.service_path, "odataservice/odata/view");
    assert_eq!(config.api.method, HttpMethod::Get);
    assert_eq!(config.api.retry.max_retries, 3);
    assert_eq!(config.api.retry.initial_delay_ms, 1000);
    assert_eq!(config.api.chunking.max_url_length, 2048);
    assert_eq!(config.api.chunking.chunk_size, 50);
    assert_eq!(config.api.chunking.min_conditions, 3);
    assert_eq!(config.run.output_dir, "output");
    assert_eq!(config.run.max_concurrent_reports, 5);
    assert!(config.run.start_date.is_none());
    assert!(config.reports.is_empty());
}

#[test]
fn test_env_var_substitution() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("TEST_P21_PASSWORD", "from_env");

    let file = write_config(
        r#"
# password = "${NOT_SET_ANYWHERE}"
[api]
base_url = "https://p21.example.com"
username = "api_user"
password = "${TEST_P21_PASSWORD}"
"#,
    );
    let config = load_config(file.path());
    cleanup_env_vars();

    let config = config.unwrap();
    assert_eq!(
        config.api.password.unwrap().expose_secret().as_ref(),
        "from_env"
    );
}

#[test]
fn test_missing_env_var_is_reported() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let file = write_config(
        r#"
[api]
base_url = "https://p21.example.com"
username = "api_user"
password = "${TEST_P21_PASSWORD}"
"#,
    );
    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("TEST_P21_PASSWORD"));
}

#[test]
fn test_env_var_overrides() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("P21_APPLICATION_LOG_LEVEL", "trace");
    std::env::set_var("P21_API_BASE_URL", "https://other.example.com");
    std::env::set_var("P21_RUN_START_DATE", "2024-02-01");
    std::env::set_var("P21_RUN_REPORT_GROUPS", "daily, weekly");

    let file = write_config(MINIMAL);
    let config = load_config(file.path());
    cleanup_env_vars();

    let config = config.unwrap();
    assert_eq!(config.application.log_level, "trace");
    assert_eq!(config.api.base_url, "https://other.example.com");
    assert_eq!(
        config.run.start_date.unwrap().to_string(),
        "2024-02-01"
    );
    assert_eq!(config.run.report_groups, vec!["daily", "weekly"]);
}

#[test]
fn test_invalid_env_date_is_rejected() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();
    std::env::set_var("P21_RUN_START_DATE", "February");

    let file = write_config(MINIMAL);
    let result = load_config(file.path());
    cleanup_env_vars();

    assert!(result.is_err());
}

#[test]
fn test_invalid_config_validation() {
    let _lock = ENV_MUTEX.lock().unwrap();
    cleanup_env_vars();

    let cases = [
        // unsupported scheme
        MINIMAL.replace("https://p21.example.com", "ftp://p21.example.com"),
        // missing credentials
        MINIMAL.replace("password = \"api_pass\"", ""),
        // window ends before it starts
        format!("{MINIMAL}\n[run]\nstart_date = \"2024-02-01\"\nend_date = \"2024-01-01\"\n"),
        // join reads an alias defined later
        format!(
            "{MINIMAL}\n[[reports]]\nname = \"r\"\n[[reports.steps]]\nkind = \"join\"\nleft = \"a\"\nright = \"b\"\non = [\"k\"]\ninto = \"c\"\n"
        ),
    ];

    for contents in cases {
        let file = write_config(&contents);
        assert!(load_config(file.path()).is_err(), "accepted:\n{contents}");
    }
}

#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/p21-extract.toml").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
