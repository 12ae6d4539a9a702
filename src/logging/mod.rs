//! Logging and observability
//!
//! Structured logging through `tracing`, with a console layer and an optional
//! rotating JSON file. The macros below give recurring events a fixed shape so
//! log queries can rely on field names.

pub mod structured;

pub use structured::{init_logging, LoggingGuard};

/// Log the start of a report
///
/// ```no_run
/// use p21_extract::log_report_start;
///
/// log_report_start!("jarp", 3);
/// ```
#[macro_export]
macro_rules! log_report_start {
    ($report:expr, $steps:expr) => {
        tracing::info!(report = %$report, steps = $steps, "Starting report");
    };
}

/// Log the completion of a report
///
/// ```no_run
/// use p21_extract::log_report_complete;
/// use std::time::Duration;
///
/// log_report_complete!("jarp", 1200, Duration::from_secs(4));
/// ```
#[macro_export]
macro_rules! log_report_complete {
    ($report:expr, $rows:expr, $duration:expr) => {
        tracing::info!(
            report = %$report,
            rows = $rows,
            duration_ms = $duration.as_millis() as u64,
            "Report completed"
        );
    };
}

/// Log a retry attempt
///
/// ```no_run
/// use p21_extract::log_retry_attempt;
///
/// log_retry_attempt!(2, 4, 2000, "status 503");
/// ```
#[macro_export]
macro_rules! log_retry_attempt {
    ($attempt:expr, $max_attempts:expr, $delay_ms:expr, $reason:expr) => {
        tracing::warn!(
            attempt = $attempt,
            max_attempts = $max_attempts,
            delay_ms = $delay_ms,
            reason = %$reason,
            "Request failed, retrying with exponential backoff"
        );
    };
}
