//! Configuration management for p21-extract.
//!
//! Configuration is a TOML file with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `P21_*` environment overrides for single keys
//! - Default values for optional settings
//! - Validation on load
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - log level and debug mode
//! - [`ApiConfig`] - OData service, credentials, retry and chunking
//! - [`RunConfig`] - report window, output directory, groups, worker pool
//! - [`LoggingConfig`] - optional JSON log file
//! - `[[reports]]` - report pipelines, see [`crate::core::pipeline`]
//!
//! # Example Configuration
//!
//! ```toml
//! [api]
//! base_url = "https://p21.example.com"
//! username = "${P21_USERNAME}"
//! password = "${P21_PASSWORD}"
//!
//! [run]
//! output_dir = "output"
//! report_groups = ["monthly"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApiConfig, ApplicationConfig, ChunkingConfig, HttpMethod, LoggingConfig, P21Config,
    RetryConfig, RunConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
