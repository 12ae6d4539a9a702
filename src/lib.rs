// P21 Extract - Prophet 21 OData extraction tool
// Copyright (c) 2025 P21 Extract Contributors
// Licensed under the MIT License

//! # P21 Extract - Prophet 21 OData report extraction
//!
//! P21 Extract pulls business data out of a Prophet 21 ERP server through its
//! OData view service, combines views in memory and writes CSV reports.
//!
//! ## Overview
//!
//! This library provides the core functionality for:
//! - **Authenticating** against the P21 identity endpoint with a cached token
//! - **Fetching** views with `$select`/`$filter`/`$orderby`, transparent
//!   pagination, retries and chunking of oversized OR filters
//! - **Joining** datasets in declarative multi-stage report pipelines
//! - **Writing** each report output as a CSV file
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Report pipelines and run orchestration
//! - [`adapters`] - External integrations (OData service, CSV files)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging and observability
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use p21_extract::adapters::odata::ODataClient;
//! use p21_extract::config::load_config;
//! use p21_extract::domain::QuerySpec;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("p21-extract.toml")?;
//!     let client = ODataClient::new(&config.api)?;
//!
//!     let spec = QuerySpec::builder("p21_view_invoice_hdr")
//!         .select(["invoice_no", "invoice_date", "total_amount"])
//!         .filter("(ship_to_id eq 12755 or ship_to_id eq 15097)")
//!         .order_by(["invoice_date asc"])
//!         .build()?;
//!
//!     let invoices = client.fetch_all(&spec).await?;
//!     println!("Fetched {} invoices", invoices.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! All library operations return [`domain::Result`], whose error type is
//! [`domain::ExtractError`]. The CLI converts outcomes into exit codes.
//!
//! ## Logging
//!
//! Logging goes through the `tracing` crate with structured fields:
//!
//! ```rust,no_run
//! use tracing::{info, warn};
//!
//! info!(report = "jarp", "Starting report");
//! warn!(endpoint = "p21_view_invoice_line", "No data returned");
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
