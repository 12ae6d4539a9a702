//! External system integrations.
//!
//! - [`odata`] - Prophet 21 OData service client
//! - [`csv`] - CSV file sink
//! - [`traits`] - the [`DataSource`] and [`DatasetSink`] seams used by the pipeline

pub mod csv;
pub mod odata;
pub mod traits;

pub use traits::{DataSource, DatasetSink, FetchOutcome};
