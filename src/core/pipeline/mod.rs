//! Report pipelines
//!
//! - [`definition`] - Declarative steps read from configuration
//! - [`join`] - In-memory joins, projection and sorting
//! - [`runner`] - Step execution against a data source and a sink

pub mod definition;
pub mod join;
pub mod runner;

pub use definition::{
    FetchStep, JoinKind, JoinStep, KeyField, KeySource, OutputDefinition, ReportDefinition,
    StepDefinition,
};
pub use runner::{PipelineRunner, ReportOutcome};
