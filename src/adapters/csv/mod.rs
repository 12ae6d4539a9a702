//! CSV output

pub mod sink;

pub use sink::{file_name, CsvSink};
