//! Seams between the pipeline and the outside world
//!
//! The pipeline only talks to a [`DataSource`] and a [`DatasetSink`], so
//! reports can be exercised against in-memory fakes.

use crate::domain::{Dataset, QuerySpec, Result};
use async_trait::async_trait;
use std::path::PathBuf;

/// Result of one logical fetch
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Records in server order, chunk by chunk
    pub dataset: Dataset,

    /// Composed URL, suffixed with `(chunked)` when the filter was split
    pub url: String,

    /// Request groups issued; 1 when unchunked
    pub chunks: usize,
}

impl FetchOutcome {
    pub fn single(dataset: Dataset, url: String) -> Self {
        Self {
            dataset,
            url,
            chunks: 1,
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.url.ends_with(crate::adapters::odata::CHUNKED_MARKER)
    }
}

/// Anything that can answer a [`QuerySpec`]
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn fetch(&self, spec: &QuerySpec) -> Result<FetchOutcome>;
}

/// Destination for report outputs
#[async_trait]
pub trait DatasetSink: Send + Sync {
    /// Writes `dataset` as `<prefix><part>` and returns where it went
    async fn write(
        &self,
        prefix: &str,
        part: &str,
        columns: &[String],
        dataset: &Dataset,
    ) -> Result<PathBuf>;
}
