//! Query URL composition
//!
//! Builds `{base}/{service_path}/{view}?$select=..&$filter=..&$orderby=..`
//! from a [`QuerySpec`]. Parameter order is fixed so that composed URLs are
//! stable across runs. Query values are form-encoded through [`url::Url`], so
//! the length measured for chunking is the length actually sent.

use crate::domain::{ExtractError, QuerySpec, Result};
use url::Url;

/// Composes request URLs for one service root
#[derive(Debug, Clone)]
pub struct QueryComposer {
    root: String,
}

impl QueryComposer {
    pub fn new(base_url: &str, service_path: &str) -> Self {
        let root = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            service_path.trim_matches('/')
        );
        Self { root }
    }

    /// Root URL views are appended to
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Composes the URL for `spec` without paging parameters
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when the select list is empty, the spec has
    /// neither a date range nor filters, or the view URL does not parse.
    pub fn compose(&self, spec: &QuerySpec) -> Result<Url> {
        if spec.select().is_empty() {
            return Err(ExtractError::Configuration(format!(
                "Query for '{}' must select at least one field",
                spec.endpoint()
            )));
        }
        let filter = spec.filter_expression().ok_or_else(|| {
            ExtractError::Configuration(format!(
                "Query for '{}' needs a date range or at least one filter",
                spec.endpoint()
            ))
        })?;

        let view = format!("{}/{}", self.root, spec.endpoint());
        let mut url = Url::parse(&view).map_err(|e| {
            ExtractError::Configuration(format!("Invalid view URL '{view}': {e}"))
        })?;

        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("$select", &spec.select().join(","))
                .append_pair("$filter", &filter);
            if !spec.order_by().is_empty() {
                pairs.append_pair("$orderby", &spec.order_by().join(","));
            }
        }
        Ok(url)
    }
}

/// Adds `$count=true` and `$top=<page_size>` unless already present
pub fn with_paging(url: &Url, page_size: usize) -> Url {
    let has_count = has_param(url, "$count");
    let has_top = has_param(url, "$top");

    let mut paged = url.clone();
    {
        let mut pairs = paged.query_pairs_mut();
        if !has_count {
            pairs.append_pair("$count", "true");
        }
        if !has_top {
            pairs.append_pair("$top", &page_size.to_string());
        }
    }
    paged
}

/// Appends the `$skip` offset for one page
pub fn with_skip(paged_url: &Url, offset: usize) -> Url {
    let mut url = paged_url.clone();
    url.query_pairs_mut()
        .append_pair("$skip", &offset.to_string());
    url
}

/// Length of `url` as sent on the wire
pub fn wire_length(url: &Url) -> usize {
    url.as_str().len()
}

fn has_param(url: &Url, name: &str) -> bool {
    url.query_pairs().any(|(key, _)| key == name)
}
