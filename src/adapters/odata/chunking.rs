//! Chunked fetching for oversized OR filters
//!
//! A filter such as `(item_id eq 'A' or item_id eq 'B' or ...)` built from a
//! few hundred keys can push the request URL past what the server accepts.
//! When that happens the disjunction is split into groups of `chunk_size`
//! conditions, each group is fetched on its own, and the results are
//! concatenated in chunk order.

use super::client::ODataClient;
use super::compose::wire_length;
use crate::adapters::traits::FetchOutcome;
use crate::domain::{Dataset, QuerySpec, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Marker appended to the diagnostic URL of a chunked fetch
pub const CHUNKED_MARKER: &str = " (chunked)";

fn equality_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_/]*)\s+eq\s+('(?:[^']|'')*'|[^\s()']+)\s*$")
            .expect("equality pattern is a valid regex")
    })
}

/// How one filter list is split across requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    filters: Vec<String>,
    index: usize,
    field: String,
    conditions: Vec<String>,
    chunk_size: usize,
}

impl ChunkPlan {
    /// Picks the disjunction in `filters` to split across requests
    ///
    /// A fragment is a candidate when it is a parenthesized OR of
    /// `<field> eq <value>` clauses on one field with more than
    /// `min_conditions` clauses. Smaller disjunctions and every other fragment
    /// stay fixed in each chunk. When several fragments qualify, the one with
    /// the most clauses is split. Returns `None` when nothing qualifies.
    pub fn detect(filters: &[String], chunk_size: usize, min_conditions: usize) -> Option<Self> {
        let mut best: Option<(usize, String, Vec<String>)> = None;
        let mut candidates = 0usize;

        for (index, fragment) in filters.iter().enumerate() {
            let Some((field, conditions)) = parse_disjunction(fragment) else {
                continue;
            };
            // Short lists such as a handful of ship-to ids ride along unchanged
            if conditions.len() <= min_conditions {
                continue;
            }
            candidates += 1;

            let larger = best
                .as_ref()
                .map_or(true, |(_, _, current)| conditions.len() > current.len());
            if larger {
                best = Some((index, field, conditions));
            }
        }

        let (index, field, conditions) = best?;
        if candidates > 1 {
            tracing::debug!(
                field = %field,
                candidates,
                "Several large disjunctions; splitting the largest"
            );
        }

        Some(Self {
            filters: filters.to_vec(),
            index,
            field,
            conditions,
            chunk_size: chunk_size.max(1),
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Number of requests the plan issues
    pub fn chunk_count(&self) -> usize {
        self.conditions.len().div_ceil(self.chunk_size)
    }

    /// Filter list for each chunk
    ///
    /// The split disjunction is replaced in place by one group of its clauses;
    /// all other fragments are repeated unchanged.
    pub fn chunk_filters(&self) -> Vec<Vec<String>> {
        self.conditions
            .chunks(self.chunk_size)
            .map(|group| {
                let mut filters = self.filters.clone();
                filters[self.index] = format!("({})", group.join(" or "));
                filters
            })
            .collect()
    }
}

/// Splits `(<f> eq <v1> or <f> eq <v2> ...)` into its field and clauses
fn parse_disjunction(fragment: &str) -> Option<(String, Vec<String>)> {
    let inner = strip_outer_parens(fragment.trim())?;
    let parts = split_top_level_or(inner);
    // A lone clause is not a disjunction
    if parts.len() < 2 {
        return None;
    }

    let pattern = equality_pattern();
    let mut field: Option<String> = None;
    let mut conditions = Vec::with_capacity(parts.len());
    for part in parts {
        // Any clause that is not `<field> eq <literal>` disqualifies the fragment
        let caps = pattern.captures(part)?;
        let name = caps.get(1)?.as_str();
        // All clauses must test the same field
        match &field {
            Some(existing) if existing != name => return None,
            Some(_) => {}
            None => field = Some(name.to_string()),
        }
        conditions.push(part.trim().to_string());
    }
    field.map(|f| (f, conditions))
}

/// Inner text when the whole fragment is wrapped in one pair of parentheses
fn strip_outer_parens(fragment: &str) -> Option<&str> {
    let bytes = fragment.as_bytes();
    // Doubled quotes inside literals toggle twice, which leaves the state intact
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return None;
    }

    let mut depth = 0usize;
    let mut in_quote = false;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => {
                depth = depth.checked_sub(1)?;
                // `(a) and (b)` closes its first group before the end
                if depth == 0 && i != bytes.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }
    // Unbalanced input is left to the server to reject
    if depth != 0 || in_quote {
        return None;
    }
    Some(&fragment[1..fragment.len() - 1])
}

/// Splits on ` or ` outside quotes and nested parentheses
fn split_top_level_or(text: &str) -> Vec<&str> {
    const SEPARATOR: &[u8] = b" or ";
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth = depth.saturating_sub(1),
            // Only a top-level ` or ` separates clauses
            b' ' if !in_quote && depth == 0 && bytes[i..].starts_with(SEPARATOR) => {
                parts.push(&text[start..i]);
                i += SEPARATOR.len();
                start = i;
                continue;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}

impl ODataClient {
    /// Fetches `spec`, splitting an oversized OR filter into several requests
    ///
    /// Short URLs, and long URLs without a chunkable disjunction, are fetched
    /// as a single paginated query.
    pub async fn query(&self, spec: &QuerySpec) -> Result<FetchOutcome> {
        let url = self.compose(spec)?;
        let length = wire_length(&url);

        // Fast path: the whole query fits in one URL
        if length <= self.chunking.max_url_length {
            let dataset = self.fetch_all(spec).await?;
            return Ok(FetchOutcome::single(dataset, url.to_string()));
        }

        let plan = match ChunkPlan::detect(
            spec.filters(),
            self.chunking.chunk_size,
            self.chunking.min_conditions,
        ) {
            Some(plan) => plan,
            None => {
                tracing::warn!(
                    endpoint = %spec.endpoint(),
                    url_length = length,
                    max_url_length = self.chunking.max_url_length,
                    "URL exceeds length limit but has no chunkable filter; sending as is"
                );
                let dataset = self.fetch_all(spec).await?;
                return Ok(FetchOutcome::single(dataset, url.to_string()));
            }
        };

        let chunk_count = plan.chunk_count();
        tracing::info!(
            endpoint = %spec.endpoint(),
            field = %plan.field(),
            conditions = plan.condition_count(),
            chunks = chunk_count,
            url_length = length,
            "Splitting filter into chunks"
        );

        // Sequential; results keep chunk order
        let mut dataset = Dataset::new();
        for (index, filters) in plan.chunk_filters().into_iter().enumerate() {
            let chunk_spec = spec.with_filters(filters);
            let chunk = self.fetch_all(&chunk_spec).await?;
            tracing::debug!(
                endpoint = %spec.endpoint(),
                chunk = index + 1,
                of = chunk_count,
                records = chunk.len(),
                "Fetched chunk"
            );
            // No de-duplication; each record matches exactly one group
            dataset.append(chunk);
        }

        Ok(FetchOutcome {
            dataset,
            url: format!("{url}{CHUNKED_MARKER}"),
            chunks: chunk_count,
        })
    }
}
