//! Paginated fetching
//!
//! Pages are requested with `$count=true&$top=<page_size>&$skip=<offset>`.
//! Fetching stops when the server-reported total is reached, a page comes back
//! short, or a page is empty.

use super::client::ODataClient;
use super::compose::{with_paging, with_skip};
use crate::domain::{Dataset, ExtractError, QuerySpec, Record, Result};
use futures::stream::{self, Stream};
use std::collections::VecDeque;
use url::Url;

/// Paging position shared by the eager and lazy variants
#[derive(Debug)]
struct PageCursor {
    paged_url: Url,
    page_size: usize,
    offset: usize,
    total: Option<u64>,
    done: bool,
}

impl PageCursor {
    fn new(url: &Url, page_size: usize) -> Self {
        Self {
            paged_url: with_paging(url, page_size),
            page_size,
            offset: 0,
            total: None,
            done: false,
        }
    }

    fn next_url(&self) -> Url {
        with_skip(&self.paged_url, self.offset)
    }

    /// Advances past a page of `received` records
    fn advance(&mut self, received: usize, count: Option<u64>) {
        if count.is_some() {
            self.total = count;
        }
        self.offset += received;

        let reached_total = self
            .total
            .is_some_and(|total| self.offset as u64 >= total);
        if received == 0 || received < self.page_size || reached_total {
            self.done = true;
        }
    }
}

impl ODataClient {
    /// Fetches every record matching `spec`, page by page
    ///
    /// # Errors
    ///
    /// Propagates composition, authentication and transport errors. No data is
    /// an empty dataset, not an error.
    pub async fn fetch_all(&self, spec: &QuerySpec) -> Result<Dataset> {
        let url = self.compose(spec)?;
        let mut cursor = PageCursor::new(&url, spec.page_size());
        let mut dataset = Dataset::new();
        let mut pages = 0usize;

        while !cursor.done {
            let page = self.get_page(cursor.next_url().as_str()).await?;
            let count = page.count;
            let records = page.into_records();
            pages += 1;

            tracing::debug!(
                endpoint = %spec.endpoint(),
                offset = cursor.offset,
                received = records.len(),
                total = ?count,
                "Fetched page"
            );

            cursor.advance(records.len(), count);
            dataset.extend(records);
        }

        tracing::info!(
            endpoint = %spec.endpoint(),
            records = dataset.len(),
            pages,
            "Fetch complete"
        );
        Ok(dataset)
    }

    /// Lazily yields records across pages
    ///
    /// The next page is requested only once the records of the previous one
    /// have been consumed. An error ends the stream.
    pub fn stream_records<'a>(
        &'a self,
        spec: &QuerySpec,
    ) -> impl Stream<Item = Result<Record>> + 'a {
        let (cursor, error) = match self.compose(spec) {
            Ok(url) => (Some(PageCursor::new(&url, spec.page_size())), None),
            Err(e) => (None, Some(e)),
        };
        let state = StreamState {
            cursor,
            error,
            buffer: VecDeque::new(),
        };

        stream::try_unfold(state, move |mut state| async move {
            loop {
                if let Some(record) = state.buffer.pop_front() {
                    return Ok(Some((record, state)));
                }
                if let Some(e) = state.error.take() {
                    return Err(e);
                }
                let cursor = match state.cursor.as_mut() {
                    Some(cursor) if !cursor.done => cursor,
                    _ => return Ok(None),
                };

                let page = self.get_page(cursor.next_url().as_str()).await?;
                let count = page.count;
                let records = page.into_records();
                cursor.advance(records.len(), count);
                state.buffer.extend(records);
            }
        })
    }

    /// Single request without paging parameters
    ///
    /// Kept for callers that expect the older one-shot behaviour: returns
    /// `None` when the response has no `value` array or it is empty.
    pub async fn fetch_once(&self, spec: &QuerySpec) -> Result<Option<Dataset>> {
        let url = self.compose(spec)?;
        let page = self.get_page(url.as_str()).await?;
        match page.value {
            Some(records) if !records.is_empty() => Ok(Some(Dataset::from(records))),
            _ => {
                tracing::info!(endpoint = %spec.endpoint(), "No data returned");
                Ok(None)
            }
        }
    }
}

struct StreamState {
    cursor: Option<PageCursor>,
    error: Option<ExtractError>,
    buffer: VecDeque<Record>,
}
