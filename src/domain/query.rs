//! Query specification
//!
//! [`QuerySpec`] is the immutable description of one OData view request. It is
//! only obtainable through [`QuerySpecBuilder::build`], which rejects specs
//! that cannot be composed into a valid request.

use super::errors::ExtractError;
use super::result::Result;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Default date field used for date-window filters
pub const DEFAULT_DATE_FIELD: &str = "date_created";

/// Default number of records requested per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Inclusive date-time window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl DateRange {
    /// Creates a window; a missing end defaults to [`end_of_month`] of the start
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when `end` precedes `start`.
    pub fn new(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<Self> {
        let end = end.unwrap_or_else(|| end_of_month(start.date()));
        if end < start {
            return Err(ExtractError::Configuration(format!(
                "Date range end {end} is before start {start}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Creates a window from calendar dates
    ///
    /// The start is midnight of `start`; an explicit `end` covers that whole day.
    pub fn from_dates(start: NaiveDate, end: Option<NaiveDate>) -> Result<Self> {
        Self::new(
            start.and_time(NaiveTime::MIN),
            end.map(|d| d.and_time(last_instant())),
        )
    }

    /// The `days` before this window's start, ending at the start
    pub fn lookback(&self, days: u32) -> DateRange {
        Self {
            start: self.start - Duration::days(i64::from(days)),
            end: self.start,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Renders `<field> ge <start> and <field> le <end>` with second precision
    pub fn to_filter(&self, field: &str) -> String {
        format!(
            "{field} ge {} and {field} le {}",
            format_timestamp(self.start),
            format_timestamp(self.end)
        )
    }
}

/// Last calendar day of `date`'s month at the latest instant of that day
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use p21_extract::domain::query::end_of_month;
///
/// let eom = end_of_month(NaiveDate::from_ymd_opt(2024, 2, 10).unwrap());
/// assert_eq!(eom.date(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
/// ```
pub fn end_of_month(date: NaiveDate) -> NaiveDateTime {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    let last_day = NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first_of_next| first_of_next - Duration::days(1))
        .unwrap_or(date);
    last_day.and_time(last_instant())
}

/// First calendar day of `date`'s month
pub fn start_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn last_instant() -> NaiveTime {
    NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999).unwrap_or(NaiveTime::MIN)
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Immutable description of a single view request
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    endpoint: String,
    select: Vec<String>,
    filters: Vec<String>,
    order_by: Vec<String>,
    date_range: Option<DateRange>,
    date_field: String,
    page_size: usize,
}

impl QuerySpec {
    /// Starts building a spec for `endpoint`
    pub fn builder(endpoint: impl Into<String>) -> QuerySpecBuilder {
        QuerySpecBuilder::new(endpoint)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn select(&self) -> &[String] {
        &self.select
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn order_by(&self) -> &[String] {
        &self.order_by
    }

    pub fn date_range(&self) -> Option<&DateRange> {
        self.date_range.as_ref()
    }

    pub fn date_field(&self) -> &str {
        &self.date_field
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Same spec with its filter fragments replaced
    pub fn with_filters(&self, filters: Vec<String>) -> QuerySpec {
        QuerySpec {
            filters,
            ..self.clone()
        }
    }

    /// Full `$filter` expression: date window first, then caller fragments
    pub fn filter_expression(&self) -> Option<String> {
        let mut parts = Vec::with_capacity(self.filters.len() + 1);
        if let Some(range) = &self.date_range {
            parts.push(range.to_filter(&self.date_field));
        }
        parts.extend(self.filters.iter().cloned());
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" and "))
        }
    }
}

/// Builder for [`QuerySpec`]
#[derive(Debug, Clone)]
pub struct QuerySpecBuilder {
    endpoint: String,
    select: Vec<String>,
    filters: Vec<String>,
    order_by: Vec<String>,
    date_range: Option<DateRange>,
    date_field: Option<String>,
    page_size: Option<usize>,
}

impl QuerySpecBuilder {
    fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            select: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            date_range: None,
            date_field: None,
            page_size: None,
        }
    }

    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn filter(mut self, fragment: impl Into<String>) -> Self {
        self.filters.push(fragment.into());
        self
    }

    pub fn filters<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters.extend(fragments.into_iter().map(Into::into));
        self
    }

    pub fn order_by<I, S>(mut self, clauses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by.extend(clauses.into_iter().map(Into::into));
        self
    }

    pub fn date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.date_field = Some(field.into());
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Validates and builds the spec
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the endpoint or select list is empty, the
    /// page size is zero, or the spec has neither a date range nor filters.
    pub fn build(self) -> Result<QuerySpec> {
        if self.endpoint.trim().is_empty() {
            return Err(ExtractError::Configuration(
                "Query endpoint cannot be empty".to_string(),
            ));
        }
        if self.select.is_empty() {
            return Err(ExtractError::Configuration(format!(
                "Query for '{}' must select at least one field",
                self.endpoint
            )));
        }
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ExtractError::Configuration(format!(
                "Query for '{}' has page_size 0; must be greater than 0",
                self.endpoint
            )));
        }

        let filters: Vec<String> = self
            .filters
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        if self.date_range.is_none() && filters.is_empty() {
            return Err(ExtractError::Configuration(format!(
                "Query for '{}' needs a date range or at least one filter",
                self.endpoint
            )));
        }

        Ok(QuerySpec {
            endpoint: self.endpoint,
            select: self.select,
            filters,
            order_by: self.order_by,
            date_range: self.date_range,
            date_field: self
                .date_field
                .unwrap_or_else(|| DEFAULT_DATE_FIELD.to_string()),
            page_size,
        })
    }
}
