//! Domain models and types for p21-extract.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Query description** ([`QuerySpec`], [`DateRange`])
//! - **Fetched data** ([`Record`], [`Dataset`])
//! - **Credentials** ([`Credential`])
//! - **Error types** ([`ExtractError`], [`DataFetchError`])
//! - **Result type alias** ([`Result`])
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, ExtractError>`]:
//!
//! ```rust
//! use p21_extract::domain::{QuerySpec, Result};
//!
//! fn example() -> Result<()> {
//!     let spec = QuerySpec::builder("p21_view_invoice_hdr")
//!         .select(["invoice_no", "invoice_date"])
//!         .filter("ship_to_id eq 12755")
//!         .build()?;
//!     assert_eq!(spec.page_size(), 1000);
//!     Ok(())
//! }
//! ```

pub mod credential;
pub mod errors;
pub mod query;
pub mod record;
pub mod result;

pub use credential::Credential;
pub use errors::{DataFetchError, ExtractError};
pub use query::{end_of_month, DateRange, QuerySpec, QuerySpecBuilder};
pub use record::{Dataset, Record};
pub use result::Result;
