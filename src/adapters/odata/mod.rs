//! Prophet 21 OData service adapter
//!
//! - [`session`] - token exchange and caching
//! - [`compose`] - URL composition from a [`crate::domain::QuerySpec`]
//! - [`transport`] - pooled client, retry policy, rate limiting
//! - [`pagination`] - `fetch_all`, `stream_records`, `fetch_once`
//! - [`chunking`] - splitting oversized OR filters
//! - [`client`] - the [`ODataClient`] facade

pub mod chunking;
pub mod client;
pub mod compose;
pub mod models;
pub mod pagination;
pub mod session;
pub mod transport;

pub use chunking::{ChunkPlan, CHUNKED_MARKER};
pub use client::ODataClient;
pub use compose::QueryComposer;
pub use session::Session;
pub use transport::{RateLimiter, Transport};
