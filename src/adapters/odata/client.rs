//! OData client facade
//!
//! [`ODataClient`] owns the session, the transport and the composer. Paging
//! lives in [`super::pagination`] and chunked fetching in [`super::chunking`];
//! both are `impl ODataClient` blocks.

use super::compose::QueryComposer;
use super::models::ODataPage;
use super::session::{bearer_headers, Session};
use super::transport::{build_client, Transport};
use crate::adapters::traits::{DataSource, FetchOutcome};
use crate::config::{ApiConfig, ChunkingConfig};
use crate::domain::{Credential, ExtractError, QuerySpec, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Client for one Prophet 21 OData service
///
/// # Example
///
/// ```no_run
/// use p21_extract::adapters::odata::ODataClient;
/// use p21_extract::config::{secret_string, ApiConfig};
/// use p21_extract::domain::QuerySpec;
///
/// # async fn example() -> p21_extract::domain::Result<()> {
/// let config = ApiConfig::new("https://p21.example.com", "api_user", secret_string("pw".into()));
/// let client = ODataClient::new(&config)?;
///
/// let spec = QuerySpec::builder("p21_view_invoice_hdr")
///     .select(["invoice_no", "invoice_date"])
///     .filter("ship_to_id eq 12755")
///     .build()?;
/// let invoices = client.fetch_all(&spec).await?;
/// println!("{} invoices", invoices.len());
/// # Ok(())
/// # }
/// ```
pub struct ODataClient {
    pub(super) session: Session,
    pub(super) transport: Transport,
    pub(super) composer: QueryComposer,
    pub(super) chunking: ChunkingConfig,
}

impl ODataClient {
    /// Creates a client from validated API settings
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when credentials are missing or the HTTP
    /// client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let credential = config.credential().map_err(ExtractError::Configuration)?;
        Self::with_credential(config, credential)
    }

    /// Creates a client with an explicit credential
    pub fn with_credential(config: &ApiConfig, credential: Credential) -> Result<Self> {
        let http = build_client(config)?;
        let session = Session::new(
            &config.base_url,
            credential,
            http.clone(),
            Duration::from_secs(config.auth_timeout_seconds),
        );

        tracing::debug!(
            base_url = %config.base_url,
            service_path = %config.service_path,
            method = ?config.method,
            "Created OData client"
        );

        Ok(Self {
            session,
            transport: Transport::new(http, config),
            composer: QueryComposer::new(&config.base_url, &config.service_path),
            chunking: config.chunking.clone(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Composes the request URL for `spec`
    pub fn compose(&self, spec: &QuerySpec) -> Result<Url> {
        self.composer.compose(spec)
    }

    /// Obtains a token up front so credential problems surface before any report runs
    pub async fn authenticate(&self) -> Result<()> {
        self.session.headers().await.map(|_| ())
    }

    /// Fetches one page, re-authenticating once if the token was rejected
    pub(super) async fn get_page(&self, url: &str) -> Result<ODataPage> {
        let token = self.session.token().await?;
        match self.transport.send_json::<ODataPage>(url, &bearer_headers(&token)?).await {
            Err(ExtractError::DataFetch(e)) if e.status() == Some(401) => {
                tracing::warn!(url = %url, "Token rejected, re-authenticating");
                // Another request may already have refreshed it
                self.session.invalidate_rejected(&token).await;
                let headers = self.session.headers().await?;
                self.transport.send_json::<ODataPage>(url, &headers).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl DataSource for ODataClient {
    async fn fetch(&self, spec: &QuerySpec) -> Result<FetchOutcome> {
        self.query(spec).await
    }
}
