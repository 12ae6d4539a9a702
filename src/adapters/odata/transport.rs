//! Pooled HTTP transport with retry and optional pacing
//!
//! Statuses 429, 500, 502, 503 and 504 and connection-level failures are
//! retried with exponential backoff. Any other non-success status is returned
//! at once with its body.

use crate::config::{ApiConfig, HttpMethod, RetryConfig};
use crate::domain::{DataFetchError, ExtractError, Result};
use crate::log_retry_attempt;
use reqwest::header::HeaderMap;
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Statuses worth another attempt
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Builds the shared client with a bounded idle pool
pub fn build_client(config: &ApiConfig) -> Result<Client> {
    ClientBuilder::new()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ExtractError::Configuration(format!("Failed to build HTTP client: {e}")))
}

/// Maps a `reqwest` send failure to a domain error
pub fn map_send_error(e: reqwest::Error) -> ExtractError {
    if e.is_timeout() {
        DataFetchError::Timeout(e.to_string()).into()
    } else {
        DataFetchError::ConnectionFailed(e.to_string()).into()
    }
}

/// Spaces calls so that at most `per_second` start each second
///
/// Callers reserve the next free slot and sleep until it, so the limiter can
/// be shared by every worker.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(per_second: f64) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / per_second),
            next_slot: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(t) if t > now => t,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}

/// Sends data requests through the pooled client
pub struct Transport {
    client: Client,
    method: HttpMethod,
    timeout: Duration,
    retry: RetryConfig,
    rate_limiter: Option<RateLimiter>,
}

impl Transport {
    pub fn new(client: Client, config: &ApiConfig) -> Self {
        Self {
            client,
            method: config.method,
            timeout: Duration::from_secs(config.timeout_seconds),
            retry: config.retry.clone(),
            rate_limiter: config.requests_per_second.map(RateLimiter::new),
        }
    }

    /// Total attempts a request may take
    pub fn max_attempts(&self) -> usize {
        self.retry.max_retries + 1
    }

    /// Delay before the attempt following `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let delay_ms = self.retry.initial_delay_ms as f64 * self.retry.backoff_multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.retry.max_delay_ms as f64) as u64)
    }

    /// Sends `url` and decodes a successful JSON body
    ///
    /// # Errors
    ///
    /// - `DataFetch(RequestFailed)` for a non-retryable status
    /// - `DataFetch(RetriesExhausted)` once every attempt has failed
    /// - `DataFetch(InvalidResponse)` when a 200 body is not the expected JSON
    pub async fn send_json<T: DeserializeOwned>(&self, url: &str, headers: &HeaderMap) -> Result<T> {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(limiter) = &self.rate_limiter {
                limiter.acquire().await;
            }

            tracing::debug!(url = %url, attempt, "Sending request");

            let (status, body) = match self.request(url, headers).send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(|e| {
                        DataFetchError::InvalidResponse(format!("Failed to parse response body: {e}"))
                            .into()
                    });
                }
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    if !is_retryable_status(status) {
                        tracing::error!(url = %url, status = status.as_u16(), "Request failed");
                        return Err(DataFetchError::RequestFailed {
                            status: status.as_u16(),
                            body,
                        }
                        .into());
                    }
                    (status.as_u16().to_string(), body)
                }
                Err(e) if e.is_connect() || e.is_timeout() || e.is_request() => {
                    ("network".to_string(), e.to_string())
                }
                Err(e) => return Err(map_send_error(e)),
            };

            if attempt >= max_attempts {
                tracing::error!(url = %url, attempts = attempt, status = %status, "Retries exhausted");
                return Err(DataFetchError::RetriesExhausted {
                    attempts: attempt,
                    status,
                    body,
                }
                .into());
            }

            let delay = self.backoff_delay(attempt);
            log_retry_attempt!(attempt, max_attempts, delay.as_millis() as u64, status);
            tokio::time::sleep(delay).await;
        }
    }

    fn request(&self, url: &str, headers: &HeaderMap) -> reqwest::RequestBuilder {
        let builder = match self.method {
            HttpMethod::Get => self.client.get(url),
            HttpMethod::Post => self.client.post(url).json(&serde_json::json!({})),
        };
        builder.headers(headers.clone()).timeout(self.timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use test_case::test_case;

    fn transport(retry: RetryConfig) -> Transport {
        let mut config = ApiConfig::new("https://p21.example.com", "u", secret_string("p".into()));
        config.retry = retry;
        Transport::new(Client::new(), &config)
    }

    #[test_case(429, true)]
    #[test_case(500, true)]
    #[test_case(502, true)]
    #[test_case(503, true)]
    #[test_case(504, true)]
    #[test_case(400, false)]
    #[test_case(401, false)]
    #[test_case(404, false)]
    #[test_case(501, false)]
    fn test_retryable_statuses(code: u16, expected: bool) {
        assert_eq!(is_retryable_status(StatusCode::from_u16(code).unwrap()), expected);
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let t = transport(RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            max_delay_ms: 350,
            backoff_multiplier: 2.0,
        });
        assert_eq!(t.backoff_delay(1), Duration::from_millis(100));
        assert_eq!(t.backoff_delay(2), Duration::from_millis(200));
        assert_eq!(t.backoff_delay(3), Duration::from_millis(350));
        assert_eq!(t.max_attempts(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(2.0);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }
}
