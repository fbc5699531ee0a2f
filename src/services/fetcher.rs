//! Fetch service
//!
//! Drives the client pool for plain GET requests. This is where HTTP
//! outcomes get interpreted: failures that point at the client (transport
//! errors, 401/403/429) back the client off, and retryable failures are tried
//! again on a freshly selected client.

use crate::error::{FetchError, SendError};
use crate::utils::{mask_key, retry_with_backoff, RetryConfig};
use reqwest::{Method, Request, StatusCode};
use std::sync::Arc;
use url::Url;

use super::client_pool::ClientPool;

/// A successful fetch
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: Url,
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Masked key of the client that served the request
    pub client: String,
    /// Attempts made, including the successful one
    pub attempts: u32,
}

/// Fetches URLs through a shared `ClientPool`
#[derive(Debug, Clone)]
pub struct Fetcher {
    pool: Arc<ClientPool>,
    retry: RetryConfig,
}

impl Fetcher {
    pub fn new(pool: Arc<ClientPool>, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    pub fn pool(&self) -> &ClientPool {
        &self.pool
    }

    /// GET `url`, retrying on another client when the failure allows it
    pub async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError> {
        let url = Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        let url = &url;

        let outcome = retry_with_backoff(
            &self.retry,
            FetchError::is_retryable,
            move |attempt| self.attempt(url, attempt),
        )
        .await;

        outcome.result.map(|(status, body, client)| FetchResponse {
            url: url.clone(),
            status,
            body,
            client,
            attempts: outcome.attempts,
        })
    }

    async fn attempt(
        &self,
        url: &Url,
        attempt: u32,
    ) -> Result<(StatusCode, Vec<u8>, String), FetchError> {
        let selected = self.pool.select();
        let client = mask_key(selected.key());

        tracing::debug!(url = %url, client = %client, attempt, "Sending request");

        let result = async {
            let response = selected
                .send(Request::new(Method::GET, url.clone()))
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::Status {
                    status,
                    key: client.clone(),
                });
            }

            let body = response.bytes().await.map_err(SendError::from)?;
            Ok::<_, FetchError>((status, body.to_vec(), client.clone()))
        }
        .await;

        if let Err(err) = &result {
            if err.is_client_fault() {
                self.pool.backoff(selected.id());
            }
            tracing::warn!(
                url = %url,
                client = %client,
                attempt,
                error = %err,
                "Request failed"
            );
        }

        result
    }
}

// ============================================================================
// Tests
// ============================================================================
