//! A single pooled client
//!
//! A client is one outbound request path: an identity key, a rate-limited
//! transport and, for tunnel-backed clients, the guard that tears the tunnel
//! down when the pool closes.

use crate::config::{ClientConfig, TransportConfig};
use crate::error::{PoolError, SendError};
use crate::utils::mask_key;
use async_trait::async_trait;
use reqwest::{Method, Request, Response};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::rate_limit::RateLimitedTransport;
use super::transport::{HttpTransport, Transport, TransportOptions, TunnelConnector, TunnelGuard};

/// One outbound request path in the pool
pub struct Client {
    key: String,
    transport: RateLimitedTransport<Arc<dyn Transport>>,
    guard: Option<TunnelGuard>,
}

impl Client {
    /// Create a client sending through `transport`, at most once per `rate_limit`
    pub fn new(
        key: impl Into<String>,
        transport: Arc<dyn Transport>,
        rate_limit: Duration,
    ) -> Self {
        Self {
            key: key.into(),
            transport: RateLimitedTransport::new(transport, rate_limit),
            guard: None,
        }
    }

    /// Attach the guard of the tunnel this client sends through
    pub fn with_guard(mut self, guard: TunnelGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Build a client from its configuration
    ///
    /// Wireguard clients need a `connector`; without one they fail with
    /// `PoolError::TunnelUnsupported`.
    pub async fn from_config(
        config: &ClientConfig,
        options: &TransportOptions,
        connector: Option<&dyn TunnelConnector>,
    ) -> Result<Self, PoolError> {
        let key = config.resolve_key()?;

        let client = match &config.transport {
            TransportConfig::Direct => {
                Self::new(key, Arc::new(HttpTransport::direct(options)?), config.rate_limit)
            }
            TransportConfig::Proxy(proxy) => Self::new(
                key,
                Arc::new(HttpTransport::proxied(proxy, options)?),
                config.rate_limit,
            ),
            TransportConfig::Wireguard(wireguard) => {
                let connector =
                    connector.ok_or_else(|| PoolError::TunnelUnsupported(mask_key(&key)))?;
                let tunnel = connector
                    .connect(wireguard, options)
                    .await
                    .map_err(|source| PoolError::Tunnel {
                        key: mask_key(&key),
                        source,
                    })?;
                Self::new(key, tunnel.transport, config.rate_limit).with_guard(tunnel.guard)
            }
        };

        tracing::debug!(
            key = %mask_key(client.key()),
            transport = config.transport.kind(),
            rate_limit_ms = config.rate_limit.as_millis() as u64,
            "Client created"
        );

        Ok(client)
    }

    /// The identity token (API key) this client sends with
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Minimum spacing between requests; zero means unlimited
    pub fn rate_limit(&self) -> Duration {
        self.transport.limiter().interval()
    }

    pub fn is_tunneled(&self) -> bool {
        self.guard.is_some()
    }

    /// Send a request, waiting for the rate limit first
    ///
    /// Failures come back exactly as the transport reported them.
    pub async fn send(&self, request: Request) -> Result<Response, SendError> {
        self.transport.execute(request).await
    }

    /// Shorthand for sending a plain GET
    pub async fn get(&self, url: Url) -> Result<Response, SendError> {
        self.send(Request::new(Method::GET, url)).await
    }

    /// Tear down the client's tunnel, if it has one that is still up
    pub(crate) async fn close(&self) -> Option<anyhow::Result<()>> {
        match &self.guard {
            Some(guard) => guard.release().await,
            None => None,
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("key", &mask_key(&self.key))
            .field("rate_limit", &self.rate_limit())
            .field("guard", &self.guard)
            .finish()
    }
}

/// Lets a client stand in wherever a bare transport is expected
#[async_trait]
impl Transport for Client {
    async fn execute(&self, request: Request) -> Result<Response, SendError> {
        self.send(request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
