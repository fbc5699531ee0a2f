//! Transports and tunnel teardown
//!
//! A `Transport` is the capability a client uses to actually put a request on
//! the wire. Direct and proxied transports are plain `reqwest` clients;
//! tunnel-backed transports come from a `TunnelConnector` supplied by the
//! caller, which hands back a `TunnelGuard` owning the tunnel's teardown.

use crate::config::WireguardConfig;
use crate::error::{PoolError, SendError};
use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

// ============================================================================
// Transport
// ============================================================================

/// Something that can perform a single HTTP request
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the request, returning the response or the failure as-is
    async fn execute(&self, request: Request) -> Result<Response, SendError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response, SendError> {
        (**self).execute(request).await
    }
}

/// Options shared by every `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Total request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("client-pool/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Transport backed by a `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Wrap an already configured `reqwest::Client`
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Transport connecting straight to the target host
    pub fn direct(options: &TransportOptions) -> Result<Self, PoolError> {
        let client = Self::builder(options).build()?;
        Ok(Self::new(client))
    }

    /// Transport routing every request through `proxy`
    ///
    /// Any scheme `reqwest` understands works here (`http`, `https`, `socks5`).
    pub fn proxied(proxy: &Url, options: &TransportOptions) -> Result<Self, PoolError> {
        let client = Self::builder(options)
            .proxy(reqwest::Proxy::all(proxy.as_str())?)
            .build()?;
        Ok(Self::new(client))
    }

    fn builder(options: &TransportOptions) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .timeout(options.request_timeout)
            .connect_timeout(options.connect_timeout)
            .user_agent(options.user_agent.clone())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: Request) -> Result<Response, SendError> {
        Ok(self.client.execute(request).await?)
    }
}

// ============================================================================
// Tunnels
// ============================================================================

/// Release action for a tunnel (closing a VPN interface, etc.)
#[async_trait]
pub trait Teardown: Send + Sync {
    async fn teardown(&self) -> anyhow::Result<()>;
}

/// Owns a tunnel's teardown and runs it at most once
pub struct TunnelGuard {
    teardown: Mutex<Option<Box<dyn Teardown>>>,
}

impl TunnelGuard {
    pub fn new(teardown: impl Teardown + 'static) -> Self {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
        }
    }

    /// Run the teardown if it has not run yet
    ///
    /// Returns `None` when the guard was already released.
    pub async fn release(&self) -> Option<anyhow::Result<()>> {
        let teardown = self
            .teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;
        Some(teardown.teardown().await)
    }

    /// Whether `release` has already consumed the teardown
    pub fn is_released(&self) -> bool {
        self.teardown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl std::fmt::Debug for TunnelGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelGuard")
            .field("released", &self.is_released())
            .finish()
    }
}

/// An established tunnel: its transport plus the guard that tears it down
pub struct Tunnel {
    pub transport: Arc<dyn Transport>,
    pub guard: TunnelGuard,
}

/// Establishes VPN tunnels for clients configured with `wireguard`
///
/// Tunnel setup lives outside this crate; binaries that need it plug an
/// implementation in when building the pool.
#[async_trait]
pub trait TunnelConnector: Send + Sync {
    async fn connect(
        &self,
        config: &WireguardConfig,
        options: &TransportOptions,
    ) -> anyhow::Result<Tunnel>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingTeardown(Arc<AtomicU32>);

    #[async_trait]
    impl Teardown for CountingTeardown {
        async fn teardown(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_guard_releases_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let guard = TunnelGuard::new(CountingTeardown(calls.clone()));
        assert!(!guard.is_released());

        assert!(guard.release().await.unwrap().is_ok());
        assert!(guard.release().await.is_none());
        assert!(guard.is_released());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_default_options() {
        let options = TransportOptions::default();
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert!(options.user_agent.starts_with("client-pool/"));
    }

    #[test]
    fn test_build_http_transports() {
        let options = TransportOptions::default();
        assert!(HttpTransport::direct(&options).is_ok());

        let proxy = Url::parse("socks5://127.0.0.1:1080").unwrap();
        assert!(HttpTransport::proxied(&proxy, &options).is_ok());
    }
}
