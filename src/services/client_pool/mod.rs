//! Client Pool Module
//!
//! This module manages a small pool of interchangeable outbound HTTP clients,
//! each rate-limited on its own and sending through its own transport
//! (direct, proxied or tunneled).
//!
//! # Features
//! - Randomized selection that avoids recently failed clients
//! - Time-based backoff: penalized clients return after `DEFAULT_BACKOFF`
//! - Per-client minimum spacing between requests
//! - Tunnel teardown on `close()`, at most once per tunnel
//!
//! # Example
//! ```ignore
//! use client_pool::services::client_pool::{ClientPool, TransportOptions};
//!
//! let pool = ClientPool::from_json_file("clients.json", &TransportOptions::default(), None).await?;
//!
//! let client = pool.select();
//! match client.get(url).await {
//!     Ok(response) if response.status() == 429 => pool.backoff(client.id()),
//!     Ok(response) => handle(response),
//!     Err(_) => pool.backoff(client.id()),
//! }
//!
//! pool.close().await;
//! ```

mod client;
mod pool;
mod rate_limit;
mod transport;

pub use client::Client;
pub use pool::{ClientId, ClientPool, PoolStats, Selected, DEFAULT_BACKOFF};
pub use rate_limit::{RateLimitedTransport, RateLimiter};
pub use transport::{
    HttpTransport, Teardown, Transport, TransportOptions, Tunnel, TunnelConnector, TunnelGuard,
};
