//! Services module
//!
//! Contains the client pool and the fetch service built on top of it.

pub mod client_pool;
pub mod fetcher;

pub use client_pool::{
    Client, ClientId, ClientPool, HttpTransport, PoolStats, RateLimitedTransport, RateLimiter,
    Selected, Teardown, Transport, TransportOptions, Tunnel, TunnelConnector, TunnelGuard,
    DEFAULT_BACKOFF,
};
pub use fetcher::{FetchResponse, Fetcher};
