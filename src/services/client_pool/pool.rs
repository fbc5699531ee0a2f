//! Client Pool Implementation
//!
//! This module provides `ClientPool`, which spreads requests over its clients
//! at random while steering clear of clients that were recently backed off.

use crate::config::{load_client_configs, ClientConfig};
use crate::error::PoolError;
use crate::utils::{deadline_after, mask_key};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::Deref;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::client::Client;
use super::transport::{TransportOptions, TunnelConnector};

/// How long a penalized client stays out of rotation
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(30 * 60);

// ============================================================================
// Selection handles
// ============================================================================

/// Identifies a client within its pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(usize);

impl ClientId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A client returned by `ClientPool::select`
///
/// Dereferences to the `Client`; keep the `id` around to back the client
/// off if the request it sends turns out to be its fault.
#[derive(Debug, Clone, Copy)]
pub struct Selected<'a> {
    id: ClientId,
    client: &'a Client,
}

impl<'a> Selected<'a> {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn client(&self) -> &'a Client {
        self.client
    }
}

impl Deref for Selected<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client
    }
}

// ============================================================================
// Client Pool
// ============================================================================

/// Mutable selection state, guarded as a whole
#[derive(Debug)]
struct SelectionState {
    /// Backed-off-until per client, index-aligned with `ClientPool::clients`
    backoff: Vec<Option<Instant>>,
    /// Index of the most recently selected client
    last: usize,
    rng: StdRng,
}

impl SelectionState {
    fn is_available(&self, idx: usize, now: Instant) -> bool {
        self.backoff[idx].map_or(true, |until| until < now)
    }
}

/// A fixed set of interchangeable clients with randomized selection
///
/// Selection draws up to `len()` random indices and takes the first client
/// that is not backed off. Draws are independent, so the same index can come
/// up more than once. If every draw hits a backed-off client the pool picks one
/// at random anyway: selection never fails.
#[derive(Debug)]
pub struct ClientPool {
    clients: Vec<Client>,
    backoff_duration: Duration,
    state: Mutex<SelectionState>,
}

impl ClientPool {
    /// Create a pool over `clients`, which must not be empty
    pub fn new(clients: Vec<Client>) -> Result<Self, PoolError> {
        Self::with_rng(clients, StdRng::from_entropy())
    }

    /// Create a pool drawing its random indices from `rng`
    pub fn with_rng(clients: Vec<Client>, rng: StdRng) -> Result<Self, PoolError> {
        if clients.is_empty() {
            return Err(PoolError::EmptyPool);
        }

        tracing::info!(clients = clients.len(), "Initialized client pool");

        Ok(Self {
            state: Mutex::new(SelectionState {
                backoff: vec![None; clients.len()],
                last: 0,
                rng,
            }),
            clients,
            backoff_duration: DEFAULT_BACKOFF,
        })
    }

    /// Override how long penalized clients stay backed off
    pub fn with_backoff(mut self, duration: Duration) -> Self {
        self.backoff_duration = duration;
        self
    }

    /// Build every configured client and pool them
    ///
    /// If any client fails to build, tunnels already brought up for earlier
    /// clients are torn down before the error is returned.
    pub async fn from_configs(
        configs: &[ClientConfig],
        options: &TransportOptions,
        connector: Option<&dyn TunnelConnector>,
    ) -> Result<Self, PoolError> {
        let mut clients = Vec::with_capacity(configs.len());
        for config in configs {
            match Client::from_config(config, options, connector).await {
                Ok(client) => clients.push(client),
                Err(err) => {
                    close_clients(&clients).await;
                    return Err(err);
                }
            }
        }
        Self::new(clients)
    }

    /// Load client configurations from a JSON file and pool them
    pub async fn from_json_file(
        path: impl AsRef<Path>,
        options: &TransportOptions,
        connector: Option<&dyn TunnelConnector>,
    ) -> Result<Self, PoolError> {
        let configs = load_client_configs(path.as_ref()).await?;
        Self::from_configs(&configs, options, connector).await
    }

    /// Pick a client for the next request
    pub fn select(&self) -> Selected<'_> {
        // A lone client is always used, backed off or not
        if self.clients.len() == 1 {
            return self.selected(0);
        }

        let now = Instant::now();
        let mut state = self.state();
        for _ in 0..self.clients.len() {
            let idx = state.rng.gen_range(0..self.clients.len());
            if state.is_available(idx, now) {
                state.last = idx;
                return self.selected(idx);
            }
        }

        let idx = state.rng.gen_range(0..self.clients.len());
        state.last = idx;
        drop(state);

        tracing::warn!(
            clients = self.clients.len(),
            selected = %mask_key(self.clients[idx].key()),
            "Failed to select a client that is not backed off"
        );
        self.selected(idx)
    }

    /// Back off the client identified by `id`
    pub fn backoff(&self, id: ClientId) {
        let until = deadline_after(Instant::now(), self.backoff_duration);
        self.state().backoff[id.0] = Some(until);

        tracing::info!(
            client = %mask_key(self.clients[id.0].key()),
            backoff_secs = self.backoff_duration.as_secs(),
            "Client backed off"
        );
    }

    /// Back off whichever client `select` returned most recently
    ///
    /// With concurrent callers another `select` may land in between; prefer
    /// `backoff` with the id from `Selected` in that case.
    pub fn backoff_last(&self) {
        let last = self.state().last;
        self.backoff(ClientId(last));
    }

    /// Whether the client is currently excluded from selection
    pub fn is_backed_off(&self, id: ClientId) -> bool {
        !self.state().is_available(id.0, Instant::now())
    }

    /// Get all clients, in configuration order
    pub fn clients(&self) -> &[Client] {
        &self.clients
    }

    /// Get the number of clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Always false: a pool cannot be built without clients
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let now = Instant::now();
        let state = self.state();
        let available = (0..self.clients.len())
            .filter(|&idx| state.is_available(idx, now))
            .count();
        PoolStats {
            total: self.clients.len(),
            available,
            backed_off: self.clients.len() - available,
        }
    }

    /// Tear down every client's tunnel, in order
    ///
    /// Failures are logged and do not stop the remaining teardowns. Each
    /// tunnel is torn down at most once, however often this is called.
    pub async fn close(&self) {
        close_clients(&self.clients).await;
    }

    fn selected(&self, idx: usize) -> Selected<'_> {
        Selected {
            id: ClientId(idx),
            client: &self.clients[idx],
        }
    }

    fn state(&self) -> MutexGuard<'_, SelectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn close_clients(clients: &[Client]) {
    for client in clients {
        match client.close().await {
            Some(Ok(())) => {
                tracing::debug!(client = %mask_key(client.key()), "Tunnel closed");
            }
            Some(Err(err)) => {
                tracing::error!(
                    client = %mask_key(client.key()),
                    error = %err,
                    "Failed to close tunnel"
                );
            }
            None => {}
        }
    }
}

// ============================================================================
// Pool Statistics
// ============================================================================

/// Statistics about a client pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total number of clients
    pub total: usize,
    /// Clients eligible for selection right now
    pub available: usize,
    /// Clients currently backed off
    pub backed_off: usize,
}

impl PoolStats {
    /// Check if the pool is healthy (at least one client available)
    pub fn is_healthy(&self) -> bool {
        self.available > 0
    }
}

// ============================================================================
// Tests
// ============================================================================
