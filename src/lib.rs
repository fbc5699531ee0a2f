//! Pool of rate-limited outbound HTTP clients

// Public modules
pub mod config;
pub mod error;
pub mod logging;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::{FetchError, PoolError, SendError};
pub use services::{Client, ClientPool, Fetcher};
