//! Error types

mod types;

pub use types::{FetchError, PoolError, SendError};
