//! Utility modules
//!
//! Contains retry logic, string and time helpers.

pub mod retry;
pub mod string;
pub mod time;

pub use retry::{retry_with_backoff, RetryConfig, RetryResult};
pub use string::{mask_key, truncate_str};
pub use time::deadline_after;
