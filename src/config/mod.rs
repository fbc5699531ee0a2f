//! Configuration management module
//!
//! This module handles loading application settings from environment
//! variables and .env files, and the JSON file describing the pooled clients.

pub mod clients;
pub mod secrets;
pub mod settings;

pub use clients::{
    load_client_configs, parse_client_configs, ClientConfig, ConflictingTransport,
    TransportConfig, WireguardConfig, WireguardPeer,
};
pub use settings::{Environment, FetchConfig, Settings};
