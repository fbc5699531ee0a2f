//! Client configuration file
//!
//! The pool is configured from a JSON array of client records:
//!
//! ```json
//! [
//!   {"key": "env:PKP_API_KEY"},
//!   {"key": "second-key", "rate_limit": "1s", "proxy": "socks5://10.0.0.1:1080"},
//!   {"key": "third-key", "wireguard": {"private_key": "...", "addresses": ["10.64.0.2/32"],
//!     "peer": {"public_key": "...", "endpoint": "vpn.example.com:51820"}}}
//! ]
//! ```
//!
//! `proxy` and `wireguard` are mutually exclusive; each record is turned into
//! a `TransportConfig` variant while parsing so a conflicting record never
//! makes it past deserialization.

use crate::error::PoolError;
use crate::utils::mask_key;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::secrets;

/// Prefix marking a key that should be read from the environment
const ENV_KEY_PREFIX: &str = "env:";

/// How a client reaches the outside world
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    /// Plain outbound connections
    Direct,
    /// All requests go through this proxy
    Proxy(Url),
    /// Requests go through a Wireguard tunnel
    Wireguard(WireguardConfig),
}

impl TransportConfig {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            TransportConfig::Direct => "direct",
            TransportConfig::Proxy(_) => "proxy",
            TransportConfig::Wireguard(_) => "wireguard",
        }
    }
}

/// Configuration of one pooled client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawClientConfig")]
pub struct ClientConfig {
    /// Identity token, or `env:NAME` to read it from the environment
    pub key: String,
    /// Minimum spacing between requests; zero means unlimited
    pub rate_limit: Duration,
    pub transport: TransportConfig,
}

impl ClientConfig {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rate_limit: Duration::ZERO,
            transport: TransportConfig::Direct,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: Duration) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// The key to send with, reading `env:NAME` keys from the environment
    pub fn resolve_key(&self) -> Result<String, PoolError> {
        match self.key.strip_prefix(ENV_KEY_PREFIX) {
            Some(name) => secrets::api_key(name),
            None => Ok(self.key.clone()),
        }
    }
}

/// On-disk shape of a client record
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawClientConfig {
    key: String,
    #[serde(default, with = "humantime_serde")]
    rate_limit: Option<Duration>,
    #[serde(default)]
    proxy: Option<Url>,
    #[serde(default)]
    wireguard: Option<WireguardConfig>,
}

/// A record set both `proxy` and `wireguard`
#[derive(Error, Debug)]
#[error("client {key}: `proxy` and `wireguard` cannot be used at the same time")]
pub struct ConflictingTransport {
    key: String,
}

impl TryFrom<RawClientConfig> for ClientConfig {
    type Error = ConflictingTransport;

    fn try_from(raw: RawClientConfig) -> Result<Self, Self::Error> {
        let transport = match (raw.proxy, raw.wireguard) {
            (Some(_), Some(_)) => {
                return Err(ConflictingTransport {
                    key: mask_key(&raw.key),
                })
            }
            (Some(proxy), None) => TransportConfig::Proxy(proxy),
            (None, Some(wireguard)) => TransportConfig::Wireguard(wireguard),
            (None, None) => TransportConfig::Direct,
        };

        Ok(Self {
            key: raw.key,
            rate_limit: raw.rate_limit.unwrap_or(Duration::ZERO),
            transport,
        })
    }
}

// ============================================================================
// Wireguard
// ============================================================================

/// Settings for a Wireguard tunnel, handed to the `TunnelConnector`
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireguardConfig {
    /// Base64 private key of this end of the tunnel
    pub private_key: String,
    /// Interface addresses in CIDR notation
    pub addresses: Vec<String>,
    #[serde(default)]
    pub dns: Vec<String>,
    #[serde(default)]
    pub mtu: Option<u16>,
    pub peer: WireguardPeer,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WireguardPeer {
    pub public_key: String,
    #[serde(default)]
    pub preshared_key: Option<String>,
    /// `host:port` of the peer
    pub endpoint: String,
    #[serde(default = "default_allowed_ips")]
    pub allowed_ips: Vec<String>,
    #[serde(default, with = "humantime_serde")]
    pub persistent_keepalive: Option<Duration>,
}

fn default_allowed_ips() -> Vec<String> {
    vec!["0.0.0.0/0".to_string(), "::/0".to_string()]
}

impl std::fmt::Debug for WireguardConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WireguardConfig")
            .field("private_key", &"<redacted>")
            .field("addresses", &self.addresses)
            .field("dns", &self.dns)
            .field("mtu", &self.mtu)
            .field("peer", &self.peer.endpoint)
            .finish()
    }
}

// ============================================================================
// Loading
// ============================================================================

/// Parse a JSON array of client records; `path` is only used in errors
pub fn parse_client_configs(json: &str, path: &Path) -> Result<Vec<ClientConfig>, PoolError> {
    serde_json::from_str(json).map_err(|source| PoolError::Config {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse the client configuration file at `path`
pub async fn load_client_configs(path: &Path) -> Result<Vec<ClientConfig>, PoolError> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PoolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let configs = parse_client_configs(&json, path)?;

    tracing::debug!(
        path = %path.display(),
        clients = configs.len(),
        "Loaded client configuration"
    );

    Ok(configs)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<Vec<ClientConfig>, PoolError> {
        parse_client_configs(json, Path::new("clients.json"))
    }

    #[test]
    fn test_parse_direct_client() {
        let configs = parse(r#"[{"key": "abc"}]"#).unwrap();
        assert_eq!(configs, vec![ClientConfig::new("abc")]);
    }

    #[test]
    fn test_parse_rate_limit_durations() {
        let configs = parse(
            r#"[
                {"key": "a", "rate_limit": "1s"},
                {"key": "b", "rate_limit": "500ms"},
                {"key": "c", "rate_limit": "1m 30s"},
                {"key": "d", "rate_limit": "0s"}
            ]"#,
        )
        .unwrap();

        assert_eq!(configs[0].rate_limit, Duration::from_secs(1));
        assert_eq!(configs[1].rate_limit, Duration::from_millis(500));
        assert_eq!(configs[2].rate_limit, Duration::from_secs(90));
        assert_eq!(configs[3].rate_limit, Duration::ZERO);
    }

    #[test]
    fn test_parse_proxy_client() {
        let configs = parse(r#"[{"key": "p", "proxy": "socks5://10.0.0.1:1080"}]"#).unwrap();
        assert_eq!(
            configs[0].transport,
            TransportConfig::Proxy(Url::parse("socks5://10.0.0.1:1080").unwrap())
        );
        assert_eq!(configs[0].transport.kind(), "proxy");
    }

    #[test]
    fn test_parse_wireguard_client() {
        let configs = parse(
            r#"[{
                "key": "w",
                "wireguard": {
                    "private_key": "cHJpdmF0ZQ==",
                    "addresses": ["10.64.0.2/32"],
                    "dns": ["10.64.0.1"],
                    "peer": {
                        "public_key": "cHVibGlj",
                        "endpoint": "vpn.example.com:51820",
                        "persistent_keepalive": "25s"
                    }
                }
            }]"#,
        )
        .unwrap();

        let TransportConfig::Wireguard(wireguard) = &configs[0].transport else {
            panic!("expected wireguard transport, got {:?}", configs[0].transport);
        };
        assert_eq!(wireguard.addresses, vec!["10.64.0.2/32"]);
        assert_eq!(wireguard.peer.allowed_ips, default_allowed_ips());
        assert_eq!(
            wireguard.peer.persistent_keepalive,
            Some(Duration::from_secs(25))
        );
        assert!(!format!("{:?}", wireguard).contains("cHJpdmF0ZQ=="));
    }

    #[test]
    fn test_proxy_and_wireguard_conflict() {
        let err = parse(
            r#"[{
                "key": "conflicted-key",
                "proxy": "http://10.0.0.1:3128",
                "wireguard": {
                    "private_key": "x",
                    "addresses": [],
                    "peer": {"public_key": "y", "endpoint": "vpn:51820"}
                }
            }]"#,
        )
        .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("cannot be used at the same time"), "{}", message);
        assert!(!message.contains("conflicted-key"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(parse(r#"[{"key": "a", "ratelimit": "1s"}]"#).is_err());
    }

    #[test]
    fn test_malformed_duration_rejected() {
        let err = parse(r#"[{"key": "a", "rate_limit": "soon"}]"#).unwrap_err();
        assert!(matches!(err, PoolError::Config { .. }));
    }

    #[test]
    fn test_resolve_plain_key() {
        assert_eq!(ClientConfig::new("plain").resolve_key().unwrap(), "plain");
    }

    #[test]
    fn test_resolve_env_key() {
        std::env::set_var("CLIENT_POOL_TEST_RESOLVE_KEY", "  from-env \n");
        let config = ClientConfig::new("env:CLIENT_POOL_TEST_RESOLVE_KEY");
        assert_eq!(config.resolve_key().unwrap(), "from-env");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = load_client_configs(Path::new("/nonexistent/clients.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }
}
