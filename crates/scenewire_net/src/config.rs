//! # Node Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an empty
//! file (or no file) gives a working node on [`DEFAULT_PORT`].
//!
//! ```toml
//! bind_address = "0.0.0.0:50000"
//! session_name = "lab"
//! large_asset_protocol = "ws"
//! large_asset_ports = [50001]
//! duplicate_policy = "ignore"
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use scenewire_codec::short_string;
use scenewire_protocol::{DuplicatePolicy, LargeAssetProtocol};
use scenewire_shared::constants::{MAX_PROBE_ICON_SIZE, NAME_CAPACITY};
use scenewire_shared::{DEFAULT_LARGE_ASSET_PORT, DEFAULT_PORT, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::{NetError, NetResult};

/// Largest chunk the node sends on a large-asset channel, by default.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Receive limit for one incomplete message, by default.
///
/// Large enough for a probe reply carrying the biggest allowed icon.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = MAX_PROBE_ICON_SIZE + 1024;

/// How long a named transaction waits for its reply, by default.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 5_000;

/// Settings for a SCENEWIRE node.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Primary-channel listen address.
    pub bind_address: SocketAddr,
    /// Name sent in introduction and probe replies.
    pub session_name: String,
    /// Lowest protocol version accepted from clients.
    pub min_protocol_version: u16,
    /// Highest protocol version spoken.
    pub max_protocol_version: u16,
    /// Large-asset sub-protocol name advertised to clients: "", "ws" or "wss".
    pub large_asset_protocol: String,
    /// Large-asset listen ports. Empty disables the large-asset service.
    pub large_asset_ports: Vec<u16>,
    /// Largest chunk sent on a large-asset channel.
    pub chunk_size: usize,
    /// Receive limit for one incomplete message.
    pub max_message_size: usize,
    /// Named-transaction reply timeout in milliseconds.
    pub reply_timeout_ms: u64,
    /// What to do when a client creates an entity that already exists.
    pub duplicate_policy: DuplicatePolicy,
    /// Optional image returned in probe replies.
    pub icon_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            session_name: "scenewire".to_owned(),
            min_protocol_version: MIN_PROTOCOL_VERSION,
            max_protocol_version: PROTOCOL_VERSION,
            large_asset_protocol: String::new(),
            large_asset_ports: vec![DEFAULT_LARGE_ASSET_PORT],
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            duplicate_policy: DuplicatePolicy::default(),
            icon_path: None,
        }
    }
}

impl NodeConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the document does not parse or fails
    /// [`NodeConfig::validate`].
    pub fn from_toml_str(text: &str) -> NetResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| NetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`NodeConfig::from_toml_str`].
    pub fn load(path: &Path) -> NetResult<Self> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Checks every field against what the wire can carry.
    ///
    /// # Errors
    ///
    /// Returns `Config` naming the first bad field.
    pub fn validate(&self) -> NetResult<()> {
        if self.min_protocol_version > self.max_protocol_version {
            return Err(NetError::Config(format!(
                "min_protocol_version {} exceeds max_protocol_version {}",
                self.min_protocol_version, self.max_protocol_version
            )));
        }
        if self.max_protocol_version > PROTOCOL_VERSION {
            return Err(NetError::Config(format!(
                "max_protocol_version {} is newer than supported version {PROTOCOL_VERSION}",
                self.max_protocol_version
            )));
        }
        short_string::encode::<NAME_CAPACITY>(&self.session_name)
            .map_err(|e| NetError::Config(format!("session_name: {e}")))?;
        self.large_asset_protocol()?;
        if self.large_asset_ports.contains(&0) {
            return Err(NetError::Config("large_asset_ports must not contain 0".into()));
        }
        if self.chunk_size == 0 {
            return Err(NetError::Config("chunk_size must be positive".into()));
        }
        // A chunk message adds a tag and a u64 length.
        if self.max_message_size <= self.chunk_size + 9 {
            return Err(NetError::Config(format!(
                "max_message_size {} cannot hold a {}-byte chunk",
                self.max_message_size, self.chunk_size
            )));
        }
        Ok(())
    }

    /// The advertised large-asset sub-protocol.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the name is not one of "", "ws" or "wss".
    pub fn large_asset_protocol(&self) -> NetResult<LargeAssetProtocol> {
        LargeAssetProtocol::parse(&self.large_asset_protocol)
            .map_err(|e| NetError::Config(e.to_string()))
    }

    /// Listen addresses for the large-asset service, on the primary IP.
    #[must_use]
    pub fn large_asset_addresses(&self) -> Vec<SocketAddr> {
        self.large_asset_ports
            .iter()
            .map(|port| SocketAddr::new(self.bind_address.ip(), *port))
            .collect()
    }

    /// The named-transaction reply timeout.
    #[must_use]
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = NodeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.large_asset_protocol().unwrap(), LargeAssetProtocol::None);
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        assert_eq!(NodeConfig::from_toml_str("").unwrap(), NodeConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = NodeConfig::from_toml_str(
            r#"
            bind_address = "127.0.0.1:6000"
            session_name = "lab"
            large_asset_protocol = "wss"
            large_asset_ports = [6001, 6002]
            duplicate_policy = "ignore"
            reply_timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:6000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.session_name, "lab");
        assert_eq!(config.large_asset_protocol().unwrap(), LargeAssetProtocol::Wss);
        assert_eq!(
            config.large_asset_addresses(),
            vec![
                "127.0.0.1:6001".parse::<SocketAddr>().unwrap(),
                "127.0.0.1:6002".parse::<SocketAddr>().unwrap()
            ]
        );
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Ignore);
        assert_eq!(config.reply_timeout(), Duration::from_millis(250));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_rejects_unknown_protocol() {
        let err = NodeConfig::from_toml_str(r#"large_asset_protocol = "http""#).unwrap_err();
        assert!(matches!(err, NetError::Config(_)));
    }

    #[test]
    fn test_rejects_long_session_name() {
        let text = format!("session_name = \"{}\"", "x".repeat(NAME_CAPACITY + 1));
        assert!(matches!(
            NodeConfig::from_toml_str(&text),
            Err(NetError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_inverted_versions() {
        let config = NodeConfig {
            min_protocol_version: 2,
            max_protocol_version: 1,
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_chunk_larger_than_limit() {
        let config = NodeConfig {
            chunk_size: 1024,
            max_message_size: 1024,
            ..NodeConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_syntax_error() {
        assert!(matches!(
            NodeConfig::from_toml_str("bind_address = "),
            Err(NetError::Config(_))
        ));
    }
}
