//! Session store configuration

use crate::codec::{ProtocolVersion, TokenFormat};
use crate::error::{ConfigError, TidemarkError, TidemarkResult};
use uuid::Uuid;

/// Configuration for one session token store.
///
/// Environment variables read by [`SessionStoreConfig::from_env`]:
/// - `TIDEMARK_HOST`: host identifier (default: `client-{uuid}`)
/// - `TIDEMARK_PROTOCOL_VERSION`: negotiated protocol version (default: current)
/// - `TIDEMARK_LOG_DECODE_FAILURES`: "true" or "false" (default: true)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStoreConfig {
    /// Fixed identifier of the client connection owning the store.
    pub host: String,
    /// Protocol version negotiated with the backend.
    pub protocol_version: ProtocolVersion,
    /// Whether dropped updates emit a warning.
    pub log_decode_failures: bool,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            host: format!("client-{}", Uuid::now_v7()),
            protocol_version: ProtocolVersion::CURRENT,
            log_decode_failures: true,
        }
    }
}

impl SessionStoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("TIDEMARK_HOST")
            .ok()
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host);

        let protocol_version = std::env::var("TIDEMARK_PROTOCOL_VERSION")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(ProtocolVersion)
            .unwrap_or(defaults.protocol_version);

        let log_decode_failures = std::env::var("TIDEMARK_LOG_DECODE_FAILURES")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(defaults.log_decode_failures);

        Self {
            host,
            protocol_version,
            log_decode_failures,
        }
    }

    /// Set the host identifier.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the negotiated protocol version.
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    /// Enable or disable decode failure warnings.
    pub fn with_decode_failure_logging(mut self, enabled: bool) -> Self {
        self.log_decode_failures = enabled;
        self
    }

    /// Header grammar implied by the negotiated protocol version.
    pub fn token_format(&self) -> TokenFormat {
        self.protocol_version.token_format()
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - host is non-empty and contains no whitespace
    /// - protocol_version > 0
    pub fn validate(&self) -> TidemarkResult<()> {
        if self.host.is_empty() {
            return Err(TidemarkError::Config(ConfigError::MissingRequired {
                field: "host".to_string(),
            }));
        }

        if self.host.chars().any(char::is_whitespace) {
            return Err(TidemarkError::Config(ConfigError::InvalidValue {
                field: "host".to_string(),
                value: self.host.clone(),
                reason: "must not contain whitespace".to_string(),
            }));
        }

        if self.protocol_version.0 == 0 {
            return Err(TidemarkError::Config(ConfigError::InvalidValue {
                field: "protocol_version".to_string(),
                value: self.protocol_version.to_string(),
                reason: "must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}
