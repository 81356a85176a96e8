//! Connector Framework configuration types
//!
//! Base trait and common configuration structures.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::ConnectorResult;

/// Trait for connector-specific configuration.
///
/// Each connector implements this trait to define its configuration
/// schema and validation rules.
pub trait ConnectorConfig: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> ConnectorResult<()>;

    /// Get credentials held by this configuration.
    ///
    /// Returns a list of (field_name, value) pairs for sensitive data.
    fn get_credentials(&self) -> Vec<(&'static str, String)>;

    /// Create a redacted version of this config (for logging/display).
    ///
    /// Sensitive fields should be replaced with placeholders.
    fn redacted(&self) -> Self;

    /// Parse and validate a configuration from JSON.
    fn from_json(json: &str) -> ConnectorResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }
}

/// Common connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Read timeout in seconds, applied to every directory operation.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    60
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl ConnectionSettings {
    /// Create new connection settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    /// Get connection timeout as Duration.
    pub fn connection_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connection_timeout_secs)
    }

    /// Get read timeout as Duration.
    pub fn read_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.read_timeout_secs)
    }
}

/// SSL/TLS configuration.
///
/// Whether TLS is used at all is decided by the connector's transport
/// settings (LDAPS or STARTTLS); this only tunes the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_certificate: true,
        }
    }
}

impl TlsConfig {
    /// Log a warning when a TLS connection would skip certificate verification.
    ///
    /// `tls_in_use` is true for both LDAPS and STARTTLS. Returns whether the
    /// warning was emitted.
    pub fn validate_security(&self, tls_in_use: bool) -> bool {
        let insecure = tls_in_use && !self.verify_certificate;
        if insecure {
            tracing::warn!(
                target: "security",
                "TLS certificate verification is disabled; \
                 only use this against a local development directory"
            );
        }
        insecure
    }

    /// Create a TLS config that accepts any server certificate.
    pub fn insecure() -> Self {
        Self {
            verify_certificate: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_settings_defaults() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.connection_timeout_secs, 30);
        assert_eq!(settings.read_timeout_secs, 60);
    }

    #[test]
    fn test_connection_settings_builder() {
        let settings = ConnectionSettings::new()
            .with_connection_timeout(5)
            .with_read_timeout(10);

        assert_eq!(settings.connection_timeout(), std::time::Duration::from_secs(5));
        assert_eq!(settings.read_timeout(), std::time::Duration::from_secs(10));
    }

    #[test]
    fn test_connection_settings_partial_json() {
        let settings: ConnectionSettings =
            serde_json::from_str(r#"{"read_timeout_secs": 15}"#).unwrap();
        assert_eq!(settings.connection_timeout_secs, 30);
        assert_eq!(settings.read_timeout_secs, 15);
    }

    #[test]
    fn test_tls_config_security_warning() {
        let tls = TlsConfig::default();
        assert!(tls.verify_certificate);
        assert!(!tls.validate_security(true));

        let insecure = TlsConfig::insecure();
        assert!(insecure.validate_security(true));
        // Plain LDAP never performs a handshake.
        assert!(!insecure.validate_security(false));
    }

    #[test]
    fn test_tls_config_ignores_legacy_enabled_flag() {
        let tls: TlsConfig =
            serde_json::from_str(r#"{"enabled": true, "verify_certificate": false}"#).unwrap();
        assert_eq!(tls, TlsConfig::insecure());
    }
}
