//! # Configuration Management
//!
//! Centralized configuration for a VASP endpoint.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`
//!
//! Key material is carried as hex strings; validation checks widths and
//! hex-ness but never logs the values themselves.

use crate::error::{Result, VaspError};
use crate::model::identity::VASP_CODE_LENGTH;
use crate::model::{VaspCode, VaspInfo};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Full configuration of one VASP endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct VaspConfig {
    /// Public identity advertised to counterparties
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Key material (hex-encoded)
    #[serde(default)]
    pub keys: KeyConfig,

    /// Session lifecycle settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Shutdown drain settings
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl VaspConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| VaspError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| VaspError::Config(format!("failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(code) = std::env::var("VASP_PROTOCOL_CODE") {
            config.identity.vasp_code = code;
        }
        if let Ok(name) = std::env::var("VASP_PROTOCOL_NAME") {
            config.identity.name = name;
        }
        if let Ok(ttl) = std::env::var("VASP_PROTOCOL_SESSION_TTL_MS") {
            if let Ok(val) = ttl.parse::<u64>() {
                config.session.session_ttl = Duration::from_millis(val);
            }
        }
        if let Ok(timeout) = std::env::var("VASP_PROTOCOL_WAIT_TIMEOUT_MS") {
            if let Ok(val) = timeout.parse::<u64>() {
                config.shutdown.wait_timeout = Duration::from_millis(val);
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate an endpoint configuration with fresh signing and
    /// handshake key pairs. Handy for tests and local demos.
    pub fn generate(name: impl Into<String>, vasp_code: &str) -> Result<Self> {
        use k256::ecdsa::SigningKey;

        let signing_key = SigningKey::random(&mut rand::thread_rng());
        let signing_public = signing_key.verifying_key().to_encoded_point(false);
        let (handshake_private, handshake_public) =
            crate::transport::envelope::generate_handshake_keypair();

        let mut config = Self::default();
        config.identity.name = name.into();
        config.identity.vasp_code = vasp_code.to_string();
        config.identity.contract_address = format!("0x{}", vasp_code.repeat(5));
        config.keys = KeyConfig {
            signing_private_key: hex::encode(signing_key.to_bytes()),
            signing_public_key: hex::encode(signing_public.as_bytes()),
            handshake_private_key: handshake_private,
            handshake_public_key: handshake_public,
        };
        config.validate_strict()?;
        Ok(config)
    }

    /// The public identity this configuration advertises.
    pub fn own_info(&self) -> Result<VaspInfo> {
        Ok(VaspInfo {
            name: self.identity.name.clone(),
            vasp_code: VaspCode::new(self.identity.vasp_code.clone())?,
            contract_address: self.identity.contract_address.clone(),
            handshake_key: self.keys.handshake_public_key.clone(),
            signing_key: self.keys.signing_public_key.clone(),
        })
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.identity.validate());
        errors.extend(self.keys.validate());
        errors.extend(self.session.validate());
        errors.extend(self.shutdown.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(VaspError::Config(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Public identity settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct IdentityConfig {
    /// Display name of this VASP
    pub name: String,

    /// Registered VASP code, 8 hex characters
    pub vasp_code: String,

    /// Registry contract address, hex
    pub contract_address: String,
}

impl IdentityConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.name.is_empty() {
            errors.push("identity.name cannot be empty".to_string());
        }
        if self.vasp_code.len() != VASP_CODE_LENGTH
            || !self.vasp_code.chars().all(|c| c.is_ascii_hexdigit())
        {
            errors.push(format!(
                "identity.vasp_code must be {VASP_CODE_LENGTH} hex characters, got '{}'",
                self.vasp_code
            ));
        }
        errors
    }
}

/// Hex-encoded key material
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KeyConfig {
    /// secp256k1 signing private key, 64 hex characters
    pub signing_private_key: String,

    /// Uncompressed secp256k1 public key (with or without the `04` tag)
    pub signing_public_key: String,

    /// x25519 handshake private key, 64 hex characters
    pub handshake_private_key: String,

    /// x25519 handshake public key, 64 hex characters
    pub handshake_public_key: String,
}

impl KeyConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (field, value, width) in [
            ("keys.signing_private_key", &self.signing_private_key, 64),
            (
                "keys.handshake_private_key",
                &self.handshake_private_key,
                64,
            ),
            ("keys.handshake_public_key", &self.handshake_public_key, 64),
        ] {
            if value.len() != width || !value.chars().all(|c| c.is_ascii_hexdigit()) {
                errors.push(format!("{field} must be {width} hex characters"));
            }
        }
        // The signing public key may carry a leading format byte; the
        // verifier keeps only the trailing 128 characters.
        if self.signing_public_key.len() < 128
            || !self
                .signing_public_key
                .chars()
                .all(|c| c.is_ascii_hexdigit())
        {
            errors.push("keys.signing_public_key must be at least 128 hex characters".to_string());
        }
        errors
    }
}

/// Session lifecycle settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Idle time before a session is eligible for the sweeper
    #[serde(with = "duration_serde")]
    pub session_ttl: Duration,

    /// Interval between sweeper passes
    #[serde(with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.session_ttl.as_millis() < 100 {
            errors.push("session.session_ttl too short (minimum: 100ms)".to_string());
        }
        if self.sweep_interval.as_millis() < 100 {
            errors.push("session.sweep_interval too short (minimum: 100ms)".to_string());
        }
        errors
    }
}

/// Shutdown drain settings: a first bounded wait, escalating to one
/// longer wait after a forced shutdown.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ShutdownConfig {
    #[serde(with = "duration_serde")]
    pub wait_timeout: Duration,

    #[serde(with = "duration_serde")]
    pub escalation_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(5),
            escalation_timeout: Duration::from_secs(20),
        }
    }
}

impl ShutdownConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.wait_timeout.as_millis() < 10 {
            errors.push("shutdown.wait_timeout too short (minimum: 10ms)".to_string());
        }
        if self.escalation_timeout < self.wait_timeout {
            errors.push(
                "shutdown.escalation_timeout must not be shorter than wait_timeout".to_string(),
            );
        }
        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("vasp-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.app_name.is_empty() {
            errors.push("logging.app_name cannot be empty".to_string());
        }
        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("invalid log level: {level_str}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_config_validates() {
        let config = VaspConfig::generate("Test VASP", "7dface61").unwrap();
        assert!(config.validate().is_empty());
        let info = config.own_info().unwrap();
        assert_eq!(info.vasp_code.as_str(), "7dface61");
        // Uncompressed SEC1 key with the 04 tag: 130 hex chars.
        assert_eq!(info.signing_key.len(), 130);
    }

    #[test]
    fn default_config_reports_missing_keys() {
        let errors = VaspConfig::default().validate();
        assert!(errors.iter().any(|e| e.contains("identity.vasp_code")));
        assert!(errors.iter().any(|e| e.contains("signing_private_key")));
    }

    #[test]
    fn toml_round_trip() {
        let config = VaspConfig::generate("Test VASP", "7dface61").unwrap();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back = VaspConfig::from_toml(&toml).unwrap();
        assert!(back.validate().is_empty());
        assert_eq!(back.identity.vasp_code, "7dface61");
        assert_eq!(back.session.session_ttl, config.session.session_ttl);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        let err = VaspConfig::from_toml("identity = 12").unwrap_err();
        assert!(matches!(err, VaspError::Config(_)));
    }

    #[test]
    fn escalation_shorter_than_wait_is_flagged() {
        let config = VaspConfig::default_with_overrides(|c| {
            c.shutdown.wait_timeout = Duration::from_secs(10);
            c.shutdown.escalation_timeout = Duration::from_secs(1);
        });
        assert!(config
            .validate()
            .iter()
            .any(|e| e.contains("escalation_timeout")));
    }
}
