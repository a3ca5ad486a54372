//! Broker authentication configuration.
//!
//! [`SecurityConfig`] is the declarative description of how to authenticate
//! against the brokers: a protocol tag plus the nested credential section
//! that protocol requires. [`SecurityConfig::mechanism`] validates the tag
//! against its nested section and resolves it into an opaque
//! [`SaslMechanism`] consumed by the Kafka reader factory. Resolution is
//! pure and performs no network I/O.
//!
//! # Example
//!
//! ```toml
//! [kafka.security]
//! protocol = "SASL_SCRAM"
//!
//! [kafka.security.sasl_scram]
//! algorithm = "SHA-512"
//! username = "${KAFKA_USERNAME}"
//! password = "${KAFKA_PASSWORD}"
//! ```

use crate::config::ConfigError;
use serde::Deserialize;
use std::str::FromStr;

/// Security protocol used to communicate with the brokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SecurityProtocol {
    /// No authentication (development only)
    #[default]
    #[serde(rename = "PLAINTEXT")]
    Plaintext,

    /// SASL/PLAIN authentication without TLS
    #[serde(rename = "SASL_PLAINTEXT")]
    SaslPlaintext,

    /// SASL/SCRAM authentication without TLS
    #[serde(rename = "SASL_SCRAM")]
    SaslScram,
}

/// Credentials for the SASL/PLAIN protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct SaslPlaintextConfig {
    pub username: String,
    pub password: String,
}

/// Credentials for the SASL/SCRAM protocol.
///
/// `algorithm` must be `"SHA-256"` or `"SHA-512"`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaslScramConfig {
    pub algorithm: String,
    pub username: String,
    pub password: String,
}

/// SCRAM digest algorithms supported by the brokers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScramAlgorithm {
    Sha256,
    Sha512,
}

impl FromStr for ScramAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SHA-256" => Ok(Self::Sha256),
            "SHA-512" => Ok(Self::Sha512),
            other => Err(ConfigError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Declarative broker authentication configuration.
///
/// The protocol tag selects which nested section is required:
///
/// | `protocol`       | required section  |
/// |------------------|-------------------|
/// | `PLAINTEXT`      | none              |
/// | `SASL_PLAINTEXT` | `sasl_plaintext`  |
/// | `SASL_SCRAM`     | `sasl_scram`      |
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub protocol: SecurityProtocol,

    #[serde(default)]
    pub sasl_plaintext: Option<SaslPlaintextConfig>,

    #[serde(default)]
    pub sasl_scram: Option<SaslScramConfig>,
}

impl SecurityConfig {
    /// Shorthand for the default PLAINTEXT configuration.
    pub fn plaintext() -> Self {
        Self::default()
    }

    /// SASL/PLAIN configuration with the given credentials.
    pub fn sasl_plaintext(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            protocol: SecurityProtocol::SaslPlaintext,
            sasl_plaintext: Some(SaslPlaintextConfig {
                username: username.into(),
                password: password.into(),
            }),
            sasl_scram: None,
        }
    }

    /// SASL/SCRAM configuration with the given algorithm and credentials.
    pub fn sasl_scram(
        algorithm: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            protocol: SecurityProtocol::SaslScram,
            sasl_plaintext: None,
            sasl_scram: Some(SaslScramConfig {
                algorithm: algorithm.into(),
                username: username.into(),
                password: password.into(),
            }),
        }
    }

    /// Validate the protocol tag against its nested section and resolve the
    /// concrete authentication mechanism.
    ///
    /// Fails with [`ConfigError`] when the required nested section is absent,
    /// a credential field is empty, or the SCRAM algorithm is not SHA-256 or
    /// SHA-512.
    pub fn mechanism(&self) -> Result<SaslMechanism, ConfigError> {
        match self.protocol {
            SecurityProtocol::Plaintext => Ok(SaslMechanism::Plaintext),
            SecurityProtocol::SaslPlaintext => {
                let sasl = self
                    .sasl_plaintext
                    .as_ref()
                    .ok_or(ConfigError::MissingSaslSection("sasl_plaintext"))?;
                require_credentials(&sasl.username, &sasl.password, "sasl_plaintext")?;
                Ok(SaslMechanism::Plain {
                    username: sasl.username.clone(),
                    password: sasl.password.clone(),
                })
            }
            SecurityProtocol::SaslScram => {
                let sasl = self
                    .sasl_scram
                    .as_ref()
                    .ok_or(ConfigError::MissingSaslSection("sasl_scram"))?;
                require_credentials(&sasl.username, &sasl.password, "sasl_scram")?;
                let algorithm: ScramAlgorithm = sasl.algorithm.parse()?;
                Ok(SaslMechanism::Scram {
                    algorithm,
                    username: sasl.username.clone(),
                    password: sasl.password.clone(),
                })
            }
        }
    }
}

fn require_credentials(username: &str, password: &str, section: &str) -> Result<(), ConfigError> {
    if username.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{section}.username must not be empty"
        )));
    }
    if password.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{section}.password must not be empty"
        )));
    }
    Ok(())
}

/// Resolved authentication mechanism, consumed by the Kafka reader factory.
///
/// Opaque to handlers and interceptors; only the connection layer inspects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslMechanism {
    /// No authentication
    Plaintext,

    /// SASL/PLAIN
    Plain { username: String, password: String },

    /// SASL/SCRAM with the given digest algorithm
    Scram {
        algorithm: ScramAlgorithm,
        username: String,
        password: String,
    },
}
