//! Configuration loading for axon.
//!
//! Loads configuration from TOML files with environment variable
//! substitution, then validates it before anything dials a broker.
//!
//! # Example
//!
//! ```toml
//! [logger]
//! level = "info"
//! format = "json"
//!
//! [kafka]
//! brokers = ["broker-1:9092", "broker-2:9092"]
//! group_id = "orders-service"
//!
//! [kafka.security]
//! protocol = "SASL_SCRAM"
//!
//! [kafka.security.sasl_scram]
//! algorithm = "SHA-512"
//! username = "${KAFKA_USERNAME}"
//! password = "${KAFKA_PASSWORD}"
//! ```

use crate::logging::LogFormat;
use crate::security::SecurityConfig;
use regex::Regex;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Configuration errors. All are fatal at construction, before any I/O
/// against the brokers.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Security protocol requires the '{0}' section")]
    MissingSaslSection(&'static str),

    #[error("Unsupported SCRAM algorithm: {0} (expected SHA-256 or SHA-512)")]
    UnsupportedAlgorithm(String),

    #[error("Kafka client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxonConfig {
    #[serde(default)]
    pub logger: LoggerConfig,

    #[serde(default)]
    pub kafka: KafkaConfig,
}

/// Logger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Kafka cluster configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    /// Ordered list of host:port broker endpoints
    #[serde(default)]
    pub brokers: Vec<String>,

    /// Consumer group identifier; offset coordination is delegated to the
    /// broker for all members sharing it
    #[serde(default = "default_group_id")]
    pub group_id: String,

    #[serde(default)]
    pub security: SecurityConfig,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: Vec::new(),
            group_id: default_group_id(),
            security: SecurityConfig::default(),
        }
    }
}

fn default_group_id() -> String {
    "axon".to_string()
}

impl AxonConfig {
    /// Load configuration from the default path or the `AXON_CONFIG`
    /// environment variable.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("AXON_CONFIG").unwrap_or_else(|_| "config/axon.toml".to_string());
        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path.
    ///
    /// A missing file yields the defaults (which fail validation until
    /// brokers are supplied some other way).
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        info!(path = %path.display(), "Loading configuration");

        let content = fs::read_to_string(path)?;
        let content = substitute_env_vars(&content);

        debug!("Parsing TOML configuration");
        let config: AxonConfig = toml::from_str(&content)?;

        config.validate()?;

        info!(
            brokers = config.kafka.brokers.len(),
            group_id = %config.kafka.group_id,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_brokers(&self.kafka.brokers)?;
        validate_group_id(&self.kafka.group_id)?;
        self.kafka.security.mechanism()?;
        Ok(())
    }
}

/// Brokers must be a non-empty list of host:port endpoints.
pub(crate) fn validate_brokers(brokers: &[String]) -> Result<(), ConfigError> {
    if brokers.is_empty() {
        return Err(ConfigError::Validation(
            "at least one broker address is required".to_string(),
        ));
    }
    for broker in brokers {
        if !is_host_port(broker) {
            return Err(ConfigError::Validation(format!(
                "broker '{broker}' is not a host:port endpoint"
            )));
        }
    }
    Ok(())
}

/// The consumer group id must be non-empty.
pub(crate) fn validate_group_id(group_id: &str) -> Result<(), ConfigError> {
    if group_id.is_empty() {
        return Err(ConfigError::Validation(
            "group_id must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn is_host_port(endpoint: &str) -> bool {
    match endpoint.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

/// Substitute environment variables in the format `${VAR_NAME}`.
fn substitute_env_vars(content: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();

    re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        match env::var(var_name) {
            Ok(value) => value,
            Err(_) => {
                debug!(var = %var_name, "Environment variable not set, keeping placeholder");
                caps[0].to_string()
            }
        }
    })
    .to_string()
}
