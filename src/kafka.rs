//! Kafka-backed reader implementation.
//!
//! [`KafkaReaderFactory`] opens one `rdkafka` stream consumer per topic,
//! all bound to the same brokers, group id and authentication mechanism.
//! Offset coordination is delegated entirely to the broker client
//! (auto-commit); the runtime never manages offsets itself.

use crate::config::ConfigError;
use crate::message::Message;
use crate::reader::{FetchError, ReaderFactory, TopicReader};
use crate::security::{SaslMechanism, ScramAlgorithm};
use crate::signal::Signal;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message as KafkaRecord;
use tracing::{debug, info};

/// Opens [`KafkaReader`]s for the configured cluster.
pub struct KafkaReaderFactory {
    brokers: Vec<String>,
    group_id: String,
    mechanism: SaslMechanism,
}

impl KafkaReaderFactory {
    /// Create a factory for the given cluster coordinates.
    pub fn new(brokers: Vec<String>, group_id: impl Into<String>, mechanism: SaslMechanism) -> Self {
        Self {
            brokers,
            group_id: group_id.into(),
            mechanism,
        }
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "earliest");
        apply_mechanism(&self.mechanism, &mut config);
        config
    }
}

impl ReaderFactory for KafkaReaderFactory {
    fn open(&self, topic: &str) -> Result<Box<dyn TopicReader>, ConfigError> {
        let consumer: StreamConsumer = self.client_config().create()?;
        consumer.subscribe(&[topic])?;

        info!(
            topic = %topic,
            group_id = %self.group_id,
            brokers = ?self.brokers,
            "Opened Kafka reader"
        );

        Ok(Box::new(KafkaReader {
            consumer,
            closed: Signal::new(),
        }))
    }
}

/// Translate the resolved mechanism into librdkafka client properties.
fn apply_mechanism(mechanism: &SaslMechanism, config: &mut ClientConfig) {
    match mechanism {
        SaslMechanism::Plaintext => {
            config.set("security.protocol", "plaintext");
        }
        SaslMechanism::Plain { username, password } => {
            config
                .set("security.protocol", "sasl_plaintext")
                .set("sasl.mechanism", "PLAIN")
                .set("sasl.username", username)
                .set("sasl.password", password);
        }
        SaslMechanism::Scram {
            algorithm,
            username,
            password,
        } => {
            let sasl_mechanism = match algorithm {
                ScramAlgorithm::Sha256 => "SCRAM-SHA-256",
                ScramAlgorithm::Sha512 => "SCRAM-SHA-512",
            };
            config
                .set("security.protocol", "sasl_plaintext")
                .set("sasl.mechanism", sasl_mechanism)
                .set("sasl.username", username)
                .set("sasl.password", password);
        }
    }
}

/// A stream consumer bound to one topic.
pub struct KafkaReader {
    consumer: StreamConsumer,
    closed: Signal,
}

#[async_trait]
impl TopicReader for KafkaReader {
    async fn fetch(&self) -> Result<Message, FetchError> {
        if self.closed.is_fired() {
            return Err(FetchError::Closed);
        }
        tokio::select! {
            _ = self.closed.wait() => Err(FetchError::Closed),
            record = self.consumer.recv() => {
                let record = record?;
                debug!(
                    topic = record.topic(),
                    partition = record.partition(),
                    offset = record.offset(),
                    "Fetched record"
                );
                Ok(Message {
                    topic: record.topic().to_string(),
                    partition: record.partition(),
                    offset: record.offset(),
                    key: record.key().map(|k| k.to_vec()),
                    value: record.payload().map(|p| p.to_vec()).unwrap_or_default(),
                    timestamp: record.timestamp().to_millis(),
                })
            }
        }
    }

    async fn close(&self) {
        self.closed.fire();
        self.consumer.unsubscribe();
    }
}
