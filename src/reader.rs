//! Topic reader abstraction.
//!
//! A [`TopicReader`] supplies one topic's messages to its worker. The
//! production implementation lives in [`kafka`](crate::kafka); tests and
//! alternate transports plug in through [`ReaderFactory`].
//!
//! The contract the worker relies on: `fetch` blocks until a message is
//! available or the reader fails, and `close` unblocks a pending `fetch`
//! with [`FetchError::Closed`]. Closing the reader is the runtime's only
//! cancellation path.

use crate::config::ConfigError;
use crate::message::Message;
use async_trait::async_trait;
use thiserror::Error;

/// Errors terminating a topic's fetch loop.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Broker or network failure
    #[error("broker error: {0}")]
    Broker(#[from] rdkafka::error::KafkaError),

    /// The reader was closed while a fetch was pending
    #[error("reader closed")]
    Closed,
}

/// A reader bound to a single topic.
#[async_trait]
pub trait TopicReader: Send + Sync {
    /// Fetch the next message, suspending until one arrives.
    ///
    /// Returns an error when the broker connection fails or the reader has
    /// been closed; either way the caller must stop fetching.
    async fn fetch(&self) -> Result<Message, FetchError>;

    /// Close the reader, unblocking any pending `fetch` with
    /// [`FetchError::Closed`]. Idempotent.
    async fn close(&self);
}

/// Opens one [`TopicReader`] per topic at build time.
///
/// The default factory dials Kafka; supply your own to consume from a
/// different transport or to drive the runtime in tests.
pub trait ReaderFactory: Send + Sync {
    /// Open a reader for `topic`.
    fn open(&self, topic: &str) -> Result<Box<dyn TopicReader>, ConfigError>;
}
