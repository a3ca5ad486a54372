//! Core message type for axon.
//!
//! A [`Message`] is one record fetched from a topic: the payload bytes plus
//! the broker-assigned coordinates (partition, offset) that identify it.
//! The runtime treats the payload as opaque; handlers decide how to decode it.

/// A single record consumed from a topic.
///
/// # Fields
///
/// - `topic`: the topic this record was fetched from
/// - `partition` / `offset`: broker-assigned coordinates, opaque to the runtime
/// - `key`: optional partitioning key
/// - `value`: raw payload bytes
/// - `timestamp`: broker timestamp in milliseconds since the epoch, if present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Topic this record was fetched from
    pub topic: String,

    /// Partition within the topic
    pub partition: i32,

    /// Offset within the partition
    pub offset: i64,

    /// Optional record key
    pub key: Option<Vec<u8>>,

    /// Raw record payload
    pub value: Vec<u8>,

    /// Broker timestamp (milliseconds since epoch), if the broker supplied one
    pub timestamp: Option<i64>,
}

impl Message {
    /// Create a new message with the given topic and payload.
    ///
    /// Partition and offset default to zero; use the `with_*` builders to
    /// set them when constructing messages by hand (adapters and tests).
    pub fn new(topic: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            partition: 0,
            offset: 0,
            key: None,
            value: value.into(),
            timestamp: None,
        }
    }

    /// Set the record key.
    pub fn with_key(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set the partition.
    pub fn with_partition(mut self, partition: i32) -> Self {
        self.partition = partition;
        self
    }

    /// Set the offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    /// Set the broker timestamp (milliseconds since epoch).
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// View the payload as UTF-8, replacing invalid sequences.
    pub fn value_utf8(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.value)
    }

    /// View the key as UTF-8, replacing invalid sequences.
    pub fn key_utf8(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.key.as_deref().map(String::from_utf8_lossy)
    }
}
