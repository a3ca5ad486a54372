//! Handler contract for consumed messages.
//!
//! A [`Handler`] processes one message at a time. The worker calls it
//! synchronously: the next fetch on a topic does not happen until the
//! handler for the previous message has returned. A non-`Ok` return stops
//! consumption on that topic; there is no retry or backoff.
//!
//! ## Creating handlers
//!
//! Implement the trait for stateful handlers, or wrap an async closure with
//! [`handler_fn`]:
//!
//! ```rust,ignore
//! use axon::{handler_fn, Message, HandlerError};
//!
//! let handler = handler_fn(|msg: Message| async move {
//!     println!("got {} bytes from {}", msg.value.len(), msg.topic);
//!     Ok(())
//! });
//! ```

use crate::message::Message;
use async_trait::async_trait;
use std::future::Future;
use thiserror::Error;

/// Errors returned by handlers and interceptors.
///
/// The runtime treats any error only as "stop this topic"; it performs no
/// status translation. Domain errors travel through [`HandlerError::Domain`]
/// opaquely.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Generic handler failure
    #[error("handler failed: {0}")]
    Failed(String),

    /// Payload decoding failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain error from a collaborating layer, carried opaquely
    #[error("{0}")]
    Domain(Box<dyn std::error::Error + Send + Sync>),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HandlerError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Domain(err)
    }
}

impl HandlerError {
    /// Create a generic failure with a message.
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// The core handler trait.
///
/// Handlers must be `Send + Sync`; one instance may be shared across the
/// lifetime of a topic's consumption loop.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process one message.
    ///
    /// Returning an error terminates consumption on the message's topic.
    async fn handle(&self, msg: &Message) -> Result<(), HandlerError>;
}

/// Adapter that turns an async closure into a [`Handler`].
///
/// The closure receives an owned clone of the message.
pub struct HandlerFn<F>(F);

/// Wrap an async closure as a [`Handler`]. See the module docs for an example.
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    HandlerFn(f)
}

#[async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send,
{
    async fn handle(&self, msg: &Message) -> Result<(), HandlerError> {
        (self.0)(msg.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_handler_fn_invokes_closure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = handler_fn(move |msg: Message| {
            let counter = counter.clone();
            async move {
                assert_eq!(msg.topic, "orders");
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        let msg = Message::new("orders", "payload");
        handler.handle(&msg).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_handler_fn_propagates_error() {
        let handler =
            handler_fn(|_msg: Message| async move { Err(HandlerError::failed("boom")) });

        let msg = Message::new("orders", "payload");
        let err = handler.handle(&msg).await.unwrap_err();
        assert!(matches!(err, HandlerError::Failed(ref m) if m == "boom"));
    }

    #[test]
    fn test_domain_error_passthrough() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "db down");
        let err: HandlerError = Box::<dyn std::error::Error + Send + Sync>::from(io_err).into();
        assert!(err.to_string().contains("db down"));
    }
}
