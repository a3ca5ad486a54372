//! Interceptor middleware and chain composition.
//!
//! An [`Interceptor`] wraps message handling for cross-cutting concerns:
//! it may run code before and after the rest of the chain, skip the rest of
//! the chain entirely, or transform the propagated error.
//!
//! # Composition
//!
//! [`InterceptorChain::new`] composes global interceptors `G[0..n)`, local
//! interceptors `L[0..m)` and a terminal handler `H` into the onion
//!
//! ```text
//! G0( G1( ... L0( L1( ... H ) ) ... ) )
//! ```
//!
//! Globals wrap outside locals; within a list, index 0 is outermost — the
//! first to run before the call and the last to run after it. Composition
//! happens once per registration, before the consumption loop starts, never
//! per message.
//!
//! # Short-circuiting
//!
//! The continuation is an explicit [`Next`] value. An interceptor that
//! returns without calling [`Next::run`] short-circuits everything inward,
//! including the handler.
//!
//! # Example
//!
//! ```rust,ignore
//! use axon::{Interceptor, Next, Message, HandlerError};
//! use async_trait::async_trait;
//!
//! struct Timing;
//!
//! #[async_trait]
//! impl Interceptor for Timing {
//!     async fn intercept(&self, msg: &Message, next: Next) -> Result<(), HandlerError> {
//!         let started = std::time::Instant::now();
//!         let result = next.run(msg).await;
//!         tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "handled");
//!         result
//!     }
//! }
//! ```

use crate::handler::{Handler, HandlerError};
use crate::message::Message;
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Middleware wrapped around message handling.
///
/// Interceptors must be `Send + Sync`; one instance may be shared across
/// topics and messages.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Intercept one message.
    ///
    /// Call `next.run(msg)` to continue inward; drop `next` to
    /// short-circuit. The returned error (transformed or not) propagates
    /// outward through the chain.
    async fn intercept(&self, msg: &Message, next: Next) -> Result<(), HandlerError>;
}

/// Interceptors and terminal handler in invocation order.
struct ChainInner {
    interceptors: Vec<Arc<dyn Interceptor>>,
    handler: Arc<dyn Handler>,
}

/// The continuation handed to an interceptor: the remainder of the chain.
pub struct Next {
    chain: Arc<ChainInner>,
    index: usize,
}

impl Next {
    /// Run the rest of the chain for `msg`.
    pub fn run<'m>(self, msg: &'m Message) -> BoxFuture<'m, Result<(), HandlerError>> {
        Box::pin(async move {
            let Next { chain, index } = self;
            match chain.interceptors.get(index).cloned() {
                Some(interceptor) => {
                    interceptor
                        .intercept(msg, Next { chain, index: index + 1 })
                        .await
                }
                None => chain.handler.handle(msg).await,
            }
        })
    }
}

/// An ordered list of interceptors composed around a terminal handler.
///
/// Built once per topic registration; dispatching a message walks the list
/// without recomposing anything.
#[derive(Clone)]
pub struct InterceptorChain {
    inner: Arc<ChainInner>,
}

impl InterceptorChain {
    /// Compose `globals` (outermost) and `locals` around `handler`.
    pub fn new(
        globals: &[Arc<dyn Interceptor>],
        locals: &[Arc<dyn Interceptor>],
        handler: Arc<dyn Handler>,
    ) -> Self {
        let mut interceptors = Vec::with_capacity(globals.len() + locals.len());
        interceptors.extend(globals.iter().cloned());
        interceptors.extend(locals.iter().cloned());
        Self {
            inner: Arc::new(ChainInner {
                interceptors,
                handler,
            }),
        }
    }

    /// Run the full chain for one message.
    pub async fn dispatch(&self, msg: &Message) -> Result<(), HandlerError> {
        Next {
            chain: self.inner.clone(),
            index: 0,
        }
        .run(msg)
        .await
    }

    /// Number of interceptors in the chain (globals + locals).
    pub fn len(&self) -> usize {
        self.inner.interceptors.len()
    }

    /// True if the chain has no interceptors (handler only).
    pub fn is_empty(&self) -> bool {
        self.inner.interceptors.is_empty()
    }
}

/// Built-in interceptor that logs message receipt and handling latency.
#[derive(Debug, Clone, Default)]
pub struct LoggingInterceptor;

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, msg: &Message, next: Next) -> Result<(), HandlerError> {
        debug!(
            topic = %msg.topic,
            partition = msg.partition,
            offset = msg.offset,
            "Handling message"
        );

        let started = Instant::now();
        let result = next.run(msg).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(()) => info!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                elapsed_ms = elapsed_ms,
                "Message handled"
            ),
            Err(e) => error!(
                topic = %msg.topic,
                partition = msg.partition,
                offset = msg.offset,
                elapsed_ms = elapsed_ms,
                error = %e,
                "Message handling failed"
            ),
        }

        result
    }
}
