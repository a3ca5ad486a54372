//! Per-topic consumption worker.
//!
//! A [`ConsumerWorker`] owns one reader and one composed chain. Its loop is
//! deliberately simple: fetch the next message, run the chain, repeat. Any
//! fetch or handler error terminates the loop for this topic only — there is
//! no retry, no backoff, and no cross-topic cancellation.
//!
//! A companion observer task waits on the shared shutdown signal and closes
//! the reader when it fires. That unblocks the pending fetch with an error
//! and lets the loop exit at the next fetch boundary; an in-flight handler
//! is never interrupted.

use crate::handler::HandlerError;
use crate::interceptor::InterceptorChain;
use crate::reader::{FetchError, TopicReader};
use crate::signal::Signal;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Why a topic's consumption loop ended.
#[derive(Debug)]
pub enum TopicOutcome {
    /// The worker observed the shutdown signal and exited cleanly
    Shutdown,

    /// The fetch failed (broker/network error or reader closed) before
    /// shutdown was requested
    Fetch(FetchError),

    /// A handler or interceptor returned an error
    Handler(HandlerError),
}

impl TopicOutcome {
    /// True if this topic stopped because of the shutdown signal rather
    /// than a failure.
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Self::Shutdown)
    }
}

pub(crate) struct ConsumerWorker {
    topic: String,
    reader: Arc<dyn TopicReader>,
    chain: InterceptorChain,
    shutdown: Signal,
}

impl ConsumerWorker {
    pub(crate) fn new(
        topic: String,
        reader: Arc<dyn TopicReader>,
        chain: InterceptorChain,
        shutdown: Signal,
    ) -> Self {
        Self {
            topic,
            reader,
            chain,
            shutdown,
        }
    }

    pub(crate) fn topic(&self) -> &str {
        &self.topic
    }

    /// Run the fetch/handle loop until it terminates.
    ///
    /// Exactly one message is in flight at any time: the next fetch does
    /// not start until the chain for the previous message has returned.
    pub(crate) async fn run(self) -> TopicOutcome {
        info!(topic = %self.topic, "Consumer worker started");

        let observer = {
            let shutdown = self.shutdown.clone();
            let reader = self.reader.clone();
            let topic = self.topic.clone();
            tokio::spawn(async move {
                shutdown.wait().await;
                debug!(topic = %topic, "Shutdown observed, closing reader");
                reader.close().await;
            })
        };

        let outcome = loop {
            let msg = match self.reader.fetch().await {
                Ok(msg) => msg,
                Err(e) => {
                    if self.shutdown.is_fired() {
                        info!(topic = %self.topic, "Consumer worker stopping on shutdown");
                        break TopicOutcome::Shutdown;
                    }
                    error!(topic = %self.topic, error = %e, "Fetch failed, stopping topic");
                    break TopicOutcome::Fetch(e);
                }
            };

            debug!(
                topic = %self.topic,
                partition = msg.partition,
                offset = msg.offset,
                "Dispatching message"
            );

            if let Err(e) = self.chain.dispatch(&msg).await {
                error!(
                    topic = %self.topic,
                    partition = msg.partition,
                    offset = msg.offset,
                    error = %e,
                    "Handler failed, stopping topic"
                );
                break TopicOutcome::Handler(e);
            }
        };

        self.reader.close().await;
        observer.abort();

        outcome
    }
}
