//! Subscriber runtime: registration, consumption, shutdown.
//!
//! The API is two-phase. A [`SubscriberBuilder`] accumulates topic
//! registrations and global interceptors, then [`build`](SubscriberBuilder::build)
//! validates the configuration, resolves the authentication mechanism,
//! opens one reader per topic and composes each registration's interceptor
//! chain — producing an immutable [`Subscriber`]. Registering after
//! consumption starts is not expressible: the builder is consumed.
//!
//! # Lifecycle
//!
//! ```text
//! SubscriberBuilder::new(brokers, group_id)
//!     .layer(...)                      // global interceptors, outermost first
//!     .subscribe("topic-a", handler)
//!     .subscribe_with_interceptors("topic-b", locals, handler)
//!     .build()?                        // validate + freeze
//!
//! let handle = subscriber.handle();
//! let report = subscriber.consume().await;   // blocks until every topic stops
//! handle.shutdown(Duration::from_secs(5)).await?;
//! ```
//!
//! `consume()` takes `self`: it is callable exactly once and there is no
//! restart. It returns a [`ConsumeReport`] describing why each topic
//! stopped; a failing topic never cancels its siblings and never aborts
//! the join.

use crate::config::{validate_brokers, validate_group_id, ConfigError, KafkaConfig};
use crate::handler::{Handler, HandlerError};
use crate::interceptor::{Interceptor, InterceptorChain};
use crate::kafka::KafkaReaderFactory;
use crate::reader::ReaderFactory;
use crate::security::SecurityConfig;
use crate::signal::Signal;
use crate::worker::{ConsumerWorker, TopicOutcome};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Errors from the bounded shutdown wait.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Not every worker exited within the caller's grace period
    #[error("shutdown wait exceeded {0:?}")]
    Timeout(Duration),
}

/// One topic registration accumulated by the builder.
struct Registration {
    topic: String,
    handler: Arc<dyn Handler>,
    locals: Vec<Arc<dyn Interceptor>>,
}

/// Accumulates registrations and produces an immutable [`Subscriber`].
pub struct SubscriberBuilder {
    brokers: Vec<String>,
    group_id: String,
    security: SecurityConfig,
    globals: Vec<Arc<dyn Interceptor>>,
    registrations: Vec<Registration>,
    factory: Option<Box<dyn ReaderFactory>>,
}

impl SubscriberBuilder {
    /// Start a builder for the given cluster coordinates.
    pub fn new(brokers: Vec<String>, group_id: impl Into<String>) -> Self {
        Self {
            brokers,
            group_id: group_id.into(),
            security: SecurityConfig::default(),
            globals: Vec::new(),
            registrations: Vec::new(),
            factory: None,
        }
    }

    /// Start a builder from a loaded [`KafkaConfig`] section.
    pub fn from_config(config: &KafkaConfig) -> Self {
        Self::new(config.brokers.clone(), config.group_id.clone()).security(config.security.clone())
    }

    /// Set the broker authentication configuration.
    ///
    /// Credentials come exclusively from here; there is no other path.
    pub fn security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    /// Append a global interceptor. Globals wrap outside every topic's
    /// local interceptors; the first appended runs outermost.
    pub fn layer(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.globals.push(interceptor);
        self
    }

    /// Register a plain consumer for `topic`.
    pub fn subscribe(self, topic: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.subscribe_with_interceptors(topic, Vec::new(), handler)
    }

    /// Register a consumer for `topic` with local interceptors, ordered
    /// outermost first.
    pub fn subscribe_with_interceptors(
        mut self,
        topic: impl Into<String>,
        interceptors: Vec<Arc<dyn Interceptor>>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        let topic = topic.into();
        debug!(topic = %topic, local_interceptors = interceptors.len(), "Registering subscription");
        self.registrations.push(Registration {
            topic,
            handler,
            locals: interceptors,
        });
        self
    }

    /// Replace the reader factory.
    ///
    /// The default dials Kafka; supply an alternative to consume from a
    /// different transport or to drive the runtime in tests.
    pub fn reader_factory(mut self, factory: Box<dyn ReaderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Validate the configuration and freeze it into a [`Subscriber`].
    ///
    /// Fails with [`ConfigError`] on invalid brokers, group id, security
    /// configuration, or topic registrations. No network I/O happens here
    /// beyond lazily-connecting client construction.
    pub fn build(self) -> Result<Subscriber, ConfigError> {
        validate_brokers(&self.brokers)?;
        validate_group_id(&self.group_id)?;
        let mechanism = self.security.mechanism()?;

        let mut seen = HashSet::new();
        for registration in &self.registrations {
            if registration.topic.is_empty() {
                return Err(ConfigError::Validation(
                    "topic must not be empty".to_string(),
                ));
            }
            if !seen.insert(registration.topic.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate subscription for topic '{}'",
                    registration.topic
                )));
            }
        }

        let factory = self.factory.unwrap_or_else(|| {
            Box::new(KafkaReaderFactory::new(
                self.brokers.clone(),
                self.group_id.clone(),
                mechanism,
            ))
        });

        let shutdown = Signal::new();
        let mut workers = Vec::with_capacity(self.registrations.len());
        for registration in self.registrations {
            let reader = factory.open(&registration.topic)?;
            let chain = InterceptorChain::new(
                &self.globals,
                &registration.locals,
                registration.handler,
            );
            workers.push(ConsumerWorker::new(
                registration.topic,
                Arc::from(reader),
                chain,
                shutdown.clone(),
            ));
        }

        info!(
            group_id = %self.group_id,
            topics = workers.len(),
            global_interceptors = self.globals.len(),
            "Subscriber built"
        );

        Ok(Subscriber {
            workers,
            shutdown,
            done: Signal::new(),
        })
    }
}

/// Why one topic's consumption stopped.
#[derive(Debug)]
pub struct TopicReport {
    /// The registered topic
    pub topic: String,

    /// Why its worker exited
    pub outcome: TopicOutcome,
}

/// Per-topic results returned by [`Subscriber::consume`].
#[derive(Debug)]
pub struct ConsumeReport {
    topics: Vec<TopicReport>,
}

impl ConsumeReport {
    /// All per-topic reports, in registration order.
    pub fn topics(&self) -> &[TopicReport] {
        &self.topics
    }

    /// The outcome for a specific topic, if it was registered.
    pub fn outcome(&self, topic: &str) -> Option<&TopicOutcome> {
        self.topics
            .iter()
            .find(|report| report.topic == topic)
            .map(|report| &report.outcome)
    }

    /// True if every topic stopped because of the shutdown signal.
    pub fn is_clean(&self) -> bool {
        self.topics.iter().all(|report| report.outcome.is_shutdown())
    }

    /// Topics that stopped because of a fetch or handler failure.
    pub fn failures(&self) -> impl Iterator<Item = &TopicReport> {
        self.topics
            .iter()
            .filter(|report| !report.outcome.is_shutdown())
    }
}

/// An immutable, ready-to-run consumption runtime.
pub struct Subscriber {
    workers: Vec<ConsumerWorker>,
    shutdown: Signal,
    done: Signal,
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("workers", &self.workers.len())
            .finish_non_exhaustive()
    }
}

impl Subscriber {
    /// A cloneable handle for requesting shutdown from another task.
    pub fn handle(&self) -> SubscriberHandle {
        SubscriberHandle {
            shutdown: self.shutdown.clone(),
            done: self.done.clone(),
        }
    }

    /// Start one worker per registration and block until every worker has
    /// exited, then fire the done signal.
    ///
    /// Per-topic failures do not abort the join; they are reported in the
    /// returned [`ConsumeReport`].
    pub async fn consume(self) -> ConsumeReport {
        info!(topics = self.workers.len(), "Starting consumption");

        let handles: Vec<(String, JoinHandle<TopicOutcome>)> = self
            .workers
            .into_iter()
            .map(|worker| {
                let topic = worker.topic().to_string();
                (topic, tokio::spawn(worker.run()))
            })
            .collect();

        let mut topics = Vec::with_capacity(handles.len());
        for (topic, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(topic = %topic, error = %e, "Worker task failed");
                    TopicOutcome::Handler(HandlerError::failed(format!(
                        "worker task failed: {e}"
                    )))
                }
            };

            match &outcome {
                TopicOutcome::Shutdown => debug!(topic = %topic, "Topic stopped on shutdown"),
                TopicOutcome::Fetch(e) => warn!(topic = %topic, error = %e, "Topic stopped on fetch failure"),
                TopicOutcome::Handler(e) => warn!(topic = %topic, error = %e, "Topic stopped on handler failure"),
            }

            topics.push(TopicReport { topic, outcome });
        }

        self.done.fire();
        info!("All consumer workers stopped");

        ConsumeReport { topics }
    }
}

/// Requests shutdown and waits, bounded, for completion.
#[derive(Clone)]
pub struct SubscriberHandle {
    shutdown: Signal,
    done: Signal,
}

impl SubscriberHandle {
    /// Fire the shutdown signal and wait up to `grace` for every worker to
    /// exit.
    ///
    /// Idempotent: repeated calls observe the same completion. Cancellation
    /// is cooperative — it takes effect at each worker's next fetch
    /// boundary, so `grace` must exceed the longest plausible in-flight
    /// handler duration or this returns [`ShutdownError::Timeout`].
    pub async fn shutdown(&self, grace: Duration) -> Result<(), ShutdownError> {
        if self.shutdown.fire() {
            info!("Shutdown requested");
        }

        match tokio::time::timeout(grace, self.done.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!(grace_ms = grace.as_millis() as u64, "Shutdown wait timed out");
                Err(ShutdownError::Timeout(grace))
            }
        }
    }

    /// Non-blocking check whether every worker has exited.
    pub fn is_done(&self) -> bool {
        self.done.is_fired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::interceptor::Next;
    use crate::message::Message;
    use crate::reader::mock::QueueReaderFactory;
    use async_trait::async_trait;
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct Recording {
        name: &'static str,
        log: CallLog,
    }

    #[async_trait]
    impl Interceptor for Recording {
        async fn intercept(&self, msg: &Message, next: Next) -> Result<(), HandlerError> {
            self.log.lock().unwrap().push(format!("{}:pre", self.name));
            let result = next.run(msg).await;
            self.log.lock().unwrap().push(format!("{}:post", self.name));
            result
        }
    }

    fn noop_handler() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|_msg: Message| async move { Ok(()) }))
    }

    fn builder() -> SubscriberBuilder {
        SubscriberBuilder::new(vec!["localhost:9092".to_string()], "test-group")
    }

    #[test]
    fn test_build_rejects_empty_brokers() {
        let result = SubscriberBuilder::new(Vec::new(), "group")
            .subscribe("orders", noop_handler())
            .build();
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_build_rejects_empty_group() {
        let result = SubscriberBuilder::new(vec!["localhost:9092".to_string()], "")
            .subscribe("orders", noop_handler())
            .build();
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[test]
    fn test_build_rejects_missing_sasl_section() {
        // Construction must fail before any reader is opened.
        let factory = QueueReaderFactory::new();
        let result = builder()
            .security(SecurityConfig {
                protocol: crate::security::SecurityProtocol::SaslPlaintext,
                sasl_plaintext: None,
                sasl_scram: None,
            })
            .reader_factory(Box::new(factory))
            .subscribe("orders", noop_handler())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::MissingSaslSection("sasl_plaintext")
        ));
    }

    #[test]
    fn test_build_rejects_unsupported_scram_algorithm() {
        let factory = QueueReaderFactory::new();
        let result = builder()
            .security(SecurityConfig::sasl_scram("SHA-1", "user", "pass"))
            .reader_factory(Box::new(factory))
            .subscribe("orders", noop_handler())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::UnsupportedAlgorithm(_)
        ));
    }

    #[test]
    fn test_build_rejects_duplicate_topics() {
        let factory = QueueReaderFactory::new();
        factory.add_topic("orders");
        let result = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", noop_handler())
            .subscribe("orders", noop_handler())
            .build();
        assert!(matches!(result.unwrap_err(), ConfigError::Validation(_)));
    }

    #[tokio::test]
    async fn test_messages_observed_in_order() {
        let factory = QueueReaderFactory::new();
        let sender = factory.add_topic("orders");

        let seen: Arc<Mutex<Vec<u64>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(move |msg: Message| {
            let sink = sink.clone();
            async move {
                let n: u64 = msg.value_utf8().parse().unwrap();
                sink.lock().unwrap().push(n);
                Ok(())
            }
        }));

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", handler)
            .build()
            .unwrap();

        for n in 1..=3u64 {
            sender
                .send(Message::new("orders", n.to_string()).with_offset(n as i64))
                .unwrap();
        }
        drop(sender);

        let report = subscriber.consume().await;
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(report.topics().len(), 1);
        assert!(!report.is_clean());
    }

    #[tokio::test]
    async fn test_global_interceptors_wrap_outside_locals() {
        let factory = QueueReaderFactory::new();
        let sender = factory.add_topic("orders");

        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let sink = log.clone();
        let handler: Arc<dyn Handler> = Arc::new(handler_fn(move |_msg: Message| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push("handler".to_string());
                Ok(())
            }
        }));

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .layer(Arc::new(Recording { name: "G0", log: log.clone() }))
            .layer(Arc::new(Recording { name: "G1", log: log.clone() }))
            .subscribe_with_interceptors(
                "orders",
                vec![
                    Arc::new(Recording { name: "L0", log: log.clone() }),
                    Arc::new(Recording { name: "L1", log: log.clone() }),
                ],
                handler,
            )
            .build()
            .unwrap();

        sender.send(Message::new("orders", "m")).unwrap();
        drop(sender);
        subscriber.consume().await;

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "G0:pre", "G1:pre", "L0:pre", "L1:pre", "handler", "L1:post", "L0:post",
                "G1:post", "G0:post",
            ]
        );
    }

    #[tokio::test]
    async fn test_shutdown_stops_both_topics() {
        let factory = QueueReaderFactory::new();
        let _sender_a = factory.add_topic("orders");
        let _sender_b = factory.add_topic("payments");

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", noop_handler())
            .subscribe("payments", noop_handler())
            .build()
            .unwrap();

        let handle = subscriber.handle();
        let consuming = tokio::spawn(subscriber.consume());

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(handle.is_done());

        let report = consuming.await.unwrap();
        assert!(report.is_clean());
        assert!(report.outcome("orders").unwrap().is_shutdown());
        assert!(report.outcome("payments").unwrap().is_shutdown());
    }

    #[tokio::test]
    async fn test_shutdown_times_out_on_slow_handler() {
        let factory = QueueReaderFactory::new();
        let sender = factory.add_topic("orders");

        let handler: Arc<dyn Handler> = Arc::new(handler_fn(|_msg: Message| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        }));

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", handler)
            .build()
            .unwrap();

        let handle = subscriber.handle();
        let consuming = tokio::spawn(subscriber.consume());

        sender.send(Message::new("orders", "slow")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The in-flight handler outlives the grace period.
        let err = handle.shutdown(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ShutdownError::Timeout(_)));

        // The worker still drains cleanly once the handler returns.
        let report = consuming.await.unwrap();
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_double_shutdown_is_safe() {
        let factory = QueueReaderFactory::new();
        let _sender = factory.add_topic("orders");

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", noop_handler())
            .build()
            .unwrap();

        let handle = subscriber.handle();
        let consuming = tokio::spawn(subscriber.consume());

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.shutdown(Duration::from_secs(5)).await.unwrap();

        // Second call observes the already-fired done signal promptly.
        let second = tokio::time::timeout(
            Duration::from_millis(100),
            handle.shutdown(Duration::from_secs(5)),
        )
        .await
        .expect("second shutdown did not return promptly");
        second.unwrap();

        consuming.await.unwrap();
    }

    #[tokio::test]
    async fn test_one_failing_topic_does_not_cancel_siblings() {
        let factory = QueueReaderFactory::new();
        let sender_a = factory.add_topic("orders");
        let sender_b = factory.add_topic("payments");

        let failing: Arc<dyn Handler> = Arc::new(handler_fn(|_msg: Message| async move {
            Err(HandlerError::failed("boom"))
        }));

        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let healthy: Arc<dyn Handler> = Arc::new(handler_fn(move |msg: Message| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(msg.value_utf8().to_string());
                Ok(())
            }
        }));

        let subscriber = builder()
            .reader_factory(Box::new(factory))
            .subscribe("orders", failing)
            .subscribe("payments", healthy)
            .build()
            .unwrap();

        let handle = subscriber.handle();
        let consuming = tokio::spawn(subscriber.consume());

        // Kill the orders topic, then keep feeding payments.
        sender_a.send(Message::new("orders", "poison")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        sender_b.send(Message::new("payments", "p1")).unwrap();
        sender_b.send(Message::new("payments", "p2")).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        handle.shutdown(Duration::from_secs(5)).await.unwrap();
        let report = consuming.await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["p1", "p2"]);
        assert!(matches!(
            report.outcome("orders").unwrap(),
            TopicOutcome::Handler(_)
        ));
        assert!(report.outcome("payments").unwrap().is_shutdown());
        assert_eq!(report.failures().count(), 1);
    }

    #[tokio::test]
    async fn test_empty_subscriber_completes_immediately() {
        let subscriber = builder()
            .reader_factory(Box::new(QueueReaderFactory::new()))
            .build()
            .unwrap();

        let handle = subscriber.handle();
        let report = subscriber.consume().await;
        assert!(report.topics().is_empty());
        assert!(handle.is_done());
    }
}
