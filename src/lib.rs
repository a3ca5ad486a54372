//! # Axon
//!
//! A concurrent, multi-topic Kafka consumption runtime: bind named topics
//! to handlers, compose cross-cutting interceptors around each handler,
//! run one independent consumption loop per topic, and coordinate a clean,
//! bounded shutdown across all loops.
//!
//! ## Architecture
//!
//! ```text
//! SubscriberBuilder -> Subscriber -> [worker per topic] -> interceptors -> handler
//!                                          |
//!                                   shutdown signal -> close reader -> loop exits
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use axon::{handler_fn, LoggingInterceptor, SecurityConfig, SubscriberBuilder};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     axon::logging::init("info", axon::LogFormat::Text)?;
//!
//!     let subscriber = SubscriberBuilder::new(
//!         vec!["localhost:9092".to_string()],
//!         "orders-service",
//!     )
//!     .security(SecurityConfig::sasl_scram("SHA-512", "user", "pass"))
//!     .layer(Arc::new(LoggingInterceptor::new()))
//!     .subscribe(
//!         "orders",
//!         Arc::new(handler_fn(|msg| async move {
//!             println!("order: {}", msg.value_utf8());
//!             Ok(())
//!         })),
//!     )
//!     .build()?;
//!
//!     let handle = subscriber.handle();
//!     tokio::spawn(async move {
//!         axon::signal::wait_for_termination().await;
//!         let _ = handle.shutdown(Duration::from_secs(5)).await;
//!     });
//!
//!     let report = subscriber.consume().await;
//!     for failed in report.failures() {
//!         eprintln!("topic {} stopped: {:?}", failed.topic, failed.outcome);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`message`]: the [`Message`] record type
//! - [`handler`] / [`interceptor`]: the handling contract and middleware
//! - [`subscriber`]: registration builder, runtime, and shutdown handle
//! - [`reader`] / [`kafka`]: the per-topic reader seam and its Kafka implementation
//! - [`security`]: broker authentication configuration and resolution
//! - [`config`] / [`logging`] / [`signal`]: service plumbing

pub mod config;
pub mod handler;
pub mod interceptor;
pub mod kafka;
pub mod logging;
pub mod message;
pub mod reader;
pub mod security;
pub mod signal;
pub mod subscriber;
mod worker;

// Re-export the primary surface at the crate root
pub use config::{AxonConfig, ConfigError, KafkaConfig};
pub use handler::{handler_fn, Handler, HandlerError};
pub use interceptor::{Interceptor, InterceptorChain, LoggingInterceptor, Next};
pub use logging::LogFormat;
pub use message::Message;
pub use reader::{FetchError, ReaderFactory, TopicReader};
pub use security::{SaslMechanism, ScramAlgorithm, SecurityConfig, SecurityProtocol};
pub use signal::Signal;
pub use subscriber::{
    ConsumeReport, ShutdownError, Subscriber, SubscriberBuilder, SubscriberHandle, TopicReport,
};
pub use worker::TopicOutcome;
