//! Queue Filter Framework
//!
//! A concurrent queue consumer that evaluates each message body against
//! substring rules and drops or republishes it, with batched acknowledgment.
//!
//! ## Features
//!
//! - **Pure matcher**: `any`/`all` substring rules, optionally case-folded
//! - **Batched acknowledgment**: tags flush at a threshold and once at drain
//! - **Worker pool**: fixed concurrency over one shared broker channel
//! - **Bounded message budget**: `max_messages` enforced atomically across workers
//! - **Graceful shutdown**: cooperative cancellation at fetch boundaries
//!
//! ## Example
//!
//! ```ignore
//! use queue_filter::{AmqpConfig, AmqpQueue, Coordinator, FilterConfig, MatchMode};
//!
//! let config = FilterConfig::new("events")
//!     .with_patterns(vec!["error".into()])
//!     .with_mode(MatchMode::Any)
//!     .with_workers(4);
//!
//! let coordinator = Coordinator::new(config.clone())?;
//! let broker = Arc::new(AmqpQueue::connect(&AmqpConfig::default(), &config.queue, 50).await?);
//! let report = coordinator.run(broker, shutdown_rx).await;
//! ```

mod acker;
mod broker;
mod config;
mod coordinator;
mod counters;
mod error;
mod matcher;
mod metrics;
mod worker;

// Re-export main types
pub use acker::BatchAcker;
pub use broker::{AmqpQueue, Fetch, InboundMessage, QueueBroker};
pub use config::{AmqpConfig, FilterConfig};
pub use coordinator::{Coordinator, RunReport, StopReason};
pub use counters::{RunCounters, RunSummary};
pub use error::FilterError;
pub use matcher::{MatchMode, Matcher};
pub use worker::{Disposition, Worker, WorkerExit};
