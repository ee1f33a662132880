//! Event ingestion for the worker pool.
//!
//! Events enter through a bounded queue so a slow rule set pushes back on
//! producers instead of buffering without limit:
//!
//! ```rust,ignore
//! use event_engine::streaming::queue;
//!
//! let (producer, consumer) = queue::bounded(config.queue_capacity);
//! let summary = engine.run(consumer, &sink)?;
//! ```

pub mod queue;

pub use queue::{bounded, PopError, PushError, QueueConsumer, QueueProducer};
