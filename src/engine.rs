//! Evaluation entry points.
//!
//! [`Evaluator`] runs one compiled rule set over events, singly or in
//! parallel batches. [`Engine`] owns the active rule set, swaps it on
//! [`reload`](Engine::reload), and drives a pool of worker threads that drain
//! the ingestion queue.
//!
//! # Usage Patterns
//!
//! ## Single Event Processing
//! ```rust,ignore
//! let evaluation = engine.evaluate(event);
//! if evaluation.accepted {
//!     forward(evaluation.event);
//! }
//! ```
//!
//! ## Queue-driven Processing
//! ```rust,ignore
//! let (producer, consumer) = queue::bounded(config.queue_capacity);
//! let (sink, results) = crossbeam::channel::unbounded();
//! std::thread::spawn(move || feed(producer));
//! let summary = engine.run(consumer, &sink)?;
//! ```

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::expr::CompiledExpression;
use crate::field::Event;
use crate::helper::OperationResult;
use crate::streaming::QueueConsumer;
use crossbeam::channel::Sender;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, trace};

/// Result of evaluating one event.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// The event after every operation that ran
    pub event: Event,

    /// Whether the rule set accepted the event
    pub accepted: bool,

    /// Why the rule set rejected the event, if it did
    pub trace: Option<String>,
}

impl From<OperationResult> for Evaluation {
    fn from(result: OperationResult) -> Self {
        match result {
            OperationResult::Success(event) => Self {
                event,
                accepted: true,
                trace: None,
            },
            OperationResult::Failure { event, trace } => Self {
                event,
                accepted: false,
                trace: Some(trace),
            },
        }
    }
}

/// Runs a compiled rule set over events.
///
/// Cloning is cheap; clones share the compiled graph.
#[derive(Debug, Clone)]
pub struct Evaluator {
    expression: Arc<CompiledExpression>,
}

impl Evaluator {
    pub fn new(expression: impl Into<Arc<CompiledExpression>>) -> Self {
        Self {
            expression: expression.into(),
        }
    }

    pub fn expression(&self) -> &CompiledExpression {
        &self.expression
    }

    pub fn evaluate(&self, event: Event) -> Evaluation {
        let evaluation = Evaluation::from(self.expression.evaluate(event));
        if let Some(reason) = &evaluation.trace {
            trace!(reason = reason.as_str(), "event rejected");
        }
        evaluation
    }

    /// Evaluate independent events in parallel. Output order matches input.
    pub fn evaluate_batch(&self, events: Vec<Event>) -> Vec<Evaluation> {
        events
            .into_par_iter()
            .map(|event| self.evaluate(event))
            .collect()
    }
}

/// Destination of evaluated events.
pub trait EventSink: Send + Sync {
    fn emit(&self, evaluation: Evaluation);
}

impl EventSink for Sender<Evaluation> {
    fn emit(&self, evaluation: Evaluation) {
        if self.send(evaluation).is_err() {
            debug!("evaluation sink disconnected, dropping result");
        }
    }
}

impl EventSink for Mutex<Vec<Evaluation>> {
    fn emit(&self, evaluation: Evaluation) {
        self.lock().push(evaluation);
    }
}

/// Counters returned by [`Engine::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub accepted: usize,
}

impl RunSummary {
    pub fn rejected(&self) -> usize {
        self.processed - self.accepted
    }
}

/// Owner of the active rule set and the worker pool.
///
/// Each event is evaluated against the rule set that was active when a
/// worker picked it up; a reload never affects an evaluation in progress.
pub struct Engine {
    config: EngineConfig,
    active: RwLock<Arc<CompiledExpression>>,
    generation: AtomicU64,
}

impl Engine {
    pub fn new(expression: CompiledExpression, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            active: RwLock::new(Arc::new(expression)),
            generation: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluator bound to the rule set active right now.
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::new(Arc::clone(&self.active.read()))
    }

    pub fn evaluate(&self, event: Event) -> Evaluation {
        self.evaluator().evaluate(event)
    }

    pub fn evaluate_batch(&self, events: Vec<Event>) -> Vec<Evaluation> {
        self.evaluator().evaluate_batch(events)
    }

    /// Replace the active rule set. Returns the new generation number.
    pub fn reload(&self, expression: CompiledExpression) -> u64 {
        let stats = expression.statistics();
        *self.active.write() = Arc::new(expression);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        info!(
            generation,
            nodes = stats.total_nodes,
            terms = stats.term_nodes,
            "rule set reloaded"
        );
        generation
    }

    /// Number of reloads since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drain `consumer` with `config.workers` threads, sending every
    /// evaluation to `sink`. Returns once the queue is empty and all
    /// producers are gone.
    pub fn run(&self, consumer: QueueConsumer<Event>, sink: &dyn EventSink) -> Result<RunSummary> {
        let workers = self.config.workers;
        info!(workers, "starting evaluation workers");

        let summary = thread::scope(|scope| -> Result<RunSummary> {
            let mut handles = Vec::with_capacity(workers);
            for index in 0..workers {
                let consumer = consumer.clone();
                let handle = thread::Builder::new()
                    .name(format!("event-worker-{index}"))
                    .spawn_scoped(scope, move || self.work(index, consumer, sink))?;
                handles.push(handle);
            }
            drop(consumer);

            let mut summary = RunSummary::default();
            for handle in handles {
                let worker = handle
                    .join()
                    .map_err(|_| EngineError::Queue("evaluation worker panicked".to_string()))?;
                summary.processed += worker.processed;
                summary.accepted += worker.accepted;
            }
            Ok(summary)
        })?;

        info!(
            processed = summary.processed,
            accepted = summary.accepted,
            "evaluation workers finished"
        );
        Ok(summary)
    }

    fn work(&self, index: usize, consumer: QueueConsumer<Event>, sink: &dyn EventSink) -> RunSummary {
        debug!(worker = index, "worker started");
        let mut summary = RunSummary::default();
        while let Some(event) = consumer.pop() {
            let evaluation = self.evaluate(event);
            summary.processed += 1;
            if evaluation.accepted {
                summary.accepted += 1;
            }
            sink.emit(evaluation);
        }
        debug!(worker = index, processed = summary.processed, "worker stopped");
        summary
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("generation", &self.generation())
            .finish()
    }
}
