//! Bounded ingestion queue between event producers and evaluation workers.
//!
//! The queue is a multi-producer, multi-consumer channel with a fixed
//! capacity. Producers either block until there is room ([`QueueProducer::push`])
//! or get the event handed back ([`QueueProducer::try_push`]); nothing is
//! dropped silently. Once every producer handle is gone and the queue has
//! drained, consumers observe the end of the stream.

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use std::time::Duration;

/// Create a bounded queue holding at most `capacity` items.
///
/// # Example
/// ```rust
/// use event_engine::streaming::queue::{bounded, PushError};
///
/// let (producer, consumer) = bounded(1);
/// producer.push("first").unwrap();
/// assert_eq!(producer.try_push("second"), Err(PushError::Full("second")));
/// assert_eq!(consumer.pop(), Some("first"));
///
/// drop(producer);
/// assert_eq!(consumer.pop(), None);
/// ```
pub fn bounded<T>(capacity: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (sender, receiver) = channel::bounded(capacity);
    (
        QueueProducer { sender, capacity },
        QueueConsumer { receiver, capacity },
    )
}

/// Why an item was not enqueued. The item is returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError<T> {
    /// The queue is at capacity.
    Full(T),
    /// Every consumer is gone.
    Closed(T),
}

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        match self {
            PushError::Full(item) | PushError::Closed(item) => item,
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, PushError::Full(_))
    }
}

/// Why [`QueueConsumer::pop_timeout`] returned without an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    /// Nothing arrived within the timeout.
    Timeout,
    /// The queue is empty and every producer is gone.
    Closed,
}

/// Sending half of the queue. Cloning adds a producer.
#[derive(Debug)]
pub struct QueueProducer<T> {
    sender: Sender<T>,
    capacity: usize,
}

impl<T> Clone for QueueProducer<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueProducer<T> {
    /// Enqueue, blocking while the queue is full.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        self.sender
            .send(item)
            .map_err(|err| PushError::Closed(err.into_inner()))
    }

    /// Enqueue without blocking.
    pub fn try_push(&self, item: T) -> Result<(), PushError<T>> {
        self.sender.try_send(item).map_err(|err| match err {
            TrySendError::Full(item) => PushError::Full(item),
            TrySendError::Disconnected(item) => PushError::Closed(item),
        })
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Receiving half of the queue. Cloning adds a consumer; each item is
/// delivered to exactly one of them.
#[derive(Debug)]
pub struct QueueConsumer<T> {
    receiver: Receiver<T>,
    capacity: usize,
}

impl<T> Clone for QueueConsumer<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> QueueConsumer<T> {
    /// Dequeue, blocking until an item arrives. `None` once the queue is
    /// empty and every producer is gone.
    pub fn pop(&self) -> Option<T> {
        self.receiver.recv().ok()
    }

    /// Dequeue without blocking.
    pub fn try_pop(&self) -> Result<T, PopError> {
        self.receiver.try_recv().map_err(|err| match err {
            TryRecvError::Empty => PopError::Timeout,
            TryRecvError::Disconnected => PopError::Closed,
        })
    }

    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => PopError::Timeout,
            RecvTimeoutError::Disconnected => PopError::Closed,
        })
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
