//! Core types for bound helper operations.

use crate::field::{Argument, Event};
use std::fmt;
use std::sync::Arc;

/// Outcome of applying an operation to an event.
///
/// Both variants carry the event so evaluation can keep threading it through
/// an expression. A failed operation leaves the event exactly as it received it.
#[derive(Debug, Clone, PartialEq)]
pub enum OperationResult {
    Success(Event),
    Failure { event: Event, trace: String },
}

impl OperationResult {
    pub fn success(event: Event) -> Self {
        OperationResult::Success(event)
    }

    pub fn failure(event: Event, trace: impl Into<String>) -> Self {
        OperationResult::Failure {
            event,
            trace: trace.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        !self.is_success()
    }

    pub fn event(&self) -> &Event {
        match self {
            OperationResult::Success(event) | OperationResult::Failure { event, .. } => event,
        }
    }

    pub fn into_event(self) -> Event {
        match self {
            OperationResult::Success(event) | OperationResult::Failure { event, .. } => event,
        }
    }

    /// Diagnostic text of a failure.
    pub fn trace(&self) -> Option<&str> {
        match self {
            OperationResult::Success(_) => None,
            OperationResult::Failure { trace, .. } => Some(trace),
        }
    }
}

/// Function type for bound operations.
///
/// Operations own all their build-time state (paths, compiled patterns, client
/// handles) and are shared across worker threads, so they must be `Send + Sync`.
///
/// # Example
/// ```rust,ignore
/// let op: OperationFn = Arc::new(|event| OperationResult::success(event));
/// ```
pub type OperationFn = Arc<dyn Fn(Event) -> OperationResult + Send + Sync>;

/// A helper invocation bound to its destination and arguments.
#[derive(Clone)]
pub struct Operation {
    name: Arc<str>,
    description: String,
    func: OperationFn,
}

impl Operation {
    pub fn new<F>(name: &str, description: impl Into<String>, func: F) -> Self
    where
        F: Fn(Event) -> OperationResult + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            description: description.into(),
            func: Arc::new(func),
        }
    }

    /// Name of the helper this operation was built from.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable rendering of the invocation, used in traces.
    pub fn description(&self) -> &str {
        &self.description
    }

    #[inline]
    pub fn apply(&self, event: Event) -> OperationResult {
        (self.func)(event)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

/// What a parameter position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Literal,
    Reference,
    Any,
}

impl ParamKind {
    pub fn accepts(self, argument: &Argument) -> bool {
        match self {
            ParamKind::Literal => !argument.is_reference(),
            ParamKind::Reference => argument.is_reference(),
            ParamKind::Any => true,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            ParamKind::Literal => "a literal",
            ParamKind::Reference => "a field reference",
            ParamKind::Any => "a literal or a field reference",
        }
    }
}

/// Declared parameter list of a helper. The arity is exact.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature {
    params: Vec<ParamKind>,
}

impl Signature {
    pub fn new(params: &[ParamKind]) -> Self {
        Self {
            params: params.to_vec(),
        }
    }

    pub fn nullary() -> Self {
        Self::default()
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamKind] {
        &self.params
    }
}
