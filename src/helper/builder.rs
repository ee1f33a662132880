//! Registry of helper operations.

use super::parser::HelperDefinition;
use super::types::{Operation, Signature};
use crate::error::BuildError;
use crate::query::QueryClient;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Function type turning a validated definition into a bound operation.
///
/// Constructors receive definitions whose arity and argument kinds already
/// match the registered [`Signature`]; they do the helper-specific checks
/// (compiling patterns, parsing target paths) and capture what the operation
/// needs at run time.
pub type HelperConstructor =
    Arc<dyn Fn(&HelperDefinition) -> Result<Operation, BuildError> + Send + Sync>;

#[derive(Clone)]
struct HelperEntry {
    signature: Signature,
    constructor: HelperConstructor,
}

/// Registry mapping helper names to their signatures and constructors.
///
/// The registry is an ordinary value: build one, register what you need and
/// hand it to the compiler. Nothing is global.
///
/// # Example
/// ```rust,ignore
/// use event_engine::helper::{HelperRegistry, ParamKind, Signature};
///
/// let mut registry = HelperRegistry::new();
/// registry.register("always", Signature::nullary(), |def| {
///     Ok(Operation::new("always", def.to_string(), OperationResult::success))
/// });
/// let op = registry.parse_and_build("field", "+always/")?;
/// ```
#[derive(Clone)]
pub struct HelperRegistry {
    helpers: HashMap<String, HelperEntry>,
}

impl HelperRegistry {
    /// Registry with every built-in helper except the companion store ones.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        super::defaults::register_defaults(&mut registry);
        registry
    }

    /// Registry with every built-in helper, store queries going through `client`.
    pub fn with_query_client(client: Arc<dyn QueryClient>) -> Self {
        let mut registry = Self::new();
        super::defaults::register_query_helpers(&mut registry, client);
        registry
    }

    /// Registry without any helper.
    pub fn empty() -> Self {
        Self {
            helpers: HashMap::new(),
        }
    }

    /// Register a helper under `name`, replacing any previous registration.
    ///
    /// # Arguments
    /// * `name` - Helper name as written in invocations, without the `+`
    /// * `signature` - Exact parameter list
    /// * `constructor` - Builds the operation from a validated definition
    pub fn register<F>(&mut self, name: &str, signature: Signature, constructor: F) -> &mut Self
    where
        F: Fn(&HelperDefinition) -> Result<Operation, BuildError> + Send + Sync + 'static,
    {
        self.helpers.insert(
            name.to_string(),
            HelperEntry {
                signature,
                constructor: Arc::new(constructor),
            },
        );
        self
    }

    /// Validate a definition against its helper's signature and build it.
    ///
    /// # Returns
    /// * `Ok(Operation)` - Bound operation ready to be placed in a term
    /// * `Err(BuildError)` - Unknown helper, wrong arity, wrong argument kind,
    ///   or a helper-specific failure such as an invalid pattern
    pub fn build(&self, definition: &HelperDefinition) -> Result<Operation, BuildError> {
        let entry = self
            .helpers
            .get(&definition.name)
            .ok_or_else(|| BuildError::UnknownOperation {
                name: definition.name.clone(),
            })?;

        let expected = entry.signature.arity();
        if definition.arguments.len() != expected {
            return Err(BuildError::ArityMismatch {
                operation: definition.name.clone(),
                expected,
                actual: definition.arguments.len(),
            });
        }

        for (index, (kind, argument)) in entry
            .signature
            .params()
            .iter()
            .zip(&definition.arguments)
            .enumerate()
        {
            if !kind.accepts(argument) {
                return Err(BuildError::ArgumentKind {
                    operation: definition.name.clone(),
                    index,
                    expected: kind.describe(),
                });
            }
        }

        let operation = (entry.constructor)(definition)?;
        debug!(helper = %definition.name, destination = %definition.destination, "built helper");
        Ok(operation)
    }

    /// Parse `invocation` for `destination` and build it.
    pub fn parse_and_build(&self, destination: &str, invocation: &str) -> Result<Operation, BuildError> {
        self.build(&HelperDefinition::parse(destination, invocation)?)
    }

    /// Build from already-split parts.
    pub fn build_parts(&self, destination: &str, name: &str, arguments: &[&str]) -> Result<Operation, BuildError> {
        self.build(&HelperDefinition::from_parts(destination, name, arguments)?)
    }

    pub fn has_helper(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    pub fn signature(&self, name: &str) -> Option<&Signature> {
        self.helpers.get(name).map(|entry| &entry.signature)
    }

    pub fn helper_count(&self) -> usize {
        self.helpers.len()
    }

    /// Registered names, sorted.
    pub fn helper_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.helpers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HelperRegistry")
            .field("helpers", &self.helper_names())
            .finish()
    }
}
