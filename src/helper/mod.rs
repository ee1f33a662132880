//! Helper DSL and operation library.
//!
//! Rule documents attach helpers to fields with a compact text syntax:
//!
//! ```text
//! <destination>: +<name>/<arg1>/<arg2>/.../
//! ```
//!
//! Arguments starting with `$` are references to other fields of the event;
//! everything else is literal text. The [`HelperRegistry`] validates an
//! invocation against the helper's [`Signature`] and binds it into an
//! [`Operation`], so an invocation that builds can no longer fail for
//! structural reasons when it runs.

pub mod builder;
pub mod defaults;
pub mod filter;
pub mod parser;
pub mod query;
pub mod transform;
pub mod types;

pub use builder::{HelperConstructor, HelperRegistry};
pub use parser::{HelperDefinition, HELPER_PREFIX};
pub use types::{Operation, OperationFn, OperationResult, ParamKind, Signature};
