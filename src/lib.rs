//! # Event Engine
//!
//! Rule evaluation core for a security event pipeline. Rule documents are
//! compiled into expression graphs of bound helper operations; events are
//! JSON trees threaded through those graphs, filtered and normalized on the
//! way.
//!
//! ## Quick Start
//!
//! ```rust
//! use event_engine::{Compiler, Engine, EngineConfig, HelperRegistry};
//! use serde_json::json;
//!
//! let registry = HelperRegistry::new();
//! let mut compiler = Compiler::new(&registry);
//! compiler.compile_asset(r#"
//! name: decoder/mail
//! check:
//!   - message: +exists/
//! normalize:
//!   - map:
//!       message: +r_ext/user.name/([^ @]+)@/
//!       event.kind: mail
//! "#)?;
//!
//! let engine = Engine::new(compiler.into_expression()?, EngineConfig::new().with_workers(1))?;
//! let evaluation = engine.evaluate(json!({"message": "mail from alice@example.com"}));
//! assert!(evaluation.accepted);
//! assert_eq!(evaluation.event["user"]["name"], "alice");
//! assert_eq!(evaluation.event["event"]["kind"], "mail");
//! # Ok::<(), event_engine::EngineError>(())
//! ```
//!
//! ## Helpers
//!
//! Helpers are written `+name/arg/.../` and bound by a [`HelperRegistry`].
//! Field references start with `$`. Build-time problems (unknown helper,
//! wrong arity, invalid pattern) are reported as [`BuildError`]s before any
//! event is seen; run-time problems make the operation fail without
//! modifying the event.
//!
//! ## Companion store
//!
//! `wdb_update` and `wdb_query` talk to the companion store through a
//! [`QueryClient`]; register them with
//! [`HelperRegistry::with_query_client`] and a [`SocketQueryClient`].

pub mod compiler;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod field;
pub mod helper;
pub mod query;
pub mod streaming;

pub use compiler::Compiler;
pub use config::{EngineConfig, QueryConfig};
pub use engine::{Engine, Evaluation, Evaluator, EventSink, RunSummary};
pub use error::{BuildError, EngineError, Result};
pub use expr::{ChainPolicy, CompiledExpression, ExpressionBuilder};
pub use field::{Argument, Event, FieldPath};
pub use helper::{HelperDefinition, HelperRegistry, Operation, OperationResult};
pub use query::{QueryClient, QueryResponse, SocketQueryClient};
