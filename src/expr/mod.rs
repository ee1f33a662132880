//! Expression algebra over bound operations.
//!
//! Rules compile into a graph of [`NodeType`]s stored in an arena:
//!
//! - **Term**: applies one [`Operation`](crate::helper::Operation)
//! - **And / Or**: short-circuiting conjunction and disjunction
//! - **Chain**: runs every child; the [`ChainPolicy`] picks the outcome
//! - **Implication**: runs the consequence only if the condition succeeds
//!
//! Graphs are built with [`ExpressionBuilder`] and evaluated through
//! [`CompiledExpression::evaluate`].

pub mod builder;
pub mod evaluator;
pub mod types;

pub use builder::ExpressionBuilder;
pub use evaluator::EvaluationStats;
pub use types::{ChainPolicy, CompiledExpression, ExpressionNode, ExpressionStatistics, NodeId, NodeType};
