//! Expression evaluation.
//!
//! The event is threaded through the graph by value: each node hands the
//! (possibly modified) event to the next, and the final result carries it
//! back to the caller.

use super::types::{ChainPolicy, CompiledExpression, NodeId, NodeType};
use crate::field::Event;
use crate::helper::OperationResult;
use tracing::trace;

/// Counters collected while evaluating one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationStats {
    /// Nodes visited, including skipped-over composites
    pub nodes_evaluated: usize,

    /// Operations actually applied
    pub terms_evaluated: usize,
}

impl CompiledExpression {
    /// Evaluate the expression against an event.
    pub fn evaluate(&self, event: Event) -> OperationResult {
        self.evaluate_with_stats(event).0
    }

    /// Evaluate and report how much of the graph was visited.
    pub fn evaluate_with_stats(&self, event: Event) -> (OperationResult, EvaluationStats) {
        let mut stats = EvaluationStats::default();
        let result = self.evaluate_node(self.root, event, &mut stats);
        (result, stats)
    }

    fn evaluate_node(&self, node_id: NodeId, event: Event, stats: &mut EvaluationStats) -> OperationResult {
        let Some(node) = self.get_node(node_id) else {
            return OperationResult::failure(event, format!("missing node {node_id}"));
        };
        stats.nodes_evaluated += 1;

        match &node.node_type {
            NodeType::Term(operation) => {
                stats.terms_evaluated += 1;
                let result = operation.apply(event);
                if let Some(reason) = result.trace() {
                    trace!(operation = operation.name(), reason, "term failed");
                }
                result
            }
            NodeType::And => self.evaluate_and(&node.children, event, stats),
            NodeType::Or => self.evaluate_or(&node.name, &node.children, event, stats),
            NodeType::Chain(policy) => self.evaluate_chain(&node.name, *policy, &node.children, event, stats),
            NodeType::Implication => {
                let (condition, consequence) = match node.children.as_slice() {
                    [condition, consequence] => (*condition, *consequence),
                    _ => {
                        return OperationResult::failure(
                            event,
                            format!("implication node {node_id} is malformed"),
                        )
                    }
                };
                match self.evaluate_node(condition, event, stats) {
                    OperationResult::Success(event) => {
                        let event = self.evaluate_node(consequence, event, stats).into_event();
                        OperationResult::success(event)
                    }
                    failure => failure,
                }
            }
        }
    }

    fn evaluate_and(&self, children: &[NodeId], mut event: Event, stats: &mut EvaluationStats) -> OperationResult {
        for &child in children {
            match self.evaluate_node(child, event, stats) {
                OperationResult::Success(next) => event = next,
                failure => return failure,
            }
        }
        OperationResult::success(event)
    }

    fn evaluate_or(
        &self,
        name: &str,
        children: &[NodeId],
        mut event: Event,
        stats: &mut EvaluationStats,
    ) -> OperationResult {
        let mut traces = Vec::new();
        for &child in children {
            match self.evaluate_node(child, event, stats) {
                OperationResult::Success(next) => return OperationResult::success(next),
                OperationResult::Failure { event: next, trace } => {
                    event = next;
                    traces.push(trace);
                }
            }
        }
        OperationResult::failure(
            event,
            format!("[{name}] no alternative succeeded: {}", traces.join("; ")),
        )
    }

    fn evaluate_chain(
        &self,
        name: &str,
        policy: ChainPolicy,
        children: &[NodeId],
        mut event: Event,
        stats: &mut EvaluationStats,
    ) -> OperationResult {
        let mut failed = 0usize;
        for &child in children {
            let result = self.evaluate_node(child, event, stats);
            if result.is_failure() {
                failed += 1;
            }
            event = result.into_event();
        }

        let succeeded = children.len() - failed;
        let accepted = match policy {
            ChainPolicy::AllSucceed => failed == 0,
            ChainPolicy::AnySucceed => succeeded > 0,
            ChainPolicy::AlwaysSucceed => true,
        };

        if accepted {
            OperationResult::success(event)
        } else {
            OperationResult::failure(
                event,
                format!("[{name}] {failed} of {} children failed", children.len()),
            )
        }
    }
}
