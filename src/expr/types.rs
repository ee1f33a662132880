//! Core expression graph types.

use crate::error::BuildError;
use crate::helper::Operation;

/// Unique identifier for expression nodes.
pub type NodeId = u32;

/// How a [`NodeType::Chain`] turns its children's outcomes into its own.
///
/// The policy is fixed when the chain is built; every child runs regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChainPolicy {
    /// Success only if every child succeeded.
    AllSucceed,
    /// Success if at least one child succeeded.
    AnySucceed,
    /// Always success. Used for normalization stages and broadcasts.
    #[default]
    AlwaysSucceed,
}

/// Types of nodes in the expression graph.
#[derive(Debug, Clone)]
pub enum NodeType {
    /// Leaf node applying a single bound operation.
    Term(Operation),

    /// Children in order; stops at the first failure.
    And,

    /// Children in order; stops at the first success. Each alternative sees
    /// the event as the previous one left it.
    Or,

    /// Every child runs in order; outcome decided by the policy.
    Chain(ChainPolicy),

    /// Two children: a condition and a consequence. The consequence runs
    /// only when the condition succeeds and its outcome is ignored.
    Implication,
}

impl NodeType {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeType::Term(_) => "term",
            NodeType::And => "and",
            NodeType::Or => "or",
            NodeType::Chain(_) => "chain",
            NodeType::Implication => "implication",
        }
    }

    pub fn is_term(&self) -> bool {
        matches!(self, NodeType::Term(_))
    }
}

/// A node in the expression graph.
#[derive(Debug, Clone)]
pub struct ExpressionNode {
    /// Unique identifier for this node
    pub id: NodeId,

    /// Label used in traces, e.g. the asset or stage a subgraph came from
    pub name: String,

    /// The type and operation of this node
    pub node_type: NodeType,

    /// Ordered children
    pub children: Vec<NodeId>,
}

impl ExpressionNode {
    pub fn new(id: NodeId, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id,
            name: name.into(),
            node_type,
            children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Immutable expression graph ready for evaluation.
///
/// Nodes live in an arena indexed by [`NodeId`]; a node may be shared by
/// several parents but the graph never contains a cycle.
#[derive(Debug, Clone)]
pub struct CompiledExpression {
    pub(crate) nodes: Vec<ExpressionNode>,
    pub(crate) root: NodeId,
}

impl CompiledExpression {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, node_id: NodeId) -> Option<&ExpressionNode> {
        self.nodes.get(node_id as usize)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[ExpressionNode] {
        &self.nodes
    }

    /// Validate the graph structure for correctness.
    pub fn validate(&self) -> Result<(), BuildError> {
        validate_nodes(&self.nodes, self.root)
    }

    /// Get statistics about the graph structure.
    pub fn statistics(&self) -> ExpressionStatistics {
        ExpressionStatistics::from_expression(self)
    }
}

/// Structural checks shared by the builder and [`CompiledExpression::validate`].
pub(crate) fn validate_nodes(nodes: &[ExpressionNode], root: NodeId) -> Result<(), BuildError> {
    if root as usize >= nodes.len() {
        return Err(BuildError::Graph(format!("Invalid root node: {root}")));
    }

    for (index, node) in nodes.iter().enumerate() {
        if node.id as usize != index {
            return Err(BuildError::Graph(format!(
                "Node {} stored at position {index}",
                node.id
            )));
        }

        for &child in &node.children {
            if child as usize >= nodes.len() {
                return Err(BuildError::Graph(format!(
                    "Invalid child: {} -> {child}",
                    node.id
                )));
            }
        }

        match &node.node_type {
            NodeType::Term(_) if !node.children.is_empty() => {
                return Err(BuildError::Graph(format!(
                    "Term node {} cannot have children",
                    node.id
                )));
            }
            NodeType::Implication if node.children.len() != 2 => {
                return Err(BuildError::Graph(format!(
                    "Implication node {} needs exactly 2 children, has {}",
                    node.id,
                    node.children.len()
                )));
            }
            _ => {}
        }
    }

    if topological_order(nodes).is_none() {
        return Err(BuildError::Graph("Cycle detected in expression".to_string()));
    }

    Ok(())
}

/// Kahn's algorithm over parent -> child edges. Children come before parents
/// in the returned order; `None` when a cycle exists.
pub(crate) fn topological_order(nodes: &[ExpressionNode]) -> Option<Vec<NodeId>> {
    let mut pending = vec![0usize; nodes.len()];
    let mut parents: Vec<Vec<NodeId>> = vec![Vec::new(); nodes.len()];

    for node in nodes {
        for &child in &node.children {
            pending[node.id as usize] += 1;
            parents[child as usize].push(node.id);
        }
    }

    let mut queue: std::collections::VecDeque<NodeId> = pending
        .iter()
        .enumerate()
        .filter(|&(_, &count)| count == 0)
        .map(|(id, _)| id as NodeId)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(node_id) = queue.pop_front() {
        order.push(node_id);
        for &parent in &parents[node_id as usize] {
            pending[parent as usize] -= 1;
            if pending[parent as usize] == 0 {
                queue.push_back(parent);
            }
        }
    }

    (order.len() == nodes.len()).then_some(order)
}

/// Statistics about expression structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionStatistics {
    /// Total number of nodes
    pub total_nodes: usize,

    /// Number of term nodes
    pub term_nodes: usize,

    /// Number of logical nodes (and, or, chain, implication)
    pub logical_nodes: usize,

    /// Longest root-to-leaf path, counted in nodes
    pub max_depth: usize,
}

impl ExpressionStatistics {
    pub fn from_expression(expression: &CompiledExpression) -> Self {
        let term_nodes = expression
            .nodes
            .iter()
            .filter(|node| node.node_type.is_term())
            .count();

        Self {
            total_nodes: expression.nodes.len(),
            term_nodes,
            logical_nodes: expression.nodes.len() - term_nodes,
            max_depth: Self::calculate_max_depth(expression),
        }
    }

    fn calculate_max_depth(expression: &CompiledExpression) -> usize {
        let Some(order) = topological_order(&expression.nodes) else {
            return 0;
        };

        // Children precede parents, so each depth is final when read.
        let mut depths = vec![0usize; expression.nodes.len()];
        for node_id in order {
            let node = &expression.nodes[node_id as usize];
            let deepest_child = node
                .children
                .iter()
                .map(|&child| depths[child as usize])
                .max()
                .unwrap_or(0);
            depths[node_id as usize] = deepest_child + 1;
        }

        depths
            .get(expression.root as usize)
            .copied()
            .unwrap_or(0)
    }
}
