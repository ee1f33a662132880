//! Expression graph builder.

use super::types::{validate_nodes, ChainPolicy, CompiledExpression, ExpressionNode, NodeId, NodeType};
use crate::error::BuildError;
use crate::helper::Operation;

/// Builder for [`CompiledExpression`] graphs.
///
/// Nodes are appended to an arena and referenced by [`NodeId`]; composite
/// nodes take the ids of children created earlier, so a subgraph can be
/// shared by several parents.
///
/// # Example
/// ```rust,ignore
/// let mut builder = ExpressionBuilder::new();
/// let check = builder.term(registry.parse_and_build("user", "+exists/")?);
/// let map = builder.term(registry.parse_and_build("user_up", "+s_up/$user/")?);
/// let stage = builder.implication(check, map);
/// let expression = builder.build(stage)?;
/// ```
#[derive(Debug, Default)]
pub struct ExpressionBuilder {
    nodes: Vec<ExpressionNode>,
    next_node_id: NodeId,
}

impl ExpressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaf node applying `operation`.
    pub fn term(&mut self, operation: Operation) -> NodeId {
        let name = operation.description().to_string();
        self.create_node(name, NodeType::Term(operation), Vec::new())
    }

    pub fn and(&mut self, children: Vec<NodeId>) -> NodeId {
        self.create_node("and", NodeType::And, children)
    }

    pub fn or(&mut self, children: Vec<NodeId>) -> NodeId {
        self.create_node("or", NodeType::Or, children)
    }

    pub fn chain(&mut self, policy: ChainPolicy, children: Vec<NodeId>) -> NodeId {
        self.create_node("chain", NodeType::Chain(policy), children)
    }

    /// Chain whose outcome is always success.
    pub fn broadcast(&mut self, children: Vec<NodeId>) -> NodeId {
        self.chain(ChainPolicy::AlwaysSucceed, children)
    }

    pub fn implication(&mut self, condition: NodeId, consequence: NodeId) -> NodeId {
        self.create_node("implication", NodeType::Implication, vec![condition, consequence])
    }

    /// Relabel a node; the label shows up in failure traces.
    pub fn with_name(&mut self, node_id: NodeId, name: impl Into<String>) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(node_id as usize) {
            node.name = name.into();
        }
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Drop every node created after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        self.next_node_id = self.nodes.len() as NodeId;
    }

    /// Validate and freeze the graph rooted at `root`.
    pub fn build(self, root: NodeId) -> Result<CompiledExpression, BuildError> {
        validate_nodes(&self.nodes, root)?;
        Ok(CompiledExpression {
            nodes: self.nodes,
            root,
        })
    }

    fn create_node(&mut self, name: impl Into<String>, node_type: NodeType, children: Vec<NodeId>) -> NodeId {
        let node_id = self.next_node_id;
        let mut node = ExpressionNode::new(node_id, name, node_type);
        node.children = children;
        self.nodes.push(node);
        self.next_node_id += 1;
        node_id
    }
}
