//! Operator graph storage.

use crate::dataflow::node::{Node, NodeId, Polarity, RelId};
use alloc::format;
use alloc::vec::Vec;
use stratalog_core::{Error, Result};

/// Arena of operator nodes.
///
/// Nodes are addressed by their insertion index. A node may only refer to
/// nodes added before it.
#[derive(Debug, Default)]
pub struct OperatorGraph {
    nodes: Vec<Node>,
}

impl OperatorGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the graph.
    ///
    /// Returns the id assigned to the node, or an error if its child does not
    /// exist yet.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        let id = self.nodes.len();
        if let Some(input) = node.input() {
            if input >= id {
                return Err(Error::invalid_plan(format!(
                    "{} node refers to unknown node {}",
                    node.kind(),
                    input
                )));
            }
        }
        self.nodes.push(node);
        Ok(id)
    }

    /// Gets a reference to a node by id.
    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns the number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates over every node with its id.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate()
    }

    /// Returns the nodes of the subtree rooted at `root`, children first.
    pub fn subtree(&self, root: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(root);
        while let Some(id) = current {
            let Some(node) = self.nodes.get(id) else {
                break;
            };
            chain.push(id);
            current = node.input();
        }
        chain.reverse();
        chain
    }

    /// Returns every relation read by the subtree rooted at `root`.
    pub fn dependencies(&self, root: NodeId) -> Vec<(RelId, Polarity)> {
        let mut deps = Vec::new();
        for id in self.subtree(root) {
            if let Some(node) = self.nodes.get(id) {
                for dep in node.relations() {
                    if !deps.contains(&dep) {
                        deps.push(dep);
                    }
                }
            }
        }
        deps
    }
}
