use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::Frame;

/// Index of a node within its [`CallTree`].
pub type NodeId = usize;

/// Aggregated call tree node: one frame under one specific parent chain.
/// Repeated occurrences of the same call path are merged into one node.
#[derive(Debug, Clone, Serialize)]
pub struct CallTreeNode {
    pub id: NodeId,
    /// `None` only for the synthetic root.
    pub frame: Option<Arc<Frame>>,
    pub parent: Option<NodeId>,
    /// Children in first-appearance order.
    pub children: Vec<NodeId>,
    /// Weight attributed while this node was the innermost frame.
    pub self_weight: f64,
    /// Weight attributed while this node or any descendant was active.
    pub total_weight: f64,
    #[serde(skip)]
    child_by_key: HashMap<String, NodeId>,
}

impl CallTreeNode {
    fn new(id: NodeId, frame: Option<Arc<Frame>>, parent: Option<NodeId>) -> Self {
        Self {
            id,
            frame,
            parent,
            children: Vec::new(),
            self_weight: 0.0,
            total_weight: 0.0,
            child_by_key: HashMap::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.frame.is_none()
    }

    /// Display name of the node's frame; empty for the root.
    pub fn name(&self) -> &str {
        self.frame.as_deref().map_or("", |f| f.name.as_str())
    }

    /// Key of the node's frame; `None` for the root.
    pub fn key(&self) -> Option<&str> {
        self.frame.as_deref().map(|f| f.key.as_str())
    }
}

/// Arena-backed call tree. Node `0` is the synthetic root.
#[derive(Debug, Clone, Serialize)]
pub struct CallTree {
    nodes: Vec<CallTreeNode>,
}

impl CallTree {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![CallTreeNode::new(Self::ROOT, None, None)],
        }
    }

    pub fn root(&self) -> &CallTreeNode {
        &self.nodes[Self::ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&CallTreeNode> {
        self.nodes.get(id)
    }

    /// Direct children of `id`, in first-appearance order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &CallTreeNode> {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&child| &self.nodes[child])
    }

    /// Find the child of `parent` bound to the frame with `key`.
    pub fn child(&self, parent: NodeId, key: &str) -> Option<&CallTreeNode> {
        let id = *self.nodes.get(parent)?.child_by_key.get(key)?;
        self.nodes.get(id)
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds nothing but its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Return the child of `parent` for `frame`, appending one if absent.
    pub(crate) fn child_or_insert(&mut self, parent: NodeId, frame: &Arc<Frame>) -> NodeId {
        if let Some(&existing) = self.nodes[parent].child_by_key.get(&frame.key) {
            return existing;
        }
        let id = self.nodes.len();
        self.nodes
            .push(CallTreeNode::new(id, Some(Arc::clone(frame)), Some(parent)));
        let parent_node = &mut self.nodes[parent];
        parent_node.children.push(id);
        parent_node.child_by_key.insert(frame.key.clone(), id);
        id
    }

    pub(crate) fn add_total(&mut self, id: NodeId, weight: f64) {
        self.nodes[id].total_weight += weight;
    }

    pub(crate) fn add_self(&mut self, id: NodeId, weight: f64) {
        self.nodes[id].self_weight += weight;
    }

    /// Visit every node except the root in pre-order, passing its depth
    /// (top-level frames are depth 0).
    pub fn walk<'a, F>(&'a self, mut visit: F)
    where
        F: FnMut(&'a CallTreeNode, usize),
    {
        let mut stack: Vec<(NodeId, usize)> = self
            .root()
            .children
            .iter()
            .rev()
            .map(|&id| (id, 0))
            .collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            visit(node, depth);
            stack.extend(node.children.iter().rev().map(|&child| (child, depth + 1)));
        }
    }
}

impl Default for CallTree {
    fn default() -> Self {
        Self::new()
    }
}
