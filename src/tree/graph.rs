//! Arena storage for the skeleton graph
//!
//! Nodes live in a flat vector and reference each other by index, so the
//! growth stages can walk and mutate the graph without aliasing issues and
//! the "snapshot the child count before a growth step" discipline is a
//! plain integer copy.

use glam::Vec3;

pub use crate::tree::node::NodeId;
use crate::tree::node::{Node, NodeChild, Stem};

/// A node id paired with the world position of its base, as produced by
/// branch selection.
#[derive(Clone, Copy, Debug)]
pub struct PlacedNode {
    pub id: NodeId,
    pub position: Vec3,
}

/// The shared, mutable skeleton graph passed between pipeline stages.
#[derive(Clone, Debug, Default)]
pub struct TreeGraph {
    nodes: Vec<Node>,
    pub stems: Vec<Stem>,
}

impl TreeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Add a free node to the arena.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Add a node and register it as a stem root at `position`.
    pub fn add_stem(&mut self, node: Node, position: Vec3) -> NodeId {
        let root = self.add_node(node);
        self.stems.push(Stem { root, position });
        root
    }

    /// Add a node and link it as a child of `parent`.
    pub fn add_child(&mut self, parent: NodeId, node: Node, position_in_parent: f32) -> NodeId {
        let id = self.add_node(node);
        self.nodes[parent].children.push(NodeChild {
            node: id,
            position_in_parent,
        });
        id
    }

    /// Length of the branch starting at `id`, following continuation
    /// children (index 0).
    pub fn branch_length(&self, id: NodeId) -> f32 {
        let mut length = 0.0;
        let mut current = id;
        loop {
            let node = &self.nodes[current];
            length += node.length;
            match node.children.first() {
                Some(child) => current = child.node,
                None => return length,
            }
        }
    }

    /// Collect the branches created by `creator_id`, with world positions.
    ///
    /// A branch is a maximal chain of same-creator nodes connected through
    /// continuation children; a same-creator child at index > 0 starts a
    /// new branch.
    pub fn select_branches(&self, creator_id: u32) -> Vec<Vec<PlacedNode>> {
        let mut branches = Vec::new();
        for stem in &self.stems {
            self.select_branches_rec(stem.root, stem.position, creator_id, None, &mut branches);
        }
        branches
    }

    fn select_branches_rec(
        &self,
        id: NodeId,
        position: Vec3,
        creator_id: u32,
        continued: Option<usize>,
        branches: &mut Vec<Vec<PlacedNode>>,
    ) {
        let node = &self.nodes[id];
        let branch = if node.creator_id == creator_id {
            let index = continued.unwrap_or_else(|| {
                branches.push(Vec::new());
                branches.len() - 1
            });
            branches[index].push(PlacedNode { id, position });
            Some(index)
        } else {
            None
        };

        for (i, child) in node.children.iter().enumerate() {
            let child_position =
                position + node.direction * node.length * child.position_in_parent;
            let pass_on = if i == 0 { branch } else { None };
            self.select_branches_rec(child.node, child_position, creator_id, pass_on, branches);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::node::Node;

    fn segment(creator_id: u32) -> Node {
        Node::new(Vec3::Z, Vec3::X, 1.0, 0.1, creator_id)
    }

    #[test]
    fn test_branch_length_follows_continuation() {
        let mut graph = TreeGraph::new();
        let root = graph.add_stem(segment(0), Vec3::ZERO);
        let a = graph.add_child(root, segment(0), 1.0);
        graph.add_child(a, segment(0), 1.0);
        // A split must not contribute to the branch length.
        graph.add_child(root, segment(0), 0.5);
        assert!((graph.branch_length(root) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_select_branches_splits_chains() {
        let mut graph = TreeGraph::new();
        let root = graph.add_stem(segment(0), Vec3::ZERO);
        let a = graph.add_child(root, segment(0), 1.0);
        let split = graph.add_child(root, segment(0), 0.5);
        graph.add_child(split, segment(1), 1.0);

        let branches = graph.select_branches(0);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].len(), 2);
        assert_eq!(branches[0][1].id, a);
        assert_eq!(branches[1].len(), 1);
        assert_eq!(branches[1][0].id, split);

        // The split attaches half way up the root segment.
        assert!((branches[1][0].position.z - 0.5).abs() < 1e-6);

        let other = graph.select_branches(1);
        assert_eq!(other.len(), 1);
    }
}
