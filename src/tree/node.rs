//! Skeleton node types
//!
//! A node is one segment of the skeleton. The first child continues the
//! current branch; further children are splits or lateral branches. The
//! per-node growth payload is a closed sum type: the branching stage
//! tracks extension state in [`BranchGrowthInfo`], the growth simulation
//! replaces it with [`BioNodeInfo`].

use glam::Vec3;

use crate::math::geometry;

/// Index of a node inside a [`crate::tree::TreeGraph`] arena.
pub type NodeId = usize;

/// Link from a parent node to a child, with the fractional arc position
/// along the parent at which the child attaches.
#[derive(Clone, Copy, Debug)]
pub struct NodeChild {
    pub node: NodeId,
    /// Attachment point along the parent, in [0, 1].
    pub position_in_parent: f32,
}

/// One skeleton segment.
#[derive(Clone, Debug)]
pub struct Node {
    /// Unit direction of the segment in the world frame.
    pub direction: Vec3,
    /// Unit vector orthogonal to `direction`, propagated from the parent.
    pub tangent: Vec3,
    pub length: f32,
    pub radius: f32,
    /// Id of the tree function that created this node.
    pub creator_id: u32,
    pub children: Vec<NodeChild>,
    pub growth_info: GrowthInfo,
}

impl Node {
    /// Create a segment, deriving the tangent from the parent's tangent
    /// re-orthogonalized against `direction`.
    pub fn new(
        direction: Vec3,
        parent_tangent: Vec3,
        length: f32,
        radius: f32,
        creator_id: u32,
    ) -> Self {
        let direction = direction.normalize_or(Vec3::Z);
        let tangent = geometry::project_on_plane(parent_tangent, direction)
            .try_normalize()
            .unwrap_or_else(|| geometry::get_orthogonal_vector(direction));
        Self {
            direction,
            tangent,
            length,
            radius,
            creator_id,
            children: Vec::new(),
            growth_info: GrowthInfo::None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A root node plus its world-space base position.
#[derive(Clone, Copy, Debug)]
pub struct Stem {
    pub root: NodeId,
    pub position: Vec3,
}

/// Per-node payload, owned by the stage that created the node.
#[derive(Clone, Debug, Default)]
pub enum GrowthInfo {
    #[default]
    None,
    Branch(BranchGrowthInfo),
    Bio(BioNodeInfo),
}

impl GrowthInfo {
    pub fn as_branch(&self) -> Option<&BranchGrowthInfo> {
        match self {
            GrowthInfo::Branch(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_branch_mut(&mut self) -> Option<&mut BranchGrowthInfo> {
        match self {
            GrowthInfo::Branch(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_bio(&self) -> Option<&BioNodeInfo> {
        match self {
            GrowthInfo::Bio(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_bio_mut(&mut self) -> Option<&mut BioNodeInfo> {
        match self {
            GrowthInfo::Bio(info) => Some(info),
            _ => None,
        }
    }
}

/// Extension state used by the branching stage.
#[derive(Clone, Debug, Default)]
pub struct BranchGrowthInfo {
    pub desired_length: f32,
    pub origin_radius: f32,
    /// World position of the segment base.
    pub position: Vec3,
    pub current_length: f32,
    pub deviation_from_rest_pose: f32,
    pub cumulated_weight: f32,
    pub age: f32,
    pub inactive: bool,
}

/// State of a node in the growth simulation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeType {
    Meristem,
    Branch,
    Cut,
    #[default]
    Ignored,
    Dormant,
    Flower,
}

/// Vigor bookkeeping used by the growth simulation.
#[derive(Clone, Debug)]
pub struct BioNodeInfo {
    pub node_type: NodeType,
    pub vigor: f32,
    pub vigor_ratio: f32,
    pub age: i32,
    pub philotaxis_angle: f32,
    pub absolute_position: Vec3,
    pub center_of_mass: Vec3,
    pub branch_weight: f32,
    /// True when the node originated from a lateral dormant bud.
    pub is_lateral: bool,
}

impl BioNodeInfo {
    pub fn new(node_type: NodeType, age: i32, philotaxis_angle: f32, is_lateral: bool) -> Self {
        Self {
            node_type,
            vigor: 0.0,
            vigor_ratio: 1.0,
            age,
            philotaxis_angle,
            absolute_position: Vec3::ZERO,
            center_of_mass: Vec3::ZERO,
            branch_weight: 0.0,
            is_lateral,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_tangent_orthogonal() {
        let dir = Vec3::new(0.2, 0.3, 0.9).normalize();
        let node = Node::new(dir, Vec3::X, 0.5, 0.1, 0);
        assert!(node.direction.dot(node.tangent).abs() < 1e-5);
        assert!((node.tangent.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_node_tangent_degenerate_parent_tangent() {
        // Parent tangent parallel to direction collapses under projection;
        // a stable orthogonal fallback must be produced.
        let node = Node::new(Vec3::Z, Vec3::Z, 1.0, 0.1, 0);
        assert!(node.direction.dot(node.tangent).abs() < 1e-5);
        assert!((node.tangent.length() - 1.0).abs() < 1e-5);
    }
}
