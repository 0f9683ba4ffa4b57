//! Trunk function
//!
//! Emits one stem at the world origin and grows a near-vertical chain of
//! segments with tapering radius and a gentle Perlin-driven wander. Every
//! node is seeded with extension state so the branching stage can select
//! and split the trunk geometry.

use glam::Vec3;
use noise::{NoiseFn, Perlin};
use serde::{Deserialize, Serialize};

use crate::math::geometry::lerp;
use crate::tree::{
    BranchGrowthInfo, FunctionContext, GrowthInfo, Node, TreeFunction, TreeGraph,
};

/// Frequency of the lateral wander along the trunk arc.
const WANDER_FREQUENCY: f64 = 0.35;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrunkFunction {
    pub seed: u64,
    /// Total trunk length.
    pub length: f32,
    pub start_radius: f32,
    pub end_radius: f32,
    /// Radius falloff exponent; lower values taper faster near the base.
    pub shape: f32,
    /// Tendency to straighten back toward vertical.
    pub up_attraction: f32,
    /// Segments per unit length.
    pub resolution: f32,
    /// Amplitude of the lateral wander.
    pub randomness: f32,
}

impl Default for TrunkFunction {
    fn default() -> Self {
        Self {
            seed: 0,
            length: 14.0,
            start_radius: 0.3,
            end_radius: 0.05,
            shape: 0.7,
            up_attraction: 0.6,
            resolution: 3.0,
            randomness: 1.0,
        }
    }
}

impl TreeFunction for TrunkFunction {
    fn execute(&self, graph: &mut TreeGraph, ctx: &FunctionContext) {
        let resolution = self.resolution.max(0.001);
        let segment_length = 1.0 / resolution;
        let wander = Perlin::new(self.seed.wrapping_add(ctx.seed) as u32);

        let mut node = Node::new(
            Vec3::Z,
            Vec3::X,
            segment_length.min(self.length),
            self.start_radius,
            ctx.id,
        );
        node.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
            desired_length: self.length,
            origin_radius: self.start_radius,
            position: Vec3::ZERO,
            current_length: node.length,
            ..Default::default()
        });

        let mut current_length = node.length;
        let mut position = Vec3::ZERO;
        let mut direction = node.direction;
        let mut current = graph.add_stem(node, Vec3::ZERO);

        while current_length < self.length {
            position += direction * segment_length;

            // Perlin wander sampled along the arc; two offset channels so
            // x and y drift independently.
            let t = current_length as f64 * WANDER_FREQUENCY;
            let offset = Vec3::new(
                wander.get([t, 0.0]) as f32,
                wander.get([t, 100.0]) as f32,
                0.0,
            );
            direction = (direction + offset * self.randomness / resolution
                + Vec3::Z * self.up_attraction / resolution)
                .normalize_or(Vec3::Z);

            let progress = current_length / self.length;
            let radius = lerp(
                self.start_radius,
                self.end_radius,
                progress.powf(self.shape.max(0.0001)),
            );
            let length = segment_length.min(self.length - current_length);
            current_length += length;

            let parent_tangent = graph.node(current).tangent;
            let mut child = Node::new(direction, parent_tangent, length, radius, ctx.id);
            child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
                desired_length: self.length,
                origin_radius: self.start_radius,
                position,
                current_length,
                ..Default::default()
            });
            current = graph.add_child(current, child, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_trunk(trunk: &TrunkFunction) -> TreeGraph {
        let mut graph = TreeGraph::new();
        let ctx = FunctionContext {
            id: 0,
            parent_id: 0,
            seed: 0,
        };
        trunk.execute(&mut graph, &ctx);
        graph
    }

    #[test]
    fn test_trunk_emits_single_stem() {
        let graph = run_trunk(&TrunkFunction::default());
        assert_eq!(graph.stems.len(), 1);
        assert_eq!(graph.stems[0].position, Vec3::ZERO);
    }

    #[test]
    fn test_trunk_chain_reaches_length() {
        let trunk = TrunkFunction::default();
        let graph = run_trunk(&trunk);
        let total = graph.branch_length(graph.stems[0].root);
        assert!((total - trunk.length).abs() < 1e-3);
    }

    #[test]
    fn test_trunk_radius_tapers() {
        let graph = run_trunk(&TrunkFunction::default());
        let mut current = graph.stems[0].root;
        let base_radius = graph.node(current).radius;
        while let Some(child) = graph.node(current).children.first() {
            current = child.node;
        }
        assert!(graph.node(current).radius < base_radius);
    }

    #[test]
    fn test_trunk_grows_upward() {
        let graph = run_trunk(&TrunkFunction::default());
        let mut current = graph.stems[0].root;
        loop {
            let node = graph.node(current);
            assert!(node.direction.z > 0.0);
            match node.children.first() {
                Some(child) => current = child.node,
                None => break,
            }
        }
    }

    #[test]
    fn test_trunk_deterministic() {
        let trunk = TrunkFunction::default();
        let a = run_trunk(&trunk);
        let b = run_trunk(&trunk);
        assert_eq!(a.node_count(), b.node_count());
        for id in 0..a.node_count() {
            assert_eq!(a.node(id).direction, b.node(id).direction);
            assert_eq!(a.node(id).radius, b.node(id).radius);
        }
    }

    #[test]
    fn test_trunk_nodes_carry_extension_state() {
        let graph = run_trunk(&TrunkFunction::default());
        let root = graph.node(graph.stems[0].root);
        let info = root.growth_info.as_branch().expect("branch info");
        assert_eq!(info.desired_length, 14.0);
        assert_eq!(info.origin_radius, 0.3);
    }
}
