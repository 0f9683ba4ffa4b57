//! Branch function
//!
//! Extends the nodes of a predecessor function with stochastic branches:
//! origins are distributed along the parent branches with a phyllotaxis
//! spiral, then each origin grows step by step through a FIFO queue with
//! random wander, optional splits, floor avoidance and periodic gravity
//! relaxation. A crown envelope shortens branches near the top of the tree
//! to enforce a silhouette.

use std::collections::VecDeque;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::functions::crown::{shape_ratio, CrownShape};
use crate::functions::property::Property;
use crate::math::geometry::{self, lerp};
use crate::math::SimpleRng;
use crate::tree::{
    BranchGrowthInfo, FunctionContext, GrowthInfo, Node, NodeId, TreeFunction, TreeGraph,
};

const EPSILON: f32 = 0.001;

/// Split behavior of growing branches.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SplitParams {
    /// Radius multiplier for split branches (0 < x < 1).
    pub radius: f32,
    /// Angle between split branches (degrees).
    pub angle: f32,
    /// Probability of a branch splitting (0 < x).
    pub probability: f32,
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            radius: 0.9,
            angle: 45.0,
            probability: 0.5,
        }
    }
}

/// Gravity response of growing branches.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GravityParams {
    /// How much branches bend under their weight.
    pub strength: f32,
    /// Resistance to bending from gravity.
    pub stiffness: f32,
    /// Tendency to grow upward (negative values droop).
    pub up_attraction: f32,
}

impl Default for GravityParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            stiffness: 0.1,
            up_attraction: 0.25,
        }
    }
}

/// Placement of branch origins along the parent.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DistributionParams {
    /// Position along parent where branches start (0-1).
    pub start: f32,
    /// Position along parent where branches end (0-1).
    pub end: f32,
    /// Number of branches per unit length (0 < x).
    pub density: f32,
    /// Spiral angle between branches (degrees).
    pub phillotaxis: f32,
}

impl Default for DistributionParams {
    fn default() -> Self {
        Self {
            start: 0.1,
            end: 1.0,
            density: 2.0,
            phillotaxis: 137.5,
        }
    }
}

/// Crown envelope applied to branches above the crown base.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CrownParams {
    pub shape: CrownShape,
    /// Fraction of the crown height below which branches are unaffected.
    pub base_size: f32,
    /// Crown height; negative values resolve to the trunk length.
    pub height: f32,
    /// Height-dependent offset applied to the start angle (degrees).
    pub angle_variation: f32,
}

impl Default for CrownParams {
    fn default() -> Self {
        Self {
            shape: CrownShape::Cylindrical,
            base_size: 0.3,
            height: -1.0,
            angle_variation: 0.0,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BranchFunction {
    pub seed: u64,
    /// Branch length, evaluated along the parent (x > 0).
    pub length: Property,
    /// Radius relative to the parent at the origin (0 < x < 1).
    pub start_radius: Property,
    /// Radius multiplier at the branch tip.
    pub end_radius: f32,
    /// Per-unit-length chance of a branch dying (0 < x).
    pub break_chance: f32,
    /// Growth steps per unit length (0 < x).
    pub resolution: f32,
    pub randomness: Property,
    /// Tendency of splits toward the horizontal plane (0 < x < 1).
    pub flatness: f32,
    /// Angle between a new branch and its parent (degrees).
    pub start_angle: Property,
    pub split: SplitParams,
    pub gravity: GravityParams,
    pub distribution: DistributionParams,
    pub crown: CrownParams,
}

impl Default for BranchFunction {
    fn default() -> Self {
        Self {
            seed: 0,
            length: Property::Constant(9.0),
            start_radius: Property::Constant(0.4),
            end_radius: 0.05,
            break_chance: 0.01,
            resolution: 3.0,
            randomness: Property::Constant(0.4),
            flatness: 0.5,
            start_angle: Property::Constant(45.0),
            split: SplitParams::default(),
            gravity: GravityParams::default(),
            distribution: DistributionParams::default(),
            crown: CrownParams::default(),
        }
    }
}

/// Attenuate a downward direction near the ground. Returns true when the
/// node is heading into the floor too fast and the branch should stop.
fn avoid_floor(position: Vec3, direction: &mut Vec3, parent_length: f32) -> bool {
    if direction.z < 0.0 {
        direction.z -= direction.z * 2.0 / (2.0 + position.z);
    }
    (position + *direction).z * parent_length * 4.0 < 0.0
}

fn mark_inactive(graph: &mut TreeGraph, id: NodeId) {
    if let Some(info) = graph.node_mut(id).growth_info.as_branch_mut() {
        info.inactive = true;
    }
}

fn propagate_inactive_rec(graph: &mut TreeGraph, id: NodeId) -> bool {
    let inactive = graph
        .node(id)
        .growth_info
        .as_branch()
        .map(|info| info.inactive)
        .unwrap_or(false);
    if graph.node(id).is_leaf() || inactive {
        return inactive;
    }

    let mut any_inactive = false;
    for i in 0..graph.node(id).children.len() {
        let child = graph.node(id).children[i].node;
        if propagate_inactive_rec(graph, child) {
            any_inactive = true;
            break;
        }
    }
    if let Some(info) = graph.node_mut(id).growth_info.as_branch_mut() {
        info.inactive = any_inactive;
    }
    any_inactive
}

fn update_weight_rec(graph: &mut TreeGraph, id: NodeId) {
    let mut weight = graph.node(id).length;
    for i in 0..graph.node(id).children.len() {
        let child = graph.node(id).children[i].node;
        update_weight_rec(graph, child);
        weight += graph
            .node(child)
            .growth_info
            .as_branch()
            .map(|info| info.cumulated_weight)
            .unwrap_or(0.0);
    }
    if let Some(info) = graph.node_mut(id).growth_info.as_branch_mut() {
        info.cumulated_weight = weight;
    }
}

fn update_positions_rec(graph: &mut TreeGraph, id: NodeId, position: Vec3) {
    if let Some(info) = graph.node_mut(id).growth_info.as_branch_mut() {
        info.position = position;
    }
    for i in 0..graph.node(id).children.len() {
        let child = graph.node(id).children[i];
        let node = graph.node(id);
        let child_position = position + node.direction * node.length * child.position_in_parent;
        update_positions_rec(graph, child.node, child_position);
    }
}

impl BranchFunction {
    fn apply_gravity_rec(&self, graph: &mut TreeGraph, id: NodeId, mut rotation: Quat) {
        let direction = graph.node(id).direction;
        let horizontality = 1.0 - direction.z.abs();

        let mut displacement = 0.0;
        if let Some(info) = graph.node_mut(id).growth_info.as_branch_mut() {
            info.age += 1.0 / self.resolution;
            displacement = horizontality * info.cumulated_weight.sqrt() * self.gravity.strength
                / self.resolution
                / self.resolution
                / 1000.0
                / (1.0 + info.age);
            displacement *=
                (-(info.deviation_from_rest_pose / self.resolution * self.gravity.stiffness).abs())
                    .exp();
            info.deviation_from_rest_pose += displacement;
        }

        if let Some(tangent) = direction.cross(-Vec3::Z).try_normalize() {
            rotation = Quat::from_axis_angle(tangent, displacement) * rotation;
        }
        graph.node_mut(id).direction = (rotation * direction).normalize_or(direction);

        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i].node;
            self.apply_gravity_rec(graph, child, rotation);
        }
    }

    fn apply_gravity_to_branch(&self, graph: &mut TreeGraph, origin: NodeId) {
        propagate_inactive_rec(graph, origin);
        update_weight_rec(graph, origin);
        self.apply_gravity_rec(graph, origin, Quat::IDENTITY);
        let position = graph
            .node(origin)
            .growth_info
            .as_branch()
            .map(|info| info.position)
            .unwrap_or(Vec3::ZERO);
        update_positions_rec(graph, origin, position);
    }

    /// Grow an extremity by one step, appending one or two children.
    fn grow_node_once(
        &self,
        graph: &mut TreeGraph,
        id: NodeId,
        creator_id: u32,
        queue: &mut VecDeque<NodeId>,
        rng: &mut SimpleRng,
    ) {
        if rng.next_float() * self.resolution < self.break_chance {
            mark_inactive(graph, id);
            return;
        }

        let node = graph.node(id);
        let (direction, tangent, node_length, node_radius) =
            (node.direction, node.tangent, node.length, node.radius);
        let Some(info) = node.growth_info.as_branch() else {
            return;
        };
        let (desired_length, origin_radius, position, current_length) = (
            info.desired_length,
            info.origin_radius,
            info.position,
            info.current_length,
        );

        let factor_in_branch = current_length / desired_length;
        let child_radius = lerp(
            origin_radius,
            origin_radius * self.end_radius,
            factor_in_branch,
        );
        let child_length = (1.0 / self.resolution).min(desired_length - current_length);

        let randomness = self.randomness.execute(factor_in_branch, rng);
        let random_dir =
            geometry::random_vec(rng, self.flatness) + Vec3::Z * self.gravity.up_attraction;
        let mut child_direction = direction + random_dir * randomness / self.resolution;
        let should_terminate = avoid_floor(position, &mut child_direction, node_length);
        let child_direction = child_direction.normalize_or(direction);

        if should_terminate {
            mark_inactive(graph, id);
            return;
        }

        let new_length = current_length + child_length;
        let mut child = Node::new(child_direction, tangent, child_length, child_radius, creator_id);
        child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
            desired_length,
            origin_radius,
            position: position + child_direction * child_length,
            current_length: new_length,
            ..Default::default()
        });
        let child_id = graph.add_child(id, child, 1.0);
        if new_length < desired_length {
            queue.push_back(child_id);
        }

        if rng.next_float() * self.resolution < self.split.probability {
            let mut split_direction = geometry::random_vec(rng, 0.0);
            split_direction = split_direction.cross(direction)
                + Vec3::Z * self.gravity.up_attraction * self.flatness;
            let flat_normal = Vec3::Z
                .cross(direction)
                .cross(direction)
                .normalize_or_zero();
            split_direction -= flat_normal * (split_direction.dot(flat_normal) * self.flatness);
            // The termination verdict is intentionally unused here; only
            // the downward attenuation is kept for split directions.
            avoid_floor(position, &mut split_direction, node_length);
            let split_direction = direction
                .lerp(split_direction, self.split.angle / 90.0)
                .normalize_or(direction);

            let split_radius = node_radius * self.split.radius;
            let mut split_child =
                Node::new(split_direction, tangent, child_length, split_radius, creator_id);
            split_child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
                desired_length,
                origin_radius: origin_radius * self.split.radius,
                position: position + split_direction * child_length,
                current_length: new_length,
                ..Default::default()
            });
            let split_id = graph.add_child(id, split_child, rng.next_float());
            if new_length < desired_length {
                queue.push_back(split_id);
            }
        }
    }

    fn grow_origins(
        &self,
        graph: &mut TreeGraph,
        origins: &[NodeId],
        creator_id: u32,
        rng: &mut SimpleRng,
    ) {
        let mut queue: VecDeque<NodeId> = origins.iter().copied().collect();
        let mut batch_size = queue.len();
        while let Some(&next) = queue.front() {
            if batch_size == 0 {
                batch_size = queue.len();
                for &origin in origins {
                    self.apply_gravity_to_branch(graph, origin);
                }
            }
            queue.pop_front();
            self.grow_node_once(graph, next, creator_id, &mut queue, rng);
            batch_size = batch_size.saturating_sub(1);
        }
    }

    /// Create the origins of the branches that will be grown. Origins are
    /// placed on the nodes made by the parent tree function.
    fn create_origins(
        &self,
        graph: &mut TreeGraph,
        ctx: &FunctionContext,
        rng: &mut SimpleRng,
    ) -> Vec<NodeId> {
        let selection = graph.select_branches(ctx.parent_id);
        let mut origins = Vec::new();

        // Resolve the crown envelope; a negative height means "use the
        // trunk length" when branching directly off the trunk.
        let mut effective_crown_height = self.crown.height;
        if effective_crown_height < 0.0 && ctx.parent_id == 0 && !graph.stems.is_empty() {
            effective_crown_height = graph.branch_length(graph.stems[0].root);
        }
        let crown_start_z = effective_crown_height * self.crown.base_size;
        let crown_zone_height = effective_crown_height * (1.0 - self.crown.base_size);

        // Distance between two consecutive origins.
        let origins_dist = 1.0 / (self.distribution.density + 0.001);

        for branch in &selection {
            let Some(first) = branch.first() else {
                continue;
            };
            let branch_total = graph.branch_length(first.id);
            let absolute_start = self.distribution.start * branch_total;
            let absolute_end = self.distribution.end * branch_total;
            let mut current_length = 0.0;
            let mut dist_to_next_origin = absolute_start;
            let mut tangent = geometry::get_orthogonal_vector(graph.node(first.id).direction);

            for placed in branch {
                let node = graph.node(placed.id);
                let (node_direction, node_tangent, node_length, node_radius) =
                    (node.direction, node.tangent, node.length, node.radius);
                if node.is_leaf() {
                    // A child here would continue the branch instead of
                    // starting a split.
                    continue;
                }

                let spin =
                    self.distribution.phillotaxis + (rng.next_float() - 0.5) * 2.0;
                let rot = Quat::from_axis_angle(node_direction, spin.to_radians());

                if dist_to_next_origin > node_length {
                    dist_to_next_origin -= node_length;
                    current_length += node_length;
                    continue;
                }

                let mut remaining_node_length = node_length - dist_to_next_origin;
                current_length += dist_to_next_origin;
                let origins_to_create = (remaining_node_length / origins_dist) as i32 + 1;
                let mut position_in_parent = dist_to_next_origin / node_length;
                let position_in_parent_step = origins_dist / node_length;

                for i in 0..origins_to_create {
                    if current_length > absolute_end {
                        break;
                    }
                    let factor = (current_length - absolute_start)
                        / (absolute_end - absolute_start).max(0.001);
                    tangent = rot * tangent;
                    tangent = geometry::project_on_plane(tangent, node_direction)
                        .normalize_or(node_tangent);

                    let child_radius = node_radius * self.start_radius.execute(factor, rng);
                    let mut branch_length = self.length.execute(factor, rng);
                    let mut effective_start_angle = self.start_angle.execute(factor, rng);

                    let needs_height_calc = crown_zone_height > EPSILON
                        && (self.crown.shape != CrownShape::Cylindrical
                            || self.crown.angle_variation.abs() > EPSILON);
                    if needs_height_calc {
                        let branch_z = (placed.position
                            + node_direction * node_length * position_in_parent)
                            .z;
                        if branch_z >= crown_start_z {
                            // Ratio runs from 1 at the crown base to 0 at
                            // the top, the Weber & Penn convention.
                            let height_ratio = 1.0
                                - ((branch_z - crown_start_z) / crown_zone_height).min(1.0);
                            if self.crown.shape != CrownShape::Cylindrical {
                                branch_length *= shape_ratio(self.crown.shape, height_ratio);
                            }
                            if self.crown.angle_variation.abs() > EPSILON {
                                let conical = shape_ratio(CrownShape::Conical, height_ratio);
                                let angle_offset =
                                    self.crown.angle_variation * (1.0 - 2.0 * conical);
                                effective_start_angle = (effective_start_angle + angle_offset)
                                    .clamp(0.0, 180.0);
                            }
                        }
                    }

                    let child_direction = node_direction
                        .lerp(tangent, effective_start_angle / 90.0)
                        .normalize_or(node_direction);
                    let node_segment_length =
                        branch_length.min(1.0 / (self.resolution + 0.001));
                    let child_position =
                        placed.position + node_direction * node_length * position_in_parent;

                    let mut child = Node::new(
                        child_direction,
                        node_tangent,
                        node_segment_length,
                        child_radius,
                        ctx.id,
                    );
                    child.growth_info = GrowthInfo::Branch(BranchGrowthInfo {
                        desired_length: branch_length - node_segment_length,
                        origin_radius: child_radius,
                        position: child_position,
                        current_length: node_segment_length,
                        ..Default::default()
                    });
                    let child_id = graph.add_child(placed.id, child, position_in_parent);

                    if branch_length - node_segment_length > 1e-3 {
                        origins.push(child_id);
                    }
                    position_in_parent += position_in_parent_step;
                    if i > 0 {
                        current_length += origins_dist;
                    }
                }

                remaining_node_length -= (origins_to_create - 1) as f32 * origins_dist;
                dist_to_next_origin = origins_dist - remaining_node_length;
            }
        }

        origins
    }
}

impl TreeFunction for BranchFunction {
    fn execute(&self, graph: &mut TreeGraph, ctx: &FunctionContext) {
        let mut rng = SimpleRng::new(self.seed.wrapping_add(ctx.seed));
        let origins = self.create_origins(graph, ctx, &mut rng);
        log::debug!("branch function: {} origins", origins.len());
        self.grow_origins(graph, &origins, ctx.id, &mut rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::trunk::TrunkFunction;

    fn grow_tree(branch: &BranchFunction) -> TreeGraph {
        let mut graph = TreeGraph::new();
        TrunkFunction::default().execute(
            &mut graph,
            &FunctionContext {
                id: 0,
                parent_id: 0,
                seed: 0,
            },
        );
        branch.execute(
            &mut graph,
            &FunctionContext {
                id: 1,
                parent_id: 0,
                seed: 1,
            },
        );
        graph
    }

    #[test]
    fn test_branches_are_created() {
        let graph = grow_tree(&BranchFunction::default());
        let branches = graph.select_branches(1);
        assert!(!branches.is_empty());
    }

    #[test]
    fn test_origins_respect_distribution_window() {
        let branch = BranchFunction {
            distribution: DistributionParams {
                start: 0.4,
                end: 0.8,
                ..Default::default()
            },
            ..Default::default()
        };
        let graph = grow_tree(&branch);

        let trunk_length = graph.branch_length(graph.stems[0].root);
        // Collect attachment heights of branch origins (children of trunk
        // nodes created by function 1).
        let branches = graph.select_branches(1);
        assert!(!branches.is_empty());
        for b in &branches {
            let z = b[0].position.z;
            assert!(z > 0.3 * trunk_length, "origin at z={z} below window");
            assert!(z < 0.9 * trunk_length, "origin at z={z} above window");
        }
    }

    #[test]
    fn test_branch_deterministic() {
        let branch = BranchFunction::default();
        let a = grow_tree(&branch);
        let b = grow_tree(&branch);
        assert_eq!(a.node_count(), b.node_count());
        for id in 0..a.node_count() {
            assert!((a.node(id).direction - b.node(id).direction).length() < 1e-12);
        }
    }

    #[test]
    fn test_avoid_floor_attenuates_downward() {
        let mut direction = Vec3::new(0.5, 0.0, -0.5);
        let stop = avoid_floor(Vec3::new(0.0, 0.0, 4.0), &mut direction, 0.3);
        assert!(!stop);
        assert!(direction.z > -0.5);
    }

    #[test]
    fn test_avoid_floor_terminates_diving_branches() {
        let mut direction = Vec3::new(0.0, 0.0, -1.0);
        let stop = avoid_floor(Vec3::new(0.0, 0.0, -2.0), &mut direction, 1.0);
        assert!(stop);
    }

    #[test]
    fn test_conical_crown_shortens_top_branches() {
        let make = |shape| BranchFunction {
            crown: CrownParams {
                shape,
                base_size: 0.2,
                height: -1.0,
                angle_variation: 0.0,
            },
            split: SplitParams {
                probability: 0.0,
                ..Default::default()
            },
            break_chance: 0.0,
            ..Default::default()
        };

        let conical = grow_tree(&make(CrownShape::Conical));
        let cylindrical = grow_tree(&make(CrownShape::Cylindrical));

        let max_branch_length = |graph: &TreeGraph| -> f32 {
            graph
                .select_branches(1)
                .iter()
                .map(|b| graph.branch_length(b[0].id))
                .fold(0.0, f32::max)
        };
        // Top-of-crown conical branches are scaled well below the
        // cylindrical envelope.
        assert!(max_branch_length(&conical) <= max_branch_length(&cylindrical) + 1e-3);
    }
}
