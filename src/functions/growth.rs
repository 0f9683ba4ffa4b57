//! Growth function
//!
//! Multi-iteration growth simulation. Each iteration distributes a target
//! light flux through the tree (apical dominance steering vigor toward
//! leading tips), then applies growth rules per node: dormant lateral buds
//! wake above an activation threshold, starved meristems are cut or turn
//! into flowers, vigorous meristems extend and split, and woody nodes
//! thicken with age. A physics pass updates positions, weights and gravity
//! bending after every iteration.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::geometry;
use crate::math::SimpleRng;
use crate::tree::{
    BioNodeInfo, FunctionContext, GrowthInfo, Node, NodeId, NodeType, TreeFunction, TreeGraph,
};

/// Fixed energy request of a dormant bud.
const DORMANT_ENERGY_REQUEST: f32 = 0.3;
/// Fraction of non-dominated parent vigor handed to dormant buds.
const DORMANT_VIGOR_FACTOR: f32 = 0.3;
const VIGOR_EPSILON: f32 = 0.001;
/// Adjustment applied to the working cut threshold per iteration.
const THRESHOLD_STEP: f32 = 0.1;
const GRAVITY_ANGLE_MULTIPLIER: f32 = 50.0;
/// Radius taper of extension children.
const EXTENSION_TAPER: f32 = 0.85;
/// Radius taper of split children.
const SPLIT_TAPER: f32 = 0.9;
/// Radius of a lateral bud relative to its parent.
const LATERAL_RADIUS_RATIO: f32 = 0.5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrowthFunction {
    pub seed: u64,
    /// Growth iterations; one iteration is roughly a year of growth.
    pub iterations: u32,
    /// When in [0, iterations), run only that many iterations.
    pub preview_iteration: i32,
    /// Fraction of vigor captured by the leading child (0-1).
    pub apical_dominance: f32,
    /// Vigor above which a meristem extends.
    pub grow_threshold: f32,
    /// Vigor above which a meristem splits.
    pub split_threshold: f32,
    /// Vigor below which a meristem is cut.
    pub cut_threshold: f32,
    /// Angle between split branches (degrees).
    pub split_angle: f32,
    /// Length of newly grown segments.
    pub branch_length: f32,
    /// Tendency of new growth toward vertical.
    pub gravitropism: f32,
    pub randomness: f32,
    pub gravity_strength: f32,
    /// Spiral angle between lateral emissions (radians).
    pub philotaxis_angle: f32,
    /// Vigor below which a meristem flowers instead of growing.
    pub flower_threshold: f32,
    pub enable_flowering: bool,
    pub enable_lateral_branching: bool,
    /// Start of the bud zone along the parent (0-1).
    pub lateral_start: f32,
    /// End of the bud zone along the parent (0-1).
    pub lateral_end: f32,
    /// Potential bud points per unit length.
    pub lateral_density: f32,
    /// Vigor threshold waking a dormant bud.
    pub lateral_activation: f32,
    /// Initial bud angle from the parent direction (degrees).
    pub lateral_angle: f32,
}

impl Default for GrowthFunction {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: 5,
            preview_iteration: -1,
            apical_dominance: 0.7,
            grow_threshold: 0.5,
            split_threshold: 0.7,
            cut_threshold: 0.2,
            split_angle: 60.0,
            branch_length: 1.0,
            gravitropism: 0.1,
            randomness: 0.1,
            gravity_strength: 1.0,
            philotaxis_angle: 2.399,
            flower_threshold: 0.5,
            enable_flowering: false,
            enable_lateral_branching: true,
            lateral_start: 0.1,
            lateral_end: 0.9,
            lateral_density: 2.0,
            lateral_activation: 0.4,
            lateral_angle: 45.0,
        }
    }
}

fn setup_growth_information_rec(graph: &mut TreeGraph, id: NodeId, suppress_tip_growth: bool) {
    // With lateral branching the tips stay Ignored so dormant buds become
    // the primary branch source instead of a bushy crown of tip growth.
    let tip_type = if suppress_tip_growth {
        NodeType::Ignored
    } else {
        NodeType::Meristem
    };
    let node_type = if graph.node(id).is_leaf() {
        tip_type
    } else {
        NodeType::Ignored
    };
    graph.node_mut(id).growth_info = GrowthInfo::Bio(BioNodeInfo::new(node_type, 0, 0.0, false));
    for i in 0..graph.node(id).children.len() {
        let child = graph.node(id).children[i].node;
        setup_growth_information_rec(graph, child, suppress_tip_growth);
    }
}

impl GrowthFunction {
    /// Plant dormant buds along the continuation chain of Ignored nodes.
    fn create_lateral_buds_rec(
        &self,
        graph: &mut TreeGraph,
        id: NodeId,
        creator_id: u32,
        dist_to_next: &mut f32,
        current_length: &mut f32,
        total_length: f32,
        philo: &mut f32,
    ) {
        let node = graph.node(id);
        let (node_direction, node_tangent, node_length, node_radius) =
            (node.direction, node.tangent, node.length, node.radius);
        let is_ignored = node
            .growth_info
            .as_bio()
            .map(|info| info.node_type == NodeType::Ignored)
            .unwrap_or(false);

        if is_ignored && !node.is_leaf() {
            let absolute_start = self.lateral_start * total_length;
            let absolute_end = self.lateral_end * total_length;
            let bud_spacing = 1.0 / (self.lateral_density + VIGOR_EPSILON);

            if *current_length + node_length >= absolute_start && *current_length < absolute_end {
                let mut remaining = node_length;
                let mut pos_in_node = 0.0;

                // Skip to the start of the bud zone if needed.
                if *current_length < absolute_start {
                    let skip = absolute_start - *current_length;
                    remaining -= skip;
                    pos_in_node = skip;
                    *dist_to_next = 0.0;
                }

                while remaining > *dist_to_next && *current_length + pos_in_node < absolute_end {
                    pos_in_node += *dist_to_next;
                    remaining -= *dist_to_next;

                    *philo += self.philotaxis_angle;
                    let tangent = Vec3::new(philo.cos(), philo.sin(), 0.0);
                    let tangent = geometry::get_look_at_rot(node_direction) * tangent;
                    let bud_direction = node_direction
                        .lerp(tangent, self.lateral_angle / 90.0)
                        .normalize_or(node_direction);

                    let position_in_parent = pos_in_node / node_length;
                    let mut bud = Node::new(
                        bud_direction,
                        node_tangent,
                        self.branch_length * 0.5,
                        node_radius * LATERAL_RADIUS_RATIO,
                        creator_id,
                    );
                    bud.growth_info =
                        GrowthInfo::Bio(BioNodeInfo::new(NodeType::Dormant, 0, *philo, true));
                    graph.add_child(id, bud, position_in_parent);

                    *dist_to_next = bud_spacing;
                }

                *dist_to_next -= remaining;
            } else if *current_length + node_length < absolute_start {
                *dist_to_next = (absolute_start - (*current_length + node_length)).max(0.0);
            }
        }

        *current_length += node_length;

        // Buds only line the main continuation chain.
        if let Some(child) = graph.node(id).children.first() {
            let child = child.node;
            self.create_lateral_buds_rec(
                graph,
                child,
                creator_id,
                dist_to_next,
                current_length,
                total_length,
                philo,
            );
        }
    }

    /// Total light flux of the subtree, assigning each node the relative
    /// share of energy it receives.
    fn update_vigor_ratio_rec(&self, graph: &mut TreeGraph, id: NodeId) -> f32 {
        let node_type = match graph.node(id).growth_info.as_bio() {
            Some(info) => info.node_type,
            None => return 0.0,
        };
        match node_type {
            NodeType::Meristem => 1.0,
            NodeType::Dormant => {
                if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                    info.vigor_ratio = DORMANT_ENERGY_REQUEST;
                }
                DORMANT_ENERGY_REQUEST
            }
            NodeType::Branch | NodeType::Ignored => {
                // Tips left Ignored do not contribute energy.
                if graph.node(id).is_leaf() {
                    if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                        info.vigor_ratio = 0.0;
                    }
                    return 0.0;
                }

                let leader = graph.node(id).children[0].node;
                let mut light_flux = self.update_vigor_ratio_rec(graph, leader);
                let mut leader_ratio = 1.0;
                for i in 1..graph.node(id).children.len() {
                    let child = graph.node(id).children[i].node;
                    let child_flux = self.update_vigor_ratio_rec(graph, child);
                    let t = self.apical_dominance;
                    let r = (t * light_flux)
                        / (t * light_flux + (1.0 - t) * child_flux + VIGOR_EPSILON);
                    leader_ratio *= r;
                    if let Some(info) = graph.node_mut(child).growth_info.as_bio_mut() {
                        info.vigor_ratio = 1.0 - r;
                    }
                    light_flux += child_flux;
                }
                if let Some(info) = graph.node_mut(leader).growth_info.as_bio_mut() {
                    info.vigor_ratio = leader_ratio;
                }
                light_flux
            }
            NodeType::Cut | NodeType::Flower => {
                if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                    info.vigor_ratio = 0.0;
                }
                0.0
            }
        }
    }

    /// Distribute the available energy down the tree.
    fn update_vigor_rec(&self, graph: &mut TreeGraph, id: NodeId, vigor: f32) {
        if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
            info.vigor = vigor;
        }
        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i].node;
            let (ratio, node_type) = match graph.node(child).growth_info.as_bio() {
                Some(info) => (info.vigor_ratio, info.node_type),
                None => continue,
            };
            // Dormant buds bypass competitive distribution and receive a
            // fixed share of the parent's non-dominated vigor.
            let child_vigor = if node_type == NodeType::Dormant {
                vigor * (1.0 - self.apical_dominance) * DORMANT_VIGOR_FACTOR
            } else {
                ratio * vigor
            };
            self.update_vigor_rec(graph, child, child_vigor);
        }
    }

    /// Apply the growth rules to a node based on its available energy.
    fn simulate_growth_rec(
        &self,
        graph: &mut TreeGraph,
        id: NodeId,
        creator_id: u32,
        cut_threshold: f32,
        rng: &mut SimpleRng,
    ) {
        let (node_type, vigor) = match graph.node(id).growth_info.as_bio() {
            Some(info) => (info.node_type, info.vigor),
            None => return,
        };

        let activate_dormant =
            node_type == NodeType::Dormant && vigor > self.lateral_activation;
        if activate_dormant {
            let node = graph.node_mut(id);
            node.length = self.branch_length * (vigor + 0.1);
            if let Some(info) = node.growth_info.as_bio_mut() {
                info.node_type = NodeType::Meristem;
            }
        }
        let node_type = if activate_dormant {
            NodeType::Meristem
        } else {
            node_type
        };

        // Newly woken buds always grow, skipping the grow threshold.
        let primary_growth = node_type == NodeType::Meristem
            && (activate_dormant || vigor > self.grow_threshold);
        let secondary_growth = vigor > self.grow_threshold
            && node_type != NodeType::Ignored
            && node_type != NodeType::Dormant;
        let split = node_type == NodeType::Meristem && vigor > self.split_threshold;
        let cut = node_type == NodeType::Meristem && vigor < cut_threshold;
        let become_flower = self.enable_flowering
            && node_type == NodeType::Meristem
            && vigor < self.flower_threshold
            && vigor >= cut_threshold;

        // Children appended below must not grow during this step.
        let child_count = graph.node(id).children.len();

        if cut {
            if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                info.node_type = NodeType::Cut;
            }
            return;
        }
        if become_flower {
            if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                info.node_type = NodeType::Flower;
            }
            return;
        }

        let mut age = 0;
        if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
            info.age += 1;
            age = info.age;
        }
        if secondary_growth {
            graph.node_mut(id).radius = (1.0 - (-(age as f32) * 0.01).exp() + 0.01) * 0.5;
        }

        if primary_growth {
            let node = graph.node(id);
            let (direction, tangent, radius) = (node.direction, node.tangent, node.radius);
            let philotaxis = node
                .growth_info
                .as_bio()
                .map(|info| info.philotaxis_angle)
                .unwrap_or(0.0);
            let child_direction = (direction
                + Vec3::Z * self.gravitropism
                + geometry::random_vec(rng, 0.0) * self.randomness)
                .normalize_or(direction);
            let child_angle = if split {
                philotaxis + self.philotaxis_angle
            } else {
                philotaxis
            };
            let mut child = Node::new(
                child_direction,
                tangent,
                self.branch_length,
                radius * EXTENSION_TAPER,
                creator_id,
            );
            child.growth_info =
                GrowthInfo::Bio(BioNodeInfo::new(NodeType::Meristem, 0, child_angle, false));
            graph.add_child(id, child, 1.0);
            if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                info.node_type = NodeType::Branch;
            }
        }

        if split {
            let philotaxis = {
                let info = graph.node_mut(id).growth_info.as_bio_mut();
                match info {
                    Some(info) => {
                        info.philotaxis_angle += self.philotaxis_angle;
                        info.philotaxis_angle
                    }
                    None => 0.0,
                }
            };
            let node = graph.node(id);
            let (direction, node_tangent, radius) = (node.direction, node.tangent, node.radius);
            let tangent = Vec3::new(philotaxis.cos(), philotaxis.sin(), 0.0);
            let tangent = geometry::get_look_at_rot(direction) * tangent;
            let child_direction = direction
                .lerp(tangent, self.split_angle / 90.0)
                .normalize_or(direction);
            let mut child = Node::new(
                child_direction,
                node_tangent,
                self.branch_length,
                radius * SPLIT_TAPER,
                creator_id,
            );
            child.growth_info =
                GrowthInfo::Bio(BioNodeInfo::new(NodeType::Meristem, 0, 0.0, false));
            graph.add_child(id, child, 1.0);
            if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
                info.node_type = NodeType::Branch;
            }
        }

        for i in 0..child_count {
            let child = graph.node(id).children[i].node;
            self.simulate_growth_rec(graph, child, creator_id, cut_threshold, rng);
        }
    }

    fn update_absolute_position_rec(&self, graph: &mut TreeGraph, id: NodeId, position: Vec3) {
        if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
            info.absolute_position = position;
        }
        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i];
            let node = graph.node(id);
            let child_position =
                position + node.direction * child.position_in_parent * node.length;
            self.update_absolute_position_rec(graph, child.node, child_position);
        }
    }

    /// Post-order pass computing branch weight and center of mass, using
    /// segment weight length * radius^2.
    fn get_weight_rec(&self, graph: &mut TreeGraph, id: NodeId) {
        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i].node;
            self.get_weight_rec(graph, child);
        }

        let node = graph.node(id);
        let segment_weight = node.length * node.radius * node.radius;
        let absolute_position = node
            .growth_info
            .as_bio()
            .map(|info| info.absolute_position)
            .unwrap_or(Vec3::ZERO);
        let mut center_of_mass =
            (absolute_position + node.direction * node.length / 2.0) * segment_weight;
        let mut total_weight = segment_weight;
        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i].node;
            if let Some(child_info) = graph.node(child).growth_info.as_bio() {
                center_of_mass += child_info.center_of_mass * child_info.branch_weight;
                total_weight += child_info.branch_weight;
            }
        }
        center_of_mass /= total_weight.max(VIGOR_EPSILON);

        if let Some(info) = graph.node_mut(id).growth_info.as_bio_mut() {
            info.center_of_mass = center_of_mass;
            info.branch_weight = total_weight;
        }
    }

    fn apply_gravity_rec(&self, graph: &mut TreeGraph, id: NodeId, mut rotation: Quat) {
        let direction = graph.node(id).direction;
        if let Some(info) = graph.node(id).growth_info.as_bio() {
            // The pre-existing trunk structure does not bend.
            if info.node_type != NodeType::Ignored {
                let mut offset = info.center_of_mass - info.absolute_position;
                offset.z = 0.0;
                let lever_arm = offset.length();
                let torque = info.branch_weight * lever_arm;
                let bendiness = (-(info.age as f32 / 2.0 + info.vigor)).exp();
                let angle =
                    torque * bendiness * self.gravity_strength * GRAVITY_ANGLE_MULTIPLIER;
                if let Some(tangent) = direction.cross(-Vec3::Z).try_normalize() {
                    rotation *= Quat::from_axis_angle(tangent, angle);
                }
                graph.node_mut(id).direction = (rotation * direction).normalize_or(direction);
            }
        }

        for i in 0..graph.node(id).children.len() {
            let child = graph.node(id).children[i].node;
            self.apply_gravity_rec(graph, child, rotation);
        }
    }
}

impl TreeFunction for GrowthFunction {
    fn execute(&self, graph: &mut TreeGraph, ctx: &FunctionContext) {
        let mut rng = SimpleRng::new(self.seed.wrapping_add(ctx.seed));

        let stems: Vec<_> = graph.stems.clone();
        for stem in &stems {
            setup_growth_information_rec(graph, stem.root, self.enable_lateral_branching);
        }

        if self.enable_lateral_branching {
            for stem in &stems {
                let total_length = graph.branch_length(stem.root);
                let mut dist_to_next = self.lateral_start * total_length;
                let mut current_length = 0.0;
                let mut philo = 0.0;
                self.create_lateral_buds_rec(
                    graph,
                    stem.root,
                    ctx.id,
                    &mut dist_to_next,
                    &mut current_length,
                    total_length,
                    &mut philo,
                );
            }
        }

        let effective_iterations =
            if self.preview_iteration >= 0 && (self.preview_iteration as u32) < self.iterations {
                self.preview_iteration as u32
            } else {
                self.iterations
            };

        // The working threshold drifts with the flux mismatch but is reset
        // here so identical parameters always reproduce the same tree.
        let mut cut_threshold = self.cut_threshold;

        for i in 0..effective_iterations {
            // Energy is not shared between stems.
            for stem in &stems {
                let target_light_flux = 1.0 + (i as f32).powf(1.5);
                let light_flux = self.update_vigor_ratio_rec(graph, stem.root);

                if target_light_flux > light_flux {
                    cut_threshold -= THRESHOLD_STEP;
                } else if target_light_flux < light_flux {
                    cut_threshold += THRESHOLD_STEP;
                }

                self.update_vigor_rec(graph, stem.root, target_light_flux);
                self.simulate_growth_rec(graph, stem.root, ctx.id, cut_threshold, &mut rng);
                self.update_absolute_position_rec(graph, stem.root, stem.position);
                self.get_weight_rec(graph, stem.root);
                self.apply_gravity_rec(graph, stem.root, Quat::IDENTITY);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::trunk::TrunkFunction;

    fn trunk_graph() -> TreeGraph {
        let mut graph = TreeGraph::new();
        TrunkFunction::default().execute(
            &mut graph,
            &FunctionContext {
                id: 0,
                parent_id: 0,
                seed: 0,
            },
        );
        graph
    }

    fn run_growth(growth: &GrowthFunction) -> TreeGraph {
        let mut graph = trunk_graph();
        growth.execute(
            &mut graph,
            &FunctionContext {
                id: 1,
                parent_id: 0,
                seed: 1,
            },
        );
        graph
    }

    fn count_types(graph: &TreeGraph) -> Vec<(NodeType, usize)> {
        let mut counts: Vec<(NodeType, usize)> = Vec::new();
        for id in 0..graph.node_count() {
            if let Some(info) = graph.node(id).growth_info.as_bio() {
                match counts.iter_mut().find(|(t, _)| *t == info.node_type) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((info.node_type, 1)),
                }
            }
        }
        counts
    }

    fn count_of(graph: &TreeGraph, node_type: NodeType) -> usize {
        count_types(graph)
            .iter()
            .find(|(t, _)| *t == node_type)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }

    #[test]
    fn test_tip_is_meristem_without_lateral() {
        let growth = GrowthFunction {
            iterations: 0,
            enable_lateral_branching: false,
            ..Default::default()
        };
        let graph = run_growth(&growth);
        assert_eq!(count_of(&graph, NodeType::Meristem), 1);
    }

    #[test]
    fn test_lateral_prepass_plants_dormant_buds() {
        let growth = GrowthFunction {
            iterations: 0,
            ..Default::default()
        };
        let graph = run_growth(&growth);
        let dormant = count_of(&graph, NodeType::Dormant);
        assert!(dormant > 5, "expected dormant buds, got {dormant}");
        // Buds are flagged as lateral and tips stay ignored.
        assert_eq!(count_of(&graph, NodeType::Meristem), 0);
        for id in 0..graph.node_count() {
            if let Some(info) = graph.node(id).growth_info.as_bio() {
                if info.node_type == NodeType::Dormant {
                    assert!(info.is_lateral);
                }
            }
        }
    }

    #[test]
    fn test_meristem_extends_without_lateral() {
        let growth = GrowthFunction {
            iterations: 3,
            enable_lateral_branching: false,
            ..Default::default()
        };
        let mut graph = trunk_graph();
        let before = graph.node_count();
        growth.execute(
            &mut graph,
            &FunctionContext {
                id: 1,
                parent_id: 0,
                seed: 1,
            },
        );
        assert!(graph.node_count() > before);
        assert!(count_of(&graph, NodeType::Branch) > 0);
    }

    #[test]
    fn test_dormant_buds_activate() {
        let growth = GrowthFunction {
            iterations: 4,
            apical_dominance: 0.7,
            lateral_activation: 0.35,
            ..Default::default()
        };
        let graph = run_growth(&growth);
        let woken = (0..graph.node_count()).any(|id| {
            graph
                .node(id)
                .growth_info
                .as_bio()
                .map(|info| info.is_lateral && info.node_type != NodeType::Dormant)
                .unwrap_or(false)
        });
        assert!(woken, "no dormant bud activated");
        // Not every bud should wake up.
        assert!(count_of(&graph, NodeType::Dormant) > 0);
    }

    #[test]
    fn test_preview_iteration_truncates() {
        let full = run_growth(&GrowthFunction {
            iterations: 5,
            enable_lateral_branching: false,
            ..Default::default()
        });
        let preview = run_growth(&GrowthFunction {
            iterations: 5,
            preview_iteration: 1,
            enable_lateral_branching: false,
            ..Default::default()
        });
        assert!(preview.node_count() < full.node_count());
    }

    #[test]
    fn test_growth_deterministic() {
        let growth = GrowthFunction::default();
        let a = run_growth(&growth);
        let b = run_growth(&growth);
        assert_eq!(a.node_count(), b.node_count());
        for id in 0..a.node_count() {
            assert_eq!(a.node(id).direction, b.node(id).direction);
            assert_eq!(a.node(id).radius, b.node(id).radius);
        }
    }

    #[test]
    fn test_user_cut_threshold_not_mutated() {
        let growth = GrowthFunction::default();
        let before = growth.cut_threshold;
        let _ = run_growth(&growth);
        assert_eq!(growth.cut_threshold, before);
    }

    #[test]
    fn test_flowering_produces_flowers() {
        let growth = GrowthFunction {
            iterations: 4,
            enable_lateral_branching: false,
            enable_flowering: true,
            flower_threshold: 2.0,
            cut_threshold: -10.0,
            ..Default::default()
        };
        let graph = run_growth(&growth);
        assert!(count_of(&graph, NodeType::Flower) > 0);
    }
}
