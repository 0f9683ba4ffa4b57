//! Manifold tree mesher
//!
//! Converts the skeleton graph into a closed radial mesh. Each branch
//! chain is swept with cross-section rings under a parallel-transported
//! frame (no twist), child branches start from a ring interpolated out of
//! the two parent rings around their attachment point, and tips and stem
//! bases are capped. A weighted Laplacian pass relaxes the surface while
//! keeping branch bases crisp.
//!
//! Per-vertex attributes carry everything a wind shader needs: radius,
//! direction, a per-section phyllotaxis angle, and the Pivot-Painter set
//! (stem id, hierarchy depth, pivot position, branch extent).

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;
use crate::tree::{NodeId, TreeGraph};

/// Golden angle in radians, stepped once per cross-section.
const GOLDEN_ANGLE: f32 = 2.399_963_2;

/// Laplacian weight at branch-base rings; kept low so joints hold their
/// shape through smoothing.
const BASE_RING_SMOOTH: f32 = 0.2;

/// Names of the per-vertex attributes written by the mesher.
pub mod attributes {
    pub const SMOOTH_AMOUNT: &str = "smooth_amount";
    pub const RADIUS: &str = "radius";
    pub const DIRECTION: &str = "direction";
    pub const PHYLLOTAXIS_ANGLE: &str = "phyllotaxis_angle";
    // Pivot Painter attributes
    pub const STEM_ID: &str = "stem_id";
    pub const HIERARCHY_DEPTH: &str = "hierarchy_depth";
    pub const PIVOT_POSITION: &str = "pivot_position";
    pub const BRANCH_EXTENT: &str = "branch_extent";
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ManifoldMesher {
    /// Vertices per cross-section ring.
    pub radial_resolution: usize,
    /// Rounds of weighted Laplacian relaxation.
    pub smooth_iterations: usize,
}

impl Default for ManifoldMesher {
    fn default() -> Self {
        Self {
            radial_resolution: 8,
            smooth_iterations: 4,
        }
    }
}

/// Per-vertex data accumulated while sweeping chains.
#[derive(Default)]
struct MeshBuild {
    vertices: Vec<Vec3>,
    polygons: Vec<[u32; 4]>,
    uvs: Vec<Vec2>,
    smooth_amount: Vec<f32>,
    radius: Vec<f32>,
    direction: Vec<Vec3>,
    phyllotaxis: Vec<f32>,
    stem_id: Vec<f32>,
    hierarchy_depth: Vec<f32>,
    pivot_position: Vec<Vec3>,
    branch_extent: Vec<f32>,
    section_index: usize,
    next_stem_id: u32,
}

/// Constant per-chain vertex data.
#[derive(Clone, Copy)]
struct ChainInfo {
    stem_id: f32,
    depth: f32,
    pivot: Vec3,
    extent: f32,
}

struct RingSample {
    center_radius: f32,
    direction: Vec3,
    smooth: f32,
    arc: f32,
}

impl MeshBuild {
    fn push_vertex(&mut self, position: Vec3, uv: Vec2, sample: &RingSample, chain: &ChainInfo) {
        self.vertices.push(position);
        self.uvs.push(uv);
        self.smooth_amount.push(sample.smooth);
        self.radius.push(sample.center_radius);
        self.direction.push(sample.direction);
        self.phyllotaxis
            .push((self.section_index as f32 * GOLDEN_ANGLE).rem_euclid(std::f32::consts::TAU));
        self.stem_id.push(chain.stem_id);
        self.hierarchy_depth.push(chain.depth);
        self.pivot_position.push(chain.pivot);
        self.branch_extent.push(chain.extent);
    }

    /// Emit one ring of `radial` vertices and advance the section counter.
    fn push_ring(
        &mut self,
        positions: &[Vec3],
        sample: &RingSample,
        chain: &ChainInfo,
    ) -> Vec<u32> {
        let base = self.vertices.len() as u32;
        let count = positions.len();
        for (k, &position) in positions.iter().enumerate() {
            let uv = Vec2::new(k as f32 / count as f32, sample.arc);
            self.push_vertex(position, uv, sample, chain);
        }
        self.section_index += 1;
        (base..base + count as u32).collect()
    }

    fn bridge_rings(&mut self, lower: &[u32], upper: &[u32]) {
        let count = lower.len();
        for k in 0..count {
            let next = (k + 1) % count;
            self.polygons
                .push([lower[k], lower[next], upper[next], upper[k]]);
        }
    }

    /// Triangle fan closing a ring onto a center vertex. `flip` reverses
    /// the winding for downward-facing caps.
    fn cap_ring(&mut self, ring: &[u32], center: u32, flip: bool) {
        let count = ring.len();
        for k in 0..count {
            let next = (k + 1) % count;
            if flip {
                self.polygons.push([ring[next], ring[k], center, center]);
            } else {
                self.polygons.push([ring[k], ring[next], center, center]);
            }
        }
    }
}

impl ManifoldMesher {
    /// Convert the skeleton into a mesh. The graph is read immutably; an
    /// empty graph yields an empty mesh.
    pub fn mesh_tree(&self, graph: &TreeGraph) -> Mesh {
        let radial = self.radial_resolution.max(3);
        let mut build = MeshBuild::default();

        for stem in &graph.stems {
            self.mesh_chain(graph, &mut build, stem.root, stem.position, None, 0, radial);
        }

        self.smooth(&mut build);

        let mut mesh = Mesh::new();
        mesh.vertices = build.vertices;
        mesh.uvs = build.uvs;
        mesh.uv_loops = build.polygons.clone();
        mesh.polygons = build.polygons;
        *mesh.add_float_attribute(attributes::SMOOTH_AMOUNT) = build.smooth_amount;
        *mesh.add_float_attribute(attributes::RADIUS) = build.radius;
        *mesh.add_vector_attribute(attributes::DIRECTION) = build.direction;
        *mesh.add_float_attribute(attributes::PHYLLOTAXIS_ANGLE) = build.phyllotaxis;
        *mesh.add_float_attribute(attributes::STEM_ID) = build.stem_id;
        *mesh.add_float_attribute(attributes::HIERARCHY_DEPTH) = build.hierarchy_depth;
        *mesh.add_vector_attribute(attributes::PIVOT_POSITION) = build.pivot_position;
        *mesh.add_float_attribute(attributes::BRANCH_EXTENT) = build.branch_extent;

        log::debug!(
            "meshed tree: {} vertices, {} polygons",
            mesh.vertices.len(),
            mesh.polygons.len()
        );
        mesh
    }

    /// Sweep one branch chain (continuation children) into a tube, then
    /// recurse into attached child branches.
    #[allow(clippy::too_many_arguments)]
    fn mesh_chain(
        &self,
        graph: &TreeGraph,
        build: &mut MeshBuild,
        start: NodeId,
        base_position: Vec3,
        base_ring: Option<Vec<Vec3>>,
        depth: u32,
        radial: usize,
    ) {
        // Collect the chain and its node base positions.
        let mut chain = Vec::new();
        let mut positions = Vec::new();
        let mut position = base_position;
        let mut current = start;
        loop {
            let node = graph.node(current);
            chain.push(current);
            positions.push(position);
            position += node.direction * node.length;
            match node.children.first() {
                Some(child) => current = child.node,
                None => break,
            }
        }
        let end_position = position;
        let extent: f32 = chain.iter().map(|&id| graph.node(id).length).sum();

        let chain_info = ChainInfo {
            stem_id: build.next_stem_id as f32,
            depth: depth as f32,
            pivot: base_position,
            extent,
        };
        build.next_stem_id += 1;

        // Parallel transport: carry the first node's frame along the
        // chain, rotating by the minimal arc between directions. Gravity
        // passes rotate directions without touching tangents, so the
        // frame is re-orthogonalized here.
        let first = graph.node(chain[0]);
        let mut tangent = crate::math::geometry::project_on_plane(first.tangent, first.direction)
            .try_normalize()
            .unwrap_or_else(|| crate::math::geometry::get_orthogonal_vector(first.direction));
        let mut binormal = first.direction.cross(tangent).normalize_or(Vec3::Y);
        let mut frames = Vec::with_capacity(chain.len());
        let mut prev_direction = first.direction;
        for &id in &chain {
            let direction = graph.node(id).direction;
            let transport = Quat::from_rotation_arc(prev_direction, direction);
            tangent = (transport * tangent).normalize_or(tangent);
            binormal = (transport * binormal).normalize_or(binormal);
            frames.push((direction, tangent, binormal));
            prev_direction = direction;
        }

        // Emit rings: one per node base plus one at the chain end.
        let mut rings: Vec<Vec<u32>> = Vec::with_capacity(chain.len() + 1);
        let mut ring_positions: Vec<Vec<Vec3>> = Vec::with_capacity(chain.len() + 1);
        let mut arc = 0.0;

        for (i, &id) in chain.iter().enumerate() {
            let node = graph.node(id);
            let (direction, tangent, binormal) = frames[i];
            let is_base = i == 0;

            let ring_pos: Vec<Vec3> = match (&base_ring, is_base) {
                (Some(ring), true) => ring.clone(),
                _ => Self::circle(positions[i], tangent, binormal, node.radius, radial),
            };
            let sample = RingSample {
                center_radius: node.radius,
                direction,
                smooth: if is_base { BASE_RING_SMOOTH } else { 1.0 },
                arc,
            };
            rings.push(build.push_ring(&ring_pos, &sample, &chain_info));
            ring_positions.push(ring_pos);
            arc += node.length;
        }

        // End ring at the chain tip.
        let last = graph.node(chain[chain.len() - 1]);
        let (direction, tangent, binormal) = frames[frames.len() - 1];
        let end_ring_pos = Self::circle(end_position, tangent, binormal, last.radius, radial);
        let end_sample = RingSample {
            center_radius: last.radius,
            direction,
            smooth: 1.0,
            arc,
        };
        rings.push(build.push_ring(&end_ring_pos, &end_sample, &chain_info));
        ring_positions.push(end_ring_pos);

        for window in rings.windows(2) {
            build.bridge_rings(&window[0], &window[1]);
        }

        // Cap the stem base; child branch bases are sealed against their
        // parent ring instead.
        if depth == 0 && base_ring.is_none() {
            let cap_sample = RingSample {
                center_radius: graph.node(chain[0]).radius,
                direction: frames[0].0,
                smooth: BASE_RING_SMOOTH,
                arc: 0.0,
            };
            let center = build.vertices.len() as u32;
            build.section_index = build.section_index.saturating_sub(1);
            build.push_vertex(base_position, Vec2::new(0.5, 0.0), &cap_sample, &chain_info);
            build.section_index += 1;
            build.cap_ring(&rings[0], center, true);
        }

        // Cap the tip.
        let tip_sample = RingSample {
            center_radius: last.radius,
            direction,
            smooth: 1.0,
            arc,
        };
        let tip = build.vertices.len() as u32;
        build.section_index = build.section_index.saturating_sub(1);
        build.push_vertex(end_position, Vec2::new(0.5, arc), &tip_sample, &chain_info);
        build.section_index += 1;
        build.cap_ring(&rings[rings.len() - 1], tip, false);

        // Recurse into child branches, welding their base ring to an
        // interpolation of the two parent rings around the attachment.
        for (i, &id) in chain.iter().enumerate() {
            let node = graph.node(id);
            for child in node.children.iter().skip(1) {
                let t = child.position_in_parent.clamp(0.0, 1.0);
                let attach = positions[i] + node.direction * node.length * t;
                let child_base: Vec<Vec3> = ring_positions[i]
                    .iter()
                    .zip(&ring_positions[i + 1])
                    .map(|(&a, &b)| a.lerp(b, t))
                    .collect();
                self.mesh_chain(
                    graph,
                    build,
                    child.node,
                    attach,
                    Some(child_base),
                    depth + 1,
                    radial,
                );
            }
        }
    }

    fn circle(
        center: Vec3,
        tangent: Vec3,
        binormal: Vec3,
        radius: f32,
        radial: usize,
    ) -> Vec<Vec3> {
        (0..radial)
            .map(|k| {
                let angle = std::f32::consts::TAU * k as f32 / radial as f32;
                center + (tangent * angle.cos() + binormal * angle.sin()) * radius
            })
            .collect()
    }

    /// Weighted Laplacian relaxation over the polygon edge graph.
    fn smooth(&self, build: &mut MeshBuild) {
        if self.smooth_iterations == 0 || build.vertices.is_empty() {
            return;
        }

        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); build.vertices.len()];
        for poly in &build.polygons {
            let corners = if poly[2] == poly[3] { 3 } else { 4 };
            for c in 0..corners {
                let a = poly[c];
                let b = poly[(c + 1) % corners];
                if a != b {
                    neighbors[a as usize].push(b);
                    neighbors[b as usize].push(a);
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }

        for _ in 0..self.smooth_iterations {
            let current = build.vertices.clone();
            for (vi, vertex) in build.vertices.iter_mut().enumerate() {
                let list = &neighbors[vi];
                if list.is_empty() {
                    continue;
                }
                let sum: Vec3 = list.iter().map(|&n| current[n as usize]).sum();
                let average = sum / list.len() as f32;
                let weight = build.smooth_amount[vi] * 0.5;
                *vertex = vertex.lerp(average, weight);
            }
        }
    }
}
