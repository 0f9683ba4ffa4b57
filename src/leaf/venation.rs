//! Leaf venation via space colonization
//!
//! Auxin sources scattered inside the leaf contour attract the nearest
//! vein node; attracted nodes grow a step toward the average attraction
//! direction and auxins are killed once a vein reaches them. Closed
//! venation additionally merges growing tips into nearby foreign veins to
//! form loops. Vein widths follow the pipe model.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::leaf::spatial_hash::SpatialHash2D;
use crate::math::{Bounds2, SimpleRng};
use crate::mesh::Mesh;

/// Hard cap on auxin sources, guarding against pathological densities.
const MAX_AUXINS: usize = 5000;

/// Venation topology
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VenationType {
    #[default]
    Open,
    Closed,
}

/// One node of the vein network. Nodes are topologically ordered: a
/// parent index is always smaller than its child's index.
#[derive(Clone, Copy, Debug)]
pub struct VeinNode {
    pub position: Vec2,
    /// Parent index, -1 for the root.
    pub parent: i32,
    pub width: f32,
}

struct AuxinSource {
    position: Vec2,
    active: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VenationGenerator {
    pub venation_type: VenationType,
    /// Auxin sources per unit of contour area.
    pub vein_density: f32,
    /// Auxins closer than this to a new vein node are consumed.
    pub kill_distance: f32,
    pub growth_step_size: f32,
    /// Radius within which an auxin attracts vein nodes.
    pub attraction_distance: f32,
    pub max_iterations: u32,
    pub seed: u64,
}

impl Default for VenationGenerator {
    fn default() -> Self {
        Self {
            venation_type: VenationType::Open,
            vein_density: 800.0,
            kill_distance: 0.03,
            growth_step_size: 0.01,
            attraction_distance: 0.08,
            max_iterations: 300,
            seed: 42,
        }
    }
}

/// Even-odd crossings test.
fn point_in_contour(point: Vec2, contour: &[Vec2]) -> bool {
    let mut crossings = 0;
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        let a = contour[i];
        let b = contour[j];
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            crossings += 1;
        }
        j = i;
    }
    crossings % 2 != 0
}

fn contour_area(contour: &[Vec2]) -> f32 {
    let mut area = 0.0;
    let mut j = contour.len() - 1;
    for i in 0..contour.len() {
        area += contour[j].x * contour[i].y;
        area -= contour[i].x * contour[j].y;
        j = i;
    }
    area.abs() * 0.5
}

fn distance_to_segment(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < 1e-10 {
        return (p - a).length();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).length()
}

fn is_ancestor(nodes: &[VeinNode], node_index: usize, potential_ancestor: usize) -> bool {
    let mut current = node_index as i32;
    let mut steps = 0;
    while current >= 0 && steps < nodes.len() {
        if current as usize == potential_ancestor {
            return true;
        }
        current = nodes[current as usize].parent;
        steps += 1;
    }
    false
}

/// Pipe model: tips get unit width, internal widths sum their children,
/// and the final width is the square root of the total.
fn compute_pipe_widths(nodes: &mut [VeinNode]) {
    if nodes.is_empty() {
        return;
    }

    let mut child_count = vec![0usize; nodes.len()];
    for node in nodes.iter() {
        if node.parent >= 0 {
            child_count[node.parent as usize] += 1;
        }
    }

    for (i, node) in nodes.iter_mut().enumerate() {
        node.width = if child_count[i] == 0 { 1.0 } else { 0.0 };
    }

    // Nodes are ordered parent-before-child, so one reverse sweep
    // propagates tip widths to the root.
    for i in (0..nodes.len()).rev() {
        let parent = nodes[i].parent;
        if parent >= 0 {
            nodes[parent as usize].width += nodes[i].width;
        }
    }

    for node in nodes.iter_mut() {
        node.width = node.width.max(1.0).sqrt();
    }
}

impl VenationGenerator {
    fn generate_auxin_sources(
        &self,
        contour: &[Vec2],
        bounds: Bounds2,
        rng: &mut SimpleRng,
    ) -> Vec<AuxinSource> {
        let area = contour_area(contour);
        let count = ((self.vein_density * area) as usize).min(MAX_AUXINS);
        let mut auxins = Vec::with_capacity(count);
        if count == 0 {
            return auxins;
        }

        let mut attempts = 0;
        while auxins.len() < count && attempts < count * 10 {
            let pos = Vec2::new(
                rng.range(bounds.min.x, bounds.max.x),
                rng.range(bounds.min.y, bounds.max.y),
            );
            if point_in_contour(pos, contour) {
                auxins.push(AuxinSource {
                    position: pos,
                    active: true,
                });
            }
            attempts += 1;
        }

        auxins
    }

    /// Generate the vein network inside the contour. Returns an empty
    /// vector when the contour has fewer than 3 points or the density is
    /// zero.
    pub fn generate_veins(&self, contour: &[Vec2]) -> Vec<VeinNode> {
        if contour.len() < 3 || self.vein_density <= 0.0 {
            return Vec::new();
        }
        let Some(bounds) = Bounds2::from_points(contour) else {
            return Vec::new();
        };

        let mut rng = SimpleRng::new(self.seed);
        let auxins = self.generate_auxin_sources(contour, bounds, &mut rng);
        if auxins.is_empty() {
            return Vec::new();
        }
        let mut auxins = auxins;

        // Root at the leaf base, nudged inside the contour if necessary.
        let mut root_pos = Vec2::new(0.0, bounds.min.y + bounds.height() * 0.02);
        if !point_in_contour(root_pos, contour) {
            let target = Vec2::new(0.0, bounds.min.y);
            let mut best_dist = f32::MAX;
            for &pt in contour {
                let d = (pt - target).length_squared();
                if d < best_dist {
                    best_dist = d;
                    root_pos = pt;
                }
            }
            let centroid = contour.iter().copied().sum::<Vec2>() / contour.len() as f32;
            root_pos += (centroid - root_pos).normalize_or(Vec2::Y) * self.growth_step_size;
        }

        let mut veins = vec![VeinNode {
            position: root_pos,
            parent: -1,
            width: 1.0,
        }];

        let pad = Vec2::splat(self.attraction_distance);
        let mut vein_hash =
            SpatialHash2D::new(self.attraction_distance, bounds.min - pad, bounds.max + pad);
        vein_hash.insert(0, root_pos);

        // Closed venation kills auxins at half distance to allow the
        // denser growth loops need.
        let effective_kill = match self.venation_type {
            VenationType::Closed => self.kill_distance * 0.5,
            VenationType::Open => self.kill_distance,
        };

        for _ in 0..self.max_iterations {
            let mut growth_dirs = vec![Vec2::ZERO; veins.len()];
            let mut growth_counts = vec![0u32; veins.len()];
            let mut active_auxins = 0;

            for auxin in auxins.iter().filter(|a| a.active) {
                active_auxins += 1;

                let candidates = vein_hash.query_radius(auxin.position, self.attraction_distance);
                let mut nearest = None;
                let mut nearest_dist_sq = f32::MAX;
                for vid in candidates {
                    let d = (veins[vid].position - auxin.position).length_squared();
                    if d < nearest_dist_sq {
                        nearest_dist_sq = d;
                        nearest = Some(vid);
                    }
                }

                if let Some(vid) = nearest {
                    let dir = auxin.position - veins[vid].position;
                    let len = dir.length();
                    if len > 1e-10 {
                        growth_dirs[vid] += dir / len;
                        growth_counts[vid] += 1;
                    }
                }
            }

            if active_auxins == 0 {
                break;
            }

            let mut any_grew = false;
            let old_size = veins.len();

            for vi in 0..old_size {
                if growth_counts[vi] == 0 {
                    continue;
                }
                let avg_dir = growth_dirs[vi] / growth_counts[vi] as f32;
                let len = avg_dir.length();
                if len < 1e-10 {
                    continue;
                }
                let new_pos = veins[vi].position + avg_dir / len * self.growth_step_size;

                if !point_in_contour(new_pos, contour) {
                    continue;
                }

                // Closed venation: a tip close to a foreign vein parents
                // itself to it, forming a loop.
                if self.venation_type == VenationType::Closed {
                    let nearby = vein_hash.query_radius(new_pos, self.growth_step_size * 3.0);
                    let mut merged = false;
                    for nid in nearby {
                        if nid == vi
                            || is_ancestor(&veins, vi, nid)
                            || is_ancestor(&veins, nid, vi)
                        {
                            continue;
                        }
                        let new_index = veins.len();
                        veins.push(VeinNode {
                            position: new_pos,
                            parent: nid as i32,
                            width: 1.0,
                        });
                        vein_hash.insert(new_index, new_pos);
                        merged = true;
                        any_grew = true;
                        break;
                    }
                    if merged {
                        continue;
                    }
                }

                let new_index = veins.len();
                veins.push(VeinNode {
                    position: new_pos,
                    parent: vi as i32,
                    width: 1.0,
                });
                vein_hash.insert(new_index, new_pos);
                any_grew = true;
            }

            if !any_grew {
                break;
            }

            let kill_sq = effective_kill * effective_kill;
            for vi in old_size..veins.len() {
                let vein_pos = veins[vi].position;
                for auxin in auxins.iter_mut().filter(|a| a.active) {
                    if (auxin.position - vein_pos).length_squared() <= kill_sq {
                        auxin.active = false;
                    }
                }
            }
        }

        compute_pipe_widths(&mut veins);
        log::debug!("venation: {} vein nodes", veins.len());
        veins
    }

    /// Store the distance from each mesh vertex to the nearest vein
    /// segment in a `vein_distance` float attribute. Does nothing when the
    /// vein set or the mesh is empty.
    pub fn compute_vein_distances(&self, mesh: &mut Mesh, veins: &[VeinNode]) {
        if veins.is_empty() || mesh.vertices.is_empty() {
            return;
        }

        let mut distances = Vec::with_capacity(mesh.vertices.len());
        for vertex in &mesh.vertices {
            let vpos = Vec2::new(vertex.x, vertex.y);
            let mut min_dist = f32::MAX;
            for vein in veins {
                let d = if vein.parent < 0 {
                    (vpos - vein.position).length()
                } else {
                    distance_to_segment(vpos, veins[vein.parent as usize].position, vein.position)
                };
                min_dist = min_dist.min(d);
            }
            distances.push(min_dist);
        }
        *mesh.add_float_attribute("vein_distance") = distances;
    }
}
