//! Leaf shape generation
//!
//! A leaf is built in one pass: sample a superformula contour, modulate
//! its margin with a tooth pattern, triangulate by ear clipping, project
//! planar UVs and displace the surface (midrib bend, cross cupping, edge
//! curl). Venation is generated from the same contour when enabled.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::leaf::presets::LeafPreset;
use crate::leaf::venation::{VenationGenerator, VenationType};
use crate::math::{Bounds2, SimpleRng};
use crate::mesh::Mesh;

const TWO_PI: f32 = std::f32::consts::TAU;

/// Botanical margin (leaf edge) types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarginType {
    /// Smooth edge, no teeth.
    #[default]
    Entire,
    /// Asymmetric saw teeth pointing toward the tip.
    Serrate,
    /// Symmetric triangular teeth pointing outward.
    Dentate,
    /// Rounded scallops.
    Crenate,
    /// Low-frequency, high-amplitude lobes.
    Lobed,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafShapeGenerator {
    // Superformula parameters
    pub m: f32,
    pub a: f32,
    pub b: f32,
    pub n1: f32,
    pub n2: f32,
    pub n3: f32,
    pub aspect_ratio: f32,

    // Margin parameters
    pub margin_type: MarginType,
    pub tooth_count: i32,
    pub tooth_depth: f32,
    pub tooth_sharpness: f32,
    /// When non-zero, tooth depths vary randomly per tooth.
    pub asymmetry_seed: u64,

    // Venation parameters
    pub enable_venation: bool,
    pub venation_type: VenationType,
    pub vein_density: f32,
    pub kill_distance: f32,
    pub attraction_distance: f32,
    pub growth_step_size: f32,

    // Surface deformation
    pub midrib_curvature: f32,
    pub cross_curvature: f32,
    pub edge_curl: f32,

    // Resolution
    pub contour_resolution: i32,
    pub seed: u64,
}

impl Default for LeafShapeGenerator {
    fn default() -> Self {
        Self {
            m: 2.0,
            a: 1.0,
            b: 1.0,
            n1: 3.0,
            n2: 3.0,
            n3: 3.0,
            aspect_ratio: 0.5,
            margin_type: MarginType::Entire,
            tooth_count: 0,
            tooth_depth: 0.1,
            tooth_sharpness: 0.5,
            asymmetry_seed: 0,
            enable_venation: false,
            venation_type: VenationType::Open,
            vein_density: 800.0,
            kill_distance: 0.03,
            attraction_distance: 0.08,
            growth_step_size: 0.01,
            midrib_curvature: 0.0,
            cross_curvature: 0.0,
            edge_curl: 0.0,
            contour_resolution: 64,
            seed: 42,
        }
    }
}

fn cross2d(o: Vec2, a: Vec2, b: Vec2) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = cross2d(p, a, b);
    let d2 = cross2d(p, b, c);
    let d3 = cross2d(p, c, a);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

fn is_ear(polygon: &[Vec2], prev: usize, curr: usize, next: usize) -> bool {
    let a = polygon[prev];
    let b = polygon[curr];
    let c = polygon[next];

    // Must be convex in counter-clockwise winding.
    if cross2d(a, b, c) <= 0.0 {
        return false;
    }

    for (i, &p) in polygon.iter().enumerate() {
        if i == prev || i == curr || i == next {
            continue;
        }
        if point_in_triangle(p, a, b, c) {
            return false;
        }
    }

    true
}

impl LeafShapeGenerator {
    /// Build a generator from a preset entry.
    pub fn from_preset(preset: &LeafPreset) -> Self {
        Self {
            m: preset.m,
            a: preset.a,
            b: preset.b,
            n1: preset.n1,
            n2: preset.n2,
            n3: preset.n3,
            aspect_ratio: preset.aspect_ratio,
            margin_type: preset.margin_type,
            tooth_count: preset.tooth_count,
            tooth_depth: preset.tooth_depth,
            tooth_sharpness: preset.tooth_sharpness,
            enable_venation: preset.enable_venation,
            venation_type: preset.venation_type,
            vein_density: preset.vein_density,
            kill_distance: preset.kill_distance,
            midrib_curvature: preset.midrib_curvature,
            cross_curvature: preset.cross_curvature,
            edge_curl: preset.edge_curl,
            ..Default::default()
        }
    }

    fn superformula_radius(&self, theta: f32, effective_n1: f32) -> f32 {
        let ct = (self.m * theta / 4.0).cos();
        let st = (self.m * theta / 4.0).sin();

        let term1 = (ct / self.a).abs().powf(self.n2);
        let term2 = (st / self.b).abs().powf(self.n3);

        let sum = term1 + term2;
        if sum < 1e-10 {
            return 1.0;
        }
        sum.powf(-1.0 / effective_n1)
    }

    fn sample_contour(&self) -> Vec<Vec2> {
        let res = self.contour_resolution.max(8);

        // n1 near zero explodes the exponent.
        let clamped_n1 = if self.n1.abs() < 0.001 {
            if self.n1 >= 0.0 {
                0.001
            } else {
                -0.001
            }
        } else {
            self.n1
        };

        let mut points = Vec::with_capacity(res as usize * 2);
        for i in 0..res {
            let theta = TWO_PI * i as f32 / res as f32;
            let r = self.superformula_radius(theta, clamped_n1);
            points.push(Vec2::new(r * theta.cos() * self.aspect_ratio, r * theta.sin()));
        }

        // Adaptive refinement: insert midpoints where the contour turns
        // sharply between successive edges.
        let mut refined = Vec::with_capacity(points.len() * 2);
        for i in 0..points.len() {
            let prev = if i == 0 { points.len() - 1 } else { i - 1 };
            let next = (i + 1) % points.len();

            refined.push(points[i]);

            let d1 = (points[i] - points[prev]).normalize_or_zero();
            let d2 = (points[next] - points[i]).normalize_or_zero();
            if d1.dot(d2) < 0.95 {
                let theta_mid = TWO_PI * (i as f32 + 0.5) / res as f32;
                let r_mid = self.superformula_radius(theta_mid, clamped_n1);
                refined.push(Vec2::new(
                    r_mid * theta_mid.cos() * self.aspect_ratio,
                    r_mid * theta_mid.sin(),
                ));
            }
        }

        refined
    }

    fn apply_margin(&self, contour: Vec<Vec2>) -> Vec<Vec2> {
        if self.margin_type == MarginType::Entire || self.tooth_count <= 0 {
            return contour;
        }

        let mut rng = SimpleRng::new(self.asymmetry_seed);
        let mut result = Vec::with_capacity(contour.len());

        for pt in contour {
            let r = pt.length();
            if r < 1e-10 {
                result.push(pt);
                continue;
            }

            let mut theta = pt.y.atan2(pt.x);
            if theta < 0.0 {
                theta += TWO_PI;
            }

            let t = theta * self.tooth_count as f32 / TWO_PI;
            let frac = t - t.floor();
            let asym_offset = if self.asymmetry_seed != 0 {
                rng.range(-0.3, 0.3)
            } else {
                0.0
            };
            let depth = self.tooth_depth * (1.0 + asym_offset);

            let modulation = match self.margin_type {
                MarginType::Serrate => {
                    let saw = if frac < self.tooth_sharpness {
                        frac / self.tooth_sharpness
                    } else {
                        (1.0 - frac) / (1.0 - self.tooth_sharpness)
                    };
                    depth * saw
                }
                MarginType::Dentate => depth * (1.0 - 2.0 * (frac - 0.5).abs()),
                MarginType::Crenate => depth * 0.5 * (1.0 + (TWO_PI * frac).sin()),
                MarginType::Lobed => depth * 0.5 * (1.0 + (TWO_PI * frac).cos()),
                MarginType::Entire => 0.0,
            };

            let new_r = r * (1.0 + modulation);
            result.push(Vec2::new(new_r * theta.cos(), new_r * theta.sin()));
        }

        result
    }

    fn triangulate(&self, contour: &[Vec2]) -> Mesh {
        let mut mesh = Mesh::new();

        for pt in contour {
            mesh.vertices.push(Vec3::new(pt.x, pt.y, 0.0));
        }

        let mut indices: Vec<usize> = (0..contour.len()).collect();

        // Enforce counter-clockwise winding.
        let mut signed_area = 0.0;
        for i in 0..contour.len() {
            let next = (i + 1) % contour.len();
            signed_area += contour[i].x * contour[next].y;
            signed_area -= contour[next].x * contour[i].y;
        }
        if signed_area < 0.0 {
            indices.reverse();
        }

        let mut poly: Vec<Vec2> = indices.iter().map(|&i| contour[i]).collect();

        while poly.len() > 2 {
            let mut ear_found = false;
            for i in 0..poly.len() {
                let prev = if i == 0 { poly.len() - 1 } else { i - 1 };
                let next = (i + 1) % poly.len();

                if is_ear(&poly, prev, i, next) {
                    mesh.add_triangle(
                        indices[prev] as u32,
                        indices[i] as u32,
                        indices[next] as u32,
                    );
                    mesh.uv_loops.push([0, 0, 0, 0]);

                    poly.remove(i);
                    indices.remove(i);
                    ear_found = true;
                    break;
                }
            }
            if !ear_found {
                // Fallback for the rare polygon where no ear is found:
                // fan-triangulate the remainder from its centroid.
                if poly.len() > 2 {
                    let centroid = poly.iter().copied().sum::<Vec2>() / poly.len() as f32;
                    let centroid_index = mesh.vertices.len() as u32;
                    mesh.vertices.push(Vec3::new(centroid.x, centroid.y, 0.0));

                    for i in 0..poly.len() {
                        let next = (i + 1) % poly.len();
                        mesh.add_triangle(
                            indices[i] as u32,
                            indices[next] as u32,
                            centroid_index,
                        );
                        mesh.uv_loops.push([0, 0, 0, 0]);
                    }
                }
                break;
            }
        }

        mesh
    }

    fn compute_uvs(&self, mesh: &mut Mesh, contour: &[Vec2]) {
        let Some(bounds) = Bounds2::from_points(contour) else {
            return;
        };
        if mesh.vertices.is_empty() {
            return;
        }
        let width = bounds.width();
        let height = bounds.height();

        mesh.uvs.clear();
        for vertex in &mesh.vertices {
            let u = if width > 1e-10 {
                (vertex.x - bounds.min.x) / width
            } else {
                0.5
            };
            let v = if height > 1e-10 {
                (vertex.y - bounds.min.y) / height
            } else {
                0.5
            };
            mesh.uvs.push(Vec2::new(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)));
        }

        // Planar projection: UV indices equal vertex indices.
        for i in 0..mesh.polygons.len() {
            mesh.uv_loops[i] = mesh.polygons[i];
        }
    }

    fn apply_deformation(&self, mesh: &mut Mesh, contour: &[Vec2]) {
        let Some(bounds) = Bounds2::from_points(contour) else {
            return;
        };
        if mesh.vertices.is_empty() {
            return;
        }
        let width = bounds.width();
        let height = bounds.height();
        if width < 1e-10 || height < 1e-10 {
            return;
        }
        let center_x = bounds.center_x();

        // Distance to the nearest contour edge, for the edge curl term.
        let mut edge_distances = vec![f32::MAX; mesh.vertices.len()];
        for (vi, vertex) in mesh.vertices.iter().enumerate() {
            let pt = Vec2::new(vertex.x, vertex.y);
            for ci in 0..contour.len() {
                let next = (ci + 1) % contour.len();
                let seg = contour[next] - contour[ci];
                let seg_len_sq = seg.length_squared();
                if seg_len_sq < 1e-10 {
                    continue;
                }
                let t = ((pt - contour[ci]).dot(seg) / seg_len_sq).clamp(0.0, 1.0);
                let dist = (pt - (contour[ci] + seg * t)).length();
                edge_distances[vi] = edge_distances[vi].min(dist);
            }
        }

        for (vi, vertex) in mesh.vertices.iter_mut().enumerate() {
            let nx = (vertex.x - center_x) / (width * 0.5); // -1..1 across width
            let ny = (vertex.y - bounds.min.y) / height; // 0..1 along length

            let mut z = 0.0;
            // Midrib bend along the leaf axis.
            z += self.midrib_curvature * ny * ny * 0.5;
            // Parabolic cupping across the width.
            z += self.cross_curvature * nx * nx * 0.3;
            // Curl concentrated near the edge.
            let max_edge_dist = width * 0.5;
            let edge_factor =
                1.0 - (edge_distances[vi] / (max_edge_dist * 0.3)).clamp(0.0, 1.0);
            z += self.edge_curl * edge_factor * edge_factor * 0.2;

            vertex.z = z;
        }
    }

    fn venation_generator(&self) -> VenationGenerator {
        VenationGenerator {
            venation_type: self.venation_type,
            vein_density: self.vein_density,
            kill_distance: self.kill_distance,
            attraction_distance: self.attraction_distance,
            growth_step_size: self.growth_step_size,
            seed: self.seed,
            ..Default::default()
        }
    }

    /// Generate the leaf mesh.
    pub fn generate(&self) -> Mesh {
        let contour = self.sample_contour();
        let contour = self.apply_margin(contour);
        let mut mesh = self.triangulate(&contour);
        self.compute_uvs(&mut mesh, &contour);
        self.apply_deformation(&mut mesh, &contour);

        if self.enable_venation {
            let venation = self.venation_generator();
            let veins = venation.generate_veins(&contour);
            venation.compute_vein_distances(&mut mesh, &veins);
        }

        mesh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_returns_valid_mesh() {
        let mesh = LeafShapeGenerator::default().generate();
        assert!(mesh.vertices.len() >= 4);
        assert!(!mesh.polygons.is_empty());
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_triangles_are_degenerate_quads_with_distinct_corners() {
        let gen = LeafShapeGenerator {
            contour_resolution: 32,
            ..Default::default()
        };
        let mesh = gen.generate();
        for poly in &mesh.polygons {
            assert_eq!(poly[2], poly[3]);
            assert_ne!(poly[0], poly[1]);
            assert_ne!(poly[1], poly[2]);
            assert_ne!(poly[0], poly[2]);
        }
    }

    #[test]
    fn test_uvs_bijective_and_in_range() {
        let mesh = LeafShapeGenerator::default().generate();
        assert_eq!(mesh.uvs.len(), mesh.vertices.len());
        for uv in &mesh.uvs {
            assert!((0.0..=1.0).contains(&uv.x));
            assert!((0.0..=1.0).contains(&uv.y));
        }
    }

    #[test]
    fn test_flat_leaf_has_zero_z() {
        let mesh = LeafShapeGenerator::default().generate();
        for v in &mesh.vertices {
            assert!(v.z.abs() < 1e-6);
        }
    }

    #[test]
    fn test_deformation_moves_z() {
        let gen = LeafShapeGenerator {
            midrib_curvature: 0.5,
            cross_curvature: 0.3,
            ..Default::default()
        };
        let mesh = gen.generate();
        assert!(mesh.vertices.iter().any(|v| v.z.abs() > 1e-6));
    }

    #[test]
    fn test_margin_modifies_contour() {
        let plain = LeafShapeGenerator::default().generate();
        let serrate = LeafShapeGenerator {
            margin_type: MarginType::Serrate,
            tooth_count: 10,
            tooth_depth: 0.2,
            ..Default::default()
        };
        let serrate = serrate.generate();

        let differs = plain.vertices.len() != serrate.vertices.len()
            || plain
                .vertices
                .iter()
                .zip(&serrate.vertices)
                .any(|(a, b)| (*a - *b).length() > 1e-6);
        assert!(differs);
    }

    #[test]
    fn test_all_margin_types_produce_valid_meshes() {
        for margin_type in [
            MarginType::Serrate,
            MarginType::Dentate,
            MarginType::Crenate,
            MarginType::Lobed,
        ] {
            let gen = LeafShapeGenerator {
                margin_type,
                tooth_count: 9,
                tooth_depth: 0.15,
                ..Default::default()
            };
            let mesh = gen.generate();
            assert!(mesh.vertices.len() >= 4, "{margin_type:?}");
            assert!(!mesh.polygons.is_empty(), "{margin_type:?}");
            assert!(mesh.is_valid(), "{margin_type:?}");
        }
    }

    #[test]
    fn test_n1_zero_is_clamped() {
        let gen = LeafShapeGenerator {
            n1: 0.0,
            ..Default::default()
        };
        let mesh = gen.generate();
        assert!(mesh.vertices.len() >= 4);
        assert!(!mesh.polygons.is_empty());
    }

    #[test]
    fn test_contour_resolution_floor() {
        let gen = LeafShapeGenerator {
            contour_resolution: 3,
            ..Default::default()
        };
        let mesh = gen.generate();
        assert!(mesh.vertices.len() >= 8);
    }

    #[test]
    fn test_asymmetry_changes_teeth() {
        let base = LeafShapeGenerator {
            margin_type: MarginType::Dentate,
            tooth_count: 8,
            tooth_depth: 0.2,
            ..Default::default()
        };
        let symmetric = base.generate();
        let asymmetric = LeafShapeGenerator {
            asymmetry_seed: 7,
            ..base
        }
        .generate();
        let differs = symmetric.vertices.len() != asymmetric.vertices.len()
            || symmetric
                .vertices
                .iter()
                .zip(&asymmetric.vertices)
                .any(|(a, b)| (*a - *b).length() > 1e-6);
        assert!(differs);
    }

    #[test]
    fn test_generate_deterministic() {
        let gen = LeafShapeGenerator {
            enable_venation: true,
            ..Default::default()
        };
        let a = gen.generate();
        let b = gen.generate();
        assert_eq!(a.vertices.len(), b.vertices.len());
        for (x, y) in a.vertices.iter().zip(&b.vertices) {
            assert_eq!(x, y);
        }
        assert_eq!(
            a.float_attribute("vein_distance"),
            b.float_attribute("vein_distance")
        );
    }
}
