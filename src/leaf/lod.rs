//! Leaf LOD geometry
//!
//! Distant foliage is drawn as cards and billboard clouds instead of full
//! leaf meshes. The impostor view set enumerates upper-hemisphere
//! directions for capture-based impostor baking.

use glam::{Vec2, Vec3};

use crate::mesh::Mesh;

/// Bounding quad of the source mesh at its mid height, with unit UVs.
/// Returns an empty mesh for sources with fewer than 3 vertices.
pub fn generate_card(source: &Mesh) -> Mesh {
    let mut card = Mesh::new();

    if source.vertices.len() < 3 {
        return card;
    }
    let Some(bounds) = source.bounds() else {
        return card;
    };

    let mid_z = (bounds.min.z + bounds.max.z) * 0.5;

    card.vertices.push(Vec3::new(bounds.min.x, bounds.min.y, mid_z));
    card.vertices.push(Vec3::new(bounds.max.x, bounds.min.y, mid_z));
    card.vertices.push(Vec3::new(bounds.max.x, bounds.max.y, mid_z));
    card.vertices.push(Vec3::new(bounds.min.x, bounds.max.y, mid_z));

    card.uvs.push(Vec2::new(0.0, 0.0));
    card.uvs.push(Vec2::new(1.0, 0.0));
    card.uvs.push(Vec2::new(1.0, 1.0));
    card.uvs.push(Vec2::new(0.0, 1.0));

    card.add_triangle(0, 1, 2);
    card.add_triangle(0, 2, 3);
    card.uv_loops.push([0, 1, 2, 2]);
    card.uv_loops.push([0, 2, 3, 3]);

    card
}

/// Billboard cloud: `num_planes` vertical quads through the center of the
/// point cloud, normals fanned evenly around +z.
pub fn generate_billboard_cloud(positions: &[Vec3], num_planes: usize) -> Mesh {
    let mut cloud = Mesh::new();

    if positions.is_empty() || num_planes < 1 {
        return cloud;
    }

    let center = positions.iter().copied().sum::<Vec3>() / positions.len() as f32;
    let max_dist = positions
        .iter()
        .map(|p| (*p - center).length())
        .fold(0.0, f32::max);
    let half_size = max_dist.max(0.5);

    for i in 0..num_planes {
        let angle = std::f32::consts::PI * i as f32 / num_planes as f32;
        let normal = Vec3::new(angle.cos(), angle.sin(), 0.0);
        let tangent = Vec3::Z.cross(normal).normalize_or(Vec3::X);
        let bitangent = normal.cross(tangent).normalize_or(Vec3::Z);

        let base = cloud.vertices.len() as u32;
        cloud
            .vertices
            .push(center - tangent * half_size - bitangent * half_size);
        cloud
            .vertices
            .push(center + tangent * half_size - bitangent * half_size);
        cloud
            .vertices
            .push(center + tangent * half_size + bitangent * half_size);
        cloud
            .vertices
            .push(center - tangent * half_size + bitangent * half_size);

        cloud.uvs.push(Vec2::new(0.0, 0.0));
        cloud.uvs.push(Vec2::new(1.0, 0.0));
        cloud.uvs.push(Vec2::new(1.0, 1.0));
        cloud.uvs.push(Vec2::new(0.0, 1.0));

        cloud.add_triangle(base, base + 1, base + 2);
        cloud.add_triangle(base, base + 2, base + 3);
        cloud.uv_loops.push([base, base + 1, base + 2, base + 2]);
        cloud.uv_loops.push([base, base + 2, base + 3, base + 3]);
    }

    cloud
}

/// Evenly distributed unit view directions on the upper hemisphere,
/// `resolution` elevation bands times `resolution` azimuth steps.
pub fn impostor_view_directions(resolution: usize) -> Vec<Vec3> {
    let mut directions = Vec::with_capacity(resolution * resolution);

    for j in 0..resolution {
        // Elevation from the pole, stopping short of both the zenith and
        // the horizon.
        let phi = std::f32::consts::FRAC_PI_2 * (j + 1) as f32 / (resolution + 1) as f32;
        for i in 0..resolution {
            let theta = std::f32::consts::TAU * i as f32 / resolution as f32;
            let direction = Vec3::new(
                phi.sin() * theta.cos(),
                phi.sin() * theta.sin(),
                phi.cos(),
            );
            directions.push(direction.normalize());
        }
    }

    directions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::shape::LeafShapeGenerator;

    #[test]
    fn test_card_matches_source_bounds() {
        let leaf = LeafShapeGenerator::default().generate();
        let card = generate_card(&leaf);
        assert_eq!(card.vertices.len(), 4);
        assert_eq!(card.polygons.len(), 2);

        let leaf_bounds = leaf.bounds().unwrap();
        let card_bounds = card.bounds().unwrap();
        assert!((leaf_bounds.min.x - card_bounds.min.x).abs() < 0.01);
        assert!((leaf_bounds.max.x - card_bounds.max.x).abs() < 0.01);
        assert!((leaf_bounds.min.y - card_bounds.min.y).abs() < 0.01);
        assert!((leaf_bounds.max.y - card_bounds.max.y).abs() < 0.01);
    }

    #[test]
    fn test_card_empty_for_tiny_source() {
        let mut source = Mesh::new();
        source.vertices.push(Vec3::ZERO);
        source.vertices.push(Vec3::X);
        let card = generate_card(&source);
        assert!(card.vertices.is_empty());
        assert!(card.polygons.is_empty());
    }

    #[test]
    fn test_billboard_cloud_counts() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];
        let cloud = generate_billboard_cloud(&positions, 5);
        assert_eq!(cloud.vertices.len(), 20);
        assert_eq!(cloud.polygons.len(), 10);
        assert_eq!(cloud.uvs.len(), 20);
        assert!(cloud.is_valid());
    }

    #[test]
    fn test_billboard_cloud_empty_inputs() {
        assert!(generate_billboard_cloud(&[], 5).vertices.is_empty());
        assert!(generate_billboard_cloud(&[Vec3::ZERO], 0).vertices.is_empty());
    }

    #[test]
    fn test_impostor_directions_upper_hemisphere() {
        let directions = impostor_view_directions(4);
        assert_eq!(directions.len(), 16);
        for d in &directions {
            assert!(d.z > 0.0);
            assert!((d.length() - 1.0).abs() < 1e-5);
        }
    }
}
