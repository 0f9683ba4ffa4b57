//! Vector helpers shared by the skeleton generators

use glam::{Quat, Vec3};

use super::rng::SimpleRng;

/// Linear interpolation between two scalars. Clamping is the caller's
/// responsibility.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Random unit vector. `flatness` scales the z component down before
/// renormalization, so `flatness = 1` yields a purely horizontal vector.
pub fn random_vec(rng: &mut SimpleRng, flatness: f32) -> Vec3 {
    let mut v = Vec3::new(
        rng.range(-1.0, 1.0),
        rng.range(-1.0, 1.0),
        rng.range(-1.0, 1.0),
    );
    while v.length_squared() < 1e-6 {
        v = Vec3::new(
            rng.range(-1.0, 1.0),
            rng.range(-1.0, 1.0),
            rng.range(-1.0, 1.0),
        );
    }
    v = v.normalize();
    v.z *= 1.0 - flatness;
    v.normalize_or(Vec3::X)
}

/// Rotation taking +z onto `direction`. Used to express phyllotaxis angles
/// in the local frame of a branch.
pub fn get_look_at_rot(direction: Vec3) -> Quat {
    Quat::from_rotation_arc(Vec3::Z, direction.normalize_or(Vec3::Z))
}

/// Project `v` onto the plane with unit normal `n`.
pub fn project_on_plane(v: Vec3, n: Vec3) -> Vec3 {
    v - n * n.dot(v)
}

/// Any unit vector perpendicular to `v`. Stable when `v` is near-axial.
pub fn get_orthogonal_vector(v: Vec3) -> Vec3 {
    let axis = if v.z.abs() < 0.9 { Vec3::Z } else { Vec3::X };
    v.cross(axis).normalize_or(Vec3::X)
}
