//! Axis-aligned bounds in 2 and 3 dimensions

use glam::{Vec2, Vec3};

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Compute the bounds of a point set. Returns `None` for an empty set.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let first = *points.first()?;
        let mut aabb = Self::new(first, first);
        for &p in &points[1..] {
            aabb.expand(p);
        }
        Some(aabb)
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }
}

/// 2-D bounds used by the leaf contour pipeline
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    /// Compute the bounds of a point set. Returns `None` for an empty set.
    pub fn from_points(points: &[Vec2]) -> Option<Self> {
        let first = *points.first()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for &p in &points[1..] {
            bounds.min = bounds.min.min(p);
            bounds.max = bounds.max.max(p);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center_x(&self) -> f32 {
        (self.min.x + self.max.x) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    fn test_from_points() {
        let aabb = Aabb::from_points(&[
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(-2.0, 3.0, 5.0),
            Vec3::new(0.0, 0.0, -1.0),
        ])
        .unwrap();
        assert_eq!(aabb.min, Vec3::new(-2.0, -1.0, -1.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 3.0, 5.0));
        assert!(Aabb::from_points(&[]).is_none());
    }

    #[test]
    fn test_expand() {
        let mut aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        aabb.expand(Vec3::new(2.0, -1.0, 0.5));
        assert_eq!(aabb.max.x, 2.0);
        assert_eq!(aabb.min.y, -1.0);
    }

    #[test]
    fn test_bounds2() {
        let b = Bounds2::from_points(&[Vec2::new(-1.0, 0.0), Vec2::new(3.0, 2.0)]).unwrap();
        assert_eq!(b.width(), 4.0);
        assert_eq!(b.height(), 2.0);
        assert_eq!(b.center_x(), 1.0);
    }
}
