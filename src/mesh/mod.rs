//! Mesh container shared by the skeleton mesher and the leaf generators
//!
//! Polygons are quads; triangles are stored as degenerate quads where the
//! fourth index repeats the third. UVs are indexed in parallel with
//! vertices, and `uv_loops` mirrors `polygons`. Per-vertex attributes are
//! stored in a typed table keyed by name.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use crate::math::Aabb;

/// Typed per-vertex attribute storage
#[derive(Clone, Debug)]
pub enum AttributeData {
    Float(Vec<f32>),
    Vector(Vec<Vec3>),
}

impl AttributeData {
    pub fn len(&self) -> usize {
        match self {
            AttributeData::Float(data) => data.len(),
            AttributeData::Vector(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Triangle/quad mesh with UVs and a per-vertex attribute table
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub vertices: Vec<Vec3>,
    pub polygons: Vec<[u32; 4]>,
    pub uvs: Vec<Vec2>,
    pub uv_loops: Vec<[u32; 4]>,
    pub attributes: HashMap<String, AttributeData>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triangle as a degenerate quad.
    pub fn add_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.polygons.push([a, b, c, c]);
    }

    /// Append a quad.
    pub fn add_quad(&mut self, a: u32, b: u32, c: u32, d: u32) {
        self.polygons.push([a, b, c, d]);
    }

    /// Insert (or replace) a float attribute and return its storage.
    pub fn add_float_attribute(&mut self, name: &str) -> &mut Vec<f32> {
        self.attributes
            .insert(name.to_string(), AttributeData::Float(Vec::new()));
        match self.attributes.get_mut(name) {
            Some(AttributeData::Float(data)) => data,
            _ => unreachable!(),
        }
    }

    /// Insert (or replace) a 3-vector attribute and return its storage.
    pub fn add_vector_attribute(&mut self, name: &str) -> &mut Vec<Vec3> {
        self.attributes
            .insert(name.to_string(), AttributeData::Vector(Vec::new()));
        match self.attributes.get_mut(name) {
            Some(AttributeData::Vector(data)) => data,
            _ => unreachable!(),
        }
    }

    /// Look up a float attribute by name.
    pub fn float_attribute(&self, name: &str) -> Option<&[f32]> {
        match self.attributes.get(name) {
            Some(AttributeData::Float(data)) => Some(data),
            _ => None,
        }
    }

    /// Look up a 3-vector attribute by name.
    pub fn vector_attribute(&self, name: &str) -> Option<&[Vec3]> {
        match self.attributes.get(name) {
            Some(AttributeData::Vector(data)) => Some(data),
            _ => None,
        }
    }

    /// Bounding box of the vertices, `None` when the mesh is empty.
    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(&self.vertices)
    }

    /// True when every polygon and uv loop index is in range.
    pub fn is_valid(&self) -> bool {
        let vcount = self.vertices.len() as u32;
        let uvcount = self.uvs.len() as u32;
        self.polygons
            .iter()
            .all(|poly| poly.iter().all(|&i| i < vcount))
            && self
                .uv_loops
                .iter()
                .all(|loop_| loop_.iter().all(|&i| i < uvcount))
    }
}
