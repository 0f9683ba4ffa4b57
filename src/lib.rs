//! Arbora - a procedural tree and foliage generation core
//!
//! The crate builds botanically plausible tree meshes from a handful of
//! scalar parameters. Generation runs in three stages:
//!
//! 1. A chain of tree functions (trunk, branching, growth simulation)
//!    transforms a shared skeleton graph.
//! 2. The manifold mesher converts the skeleton into a closed radial mesh
//!    with per-vertex attributes for wind shaders.
//! 3. Leaf geometry (superformula contours, venation, LOD cards) is
//!    generated independently and instanced by the host.

pub mod core;
pub mod math;
pub mod mesh;
pub mod tree;
pub mod functions;
pub mod leaf;
pub mod mesher;

pub use crate::functions::{BranchFunction, GrowthFunction, TrunkFunction};
pub use crate::leaf::{LeafPreset, LeafShapeGenerator};
pub use crate::mesh::Mesh;
pub use crate::mesher::ManifoldMesher;
pub use crate::tree::{execute_pipeline, Stem, TreeFunction, TreeGraph};
