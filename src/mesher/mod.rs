//! Skeleton meshing

pub mod manifold;

pub use manifold::{attributes, ManifoldMesher};
