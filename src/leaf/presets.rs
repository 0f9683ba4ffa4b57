//! Leaf preset table
//!
//! Ready-made parameter sets for common species. Hosts use these as
//! starting points for their own preset catalogues.

use serde::Serialize;

use crate::leaf::shape::MarginType;
use crate::leaf::venation::VenationType;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct LeafPreset {
    pub name: &'static str,
    // Superformula
    pub m: f32,
    pub a: f32,
    pub b: f32,
    pub n1: f32,
    pub n2: f32,
    pub n3: f32,
    pub aspect_ratio: f32,
    // Margin
    pub margin_type: MarginType,
    pub tooth_count: i32,
    pub tooth_depth: f32,
    pub tooth_sharpness: f32,
    // Venation
    pub enable_venation: bool,
    pub venation_type: VenationType,
    pub vein_density: f32,
    pub kill_distance: f32,
    // Deformation
    pub midrib_curvature: f32,
    pub cross_curvature: f32,
    pub edge_curl: f32,
}

const PRESETS: [LeafPreset; 5] = [
    LeafPreset {
        name: "Oak",
        m: 7.0,
        a: 1.0,
        b: 1.0,
        n1: 2.0,
        n2: 4.0,
        n3: 4.0,
        aspect_ratio: 0.7,
        margin_type: MarginType::Lobed,
        tooth_count: 7,
        tooth_depth: 0.3,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 800.0,
        kill_distance: 0.03,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Maple",
        m: 5.0,
        a: 1.0,
        b: 1.0,
        n1: 1.5,
        n2: 3.0,
        n3: 3.0,
        aspect_ratio: 0.95,
        margin_type: MarginType::Lobed,
        tooth_count: 5,
        tooth_depth: 0.5,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 1000.0,
        kill_distance: 0.025,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Birch",
        m: 2.0,
        a: 1.0,
        b: 0.6,
        n1: 2.5,
        n2: 8.0,
        n3: 8.0,
        aspect_ratio: 0.6,
        margin_type: MarginType::Serrate,
        tooth_count: 24,
        tooth_depth: 0.05,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 600.0,
        kill_distance: 0.03,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Willow",
        m: 2.0,
        a: 1.0,
        b: 0.3,
        n1: 3.0,
        n2: 10.0,
        n3: 10.0,
        aspect_ratio: 0.2,
        margin_type: MarginType::Entire,
        tooth_count: 0,
        tooth_depth: 0.0,
        tooth_sharpness: 0.5,
        enable_venation: true,
        venation_type: VenationType::Open,
        vein_density: 400.0,
        kill_distance: 0.04,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
    LeafPreset {
        name: "Pine",
        m: 2.0,
        a: 1.0,
        b: 0.05,
        n1: 4.0,
        n2: 20.0,
        n3: 20.0,
        aspect_ratio: 0.05,
        margin_type: MarginType::Entire,
        tooth_count: 0,
        tooth_depth: 0.0,
        tooth_sharpness: 0.5,
        enable_venation: false,
        venation_type: VenationType::Open,
        vein_density: 0.0,
        kill_distance: 0.0,
        midrib_curvature: 0.0,
        cross_curvature: 0.0,
        edge_curl: 0.0,
    },
];

impl LeafPreset {
    pub fn all() -> &'static [LeafPreset] {
        &PRESETS
    }

    pub fn find(name: &str) -> Option<&'static LeafPreset> {
        PRESETS.iter().find(|preset| preset.name == name)
    }
}
