//! End-to-end pipeline scenarios

use arbora::functions::{BranchFunction, GrowthFunction, TrunkFunction};
use arbora::leaf::{lod, LeafPreset, LeafShapeGenerator};
use arbora::mesher::{attributes, ManifoldMesher};
use arbora::tree::{execute_pipeline, NodeType, TreeFunction, TreeGraph};

fn basic_chain() -> Vec<Box<dyn TreeFunction>> {
    vec![
        Box::new(TrunkFunction::default()),
        Box::new(BranchFunction::default()),
    ]
}

#[test]
fn basic_tree_produces_rich_mesh() {
    let mut graph = TreeGraph::new();
    execute_pipeline(&mut graph, &basic_chain(), 0).unwrap();

    let mesher = ManifoldMesher {
        radial_resolution: 32,
        ..Default::default()
    };
    let mesh = mesher.mesh_tree(&graph);

    assert!(mesh.vertices.len() > 100);
    assert!(mesh.is_valid());
    assert!(mesh
        .float_attribute(attributes::PHYLLOTAXIS_ANGLE)
        .is_some());

    // No edge of the tree surface is shared by more than two faces.
    let mut edge_counts = std::collections::HashMap::new();
    for poly in &mesh.polygons {
        let corners = if poly[2] == poly[3] { 3 } else { 4 };
        for c in 0..corners {
            let a = poly[c];
            let b = poly[(c + 1) % corners];
            *edge_counts.entry((a.min(b), a.max(b))).or_insert(0u32) += 1;
        }
    }
    assert!(edge_counts.values().all(|&count| count <= 2));
}

#[test]
fn growth_with_lateral_buds_activates_dormants() {
    let growth = GrowthFunction {
        iterations: 4,
        apical_dominance: 0.7,
        lateral_activation: 0.35,
        enable_lateral_branching: true,
        ..Default::default()
    };
    let chain: Vec<Box<dyn TreeFunction>> = vec![
        Box::new(TrunkFunction::default()),
        Box::new(growth),
    ];
    let mut graph = TreeGraph::new();
    execute_pipeline(&mut graph, &chain, 0).unwrap();

    let mut has_dormant = false;
    let mut has_branch = false;
    let mut has_woken_lateral = false;
    for id in 0..graph.node_count() {
        if let Some(info) = graph.node(id).growth_info.as_bio() {
            match info.node_type {
                NodeType::Dormant => has_dormant = true,
                NodeType::Branch => has_branch = true,
                _ => {}
            }
            if info.is_lateral && info.node_type != NodeType::Dormant {
                has_woken_lateral = true;
            }
        }
    }
    assert!(has_dormant, "expected remaining dormant buds");
    assert!(has_branch, "expected grown branch nodes");
    assert!(has_woken_lateral, "expected an activated lateral bud");
}

#[test]
fn oak_leaf_has_vein_distance_field() {
    let preset = LeafPreset::find("Oak").unwrap();
    let generator = LeafShapeGenerator::from_preset(preset);
    assert!(generator.enable_venation);

    let mesh = generator.generate();
    let distances = mesh
        .float_attribute("vein_distance")
        .expect("vein_distance attribute");
    assert_eq!(distances.len(), mesh.vertices.len());
    assert!(distances.iter().all(|&d| d >= 0.0));
    assert!(distances.iter().any(|&d| d < 0.5));
}

#[test]
fn billboard_cloud_counts() {
    use glam::Vec3;
    let positions = [
        Vec3::new(0.0, 0.0, 1.0),
        Vec3::new(1.0, 0.0, 2.0),
        Vec3::new(0.0, 1.0, 1.5),
    ];
    let cloud = lod::generate_billboard_cloud(&positions, 5);
    assert_eq!(cloud.vertices.len(), 20);
    assert_eq!(cloud.polygons.len(), 10);
}

#[test]
fn leaf_card_matches_leaf_bounds() {
    let preset = LeafPreset::find("Birch").unwrap();
    let generator = LeafShapeGenerator {
        enable_venation: false,
        ..LeafShapeGenerator::from_preset(preset)
    };
    let leaf = generator.generate();
    let card = lod::generate_card(&leaf);

    let leaf_bounds = leaf.bounds().unwrap();
    let card_bounds = card.bounds().unwrap();
    assert!((leaf_bounds.min.x - card_bounds.min.x).abs() < 0.01);
    assert!((leaf_bounds.max.x - card_bounds.max.x).abs() < 0.01);
    assert!((leaf_bounds.min.y - card_bounds.min.y).abs() < 0.01);
    assert!((leaf_bounds.max.y - card_bounds.max.y).abs() < 0.01);
}

#[test]
fn full_pipeline_is_bit_reproducible() {
    let build = || {
        let chain: Vec<Box<dyn TreeFunction>> = vec![
            Box::new(TrunkFunction::default()),
            Box::new(BranchFunction::default()),
            Box::new(GrowthFunction {
                iterations: 2,
                ..Default::default()
            }),
        ];
        let mut graph = TreeGraph::new();
        execute_pipeline(&mut graph, &chain, 7).unwrap();
        ManifoldMesher::default().mesh_tree(&graph)
    };

    let a = build();
    let b = build();
    assert_eq!(a.vertices.len(), b.vertices.len());
    for (x, y) in a.vertices.iter().zip(&b.vertices) {
        assert_eq!(x, y, "vertex coordinates must be bit-identical");
    }
    assert_eq!(a.polygons, b.polygons);
    for name in [
        attributes::PHYLLOTAXIS_ANGLE,
        attributes::RADIUS,
        attributes::STEM_ID,
    ] {
        assert_eq!(a.float_attribute(name), b.float_attribute(name), "{name}");
    }
}

#[test]
fn full_chain_meshes_cleanly() {
    let chain: Vec<Box<dyn TreeFunction>> = vec![
        Box::new(TrunkFunction::default()),
        Box::new(BranchFunction::default()),
        Box::new(GrowthFunction {
            iterations: 2,
            enable_lateral_branching: false,
            ..Default::default()
        }),
    ];
    let mut graph = TreeGraph::new();
    execute_pipeline(&mut graph, &chain, 3).unwrap();

    // The growth stage re-tagged the whole graph with its node states.
    let tagged = (0..graph.node_count())
        .filter(|&id| graph.node(id).growth_info.as_bio().is_some())
        .count();
    assert_eq!(tagged, graph.node_count());

    let mesh = ManifoldMesher::default().mesh_tree(&graph);
    assert!(mesh.is_valid());
    assert!(mesh.vertices.len() > 100);
    assert_eq!(mesh.uvs.len(), mesh.vertices.len());
}
