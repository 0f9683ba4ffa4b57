//! Skeleton graph shared by the tree function pipeline and the mesher

pub mod graph;
pub mod node;
pub mod pipeline;

pub use graph::{NodeId, TreeGraph};
pub use node::{BioNodeInfo, BranchGrowthInfo, GrowthInfo, Node, NodeChild, NodeType, Stem};
pub use pipeline::{execute_pipeline, FunctionContext, TreeFunction};
