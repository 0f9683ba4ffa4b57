//! Tree functions: the stages of the skeleton pipeline

pub mod branch;
pub mod crown;
pub mod growth;
pub mod property;
pub mod trunk;

pub use branch::{BranchFunction, CrownParams, DistributionParams, GravityParams, SplitParams};
pub use crown::{shape_ratio, CrownShape};
pub use growth::GrowthFunction;
pub use property::Property;
pub use trunk::TrunkFunction;
