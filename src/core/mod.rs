//! Core types and error handling

pub mod error;
pub mod types;

pub use error::Error;
pub use types::Result;
