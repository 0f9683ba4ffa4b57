//! Error types for the generation core

use thiserror::Error;

/// Main error type for the generation core.
///
/// Numerical degeneracies (empty contours, zero-length vectors) are
/// absorbed by the generators themselves; these variants cover caller
/// mistakes at the public API boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("pipeline error: {0}")]
    Pipeline(String),

    #[error("mesh error: {0}")]
    Mesh(String),
}
