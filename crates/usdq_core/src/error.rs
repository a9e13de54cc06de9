//! Error type shared by every scene query and edit.

use std::path::PathBuf;

use thiserror::Error;

use crate::usd::ParseError;

/// Errors that can occur while opening, querying or editing a scene.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to open USD stage {}: {source}", path.display())]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    #[error("Not a valid mesh prim: {0}")]
    NotAMesh(String),

    #[error("Mesh has no geometry data: {0}")]
    EmptyGeometry(String),

    #[error("Invalid mesh geometry on {path}: {reason}")]
    InvalidGeometry { path: String, reason: String },

    #[error("Variant set not found: {set} on {prim}")]
    VariantSetNotFound { prim: String, set: String },

    #[error("Variant not found: {variant}. Available: {}", .options.join(", "))]
    VariantNotFound { variant: String, options: Vec<String> },

    #[error("Unsupported export format: {0} (expected stl or obj)")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;
