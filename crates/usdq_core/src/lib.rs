//! usdq Core - Query, edit and export of USDA scene files.
//!
//! This crate provides:
//!
//! - **USD support**: USDA parsing, writing and composition into a [`Stage`]
//! - **Queries**: hierarchy, attributes, material bindings, transforms,
//!   variant sets and scene statistics
//! - **Editing**: persistent variant selection
//! - **Export**: triangulated meshes as binary STL or OBJ
//!
//! # Example
//!
//! ```ignore
//! use usdq_core::tools;
//!
//! let stats = tools::scene_stats("assets/desk_setup.usda")?;
//! println!("{} prims, {} meshes", stats.counts.prim_count, stats.counts.mesh_count);
//!
//! let response = tools::respond(tools::get_prim("assets/desk_setup.usda", "/Desk/Table/Top"));
//! println!("{}", response);
//! ```

pub mod error;
pub mod export;
pub mod hierarchy;
pub mod material;
pub mod mesh;
pub mod stats;
pub mod tools;
pub mod usd;
pub mod variants;
pub mod xform;

// Re-export commonly used types
pub use error::{SceneError, SceneResult};
pub use export::ExportFormat;
pub use mesh::MeshGeometry;
pub use usd::{Document, Prim, Stage};
pub use xform::XformCache;
