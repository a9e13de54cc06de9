//! USDA document support.
//!
//! This module provides parsing, writing and composition of USDA (ASCII)
//! files, producing a [`Stage`] of resolved prims that the query modules
//! read from.
//!
//! ## Supported USD Features
//!
//! - Prim specifiers `def`, `over` and `class`, typed and typeless
//! - Attributes, relationships, connections and time-sampled attributes
//! - Variant sets with authored selections, including nested variant sets
//! - List-edited `apiSchemas` and `variantSets`
//!
//! ## Not Supported
//!
//! - Binary `.usdc` format
//! - References, payloads, inherits and specializes (parsed, not composed)
//! - Sublayers
//!
//! # Example
//!
//! ```ignore
//! use usdq_core::usd::{Document, Stage};
//!
//! let document = Document::open("scene.usda")?;
//! let stage = Stage::compose(&document);
//! for prim in stage.traverse() {
//!     println!("{} ({})", prim.path, prim.type_name);
//! }
//! ```

mod compose;
mod lexer;
mod loader;
mod parser;
mod types;
mod writer;

pub use compose::*;
pub use loader::*;
pub use parser::*;
pub use types::*;
pub use writer::*;
