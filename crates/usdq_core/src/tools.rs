//! Scene operations over a USDA file path.
//!
//! Each operation opens the file, composes it, answers and drops it again.
//! Results are plain serializable payloads; [`respond`] turns any result
//! into the JSON value handed to a caller, errors becoming
//! `{"error": "<message>"}`.
//!
//! # Example
//!
//! ```ignore
//! use usdq_core::tools;
//!
//! let stats = tools::respond(tools::scene_stats("assets/desk_setup.usda"));
//! println!("{}", serde_json::to_string_pretty(&stats)?);
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::error::{SceneError, SceneResult};
use crate::export::{export_geometry, ExportFormat};
use crate::hierarchy::{prim_tree, PrimNode};
use crate::material::{bound_material, list_materials, MaterialInfo};
use crate::mesh::MeshGeometry;
use crate::stats::{count_prims, extents_mm, world_bounds, SceneCounts};
use crate::usd::{Document, Stage, UpAxis};
use crate::variants::{select_variant, PrimVariants, VariantSelection};
use crate::xform::{prim_transforms, PrimTransform, XformCache};

const STATUS_OK: &str = "ok";

/// Convert an operation result into its JSON response.
pub fn respond<T: Serialize>(result: SceneResult<T>) -> serde_json::Value {
    let payload = match result {
        Ok(payload) => serde_json::to_value(payload),
        Err(e) => {
            log::debug!("Operation failed: {}", e);
            return json!({ "error": e.to_string() });
        }
    };
    payload.unwrap_or_else(|e| json!({ "error": e.to_string() }))
}

/// Full prim hierarchy with stage metrics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneInspection {
    pub scene: Vec<PrimNode>,
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
}

pub fn inspect_scene<P: AsRef<Path>>(path: P) -> SceneResult<SceneInspection> {
    let stage = Stage::open(path)?;
    Ok(SceneInspection {
        scene: prim_tree(&stage),
        up_axis: stage.up_axis(),
        meters_per_unit: stage.meters_per_unit(),
    })
}

/// Type, authored attribute values and bound material of one prim.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimDetails {
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
}

pub fn get_prim<P: AsRef<Path>>(path: P, prim_path: &str) -> SceneResult<PrimDetails> {
    let stage = Stage::open(path)?;
    let prim = stage.require(prim_path)?;

    let attributes = prim
        .attributes
        .iter()
        .filter_map(|attr| Some((attr.name.clone(), attr.resolved_value()?.to_display())))
        .collect();
    let material = if prim.capabilities.gprim {
        bound_material(&stage, prim).map(|m| m.path.clone())
    } else {
        None
    };

    Ok(PrimDetails {
        path: prim.path.clone(),
        type_name: prim.type_name.clone(),
        attributes,
        material,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Materials {
    pub materials: Vec<MaterialInfo>,
}

pub fn get_materials<P: AsRef<Path>>(path: P) -> SceneResult<Materials> {
    let stage = Stage::open(path)?;
    Ok(Materials {
        materials: list_materials(&stage),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Transforms {
    pub transforms: Vec<PrimTransform>,
}

/// Transforms of `prim_path`, or of every xformable prim when `None`.
pub fn get_transforms<P: AsRef<Path>>(path: P, prim_path: Option<&str>) -> SceneResult<Transforms> {
    let stage = Stage::open(path)?;
    Ok(Transforms {
        transforms: prim_transforms(&stage, prim_path)?,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Variants {
    pub variants: Vec<PrimVariants>,
}

pub fn list_variants<P: AsRef<Path>>(path: P) -> SceneResult<Variants> {
    let stage = Stage::open(path)?;
    Ok(Variants {
        variants: crate::variants::list_variants(&stage),
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantChange {
    #[serde(flatten)]
    pub selection: VariantSelection,
    pub status: &'static str,
}

/// Select a variant and save the file.
pub fn set_variant<P: AsRef<Path>>(
    path: P,
    prim_path: &str,
    variant_set: &str,
    variant: &str,
) -> SceneResult<VariantChange> {
    let mut document = Document::open(path)?;
    let selection = select_variant(&mut document, prim_path, variant_set, variant)?;
    Ok(VariantChange {
        selection,
        status: STATUS_OK,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MeshExport {
    pub output: String,
    pub format: ExportFormat,
    pub triangles: usize,
    pub size_bytes: u64,
    pub status: &'static str,
}

/// Triangulate a Mesh prim and write it as `format` (`"stl"` or `"obj"`).
pub fn export_mesh<P: AsRef<Path>, O: AsRef<Path>>(
    path: P,
    prim_path: &str,
    output: O,
    format: &str,
) -> SceneResult<MeshExport> {
    let format: ExportFormat = format.parse()?;
    let stage = Stage::open(path)?;
    let prim = stage
        .get(prim_path)
        .ok_or_else(|| SceneError::NotAMesh(prim_path.to_string()))?;
    let mesh = MeshGeometry::from_prim(prim)?;

    let output = output.as_ref();
    let summary = export_geometry(&mesh, &prim.path, output, format)?;
    Ok(MeshExport {
        output: output.display().to_string(),
        format,
        triangles: summary.triangles,
        size_bytes: summary.size_bytes,
        status: STATUS_OK,
    })
}

/// World-space extent in millimeters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BoundsMm {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneStats {
    #[serde(flatten)]
    pub counts: SceneCounts,
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
    pub bounds_mm: BoundsMm,
}

pub fn scene_stats<P: AsRef<Path>>(path: P) -> SceneResult<SceneStats> {
    let stage = Stage::open(path)?;
    let bounds = world_bounds(&stage, &XformCache::new(&stage));
    let [x, y, z] = extents_mm(&bounds, stage.meters_per_unit());

    Ok(SceneStats {
        counts: count_prims(&stage),
        up_axis: stage.up_axis(),
        meters_per_unit: stage.meters_per_unit(),
        bounds_mm: BoundsMm { x, y, z },
    })
}
