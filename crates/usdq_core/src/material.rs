//! Material binding and shader parameter resolution.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::usd::{Prim, PrimKind, Stage};

const BINDING: &str = "material:binding";
const SURFACE_OUTPUT: &str = "outputs:surface";
const STRONGER_THAN_DESCENDANTS: &str = "strongerThanDescendants";

/// Node-graph hops followed before giving up on a surface connection.
const MAX_CONNECTION_DEPTH: usize = 8;

/// The material bound to `prim`, if any.
///
/// Bindings are collected from the root down to `prim`; the nearest one
/// wins unless an ancestor's binding is marked `strongerThanDescendants`.
pub fn bound_material<'a>(stage: &'a Stage, prim: &'a Prim) -> Option<&'a Prim> {
    let mut winner: Option<(&str, bool)> = None;

    for node in stage.ancestors_and_self(prim) {
        let Some(binding) = node.relationship(BINDING) else {
            continue;
        };
        let Some(target) = binding.targets.first() else {
            continue;
        };
        if matches!(winner, Some((_, true))) {
            continue;
        }
        let strong = binding
            .metadata("bindMaterialAs")
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == STRONGER_THAN_DESCENDANTS);
        winner = Some((target.as_str(), strong));
    }

    let (target, _) = winner?;
    match stage.get(target) {
        Some(material) if material.kind == PrimKind::Material => Some(material),
        Some(other) => {
            log::warn!(
                "{}: binding target {} is a {}, not a Material",
                prim.path,
                target,
                other.type_name
            );
            None
        }
        None => {
            log::warn!("{}: binding target {} does not exist", prim.path, target);
            None
        }
    }
}

/// Split `/Mat/Shader.outputs:surface` into prim path and property name.
fn split_property_path(path: &str) -> Option<(&str, &str)> {
    let slash = path.rfind('/')?;
    let dot = path[slash..].find('.')? + slash;
    Some((&path[..dot], &path[dot + 1..]))
}

/// The shader driving `material`'s surface output.
///
/// Connections through node graphs are followed until a Shader is reached.
pub fn surface_shader<'a>(stage: &'a Stage, material: &'a Prim) -> Option<&'a Prim> {
    let mut target = material.attribute(SURFACE_OUTPUT)?.connections.first()?;

    for _ in 0..MAX_CONNECTION_DEPTH {
        let (prim_path, property) = split_property_path(target)?;
        let source = stage.get(prim_path)?;
        if source.kind == PrimKind::Shader {
            return Some(source);
        }
        target = source.attribute(property)?.connections.first()?;
    }

    log::warn!("{}: surface connection chain is too deep", material.path);
    None
}

/// Display values of every `inputs:` attribute with a value, by base name.
pub fn shader_params(shader: &Prim) -> BTreeMap<String, String> {
    shader
        .attributes
        .iter()
        .filter_map(|attr| {
            let base = attr.name.strip_prefix("inputs:")?;
            let value = attr.resolved_value()?;
            Some((base.to_string(), value.to_display()))
        })
        .collect()
}

/// A material with its surface shader's parameters.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaterialInfo {
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shader: Option<String>,
    pub params: BTreeMap<String, String>,
}

/// Every Material prim in traversal order.
pub fn list_materials(stage: &Stage) -> Vec<MaterialInfo> {
    stage
        .traverse()
        .filter(|p| p.kind == PrimKind::Material)
        .map(|material| {
            let shader = surface_shader(stage, material);
            if shader.is_none() {
                log::debug!("{}: no connected surface shader", material.path);
            }
            MaterialInfo {
                path: material.path.clone(),
                shader: shader.map(|s| s.path.clone()),
                params: shader.map(shader_params).unwrap_or_default(),
            }
        })
        .collect()
}
