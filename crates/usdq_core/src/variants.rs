//! Variant set listing and persistent variant selection.

use serde::Serialize;

use crate::error::{SceneError, SceneResult};
use crate::usd::{DictEntry, Document, MetadataEntry, PrimSpec, Stage, Value};

const VARIANTS: &str = "variants";

/// One variant set with its options and current selection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VariantSetInfo {
    pub name: String,
    pub options: Vec<String>,
    pub selected: Option<String>,
}

/// A prim carrying at least one variant set.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimVariants {
    pub path: String,
    pub variant_sets: Vec<VariantSetInfo>,
}

/// Every prim with variant sets, in traversal order.
pub fn list_variants(stage: &Stage) -> Vec<PrimVariants> {
    stage
        .traverse()
        .filter(|prim| !prim.variant_sets.is_empty())
        .map(|prim| PrimVariants {
            path: prim.path.clone(),
            variant_sets: prim
                .variant_sets
                .iter()
                .map(|set| VariantSetInfo {
                    name: set.name.clone(),
                    options: set.options.clone(),
                    selected: set.selection.clone(),
                })
                .collect(),
        })
        .collect()
}

/// Result of [`select_variant`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VariantSelection {
    pub path: String,
    pub variant_set: String,
    pub selected: String,
    /// False when the variant was already selected and nothing was written.
    pub changed: bool,
}

/// Author `variant` as the selection of `set` on `prim_path` and save the
/// document.
///
/// The selection is written into the prim's local spec, creating `over`s
/// along the path when the prim only exists through composition.
pub fn select_variant(
    document: &mut Document,
    prim_path: &str,
    set: &str,
    variant: &str,
) -> SceneResult<VariantSelection> {
    let stage = Stage::compose(document);
    let prim = stage.require(prim_path)?;
    let variant_set = prim.variant_set(set).ok_or_else(|| SceneError::VariantSetNotFound {
        prim: prim_path.to_string(),
        set: set.to_string(),
    })?;
    if !variant_set.options.iter().any(|o| o == variant) {
        return Err(SceneError::VariantNotFound {
            variant: variant.to_string(),
            options: variant_set.options.clone(),
        });
    }

    let selection = VariantSelection {
        path: prim_path.to_string(),
        variant_set: set.to_string(),
        selected: variant.to_string(),
        changed: variant_set.selection.as_deref() != Some(variant),
    };
    if !selection.changed {
        log::debug!("{}: {} is already {}", prim_path, set, variant);
        return Ok(selection);
    }

    author_selection(document.layer_mut().override_spec(prim_path), set, variant);
    document.commit()?;
    log::info!("{}: set {} = {} in {}", prim_path, set, variant, document.path().display());
    Ok(selection)
}

/// Set one entry of a prim spec's `variants` dictionary, keeping the others.
fn author_selection(spec: &mut PrimSpec, set: &str, variant: &str) {
    let index = match spec
        .metadata
        .iter()
        .position(|e| e.key == VARIANTS && e.list_op.is_none())
    {
        Some(index) => index,
        None => {
            spec.metadata.push(MetadataEntry::new(VARIANTS, Value::Dictionary(Vec::new())));
            spec.metadata.len() - 1
        }
    };

    let slot = &mut spec.metadata[index].value;
    if !matches!(slot, Value::Dictionary(_)) {
        log::warn!("{}: replacing malformed variants metadata {}", spec.name, slot);
        *slot = Value::Dictionary(Vec::new());
    }
    let Value::Dictionary(entries) = slot else {
        return;
    };

    let value = Value::String(variant.to_string());
    match entries.iter_mut().find(|e| e.key == set) {
        Some(existing) => existing.value = value,
        None => entries.push(DictEntry {
            type_name: "string".to_string(),
            key: set.to_string(),
            value,
        }),
    }
}
