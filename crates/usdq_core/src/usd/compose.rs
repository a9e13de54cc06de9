//! Composition of a layer into a stage of resolved prims.
//!
//! Every prim is resolved from an ordered list of opinions, strongest first:
//! the local specs reached through the parent's opinions, followed by the
//! bodies of the selected variants. Variant sets are applied in
//! `variantSets` order, so an earlier set's opinions beat a later set's.
//!
//! Only defined, active prims reach the stage. A prim composed purely from
//! `over`s, or whose strongest specifier is `class`, is pruned together
//! with its subtree.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{SceneError, SceneResult};
use crate::usd::loader::Document;
use crate::usd::types::*;

/// Index of a prim in its stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PrimId(usize);

impl PrimId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Intrinsic shape gprims.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shape {
    Cube,
    Sphere,
    Cylinder,
    Cone,
    Capsule,
    Plane,
}

/// Schema family of a prim, derived from its type name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimKind {
    Untyped,
    Scope,
    Xform,
    Mesh,
    Points,
    Curves,
    Shape(Shape),
    PointInstancer,
    Camera,
    Light,
    Material,
    NodeGraph,
    Shader,
    Other,
}

impl PrimKind {
    pub fn from_type_name(type_name: &str) -> Self {
        match type_name {
            "" => PrimKind::Untyped,
            "Scope" => PrimKind::Scope,
            "Xform" => PrimKind::Xform,
            "Mesh" => PrimKind::Mesh,
            "Points" => PrimKind::Points,
            "BasisCurves" | "NurbsCurves" | "HermiteCurves" => PrimKind::Curves,
            "Cube" => PrimKind::Shape(Shape::Cube),
            "Sphere" => PrimKind::Shape(Shape::Sphere),
            "Cylinder" => PrimKind::Shape(Shape::Cylinder),
            "Cone" => PrimKind::Shape(Shape::Cone),
            "Capsule" => PrimKind::Shape(Shape::Capsule),
            "Plane" => PrimKind::Shape(Shape::Plane),
            "PointInstancer" => PrimKind::PointInstancer,
            "Camera" => PrimKind::Camera,
            "DistantLight" | "DomeLight" | "SphereLight" | "RectLight" | "DiskLight"
            | "CylinderLight" => {
                PrimKind::Light
            }
            "Material" => PrimKind::Material,
            "NodeGraph" => PrimKind::NodeGraph,
            "Shader" => PrimKind::Shader,
            _ => PrimKind::Other,
        }
    }
}

/// Schema capabilities a query can ask a prim for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Carries an xform op stack.
    pub xformable: bool,
    /// Renderable geometry.
    pub gprim: bool,
    /// Has a computable extent.
    pub boundable: bool,
    /// Inputs and outputs can be connected (materials, node graphs, shaders).
    pub connectable: bool,
    /// `MaterialBindingAPI` is applied.
    pub material_binding: bool,
}

impl Capabilities {
    fn new(kind: PrimKind, api_schemas: &[String]) -> Self {
        let gprim = matches!(
            kind,
            PrimKind::Mesh | PrimKind::Points | PrimKind::Curves | PrimKind::Shape(_)
        );
        Self {
            xformable: gprim
                || matches!(
                    kind,
                    PrimKind::Xform | PrimKind::PointInstancer | PrimKind::Camera | PrimKind::Light
                ),
            gprim,
            boundable: gprim || kind == PrimKind::PointInstancer,
            connectable: matches!(
                kind,
                PrimKind::Material | PrimKind::NodeGraph | PrimKind::Shader
            ),
            material_binding: api_schemas.iter().any(|s| s == "MaterialBindingAPI"),
        }
    }
}

/// A resolved attribute.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub type_name: String,
    pub custom: bool,
    pub variability: Variability,
    /// Resolved default value; `None` when unauthored or blocked.
    pub value: Option<Value>,
    pub connections: Vec<String>,
    pub time_samples: Option<Vec<(f64, Value)>>,
    pub metadata: Vec<MetadataEntry>,
}

impl Attribute {
    fn from_spec(spec: &AttributeSpec) -> Self {
        Self {
            name: spec.name.clone(),
            type_name: spec.type_name.clone(),
            custom: spec.custom,
            variability: spec.variability,
            value: spec.default.clone(),
            connections: spec.connections.clone().unwrap_or_default(),
            time_samples: spec.time_samples.clone(),
            metadata: spec.metadata.clone(),
        }
    }

    /// Fill in whatever a stronger opinion left unauthored.
    fn merge_weaker(&mut self, spec: &AttributeSpec, connections_authored: bool) {
        if self.value.is_none() {
            self.value = spec.default.clone();
        }
        if !connections_authored {
            if let Some(connections) = &spec.connections {
                self.connections = connections.clone();
            }
        }
        if self.time_samples.is_none() {
            self.time_samples = spec.time_samples.clone();
        }
        merge_metadata(&mut self.metadata, &spec.metadata);
    }

    /// Value at the default time. Time samples are never evaluated.
    pub fn resolved_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn is_time_sampled(&self) -> bool {
        self.time_samples.is_some()
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        metadata_value(&self.metadata, key)
    }
}

/// A resolved relationship.
#[derive(Clone, Debug, PartialEq)]
pub struct Relationship {
    pub name: String,
    pub targets: Vec<String>,
    pub metadata: Vec<MetadataEntry>,
}

impl Relationship {
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        metadata_value(&self.metadata, key)
    }
}

/// A variant set as seen on a composed prim.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantSet {
    pub name: String,
    /// Variant names in authored order.
    pub options: Vec<String>,
    pub selection: Option<String>,
}

/// A composed prim.
#[derive(Clone, Debug)]
pub struct Prim {
    pub id: PrimId,
    pub path: String,
    pub name: String,
    /// Schema type name; empty for typeless prims.
    pub type_name: String,
    pub kind: PrimKind,
    pub capabilities: Capabilities,
    pub api_schemas: Vec<String>,
    /// Attributes in first-authored order.
    pub attributes: Vec<Attribute>,
    pub relationships: Vec<Relationship>,
    pub variant_sets: Vec<VariantSet>,
    pub metadata: Vec<MetadataEntry>,
    pub parent: Option<PrimId>,
    pub children: Vec<PrimId>,
}

impl Prim {
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Resolved value of attribute `name`.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attribute(name).and_then(Attribute::resolved_value)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn variant_set(&self, name: &str) -> Option<&VariantSet> {
        self.variant_sets.iter().find(|s| s.name == name)
    }

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        metadata_value(&self.metadata, key)
    }

    pub fn has_api(&self, schema: &str) -> bool {
        self.api_schemas.iter().any(|s| s == schema)
    }
}

/// The composed view of a document.
#[derive(Clone, Debug)]
pub struct Stage {
    /// Prims in depth-first pre-order.
    prims: Vec<Prim>,
    roots: Vec<PrimId>,
    index: HashMap<String, PrimId>,
    up_axis: UpAxis,
    meters_per_unit: f64,
}

impl Stage {
    /// Open a USDA file and compose it.
    pub fn open<P: AsRef<Path>>(path: P) -> SceneResult<Self> {
        Ok(Self::compose(&Document::open(path)?))
    }

    /// Compose a parsed document.
    pub fn compose(document: &Document) -> Self {
        let layer = document.layer();
        let mut composer = Composer::default();

        let mut names: Vec<&str> = layer.root_prims.iter().map(|p| p.name.as_str()).collect();
        if let Some(order) = &layer.root_order {
            apply_reorder(&mut names, order);
        }

        let mut roots = Vec::new();
        for name in names {
            let opinions: Vec<Opinion> = layer
                .root_prims
                .iter()
                .filter(|p| p.name == name)
                .map(Opinion::from_spec)
                .collect();
            if let Some(id) = composer.compose_prim(format!("/{}", name), name, None, opinions) {
                roots.push(id);
            }
        }

        log::debug!("Composed {} prims from {}", composer.prims.len(), document.path().display());

        Self {
            prims: composer.prims,
            roots,
            index: composer.index,
            up_axis: document.up_axis(),
            meters_per_unit: document.meters_per_unit(),
        }
    }

    pub fn up_axis(&self) -> UpAxis {
        self.up_axis
    }

    pub fn meters_per_unit(&self) -> f64 {
        self.meters_per_unit
    }

    /// Number of prims reachable by traversal (the pseudo-root is not a prim).
    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    pub fn prim(&self, id: PrimId) -> &Prim {
        &self.prims[id.0]
    }

    pub fn get(&self, path: &str) -> Option<&Prim> {
        self.index.get(path).map(|id| self.prim(*id))
    }

    /// Like [`Stage::get`], failing with [`SceneError::PrimNotFound`].
    pub fn require(&self, path: &str) -> SceneResult<&Prim> {
        self.get(path).ok_or_else(|| SceneError::PrimNotFound(path.to_string()))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Prim> {
        self.roots.iter().map(|id| self.prim(*id))
    }

    pub fn children<'a>(&'a self, prim: &'a Prim) -> impl Iterator<Item = &'a Prim> {
        prim.children.iter().map(|id| self.prim(*id))
    }

    pub fn parent(&self, prim: &Prim) -> Option<&Prim> {
        prim.parent.map(|id| self.prim(id))
    }

    /// Every prim in depth-first pre-order.
    pub fn traverse(&self) -> impl Iterator<Item = &Prim> {
        self.prims.iter()
    }

    /// `prim` and its ancestors, root first.
    pub fn ancestors_and_self<'a>(&'a self, prim: &'a Prim) -> Vec<&'a Prim> {
        let mut chain = vec![prim];
        let mut current = prim;
        while let Some(parent) = self.parent(current) {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }
}

/// One source of opinions for a prim: a prim spec or a selected variant body.
#[derive(Clone, Copy)]
struct Opinion<'a> {
    specifier: Specifier,
    type_name: Option<&'a str>,
    metadata: &'a [MetadataEntry],
    body: &'a PrimBody,
}

impl<'a> Opinion<'a> {
    fn from_spec(spec: &'a PrimSpec) -> Self {
        Self {
            specifier: spec.specifier,
            type_name: spec.type_name.as_deref(),
            metadata: &spec.metadata,
            body: &spec.body,
        }
    }

    fn from_variant(variant: &'a VariantSpec) -> Self {
        Self {
            specifier: Specifier::Over,
            type_name: None,
            metadata: &variant.metadata,
            body: &variant.body,
        }
    }
}

#[derive(Default)]
struct Composer {
    prims: Vec<Prim>,
    index: HashMap<String, PrimId>,
}

impl Composer {
    fn compose_prim<'a>(
        &mut self,
        path: String,
        name: &str,
        parent: Option<PrimId>,
        local: Vec<Opinion<'a>>,
    ) -> Option<PrimId> {
        let (opinions, variant_sets) = expand_variants(local);

        let specifier = opinions
            .iter()
            .map(|o| o.specifier)
            .find(|s| *s != Specifier::Over)
            .unwrap_or(Specifier::Over);
        if specifier != Specifier::Def {
            log::debug!("Skipping {} ({} only)", path, specifier.keyword());
            return None;
        }

        let mut metadata = Vec::new();
        for opinion in &opinions {
            merge_metadata(&mut metadata, opinion.metadata);
        }
        if matches!(metadata_value(&metadata, "active"), Some(Value::Bool(false))) {
            log::debug!("Skipping inactive prim {}", path);
            return None;
        }

        let type_name = opinions
            .iter()
            .find_map(|o| o.type_name)
            .unwrap_or_default()
            .to_string();
        let kind = PrimKind::from_type_name(&type_name);
        let api_schemas = apply_list_ops(&opinions, "apiSchemas");
        let capabilities = Capabilities::new(kind, &api_schemas);

        let id = PrimId(self.prims.len());
        self.index.insert(path.clone(), id);
        self.prims.push(Prim {
            id,
            path: path.clone(),
            name: name.to_string(),
            type_name,
            kind,
            capabilities,
            api_schemas,
            attributes: compose_attributes(&opinions),
            relationships: compose_relationships(&opinions),
            variant_sets,
            metadata,
            parent,
            children: Vec::new(),
        });

        let mut child_names: Vec<&str> = Vec::new();
        for opinion in &opinions {
            for child in &opinion.body.children {
                if !child_names.contains(&child.name.as_str()) {
                    child_names.push(&child.name);
                }
            }
        }
        if let Some(order) = opinions.iter().find_map(|o| o.body.child_order.as_ref()) {
            apply_reorder(&mut child_names, order);
        }

        let mut children = Vec::new();
        for child_name in child_names {
            let child_opinions: Vec<Opinion<'a>> = opinions
                .iter()
                .filter_map(|o| o.body.child(child_name))
                .map(Opinion::from_spec)
                .collect();
            let child_path = format!("{}/{}", path, child_name);
            if let Some(child_id) =
                self.compose_prim(child_path, child_name, Some(id), child_opinions)
            {
                children.push(child_id);
            }
        }
        self.prims[id.0].children = children;

        Some(id)
    }
}

/// Append the bodies of selected variants to `opinions`, one variant set at
/// a time, and report every variant set the prim carries.
fn expand_variants(mut opinions: Vec<Opinion<'_>>) -> (Vec<Opinion<'_>>, Vec<VariantSet>) {
    let mut applied: Vec<String> = Vec::new();
    loop {
        let next = variant_set_names(&opinions)
            .into_iter()
            .find(|name| !applied.contains(name));
        let Some(set_name) = next else {
            break;
        };

        if let Some(selection) = variant_selection(&opinions, &set_name) {
            let selected: Vec<Opinion> = opinions
                .iter()
                .flat_map(|o| o.body.variant_sets.iter())
                .filter(|set| set.name == set_name)
                .flat_map(|set| set.variants.iter())
                .filter(|v| v.name == selection)
                .map(Opinion::from_variant)
                .collect();
            opinions.extend(selected);
        }
        applied.push(set_name);
    }

    let sets = variant_set_names(&opinions)
        .into_iter()
        .map(|name| {
            let mut options: Vec<String> = Vec::new();
            for set in opinions
                .iter()
                .flat_map(|o| o.body.variant_sets.iter())
                .filter(|set| set.name == name)
            {
                for variant in &set.variants {
                    if !options.contains(&variant.name) {
                        options.push(variant.name.clone());
                    }
                }
            }
            let selection = variant_selection(&opinions, &name);
            VariantSet {
                name,
                options,
                selection,
            }
        })
        .collect();

    (opinions, sets)
}

/// Declared sets (`variantSets` list op), then any set that only has a block.
fn variant_set_names(opinions: &[Opinion]) -> Vec<String> {
    let mut names = apply_list_ops(opinions, "variantSets");
    for opinion in opinions {
        for set in &opinion.body.variant_sets {
            if !names.contains(&set.name) {
                names.push(set.name.clone());
            }
        }
    }
    names
}

/// Strongest authored selection for `set`.
fn variant_selection(opinions: &[Opinion], set: &str) -> Option<String> {
    opinions.iter().find_map(|o| {
        metadata_value(o.metadata, "variants")?
            .as_dictionary()?
            .iter()
            .find(|entry| entry.key == set)?
            .value
            .as_str()
            .map(str::to_string)
    })
}

/// Apply list-edited metadata from weakest to strongest opinion.
fn apply_list_ops(opinions: &[Opinion], key: &str) -> Vec<String> {
    let mut result: Vec<String> = Vec::new();
    for opinion in opinions.iter().rev() {
        for entry in opinion.metadata.iter().filter(|e| e.key == key) {
            let items = entry.value.as_string_list().unwrap_or_default();
            match entry.list_op {
                None => result = items,
                Some(ListOp::Prepend) => {
                    result.retain(|r| !items.contains(r));
                    result.splice(0..0, items);
                }
                Some(ListOp::Append) => {
                    result.retain(|r| !items.contains(r));
                    result.extend(items);
                }
                Some(ListOp::Add) => {
                    for item in items {
                        if !result.contains(&item) {
                            result.push(item);
                        }
                    }
                }
                Some(ListOp::Delete) => result.retain(|r| !items.contains(r)),
                Some(ListOp::Reorder) => {
                    let mut names: Vec<&str> = result.iter().map(String::as_str).collect();
                    apply_reorder(&mut names, &items);
                    result = names.into_iter().map(str::to_string).collect();
                }
            }
        }
    }
    result
}

/// Move the names listed in `order` to the front, in that order; the rest
/// keep their relative order.
fn apply_reorder<'a>(names: &mut Vec<&'a str>, order: &[String]) {
    let mut reordered: Vec<&'a str> = order
        .iter()
        .filter_map(|wanted| names.iter().copied().find(|n| *n == wanted.as_str()))
        .collect();
    let rest: Vec<&'a str> = names.iter().copied().filter(|n| !reordered.contains(n)).collect();
    reordered.extend(rest);
    *names = reordered;
}

/// Add explicit entries from `weaker` whose keys `stronger` lacks.
fn merge_metadata(stronger: &mut Vec<MetadataEntry>, weaker: &[MetadataEntry]) {
    for entry in weaker.iter().filter(|e| e.list_op.is_none()) {
        if !stronger.iter().any(|s| s.key == entry.key && s.list_op.is_none()) {
            stronger.push(entry.clone());
        }
    }
}

fn compose_attributes(opinions: &[Opinion]) -> Vec<Attribute> {
    let mut attributes: Vec<Attribute> = Vec::new();
    let mut connections_authored: Vec<bool> = Vec::new();

    for opinion in opinions {
        for property in &opinion.body.properties {
            let PropertySpec::Attribute(spec) = property else {
                continue;
            };
            match attributes.iter().position(|a| a.name == spec.name) {
                Some(i) => {
                    attributes[i].merge_weaker(spec, connections_authored[i]);
                    connections_authored[i] |= spec.connections.is_some();
                }
                None => {
                    attributes.push(Attribute::from_spec(spec));
                    connections_authored.push(spec.connections.is_some());
                }
            }
        }
    }

    for attr in &mut attributes {
        if attr.value == Some(Value::Blocked) {
            attr.value = None;
        }
    }
    attributes
}

fn compose_relationships(opinions: &[Opinion]) -> Vec<Relationship> {
    let mut relationships: Vec<Relationship> = Vec::new();
    let mut targets_authored: Vec<bool> = Vec::new();

    for opinion in opinions {
        for property in &opinion.body.properties {
            let PropertySpec::Relationship(spec) = property else {
                continue;
            };
            match relationships.iter().position(|r| r.name == spec.name) {
                Some(i) => {
                    if !targets_authored[i] {
                        if let Some(targets) = &spec.targets {
                            relationships[i].targets = targets.clone();
                            targets_authored[i] = true;
                        }
                    }
                    merge_metadata(&mut relationships[i].metadata, &spec.metadata);
                }
                None => {
                    relationships.push(Relationship {
                        name: spec.name.clone(),
                        targets: spec.targets.clone().unwrap_or_default(),
                        metadata: spec.metadata.clone(),
                    });
                    targets_authored.push(spec.targets.is_some());
                }
            }
        }
    }
    relationships
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(src: &str) -> Stage {
        Stage::compose(&Document::from_string(src, "test.usda").unwrap())
    }

    const PRODUCT: &str = r#"#usda 1.0
def Xform "Product" (
    variants = {
        string color = "red"
        string size = "large"
    }
    prepend variantSets = ["size", "color"]
)
{
    double3 xformOp:translate = (0, 75, 0)
    float width = 1

    def Mesh "Body"
    {
    }

    variantSet "size" = {
        "small" {
            double3 xformOp:translate = (9, 9, 9)
            float height = 1
        }
        "large" {
            double3 xformOp:translate = (9, 9, 9)
            float height = 3
            float depth = 3

            over "Body"
            {
                float thickness = 2
            }

            def Xform "Handle"
            {
            }
        }
    }

    variantSet "color" = {
        "red" {
            float depth = 7
            color3f tint = (1, 0, 0)
        }
        "blue" {
            color3f tint = (0, 0, 1)
        }
    }
}
"#;

    #[test]
    fn test_local_opinion_beats_variant() {
        let stage = stage(PRODUCT);
        let product = stage.get("/Product").unwrap();
        assert_eq!(
            product.value("xformOp:translate").and_then(Value::as_vec3),
            Some(usdq_math::Vec3::new(0.0, 75.0, 0.0))
        );
        assert_eq!(product.value("height"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn test_earlier_variant_set_is_stronger() {
        let stage = stage(PRODUCT);
        let product = stage.get("/Product").unwrap();
        assert_eq!(product.value("depth"), Some(&Value::Number(3.0)));
        assert_eq!(
            product.value("tint").and_then(Value::as_vec3),
            Some(usdq_math::Vec3::new(1.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_variant_contributes_children_and_overs() {
        let stage = stage(PRODUCT);
        let product = stage.get("/Product").unwrap();
        let names: Vec<_> = stage.children(product).map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Body", "Handle"]);

        let body = stage.get("/Product/Body").unwrap();
        assert_eq!(body.kind, PrimKind::Mesh);
        assert_eq!(body.value("thickness"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn test_variant_set_listing() {
        let stage = stage(PRODUCT);
        let product = stage.get("/Product").unwrap();
        let sets: Vec<_> = product.variant_sets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(sets, ["size", "color"]);

        let size = product.variant_set("size").unwrap();
        assert_eq!(size.options, ["small", "large"]);
        assert_eq!(size.selection.as_deref(), Some("large"));
    }

    #[test]
    fn test_traversal_is_preorder_and_indexed() {
        let stage = stage(PRODUCT);
        let paths: Vec<_> = stage.traverse().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/Product", "/Product/Body", "/Product/Handle"]);
        assert_eq!(stage.len(), 3);

        let handle = stage.get("/Product/Handle").unwrap();
        assert_eq!(stage.parent(handle).map(|p| p.path.as_str()), Some("/Product"));
        let chain: Vec<_> = stage
            .ancestors_and_self(handle)
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(chain, ["Product", "Handle"]);
    }

    #[test]
    fn test_over_and_class_prims_are_pruned() {
        let stage = stage(
            r#"#usda 1.0
over "Ghost"
{
    def Mesh "Hidden" {}
}
class Xform "_Template" {}
def Xform "Real" (
    active = true
)
{
    def Xform "Off" (
        active = false
    )
    {
    }
}
"#,
        );
        let paths: Vec<_> = stage.traverse().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, ["/Real"]);
        assert!(matches!(stage.require("/Ghost/Hidden"), Err(SceneError::PrimNotFound(_))));
    }

    #[test]
    fn test_api_schema_list_ops_and_capabilities() {
        let stage = stage(
            r#"#usda 1.0
def Mesh "Box" (
    prepend apiSchemas = ["MaterialBindingAPI"]
)
{
}
def Scope "Looks" {}
def Material "Mat" {}
"#,
        );
        let mesh = stage.get("/Box").unwrap();
        assert!(mesh.has_api("MaterialBindingAPI"));
        assert!(mesh.capabilities.material_binding);
        assert!(mesh.capabilities.gprim);
        assert!(mesh.capabilities.xformable);
        assert!(mesh.capabilities.boundable);

        let scope = stage.get("/Looks").unwrap();
        assert!(!scope.capabilities.xformable);

        let mat = stage.get("/Mat").unwrap();
        assert!(mat.capabilities.connectable);
        assert!(!mat.capabilities.gprim);
    }

    #[test]
    fn test_list_op_application() {
        let spec_a = vec![MetadataEntry {
            list_op: Some(ListOp::Prepend),
            key: "apiSchemas".into(),
            value: Value::List(vec![Value::String("A".into())]),
        }];
        let spec_b = vec![
            MetadataEntry::new(
                "apiSchemas",
                Value::List(vec![Value::String("B".into()), Value::String("C".into())]),
            ),
        ];
        let spec_c = vec![MetadataEntry {
            list_op: Some(ListOp::Delete),
            key: "apiSchemas".into(),
            value: Value::List(vec![Value::String("C".into())]),
        }];
        let body = PrimBody::default();
        fn op<'a>(metadata: &'a [MetadataEntry], body: &'a PrimBody) -> Opinion<'a> {
            Opinion {
                specifier: Specifier::Over,
                type_name: None,
                metadata,
                body,
            }
        }
        // Strongest first: delete C, prepend A, explicit [B, C].
        let opinions = [op(&spec_c, &body), op(&spec_a, &body), op(&spec_b, &body)];
        assert_eq!(apply_list_ops(&opinions, "apiSchemas"), ["A", "B"]);
    }

    #[test]
    fn test_reorder_name_children() {
        let stage = stage(
            r#"#usda 1.0
def Xform "Root"
{
    reorder nameChildren = ["C", "A"]
    def "A" {}
    def "B" {}
    def "C" {}
}
"#,
        );
        let root = stage.get("/Root").unwrap();
        let names: Vec<_> = stage.children(root).map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["C", "A", "B"]);
    }

    #[test]
    fn test_blocked_value_and_unevaluated_time_samples() {
        let stage = stage(
            r#"#usda 1.0
def Xform "A"
{
    float blocked = None
    float spin.timeSamples = {
        24: 360,
        0: 0,
    }
}
"#,
        );
        let a = stage.get("/A").unwrap();
        assert!(a.attribute("blocked").is_some());
        assert_eq!(a.value("blocked"), None);
        assert_eq!(a.value("spin"), None);
        assert!(a.attribute("spin").unwrap().is_time_sampled());
    }

    #[test]
    fn test_nested_variant_selection() {
        let stage = stage(
            r#"#usda 1.0
def Xform "Lamp" (
    variants = {
        string style = "modern"
    }
)
{
    variantSet "style" = {
        "modern" (
            variants = {
                string shade = "glass"
            }
        ) {
            variantSet "shade" = {
                "glass" {
                    float opacity = 0.5
                }
                "paper" {
                    float opacity = 1
                }
            }
        }
    }
}
"#,
        );
        let lamp = stage.get("/Lamp").unwrap();
        assert_eq!(lamp.value("opacity"), Some(&Value::Number(0.5)));
        let shade = lamp.variant_set("shade").unwrap();
        assert_eq!(shade.options, ["glass", "paper"]);
        assert_eq!(shade.selection.as_deref(), Some("glass"));
    }
}
