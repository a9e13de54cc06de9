//! Authored layer model.
//!
//! These types mirror what is written in a USDA file, opinion for opinion.
//! Nothing here is composed: a `PrimSpec` is one `def`/`over`/`class` block
//! and a `VariantSpec` is one variant body. Composition into resolved prims
//! happens in [`crate::usd::compose`].

use std::fmt;

use serde::Serialize;

use usdq_math::{Mat4, Mat4Ext, Quat, Vec3};

/// Prim specifier keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }
}

/// List-editing operation prefix (`prepend apiSchemas = [...]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListOp {
    Prepend,
    Append,
    Add,
    Delete,
    Reorder,
}

impl ListOp {
    pub fn keyword(self) -> &'static str {
        match self {
            ListOp::Prepend => "prepend",
            ListOp::Append => "append",
            ListOp::Add => "add",
            ListOp::Delete => "delete",
            ListOp::Reorder => "reorder",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "prepend" => Some(ListOp::Prepend),
            "append" => Some(ListOp::Append),
            "add" => Some(ListOp::Add),
            "delete" => Some(ListOp::Delete),
            "reorder" => Some(ListOp::Reorder),
            _ => None,
        }
    }
}

/// Document up axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum UpAxis {
    X,
    #[default]
    Y,
    Z,
}

impl UpAxis {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "X" => Some(UpAxis::X),
            "Y" => Some(UpAxis::Y),
            "Z" => Some(UpAxis::Z),
            _ => None,
        }
    }
}

impl fmt::Display for UpAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpAxis::X => "X",
            UpAxis::Y => "Y",
            UpAxis::Z => "Z",
        };
        f.write_str(s)
    }
}

/// A literal value as written in USDA.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// `None`: an explicitly blocked opinion.
    Blocked,
    Bool(bool),
    Number(f64),
    String(String),
    /// A bare identifier (`inherited`, `public`, ...).
    Token(String),
    /// `@path@`
    Asset(String),
    /// `@path@</Prim>`
    Reference { asset: String, prim: String },
    /// `</Prim/Path.property>`
    Path(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dictionary(Vec<DictEntry>),
}

/// One `type key = value` entry of a dictionary literal.
#[derive(Clone, Debug, PartialEq)]
pub struct DictEntry {
    pub type_name: String,
    pub key: String,
    pub value: Value,
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|n| n as f32)
    }

    /// String or token contents.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&str> {
        match self {
            Value::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Components of a numeric tuple like `(1, 2, 3)`.
    pub fn as_numbers(&self) -> Option<Vec<f64>> {
        match self {
            Value::Tuple(items) => items.iter().map(Value::as_f64).collect(),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self.as_numbers()?.as_slice() {
            [x, y, z] => Some(Vec3::new(*x as f32, *y as f32, *z as f32)),
            _ => None,
        }
    }

    /// Quaternion literal, written real part first: `(w, x, y, z)`.
    pub fn as_quat(&self) -> Option<Quat> {
        match self.as_numbers()?.as_slice() {
            [w, x, y, z] => Some(Quat::from_xyzw(*x as f32, *y as f32, *z as f32, *w as f32)),
            _ => None,
        }
    }

    /// 4x4 matrix literal in document row order.
    pub fn as_matrix(&self) -> Option<Mat4> {
        let Value::Tuple(rows) = self else {
            return None;
        };
        if rows.len() != 4 {
            return None;
        }
        let mut out = [[0.0f32; 4]; 4];
        for (r, row) in rows.iter().enumerate() {
            match row.as_numbers()?.as_slice() {
                [a, b, c, d] => out[r] = [*a as f32, *b as f32, *c as f32, *d as f32],
                _ => return None,
            }
        }
        Some(Mat4::from_document_rows(out))
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vec3_array(&self) -> Option<Vec<Vec3>> {
        self.as_list()?.iter().map(Value::as_vec3).collect()
    }

    /// Integer array. Non-integral numbers make the whole array invalid.
    pub fn as_int_array(&self) -> Option<Vec<i32>> {
        self.as_list()?
            .iter()
            .map(|v| {
                let n = v.as_f64()?;
                let integral = n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64;
                integral.then_some(n as i32)
            })
            .collect()
    }

    /// A list of strings/tokens, or a single string promoted to a list.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match self {
            Value::String(s) | Value::Token(s) => Some(vec![s.clone()]),
            Value::List(items) => items.iter().map(|v| v.as_str().map(str::to_string)).collect(),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&[DictEntry]> {
        match self {
            Value::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }

    /// Human-facing rendering used by queries: top-level strings and tokens
    /// are shown bare, everything else as its USDA literal.
    pub fn to_display(&self) -> String {
        match self {
            Value::String(s) | Value::Token(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Format a number the way USDA writes it (`75`, `0.55`, `-inf`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n.is_infinite() {
        let s = if n > 0.0 { "inf" } else { "-inf" };
        s.to_string()
    } else {
        format!("{}", n)
    }
}

/// Quote and escape a string literal.
pub fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn write_asset(f: &mut fmt::Formatter<'_>, asset: &str) -> fmt::Result {
    if asset.contains('@') {
        write!(f, "@@@{}@@@", asset)
    } else {
        write!(f, "@{}@", asset)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Value]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Blocked => f.write_str("None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::String(s) => f.write_str(&quote_string(s)),
            Value::Token(t) => f.write_str(t),
            Value::Asset(a) => write_asset(f, a),
            Value::Reference { asset, prim } => {
                write_asset(f, asset)?;
                write!(f, "<{}>", prim)
            }
            Value::Path(p) => write!(f, "<{}>", p),
            Value::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                f.write_str(")")
            }
            Value::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Value::Dictionary(entries) => {
                f.write_str("{")?;
                for (i, entry) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(";")?;
                    }
                    write!(f, " {} {} = {}", entry.type_name, quote_key(&entry.key), entry.value)?;
                }
                f.write_str(" }")
            }
        }
    }
}

/// Dictionary keys are written bare when they are identifiers.
pub fn quote_key(key: &str) -> String {
    let bare = key
        .chars()
        .enumerate()
        .all(|(i, c)| {
            c == '_' || c.is_ascii_alphabetic() || (i > 0 && (c.is_ascii_digit() || c == ':'))
        });
    if bare && !key.is_empty() {
        key.to_string()
    } else {
        quote_string(key)
    }
}

/// A metadata entry: `[listop] key = value`.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataEntry {
    pub list_op: Option<ListOp>,
    pub key: String,
    pub value: Value,
}

impl MetadataEntry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            list_op: None,
            key: key.into(),
            value,
        }
    }
}

/// Explicit (non list-op) value of `key`, if authored.
pub fn metadata_value<'a>(entries: &'a [MetadataEntry], key: &str) -> Option<&'a Value> {
    entries
        .iter()
        .find(|e| e.key == key && e.list_op.is_none())
        .map(|e| &e.value)
}

/// Attribute variability qualifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
}

/// One authored attribute, merged across its declaration, `.connect` and
/// `.timeSamples` statements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeSpec {
    pub custom: bool,
    pub variability: Variability,
    /// Value type, including the `[]` suffix for arrays.
    pub type_name: String,
    pub name: String,
    pub default: Option<Value>,
    pub connections: Option<Vec<String>>,
    pub connection_list_op: Option<ListOp>,
    pub time_samples: Option<Vec<(f64, Value)>>,
    pub metadata: Vec<MetadataEntry>,
}

/// One authored relationship.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelationshipSpec {
    pub custom: bool,
    pub list_op: Option<ListOp>,
    pub name: String,
    /// `None` when declared without targets.
    pub targets: Option<Vec<String>>,
    pub metadata: Vec<MetadataEntry>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertySpec {
    Attribute(AttributeSpec),
    Relationship(RelationshipSpec),
}

impl PropertySpec {
    pub fn name(&self) -> &str {
        match self {
            PropertySpec::Attribute(a) => &a.name,
            PropertySpec::Relationship(r) => &r.name,
        }
    }
}

/// Statements inside a prim or variant block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimBody {
    pub properties: Vec<PropertySpec>,
    pub children: Vec<PrimSpec>,
    pub variant_sets: Vec<VariantSetSpec>,
    /// `reorder nameChildren = [...]`
    pub child_order: Option<Vec<String>>,
    /// `reorder properties = [...]`
    pub property_order: Option<Vec<String>>,
}

impl PrimBody {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
            && self.children.is_empty()
            && self.variant_sets.is_empty()
            && self.child_order.is_none()
            && self.property_order.is_none()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.properties.iter().find_map(|p| match p {
            PropertySpec::Attribute(a) if a.name == name => Some(a),
            _ => None,
        })
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipSpec> {
        self.properties.iter().find_map(|p| match p {
            PropertySpec::Relationship(r) if r.name == name => Some(r),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// A `def`/`over`/`class` block.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimSpec {
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub name: String,
    pub metadata: Vec<MetadataEntry>,
    pub body: PrimBody,
}

impl PrimSpec {
    pub fn new(specifier: Specifier, type_name: Option<&str>, name: impl Into<String>) -> Self {
        Self {
            specifier,
            type_name: type_name.map(str::to_string),
            name: name.into(),
            metadata: Vec::new(),
            body: PrimBody::default(),
        }
    }

    /// A typeless `over`, used when authoring onto a prim with no local spec.
    pub fn over(name: impl Into<String>) -> Self {
        Self::new(Specifier::Over, None, name)
    }
}

/// `variantSet "name" = { ... }`
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantSetSpec {
    pub name: String,
    pub variants: Vec<VariantSpec>,
}

/// One `"variant" { ... }` body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantSpec {
    pub name: String,
    pub metadata: Vec<MetadataEntry>,
    pub body: PrimBody,
}

/// A parsed USDA file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Layer {
    pub metadata: Vec<MetadataEntry>,
    pub root_prims: Vec<PrimSpec>,
    /// `reorder rootPrims = [...]`
    pub root_order: Option<Vec<String>>,
}

impl Layer {
    /// Fallback when `metersPerUnit` is not authored (centimeters).
    pub const DEFAULT_METERS_PER_UNIT: f64 = 0.01;

    pub fn metadata(&self, key: &str) -> Option<&Value> {
        metadata_value(&self.metadata, key)
    }

    /// Local spec at `path`, if the layer authors one.
    pub fn spec_at_path(&self, path: &str) -> Option<&PrimSpec> {
        let mut names = path.trim_start_matches('/').split('/');
        let first = names.next()?;
        let mut spec = self.root_prims.iter().find(|s| s.name == first)?;
        for name in names {
            spec = spec.body.child(name)?;
        }
        Some(spec)
    }

    /// Local spec at `path`, creating typeless `over`s for every missing
    /// component.
    pub fn override_spec(&mut self, path: &str) -> &mut PrimSpec {
        let mut names = path.trim_start_matches('/').split('/');
        let first = names.next().unwrap_or_default();
        let mut spec = find_or_insert(&mut self.root_prims, first);
        for name in names {
            let parent = spec;
            spec = find_or_insert(&mut parent.body.children, name);
        }
        spec
    }
}

fn find_or_insert<'a>(specs: &'a mut Vec<PrimSpec>, name: &str) -> &'a mut PrimSpec {
    let index = match specs.iter().position(|s| s.name == name) {
        Some(index) => index,
        None => {
            specs.push(PrimSpec::over(name));
            specs.len() - 1
        }
    };
    &mut specs[index]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_display_literals() {
        let v = Value::Tuple(vec![Value::Number(0.55), Value::Number(75.0), Value::Number(-1.5)]);
        assert_eq!(v.to_string(), "(0.55, 75, -1.5)");

        let list = Value::List(vec![Value::String("xformOp:translate".into())]);
        assert_eq!(list.to_string(), "[\"xformOp:translate\"]");

        assert_eq!(Value::Path("/A/B".into()).to_string(), "</A/B>");
        assert_eq!(Value::Asset("tex.png".into()).to_string(), "@tex.png@");
        assert_eq!(Value::Blocked.to_string(), "None");
        assert_eq!(Value::Number(f64::NEG_INFINITY).to_string(), "-inf");
    }

    #[test]
    fn test_display_strips_top_level_quotes() {
        assert_eq!(Value::Token("UsdPreviewSurface".into()).to_display(), "UsdPreviewSurface");
        assert_eq!(Value::String("a \"b\"".into()).to_string(), "\"a \\\"b\\\"\"");
    }

    #[test]
    fn test_value_conversions() {
        let counts = Value::List(vec![Value::Number(4.0), Value::Number(3.0)]);
        assert_eq!(counts.as_int_array(), Some(vec![4, 3]));

        let bad = Value::List(vec![Value::Number(1.5)]);
        assert_eq!(bad.as_int_array(), None);

        let quat = Value::Tuple(vec![
            Value::Number(1.0),
            Value::Number(0.0),
            Value::Number(0.0),
            Value::Number(0.0),
        ]);
        assert_eq!(quat.as_quat(), Some(Quat::IDENTITY));

        assert_eq!(
            Value::String("size".into()).as_string_list(),
            Some(vec!["size".to_string()])
        );
    }

    #[test]
    fn test_matrix_literal_is_row_major() {
        let row = |a: f64, b: f64, c: f64, d: f64| {
            Value::Tuple([a, b, c, d].into_iter().map(Value::Number).collect())
        };
        let m = Value::Tuple(vec![
            row(1.0, 0.0, 0.0, 0.0),
            row(0.0, 1.0, 0.0, 0.0),
            row(0.0, 0.0, 1.0, 0.0),
            row(5.0, 6.0, 7.0, 1.0),
        ]);
        let mat = m.as_matrix().unwrap();
        assert_eq!(mat.transform_point3(Vec3::ZERO), Vec3::new(5.0, 6.0, 7.0));
    }

    #[test]
    fn test_override_spec_creates_overs() {
        let mut layer = Layer::default();
        layer.root_prims.push(PrimSpec::new(Specifier::Def, Some("Xform"), "World"));

        layer
            .override_spec("/World/Body")
            .metadata
            .push(MetadataEntry::new("kind", Value::String("x".into())));

        let world = layer.spec_at_path("/World").unwrap();
        assert_eq!(world.specifier, Specifier::Def);
        let body = layer.spec_at_path("/World/Body").unwrap();
        assert_eq!(body.specifier, Specifier::Over);
        assert_eq!(body.metadata.len(), 1);
        assert_eq!(layer.root_prims.len(), 1);
    }
}
