//! USDA (ASCII) file parser.
//!
//! Recursive descent over the token stream produced by [`Lexer`]. The result
//! is an uncomposed [`Layer`]: every `def`/`over`/`class`, property, variant
//! set and metadata entry exactly as authored.
//!
//! # Supported Syntax
//!
//! - Layer metadata block `( upAxis = "Y" ... )`
//! - `def|over|class [Type] "Name" ( metadata ) { ... }`
//! - Attributes with `custom`/`uniform` qualifiers, array types, `.connect`
//!   and `.timeSamples`
//! - Relationships (`rel material:binding = </Path>`)
//! - `variantSet "name" = { "variant" { ... } }`
//! - `reorder nameChildren`, `reorder properties`, `reorder rootPrims`
//! - List-op metadata (`prepend apiSchemas = [...]`) and dictionaries

use thiserror::Error;

use super::lexer::{Lexer, Spanned, Token};
use super::types::*;

/// Errors that can occur during USDA parsing.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("Invalid number format: {0}")]
    InvalidNumber(String),

    #[error("Unclosed block starting at line {0}")]
    UnclosedBlock(usize),

    #[error("Missing '#usda' header")]
    MissingHeader,

    #[error("Binary crate files are not supported")]
    BinaryFormat,

    #[error("Invalid layer metadata '{key}': {message}")]
    InvalidMetadata { key: String, message: String },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Parse USDA content into a layer.
pub fn parse_usda(content: &str) -> ParseResult<Layer> {
    if content.starts_with("PXR-USDC") {
        return Err(ParseError::BinaryFormat);
    }
    if !content.trim_start().starts_with("#usda") {
        return Err(ParseError::MissingHeader);
    }
    let mut parser = UsdaParser::new(content)?;
    parser.parse()
}

/// USDA file parser.
pub struct UsdaParser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl UsdaParser {
    /// Create a new parser from file contents.
    pub fn new(content: &str) -> ParseResult<Self> {
        Ok(Self {
            tokens: Lexer::new(content).tokenize()?,
            pos: 0,
        })
    }

    /// Parse the whole token stream as a layer.
    pub fn parse(&mut self) -> ParseResult<Layer> {
        let mut layer = Layer::default();

        if self.eat_punct('(') {
            layer.metadata = self.parse_metadata_entries()?;
        }

        while let Some(token) = self.peek() {
            match token {
                Token::Ident(word) if word == "reorder" => {
                    self.advance();
                    self.expect_keyword("rootPrims")?;
                    layer.root_order = Some(self.parse_name_list()?);
                }
                Token::Ident(word) if Specifier::from_keyword(word).is_some() => {
                    let prim = self.parse_prim()?;
                    if layer.root_prims.iter().any(|p| p.name == prim.name) {
                        return Err(self.error(format!("duplicate root prim \"{}\"", prim.name)));
                    }
                    layer.root_prims.push(prim);
                }
                other => {
                    let message = format!("expected prim definition, found {}", other.describe());
                    return Err(self.error(message));
                }
            }
        }

        Ok(layer)
    }

    // --- token helpers ---

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::Parse {
            line: self.line(),
            message: message.into(),
        }
    }

    fn next_token(&mut self) -> ParseResult<Token> {
        self.advance().ok_or(ParseError::UnexpectedEof)
    }

    fn is_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == c)
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.is_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, c: char) -> ParseResult<()> {
        if self.eat_punct(c) {
            return Ok(());
        }
        match self.peek() {
            Some(t) => Err(self.error(format!("expected '{}', found {}", c, t.describe()))),
            None => Err(ParseError::UnexpectedEof),
        }
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match self.next_token()? {
            Token::Ident(word) => Ok(word),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected identifier, found {}", other.describe())))
            }
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> ParseResult<()> {
        let word = self.expect_ident()?;
        if word == keyword {
            Ok(())
        } else {
            self.pos -= 1;
            Err(self.error(format!("expected '{}', found '{}'", keyword, word)))
        }
    }

    fn expect_string(&mut self) -> ParseResult<String> {
        match self.next_token()? {
            Token::String(s) => Ok(s),
            other => {
                self.pos -= 1;
                Err(self.error(format!("expected string, found {}", other.describe())))
            }
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Ident(w)) if w == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// A list-op keyword only counts when another identifier follows it.
    fn eat_list_op(&mut self) -> Option<ListOp> {
        let op = match self.peek() {
            Some(Token::Ident(word)) => ListOp::from_keyword(word)?,
            _ => return None,
        };
        if matches!(self.peek_at(1), Some(Token::Ident(_))) {
            self.pos += 1;
            Some(op)
        } else {
            None
        }
    }

    // --- prims ---

    fn parse_prim(&mut self) -> ParseResult<PrimSpec> {
        let keyword = self.expect_ident()?;
        let specifier = Specifier::from_keyword(&keyword)
            .ok_or_else(|| {
                self.error(format!("expected def, over or class, found '{}'", keyword))
            })?;

        let type_name = match self.peek() {
            Some(Token::Ident(_)) => Some(self.expect_ident()?),
            _ => None,
        };
        let name = self.expect_string()?;

        let metadata = if self.eat_punct('(') {
            self.parse_metadata_entries()?
        } else {
            Vec::new()
        };

        let start = self.line();
        self.expect_punct('{')?;
        let body = self.parse_body(start)?;

        Ok(PrimSpec {
            specifier,
            type_name,
            name,
            metadata,
            body,
        })
    }

    /// Statements up to and including the closing `}`.
    fn parse_body(&mut self, start: usize) -> ParseResult<PrimBody> {
        let mut body = PrimBody::default();

        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::UnclosedBlock(start));
            };
            match token {
                Token::Punct('}') => {
                    self.advance();
                    return Ok(body);
                }
                Token::Punct(';') => {
                    self.advance();
                }
                Token::Ident(word) if Specifier::from_keyword(word).is_some() => {
                    let child = self.parse_prim()?;
                    if body.child(&child.name).is_some() {
                        return Err(self.error(format!("duplicate prim \"{}\"", child.name)));
                    }
                    body.children.push(child);
                }
                Token::Ident(word) if word == "variantSet" => {
                    self.advance();
                    let set = self.parse_variant_set()?;
                    match body.variant_sets.iter_mut().find(|s| s.name == set.name) {
                        Some(existing) => existing.variants.extend(set.variants),
                        None => body.variant_sets.push(set),
                    }
                }
                Token::Ident(word)
                    if word == "reorder"
                        && matches!(
                            self.peek_at(1),
                            Some(Token::Ident(w)) if w == "nameChildren" || w == "properties"
                        ) =>
                {
                    self.advance();
                    let target = self.expect_ident()?;
                    let names = self.parse_name_list()?;
                    if target == "nameChildren" {
                        body.child_order = Some(names);
                    } else {
                        body.property_order = Some(names);
                    }
                }
                _ => {
                    let property = self.parse_property()?;
                    merge_property(&mut body.properties, property);
                }
            }
        }
    }

    fn parse_variant_set(&mut self) -> ParseResult<VariantSetSpec> {
        let name = self.expect_string()?;
        self.expect_punct('=')?;
        let start = self.line();
        self.expect_punct('{')?;

        let mut set = VariantSetSpec {
            name,
            variants: Vec::new(),
        };
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Token::Punct('}')) => {
                    self.advance();
                    return Ok(set);
                }
                _ => {
                    let variant_name = self.expect_string()?;
                    let metadata = if self.eat_punct('(') {
                        self.parse_metadata_entries()?
                    } else {
                        Vec::new()
                    };
                    let body_start = self.line();
                    self.expect_punct('{')?;
                    let body = self.parse_body(body_start)?;
                    set.variants.push(VariantSpec {
                        name: variant_name,
                        metadata,
                        body,
                    });
                }
            }
        }
    }

    /// `= ["a", "b"]` as used by the `reorder` statements.
    fn parse_name_list(&mut self) -> ParseResult<Vec<String>> {
        self.expect_punct('=')?;
        let value = self.parse_value()?;
        value
            .as_string_list()
            .ok_or_else(|| self.error("expected a list of names"))
    }

    // --- properties ---

    fn parse_property(&mut self) -> ParseResult<PropertySpec> {
        let list_op = self.eat_list_op();
        let custom = self.eat_keyword("custom");
        let variability = if self.eat_keyword("uniform") {
            Variability::Uniform
        } else {
            // `varying` and `config` are legacy spellings of the default.
            let _ = self.eat_keyword("varying") || self.eat_keyword("config");
            Variability::Varying
        };

        if self.eat_keyword("rel") {
            return self.parse_relationship(list_op, custom);
        }

        let mut type_name = self.expect_ident()?;
        if self.eat_punct('[') {
            self.expect_punct(']')?;
            type_name.push_str("[]");
        }
        let name = self.expect_ident()?;

        let mut attr = AttributeSpec {
            custom,
            variability,
            type_name,
            name,
            ..Default::default()
        };

        let suffix = if self.eat_punct('.') {
            Some(self.expect_ident()?)
        } else {
            None
        };

        match suffix.as_deref() {
            None => {
                if self.eat_punct('=') {
                    attr.default = Some(self.parse_value()?);
                }
            }
            Some("connect") => {
                self.expect_punct('=')?;
                attr.connections = Some(self.parse_targets()?);
                attr.connection_list_op = list_op;
            }
            Some("timeSamples") => {
                self.expect_punct('=')?;
                attr.time_samples = Some(self.parse_time_samples()?);
            }
            Some(other) => {
                return Err(self.error(format!("unsupported attribute field '.{}'", other)));
            }
        }

        if self.eat_punct('(') {
            attr.metadata = self.parse_metadata_entries()?;
        }
        Ok(PropertySpec::Attribute(attr))
    }

    fn parse_relationship(
        &mut self,
        list_op: Option<ListOp>,
        custom: bool,
    ) -> ParseResult<PropertySpec> {
        let name = self.expect_ident()?;
        let mut rel = RelationshipSpec {
            custom,
            list_op,
            name,
            ..Default::default()
        };
        if self.eat_punct('.') {
            let field = self.expect_ident()?;
            return Err(self.error(format!("unsupported relationship field '.{}'", field)));
        }
        if self.eat_punct('=') {
            rel.targets = Some(self.parse_targets()?);
        }
        if self.eat_punct('(') {
            rel.metadata = self.parse_metadata_entries()?;
        }
        Ok(PropertySpec::Relationship(rel))
    }

    /// `</a>`, `[</a>, </b>]` or `None` (empty).
    fn parse_targets(&mut self) -> ParseResult<Vec<String>> {
        let value = self.parse_value()?;
        let paths = match &value {
            Value::Blocked => Some(Vec::new()),
            Value::Path(p) => Some(vec![p.clone()]),
            Value::List(items) => items.iter().map(|v| v.as_path().map(str::to_string)).collect(),
            _ => None,
        };
        paths.ok_or_else(|| self.error(format!("expected target paths, found {}", value)))
    }

    fn parse_time_samples(&mut self) -> ParseResult<Vec<(f64, Value)>> {
        let start = self.line();
        self.expect_punct('{')?;
        let mut samples = Vec::new();
        loop {
            match self.next_token() {
                Err(_) => return Err(ParseError::UnclosedBlock(start)),
                Ok(Token::Punct('}')) => return Ok(samples),
                Ok(Token::Punct(',')) => {}
                Ok(Token::Number(time)) => {
                    self.expect_punct(':')?;
                    samples.push((time, self.parse_value()?));
                }
                Ok(other) => {
                    self.pos -= 1;
                    let found = other.describe();
                    return Err(self.error(format!("expected sample time, found {}", found)));
                }
            }
        }
    }

    // --- metadata and values ---

    /// Entries after an opening `(`, through the closing `)`.
    fn parse_metadata_entries(&mut self) -> ParseResult<Vec<MetadataEntry>> {
        let start = self.line();
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Token::Punct(')')) => {
                    self.advance();
                    return Ok(entries);
                }
                Some(Token::Punct(';')) => {
                    self.advance();
                }
                Some(Token::String(_)) => {
                    // A bare string is the doc comment.
                    let doc = self.expect_string()?;
                    entries.push(MetadataEntry::new("doc", Value::String(doc)));
                }
                _ => {
                    let list_op = self.eat_list_op();
                    let key = self.expect_ident()?;
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push(MetadataEntry { list_op, key, value });
                }
            }
        }
    }

    fn parse_value(&mut self) -> ParseResult<Value> {
        let value = match self.next_token()? {
            Token::Number(n) => Value::Number(n),
            Token::String(s) => Value::String(s),
            Token::Path(p) => Value::Path(p),
            Token::Asset(asset) => match self.peek() {
                Some(Token::Path(_)) => {
                    let Some(Token::Path(prim)) = self.advance() else {
                        return Err(ParseError::UnexpectedEof);
                    };
                    Value::Reference { asset, prim }
                }
                _ => Value::Asset(asset),
            },
            Token::Ident(word) => match word.as_str() {
                "None" => Value::Blocked,
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::Token(word),
            },
            Token::Punct('(') => Value::Tuple(self.parse_sequence(')')?),
            Token::Punct('[') => Value::List(self.parse_sequence(']')?),
            Token::Punct('{') => Value::Dictionary(self.parse_dictionary()?),
            other => {
                self.pos -= 1;
                return Err(self.error(format!("expected value, found {}", other.describe())));
            }
        };
        Ok(value)
    }

    /// Comma-separated values through `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: char) -> ParseResult<Vec<Value>> {
        let start = self.line();
        let mut items = Vec::new();
        loop {
            if self.peek().is_none() {
                return Err(ParseError::UnclosedBlock(start));
            }
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.parse_value()?);
            if !self.eat_punct(',') {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    /// `type key = value` entries through the closing `}`.
    fn parse_dictionary(&mut self) -> ParseResult<Vec<DictEntry>> {
        let start = self.line();
        let mut entries = Vec::new();
        loop {
            match self.peek() {
                None => return Err(ParseError::UnclosedBlock(start)),
                Some(Token::Punct('}')) => {
                    self.advance();
                    return Ok(entries);
                }
                Some(Token::Punct(';')) | Some(Token::Punct(',')) => {
                    self.advance();
                }
                _ => {
                    let mut type_name = self.expect_ident()?;
                    if self.eat_punct('[') {
                        self.expect_punct(']')?;
                        type_name.push_str("[]");
                    }
                    let key = match self.next_token()? {
                        Token::Ident(k) | Token::String(k) => k,
                        other => {
                            self.pos -= 1;
                            let found = other.describe();
                            return Err(
                                self.error(format!("expected dictionary key, found {}", found))
                            );
                        }
                    };
                    self.expect_punct('=')?;
                    let value = self.parse_value()?;
                    entries.push(DictEntry { type_name, key, value });
                }
            }
        }
    }
}

/// Fold a repeated declaration (e.g. a `.connect` line after the value line)
/// into the property already collected under the same name.
fn merge_property(properties: &mut Vec<PropertySpec>, property: PropertySpec) {
    let existing = properties.iter_mut().find(|p| p.name() == property.name());
    match (existing, property) {
        (Some(PropertySpec::Attribute(a)), PropertySpec::Attribute(b)) => {
            if b.default.is_some() {
                a.default = b.default;
            }
            if b.connections.is_some() {
                a.connections = b.connections;
                a.connection_list_op = b.connection_list_op;
            }
            if b.time_samples.is_some() {
                a.time_samples = b.time_samples;
            }
            a.metadata.extend(b.metadata);
        }
        (Some(PropertySpec::Relationship(a)), PropertySpec::Relationship(b)) => {
            if b.targets.is_some() {
                a.targets = b.targets;
                a.list_op = b.list_op;
            }
            a.metadata.extend(b.metadata);
        }
        (Some(slot), other) => *slot = other,
        (None, other) => properties.push(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 0.01
    upAxis = "Y"
)

def Xform "World" (
    kind = "assembly"
)
{
    double3 xformOp:translate = (0, 75, 0)
    uniform token[] xformOpOrder = ["xformOp:translate"]

    def Mesh "Box" (
        prepend apiSchemas = ["MaterialBindingAPI"]
    )
    {
        int[] faceVertexCounts = [4]
        int[] faceVertexIndices = [0, 1, 2, 3]
        point3f[] points = [(0, 0, 0), (1, 0, 0), (1, 1, 0), (0, 1, 0)]
        rel material:binding = </World/Looks/Red>
    }
}
"#;

    #[test]
    fn test_parse_layer_metadata() {
        let layer = parse_usda(SIMPLE).unwrap();
        assert_eq!(layer.metadata("defaultPrim"), Some(&Value::String("World".into())));
        assert_eq!(layer.metadata("metersPerUnit"), Some(&Value::Number(0.01)));
        assert_eq!(layer.metadata("upAxis"), Some(&Value::String("Y".into())));
    }

    #[test]
    fn test_parse_prim_hierarchy() {
        let layer = parse_usda(SIMPLE).unwrap();
        assert_eq!(layer.root_prims.len(), 1);

        let world = &layer.root_prims[0];
        assert_eq!(world.specifier, Specifier::Def);
        assert_eq!(world.type_name.as_deref(), Some("Xform"));
        assert_eq!(
            metadata_value(&world.metadata, "kind"),
            Some(&Value::String("assembly".into()))
        );

        let translate = world.body.attribute("xformOp:translate").unwrap();
        assert_eq!(translate.type_name, "double3");
        assert_eq!(
            translate.default.as_ref().and_then(Value::as_vec3),
            Some(usdq_math::Vec3::new(0.0, 75.0, 0.0))
        );

        let order = world.body.attribute("xformOpOrder").unwrap();
        assert_eq!(order.variability, Variability::Uniform);
        assert_eq!(order.type_name, "token[]");

        let mesh = world.body.child("Box").unwrap();
        assert_eq!(mesh.metadata[0].list_op, Some(ListOp::Prepend));
        assert_eq!(mesh.metadata[0].key, "apiSchemas");
        let binding = mesh.body.relationship("material:binding").unwrap();
        assert_eq!(binding.targets, Some(vec!["/World/Looks/Red".to_string()]));
        let counts = mesh.body.attribute("faceVertexCounts").unwrap();
        assert_eq!(counts.default.as_ref().and_then(Value::as_int_array), Some(vec![4]));
    }

    #[test]
    fn test_parse_connection_merges_with_declaration() {
        let src = r#"#usda 1.0
def Material "Red"
{
    token outputs:surface
    token outputs:surface.connect = </Red/Shader.outputs:surface>
    color3f inputs:diffuseColor = (0.8, 0.1, 0.1) (
        doc = "base color"
    )
}
"#;
        let layer = parse_usda(src).unwrap();
        let body = &layer.root_prims[0].body;
        assert_eq!(body.properties.len(), 2);
        let surface = body.attribute("outputs:surface").unwrap();
        assert_eq!(
            surface.connections,
            Some(vec!["/Red/Shader.outputs:surface".to_string()])
        );
        let color = body.attribute("inputs:diffuseColor").unwrap();
        assert_eq!(color.metadata.len(), 1);
    }

    #[test]
    fn test_parse_variant_sets() {
        let src = r#"#usda 1.0
def Xform "Product" (
    variants = {
        string size = "medium"
    }
    prepend variantSets = ["size", "color"]
)
{
    variantSet "size" = {
        "small" {
            double3 xformOp:scale = (0.5, 0.5, 0.5)
        }
        "medium" {
        }
        "large" (
            doc = "big"
        ) {
            over "Body"
            {
                float width = 2
            }
        }
    }
}
"#;
        let layer = parse_usda(src).unwrap();
        let product = &layer.root_prims[0];
        let variants = metadata_value(&product.metadata, "variants").unwrap();
        let dict = variants.as_dictionary().unwrap();
        assert_eq!(dict[0].type_name, "string");
        assert_eq!(dict[0].key, "size");
        assert_eq!(dict[0].value, Value::String("medium".into()));

        let set = &product.body.variant_sets[0];
        assert_eq!(set.name, "size");
        let names: Vec<_> = set.variants.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["small", "medium", "large"]);
        assert!(set.variants[1].body.is_empty());
        assert_eq!(set.variants[2].body.children[0].specifier, Specifier::Over);
    }

    #[test]
    fn test_parse_time_samples_and_reorder() {
        let src = r#"#usda 1.0
def Xform "Spin"
{
    reorder nameChildren = ["B", "A"]
    float xformOp:rotateY.timeSamples = {
        0: 0,
        24: 360,
    }
    def "A" {}
    def "B" {}
}
"#;
        let layer = parse_usda(src).unwrap();
        let body = &layer.root_prims[0].body;
        assert_eq!(body.child_order, Some(vec!["B".to_string(), "A".to_string()]));
        let rotate = body.attribute("xformOp:rotateY").unwrap();
        assert_eq!(
            rotate.time_samples,
            Some(vec![(0.0, Value::Number(0.0)), (24.0, Value::Number(360.0))])
        );
        assert!(rotate.default.is_none());
    }

    #[test]
    fn test_missing_header_is_rejected() {
        assert!(matches!(parse_usda("def Xform \"A\" {}"), Err(ParseError::MissingHeader)));
        assert!(matches!(parse_usda("PXR-USDC\0\0"), Err(ParseError::BinaryFormat)));
    }

    #[test]
    fn test_unclosed_block_reports_start_line() {
        let src = "#usda 1.0\n\ndef Xform \"A\"\n{\n    float x = 1\n";
        match parse_usda(src) {
            Err(ParseError::UnclosedBlock(line)) => assert_eq!(line, 4),
            other => panic!("expected unclosed block, got {:?}", other),
        }
    }

    #[test]
    fn test_syntax_error_has_line_number() {
        let src = "#usda 1.0\ndef Xform \"A\"\n{\n    float = 1\n}\n";
        let err = parse_usda(src).unwrap_err();
        assert!(err.to_string().contains("line 4"), "{}", err);
    }

    #[test]
    fn test_duplicate_sibling_rejected() {
        let src = "#usda 1.0\ndef \"A\" {\n def \"B\" {}\n def \"B\" {}\n}\n";
        assert!(parse_usda(src).is_err());
    }
}
