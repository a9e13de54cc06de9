//! USDA serialization.
//!
//! Writes a [`Layer`] in the layout USD tools produce: four-space indents,
//! metadata in parentheses after the statement it annotates, properties
//! before child prims, variant sets last.

use std::fmt::Write;

use super::types::*;

/// Serialize a layer to USDA text.
pub fn write_usda(layer: &Layer) -> String {
    let mut writer = UsdaWriter::default();
    writer.write_layer(layer);
    writer.out
}

#[derive(Default)]
struct UsdaWriter {
    out: String,
    indent: usize,
}

impl UsdaWriter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn write_layer(&mut self, layer: &Layer) {
        self.out.push_str("#usda 1.0\n");
        if !layer.metadata.is_empty() {
            self.line("(");
            self.write_metadata_entries(&layer.metadata);
            self.line(")");
        }
        if let Some(order) = &layer.root_order {
            self.out.push('\n');
            self.line(&format!("reorder rootPrims = {}", name_list(order)));
        }
        for prim in &layer.root_prims {
            self.out.push('\n');
            self.write_prim(prim);
        }
    }

    fn write_prim(&mut self, prim: &PrimSpec) {
        let mut head = prim.specifier.keyword().to_string();
        if let Some(type_name) = &prim.type_name {
            let _ = write!(head, " {}", type_name);
        }
        let _ = write!(head, " {}", quote_string(&prim.name));
        self.write_with_metadata(&head, &prim.metadata);
        self.write_body(&prim.body);
    }

    /// `{ ... }` with the braces on their own lines.
    fn write_body(&mut self, body: &PrimBody) {
        self.line("{");
        self.indent += 1;

        if let Some(order) = &body.child_order {
            self.line(&format!("reorder nameChildren = {}", name_list(order)));
        }
        if let Some(order) = &body.property_order {
            self.line(&format!("reorder properties = {}", name_list(order)));
        }
        for property in &body.properties {
            match property {
                PropertySpec::Attribute(attr) => self.write_attribute(attr),
                PropertySpec::Relationship(rel) => self.write_relationship(rel),
            }
        }

        let mut first = body.properties.is_empty()
            && body.child_order.is_none()
            && body.property_order.is_none();
        for child in &body.children {
            if !first {
                self.out.push('\n');
            }
            first = false;
            self.write_prim(child);
        }
        for set in &body.variant_sets {
            if !first {
                self.out.push('\n');
            }
            first = false;
            self.write_variant_set(set);
        }

        self.indent -= 1;
        self.line("}");
    }

    fn write_variant_set(&mut self, set: &VariantSetSpec) {
        self.line(&format!("variantSet {} = {{", quote_string(&set.name)));
        self.indent += 1;
        for variant in &set.variants {
            self.write_with_metadata(&quote_string(&variant.name), &variant.metadata);
            self.write_body(&variant.body);
        }
        self.indent -= 1;
        self.line("}");
    }

    fn write_attribute(&mut self, attr: &AttributeSpec) {
        let mut prefix = String::new();
        if attr.custom {
            prefix.push_str("custom ");
        }
        if attr.variability == Variability::Uniform {
            prefix.push_str("uniform ");
        }
        let _ = write!(prefix, "{} {}", attr.type_name, attr.name);

        let mut metadata = Some(&attr.metadata);
        let has_other = attr.connections.is_some() || attr.time_samples.is_some();

        if attr.default.is_some() || !has_other {
            let mut head = prefix.clone();
            if let Some(value) = &attr.default {
                let _ = write!(head, " = {}", self.value_text(value));
            }
            self.write_with_metadata(&head, metadata.take().map_or(&[][..], |m| m.as_slice()));
        }

        if let Some(targets) = &attr.connections {
            let mut head = String::new();
            if let Some(op) = attr.connection_list_op {
                let _ = write!(head, "{} ", op.keyword());
            }
            let _ = write!(head, "{}.connect = {}", prefix, target_text(targets));
            self.write_with_metadata(&head, metadata.take().map_or(&[][..], |m| m.as_slice()));
        }

        if let Some(samples) = &attr.time_samples {
            self.line(&format!("{}.timeSamples = {{", prefix));
            self.indent += 1;
            for (time, value) in samples {
                let text = format!("{}: {},", format_number(*time), self.value_text(value));
                self.line(&text);
            }
            self.indent -= 1;
            match metadata.take().filter(|m| !m.is_empty()) {
                Some(entries) => {
                    self.line("} (");
                    self.indent += 1;
                    self.write_metadata_entries(entries);
                    self.indent -= 1;
                    self.line(")");
                }
                None => self.line("}"),
            }
        }
    }

    fn write_relationship(&mut self, rel: &RelationshipSpec) {
        let mut head = String::new();
        if let Some(op) = rel.list_op {
            let _ = write!(head, "{} ", op.keyword());
        }
        if rel.custom {
            head.push_str("custom ");
        }
        let _ = write!(head, "rel {}", rel.name);
        if let Some(targets) = &rel.targets {
            let _ = write!(head, " = {}", target_text(targets));
        }
        self.write_with_metadata(&head, &rel.metadata);
    }

    /// `head` alone, or `head (` + entries + `)`.
    fn write_with_metadata(&mut self, head: &str, metadata: &[MetadataEntry]) {
        if metadata.is_empty() {
            self.line(head);
            return;
        }
        self.line(&format!("{} (", head));
        self.indent += 1;
        self.write_metadata_entries(metadata);
        self.indent -= 1;
        self.line(")");
    }

    fn write_metadata_entries(&mut self, entries: &[MetadataEntry]) {
        for entry in entries {
            let mut text = String::new();
            if let Some(op) = entry.list_op {
                let _ = write!(text, "{} ", op.keyword());
            }
            let _ = write!(text, "{} = {}", entry.key, self.value_text(&entry.value));
            // Dictionary continuation lines carry their own relative indent.
            for line in text.lines() {
                self.line(line);
            }
        }
    }

    /// Value text; dictionaries span multiple lines indented one level
    /// deeper than the line they start on.
    fn value_text(&self, value: &Value) -> String {
        match value {
            Value::Dictionary(entries) => dictionary_text(entries, 0),
            other => other.to_string(),
        }
    }
}

fn dictionary_text(entries: &[DictEntry], depth: usize) -> String {
    if entries.is_empty() {
        return "{\n}".to_string();
    }
    let pad = "    ".repeat(depth + 1);
    let mut out = String::from("{\n");
    for entry in entries {
        let value = match &entry.value {
            Value::Dictionary(inner) => dictionary_text(inner, depth + 1),
            other => other.to_string(),
        };
        let _ = writeln!(out, "{}{} {} = {}", pad, entry.type_name, quote_key(&entry.key), value);
    }
    out.push_str(&"    ".repeat(depth));
    out.push('}');
    out
}

fn target_text(targets: &[String]) -> String {
    match targets {
        [] => "None".to_string(),
        [single] => format!("<{}>", single),
        many => {
            let items: Vec<String> = many.iter().map(|t| format!("<{}>", t)).collect();
            format!("[{}]", items.join(", "))
        }
    }
}

fn name_list(names: &[String]) -> String {
    let items: Vec<String> = names.iter().map(|n| quote_string(n)).collect();
    format!("[{}]", items.join(", "))
}
