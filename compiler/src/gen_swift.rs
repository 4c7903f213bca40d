use tracing::debug;
use wirekit_schema::{
    AliasDef, Direction, Discriminator, DiscriminatorStyle, FieldDef, LiteralSugar, Primitive, Schema,
    StringEnumDef, StructDef, TypeDefinition, TypeExpr, UnionDef, VariantDef, VariantPayload,
};

use crate::{
    compiler::GenerateOptions,
    error::WirekitError,
    swift_types::materialize,
    utils::{is_identifier, swift_string_literal},
};

pub const HEADER: &str = "// Generated by wirekit. Do not edit.";

const SWIFT_KEYWORDS: [&str; 48] = [
    "associatedtype", "class", "deinit", "enum", "extension", "fileprivate", "func", "import",
    "init", "inout", "internal", "let", "operator", "private", "precedencegroup", "protocol",
    "public", "rethrows", "static", "struct", "subscript", "typealias", "var", "break", "case",
    "catch", "continue", "default", "defer", "do", "else", "fallthrough", "for", "guard", "if",
    "in", "repeat", "return", "throw", "switch", "where", "while", "as", "Any", "is", "nil",
    "self", "Self",
];

const EXTRA_KEYWORDS: [&str; 6] = ["super", "throws", "true", "false", "try", "Protocol"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub file_name: String,
    pub content:   String,
}

/// Renders one Swift file per schema type, in name order. The schema is
/// expected to have passed `verify_schema`.
pub fn generate_swift(schema: &Schema, options: &GenerateOptions) -> Result<Vec<GeneratedFile>, WirekitError> {
    let namer = Namer { schema, prefix: options.prefix.as_deref().unwrap_or("") };
    let mut files = Vec::with_capacity(schema.len());

    for (name, definition) in &schema.types {
        let body = match definition {
            TypeDefinition::Struct(def)     => generate_struct(&namer, name, def)?,
            TypeDefinition::StringEnum(def) => generate_string_enum(&namer, name, def),
            TypeDefinition::Union(def)      => generate_union(&namer, name, def)?,
            TypeDefinition::Alias(def)      => generate_alias(&namer, name, def)?,
        };
        let file_name = format!("{}.swift", namer.type_name(name));
        debug!("Rendered {}", file_name);
        files.push(GeneratedFile {
            file_name,
            content: format!("{}\n\nimport Foundation\n\n{}", HEADER, body),
        });
    }
    Ok(files)
}

/// Applies the type prefix to declared names and to references that name
/// schema types.
struct Namer<'a> {
    schema: &'a Schema,
    prefix: &'a str,
}

impl Namer<'_> {
    fn type_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn type_expr(&self, grammar: &str) -> Result<TypeExpr, WirekitError> {
        let ty = TypeExpr::parse(grammar)?;
        Ok(ty.map_custom(&|name| {
            if self.schema.types.contains_key(name) {
                self.type_name(name)
            } else {
                name.to_string()
            }
        }))
    }

    fn swift_type(&self, grammar: &str) -> Result<String, WirekitError> {
        Ok(materialize(&self.type_expr(grammar)?))
    }

    fn field_type(&self, field: &FieldDef) -> Result<TypeExpr, WirekitError> {
        let ty = self.type_expr(&field.ty)?;
        Ok(if field.is_optional() { ty.optional() } else { ty })
    }
}

/// Backticks Swift keywords used as identifiers.
fn identifier(name: &str) -> String {
    if SWIFT_KEYWORDS.contains(&name) || EXTRA_KEYWORDS.contains(&name) {
        format!("`{}`", name)
    } else {
        name.to_string()
    }
}

/// Converts a wire name such as `image_url` to lowerCamelCase.
fn to_lower_camel_case(s: &str) -> String {
    let mut out = String::new();
    let words = s.split(|c: char| !c.is_ascii_alphanumeric()).filter(|word| !word.is_empty());
    for (i, word) in words.enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if i == 0 {
                out.push(first.to_ascii_lowercase());
            } else {
                out.push(first.to_ascii_uppercase());
            }
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Case name for a wire string: kept when it already is an identifier.
fn key_case_name(wire: &str) -> String {
    if is_identifier(wire) {
        wire.to_string()
    } else {
        to_lower_camel_case(wire)
    }
}

fn conformance(direction: Direction) -> &'static str {
    match direction {
        Direction::Both   => "Codable",
        Direction::Encode => "Encodable",
        Direction::Decode => "Decodable",
    }
}

fn push_doc(lines: &mut Vec<String>, indent: &str, doc: Option<&str>) {
    if let Some(doc) = doc {
        for line in doc.lines() {
            if line.is_empty() {
                lines.push(format!("{}///", indent));
            } else {
                lines.push(format!("{}/// {}", indent, line));
            }
        }
    }
}

fn coding_key_line(case: &str, wire: &str) -> String {
    if case == wire {
        format!("        case {}", identifier(case))
    } else {
        format!("        case {} = {}", identifier(case), swift_string_literal(wire))
    }
}

fn finish(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

fn generate_struct(namer: &Namer<'_>, name: &str, def: &StructDef) -> Result<String, WirekitError> {
    let mut lines = Vec::new();
    push_doc(&mut lines, "", def.doc.as_deref());
    lines.push(format!(
        "public struct {}: {}, Sendable {{",
        namer.type_name(name),
        conformance(def.direction)
    ));

    let mut params = Vec::new();
    let mut assignments = Vec::new();
    for (field_name, field) in &def.fields {
        let ty = materialize(&namer.field_type(field)?);
        let id = identifier(field_name);
        push_doc(&mut lines, "    ", field.doc.as_deref());
        lines.push(format!("    public let {}: {}", id, ty));
        let default = if field.is_optional() { " = nil" } else { "" };
        params.push(format!("        {}: {}{}", id, ty, default));
        assignments.push(format!("        self.{} = {}", id, id));
    }

    // CodingKeys only when some wire key differs from its field name.
    if def.fields.iter().any(|(field_name, field)| field.is_remapped(field_name)) {
        lines.push(String::new());
        lines.push("    enum CodingKeys: String, CodingKey {".to_string());
        for (field_name, field) in &def.fields {
            lines.push(coding_key_line(field_name, field.effective_wire_name(field_name)));
        }
        lines.push("    }".to_string());
    }

    if def.fields.is_empty() {
        lines.push("    public init() {}".to_string());
    } else {
        lines.push(String::new());
        lines.push("    public init(".to_string());
        lines.push(params.join(",\n"));
        lines.push("    ) {".to_string());
        lines.extend(assignments);
        lines.push("    }".to_string());
    }
    lines.push("}".to_string());
    Ok(finish(lines))
}

fn generate_string_enum(namer: &Namer<'_>, name: &str, def: &StringEnumDef) -> String {
    let mut lines = Vec::new();
    push_doc(&mut lines, "", def.doc.as_deref());
    lines.push(format!(
        "public enum {}: String, {}, Sendable {{",
        namer.type_name(name),
        conformance(def.direction)
    ));
    for (case, literal) in &def.values {
        if case == literal {
            lines.push(format!("    case {}", identifier(case)));
        } else {
            lines.push(format!("    case {} = {}", identifier(case), swift_string_literal(literal)));
        }
    }

    if let Some(fallback) = def.fallback_case() {
        if !def.values.contains_key(fallback) {
            lines.push(format!("    case {}", identifier(fallback)));
        }
        if def.direction.allows_decode() {
            lines.push(String::new());
            lines.push("    public init(from decoder: Decoder) throws {".to_string());
            lines.push("        let container = try decoder.singleValueContainer()".to_string());
            lines.push("        let rawValue = try container.decode(String.self)".to_string());
            lines.push(format!("        self = Self(rawValue: rawValue) ?? .{}", identifier(fallback)));
            lines.push("    }".to_string());
        }
    }
    lines.push("}".to_string());
    finish(lines)
}

/// Variant names in emission order: declared order, fallback last.
fn ordered_variants(def: &UnionDef) -> Vec<(&String, &VariantDef)> {
    let mut variants: Vec<_> = def.variants.iter().filter(|(name, _)| !def.is_fallback(name)).collect();
    variants.extend(def.variants.iter().filter(|(name, _)| def.is_fallback(name)));
    variants
}

fn inline_fields(variant: &VariantDef) -> Option<&std::collections::BTreeMap<String, FieldDef>> {
    match &variant.payload {
        VariantPayload::Inline(fields) if !fields.is_empty() => Some(fields),
        _ => None,
    }
}

/// A union of number-tagged unit variants is a raw-valued enum. The fallback
/// case takes the first integer past every declared value.
fn generate_raw_enum(namer: &Namer<'_>, name: &str, def: &UnionDef, raw: Primitive) -> String {
    let raw_type = match raw {
        Primitive::Int => "Int",
        _ => "Double",
    };
    let mut lines = Vec::new();
    push_doc(&mut lines, "", def.doc.as_deref());
    lines.push(format!(
        "public enum {}: {}, {}, Sendable {{",
        namer.type_name(name),
        raw_type,
        conformance(def.direction)
    ));

    let mut largest: Option<f64> = None;
    for (variant_name, variant) in ordered_variants(def) {
        if def.is_fallback(variant_name) {
            continue;
        }
        let tag = variant.wire_tag(variant_name);
        if let Ok(value) = tag.parse::<f64>() {
            largest = Some(largest.map_or(value, |max| max.max(value)));
        }
        push_doc(&mut lines, "    ", variant.doc.as_deref());
        lines.push(format!("    case {} = {}", identifier(variant_name), tag));
    }

    if let Some(fallback) = def.fallback_variant() {
        let next = largest.map_or(0, |max| max.floor() as i64 + 1);
        push_doc(&mut lines, "    ", def.variants.get(fallback).and_then(|v| v.doc.as_deref()));
        lines.push(format!("    case {} = {}", identifier(fallback), next));
        if def.direction.allows_decode() {
            lines.push(String::new());
            lines.push("    public init(from decoder: Decoder) throws {".to_string());
            lines.push("        let container = try decoder.singleValueContainer()".to_string());
            lines.push(format!("        let rawValue = try container.decode({}.self)", raw_type));
            lines.push(format!("        self = Self(rawValue: rawValue) ?? .{}", identifier(fallback)));
            lines.push("    }".to_string());
        }
    }
    lines.push("}".to_string());
    finish(lines)
}

fn generate_union(namer: &Namer<'_>, name: &str, def: &UnionDef) -> Result<String, WirekitError> {
    if let Some(raw) = def.raw_value_type() {
        return Ok(generate_raw_enum(namer, name, def, raw));
    }
    let type_name = namer.type_name(name);
    let variants = ordered_variants(def);

    let mut lines = Vec::new();
    push_doc(&mut lines, "", def.doc.as_deref());
    lines.push(format!("public enum {}: {}, Sendable {{", type_name, conformance(def.direction)));
    for (variant_name, variant) in &variants {
        push_doc(&mut lines, "    ", variant.doc.as_deref());
        let id = identifier(variant_name);
        match &variant.payload {
            VariantPayload::Wrapped(ty) => lines.push(format!("    case {}({})", id, namer.swift_type(ty)?)),
            VariantPayload::Inline(fields) if !fields.is_empty() => {
                let mut values = Vec::new();
                for (field_name, field) in fields {
                    values.push(format!("{}: {}", identifier(field_name), materialize(&namer.field_type(field)?)));
                }
                lines.push(format!("    case {}({})", id, values.join(", ")));
            }
            _ => lines.push(format!("    case {}", id)),
        }
    }

    match &def.discriminator {
        Some(disc) => tagged_union_body(&mut lines, namer, def, &variants, disc)?,
        None => untagged_union_body(&mut lines, namer, &type_name, def, &variants)?,
    }
    lines.push("}".to_string());

    for (variant_name, variant) in &variants {
        let (Some(literal), VariantPayload::Wrapped(ty)) = (variant.literal, &variant.payload) else {
            continue;
        };
        lines.push(String::new());
        match literal {
            LiteralSugar::String => {
                lines.push(format!("extension {}: ExpressibleByStringLiteral {{", type_name));
                lines.push("    public init(stringLiteral value: String) {".to_string());
                lines.push(format!("        self = .{}(value)", identifier(variant_name)));
            }
            LiteralSugar::Array => {
                let element = match namer.type_expr(ty)? {
                    TypeExpr::List(inner) => materialize(&inner),
                    other => materialize(&other),
                };
                lines.push(format!("extension {}: ExpressibleByArrayLiteral {{", type_name));
                lines.push(format!("    public init(arrayLiteral elements: {}...) {{", element));
                lines.push(format!("        self = .{}(elements)", identifier(variant_name)));
            }
        }
        lines.push("    }".to_string());
        lines.push("}".to_string());
    }
    Ok(finish(lines))
}

fn unknown_encode_lines(lines: &mut Vec<String>, fallback: &str) {
    lines.push(format!("        case .{}:", identifier(fallback)));
    lines.push(
        "            throw EncodingError.invalidValue(self, EncodingError.Context(codingPath: encoder.codingPath, debugDescription: \"An unknown variant cannot be encoded\"))"
            .to_string(),
    );
}

fn tagged_union_body(
    lines: &mut Vec<String>,
    namer: &Namer<'_>,
    def: &UnionDef,
    variants: &[(&String, &VariantDef)],
    disc: &Discriminator,
) -> Result<(), WirekitError> {
    let wrapped_style = disc.style == DiscriminatorStyle::Wrapped;

    // Coding keys: the tag key first, then payload keys, unique by case name.
    let tag_key = key_case_name(&disc.field);
    let mut keys: Vec<(String, String)> = vec![(tag_key.clone(), disc.field.clone())];
    for (variant_name, variant) in variants {
        if def.is_fallback(variant_name) {
            continue;
        }
        match &variant.payload {
            VariantPayload::Wrapped(_) if wrapped_style => {
                let tag = variant.wire_tag(variant_name);
                keys.push((key_case_name(tag), tag.to_string()));
            }
            VariantPayload::Inline(fields) => {
                for (field_name, field) in fields {
                    keys.push((field_name.clone(), field.effective_wire_name(field_name).to_string()));
                }
            }
            _ => {}
        }
    }
    let mut seen = std::collections::BTreeSet::new();
    keys.retain(|(case, _)| seen.insert(case.clone()));

    lines.push(String::new());
    lines.push("    enum CodingKeys: String, CodingKey {".to_string());
    for (case, wire) in &keys {
        lines.push(coding_key_line(case, wire));
    }
    lines.push("    }".to_string());

    lines.push(String::new());
    lines.push("    /// Wire tag of this case.".to_string());
    lines.push("    public var wireTag: String? {".to_string());
    lines.push("        switch self {".to_string());
    for (variant_name, variant) in variants {
        let tag = if def.is_fallback(variant_name) {
            "nil".to_string()
        } else {
            swift_string_literal(variant.wire_tag(variant_name))
        };
        lines.push(format!("        case .{}: return {}", identifier(variant_name), tag));
    }
    lines.push("        }".to_string());
    lines.push("    }".to_string());

    let tag_ref = identifier(&tag_key);
    if def.direction.allows_decode() {
        lines.push(String::new());
        lines.push("    public init(from decoder: Decoder) throws {".to_string());
        lines.push("        let container = try decoder.container(keyedBy: CodingKeys.self)".to_string());
        lines.push(format!("        let tag = try container.decode(String.self, forKey: .{})", tag_ref));
        lines.push("        switch tag {".to_string());
        for (variant_name, variant) in variants {
            if def.is_fallback(variant_name) {
                continue;
            }
            let id = identifier(variant_name);
            let tag = variant.wire_tag(variant_name);
            lines.push(format!("        case {}:", swift_string_literal(tag)));
            match (&variant.payload, inline_fields(variant)) {
                (VariantPayload::Wrapped(ty), _) if wrapped_style => {
                    let (method, swift) = decode_call(namer, ty)?;
                    lines.push(format!(
                        "            self = .{}(try container.{}({}.self, forKey: .{}))",
                        id,
                        method,
                        swift,
                        identifier(&key_case_name(tag))
                    ));
                }
                (VariantPayload::Wrapped(ty), _) => {
                    lines.push(format!("            self = .{}(try {}(from: decoder))", id, namer.swift_type(ty)?));
                }
                (_, Some(fields)) => {
                    lines.push(format!("            self = .{}(", id));
                    let mut args = Vec::new();
                    for (field_name, field) in fields {
                        let ty = namer.field_type(field)?;
                        let (method, swift) = if ty.is_optional() {
                            ("decodeIfPresent", materialize(ty.unwrap_optional()))
                        } else {
                            ("decode", materialize(&ty))
                        };
                        args.push(format!(
                            "                {}: try container.{}({}.self, forKey: .{})",
                            identifier(field_name),
                            method,
                            swift,
                            identifier(field_name)
                        ));
                    }
                    lines.push(args.join(",\n"));
                    lines.push("            )".to_string());
                }
                _ => lines.push(format!("            self = .{}", id)),
            }
        }
        lines.push("        default:".to_string());
        match def.fallback_variant() {
            Some(fallback) => lines.push(format!("            self = .{}", identifier(fallback))),
            None => lines.push(format!(
                "            throw DecodingError.dataCorruptedError(forKey: .{}, in: container, debugDescription: \"UnknownVariant(\\(tag))\")",
                tag_ref
            )),
        }
        lines.push("        }".to_string());
        lines.push("    }".to_string());
    }

    if def.direction.allows_encode() {
        lines.push(String::new());
        lines.push("    public func encode(to encoder: Encoder) throws {".to_string());
        lines.push("        var container = encoder.container(keyedBy: CodingKeys.self)".to_string());
        lines.push("        switch self {".to_string());
        for (variant_name, variant) in variants {
            if def.is_fallback(variant_name) {
                unknown_encode_lines(lines, variant_name);
                continue;
            }
            let id = identifier(variant_name);
            let tag = variant.wire_tag(variant_name);
            let encode_tag = format!(
                "            try container.encode({}, forKey: .{})",
                swift_string_literal(tag),
                tag_ref
            );
            match (&variant.payload, inline_fields(variant)) {
                (VariantPayload::Wrapped(ty), _) => {
                    lines.push(format!("        case .{}(let payload):", id));
                    lines.push(encode_tag);
                    if wrapped_style {
                        let method = if namer.type_expr(ty)?.is_optional() { "encodeIfPresent" } else { "encode" };
                        lines.push(format!(
                            "            try container.{}(payload, forKey: .{})",
                            method,
                            identifier(&key_case_name(tag))
                        ));
                    } else {
                        lines.push("            try payload.encode(to: encoder)".to_string());
                    }
                }
                (_, Some(fields)) => {
                    let bindings: Vec<String> =
                        fields.keys().map(|field_name| format!("let {}", identifier(field_name))).collect();
                    lines.push(format!("        case .{}({}):", id, bindings.join(", ")));
                    lines.push(encode_tag);
                    for (field_name, field) in fields {
                        let method = if field.is_optional() { "encodeIfPresent" } else { "encode" };
                        lines.push(format!(
                            "            try container.{}({}, forKey: .{})",
                            method,
                            identifier(field_name),
                            identifier(field_name)
                        ));
                    }
                }
                _ => {
                    lines.push(format!("        case .{}:", id));
                    lines.push(encode_tag);
                }
            }
        }
        lines.push("        }".to_string());
        lines.push("    }".to_string());
    }
    Ok(())
}

/// `decode` or `decodeIfPresent` plus the Swift type to decode.
fn decode_call(namer: &Namer<'_>, grammar: &str) -> Result<(&'static str, String), WirekitError> {
    let ty = namer.type_expr(grammar)?;
    Ok(if ty.is_optional() {
        ("decodeIfPresent", materialize(ty.unwrap_optional()))
    } else {
        ("decode", materialize(&ty))
    })
}

fn untagged_union_body(
    lines: &mut Vec<String>,
    namer: &Namer<'_>,
    type_name: &str,
    def: &UnionDef,
    variants: &[(&String, &VariantDef)],
) -> Result<(), WirekitError> {
    if def.direction.allows_decode() {
        lines.push(String::new());
        lines.push("    public init(from decoder: Decoder) throws {".to_string());
        lines.push("        let container = try decoder.singleValueContainer()".to_string());
        // Candidates are tried in name order; the first that decodes wins.
        for (variant_name, variant) in variants {
            if def.is_fallback(variant_name) {
                continue;
            }
            let id = identifier(variant_name);
            match &variant.payload {
                VariantPayload::Wrapped(ty) => {
                    lines.push(format!(
                        "        if let value = try? container.decode({}.self) {{",
                        namer.swift_type(ty)?
                    ));
                    lines.push(format!("            self = .{}(value)", id));
                }
                _ => {
                    lines.push("        if container.decodeNil() {".to_string());
                    lines.push(format!("            self = .{}", id));
                }
            }
            lines.push("            return".to_string());
            lines.push("        }".to_string());
        }
        match def.fallback_variant() {
            Some(fallback) => lines.push(format!("        self = .{}", identifier(fallback))),
            None => lines.push(format!(
                "        throw DecodingError.dataCorruptedError(in: container, debugDescription: \"UnknownVariant(no case of {} matched)\")",
                type_name
            )),
        }
        lines.push("    }".to_string());
    }

    if def.direction.allows_encode() {
        lines.push(String::new());
        lines.push("    public func encode(to encoder: Encoder) throws {".to_string());
        lines.push("        var container = encoder.singleValueContainer()".to_string());
        lines.push("        switch self {".to_string());
        for (variant_name, variant) in variants {
            if def.is_fallback(variant_name) {
                unknown_encode_lines(lines, variant_name);
                continue;
            }
            let id = identifier(variant_name);
            match &variant.payload {
                VariantPayload::Wrapped(_) => {
                    lines.push(format!("        case .{}(let value):", id));
                    lines.push("            try container.encode(value)".to_string());
                }
                _ => {
                    lines.push(format!("        case .{}:", id));
                    lines.push("            try container.encodeNil()".to_string());
                }
            }
        }
        lines.push("        }".to_string());
        lines.push("    }".to_string());
    }
    Ok(())
}

fn generate_alias(namer: &Namer<'_>, name: &str, def: &AliasDef) -> Result<String, WirekitError> {
    let target = namer.swift_type(&def.target)?;
    let mut lines = Vec::new();
    push_doc(&mut lines, "", def.doc.as_deref());
    if def.deprecated {
        lines.push(format!(
            "@available(*, deprecated, message: {})",
            swift_string_literal(&format!("Use {} instead", target))
        ));
    }
    lines.push(format!("public typealias {} = {}", namer.type_name(name), target));
    Ok(finish(lines))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use wirekit_schema::{UnknownHandling, VariantDef};

    fn render(schema: &Schema) -> BTreeMap<String, String> {
        generate_swift(schema, &GenerateOptions::default())
            .unwrap()
            .into_iter()
            .map(|file| (file.file_name, file.content))
            .collect()
    }

    fn usage_schema() -> Schema {
        let mut schema = Schema::new("test");
        let mut usage = StructDef { direction: Direction::Decode, ..Default::default() };
        usage.fields.insert("inputTokens".into(), FieldDef::new("int").with_wire_name("input_tokens"));
        usage.fields.insert("model".into(), FieldDef::new("string?").with_wire_name("model"));
        usage.fields.insert("stop".into(), FieldDef::new("list[string?]?"));
        schema.insert("Usage", TypeDefinition::Struct(usage));
        schema
    }

    #[test]
    fn test_struct_remaps_only_differing_keys() {
        let files = render(&usage_schema());
        let usage = &files["Usage.swift"];
        assert!(usage.starts_with(HEADER));
        assert!(usage.contains("import Foundation"));
        assert!(usage.contains("public struct Usage: Decodable, Sendable {"));
        assert!(usage.contains("case inputTokens = \"input_tokens\""));
        assert!(usage.contains("        case model\n"));
        assert!(!usage.contains("case model ="));
        assert!(usage.contains("public let stop: [String?]?"));
        assert!(usage.contains("        model: String? = nil,"));
        assert!(!usage.contains("??"));
    }

    #[test]
    fn test_struct_without_remaps_has_no_coding_keys() {
        let mut schema = Schema::new("test");
        let mut point = StructDef::default();
        point.fields.insert("x".into(), FieldDef::new("float"));
        point.fields.insert("default".into(), FieldDef::new("bool"));
        schema.insert("Point", TypeDefinition::Struct(point));
        let point = &render(&schema)["Point.swift"];
        assert!(!point.contains("CodingKeys"));
        assert!(point.contains("public let `default`: Bool"));
        assert!(point.contains("public struct Point: Codable, Sendable {"));
    }

    #[test]
    fn test_string_enum_fallback_decoder() {
        let mut schema = Schema::new("test");
        let mut tier = StringEnumDef::default();
        tier.values.insert("standard".into(), "standard".into());
        tier.values.insert("flexProcessing".into(), "flex_processing".into());
        tier.unknown_handling = Some(UnknownHandling::Fallback("futureProof".into()));
        schema.insert("ServiceTier", TypeDefinition::StringEnum(tier));
        let tier = &render(&schema)["ServiceTier.swift"];
        assert!(tier.contains("public enum ServiceTier: String, Codable, Sendable {"));
        assert!(tier.contains("case flexProcessing = \"flex_processing\""));
        assert!(tier.contains("    case standard\n"));
        assert_eq!(tier.matches("case futureProof").count(), 1);
        // "enterprise" matches no raw value, so it lands in the fallback case.
        assert!(tier.contains("self = Self(rawValue: rawValue) ?? .futureProof"));
    }

    #[test]
    fn test_numbered_union_is_a_raw_enum() {
        let mut schema = Schema::new("test");
        let mut priority = UnionDef::default();
        priority.variants.insert("low".into(), VariantDef::unit().with_tag("1"));
        priority.variants.insert("high".into(), VariantDef::unit().with_tag("5").with_doc("Served first."));
        priority.variants.insert("futureProof".into(), VariantDef::unit());
        priority.unknown_handling = Some(UnknownHandling::Fallback("futureProof".into()));
        schema.insert("Priority", TypeDefinition::Union(priority));

        let mut ratio = UnionDef { direction: Direction::Encode, ..Default::default() };
        ratio.variants.insert("half".into(), VariantDef::unit().with_tag("0.5"));
        schema.insert("Ratio", TypeDefinition::Union(ratio));

        let files = render(&schema);
        let priority = &files["Priority.swift"];
        assert!(priority.contains("public enum Priority: Int, Codable, Sendable {"));
        assert!(priority.contains("    /// Served first.\n    case high = 5\n    case low = 1\n    case futureProof = 6\n"));
        assert!(priority.contains("let rawValue = try container.decode(Int.self)"));
        assert!(priority.contains("self = Self(rawValue: rawValue) ?? .futureProof"));

        let ratio = &files["Ratio.swift"];
        assert!(ratio.contains("public enum Ratio: Double, Encodable, Sendable {"));
        assert!(ratio.contains("    case half = 0.5\n"));
        assert!(!ratio.contains("init(from"));
    }

    #[test]
    fn test_discriminated_union_decoder() {
        let mut schema = Schema::new("test");
        let mut block = UnionDef { discriminator: Some(Discriminator::inline("type")), ..Default::default() };
        block.variants.insert("textBlock".into(), VariantDef::wrapped("TextPayload").with_tag("text"));
        block.variants.insert("futureProof".into(), VariantDef::unit());
        block.unknown_handling = Some(UnknownHandling::Fallback("futureProof".into()));
        schema.insert("ContentBlock", TypeDefinition::Union(block));
        let block = &render(&schema)["ContentBlock.swift"];
        assert!(block.contains("        case \"text\":\n            self = .textBlock(try TextPayload(from: decoder))"));
        assert!(block.contains("        default:\n            self = .futureProof"));
        assert!(block.contains("try container.encode(\"text\", forKey: .type)"));
        assert!(block.contains("case .futureProof: return nil"));
    }

    #[test]
    fn test_union_without_fallback_throws_unknown_variant() {
        let mut schema = Schema::new("test");
        let mut fields = BTreeMap::new();
        fields.insert("imageUrl".to_string(), FieldDef::new("string").with_wire_name("image_url"));
        fields.insert("detail".to_string(), FieldDef::new("string?"));
        let mut part = UnionDef {
            direction:     Direction::Decode,
            discriminator: Some(Discriminator::inline("type")),
            ..Default::default()
        };
        part.variants.insert("image".into(), VariantDef::inline(fields));
        schema.insert("Part", TypeDefinition::Union(part));
        let part = &render(&schema)["Part.swift"];
        assert!(part.contains("case image(detail: String?, imageUrl: String)"));
        assert!(part.contains("case imageUrl = \"image_url\""));
        assert!(part.contains("detail: try container.decodeIfPresent(String.self, forKey: .detail)"));
        assert!(part.contains("UnknownVariant(\\(tag))"));
        assert!(!part.contains("func encode"));
    }

    #[test]
    fn test_untagged_union_and_literal_sugar() {
        let mut schema = Schema::new("test");
        let mut content = UnionDef { direction: Direction::Encode, ..Default::default() };
        content.variants.insert("text".into(), VariantDef::wrapped("string").with_literal(LiteralSugar::String));
        content.variants.insert("parts".into(), VariantDef::wrapped("list[Part]").with_literal(LiteralSugar::Array));
        schema.insert("Content", TypeDefinition::Union(content));
        schema.insert("Part", TypeDefinition::Struct(StructDef::default()));

        let options = GenerateOptions { prefix: Some("OA".into()) };
        let files = generate_swift(&schema, &options).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(names, vec!["OAContent.swift", "OAPart.swift"]);
        let content = &files[0].content;
        assert!(content.contains("public enum OAContent: Encodable, Sendable {"));
        assert!(content.contains("case parts([OAPart])"));
        assert!(content.contains("extension OAContent: ExpressibleByStringLiteral {"));
        assert!(content.contains("public init(arrayLiteral elements: OAPart...) {"));
        assert!(content.contains("var container = encoder.singleValueContainer()"));
        assert!(!content.contains("init(from decoder"));
    }

    #[test]
    fn test_deprecated_alias() {
        let mut schema = Schema::new("test");
        schema.insert(
            "LegacyUsage",
            TypeDefinition::Alias(AliasDef { target: "Usage".into(), deprecated: true, doc: None }),
        );
        let alias = &render(&schema)["LegacyUsage.swift"];
        assert!(alias.contains("@available(*, deprecated, message: \"Use Usage instead\")\npublic typealias LegacyUsage = Usage"));
    }

    #[test]
    fn test_lower_camel_case() {
        assert_eq!(to_lower_camel_case("image_url"), "imageUrl");
        assert_eq!(to_lower_camel_case("Content-Type"), "contentType");
        assert_eq!(to_lower_camel_case("2d"), "_2d");
        assert_eq!(key_case_name("type"), "type");
    }
}
