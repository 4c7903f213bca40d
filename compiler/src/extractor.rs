//! Reduces parsed Swift declarations to schema definitions.
//!
//! Extraction runs in two steps. Files are parsed independently (the sdk does
//! this in parallel). An `Extractor` then sees every file at once, because an
//! `extension` in one file can add conformances, coders or literal
//! initializers to a type declared in another.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};
use wirekit_schema::{
    AliasDef, Direction, FieldDef, LiteralSugar, Primitive, Schema, StringEnumDef, Strictness,
    StructDef, TypeDefinition, TypeExpr, UnionDef, UnknownHandling, VariantDef, VariantPayload,
    DEFAULT_FALLBACK_CASE,
};

use crate::{
    error::WirekitError,
    parser::parse_source,
    patterns::{assigned_case, scan_union, UnionScan},
    swift_types::normalize,
    tokenizer::tokenize_source,
    utils::numeric_literal,
    types::{Decl, DeclKind, ExtensionDecl, FunctionDecl, Literal, Member, SourceFile, TypeAliasDecl, TypeDecl},
};

const DEPRECATION_MARKERS: [&str; 4] = ["deprecated", "backwards compat", "backward compat", "legacy"];

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Label written to the schema's `provider` field.
    pub provider:      String,
    /// Name of the sentinel case that absorbs unknown wire values.
    pub fallback_case: String,
    pub strictness:    Strictness,
    /// Source file extension, without the dot.
    pub extension:     String,
}

impl ExtractOptions {
    pub fn new(provider: impl Into<String>) -> Self {
        ExtractOptions { provider: provider.into(), ..Default::default() }
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            provider:      String::new(),
            fallback_case: DEFAULT_FALLBACK_CASE.to_string(),
            strictness:    Strictness::Lenient,
            extension:     "swift".to_string(),
        }
    }
}

/// One extracted type, before it is merged into a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name:       String,
    pub definition: TypeDefinition,
}

/// Tokenizes and parses one Swift source file.
pub fn parse_swift(text: &str) -> Result<SourceFile, WirekitError> {
    let tokens = tokenize_source(text)?;
    parse_source(&tokens)
}

/// Extracts the declarations of a single source text.
pub fn extract_source(text: &str, options: &ExtractOptions) -> Result<Vec<Declaration>, WirekitError> {
    let mut extractor = Extractor::new(options);
    extractor.add_file(parse_swift(text)?);
    extractor.declarations()
}

pub struct Extractor<'a> {
    options: &'a ExtractOptions,
    files:   Vec<SourceFile>,
}

impl<'a> Extractor<'a> {
    pub fn new(options: &'a ExtractOptions) -> Self {
        Extractor { options, files: Vec::new() }
    }

    /// Files must be added in a stable order; collisions are resolved by it.
    pub fn add_file(&mut self, file: SourceFile) {
        self.files.push(file);
    }

    pub fn declarations(&self) -> Result<Vec<Declaration>, WirekitError> {
        let mut extensions: BTreeMap<&str, Vec<&ExtensionDecl>> = BTreeMap::new();
        for file in &self.files {
            for decl in &file.decls {
                if let Decl::Extension(ext) = decl {
                    extensions.entry(ext.name.as_str()).or_default().push(ext);
                }
            }
        }

        let mut out = Vec::new();
        for file in &self.files {
            for decl in &file.decls {
                let lowered = match decl {
                    Decl::Type(ty) => {
                        let ctx = TypeContext {
                            decl:       ty,
                            extensions: extensions.get(ty.name.as_str()).map(Vec::as_slice).unwrap_or(&[]),
                        };
                        self.lower_type(&ctx)?.map(|def| (ty.name.clone(), def))
                    }
                    Decl::TypeAlias(alias) => self.lower_alias(alias)?.map(|def| (alias.name.clone(), def)),
                    Decl::Extension(_) => None,
                };
                if let Some((name, definition)) = lowered {
                    debug!("Extracted {} \"{}\"", definition.kind(), name);
                    out.push(Declaration { name, definition });
                }
            }
        }
        Ok(out)
    }

    /// Merges every declaration into one schema. A name seen twice keeps the
    /// later declaration, or fails in strict mode.
    pub fn finish(self) -> Result<Schema, WirekitError> {
        let mut schema = Schema::new(self.options.provider.clone());
        for decl in self.declarations()? {
            let name = decl.name.clone();
            if schema.insert(decl.name, decl.definition).is_some() {
                match self.options.strictness {
                    Strictness::Strict => return Err(WirekitError::DuplicateType(name)),
                    Strictness::Lenient => warn!("Type \"{}\" is declared more than once; keeping the last one", name),
                }
            }
        }
        Ok(schema)
    }

    fn drop_declaration(&self, name: &str, reason: String) -> Result<Option<TypeDefinition>, WirekitError> {
        match self.options.strictness {
            Strictness::Strict => Err(WirekitError::DroppedDeclaration { name: name.to_string(), reason }),
            Strictness::Lenient => {
                warn!("Dropping \"{}\": {}", name, reason);
                Ok(None)
            }
        }
    }

    fn lower_type(&self, ctx: &TypeContext<'_>) -> Result<Option<TypeDefinition>, WirekitError> {
        let decl = ctx.decl;
        if decl.is_generic {
            debug!("Skipping generic type \"{}\"", decl.name);
            return Ok(None);
        }
        for member in &decl.members {
            if let Member::Type(nested) = member {
                if nested.name != "CodingKeys" {
                    debug!("Skipping nested type \"{}.{}\"", decl.name, nested.name);
                }
            }
        }

        match decl.kind {
            DeclKind::Struct | DeclKind::Class => self.lower_struct(ctx),
            DeclKind::Enum => match ctx.raw_type() {
                None => self.lower_union(ctx),
                Some(TypeExpr::Primitive(Primitive::Int | Primitive::Float)) => self.lower_raw_enum(ctx),
                Some(TypeExpr::Primitive(Primitive::String)) => self.lower_string_enum(ctx),
                Some(TypeExpr::Custom(name)) if name == "Character" => self.lower_string_enum(ctx),
                Some(raw) => self.drop_declaration(&decl.name, format!("raw type {} is not supported", raw)),
            },
            DeclKind::Actor | DeclKind::Protocol => {
                debug!("Skipping \"{}\": not a data type", decl.name);
                Ok(None)
            }
        }
    }

    fn lower_struct(&self, ctx: &TypeContext<'_>) -> Result<Option<TypeDefinition>, WirekitError> {
        let decl = ctx.decl;
        let coding_keys = ctx.coding_keys();

        let mut fields = BTreeMap::new();
        for prop in decl.properties() {
            if prop.is_static || prop.is_computed {
                continue;
            }
            if prop.is_let && prop.has_initializer {
                debug!("Skipping \"{}.{}\": constant with an initial value", decl.name, prop.name);
                continue;
            }
            if let Some(keys) = &coding_keys {
                if !keys.contains_key(&prop.name) {
                    debug!("Skipping \"{}.{}\": not listed in CodingKeys", decl.name, prop.name);
                    continue;
                }
            }
            let Some(type_text) = &prop.type_text else {
                warn!("Skipping \"{}.{}\": no type annotation", decl.name, prop.name);
                continue;
            };
            let ty = match normalize(type_text) {
                Ok(ty) => ty,
                Err(err) => return self.drop_declaration(&decl.name, format!("field \"{}\": {}", prop.name, err)),
            };

            let mut field = FieldDef::new(ty.to_string());
            field.wire_name = coding_keys
                .as_ref()
                .and_then(|keys| keys.get(&prop.name))
                .filter(|wire| **wire != prop.name)
                .cloned();
            field.doc = join_docs(&prop.docs);
            fields.insert(prop.name.clone(), field);
        }

        Ok(Some(TypeDefinition::Struct(StructDef {
            direction: ctx.direction(),
            doc: join_docs(&decl.docs),
            fields,
        })))
    }

    fn lower_string_enum(&self, ctx: &TypeContext<'_>) -> Result<Option<TypeDefinition>, WirekitError> {
        let decl = ctx.decl;
        let sentinel = self.options.fallback_case.as_str();
        let has_decoder = ctx.decode_init().is_some();

        let mut values = BTreeMap::new();
        let mut unknown_handling = None;
        for case in decl.cases() {
            if !case.associated.is_empty() {
                return self.drop_declaration(&decl.name, format!("case \"{}\" has associated values", case.name));
            }
            if case.name == sentinel && has_decoder {
                unknown_handling = Some(UnknownHandling::Fallback(case.name.clone()));
                continue;
            }
            let raw = match &case.raw_value {
                None => case.name.clone(),
                Some(Literal::String(raw)) => raw.clone(),
                Some(Literal::Number(raw) | Literal::Other(raw)) => {
                    return self.drop_declaration(&decl.name, format!("case \"{}\" has raw value {}", case.name, raw));
                }
            };
            values.insert(case.name.clone(), raw);
        }

        Ok(Some(TypeDefinition::StringEnum(StringEnumDef {
            direction: ctx.direction(),
            doc: join_docs(&decl.docs),
            unknown_handling,
            values,
        })))
    }

    /// `enum Priority: Int` becomes an untagged union of unit variants tagged
    /// with their raw values.
    fn lower_raw_enum(&self, ctx: &TypeContext<'_>) -> Result<Option<TypeDefinition>, WirekitError> {
        let decl = ctx.decl;
        let sentinel = self.options.fallback_case.as_str();
        let has_decoder = ctx.decode_init().is_some();

        let mut variants = BTreeMap::new();
        let mut unknown_handling = None;
        // Swift numbers cases without a raw value one past the previous case.
        let mut implicit = Some(0i64);
        for case in decl.cases() {
            if !case.associated.is_empty() {
                return self.drop_declaration(&decl.name, format!("case \"{}\" has associated values", case.name));
            }
            let tag = match &case.raw_value {
                None => implicit.map(|n| n.to_string()),
                Some(Literal::Number(raw) | Literal::Other(raw)) => numeric_literal(raw),
                Some(Literal::String(_)) => None,
            };
            let Some(tag) = tag else {
                return self.drop_declaration(&decl.name, format!("case \"{}\" has no numeric raw value", case.name));
            };
            implicit = tag.parse::<i64>().ok().and_then(|n| n.checked_add(1));

            let mut variant = if case.name == sentinel && has_decoder {
                unknown_handling = Some(UnknownHandling::Fallback(case.name.clone()));
                VariantDef::unit()
            } else {
                VariantDef::unit().with_tag(tag)
            };
            variant.doc = join_docs(&case.docs);
            variants.insert(case.name.clone(), variant);
        }

        Ok(Some(TypeDefinition::Union(UnionDef {
            direction: ctx.direction(),
            doc: join_docs(&decl.docs),
            discriminator: None,
            unknown_handling,
            variants,
        })))
    }

    fn lower_union(&self, ctx: &TypeContext<'_>) -> Result<Option<TypeDefinition>, WirekitError> {
        let decl = ctx.decl;
        let coding_keys = ctx.coding_keys().unwrap_or_default();
        let sentinel = self.options.fallback_case.as_str();

        let mut variants = BTreeMap::new();
        for case in decl.cases() {
            let payload = match &case.associated[..] {
                [] => VariantPayload::Unit,
                [single] if single.label.is_none() => match normalize(&single.type_text) {
                    Ok(ty) => VariantPayload::Wrapped(ty.to_string()),
                    Err(err) => return self.drop_declaration(&decl.name, format!("case \"{}\": {}", case.name, err)),
                },
                values if values.iter().all(|v| v.label.is_some()) => {
                    let mut fields = BTreeMap::new();
                    for value in values {
                        let label = value.label.clone().unwrap_or_default();
                        let ty = match normalize(&value.type_text) {
                            Ok(ty) => ty,
                            Err(err) => {
                                return self.drop_declaration(&decl.name, format!("case \"{}.{}\": {}", case.name, label, err))
                            }
                        };
                        let mut field = FieldDef::new(ty.to_string());
                        field.wire_name = coding_keys.get(&label).filter(|wire| **wire != label).cloned();
                        fields.insert(label, field);
                    }
                    VariantPayload::Inline(fields)
                }
                _ => {
                    return self.drop_declaration(
                        &decl.name,
                        format!("case \"{}\" mixes labeled and positional values", case.name),
                    )
                }
            };
            let mut variant = match payload {
                VariantPayload::Unit => VariantDef::unit(),
                VariantPayload::Wrapped(ty) => VariantDef::wrapped(ty),
                VariantPayload::Inline(fields) => VariantDef::inline(fields),
            };
            variant.doc = join_docs(&case.docs);
            variants.insert(case.name.clone(), variant);
        }

        let decoder = ctx.decode_init();
        let mut unknown_handling = match variants.get(sentinel) {
            Some(variant) if variant.is_unit() && decoder.is_some() => Some(UnknownHandling::Fallback(sentinel.to_string())),
            _ => None,
        };

        let cases: Vec<String> = variants.keys().cloned().collect();
        let payload_cases: BTreeSet<String> = variants
            .iter()
            .filter(|(_, v)| matches!(v.payload, VariantPayload::Wrapped(_)))
            .map(|(name, _)| name.clone())
            .collect();
        let outcome = scan_union(&UnionScan {
            cases:         &cases,
            payload_cases: &payload_cases,
            fallback:      unknown_handling.as_ref().and_then(UnknownHandling::fallback_name),
            decode_body:   decoder.map(|f| f.body.as_slice()),
            encode_body:   ctx.encode_fn().map(|f| f.body.as_slice()),
            coding_keys:   &coding_keys,
        });

        if unknown_handling.is_none() && outcome.rejects_unknown {
            unknown_handling = Some(UnknownHandling::Error);
        }
        if !outcome.unmatched.is_empty() {
            warn!(
                "Union \"{}\": no wire tag found for {}; they use their case names",
                decl.name,
                outcome.unmatched.join(", ")
            );
        }
        for (case, tag) in &outcome.tags {
            if let Some(variant) = variants.get_mut(case) {
                if tag != case {
                    variant.tag = Some(tag.clone());
                }
            }
        }

        let has_inline = variants.values().any(|v| matches!(v.payload, VariantPayload::Inline(_)));
        if has_inline {
            match &outcome.discriminator {
                None => {
                    return self.drop_declaration(&decl.name, "labeled case payloads need a discriminator".to_string())
                }
                Some(disc) if disc.style == wirekit_schema::DiscriminatorStyle::Wrapped => {
                    return self.drop_declaration(
                        &decl.name,
                        "labeled case payloads cannot use the wrapped style".to_string(),
                    )
                }
                Some(_) => {}
            }
        }

        for (sugar, protocol, label) in [
            (LiteralSugar::String, "ExpressibleByStringLiteral", "stringLiteral"),
            (LiteralSugar::Array, "ExpressibleByArrayLiteral", "arrayLiteral"),
        ] {
            if !ctx.conforms_to(protocol) {
                continue;
            }
            let target = ctx
                .functions()
                .find(|f| f.is_init_labeled(label))
                .and_then(|f| assigned_case(&f.body));
            match target.as_ref().and_then(|case| variants.get_mut(case)) {
                Some(variant) => variant.literal = Some(sugar),
                None => warn!("Union \"{}\": cannot tell which case {} initializes", decl.name, protocol),
            }
        }

        Ok(Some(TypeDefinition::Union(UnionDef {
            direction: ctx.direction(),
            doc: join_docs(&decl.docs),
            discriminator: outcome.discriminator,
            unknown_handling,
            variants,
        })))
    }

    fn lower_alias(&self, alias: &TypeAliasDecl) -> Result<Option<TypeDefinition>, WirekitError> {
        if alias.is_generic {
            debug!("Skipping generic typealias \"{}\"", alias.name);
            return Ok(None);
        }
        let target = match normalize(&alias.target) {
            Ok(ty) => ty.to_string(),
            Err(err) => return self.drop_declaration(&alias.name, err.to_string()),
        };
        let doc = join_docs(&alias.docs);
        let deprecated_attr = alias
            .attributes
            .iter()
            .any(|attr| attr.name == "available" && attr.arguments.iter().any(|arg| arg == "deprecated"));
        let deprecated_doc = doc.as_deref().is_some_and(|doc| {
            let doc = doc.to_lowercase();
            DEPRECATION_MARKERS.iter().any(|marker| doc.contains(marker))
        });
        Ok(Some(TypeDefinition::Alias(AliasDef {
            target,
            deprecated: deprecated_attr || deprecated_doc,
            doc,
        })))
    }
}

/// A type declaration together with every extension of it.
struct TypeContext<'a> {
    decl:       &'a TypeDecl,
    extensions: &'a [&'a ExtensionDecl],
}

impl<'a> TypeContext<'a> {
    fn conformances(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.decl
            .inherited
            .iter()
            .chain(self.extensions.iter().flat_map(|ext| ext.inherited.iter()))
            .map(|name| name.strip_prefix("Swift.").unwrap_or(name))
    }

    fn conforms_to(&self, protocol: &str) -> bool {
        self.conformances().any(|name| name == protocol)
    }

    /// `Codable`, or both halves, means both; neither also means both.
    fn direction(&self) -> Direction {
        let mut direction: Option<Direction> = None;
        for name in self.conformances() {
            let found = match name {
                "Codable" => Direction::Both,
                "Encodable" => Direction::Encode,
                "Decodable" => Direction::Decode,
                _ => continue,
            };
            direction = Some(direction.map_or(found, |d| d.merge(found)));
        }
        direction.unwrap_or_default()
    }

    /// The enum's raw type, when its first inheritance entry is a primitive.
    fn raw_type(&self) -> Option<TypeExpr> {
        let first = self.decl.inherited.first()?;
        match normalize(first) {
            Ok(ty @ TypeExpr::Primitive(_)) => Some(ty),
            _ => match first.as_str() {
                "Character" | "Swift.Character" => Some(TypeExpr::custom("Character")),
                _ => None,
            },
        }
    }

    fn functions(&self) -> impl Iterator<Item = &'a FunctionDecl> + '_ {
        self.decl.functions().chain(self.extensions.iter().flat_map(|ext| ext.functions()))
    }

    fn decode_init(&self) -> Option<&'a FunctionDecl> {
        self.functions().find(|f| f.is_init_labeled("from"))
    }

    fn encode_fn(&self) -> Option<&'a FunctionDecl> {
        self.functions().find(|f| f.is_named("encode", "to"))
    }

    /// Case name to wire key from a nested `CodingKeys` enum.
    fn coding_keys(&self) -> Option<BTreeMap<String, String>> {
        let keys = self.decl.nested("CodingKeys")?;
        Some(
            keys.cases()
                .map(|case| {
                    let wire = match &case.raw_value {
                        Some(Literal::String(raw)) => raw.clone(),
                        _ => case.name.clone(),
                    };
                    (case.name.clone(), wire)
                })
                .collect(),
        )
    }
}

fn join_docs(docs: &[String]) -> Option<String> {
    if docs.is_empty() {
        None
    } else {
        Some(docs.join("\n"))
    }
}
