//! YAML schema documents: the interchange artifact between extraction and
//! generation.
//!
//! Parsing is strict about document structure (the root, the `types` table and
//! each entry's `kind`) and, by default, lenient about individual fields,
//! values and variants: an entry that does not have the expected shape is
//! logged and skipped. [`Strictness::Strict`] turns those skips into errors.
//!
//! Emission is deterministic: collections are already name-ordered in the
//! model and every entry's keys are written in a fixed order.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::{
    error::SchemaError,
    grammar::canonicalize,
    model::{
        AliasDef, Direction, Discriminator, DiscriminatorStyle, FieldDef, LiteralSugar, Schema,
        StringEnumDef, StructDef, TypeDefinition, UnionDef, UnknownHandling, VariantDef,
        VariantPayload, SCHEMA_VERSION,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Skip malformed per-entry data with a warning.
    #[default]
    Lenient,
    /// Fail on the first malformed entry.
    Strict,
}

pub fn parse(text: &str) -> Result<Schema, SchemaError> {
    parse_with(text, Strictness::Lenient)
}

pub fn parse_with(text: &str, strictness: Strictness) -> Result<Schema, SchemaError> {
    let root: Value = serde_yaml::from_str(text)?;
    let root = root
        .as_mapping()
        .ok_or_else(|| SchemaError::MalformedDocument("the document root is not a mapping".into()))?;

    let version = match root.get("version") {
        Some(value) => scalar_to_string(value).ok_or_else(|| {
            SchemaError::MalformedDocument("\"version\" must be a scalar".into())
        })?,
        None => SCHEMA_VERSION.to_string(),
    };
    if version != SCHEMA_VERSION {
        warn!(version = %version, expected = SCHEMA_VERSION, "schema document has an unrecognized version");
    }

    let provider = match root.get("provider") {
        Some(value) => scalar_to_string(value).ok_or_else(|| {
            SchemaError::MalformedDocument("\"provider\" must be a scalar".into())
        })?,
        None => String::new(),
    };

    let mut schema = Schema { version, provider, types: BTreeMap::new() };

    let types = match root.get("types") {
        None | Some(Value::Null) => return Ok(schema),
        Some(Value::Mapping(types)) => types,
        Some(_) => {
            return Err(SchemaError::MalformedDocument("\"types\" is not a mapping".into()))
        }
    };

    for (key, entry) in types {
        let name = key
            .as_str()
            .ok_or_else(|| SchemaError::MalformedDocument(format!("type name {:?} is not a string", key)))?;
        let entry = entry
            .as_mapping()
            .ok_or_else(|| SchemaError::MalformedDocument(format!("type \"{}\" is not a mapping", name)))?;
        let reader = EntryReader { type_name: name, strictness };
        let definition = reader.read_type(entry)?;
        schema.types.insert(name.to_string(), definition);
    }

    Ok(schema)
}

struct EntryReader<'a> {
    type_name:  &'a str,
    strictness: Strictness,
}

impl EntryReader<'_> {
    /// Records a malformed entry: a warning when lenient, an error when strict.
    fn skip(&self, entry: &str, reason: &str) -> Result<(), SchemaError> {
        match self.strictness {
            Strictness::Lenient => {
                warn!(type_name = self.type_name, entry, reason, "skipping malformed schema entry");
                Ok(())
            }
            Strictness::Strict => Err(SchemaError::InvalidEntry {
                type_name: self.type_name.to_string(),
                entry:     entry.to_string(),
                reason:    reason.to_string(),
            }),
        }
    }

    fn missing(&self, field: &str) -> SchemaError {
        SchemaError::MissingField {
            field:     field.to_string(),
            type_name: self.type_name.to_string(),
        }
    }

    fn read_type(&self, entry: &Mapping) -> Result<TypeDefinition, SchemaError> {
        let kind = entry.get("kind").ok_or_else(|| self.missing("kind"))?;
        let kind = kind.as_str().ok_or_else(|| SchemaError::UnknownKind {
            kind:      format!("{:?}", kind),
            type_name: self.type_name.to_string(),
        })?;

        match kind {
            "struct" => Ok(TypeDefinition::Struct(StructDef {
                direction: self.read_direction(entry)?,
                doc:       self.read_doc(entry)?,
                fields:    self.read_fields(entry.get("fields"), "fields")?,
            })),
            "string_enum" => Ok(TypeDefinition::StringEnum(StringEnumDef {
                direction:        self.read_direction(entry)?,
                doc:              self.read_doc(entry)?,
                unknown_handling: self.read_unknown_handling(entry)?,
                values:           self.read_values(entry)?,
            })),
            "union" => Ok(TypeDefinition::Union(UnionDef {
                direction:        self.read_direction(entry)?,
                doc:              self.read_doc(entry)?,
                discriminator:    self.read_discriminator(entry)?,
                unknown_handling: self.read_unknown_handling(entry)?,
                variants:         self.read_variants(entry)?,
            })),
            "alias" => {
                let target = entry
                    .get("target")
                    .and_then(Value::as_str)
                    .ok_or_else(|| self.missing("target"))?;
                let deprecated = match entry.get("deprecated") {
                    None => false,
                    Some(value) => match value.as_bool() {
                        Some(flag) => flag,
                        None => {
                            self.skip("deprecated", "expected a boolean")?;
                            false
                        }
                    },
                };
                Ok(TypeDefinition::Alias(AliasDef {
                    target: target.to_string(),
                    deprecated,
                    doc: self.read_doc(entry)?,
                }))
            }
            other => Err(SchemaError::UnknownKind {
                kind:      other.to_string(),
                type_name: self.type_name.to_string(),
            }),
        }
    }

    fn read_direction(&self, entry: &Mapping) -> Result<Direction, SchemaError> {
        let Some(value) = entry.get("direction") else {
            return Ok(Direction::Both);
        };
        match value.as_str().and_then(Direction::parse) {
            Some(direction) => Ok(direction),
            None => {
                self.skip("direction", "expected one of encode, decode, both")?;
                Ok(Direction::Both)
            }
        }
    }

    fn read_doc(&self, entry: &Mapping) -> Result<Option<String>, SchemaError> {
        match entry.get("doc") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(doc)) => Ok(Some(doc.clone())),
            Some(_) => {
                self.skip("doc", "expected a string")?;
                Ok(None)
            }
        }
    }

    fn read_unknown_handling(&self, entry: &Mapping) -> Result<Option<UnknownHandling>, SchemaError> {
        let Some(value) = entry.get("unknown_handling") else {
            return Ok(None);
        };
        match value.as_str() {
            Some("error") => Ok(Some(UnknownHandling::Error)),
            Some("fallback") => {
                let name = entry
                    .get("fallback_value")
                    .and_then(Value::as_str)
                    .ok_or_else(|| self.missing("fallback_value"))?;
                Ok(Some(UnknownHandling::Fallback(name.to_string())))
            }
            _ => {
                self.skip("unknown_handling", "expected fallback or error")?;
                Ok(None)
            }
        }
    }

    fn read_fields(&self, fields: Option<&Value>, context: &str) -> Result<BTreeMap<String, FieldDef>, SchemaError> {
        let mut out = BTreeMap::new();
        let fields = match fields {
            None | Some(Value::Null) => return Ok(out),
            Some(Value::Mapping(fields)) => fields,
            Some(_) => {
                self.skip(context, "expected a mapping")?;
                return Ok(out);
            }
        };
        for (key, value) in fields {
            let Some(name) = key.as_str() else {
                self.skip(context, "field name is not a string")?;
                continue;
            };
            if let Some(field) = self.read_field(name, value)? {
                out.insert(name.to_string(), field);
            }
        }
        Ok(out)
    }

    fn read_field(&self, name: &str, value: &Value) -> Result<Option<FieldDef>, SchemaError> {
        // `name: int` is accepted as shorthand for `name: { type: int }`.
        let (ty, entry) = match value {
            Value::String(ty) => (ty.as_str(), None),
            Value::Mapping(entry) => match entry.get("type").and_then(Value::as_str) {
                Some(ty) => (ty, Some(entry)),
                None => {
                    self.skip(name, "field has no type")?;
                    return Ok(None);
                }
            },
            _ => {
                self.skip(name, "expected a mapping")?;
                return Ok(None);
            }
        };
        let ty = match canonicalize(ty) {
            Ok(ty) => ty,
            Err(err) => {
                self.skip(name, &err.to_string())?;
                return Ok(None);
            }
        };

        let mut field = FieldDef::new(ty);
        let Some(entry) = entry else {
            return Ok(Some(field));
        };
        match entry.get("wire_name") {
            None | Some(Value::Null) => {}
            Some(Value::String(wire)) => {
                if wire != name {
                    field.wire_name = Some(wire.clone());
                }
            }
            Some(_) => {
                self.skip(name, "wire_name is not a string")?;
                return Ok(None);
            }
        }
        match entry.get("required") {
            None => {}
            Some(Value::Bool(required)) => field.required = *required,
            Some(_) => {
                self.skip(name, "required is not a boolean")?;
                return Ok(None);
            }
        }
        field.ty = field.canonical_type();
        field.doc = self.read_doc(entry)?;
        Ok(Some(field))
    }

    fn read_values(&self, entry: &Mapping) -> Result<BTreeMap<String, String>, SchemaError> {
        let mut out = BTreeMap::new();
        let values = match entry.get("values") {
            None | Some(Value::Null) => return Ok(out),
            Some(Value::Mapping(values)) => values,
            Some(_) => {
                self.skip("values", "expected a mapping")?;
                return Ok(out);
            }
        };
        for (key, value) in values {
            match (key.as_str(), scalar_to_string(value)) {
                (Some(case), Some(literal)) => {
                    out.insert(case.to_string(), literal);
                }
                (Some(case), None) => self.skip(case, "enum value is not a scalar")?,
                (None, _) => self.skip("values", "case name is not a string")?,
            }
        }
        Ok(out)
    }

    fn read_discriminator(&self, entry: &Mapping) -> Result<Option<Discriminator>, SchemaError> {
        match entry.get("discriminator") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(field)) => Ok(Some(Discriminator::inline(field.clone()))),
            Some(Value::Mapping(disc)) => {
                let Some(field) = disc.get("field").and_then(Value::as_str) else {
                    self.skip("discriminator", "missing field")?;
                    return Ok(None);
                };
                let style = match disc.get("style") {
                    None => DiscriminatorStyle::Inline,
                    Some(style) => match style.as_str().and_then(DiscriminatorStyle::parse) {
                        Some(style) => style,
                        None => {
                            self.skip("discriminator", "style must be inline or wrapped")?;
                            DiscriminatorStyle::Inline
                        }
                    },
                };
                Ok(Some(Discriminator { field: field.to_string(), style }))
            }
            Some(_) => {
                self.skip("discriminator", "expected a mapping")?;
                Ok(None)
            }
        }
    }

    fn read_variants(&self, entry: &Mapping) -> Result<BTreeMap<String, VariantDef>, SchemaError> {
        let mut out = BTreeMap::new();
        let variants = match entry.get("variants") {
            None | Some(Value::Null) => return Ok(out),
            Some(Value::Mapping(variants)) => variants,
            Some(_) => {
                self.skip("variants", "expected a mapping")?;
                return Ok(out);
            }
        };
        for (key, value) in variants {
            let Some(name) = key.as_str() else {
                self.skip("variants", "variant name is not a string")?;
                continue;
            };
            if let Some(variant) = self.read_variant(name, value)? {
                out.insert(name.to_string(), variant);
            }
        }
        Ok(out)
    }

    fn read_variant(&self, name: &str, value: &Value) -> Result<Option<VariantDef>, SchemaError> {
        let entry = match value {
            Value::Null => return Ok(Some(VariantDef::unit())),
            Value::Mapping(entry) => entry,
            _ => {
                self.skip(name, "expected a mapping")?;
                return Ok(None);
            }
        };

        let tag = match entry.get("tag") {
            None | Some(Value::Null) => None,
            Some(value) => match scalar_to_string(value) {
                Some(tag) => Some(tag),
                None => {
                    self.skip(name, "tag is not a scalar")?;
                    return Ok(None);
                }
            },
        };

        let payload = match (entry.get("payload"), entry.get("fields")) {
            (Some(_), Some(_)) => {
                self.skip(name, "variant has both payload and fields")?;
                return Ok(None);
            }
            (Some(Value::String(ty)), None) => match canonicalize(ty) {
                Ok(ty) => VariantPayload::Wrapped(ty),
                Err(err) => {
                    self.skip(name, &err.to_string())?;
                    return Ok(None);
                }
            },
            (Some(_), None) => {
                self.skip(name, "payload is not a type string")?;
                return Ok(None);
            }
            (None, Some(fields)) => VariantPayload::Inline(self.read_fields(Some(fields), name)?),
            (None, None) => VariantPayload::Unit,
        };

        let literal = match entry.get("literal") {
            None | Some(Value::Null) => None,
            Some(value) => match value.as_str().and_then(LiteralSugar::parse) {
                Some(literal) => Some(literal),
                None => {
                    self.skip(name, "literal must be string or array")?;
                    return Ok(None);
                }
            },
        };

        Ok(Some(VariantDef { tag, payload, literal, doc: self.read_doc(entry)? }))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Renders a schema as a YAML document. Identical schemas always produce
/// byte-identical text.
pub fn emit(schema: &Schema) -> Result<String, SchemaError> {
    let mut root = Mapping::new();
    insert(&mut root, "version", string(&schema.version));
    insert(&mut root, "provider", string(&schema.provider));

    let mut types = Mapping::new();
    for (name, definition) in &schema.types {
        types.insert(string(name), Value::Mapping(emit_type(definition)));
    }
    insert(&mut root, "types", Value::Mapping(types));

    Ok(serde_yaml::to_string(&Value::Mapping(root))?)
}

fn emit_type(definition: &TypeDefinition) -> Mapping {
    let mut out = Mapping::new();
    insert(&mut out, "kind", string(definition.kind()));
    match definition {
        TypeDefinition::Struct(def) => {
            insert(&mut out, "direction", string(def.direction.as_str()));
            insert_doc(&mut out, &def.doc);
            insert(&mut out, "fields", Value::Mapping(emit_fields(&def.fields)));
        }
        TypeDefinition::StringEnum(def) => {
            insert(&mut out, "direction", string(def.direction.as_str()));
            insert_doc(&mut out, &def.doc);
            insert_unknown_handling(&mut out, &def.unknown_handling);
            let mut values = Mapping::new();
            for (case, literal) in &def.values {
                values.insert(string(case), string(literal));
            }
            insert(&mut out, "values", Value::Mapping(values));
        }
        TypeDefinition::Union(def) => {
            insert(&mut out, "direction", string(def.direction.as_str()));
            insert_doc(&mut out, &def.doc);
            if let Some(disc) = &def.discriminator {
                let mut entry = Mapping::new();
                insert(&mut entry, "field", string(&disc.field));
                insert(&mut entry, "style", string(disc.style.as_str()));
                insert(&mut out, "discriminator", Value::Mapping(entry));
            }
            insert_unknown_handling(&mut out, &def.unknown_handling);
            let mut variants = Mapping::new();
            for (name, variant) in &def.variants {
                variants.insert(string(name), Value::Mapping(emit_variant(variant)));
            }
            insert(&mut out, "variants", Value::Mapping(variants));
        }
        TypeDefinition::Alias(def) => {
            insert(&mut out, "target", string(&def.target));
            if def.deprecated {
                insert(&mut out, "deprecated", Value::Bool(true));
            }
            insert_doc(&mut out, &def.doc);
        }
    }
    out
}

fn emit_fields(fields: &BTreeMap<String, FieldDef>) -> Mapping {
    let mut out = Mapping::new();
    for (name, field) in fields {
        let declared = field.canonical_type();
        let ty = canonicalize(&declared).unwrap_or(declared);
        let mut entry = Mapping::new();
        let default_required = !ty.ends_with('?');
        insert(&mut entry, "type", string(&ty));
        if field.is_remapped(name) {
            insert(&mut entry, "wire_name", string(field.effective_wire_name(name)));
        }
        if field.required != default_required {
            insert(&mut entry, "required", Value::Bool(field.required));
        }
        insert_doc(&mut entry, &field.doc);
        out.insert(string(name), Value::Mapping(entry));
    }
    out
}

fn emit_variant(variant: &VariantDef) -> Mapping {
    let mut out = Mapping::new();
    if let Some(tag) = variant.tag.as_deref() {
        insert(&mut out, "tag", string(tag));
    }
    match &variant.payload {
        VariantPayload::Unit => {}
        VariantPayload::Wrapped(ty) => {
            let ty = canonicalize(ty).unwrap_or_else(|_| ty.clone());
            insert(&mut out, "payload", string(&ty));
        }
        VariantPayload::Inline(fields) => {
            insert(&mut out, "fields", Value::Mapping(emit_fields(fields)));
        }
    }
    if let Some(literal) = variant.literal {
        insert(&mut out, "literal", string(literal.as_str()));
    }
    insert_doc(&mut out, &variant.doc);
    out
}

fn insert_unknown_handling(out: &mut Mapping, handling: &Option<UnknownHandling>) {
    match handling {
        None => {}
        Some(UnknownHandling::Error) => insert(out, "unknown_handling", string("error")),
        Some(UnknownHandling::Fallback(name)) => {
            insert(out, "unknown_handling", string("fallback"));
            insert(out, "fallback_value", string(name));
        }
    }
}

fn insert_doc(out: &mut Mapping, doc: &Option<String>) {
    if let Some(doc) = doc {
        insert(out, "doc", string(doc));
    }
}

fn insert(out: &mut Mapping, key: &str, value: Value) {
    out.insert(string(key), value);
}

fn string(text: &str) -> Value {
    Value::String(text.to_string())
}
