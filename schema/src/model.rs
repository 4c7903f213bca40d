//! The language-neutral intermediate representation.
//!
//! Every collection is a `BTreeMap`, so iteration (and therefore every emitted
//! document and source file) is ordered by name no matter in which order the
//! extractor discovered the declarations.

use std::collections::BTreeMap;
use std::fmt;

use crate::grammar::{Primitive, TypeExpr};

/// Version tag written to (and expected in) schema documents.
pub const SCHEMA_VERSION: &str = "1";

/// Default name of the sentinel case that absorbs unknown wire values.
pub const DEFAULT_FALLBACK_CASE: &str = "futureProof";

#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub version:  String,
    pub provider: String,
    pub types:    BTreeMap<String, TypeDefinition>,
}

impl Schema {
    pub fn new(provider: impl Into<String>) -> Self {
        Schema {
            version:  SCHEMA_VERSION.to_string(),
            provider: provider.into(),
            types:    BTreeMap::new(),
        }
    }

    /// Inserts a definition, returning the one it replaced (if any).
    pub fn insert(&mut self, name: impl Into<String>, def: TypeDefinition) -> Option<TypeDefinition> {
        self.types.insert(name.into(), def)
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Encode,
    Decode,
    #[default]
    Both,
}

impl Direction {
    pub fn allows_encode(self) -> bool {
        matches!(self, Direction::Encode | Direction::Both)
    }

    pub fn allows_decode(self) -> bool {
        matches!(self, Direction::Decode | Direction::Both)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Encode => "encode",
            Direction::Decode => "decode",
            Direction::Both   => "both",
        }
    }

    pub fn parse(text: &str) -> Option<Direction> {
        match text {
            "encode" => Some(Direction::Encode),
            "decode" => Some(Direction::Decode),
            "both"   => Some(Direction::Both),
            _ => None,
        }
    }

    /// Combines conformance evidence, e.g. an `Encodable` declaration plus a
    /// `Decodable` extension.
    pub fn merge(self, other: Direction) -> Direction {
        if self == other { self } else { Direction::Both }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What decoding does with a wire value that matches no declared case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownHandling {
    Error,
    Fallback(String),
}

impl UnknownHandling {
    pub fn fallback_name(&self) -> Option<&str> {
        match self {
            UnknownHandling::Fallback(name) => Some(name),
            UnknownHandling::Error => None,
        }
    }
}

/// Unspecified handling rejects unknown values, the same as `Error`.
fn same_unknown_handling(a: &Option<UnknownHandling>, b: &Option<UnknownHandling>) -> bool {
    a.as_ref().and_then(UnknownHandling::fallback_name) == b.as_ref().and_then(UnknownHandling::fallback_name)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDefinition {
    Struct(StructDef),
    StringEnum(StringEnumDef),
    Union(UnionDef),
    Alias(AliasDef),
}

impl TypeDefinition {
    pub fn kind(&self) -> &'static str {
        match self {
            TypeDefinition::Struct(_)     => "struct",
            TypeDefinition::StringEnum(_) => "string_enum",
            TypeDefinition::Union(_)      => "union",
            TypeDefinition::Alias(_)      => "alias",
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            TypeDefinition::Struct(def)     => def.doc.as_deref(),
            TypeDefinition::StringEnum(def) => def.doc.as_deref(),
            TypeDefinition::Union(def)      => def.doc.as_deref(),
            TypeDefinition::Alias(def)      => def.doc.as_deref(),
        }
    }

    /// Aliases carry no direction of their own.
    pub fn direction(&self) -> Option<Direction> {
        match self {
            TypeDefinition::Struct(def)     => Some(def.direction),
            TypeDefinition::StringEnum(def) => Some(def.direction),
            TypeDefinition::Union(def)      => Some(def.direction),
            TypeDefinition::Alias(_)        => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructDef {
    pub direction: Direction,
    pub doc:       Option<String>,
    pub fields:    BTreeMap<String, FieldDef>,
}

#[derive(Debug, Clone, Default)]
pub struct StringEnumDef {
    pub direction:        Direction,
    pub doc:              Option<String>,
    pub unknown_handling: Option<UnknownHandling>,
    /// Case name to literal wire value.
    pub values:           BTreeMap<String, String>,
}

impl StringEnumDef {
    pub fn fallback_case(&self) -> Option<&str> {
        self.unknown_handling.as_ref().and_then(UnknownHandling::fallback_name)
    }
}

impl PartialEq for StringEnumDef {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction
            && self.doc == other.doc
            && same_unknown_handling(&self.unknown_handling, &other.unknown_handling)
            && self.values == other.values
    }
}

/// Equality is by wire behavior: a variant tagged with its own name equals an
/// untagged one, and unspecified unknown handling equals `Error`.
#[derive(Debug, Clone, Default)]
pub struct UnionDef {
    pub direction:        Direction,
    pub doc:              Option<String>,
    pub discriminator:    Option<Discriminator>,
    pub unknown_handling: Option<UnknownHandling>,
    pub variants:         BTreeMap<String, VariantDef>,
}

impl UnionDef {
    pub fn fallback_variant(&self) -> Option<&str> {
        self.unknown_handling.as_ref().and_then(UnknownHandling::fallback_name)
    }

    pub fn is_fallback(&self, variant: &str) -> bool {
        self.fallback_variant() == Some(variant)
    }

    /// `Int` or `Float` when the union has no discriminator and every
    /// non-fallback variant is a unit tagged with a number literal, i.e. a
    /// raw-valued enum on the wire.
    pub fn raw_value_type(&self) -> Option<Primitive> {
        if self.discriminator.is_some() {
            return None;
        }
        let mut raw = None;
        for (name, variant) in &self.variants {
            if self.is_fallback(name) {
                continue;
            }
            let tag = variant.tag.as_deref().filter(|_| variant.is_unit())?;
            let found = if tag.parse::<i64>().is_ok_and(|n| n.to_string() == tag) {
                Primitive::Int
            } else if is_float_literal(tag) {
                Primitive::Float
            } else {
                return None;
            };
            raw = match raw {
                Some(Primitive::Float) => Some(Primitive::Float),
                _ => Some(found),
            };
        }
        raw
    }
}

fn is_float_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    digits.starts_with(|c: char| c.is_ascii_digit())
        && digits.ends_with(|c: char| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+'))
        && text.parse::<f64>().is_ok_and(f64::is_finite)
}

impl PartialEq for UnionDef {
    fn eq(&self, other: &Self) -> bool {
        self.direction == other.direction
            && self.doc == other.doc
            && self.discriminator == other.discriminator
            && same_unknown_handling(&self.unknown_handling, &other.unknown_handling)
            && self.variants.len() == other.variants.len()
            && self.variants.iter().zip(&other.variants).all(|((name, a), (other_name, b))| {
                name == other_name
                    && a.wire_tag(name) == b.wire_tag(other_name)
                    && a.payload == b.payload
                    && a.literal == b.literal
                    && a.doc == b.doc
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDef {
    pub target:     String,
    pub deprecated: bool,
    pub doc:        Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscriminatorStyle {
    /// The tag sits next to the payload's own fields.
    #[default]
    Inline,
    /// The payload is nested under a key equal to the tag value.
    Wrapped,
}

impl DiscriminatorStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscriminatorStyle::Inline  => "inline",
            DiscriminatorStyle::Wrapped => "wrapped",
        }
    }

    pub fn parse(text: &str) -> Option<DiscriminatorStyle> {
        match text {
            "inline"  => Some(DiscriminatorStyle::Inline),
            "wrapped" => Some(DiscriminatorStyle::Wrapped),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discriminator {
    pub field: String,
    pub style: DiscriminatorStyle,
}

impl Discriminator {
    pub fn inline(field: impl Into<String>) -> Self {
        Discriminator { field: field.into(), style: DiscriminatorStyle::Inline }
    }

    pub fn wrapped(field: impl Into<String>) -> Self {
        Discriminator { field: field.into(), style: DiscriminatorStyle::Wrapped }
    }
}

/// Equality compares `canonical_type`, so a non-required `int` equals `int?`.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Canonical grammar type string, e.g. `list[string]?`.
    pub ty:        String,
    pub wire_name: Option<String>,
    pub required:  bool,
    pub doc:       Option<String>,
}

impl FieldDef {
    /// A field whose requiredness follows the type: `int?` is optional.
    pub fn new(ty: impl Into<String>) -> Self {
        let ty = ty.into();
        let required = !ty.trim_end().ends_with('?');
        FieldDef { ty, wire_name: None, required, doc: None }
    }

    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn effective_wire_name<'a>(&'a self, field_name: &'a str) -> &'a str {
        self.wire_name.as_deref().unwrap_or(field_name)
    }

    /// True when the wire key differs from the field identifier.
    pub fn is_remapped(&self, field_name: &str) -> bool {
        self.effective_wire_name(field_name) != field_name
    }

    pub fn is_optional(&self) -> bool {
        !self.required || self.ty.trim_end().ends_with('?')
    }

    /// The grammar type with optionality folded in.
    pub fn canonical_type(&self) -> String {
        let ty = self.ty.trim_end();
        if self.required || ty.ends_with('?') {
            ty.to_string()
        } else {
            format!("{}?", ty)
        }
    }

    pub fn type_expr(&self) -> Result<TypeExpr, crate::SchemaError> {
        TypeExpr::parse(&self.ty)
    }
}

impl PartialEq for FieldDef {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_type() == other.canonical_type() && self.wire_name == other.wire_name && self.doc == other.doc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralSugar {
    String,
    Array,
}

impl LiteralSugar {
    pub fn as_str(self) -> &'static str {
        match self {
            LiteralSugar::String => "string",
            LiteralSugar::Array  => "array",
        }
    }

    pub fn parse(text: &str) -> Option<LiteralSugar> {
        match text {
            "string" => Some(LiteralSugar::String),
            "array"  => Some(LiteralSugar::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantPayload {
    Unit,
    /// Wraps one other type wholesale (grammar type string).
    Wrapped(String),
    Inline(BTreeMap<String, FieldDef>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantDef {
    pub tag:     Option<String>,
    pub payload: VariantPayload,
    pub literal: Option<LiteralSugar>,
    pub doc:     Option<String>,
}

impl VariantDef {
    pub fn unit() -> Self {
        VariantDef { tag: None, payload: VariantPayload::Unit, literal: None, doc: None }
    }

    pub fn wrapped(ty: impl Into<String>) -> Self {
        VariantDef { tag: None, payload: VariantPayload::Wrapped(ty.into()), literal: None, doc: None }
    }

    pub fn inline(fields: BTreeMap<String, FieldDef>) -> Self {
        VariantDef { tag: None, payload: VariantPayload::Inline(fields), literal: None, doc: None }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_literal(mut self, literal: LiteralSugar) -> Self {
        self.literal = Some(literal);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn is_unit(&self) -> bool {
        matches!(self.payload, VariantPayload::Unit)
    }

    /// Wire tag, defaulting to the variant name.
    pub fn wire_tag<'a>(&'a self, variant_name: &'a str) -> &'a str {
        self.tag.as_deref().unwrap_or(variant_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_requiredness_follows_type() {
        assert!(FieldDef::new("int").required);
        assert!(!FieldDef::new("int?").required);
        assert!(FieldDef::new("list[string]?").is_optional());
    }

    #[test]
    fn test_identity_wire_name_is_not_a_remap() {
        let field = FieldDef::new("string").with_wire_name("model");
        assert!(!field.is_remapped("model"));
        let field = FieldDef::new("int").with_wire_name("input_tokens");
        assert!(field.is_remapped("inputTokens"));
        assert_eq!(field.effective_wire_name("inputTokens"), "input_tokens");
    }

    #[test]
    fn test_non_required_field_equals_optional_type() {
        let loose = FieldDef { ty: "int".into(), wire_name: None, required: false, doc: None };
        assert_eq!(loose.canonical_type(), "int?");
        assert_eq!(loose, FieldDef::new("int?"));
        assert_ne!(FieldDef::new("int"), FieldDef::new("int?"));
    }

    #[test]
    fn test_union_equality_uses_wire_tags() {
        let mut tagged = UnionDef { discriminator: Some(Discriminator::inline("type")), ..Default::default() };
        tagged.variants.insert("text".into(), VariantDef::wrapped("TextPayload").with_tag("text"));
        let mut plain = tagged.clone();
        plain.variants.insert("text".into(), VariantDef::wrapped("TextPayload"));
        assert_eq!(tagged, plain);

        plain.variants.insert("text".into(), VariantDef::wrapped("TextPayload").with_tag("body"));
        assert_ne!(tagged, plain);
    }

    #[test]
    fn test_raw_value_type() {
        let mut priority = UnionDef::default();
        priority.variants.insert("low".into(), VariantDef::unit().with_tag("1"));
        priority.variants.insert("high".into(), VariantDef::unit().with_tag("-2"));
        assert_eq!(priority.raw_value_type(), Some(Primitive::Int));

        priority.variants.insert("half".into(), VariantDef::unit().with_tag("0.5"));
        assert_eq!(priority.raw_value_type(), Some(Primitive::Float));

        priority.variants.insert("none".into(), VariantDef::unit());
        assert_eq!(priority.raw_value_type(), None);

        let mut tagged = UnionDef { discriminator: Some(Discriminator::inline("type")), ..Default::default() };
        tagged.variants.insert("low".into(), VariantDef::unit().with_tag("1"));
        assert_eq!(tagged.raw_value_type(), None);
        assert_eq!(UnionDef::default().raw_value_type(), None);
    }

    #[test]
    fn test_unspecified_unknown_handling_equals_error() {
        let strict = UnionDef { unknown_handling: Some(UnknownHandling::Error), ..Default::default() };
        assert_eq!(strict, UnionDef::default());
        let lenient = UnionDef { unknown_handling: Some(UnknownHandling::Fallback("other".into())), ..Default::default() };
        assert_ne!(lenient, UnionDef::default());

        let strict = StringEnumDef { unknown_handling: Some(UnknownHandling::Error), ..Default::default() };
        assert_eq!(strict, StringEnumDef::default());
    }

    #[test]
    fn test_direction_merge() {
        assert_eq!(Direction::Encode.merge(Direction::Decode), Direction::Both);
        assert_eq!(Direction::Decode.merge(Direction::Decode), Direction::Decode);
        assert!(Direction::Both.allows_encode() && Direction::Both.allows_decode());
        assert!(!Direction::Encode.allows_decode());
    }
}
