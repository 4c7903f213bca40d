//! The canonical type grammar shared by the extractor and the generator:
//!
//! ```text
//! Type      ::= Primitive | List | Map | Optional | Custom
//! Primitive ::= string | int | float | bool | any
//! List      ::= "list[" Type "]"
//! Map       ::= "map[" Type "," Type "]"
//! Optional  ::= Type "?"
//! ```
//!
//! Custom names are passed through untouched; whether they refer to a type in
//! the same schema is left to the consumer.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SchemaError;

lazy_static! {
    static ref TYPE_TOKEN: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_.]*|\[|\]|,|\?|\s+").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"^\s+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    String,
    Int,
    Float,
    Bool,
    Any,
}

impl Primitive {
    pub const ALL: [Primitive; 5] = [
        Primitive::String,
        Primitive::Int,
        Primitive::Float,
        Primitive::Bool,
        Primitive::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Int    => "int",
            Primitive::Float  => "float",
            Primitive::Bool   => "bool",
            Primitive::Any    => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        Primitive::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Primitive(Primitive),
    List(Box<TypeExpr>),
    Map(Box<TypeExpr>, Box<TypeExpr>),
    Optional(Box<TypeExpr>),
    Custom(String),
}

impl TypeExpr {
    /// Parses a grammar string such as `list[map[string, bool]]?`.
    pub fn parse(text: &str) -> Result<TypeExpr, SchemaError> {
        let tokens = tokenize(text)?;
        let mut index = 0;
        let ty = parse_type(&tokens, &mut index, text)?;
        if index != tokens.len() {
            return Err(SchemaError::InvalidType(format!(
                "unexpected \"{}\" in \"{}\"",
                tokens[index], text
            )));
        }
        Ok(ty)
    }

    pub fn list(inner: TypeExpr) -> TypeExpr {
        TypeExpr::List(Box::new(inner))
    }

    pub fn map(key: TypeExpr, value: TypeExpr) -> TypeExpr {
        TypeExpr::Map(Box::new(key), Box::new(value))
    }

    pub fn custom(name: impl Into<String>) -> TypeExpr {
        TypeExpr::Custom(name.into())
    }

    /// Wraps in an optional unless the type already is one.
    pub fn optional(self) -> TypeExpr {
        if self.is_optional() {
            self
        } else {
            TypeExpr::Optional(Box::new(self))
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeExpr::Optional(_))
    }

    /// Strips one optional layer (there is never more than one).
    pub fn unwrap_optional(&self) -> &TypeExpr {
        match self {
            TypeExpr::Optional(inner) => inner,
            other => other,
        }
    }

    /// All custom type names referenced anywhere in the expression.
    pub fn custom_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_custom(&mut names);
        names
    }

    fn collect_custom<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            TypeExpr::Primitive(_) => {}
            TypeExpr::List(inner) | TypeExpr::Optional(inner) => inner.collect_custom(names),
            TypeExpr::Map(key, value) => {
                key.collect_custom(names);
                value.collect_custom(names);
            }
            TypeExpr::Custom(name) => names.push(name),
        }
    }

    /// Rewrites every custom name through `rename`.
    pub fn map_custom(&self, rename: &impl Fn(&str) -> String) -> TypeExpr {
        match self {
            TypeExpr::Primitive(p) => TypeExpr::Primitive(*p),
            TypeExpr::List(inner) => TypeExpr::list(inner.map_custom(rename)),
            TypeExpr::Map(key, value) => TypeExpr::map(key.map_custom(rename), value.map_custom(rename)),
            TypeExpr::Optional(inner) => inner.map_custom(rename).optional(),
            TypeExpr::Custom(name) => TypeExpr::Custom(rename(name)),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(p)    => f.write_str(p.as_str()),
            TypeExpr::List(inner)     => write!(f, "list[{}]", inner),
            TypeExpr::Map(key, value) => write!(f, "map[{}, {}]", key, value),
            TypeExpr::Optional(inner) => write!(f, "{}?", inner),
            TypeExpr::Custom(name)    => f.write_str(name),
        }
    }
}

impl std::str::FromStr for TypeExpr {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TypeExpr::parse(s)
    }
}

/// Re-renders a grammar string in canonical form.
pub fn canonicalize(text: &str) -> Result<String, SchemaError> {
    Ok(TypeExpr::parse(text)?.to_string())
}

fn tokenize(text: &str) -> Result<Vec<&str>, SchemaError> {
    let mut tokens = Vec::new();
    let mut last_end = 0;
    for mat in TYPE_TOKEN.find_iter(text) {
        if mat.start() > last_end {
            return Err(SchemaError::InvalidType(format!(
                "unexpected \"{}\" in \"{}\"",
                &text[last_end..mat.start()],
                text
            )));
        }
        if !WHITESPACE.is_match(mat.as_str()) {
            tokens.push(mat.as_str());
        }
        last_end = mat.end();
    }
    if last_end != text.len() {
        return Err(SchemaError::InvalidType(format!(
            "unexpected \"{}\" in \"{}\"",
            &text[last_end..],
            text
        )));
    }
    Ok(tokens)
}

fn parse_type(tokens: &[&str], index: &mut usize, source: &str) -> Result<TypeExpr, SchemaError> {
    let name = match tokens.get(*index) {
        Some(tok) if is_identifier(tok) => *tok,
        Some(tok) => {
            return Err(SchemaError::InvalidType(format!(
                "expected a type name but found \"{}\" in \"{}\"",
                tok, source
            )))
        }
        None => {
            return Err(SchemaError::InvalidType(format!(
                "unexpected end of \"{}\"",
                source
            )))
        }
    };
    *index += 1;

    let opens_bracket = tokens.get(*index) == Some(&"[");
    let mut ty = match name {
        "list" if opens_bracket => {
            *index += 1;
            let inner = parse_type(tokens, index, source)?;
            expect(tokens, index, "]", source)?;
            TypeExpr::list(inner)
        }
        "map" if opens_bracket => {
            *index += 1;
            let key = parse_type(tokens, index, source)?;
            expect(tokens, index, ",", source)?;
            let value = parse_type(tokens, index, source)?;
            expect(tokens, index, "]", source)?;
            TypeExpr::map(key, value)
        }
        other => match Primitive::from_name(other) {
            Some(p) => TypeExpr::Primitive(p),
            None => TypeExpr::custom(other),
        },
    };

    // `T??` collapses: optional() never double wraps.
    while tokens.get(*index) == Some(&"?") {
        *index += 1;
        ty = ty.optional();
    }
    Ok(ty)
}

fn expect(tokens: &[&str], index: &mut usize, wanted: &str, source: &str) -> Result<(), SchemaError> {
    match tokens.get(*index) {
        Some(tok) if *tok == wanted => {
            *index += 1;
            Ok(())
        }
        Some(tok) => Err(SchemaError::InvalidType(format!(
            "expected \"{}\" but found \"{}\" in \"{}\"",
            wanted, tok, source
        ))),
        None => Err(SchemaError::InvalidType(format!(
            "expected \"{}\" at end of \"{}\"",
            wanted, source
        ))),
    }
}

fn is_identifier(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
}
