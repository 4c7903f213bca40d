//! Mapping between Swift type syntax and the canonical type grammar.

use wirekit_schema::{Primitive, SchemaError, TypeExpr};

use crate::{
    error::WirekitError,
    tokenizer::{tokenize_source, Token, TokenKind},
};

const INT_TYPES: [&str; 10] = [
    "Int", "Int8", "Int16", "Int32", "Int64", "UInt", "UInt8", "UInt16", "UInt32", "UInt64",
];
const FLOAT_TYPES: [&str; 6] = ["Double", "Float", "Float32", "Float64", "CGFloat", "Decimal"];
const ANY_TYPES: [&str; 2] = ["JSONValue", "AnyCodable"];

/// Reduces Swift type syntax such as `[String: [Int]]?` to a grammar type.
pub fn normalize(swift: &str) -> Result<TypeExpr, WirekitError> {
    let tokens = tokenize_source(swift)?;
    let mut index = 0;
    let ty = parse_type(&tokens, &mut index, swift)?;
    match tokens.get(index) {
        Some(tok) if tok.kind != TokenKind::Eof => Err(unsupported(swift, &format!("unexpected \"{}\"", tok.text))),
        _ => Ok(ty),
    }
}

/// Renders a grammar type as Swift syntax.
pub fn materialize(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Primitive(p) => match p {
            Primitive::String => "String".to_string(),
            Primitive::Int    => "Int".to_string(),
            Primitive::Float  => "Double".to_string(),
            Primitive::Bool   => "Bool".to_string(),
            Primitive::Any    => "JSONValue".to_string(),
        },
        TypeExpr::List(inner)     => format!("[{}]", materialize(inner)),
        TypeExpr::Map(key, value) => format!("[{}: {}]", materialize(key), materialize(value)),
        TypeExpr::Optional(inner) => format!("{}?", materialize(inner.unwrap_optional())),
        TypeExpr::Custom(name)    => name.clone(),
    }
}

fn unsupported(swift: &str, reason: &str) -> WirekitError {
    WirekitError::Schema(SchemaError::InvalidType(format!(
        "cannot map Swift type \"{}\": {}",
        swift, reason
    )))
}

fn expect(tokens: &[Token], index: &mut usize, wanted: &str, swift: &str) -> Result<(), WirekitError> {
    match tokens.get(*index) {
        Some(tok) if tok.is(wanted) => {
            *index += 1;
            Ok(())
        }
        Some(tok) => Err(unsupported(swift, &format!("expected \"{}\" but found \"{}\"", wanted, tok.text))),
        None => Err(unsupported(swift, &format!("expected \"{}\"", wanted))),
    }
}

fn parse_type(tokens: &[Token], index: &mut usize, swift: &str) -> Result<TypeExpr, WirekitError> {
    let Some(tok) = tokens.get(*index) else {
        return Err(unsupported(swift, "unexpected end of type"));
    };

    let mut ty = if tok.is("[") {
        *index += 1;
        let element = parse_type(tokens, index, swift)?;
        if tokens.get(*index).is_some_and(|t| t.is(":")) {
            *index += 1;
            let value = parse_type(tokens, index, swift)?;
            expect(tokens, index, "]", swift)?;
            TypeExpr::map(element, value)
        } else {
            expect(tokens, index, "]", swift)?;
            TypeExpr::list(element)
        }
    } else if tok.is("(") {
        // Only a parenthesized single type; tuples and closures have no wire form.
        *index += 1;
        let inner = parse_type(tokens, index, swift)?;
        expect(tokens, index, ")", swift)?;
        if tokens.get(*index).is_some_and(|t| t.is("->")) {
            return Err(unsupported(swift, "function types are not supported"));
        }
        inner
    } else if tok.is_identifier() {
        *index += 1;
        let mut name = tok.text.clone();
        while tokens.get(*index).is_some_and(|t| t.is("."))
            && tokens.get(*index + 1).is_some_and(Token::is_identifier)
        {
            name.push('.');
            name.push_str(&tokens[*index + 1].text);
            *index += 2;
        }
        let name = name.strip_prefix("Swift.").map(str::to_string).unwrap_or(name);

        let mut arguments = Vec::new();
        if tokens.get(*index).is_some_and(|t| t.is("<")) {
            *index += 1;
            loop {
                arguments.push(parse_type(tokens, index, swift)?);
                if tokens.get(*index).is_some_and(|t| t.is(",")) {
                    *index += 1;
                } else {
                    break;
                }
            }
            expect(tokens, index, ">", swift)?;
        }
        named_type(name, arguments, swift)?
    } else {
        return Err(unsupported(swift, &format!("unexpected \"{}\"", tok.text)));
    };

    while tokens.get(*index).is_some_and(|t| t.is("?") || t.is("!") || t.is("??")) {
        *index += 1;
        ty = ty.optional();
    }
    Ok(ty)
}

fn named_type(name: String, mut arguments: Vec<TypeExpr>, swift: &str) -> Result<TypeExpr, WirekitError> {
    let ty = match (name.as_str(), arguments.len()) {
        ("Array", 1) => TypeExpr::list(arguments.remove(0)),
        ("Optional", 1) => arguments.remove(0).optional(),
        ("Dictionary", 2) => {
            let value = arguments.remove(1);
            TypeExpr::map(arguments.remove(0), value)
        }
        (_, 0) => primitive(&name).map(TypeExpr::Primitive).unwrap_or(TypeExpr::Custom(name)),
        _ => return Err(unsupported(swift, &format!("generic type \"{}\" is not supported", name))),
    };
    Ok(ty)
}

fn primitive(name: &str) -> Option<Primitive> {
    if name == "String" {
        Some(Primitive::String)
    } else if name == "Bool" {
        Some(Primitive::Bool)
    } else if INT_TYPES.contains(&name) {
        Some(Primitive::Int)
    } else if FLOAT_TYPES.contains(&name) {
        Some(Primitive::Float)
    } else if ANY_TYPES.contains(&name) {
        Some(Primitive::Any)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar(swift: &str) -> String {
        normalize(swift).unwrap().to_string()
    }

    #[test]
    fn test_normalize_swift_types() {
        assert_eq!(grammar("String"), "string");
        assert_eq!(grammar("Int64?"), "int?");
        assert_eq!(grammar("CGFloat"), "float");
        assert_eq!(grammar("[String]"), "list[string]");
        assert_eq!(grammar("[String: [Int]]?"), "map[string, list[int]]?");
        assert_eq!(grammar("Array<Bool>"), "list[bool]");
        assert_eq!(grammar("Dictionary<String, JSONValue>"), "map[string, any]");
        assert_eq!(grammar("Optional<Message>"), "Message?");
        assert_eq!(grammar("Swift.String!"), "string?");
        assert_eq!(grammar("Optional<Int>?"), "int?");
        assert_eq!(grammar("Int??"), "int?");
        assert_eq!(grammar("Provider.Model"), "Provider.Model");
    }

    #[test]
    fn test_unsupported_swift_types() {
        for swift in ["(Int, String)", "(Int) -> Void", "Set<String>", "Result<Int, Error>", "[String"] {
            assert!(normalize(swift).is_err(), "expected {:?} to be rejected", swift);
        }
    }

    #[test]
    fn test_materialize_is_inverse_of_normalize() {
        for text in [
            "string",
            "int?",
            "list[string]",
            "map[string, int]",
            "list[map[string, bool]]?",
            "float",
            "any",
            "Message",
        ] {
            let ty = TypeExpr::parse(text).unwrap();
            let swift = materialize(&ty);
            assert_eq!(normalize(&swift).unwrap(), ty, "via {}", swift);
        }
    }

    #[test]
    fn test_materialize_never_double_wraps() {
        let ty = TypeExpr::parse("list[int?]?").unwrap().optional();
        assert_eq!(materialize(&ty), "[Int?]?");
        assert!(!materialize(&ty).contains("??"));
    }
}
