use crate::{
    error::WirekitError,
    tokenizer::{Token, TokenKind},
    types::{
        AssociatedValue, Attribute, Decl, DeclKind, EnumCase, ExtensionDecl, FunctionDecl,
        Literal, Member, PropertyDecl, SourceFile, TypeAliasDecl, TypeDecl,
    },
    utils::{error, quote, unescape_swift_string},
};

const MODIFIERS: [&str; 20] = [
    "public", "private", "fileprivate", "internal", "open", "package", "final",
    "indirect", "static", "mutating", "nonmutating", "override", "required",
    "convenience", "lazy", "weak", "unowned", "dynamic", "nonisolated", "optional",
];

/// Tokens that begin a new member; expression skipping stops at them.
const DECL_KEYWORDS: [&str; 20] = [
    "var", "let", "func", "init", "deinit", "subscript", "case", "struct",
    "class", "actor", "enum", "protocol", "extension", "typealias", "static",
    "public", "private", "fileprivate", "internal", "open",
];

const TYPE_PREFIXES: [&str; 6] = ["some", "any", "inout", "borrowing", "consuming", "sending"];

/// Parses a token stream (as produced by `tokenize_source`) into the
/// declarations of one source file.
pub fn parse_source(tokens: &[Token]) -> Result<SourceFile, WirekitError> {
    if tokens.is_empty() {
        return Ok(SourceFile::default());
    }
    let mut parser = Parser { tokens, index: 0 };
    parser.parse_file()
}

#[derive(Default)]
struct Prefix {
    docs:       Vec<String>,
    attributes: Vec<Attribute>,
    is_static:  bool,
}

struct Parser<'a> {
    tokens: &'a [Token],
    index:  usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &'a Token {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> &'a Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + offset).min(last)]
    }

    fn previous(&self) -> Option<&'a Token> {
        self.index.checked_sub(1).map(|i| &self.tokens[i])
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) -> &'a Token {
        let tok = self.current();
        if !self.at_eof() {
            self.index += 1;
        }
        tok
    }

    fn eat(&mut self, text: &str) -> bool {
        if self.current().is(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, text: &str) -> Result<(), WirekitError> {
        if !self.eat(text) {
            let tok = self.current();
            return Err(error(
                &format!("Expected {} but found {}", quote(text), quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        Ok(())
    }

    fn expect_identifier(&mut self) -> Result<&'a Token, WirekitError> {
        let tok = self.current();
        if !tok.is_identifier() {
            return Err(error(
                &format!("Expected identifier but found {}", quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }
        Ok(self.advance())
    }

    fn unexpected_token(&self) -> WirekitError {
        let tok = self.current();
        error(
            &format!("Unexpected token {}", quote(&tok.text)),
            tok.line,
            tok.column,
        )
    }

    fn is_decl_start(&self) -> bool {
        let tok = self.current();
        if tok.kind == TokenKind::DocComment || tok.is("@") {
            return true;
        }
        tok.is_identifier()
            && DECL_KEYWORDS.contains(&tok.text.as_str())
            && !self.previous().is_some_and(|p| p.is("."))
    }

    fn parse_file(&mut self) -> Result<SourceFile, WirekitError> {
        let mut decls = Vec::new();
        while !self.at_eof() {
            let prefix = self.parse_prefix()?;
            if self.at_eof() {
                break;
            }
            let tok = self.current();
            if !tok.is_identifier() {
                self.advance();
                continue;
            }
            match tok.text.as_str() {
                "struct" | "class" | "actor" | "enum" | "protocol" => {
                    decls.push(Decl::Type(self.parse_type_decl(prefix)?));
                }
                "extension" => decls.push(Decl::Extension(self.parse_extension()?)),
                "typealias" => decls.push(Decl::TypeAlias(self.parse_typealias(prefix)?)),
                "import" => {
                    self.advance();
                    self.expect_identifier()?;
                    while self.current().is(".") && self.peek(1).is_identifier() {
                        self.advance();
                        self.advance();
                    }
                }
                // Free functions and globals are parsed only to be skipped.
                "func" | "init" => {
                    self.parse_function(prefix.is_static)?;
                }
                "var" | "let" => {
                    self.parse_property_decl(prefix)?;
                }
                _ => {
                    self.advance();
                }
            }
        }
        Ok(SourceFile { decls })
    }

    /// Doc comments, attributes and modifiers that precede a declaration.
    fn parse_prefix(&mut self) -> Result<Prefix, WirekitError> {
        let mut prefix = Prefix::default();
        loop {
            let tok = self.current();
            if tok.kind == TokenKind::DocComment {
                prefix.docs.push(tok.text.clone());
                self.advance();
            } else if tok.is("@") && self.peek(1).is_identifier() {
                self.advance();
                let name = self.advance().text.clone();
                let arguments = if self.current().is("(") {
                    self.skip_balanced("(", ")")?
                        .into_iter()
                        .map(|t| t.text)
                        .collect()
                } else {
                    Vec::new()
                };
                prefix.attributes.push(Attribute { name, arguments });
            } else if tok.is_identifier() && MODIFIERS.contains(&tok.text.as_str()) {
                if tok.text == "static" {
                    prefix.is_static = true;
                }
                self.advance();
                // `private(set)`
                if self.current().is("(") && self.peek(1).is_identifier() && self.peek(2).is(")") {
                    self.advance();
                    self.advance();
                    self.advance();
                }
            } else if tok.is("class")
                && ["func", "var", "let", "subscript"].contains(&self.peek(1).text.as_str())
            {
                prefix.is_static = true;
                self.advance();
            } else {
                return Ok(prefix);
            }
        }
    }

    fn parse_type_decl(&mut self, prefix: Prefix) -> Result<TypeDecl, WirekitError> {
        let keyword = self.advance();
        let kind = match keyword.text.as_str() {
            "struct"   => DeclKind::Struct,
            "class"    => DeclKind::Class,
            "actor"    => DeclKind::Actor,
            "enum"     => DeclKind::Enum,
            "protocol" => DeclKind::Protocol,
            _ => return Err(self.unexpected_token()),
        };
        let name_tok = self.expect_identifier()?;

        let is_generic = if self.current().is("<") {
            self.skip_balanced("<", ">")?;
            true
        } else {
            false
        };

        let inherited = if self.eat(":") {
            self.parse_inheritance()?
        } else {
            Vec::new()
        };
        self.skip_where_clause();

        self.expect("{")?;
        let members = self.parse_members()?;

        Ok(TypeDecl {
            kind,
            name:       name_tok.text.clone(),
            line:       name_tok.line,
            column:     name_tok.column,
            docs:       prefix.docs,
            attributes: prefix.attributes,
            is_generic,
            inherited,
            members,
        })
    }

    fn parse_extension(&mut self) -> Result<ExtensionDecl, WirekitError> {
        self.expect("extension")?;
        let name_tok = self.expect_identifier()?;
        let mut name = name_tok.text.clone();
        while self.current().is(".") && self.peek(1).is_identifier() {
            self.advance();
            name.push('.');
            name.push_str(&self.advance().text);
        }
        let inherited = if self.eat(":") {
            self.parse_inheritance()?
        } else {
            Vec::new()
        };
        self.skip_where_clause();
        self.expect("{")?;
        let members = self.parse_members()?;
        Ok(ExtensionDecl {
            name,
            line:   name_tok.line,
            column: name_tok.column,
            inherited,
            members,
        })
    }

    fn parse_typealias(&mut self, prefix: Prefix) -> Result<TypeAliasDecl, WirekitError> {
        self.expect("typealias")?;
        let name_tok = self.expect_identifier()?;
        let is_generic = if self.current().is("<") {
            self.skip_balanced("<", ">")?;
            true
        } else {
            false
        };
        self.expect("=")?;
        let target = self.scan_type_text()?;
        Ok(TypeAliasDecl {
            name:       name_tok.text.clone(),
            line:       name_tok.line,
            column:     name_tok.column,
            docs:       prefix.docs,
            attributes: prefix.attributes,
            is_generic,
            target,
        })
    }

    fn parse_inheritance(&mut self) -> Result<Vec<String>, WirekitError> {
        let mut inherited = Vec::new();
        loop {
            inherited.push(self.scan_type_text()?);
            if !self.eat(",") {
                return Ok(inherited);
            }
        }
    }

    fn skip_where_clause(&mut self) {
        if self.current().is("where") {
            while !self.at_eof() && !self.current().is("{") {
                self.advance();
            }
        }
    }

    /// Members up to and including the closing brace.
    fn parse_members(&mut self) -> Result<Vec<Member>, WirekitError> {
        let mut members = Vec::new();
        loop {
            let prefix = self.parse_prefix()?;
            if self.eat("}") {
                return Ok(members);
            }
            if self.at_eof() {
                return Err(self.unexpected_token());
            }
            let tok = self.current();
            if !tok.is_identifier() {
                self.advance();
                continue;
            }
            match tok.text.as_str() {
                "case" => members.push(Member::Cases(self.parse_case_decl(prefix)?)),
                "var" | "let" => {
                    members.extend(self.parse_property_decl(prefix)?.into_iter().map(Member::Property));
                }
                "func" | "init" => members.push(Member::Function(self.parse_function(prefix.is_static)?)),
                "deinit" | "subscript" => {
                    self.parse_function(prefix.is_static)?;
                }
                "struct" | "class" | "actor" | "enum" | "protocol" => {
                    members.push(Member::Type(self.parse_type_decl(prefix)?));
                }
                "typealias" => members.push(Member::TypeAlias(self.parse_typealias(prefix)?)),
                "extension" => {
                    self.parse_extension()?;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn parse_case_decl(&mut self, prefix: Prefix) -> Result<Vec<EnumCase>, WirekitError> {
        self.expect("case")?;
        let mut cases = Vec::new();
        loop {
            let name_tok = self.expect_identifier()?;
            let associated = if self.current().is("(") {
                self.parse_associated_values()?
            } else {
                Vec::new()
            };
            let raw_value = if self.eat("=") {
                Some(self.parse_literal())
            } else {
                None
            };
            cases.push(EnumCase {
                name: name_tok.text.clone(),
                line: name_tok.line,
                column: name_tok.column,
                docs: prefix.docs.clone(),
                raw_value,
                associated,
            });
            if !self.eat(",") {
                return Ok(cases);
            }
        }
    }

    fn parse_associated_values(&mut self) -> Result<Vec<AssociatedValue>, WirekitError> {
        self.expect("(")?;
        let mut values = Vec::new();
        if self.eat(")") {
            return Ok(values);
        }
        loop {
            let label = if self.current().is_identifier() && self.peek(1).is(":") {
                let label = self.advance().text.clone();
                self.advance();
                Some(label)
            } else if self.current().is_identifier()
                && self.peek(1).is_identifier()
                && self.peek(2).is(":")
            {
                let external = self.advance().text.clone();
                self.advance();
                self.advance();
                Some(external)
            } else {
                None
            }
            .filter(|label| label != "_");

            let type_text = self.scan_type_text()?;
            if self.eat("=") {
                self.skip_expression();
            }
            values.push(AssociatedValue { label, type_text });
            if !self.eat(",") {
                self.expect(")")?;
                return Ok(values);
            }
        }
    }

    fn parse_literal(&mut self) -> Literal {
        let tok = self.current();
        if tok.is_string() {
            self.advance();
            return Literal::String(unescape_swift_string(&tok.text));
        }
        if tok.is("-") && self.peek(1).kind == TokenKind::Number {
            self.advance();
            let number = self.advance();
            return Literal::Number(format!("-{}", number.text));
        }
        if tok.kind == TokenKind::Number {
            self.advance();
            return Literal::Number(tok.text.clone());
        }
        self.advance();
        Literal::Other(tok.text.clone())
    }

    fn parse_property_decl(&mut self, prefix: Prefix) -> Result<Vec<PropertyDecl>, WirekitError> {
        let is_let = self.advance().text == "let";
        let mut properties = Vec::new();
        loop {
            // Tuple patterns never describe wire fields.
            if self.current().is("(") {
                self.skip_balanced("(", ")")?;
                if self.eat(":") {
                    self.scan_type_text()?;
                }
                if self.eat("=") {
                    self.skip_expression();
                }
            } else {
                let name_tok = self.expect_identifier()?;
                let type_text = if self.eat(":") {
                    Some(self.scan_type_text()?)
                } else {
                    None
                };
                let has_initializer = if self.eat("=") {
                    self.skip_expression();
                    true
                } else {
                    false
                };
                let mut is_computed = false;
                if self.current().is("{") {
                    let observer = matches!(self.peek(1).text.as_str(), "willSet" | "didSet");
                    is_computed = !observer;
                    self.skip_balanced("{", "}")?;
                }
                properties.push(PropertyDecl {
                    name: name_tok.text.clone(),
                    line: name_tok.line,
                    column: name_tok.column,
                    docs: prefix.docs.clone(),
                    type_text,
                    is_static: prefix.is_static,
                    is_computed,
                    is_let,
                    has_initializer,
                });
            }
            if !self.eat(",") {
                return Ok(properties);
            }
        }
    }

    /// Parses `func`, `init`, `deinit` and `subscript` declarations. The body
    /// is captured as raw tokens.
    fn parse_function(&mut self, is_static: bool) -> Result<FunctionDecl, WirekitError> {
        let keyword = self.advance();
        let name = match keyword.text.as_str() {
            "func" => self.advance().text.clone(),
            other => other.to_string(),
        };
        if name == "init" && (self.current().is("?") || self.current().is("!")) {
            self.advance();
        }
        if self.current().is("<") {
            self.skip_balanced("<", ">")?;
        }

        let mut first_label = None;
        if self.current().is("(") {
            let candidate = self.peek(1);
            if candidate.is_identifier() && (self.peek(2).is(":") || self.peek(2).is_identifier()) {
                first_label = Some(candidate.text.clone());
            }
            self.skip_balanced("(", ")")?;
        }

        // Effects, return type and where clause run up to the body.
        let mut body = Vec::new();
        loop {
            let tok = self.current();
            if tok.is("{") {
                body = self.skip_balanced("{", "}")?;
                break;
            }
            if self.at_eof() || tok.is("}") || (tok.is_identifier() && self.is_decl_start()) {
                break;
            }
            if tok.is("(") {
                self.skip_balanced("(", ")")?;
            } else if tok.is("[") {
                self.skip_balanced("[", "]")?;
            } else {
                self.advance();
            }
        }

        Ok(FunctionDecl {
            name,
            line: keyword.line,
            column: keyword.column,
            is_static,
            first_label,
            body,
        })
    }

    /// Skips an initializer or default-value expression.
    fn skip_expression(&mut self) {
        loop {
            let tok = self.current();
            if self.at_eof()
                || tok.is("}")
                || tok.is(")")
                || tok.is("]")
                || tok.is(",")
                || tok.is(";")
                || self.is_decl_start()
            {
                return;
            }
            let skipped = match tok.text.as_str() {
                "{" if tok.kind == TokenKind::Punctuation => self.skip_balanced("{", "}"),
                "(" if tok.kind == TokenKind::Punctuation => self.skip_balanced("(", ")"),
                "[" if tok.kind == TokenKind::Punctuation => self.skip_balanced("[", "]"),
                _ => {
                    self.advance();
                    Ok(Vec::new())
                }
            };
            if skipped.is_err() {
                return;
            }
        }
    }

    /// Consumes a type and returns its text in normalized spacing, e.g.
    /// `[String: Int]?`.
    fn scan_type_text(&mut self) -> Result<String, WirekitError> {
        let start = self.index;
        self.skip_type()?;
        Ok(join_type_tokens(&self.tokens[start..self.index]))
    }

    fn skip_type(&mut self) -> Result<(), WirekitError> {
        loop {
            let tok = self.current();
            if tok.is("@") && self.peek(1).is_identifier() {
                self.advance();
                self.advance();
            } else if tok.is_identifier()
                && TYPE_PREFIXES.contains(&tok.text.as_str())
                && (self.peek(1).is_identifier() || self.peek(1).is("[") || self.peek(1).is("("))
            {
                self.advance();
            } else {
                break;
            }
        }

        let tok = self.current();
        if tok.is("[") {
            self.skip_balanced("[", "]")?;
        } else if tok.is("(") {
            self.skip_balanced("(", ")")?;
        } else if tok.is_identifier() {
            self.advance();
            if self.current().is("<") {
                self.skip_balanced("<", ">")?;
            }
            while self.current().is(".") && self.peek(1).is_identifier() {
                self.advance();
                self.advance();
                if self.current().is("<") {
                    self.skip_balanced("<", ">")?;
                }
            }
        } else {
            return Err(error(
                &format!("Expected a type but found {}", quote(&tok.text)),
                tok.line,
                tok.column,
            ));
        }

        while self.current().is("?") || self.current().is("!") || self.current().is("...") {
            self.advance();
        }

        while matches!(self.current().text.as_str(), "async" | "throws") && self.current().is_identifier() {
            self.advance();
        }
        if self.eat("->") || self.eat("&") {
            self.skip_type()?;
        }
        Ok(())
    }

    /// Skips a balanced group starting at `open` and returns the tokens
    /// strictly inside it.
    fn skip_balanced(&mut self, open: &str, close: &str) -> Result<Vec<Token>, WirekitError> {
        self.expect(open)?;
        let start = self.index;
        let mut depth = 1;
        loop {
            if self.at_eof() {
                let tok = self.current();
                return Err(error(
                    &format!("Unbalanced {}: reached end of file", quote(open)),
                    tok.line,
                    tok.column,
                ));
            }
            let tok = self.current();
            if tok.is(open) {
                depth += 1;
            } else if tok.is(close) {
                depth -= 1;
                if depth == 0 {
                    let inner = self.tokens[start..self.index].to_vec();
                    self.advance();
                    return Ok(inner);
                }
            }
            self.advance();
        }
    }
}

fn join_type_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut previous: Option<&Token> = None;
    for tok in tokens {
        if let Some(prev) = previous {
            if prev.is(":") || prev.is(",") || (prev.is_identifier() && tok.is_identifier()) {
                out.push(' ');
            }
        }
        if tok.is("->") || tok.is("&") {
            out.push_str(&format!(" {} ", tok.text));
        } else {
            out.push_str(&tok.text);
        }
        previous = Some(tok);
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize_source;

    fn parse(text: &str) -> SourceFile {
        let tokens = tokenize_source(text).expect("tokenize_source failed");
        parse_source(&tokens).expect("parse_source failed")
    }

    fn only_type(file: &SourceFile) -> &TypeDecl {
        match &file.decls[..] {
            [Decl::Type(decl)] => decl,
            other => panic!("expected a single type, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_struct() {
        let file = parse(
            r#"
            import Foundation

            /// Token usage.
            public struct Usage: Decodable, Sendable {
                /// Prompt tokens.
                public let inputTokens: Int
                public var cache: [String: [Int]]? = nil
                static let zero = Usage(inputTokens: 0)
                var total: Int { inputTokens }
                private(set) var note: String? {
                    didSet { print(note ?? "") }
                }

                private enum CodingKeys: String, CodingKey {
                    case inputTokens = "input_tokens"
                    case cache, note
                }
            }
            "#,
        );
        let decl = only_type(&file);
        assert_eq!(decl.kind, DeclKind::Struct);
        assert_eq!(decl.name, "Usage");
        assert_eq!(decl.docs, vec!["Token usage."]);
        assert_eq!(decl.inherited, vec!["Decodable", "Sendable"]);

        let props: Vec<_> = decl.properties().collect();
        assert_eq!(props.len(), 5);
        assert_eq!(props[0].name, "inputTokens");
        assert_eq!(props[0].type_text.as_deref(), Some("Int"));
        assert_eq!(props[0].docs, vec!["Prompt tokens."]);
        assert_eq!(props[1].type_text.as_deref(), Some("[String: [Int]]?"));
        assert!(props[1].has_initializer);
        assert!(props[2].is_static);
        assert!(props[3].is_computed);
        assert!(!props[4].is_computed);

        let keys = decl.nested("CodingKeys").expect("CodingKeys");
        let cases: Vec<_> = keys.cases().map(|c| (c.name.as_str(), c.raw_value.clone())).collect();
        assert_eq!(
            cases,
            vec![
                ("inputTokens", Some(Literal::String("input_tokens".into()))),
                ("cache", None),
                ("note", None),
            ]
        );
    }

    #[test]
    fn test_parse_enum_with_payloads_and_bodies() {
        let file = parse(
            r#"
            enum Block: Codable {
                case text(TextPayload)
                case image(source: ImageSource, altText: String? = nil)
                indirect case nested([Block])
                case futureProof

                init(from decoder: Decoder) throws {
                    let container = try decoder.container(keyedBy: CodingKeys.self)
                    switch try container.decode(String.self, forKey: .type) {
                    case "text": self = .text(try TextPayload(from: decoder))
                    default: self = .futureProof
                    }
                }

                func encode(to encoder: Encoder) throws {}
            }
            "#,
        );
        let decl = only_type(&file);
        let cases: Vec<_> = decl.cases().collect();
        assert_eq!(cases.len(), 4);
        assert_eq!(cases[0].associated, vec![AssociatedValue { label: None, type_text: "TextPayload".into() }]);
        assert_eq!(cases[1].associated[1].label.as_deref(), Some("altText"));
        assert_eq!(cases[1].associated[1].type_text, "String?");
        assert_eq!(cases[2].associated[0].type_text, "[Block]");

        let functions: Vec<_> = decl.functions().collect();
        assert!(functions[0].is_init_labeled("from"));
        assert!(functions[0].body.iter().any(|t| t.text == "switch"));
        assert!(functions[1].is_named("encode", "to"));
        assert!(functions[1].body.is_empty());
    }

    #[test]
    fn test_parse_extension_and_typealias() {
        let file = parse(
            r#"
            @available(*, deprecated, message: "Use Usage")
            public typealias LegacyUsage = Usage
            typealias Pairs = [String: Int]
            extension Content: ExpressibleByStringLiteral {
                public init(stringLiteral value: String) { self = .text(value) }
            }
            "#,
        );
        assert_eq!(file.decls.len(), 3);
        let Decl::TypeAlias(alias) = &file.decls[0] else { panic!("expected typealias") };
        assert_eq!(alias.target, "Usage");
        assert_eq!(alias.attributes[0].name, "available");
        assert!(alias.attributes[0].arguments.contains(&"deprecated".to_string()));
        let Decl::TypeAlias(pairs) = &file.decls[1] else { panic!("expected typealias") };
        assert_eq!(pairs.target, "[String: Int]");
        let Decl::Extension(ext) = &file.decls[2] else { panic!("expected extension") };
        assert_eq!(ext.inherited, vec!["ExpressibleByStringLiteral"]);
        assert!(ext.functions().next().unwrap().is_init_labeled("stringLiteral"));
    }

    #[test]
    fn test_parse_generic_and_function_types() {
        let file = parse(
            r#"
            struct Page<Item: Decodable>: Decodable {
                let items: [Item]
                let onTap: (Int) -> Void
                let lookup: Dictionary<String, Array<Int>>
            }
            "#,
        );
        let decl = only_type(&file);
        assert!(decl.is_generic);
        let types: Vec<_> = decl.properties().map(|p| p.type_text.clone().unwrap()).collect();
        assert_eq!(types, vec!["[Item]", "(Int) -> Void", "Dictionary<String, Array<Int>>"]);
    }

    #[test]
    fn test_unbalanced_braces_are_an_error() {
        let tokens = tokenize_source("struct A { let x: Int").unwrap();
        let err = parse_source(&tokens).unwrap_err();
        assert!(matches!(err, WirekitError::ParseError { .. }), "got {:?}", err);
    }
}
