//! Tokenizer for the subset of Swift that DTO sources are written in.
//!
//! Whitespace and ordinary comments are dropped; `///` and `/** */` doc
//! comments are kept so the parser can attach them to declarations.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::WirekitError;
use crate::utils::{error, quote};

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r#"(///[^\n]*"#,
        r#"|/\*\*(?s:.*?)\*/"#,
        r#"|//[^\n]*"#,
        r#"|/\*(?s:.*?)\*/"#,
        r#"|"""(?s:.*?)""""#,
        r#"|"(?:[^"\\\n]|\\.)*""#,
        r#"|`[A-Za-z_][A-Za-z0-9_]*`"#,
        r#"|[A-Za-z_][A-Za-z0-9_]*"#,
        r#"|0[xX][0-9a-fA-F_]+|\d[\d_]*(?:\.\d[\d_]*)?(?:[eE][+-]?\d+)?"#,
        r#"|->|\.\.\.|\.\.<|==|!=|<=|>=|&&|\|\||\?\?"#,
        r#"|[{}()\[\]<>:;,.?!=@#&|+\-*/%^~\\$']"#,
        r#"|\s+)"#,
    ))
    .unwrap();
    pub static ref WHITESPACE_RX: Regex = Regex::new(r"^\s+$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Identifier,
    StringLiteral,
    Number,
    Punctuation,
    DocComment,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind:   TokenKind,
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

impl Token {
    pub fn is(&self, text: &str) -> bool {
        self.kind != TokenKind::StringLiteral && self.kind != TokenKind::DocComment && self.text == text
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Identifier
    }

    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::StringLiteral
    }
}

pub fn tokenize_source(text: &str) -> Result<Vec<Token>, WirekitError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        let start = mat.start();
        let end   = mat.end();
        let part  = mat.as_str();

        if start > last_end {
            let unexpected = &text[last_end..start];
            return Err(error(
                &format!("Syntax error: {}", quote(unexpected)),
                line,
                column,
            ));
        }

        if let Some(kind) = classify(part) {
            let text = match kind {
                TokenKind::DocComment => doc_text(part),
                TokenKind::Identifier => part.trim_matches('`').to_string(),
                _ => part.to_string(),
            };
            tokens.push(Token { kind, text, line, column });
        }

        // Update line/column
        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }

        last_end = end;
    }

    if last_end != text.len() {
        let unexpected = &text[last_end..];
        return Err(error(
            &format!("Syntax error: {}", quote(unexpected)),
            line,
            column,
        ));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        column,
    });
    Ok(tokens)
}

/// `None` for trivia that never reaches the parser.
fn classify(part: &str) -> Option<TokenKind> {
    if WHITESPACE_RX.is_match(part) {
        return None;
    }
    if part.starts_with("///") || (part.starts_with("/**") && part.len() > 4) {
        return Some(TokenKind::DocComment);
    }
    if part.starts_with("//") || part.starts_with("/*") {
        return None;
    }
    let first = part.chars().next()?;
    Some(if first == '"' {
        TokenKind::StringLiteral
    } else if first == '`' || first.is_ascii_alphabetic() || first == '_' {
        TokenKind::Identifier
    } else if first.is_ascii_digit() {
        TokenKind::Number
    } else {
        TokenKind::Punctuation
    })
}

fn doc_text(part: &str) -> String {
    if let Some(line) = part.strip_prefix("///") {
        return line.strip_prefix(' ').unwrap_or(line).trim_end().to_string();
    }
    let body = part
        .trim_start_matches("/**")
        .trim_end_matches("*/");
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let input = "let x: Int?";
        let expected = vec![
            Token { kind: TokenKind::Identifier,  text: "let".into(), line: 1, column: 1 },
            Token { kind: TokenKind::Identifier,  text: "x".into(),   line: 1, column: 5 },
            Token { kind: TokenKind::Punctuation, text: ":".into(),   line: 1, column: 6 },
            Token { kind: TokenKind::Identifier,  text: "Int".into(), line: 1, column: 8 },
            Token { kind: TokenKind::Punctuation, text: "?".into(),   line: 1, column: 11 },
            Token { kind: TokenKind::Eof,         text: "".into(),    line: 1, column: 12 },
        ];
        assert_eq!(tokenize_source(input).unwrap(), expected);
    }

    #[test]
    fn test_tokenize_comments() {
        let input = "// plain\n/// Documented.\n/* block */ struct A {}";
        let tokens = tokenize_source(input).unwrap();
        assert_eq!(texts(&tokens), vec!["Documented.", "struct", "A", "{", "}", ""]);
        assert_eq!(tokens[0].kind, TokenKind::DocComment);
        assert_eq!(tokens[1].line, 3);
    }

    #[test]
    fn test_tokenize_strings_and_backticks() {
        let input = r#"case `default` = "a \"quoted\" value""#;
        let tokens = tokenize_source(input).unwrap();
        assert_eq!(tokens[1].text, "default");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[3].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[3].text, r#""a \"quoted\" value""#);
    }

    #[test]
    fn test_tokenize_operators() {
        let tokens = tokenize_source("func f() -> [String: Int] { x ?? y }").unwrap();
        assert!(texts(&tokens).contains(&"->"));
        assert!(texts(&tokens).contains(&"??"));
    }

    #[test]
    fn test_tokenize_unexpected_text() {
        let err = tokenize_source("let x = \"unterminated").unwrap_err();
        assert!(
            matches!(err, WirekitError::ParseError { .. }),
            "expected a ParseError but got {:?}",
            err
        );
    }
}
