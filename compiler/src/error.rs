use thiserror::Error;
use wirekit_schema::SchemaError;

#[derive(Debug, Error)]
pub enum WirekitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Parse error at line {line}, column {column}: {msg}")]
    ParseError {
        msg:    String,
        line:   usize,
        column: usize,
    },

    #[error("Unsupported target language \"{0}\"")]
    UnsupportedLanguage(String),

    #[error("Verifier error: {0}")]
    VerifierError(String),

    #[error("The type \"{0}\" is declared more than once")]
    DuplicateType(String),

    #[error("Could not extract \"{name}\": {reason}")]
    DroppedDeclaration {
        name:   String,
        reason: String,
    },

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}
