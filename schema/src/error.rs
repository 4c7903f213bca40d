use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Malformed schema document: {0}")]
    MalformedDocument(String),

    #[error("Missing required field \"{field}\" in type \"{type_name}\"")]
    MissingField {
        field:     String,
        type_name: String,
    },

    #[error("Unknown kind \"{kind}\" for type \"{type_name}\"")]
    UnknownKind {
        kind:      String,
        type_name: String,
    },

    #[error("Invalid entry \"{entry}\" in type \"{type_name}\": {reason}")]
    InvalidEntry {
        type_name: String,
        entry:     String,
        reason:    String,
    },

    #[error("Invalid type expression: {0}")]
    InvalidType(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
