use std::{fmt, str::FromStr};

use wirekit_schema::Schema;

use crate::{
    error::WirekitError,
    gen_swift::{generate_swift, GeneratedFile},
    verifier::verify_schema,
};

/// Languages the generator can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetLanguage {
    Swift,
}

impl TargetLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            TargetLanguage::Swift => "swift",
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            TargetLanguage::Swift => "swift",
        }
    }
}

impl FromStr for TargetLanguage {
    type Err = WirekitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "swift" => Ok(TargetLanguage::Swift),
            _ => Err(WirekitError::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateOptions {
    /// Prepended to every generated type name and file name.
    pub prefix: Option<String>,
}

/// Verify `schema` and render it as source files for `language`.
/// Returns `Err(WirekitError)` if the schema fails verification.
pub fn generate(
    schema: &Schema,
    language: TargetLanguage,
    options: &GenerateOptions,
) -> Result<Vec<GeneratedFile>, WirekitError> {
    verify_schema(schema)?;
    match language {
        TargetLanguage::Swift => generate_swift(schema, options),
    }
}
