//! wirekit-schema
//!
//! The language-neutral half of wirekit:
//!  1) the schema model (`Schema`, `TypeDefinition` and friends),
//!  2) the canonical type grammar (`TypeExpr`),
//!  3) the YAML document format used between extraction and generation.
//!
//! ```
//! use wirekit_schema::*;
//!
//! let mut schema = Schema::new("openai");
//! let mut usage = StructDef::default();
//! usage.fields.insert("inputTokens".to_owned(), FieldDef::new("int").with_wire_name("input_tokens"));
//! schema.insert("Usage", TypeDefinition::Struct(usage));
//!
//! let text = document::emit(&schema).unwrap();
//! assert_eq!(document::parse(&text).unwrap(), schema);
//! ```

pub mod document;
pub mod error;
pub mod grammar;
pub mod model;

pub use document::Strictness;
pub use error::SchemaError;
pub use grammar::{Primitive, TypeExpr};
pub use model::*;
