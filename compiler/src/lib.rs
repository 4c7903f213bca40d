//! wirekit-compiler
//!
//! This crate implements:
//!  1) A tokenizer + parser for the subset of Swift that hand-written DTOs use,
//!  2) The extractor that lowers parsed declarations into a `Schema`,
//!  3) A schema verifier (names, types, tags, fallbacks, literal sugar),
//!  4) Code generation (`generate` → one Swift file per type),
//!  5) Error types (`WirekitError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod tokenizer;
pub mod parser;
pub mod swift_types;
pub mod patterns;
pub mod extractor;
pub mod verifier;
pub mod compiler;
pub mod gen_swift;

pub use compiler::{generate, GenerateOptions, TargetLanguage};
pub use error::WirekitError;
pub use extractor::{extract_source, parse_swift, Declaration, ExtractOptions, Extractor};
pub use gen_swift::GeneratedFile;
pub use verifier::verify_schema;
