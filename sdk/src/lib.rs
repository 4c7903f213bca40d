//! wirekit
//!
//! Directory-level entry points on top of `wirekit-compiler` and `wirekit-schema`:
//!
//! - `extract_directory`: walk a source tree and build one `Schema`
//! - `write_schema` / `read_schema`: the YAML document on disk
//! - `generate_to_directory`: render a schema and write one file per type

use std::{
    fs,
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub use wirekit_compiler::{
    error::WirekitError, generate, parse_swift, verify_schema, Declaration, ExtractOptions, Extractor,
    GenerateOptions, GeneratedFile, TargetLanguage,
};
pub use wirekit_schema::{document, Schema, Strictness, TypeDefinition, TypeExpr};

pub mod error {
    pub use wirekit_compiler::error::WirekitError;
    pub use wirekit_schema::SchemaError;
}

pub mod schema {
    pub use wirekit_schema::*;
}

/// Source files under `dir` with the configured extension, in path order.
/// Only a failure on `dir` itself is an error; unreadable entries below it
/// are logged and skipped.
fn source_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, WirekitError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => return Err(err.into()),
            Err(err) => {
                let path = err.path().unwrap_or(dir).display().to_string();
                warn!("Skipping {}: {}", path, err);
                continue;
            }
        };
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == extension) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Extract a schema from every source file under `dir`.
///
/// Files are read and parsed in parallel. A file that cannot be read or
/// parsed is logged and skipped; the remaining files still contribute.
/// Declarations are merged in path order, so the result does not depend on
/// scheduling.
pub fn extract_directory(dir: &Path, options: &ExtractOptions) -> Result<Schema, WirekitError> {
    let paths = source_files(dir, &options.extension)?;
    debug!("Found {} source files under {}", paths.len(), dir.display());

    let parsed: Vec<_> = paths
        .par_iter()
        .map(|path| {
            let result = fs::read_to_string(path)
                .map_err(WirekitError::from)
                .and_then(|text| parse_swift(&text));
            (path, result)
        })
        .collect();

    let mut extractor = Extractor::new(options);
    let mut skipped = 0;
    for (path, result) in parsed {
        match result {
            Ok(file) => extractor.add_file(file),
            Err(err) => {
                warn!("Skipping {}: {}", path.display(), err);
                skipped += 1;
            }
        }
    }

    let schema = extractor.finish()?;
    info!(
        "Extracted {} types from {} files ({} skipped)",
        schema.len(),
        paths.len() - skipped,
        skipped
    );
    Ok(schema)
}

pub fn write_schema(path: &Path, schema: &Schema) -> Result<(), WirekitError> {
    let text = document::emit(schema)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}

pub fn read_schema(path: &Path, strictness: Strictness) -> Result<Schema, WirekitError> {
    let text = fs::read_to_string(path)?;
    Ok(document::parse_with(&text, strictness)?)
}

/// Render `schema` for `language` and write the files into `dir`.
/// Returns the written paths in type-name order.
pub fn generate_to_directory(
    schema: &Schema,
    language: TargetLanguage,
    options: &GenerateOptions,
    dir: &Path,
) -> Result<Vec<PathBuf>, WirekitError> {
    let files = generate(schema, language, options)?;
    fs::create_dir_all(dir)?;

    let written = files
        .par_iter()
        .map(|file| -> Result<PathBuf, WirekitError> {
            let path = dir.join(&file.file_name);
            fs::write(&path, &file.content)?;
            Ok(path)
        })
        .collect::<Result<Vec<PathBuf>, WirekitError>>()?;

    info!("Generated {} {} files in {}", written.len(), language, dir.display());
    Ok(written)
}
