use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{prelude::*, EnvFilter};

use wirekit::{
    extract_directory, generate_to_directory, read_schema, write_schema, ExtractOptions, GenerateOptions,
    Strictness, TargetLanguage,
};
use wirekit_compiler::error::WirekitError;

#[derive(Parser)]
#[command(name = "wirekit")]
#[command(about = "Extract wire schemas from Swift DTOs and generate Codable types from them", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Walk a directory of Swift sources and write the schema document
    Extract {
        /// Directory holding the hand-written `.swift` files
        #[arg(short, long)]
        input: PathBuf,

        /// Output schema file (YAML)
        #[arg(short, long)]
        output: PathBuf,

        /// Provider label stored in the schema
        #[arg(short, long, default_value = "")]
        provider: String,

        /// Name of the case that absorbs unknown wire values
        #[arg(long, default_value = wirekit::schema::DEFAULT_FALLBACK_CASE)]
        fallback_case: String,

        /// Fail on declarations that would otherwise be dropped with a warning
        #[arg(long)]
        strict: bool,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Generate source files from a schema document
    Generate {
        /// Input schema file (YAML)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory, one file per type
        #[arg(short, long)]
        output: PathBuf,

        /// Target language
        #[arg(short, long, default_value = "swift")]
        language: String,

        /// Prefix for every generated type name
        #[arg(long)]
        prefix: Option<String>,

        /// Fail on malformed schema entries instead of skipping them
        #[arg(long)]
        strict: bool,

        #[arg(short, long)]
        verbose: bool,
    },
}

impl Commands {
    fn verbose(&self) -> bool {
        match self {
            Commands::Extract { verbose, .. } | Commands::Generate { verbose, .. } => *verbose,
        }
    }
}

fn strictness(strict: bool) -> Strictness {
    if strict {
        Strictness::Strict
    } else {
        Strictness::Lenient
    }
}

/// Logs go to stderr. `RUST_LOG` wins over the `--verbose` default.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("wirekit={level},wirekit_compiler={level},wirekit_schema={level}"))
    });
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_filter(filter);

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        eprintln!("Warning: tracing subscriber already initialized");
    }
}

fn main() -> Result<(), WirekitError> {
    let cli = Cli::parse();
    init_tracing(cli.command.verbose());

    match &cli.command {
        Commands::Extract { input, output, provider, fallback_case, strict, .. } => {
            let options = ExtractOptions {
                provider: provider.clone(),
                fallback_case: fallback_case.clone(),
                strictness: strictness(*strict),
                ..Default::default()
            };
            let schema = extract_directory(input, &options)?;
            write_schema(output, &schema)?;
            println!("Extracted {} types → {}", schema.len(), output.display());
            Ok(())
        }

        Commands::Generate { input, output, language, prefix, strict, .. } => {
            let language: TargetLanguage = language.parse()?;
            let schema = read_schema(input, strictness(*strict))?;
            let options = GenerateOptions { prefix: prefix.clone() };
            let written = generate_to_directory(&schema, language, &options, output)?;
            println!("Generated {} files → {}", written.len(), output.display());
            Ok(())
        }
    }
}
