//! atlas-provider-sqlalchemy CLI - position-annotated DDL from SQLAlchemy models
//!
//! Loads every model file under the given paths and prints dialect DDL to
//! stdout for consumption by the Atlas migration engine. Diagnostics and
//! debug logging go to stderr; stdout carries only the provider output.

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use atlas_provider_sqlalchemy::{run, Dialect, ProviderError};

#[derive(Parser)]
#[command(name = "atlas-provider-sqlalchemy")]
#[command(version, about = "Load SQLAlchemy models and emit position-annotated DDL", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load models from one or more directories and print DDL
    Load {
        /// Target SQL dialect
        #[arg(long, value_enum, default_value_t = Dialect::Mysql)]
        dialect: Dialect,

        /// Path to a directory of SQLAlchemy models (repeatable; defaults
        /// to the current directory)
        #[arg(long = "path")]
        paths: Vec<PathBuf>,

        /// Skip model files that fail to load instead of aborting
        #[arg(long)]
        skip_errors: bool,

        /// Log per-file load failures and loader internals to stderr
        #[arg(long)]
        debug: bool,
    },
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            dialect,
            paths,
            skip_errors,
            debug,
        } => {
            init_tracing(debug);
            let paths = if paths.is_empty() {
                vec![PathBuf::from(".")]
            } else {
                paths
            };
            let mut stdout = io::stdout().lock();
            if let Err(err) = run(dialect, &paths, skip_errors, &mut stdout) {
                eprintln!("{}", err);
                if matches!(err, ProviderError::ModuleImport { .. }) {
                    eprintln!("hint: pass --skip-errors to skip files that fail to load");
                }
                process::exit(1);
            }
        }
    }
}
