//! # atlas-provider-sqlalchemy
//!
//! Loads a project's SQLAlchemy models and prints dialect-specific DDL to
//! stdout, annotated with `-- atlas:pos` directives that map each table to
//! the source line declaring it. The output is consumed by the Atlas
//! migration engine as an external schema provider.
//!
//! ## Pipeline
//!
//! - **Locator**: walk each root directory for `*.py` files, skipping
//!   virtual-environment subtrees ([`locator`])
//! - **Loader**: execute each file in the embedded Python interpreter
//!   under a fresh module name and collect the `sqlalchemy.MetaData` the
//!   declarations registered into ([`loader`])
//! - **Extractor**: independently parse the same files with tree-sitter,
//!   without executing them, to recover declaration line numbers
//!   ([`parser`])
//! - **Reconciler**: keep position directives only for tables the catalog
//!   actually knows ([`directive`])
//! - **Emitter**: compile each catalog through SQLAlchemy's mock engine
//!   and print directives followed by `stmt;` blocks ([`ddl`])
//!
//! The whole run is single-threaded and synchronous; load isolation comes
//! from unique per-load module names, not locking.

pub mod ddl;
pub mod directive;
pub mod error;
mod interp;
pub mod loader;
pub mod locator;
pub mod parser;

pub use ddl::Dialect;
pub use directive::{Directive, DirectiveKind};
pub use error::{ProviderError, Result};
pub use loader::Catalog;
pub use locator::ExcludePolicy;

use std::io::Write;
use std::path::PathBuf;

/// One full discovery pass over `paths`, writing directives and DDL to `out`.
///
/// Each root yields at most one catalog; directives for every root are
/// written first, then each root's DDL in root order. Fails with
/// [`ProviderError::ModelsNotFound`] when no root registered any metadata.
pub fn run<W: Write>(
    dialect: Dialect,
    paths: &[PathBuf],
    skip_errors: bool,
    out: &mut W,
) -> Result<()> {
    let policy = ExcludePolicy::virtualenvs();
    let mut catalogs = Vec::new();
    let mut directives = Vec::new();
    for root in paths {
        let root = root.canonicalize()?;
        let files = locator::python_sources(&root, Some(&policy))?;
        let Some(catalog) = loader::load_root(&root, &files, skip_errors)? else {
            continue;
        };
        let names = catalog.table_names()?;
        directives.extend(directive::reconcile(&files, &names, skip_errors)?);
        catalogs.push(catalog);
    }
    if catalogs.is_empty() {
        return Err(ProviderError::ModelsNotFound);
    }
    ddl::write_ddl(dialect, &catalogs, &directives, out)
}
