//! Source-position directives and their reconciliation.
//!
//! A directive correlates one table with the file and line declaring it,
//! rendered as a `-- atlas:pos` comment consumed by the Atlas migration
//! engine. Directives are only emitted for tables the loaded catalog
//! actually knows; names the syntactic pass found in files that failed to
//! load (or in constructs that never registered) are dropped silently.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use tracing::debug;

use crate::error::Result;
use crate::parser;

/// Kind of schema object a directive points at. Tables only, today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Table,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Table => write!(f, "table"),
        }
    }
}

/// One position annotation: table name, absolute file path, 1-based line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub table: String,
    pub kind: DirectiveKind,
    pub path: PathBuf,
    pub line: u32,
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "-- atlas:pos {}[type={}] {}:{}",
            self.table,
            self.kind,
            self.path.display(),
            self.line
        )
    }
}

/// Cross-reference the syntactic pass against the catalog.
///
/// Files are processed in locator traversal order; within a file, names
/// follow the extractor's map order. With `skip_errors`, a file the
/// extractor cannot parse is logged and skipped, mirroring the loader's
/// tolerance for the same file; otherwise the parse failure propagates.
pub fn reconcile(
    files: &[PathBuf],
    catalog_names: &HashSet<String>,
    skip_errors: bool,
) -> Result<Vec<Directive>> {
    let mut directives = Vec::new();
    for path in files {
        let tables = match parser::extract_tables(path) {
            Ok(tables) => tables,
            Err(err) if skip_errors => {
                debug!("{}", err);
                continue;
            }
            Err(err) => return Err(err),
        };
        for (table, line) in tables {
            if !catalog_names.contains(&table) {
                continue;
            }
            directives.push(Directive {
                table,
                kind: DirectiveKind::Table,
                path: path.clone(),
                line,
            });
        }
    }
    Ok(directives)
}
