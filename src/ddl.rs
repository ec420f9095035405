//! DDL emission through SQLAlchemy's mock engine.
//!
//! The schema-to-SQL compilation is owned entirely by SQLAlchemy: we hand
//! `MetaData.create_all` a mock engine whose executor captures each clause
//! element, then compile the captured elements against the engine's
//! dialect. Statement order is whatever the collaborator chose (it sorts
//! by foreign-key dependency) and is never re-ordered here.
//!
//! The output format is a compatibility surface consumed by Atlas and must
//! stay bit-exact: directives one per line followed by a blank line, then
//! each statement with tabs and newlines deleted, terminated by `;` and a
//! blank line.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use clap::ValueEnum;
use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyTuple};

use crate::directive::Directive;
use crate::error::{ProviderError, Result};
use crate::loader::Catalog;

/// Supported target dialects. `clickhouse` additionally requires the
/// clickhouse-sqlalchemy Python package at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Dialect {
    Mysql,
    Mariadb,
    Postgresql,
    Sqlite,
    Mssql,
    Clickhouse,
}

impl Dialect {
    /// Driver name used to build the mock-engine URL.
    pub fn driver(&self) -> &'static str {
        match self {
            Dialect::Mysql => "mysql",
            Dialect::Mariadb => "mariadb",
            Dialect::Postgresql => "postgresql",
            Dialect::Sqlite => "sqlite",
            Dialect::Mssql => "mssql",
            Dialect::Clickhouse => "clickhouse",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.driver())
    }
}

/// Write directives and per-catalog DDL to `out` in the fixed format.
pub fn write_ddl<W: Write>(
    dialect: Dialect,
    catalogs: &[Catalog],
    directives: &[Directive],
    out: &mut W,
) -> Result<()> {
    if !directives.is_empty() {
        for directive in directives {
            writeln!(out, "{}", directive)?;
        }
        writeln!(out)?;
    }
    for catalog in catalogs {
        for statement in compile_statements(dialect, catalog)? {
            write!(out, "{};\n\n", statement)?;
        }
    }
    Ok(())
}

/// Run `create_all` against a mock engine and compile what it emitted.
///
/// An unsupported dialect or a compilation failure propagates from
/// SQLAlchemy untranslated; there is no retry.
fn compile_statements(dialect: Dialect, catalog: &Catalog) -> Result<Vec<String>> {
    Python::with_gil(|py| {
        let sqlalchemy = py.import("sqlalchemy").map_err(|err| {
            ProviderError::Python(format!("failed to import sqlalchemy: {}", err))
        })?;

        let captured: Arc<Mutex<Vec<PyObject>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&captured);
        let executor = PyCFunction::new_closure(
            py,
            None,
            None,
            move |args: &PyTuple, _kwargs: Option<&PyDict>| -> PyResult<()> {
                let sql = args.get_item(0)?;
                sink.lock()
                    .map_err(|_| PyRuntimeError::new_err("ddl sink poisoned"))?
                    .push(sql.to_object(args.py()));
                Ok(())
            },
        )?;

        let url = format!("{}://", dialect.driver());
        let engine = sqlalchemy.call_method1("create_mock_engine", (url, executor))?;
        let create_kwargs = PyDict::new(py);
        create_kwargs.set_item("checkfirst", false)?;
        catalog
            .bind(py)
            .call_method("create_all", (engine,), Some(create_kwargs))?;

        let compile_kwargs = PyDict::new(py);
        compile_kwargs.set_item("dialect", engine.getattr("dialect")?)?;
        let captured = captured
            .lock()
            .map_err(|_| ProviderError::Python("ddl sink poisoned".to_string()))?;
        let mut statements = Vec::with_capacity(captured.len());
        for sql in captured.iter() {
            let compiled = sql
                .as_ref(py)
                .call_method("compile", (), Some(compile_kwargs))?;
            statements.push(normalize_statement(&compiled.str()?.to_string_lossy()));
        }
        Ok(statements)
    })
}

/// Delete horizontal tabs and newlines from a compiled statement so each
/// DDL block occupies a single line.
fn normalize_statement(text: &str) -> String {
    text.chars().filter(|c| *c != '\t' && *c != '\n').collect()
}
