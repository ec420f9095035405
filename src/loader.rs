//! Dynamic schema loader.
//!
//! Executes each candidate model file inside the embedded Python
//! interpreter under a freshly minted module name, then scans the module's
//! top-level bindings for anything exposing a `sqlalchemy.MetaData`-valued
//! `metadata` attribute. All files of one root share one interpreter, so
//! string-based relationship targets on a shared declarative base resolve
//! once the whole root has been loaded.
//!
//! # Isolation
//!
//! SQLAlchemy registration happens as a side effect of module execution,
//! so a stale module cache would silently resurrect tables from content
//! that is no longer on disk (e.g. after a git branch switch). Every load
//! therefore uses a unique module name derived from the file path, its
//! modification time, and a process-wide counter, and evicts any
//! previously loaded module under the same path prefix first.

use std::collections::HashSet;
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;

use pyo3::exceptions::PyIOError;
use pyo3::prelude::*;
use pyo3::types::PyModule;
use tracing::debug;

use crate::error::{ProviderError, Result};
use crate::interp;

/// Monotonic counter folded into every synthetic module name, so two
/// loads of one path are never confused even within one mtime tick.
static LOAD_SEQ: AtomicU64 = AtomicU64::new(0);

/// Handle over one discovered `sqlalchemy.MetaData` instance.
///
/// Owned for the duration of a discovery pass and discarded after DDL
/// emission; the schema-object model behind it belongs to SQLAlchemy.
pub struct Catalog {
    metadata: Py<PyAny>,
}

impl Catalog {
    fn new(metadata: Py<PyAny>) -> Self {
        Self { metadata }
    }

    /// Names of every table registered in this catalog.
    pub fn table_names(&self) -> Result<HashSet<String>> {
        Python::with_gil(|py| {
            let tables = self.metadata.as_ref(py).getattr("tables")?;
            let mut names = HashSet::new();
            for key in tables.call_method0("keys")?.iter()? {
                names.insert(key?.extract::<String>()?);
            }
            Ok(names)
        })
    }

    /// Number of registered tables.
    pub fn table_count(&self) -> Result<usize> {
        Python::with_gil(|py| Ok(self.metadata.as_ref(py).getattr("tables")?.len()?))
    }

    /// The underlying MetaData object, borrowed for interpreter calls.
    /// The handle must outlive the GIL scope the borrow is used in.
    pub(crate) fn bind<'py>(&'py self, py: Python<'py>) -> &'py PyAny {
        self.metadata.as_ref(py)
    }
}

/// Load every file of one root and elect the catalog it populated.
///
/// Returns `Ok(None)` when the root registered no metadata at all; the
/// caller decides whether that is fatal (it is, once every root came up
/// empty). With `skip_errors`, per-file load failures are logged at debug
/// level and skipped; otherwise the first failure aborts the pass.
///
/// The root itself is placed on `sys.path` for the duration of the pass
/// so sibling files can import each other (`from models import Base`),
/// and any cached module whose `__file__` lies under the root is evicted
/// first so a prior pass can never leak stale content into this one.
///
/// When buggy source layout registers tables into several distinct
/// MetaData instances, the one holding the most tables wins, ties broken
/// by discovery order. Known limitation, not a contract.
pub fn load_root(root: &Path, files: &[PathBuf], skip_errors: bool) -> Result<Option<Catalog>> {
    Python::with_gil(|py| {
        let metadata_cls = py
            .import("sqlalchemy")
            .map_err(|err| {
                ProviderError::Python(format!("failed to import sqlalchemy: {}", err))
            })?
            .getattr("MetaData")?;

        interp::purge_modules_under(py, root)?;
        interp::add_sys_path(py, root)?;
        let loaded = load_all(py, files, metadata_cls, skip_errors);
        interp::remove_sys_path(py, root);
        elect(py, loaded?)
    })
}

fn load_all<'py>(
    py: Python<'py>,
    files: &[PathBuf],
    metadata_cls: &PyAny,
    skip_errors: bool,
) -> Result<Vec<(usize, Py<PyAny>)>> {
    let mut found: Vec<(usize, Py<PyAny>)> = Vec::new();
    for path in files {
        match load_file(py, path) {
            Ok(module) => scan_namespace(py, module, metadata_cls, &mut found)?,
            Err(err) => {
                let err = interp::module_import_error(py, err, path);
                if skip_errors {
                    debug!("{}", err);
                    continue;
                }
                return Err(err);
            }
        }
    }
    Ok(found)
}

/// Execute one file as a standalone module under a fresh synthetic name.
fn load_file<'py>(py: Python<'py>, path: &Path) -> PyResult<&'py PyModule> {
    let source =
        fs::read_to_string(path).map_err(|err| PyIOError::new_err(err.to_string()))?;
    let prefix = module_prefix(path);
    let module_name =
        synthetic_module_name(&prefix, path).map_err(|err| PyIOError::new_err(err.to_string()))?;
    interp::purge_modules(py, &prefix)?;
    let file_name = path.to_string_lossy();
    PyModule::from_code(py, &source, &file_name, &module_name)
}

/// Stable per-path module-name prefix; purging is keyed on this.
fn module_prefix(path: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    path.hash(&mut hasher);
    format!("atlas_models_{:016x}", hasher.finish())
}

/// Fresh collision-resistant module name for one load attempt,
/// incorporating the file's modification time.
fn synthetic_module_name(prefix: &str, path: &Path) -> std::io::Result<String> {
    let mtime = fs::metadata(path)?.modified()?;
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .map(|age| age.as_nanos())
        .unwrap_or(0);
    let seq = LOAD_SEQ.fetch_add(1, Ordering::Relaxed);
    Ok(format!("{}_{}_{}", prefix, nanos, seq))
}

/// Collect every distinct MetaData instance reachable from the module's
/// top-level bindings via a `metadata` attribute. Attribute access errors
/// never fail the scan; arbitrary objects are allowed to misbehave.
fn scan_namespace(
    py: Python<'_>,
    module: &PyModule,
    metadata_cls: &PyAny,
    found: &mut Vec<(usize, Py<PyAny>)>,
) -> Result<()> {
    for value in module.dict().values() {
        let metadata = match value.getattr("metadata") {
            Ok(attr) => attr,
            Err(_) => continue,
        };
        if !metadata.is_instance(metadata_cls).unwrap_or(false) {
            continue;
        }
        let identity = metadata.as_ptr() as usize;
        if !found.iter().any(|(seen, _)| *seen == identity) {
            found.push((identity, metadata.to_object(py)));
        }
    }
    Ok(())
}

/// Deterministic catalog election: most tables wins, first seen on ties.
fn elect(py: Python<'_>, found: Vec<(usize, Py<PyAny>)>) -> Result<Option<Catalog>> {
    if found.len() > 1 {
        debug!(
            "found {} distinct MetaData instances in one root; electing the largest",
            found.len()
        );
    }
    let mut best: Option<(usize, Py<PyAny>)> = None;
    for (_, metadata) in found {
        let tables = metadata.as_ref(py).getattr("tables")?.len()?;
        let replace = match &best {
            Some((most, _)) => tables > *most,
            None => true,
        };
        if replace {
            best = Some((tables, metadata));
        }
    }
    Ok(best.map(|(_, metadata)| Catalog::new(metadata)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_prefix_is_stable_per_path() {
        let a = module_prefix(Path::new("/tmp/models.py"));
        let b = module_prefix(Path::new("/tmp/models.py"));
        let c = module_prefix(Path::new("/tmp/other.py"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("atlas_models_"));
    }

    #[test]
    fn test_bind_borrows_for_the_gil_scope() {
        Python::with_gil(|py| {
            let catalog = Catalog::new(py.None());
            let bound = catalog.bind(py);
            assert!(bound.is_none());
        });
    }

    #[test]
    fn test_synthetic_names_are_unique_per_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("models.py");
        std::fs::write(&path, "x = 1\n").unwrap();
        let prefix = module_prefix(&path);
        let first = synthetic_module_name(&prefix, &path).unwrap();
        let second = synthetic_module_name(&prefix, &path).unwrap();
        assert_ne!(first, second);
        assert!(first.starts_with(&prefix));
        assert!(second.starts_with(&prefix));
    }
}
