//! Helpers around the embedded Python interpreter.
//!
//! Centralizes the interpreter chores the loader depends on: evicting
//! stale entries from `sys.modules` before a re-load, managing the
//! `sys.path` entry that lets sibling model files import each other, and
//! turning a raised Python exception into a [`ProviderError`] that names
//! the exception class.

use std::path::Path;

use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::error::ProviderError;

/// Remove every `sys.modules` entry whose key starts with `prefix`.
///
/// Module names minted by the loader embed a per-path prefix, so this
/// guarantees a later load of the same file never resolves against a
/// previously executed version of it.
pub(crate) fn purge_modules(py: Python<'_>, prefix: &str) -> PyResult<()> {
    let modules = sys_modules(py)?;
    let stale: Vec<String> = modules
        .keys()
        .iter()
        .filter_map(|key| key.extract::<String>().ok())
        .filter(|name| name.starts_with(prefix))
        .collect();
    for name in stale {
        modules.del_item(name)?;
    }
    Ok(())
}

/// Remove every cached module whose `__file__` lies under `root`.
///
/// Sibling imports (`from models import Base`) go through the regular
/// import machinery and are cached under their plain stem; without this
/// eviction a second discovery pass in the same process would resolve
/// them against content no longer on disk.
pub(crate) fn purge_modules_under(py: Python<'_>, root: &Path) -> PyResult<()> {
    let modules = sys_modules(py)?;
    let mut stale = Vec::new();
    for (key, module) in modules.iter() {
        let Ok(file) = module.getattr("__file__") else {
            continue;
        };
        let Ok(file) = file.extract::<String>() else {
            continue;
        };
        if Path::new(&file).starts_with(root) {
            if let Ok(name) = key.extract::<String>() {
                stale.push(name);
            }
        }
    }
    for name in stale {
        modules.del_item(name)?;
    }
    Ok(())
}

/// Prepend `dir` to `sys.path` so model files can import their siblings.
pub(crate) fn add_sys_path(py: Python<'_>, dir: &Path) -> PyResult<()> {
    sys_path(py)?.insert(0, dir.to_string_lossy().as_ref())?;
    Ok(())
}

/// Drop the `sys.path` entry added by [`add_sys_path`], if still present.
pub(crate) fn remove_sys_path(py: Python<'_>, dir: &Path) {
    if let Ok(path_list) = sys_path(py) {
        let _ = path_list.call_method1("remove", (dir.to_string_lossy().as_ref(),));
    }
}

/// Wrap a Python exception raised while loading `path` into a
/// [`ProviderError::ModuleImport`] carrying the exception class name.
pub(crate) fn module_import_error(py: Python<'_>, err: PyErr, path: &Path) -> ProviderError {
    let kind = err
        .get_type(py)
        .name()
        .map(|name| name.to_string())
        .unwrap_or_else(|_| "Exception".to_string());
    let message = err.value(py).to_string();
    ProviderError::ModuleImport {
        kind,
        message,
        path: path.to_path_buf(),
    }
}

fn sys_modules(py: Python<'_>) -> PyResult<&PyDict> {
    py.import("sys")?
        .getattr("modules")?
        .downcast::<PyDict>()
        .map_err(PyErr::from)
}

fn sys_path(py: Python<'_>) -> PyResult<&PyList> {
    py.import("sys")?
        .getattr("path")?
        .downcast::<PyList>()
        .map_err(PyErr::from)
}
