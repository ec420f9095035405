//! Error types for the provider pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Error type covering every stage of a discovery pass.
#[derive(Debug)]
pub enum ProviderError {
    /// Filesystem failure (unreadable root directory, walk error).
    Io(io::Error),
    /// A model file raised while being loaded by the embedded interpreter.
    ///
    /// `kind` is the Python exception class name (e.g. `ImportError`).
    ModuleImport {
        kind: String,
        message: String,
        path: PathBuf,
    },
    /// A model file could not be parsed by the syntactic pass.
    Parse { path: PathBuf, message: String },
    /// No SQLAlchemy metadata was registered by any file in any root.
    ModelsNotFound,
    /// Interpreter-level failure outside a specific model file
    /// (sqlalchemy missing, dialect compilation error, ...).
    Python(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Io(err) => write!(f, "{}", err),
            ProviderError::ModuleImport {
                kind,
                message,
                path,
            } => {
                write!(f, "{}: {} (while loading {})", kind, message, path.display())
            }
            ProviderError::Parse { path, message } => {
                write!(f, "Failed to parse {}: {}", path.display(), message)
            }
            ProviderError::ModelsNotFound => {
                write!(f, "Found no sqlalchemy models in the directory tree.")
            }
            ProviderError::Python(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProviderError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for ProviderError {
    fn from(err: io::Error) -> Self {
        ProviderError::Io(err)
    }
}

impl From<walkdir::Error> for ProviderError {
    fn from(err: walkdir::Error) -> Self {
        ProviderError::Io(err.into())
    }
}

impl From<pyo3::PyErr> for ProviderError {
    fn from(err: pyo3::PyErr) -> Self {
        ProviderError::Python(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_import_display() {
        let err = ProviderError::ModuleImport {
            kind: "ImportError".to_string(),
            message: "No module named 'missing'".to_string(),
            path: PathBuf::from("/tmp/models.py"),
        };
        assert_eq!(
            err.to_string(),
            "ImportError: No module named 'missing' (while loading /tmp/models.py)"
        );
    }

    #[test]
    fn test_models_not_found_display() {
        assert_eq!(
            ProviderError::ModelsNotFound.to_string(),
            "Found no sqlalchemy models in the directory tree."
        );
    }
}
