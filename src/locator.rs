//! Source locator: recursive discovery of candidate model files.
//!
//! Walks one root directory at a time, yielding every `*.py` file in
//! traversal order. An optional [`ExcludePolicy`] skips dependency and
//! virtual-environment subtrees so third-party packages are never loaded
//! as user models.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::error::Result;

/// Directory names commonly used for Python virtual environments.
const COMMON_VENV_NAMES: [&str; 7] = [
    ".env", ".venv", "env", "venv", "ENV", "env.bak", "venv.bak",
];

/// Path-based exclusion predicate applied during directory traversal.
#[derive(Debug, Clone)]
pub struct ExcludePolicy {
    pattern: Regex,
}

impl ExcludePolicy {
    /// Policy that skips paths containing a virtual-environment directory
    /// component. Matches whole components, so `environment/` survives
    /// while `venv/` does not.
    pub fn virtualenvs() -> Self {
        let alternatives = COMMON_VENV_NAMES
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?:^|/)(?:{})(?:/|$)", alternatives))
            .expect("hard-coded exclusion pattern compiles");
        Self { pattern }
    }

    /// Whether the given path should be excluded from discovery.
    pub fn matches(&self, path: &Path) -> bool {
        self.pattern.is_match(&path.to_string_lossy())
    }
}

/// Collect every Python source file under `root`, in traversal order.
///
/// The root is canonicalized first, so yielded paths are absolute; a
/// missing or unreadable root is an immediate error, never swallowed.
/// Files matched by `exclude` are dropped silently.
pub fn python_sources(root: &Path, exclude: Option<&ExcludePolicy>) -> Result<Vec<PathBuf>> {
    let root = root.canonicalize()?;
    let mut sources = Vec::new();
    for entry in WalkDir::new(&root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().map_or(true, |ext| ext != "py") {
            continue;
        }
        if exclude.is_some_and(|policy| policy.matches(path)) {
            continue;
        }
        sources.push(path.to_path_buf());
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_finds_nested_python_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pkg/sub")).unwrap();
        fs::write(dir.path().join("models.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("pkg/sub/more.py"), "y = 2\n").unwrap();
        fs::write(dir.path().join("pkg/readme.txt"), "not python\n").unwrap();

        let found = python_sources(dir.path(), None).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|p| p.is_absolute()));
        assert!(found.iter().all(|p| p.extension().unwrap() == "py"));
    }

    #[test]
    fn test_virtualenv_policy_skips_venv_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".venv/lib")).unwrap();
        fs::create_dir_all(dir.path().join("environment")).unwrap();
        fs::write(dir.path().join(".venv/lib/site.py"), "x = 1\n").unwrap();
        fs::write(dir.path().join("environment/models.py"), "y = 2\n").unwrap();

        let policy = ExcludePolicy::virtualenvs();
        let found = python_sources(dir.path(), Some(&policy)).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].ends_with("environment/models.py"));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nothing/here");
        assert!(python_sources(&missing, None).is_err());
    }

    #[test]
    fn test_policy_matches_whole_components_only() {
        let policy = ExcludePolicy::virtualenvs();
        assert!(policy.matches(Path::new("/work/venv/lib/site.py")));
        assert!(policy.matches(Path::new("/work/.env/conf.py")));
        assert!(!policy.matches(Path::new("/work/environment/models.py")));
        assert!(!policy.matches(Path::new("/work/seven/models.py")));
    }
}
