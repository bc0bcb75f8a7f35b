//! Project traversal with ignore patterns.
//!
//! `ProjectWalker` enumerates regular files under a root lazily and in a
//! deterministic order (depth-first, directory entries sorted by name).
//! Path components matching the ignore set are pruned without descending.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use walkdir::WalkDir;

// ============================================================================
// Default Ignores
// ============================================================================

/// Directory names skipped by default: version control, caches, dependency
/// and build output directories.
const DEFAULT_IGNORE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    ".ruff_cache",
    "target",
    ".venv",
    "venv",
    "build",
    "dist",
    ".eggs",
    ".tox",
];

/// Whether a single path component is ignored by default.
///
/// Hidden components (leading dot) are always ignored.
fn is_ignored_component(name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }
    DEFAULT_IGNORE_DIRS.contains(&name) || name.ends_with(".egg-info")
}

// ============================================================================
// Walker
// ============================================================================

/// Error building a walker from user-supplied glob patterns.
#[derive(Debug, Error)]
pub enum WalkerError {
    /// A user-supplied ignore glob did not parse.
    #[error("invalid ignore pattern: {0}")]
    Pattern(#[from] globset::Error),
}

/// Lazy, deterministic traversal of a project directory.
#[derive(Debug)]
pub struct ProjectWalker {
    root: PathBuf,
    extra_ignores: GlobSet,
    extension: Option<String>,
}

impl ProjectWalker {
    /// Walker with the default ignore set only.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectWalker {
            root: root.into(),
            extra_ignores: GlobSet::empty(),
            extension: None,
        }
    }

    /// Walker with additional ignore globs, matched against
    /// project-relative paths.
    pub fn with_patterns(root: impl Into<PathBuf>, patterns: &[String]) -> Result<Self, WalkerError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(ProjectWalker {
            root: root.into(),
            extra_ignores: builder.build()?,
            extension: None,
        })
    }

    /// Restrict the walk to files with the given extension (no dot).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// The walk root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily yield candidate files, depth-first with sorted entries.
    pub fn files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        let root = self.root.clone();
        WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |entry| {
                // Never prune the root itself, even if its own name would
                // match (for example a hidden temp directory).
                if entry.path() == root {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                !is_ignored_component(&name)
            })
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(move |entry| {
                let path = entry.into_path();
                let rel = path.strip_prefix(&self.root).ok()?.to_path_buf();
                if self.extra_ignores.is_match(&rel) {
                    return None;
                }
                if let Some(ext) = &self.extension {
                    if path.extension().and_then(|e| e.to_str()) != Some(ext.as_str()) {
                        return None;
                    }
                }
                Some(path)
            })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn rel_paths(walker: &ProjectWalker) -> Vec<String> {
        walker
            .files()
            .map(|p| {
                p.strip_prefix(walker.root())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn skips_vcs_caches_and_hidden_dirs() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "app.py");
        touch(dir.path(), ".git/config");
        touch(dir.path(), "__pycache__/app.cpython-311.pyc");
        touch(dir.path(), "venv/lib/site.py");
        touch(dir.path(), ".hidden/secret.py");
        touch(dir.path(), "pkg/util.py");

        let walker = ProjectWalker::new(dir.path());
        let files = rel_paths(&walker);
        assert_eq!(files, vec!["app.py", "pkg/util.py"]);
    }

    #[test]
    fn traversal_order_is_deterministic_and_sorted() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "zeta.py");
        touch(dir.path(), "alpha.py");
        touch(dir.path(), "mid/beta.py");

        let walker = ProjectWalker::new(dir.path());
        let first = rel_paths(&walker);
        let second = rel_paths(&walker);
        assert_eq!(first, second);
        assert_eq!(first, vec!["alpha.py", "mid/beta.py", "zeta.py"]);
    }

    #[test]
    fn extension_filter() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "code.py");
        touch(dir.path(), "README.md");

        let walker = ProjectWalker::new(dir.path()).with_extension("py");
        assert_eq!(rel_paths(&walker), vec!["code.py"]);
    }

    #[test]
    fn extra_ignore_globs_apply_to_relative_paths() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "src/main.py");
        touch(dir.path(), "generated/out.py");

        let walker =
            ProjectWalker::with_patterns(dir.path(), &["generated/**".to_string()]).unwrap();
        assert_eq!(rel_paths(&walker), vec!["src/main.py"]);
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = ProjectWalker::with_patterns(dir.path(), &["[".to_string()]);
        assert!(result.is_err());
    }
}
