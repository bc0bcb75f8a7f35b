//! Isolated workspace copies and the file-change types that flow out of a
//! refactor transaction.
//!
//! Every transaction owns a private copy of the project subtree inside a
//! temporary directory. All writes happen in the copy; the live project is
//! never touched. The copy is removed when the transaction reaches any
//! terminal state (the `TempDir` guard guarantees cleanup on drop).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tracing::debug;

use crate::walker::ProjectWalker;

// ============================================================================
// Content Hashing
// ============================================================================

/// SHA-256 hash of content, hex encoded.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

// ============================================================================
// File Change Types
// ============================================================================

/// A file rewritten by a refactorer.
///
/// The path is project-root-relative; the transaction remaps it between the
/// workspace copy and the original project. This is the only externally
/// visible output of a refactorer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifiedFile {
    /// Project-root-relative path.
    pub path: PathBuf,
    /// Complete rewritten file text.
    pub new_text: String,
}

impl ModifiedFile {
    pub fn new(path: impl Into<PathBuf>, new_text: impl Into<String>) -> Self {
        ModifiedFile {
            path: path.into(),
            new_text: new_text.into(),
        }
    }
}

/// One committed file change, with paths remapped back to the original
/// project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    /// Absolute path in the original project.
    pub path: PathBuf,
    /// Text before the rewrite.
    pub original_text: String,
    /// Text after the rewrite.
    pub rewritten_text: String,
    /// SHA-256 of the rewritten text.
    pub content_hash: String,
}

// ============================================================================
// Workspace Copy
// ============================================================================

/// A private, disposable copy of a project subtree.
#[derive(Debug)]
pub struct WorkspaceCopy {
    temp: TempDir,
    original_root: PathBuf,
}

impl WorkspaceCopy {
    /// Copy the project subtree under `original_root` into a fresh temporary
    /// directory, honoring the walker's ignore set plus `ignore_patterns`.
    pub fn create(original_root: &Path, ignore_patterns: &[String]) -> io::Result<Self> {
        let temp = TempDir::new()?;
        let walker = ProjectWalker::with_patterns(original_root, ignore_patterns)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;

        let mut copied = 0usize;
        for file in walker.files() {
            let rel = match file.strip_prefix(original_root) {
                Ok(rel) => rel,
                Err(_) => continue,
            };
            let dest = temp.path().join(rel);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&file, &dest)?;
            copied += 1;
        }
        debug!(files = copied, root = %original_root.display(), "workspace copy created");

        Ok(WorkspaceCopy {
            temp,
            original_root: original_root.to_path_buf(),
        })
    }

    /// Root of the copy.
    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Remap a path under the original project into the copy.
    pub fn copy_path(&self, original: &Path) -> io::Result<PathBuf> {
        let rel = original.strip_prefix(&self.original_root).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("path is outside the project: {}", original.display()),
            )
        })?;
        Ok(self.temp.path().join(rel))
    }

    /// Remap a project-root-relative path back to the original project.
    pub fn original_path(&self, relative: &Path) -> PathBuf {
        self.original_root.join(relative)
    }

    /// Write a file inside the copy (project-root-relative path).
    pub fn write_file(&self, relative: &Path, text: &str) -> io::Result<()> {
        let dest = self.temp.path().join(relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, text)
    }
}

// ============================================================================
// Tests
// ============================================================================
