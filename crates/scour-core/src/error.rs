//! Error types shared across the engine.
//!
//! The engine distinguishes two failure surfaces:
//! - `RefactorError`: a fault inside a single refactorer invocation. These
//!   never escape a transaction; the transaction maps them to a discard.
//! - `TransactionError`: a fault setting up the transaction itself (for
//!   example the workspace copy could not be created).
//!
//! Discard reasons (the terminal taxonomy of a transaction) live in
//! [`crate::transaction`] next to the state machine that produces them.

use std::io;

use thiserror::Error;

// ============================================================================
// Refactorer Errors
// ============================================================================

/// Error raised inside a refactorer invocation.
#[derive(Debug, Error)]
pub enum RefactorError {
    /// Malformed source. Aborts this file only; other files are unaffected.
    #[error("parse error in {file}: {message}")]
    Parse { file: String, message: String },

    /// An edit batch could not be applied (overlapping spans, bad offsets).
    #[error("edit error: {message}")]
    Edit { message: String },

    /// IO error while reading or writing workspace files.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unexpected internal fault during rewriting.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RefactorError {
    /// Create a parse error for a file.
    pub fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        RefactorError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    /// Create an edit error.
    pub fn edit(message: impl Into<String>) -> Self {
        RefactorError::Edit {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RefactorError::Internal {
            message: message.into(),
        }
    }
}

/// Result type for refactorer operations.
pub type RefactorResult<T> = Result<T, RefactorError>;

// ============================================================================
// Transaction Errors
// ============================================================================

/// Error raised while setting up a transaction, before any rewrite ran.
///
/// Failures past setup never surface as errors; they become discard reasons
/// so the caller always receives a terminal outcome.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The isolated workspace copy could not be created.
    #[error("workspace setup failed: {0}")]
    Workspace(#[from] io::Error),
}

// ============================================================================
// Tests
// ============================================================================
