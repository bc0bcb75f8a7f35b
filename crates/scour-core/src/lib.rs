//! Core infrastructure for scour.
//!
//! This crate provides the language-agnostic half of the refactoring engine:
//! - The smell data contract between detectors and refactorers
//! - Project traversal with ignore patterns
//! - Isolated workspace copies for transactional rewrites
//! - Cost and test oracle adapters (blocking subprocesses with timeouts)
//! - The `Refactorer` trait and the smell-to-strategy registry
//! - The validate-or-rollback refactor transaction
//! - Diff generation and text utilities

pub mod diff;
pub mod error;
pub mod oracle;
pub mod refactor;
pub mod smell;
pub mod text;
pub mod transaction;
pub mod walker;
pub mod workspace;
