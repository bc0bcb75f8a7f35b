//! The refactoring strategy seam: the `Refactorer` trait, the context object
//! threaded through every transaction, and the smell-to-strategy registry.
//!
//! The registry replaces runtime dispatch over smell symbols with an explicit
//! mapping resolved once at startup. The context replaces global mutable
//! configuration with a value passed into each call.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::RefactorResult;
use crate::smell::{SmellKind, SmellRecord};
use crate::workspace::ModifiedFile;

// ============================================================================
// Context
// ============================================================================

/// Per-transaction configuration: thresholds, classification keyword sets,
/// ignore patterns, and oracle timeouts. No process-wide state.
#[derive(Debug, Clone)]
pub struct RefactorContext {
    /// Parameter-count threshold above which a list is collapsed
    /// (excluding an implicit receiver).
    pub param_threshold: usize,
    /// Minimum chained-call links before a chain is split.
    pub chain_threshold: usize,
    /// Keyword substrings marking a parameter as data-oriented.
    pub data_keywords: Vec<String>,
    /// Keyword substrings marking a parameter as config-oriented.
    pub config_keywords: Vec<String>,
    /// Extra ignore globs for project traversal and workspace copies.
    pub ignore_patterns: Vec<String>,
    /// Timeout for one cost measurement.
    pub measure_timeout: Duration,
    /// Timeout for one test-suite run.
    pub test_timeout: Duration,
}

impl Default for RefactorContext {
    fn default() -> Self {
        RefactorContext {
            param_threshold: 6,
            chain_threshold: 3,
            data_keywords: [
                "data", "value", "item", "name", "path", "file", "text", "input", "output",
                "result", "list", "count", "id",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            config_keywords: [
                "config", "option", "setting", "flag", "mode", "limit", "threshold", "timeout",
                "verbose", "debug", "enable", "disable", "level", "max", "min",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ignore_patterns: Vec::new(),
            measure_timeout: Duration::from_secs(60),
            test_timeout: Duration::from_secs(300),
        }
    }
}

// ============================================================================
// Refactorer Trait
// ============================================================================

/// A strategy implementing one smell's remediation as a tree rewrite.
///
/// `apply` receives the target file and project root *inside the transaction
/// workspace copy*; it must not touch anything outside that root. Returned
/// paths are project-root-relative and always include the target file when
/// anything changed. An empty set means the smell is not actually rewritable
/// (for example the threshold is no longer met) and the transaction discards
/// with `NotApplicable`.
pub trait Refactorer: Send + Sync {
    /// Strategy name for logs and reports.
    fn name(&self) -> &'static str;

    /// Attempt the rewrite.
    fn apply(
        &self,
        target_file: &Path,
        project_root: &Path,
        smell: &SmellRecord,
        ctx: &RefactorContext,
    ) -> RefactorResult<Vec<ModifiedFile>>;
}

// ============================================================================
// Registry
// ============================================================================

/// Maps each smell kind to the strategy that remediates it.
#[derive(Default)]
pub struct RefactorerRegistry {
    strategies: HashMap<SmellKind, Box<dyn Refactorer>>,
}

impl RefactorerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy for a smell kind, replacing any previous one.
    pub fn register(&mut self, kind: SmellKind, refactorer: Box<dyn Refactorer>) {
        self.strategies.insert(kind, refactorer);
    }

    /// Resolve the strategy for a smell kind.
    pub fn get(&self, kind: SmellKind) -> Option<&dyn Refactorer> {
        self.strategies.get(&kind).map(|b| b.as_ref())
    }

    /// Resolve the strategy for a smell record.
    pub fn resolve(&self, smell: &SmellRecord) -> Option<&dyn Refactorer> {
        self.get(smell.kind)
    }

    /// Number of registered strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smell::{SmellMetadata, SmellOccurrence};
    use std::path::PathBuf;

    struct NoopRefactorer;

    impl Refactorer for NoopRefactorer {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn apply(
            &self,
            _target_file: &Path,
            _project_root: &Path,
            _smell: &SmellRecord,
            _ctx: &RefactorContext,
        ) -> RefactorResult<Vec<ModifiedFile>> {
            Ok(vec![])
        }
    }

    fn sample_smell(kind: SmellKind) -> SmellRecord {
        SmellRecord {
            kind,
            message: "test".to_string(),
            confidence: 1.0,
            source_file: PathBuf::from("a.py"),
            enclosing_object: None,
            occurrences: vec![SmellOccurrence::on_line(1, 1, 1)],
            metadata: SmellMetadata::None,
        }
    }

    #[test]
    fn registry_resolves_registered_kinds() {
        let mut registry = RefactorerRegistry::new();
        registry.register(SmellKind::DeadCode, Box::new(NoopRefactorer));

        assert_eq!(registry.len(), 1);
        assert!(registry.resolve(&sample_smell(SmellKind::DeadCode)).is_some());
        assert!(registry
            .resolve(&sample_smell(SmellKind::LongCallChain))
            .is_none());
    }

    #[test]
    fn default_context_thresholds() {
        let ctx = RefactorContext::default();
        assert_eq!(ctx.param_threshold, 6);
        assert!(ctx.config_keywords.iter().any(|k| k == "flag"));
        assert!(ctx.data_keywords.iter().any(|k| k == "value"));
    }
}
