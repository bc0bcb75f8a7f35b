//! The validate-or-rollback refactor transaction.
//!
//! One transaction drives one refactorer over one smell inside an isolated
//! workspace copy, validating the rewrite against the cost oracle and the
//! test oracle before committing. The state machine is:
//!
//! `Init -> Snapshotted -> BaselineMeasured -> Rewritten -> PostMeasured
//!  -> TestsRun -> {Committed | Discarded}`
//!
//! Guarantees:
//! - The live project is never mutated; a committed transaction is a
//!   validated set of file changes (a diff), not an applied one.
//! - All file changes are reported together or not at all.
//! - The workspace copy is removed on every terminal state.
//! - Cancellation is cooperative at stage boundaries.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::diff::unified_diff;
use crate::error::TransactionError;
use crate::oracle::{CostOracle, TestOracle};
use crate::refactor::{RefactorContext, Refactorer};
use crate::smell::SmellRecord;
use crate::workspace::{content_hash, FileChange, WorkspaceCopy};

// ============================================================================
// Discard Taxonomy
// ============================================================================

/// Why a transaction was discarded. All reasons are terminal and
/// non-retryable; the caller may re-run detection and try a different smell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardReason {
    /// The smell no longer matches (for example the threshold is not met
    /// after dead-parameter elimination).
    NotApplicable,
    /// The cost oracle returned no measurement (failure or timeout).
    MeasurementFailed,
    /// The rewrite did not reduce measured cost; tests were never run.
    NoImprovement,
    /// The test oracle reported a behavioral regression.
    RegressionDetected,
    /// Unexpected internal fault during rewriting.
    RefactorFailed,
    /// A cancellation request was observed at a stage boundary.
    Cancelled,
}

impl std::fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DiscardReason::NotApplicable => "not_applicable",
            DiscardReason::MeasurementFailed => "measurement_failed",
            DiscardReason::NoImprovement => "no_improvement",
            DiscardReason::RegressionDetected => "regression_detected",
            DiscardReason::RefactorFailed => "refactor_failed",
            DiscardReason::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Terminal result of one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransactionOutcome {
    /// The rewrite was validated; the caller may apply the changes.
    Committed {
        /// Every rewritten file, paths remapped to the original project.
        changes: Vec<FileChange>,
        /// Measured cost before the rewrite.
        baseline_cost: f64,
        /// Measured cost after the rewrite.
        post_cost: f64,
        /// Unified diff over all changed files.
        unified_diff: String,
        /// ISO-8601 transaction start time.
        started_at: String,
    },
    /// The rewrite was discarded; the project is untouched.
    Discarded {
        reason: DiscardReason,
        #[serde(skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
}

impl TransactionOutcome {
    fn discarded(reason: DiscardReason) -> Self {
        TransactionOutcome::Discarded {
            reason,
            detail: None,
        }
    }

    fn discarded_with(reason: DiscardReason, detail: String) -> Self {
        TransactionOutcome::Discarded {
            reason,
            detail: Some(detail),
        }
    }

    /// Measured improvement (baseline minus post) for committed outcomes.
    pub fn cost_delta(&self) -> Option<f64> {
        match self {
            TransactionOutcome::Committed {
                baseline_cost,
                post_cost,
                ..
            } => Some(baseline_cost - post_cost),
            TransactionOutcome::Discarded { .. } => None,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, TransactionOutcome::Committed { .. })
    }
}

// ============================================================================
// Cancellation
// ============================================================================

/// Cooperative cancellation handle, checked between transaction stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The transaction aborts at the next stage
    /// boundary with workspace cleanup guaranteed.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// Transaction stages, used for logging and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxState {
    Init,
    Snapshotted,
    BaselineMeasured,
    Rewritten,
    PostMeasured,
    TestsRun,
}

impl TxState {
    fn name(&self) -> &'static str {
        match self {
            TxState::Init => "init",
            TxState::Snapshotted => "snapshotted",
            TxState::BaselineMeasured => "baseline_measured",
            TxState::Rewritten => "rewritten",
            TxState::PostMeasured => "post_measured",
            TxState::TestsRun => "tests_run",
        }
    }
}

/// Orchestrates one attempted, validated, atomically committed-or-discarded
/// rewrite. Each transaction owns its own workspace copy, so independent
/// transactions run fully isolated with no locking.
pub struct RefactorTransaction<'a> {
    ctx: &'a RefactorContext,
    cost_oracle: &'a dyn CostOracle,
    test_oracle: &'a dyn TestOracle,
    cancel: CancellationToken,
}

impl<'a> RefactorTransaction<'a> {
    pub fn new(
        ctx: &'a RefactorContext,
        cost_oracle: &'a dyn CostOracle,
        test_oracle: &'a dyn TestOracle,
    ) -> Self {
        RefactorTransaction {
            ctx,
            cost_oracle,
            test_oracle,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a cancellation token shared with the caller.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run the full state machine for one smell.
    ///
    /// Errors are only returned for setup failures (workspace copy); every
    /// failure past setup becomes a `Discarded` outcome.
    pub fn run(
        &self,
        project_root: &Path,
        target_file: &Path,
        smell: &SmellRecord,
        refactorer: &dyn Refactorer,
    ) -> Result<TransactionOutcome, TransactionError> {
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut state = TxState::Init;
        debug!(
            strategy = refactorer.name(),
            smell = smell.kind.symbol(),
            target = %target_file.display(),
            "transaction started"
        );

        if self.cancel.is_cancelled() {
            return Ok(TransactionOutcome::discarded(DiscardReason::Cancelled));
        }

        // Init -> Snapshotted: copy the project into an isolated workspace.
        // The workspace is deleted on every exit path below (TempDir guard).
        let workspace = WorkspaceCopy::create(project_root, &self.ctx.ignore_patterns)?;
        state = self.advance(state, TxState::Snapshotted);

        if self.cancel.is_cancelled() {
            return Ok(TransactionOutcome::discarded(DiscardReason::Cancelled));
        }

        // Snapshotted -> BaselineMeasured: cost of the original target file.
        let Some(baseline_cost) = self.cost_oracle.measure(target_file) else {
            return Ok(TransactionOutcome::discarded(
                DiscardReason::MeasurementFailed,
            ));
        };
        state = self.advance(state, TxState::BaselineMeasured);

        if self.cancel.is_cancelled() {
            return Ok(TransactionOutcome::discarded(DiscardReason::Cancelled));
        }

        // BaselineMeasured -> Rewritten: apply the strategy inside the copy.
        let copy_target = match workspace.copy_path(target_file) {
            Ok(path) => path,
            Err(e) => {
                return Ok(TransactionOutcome::discarded_with(
                    DiscardReason::RefactorFailed,
                    e.to_string(),
                ))
            }
        };
        let modified = match refactorer.apply(&copy_target, workspace.root(), smell, self.ctx) {
            Ok(modified) => modified,
            Err(e) => {
                return Ok(TransactionOutcome::discarded_with(
                    DiscardReason::RefactorFailed,
                    e.to_string(),
                ))
            }
        };
        if modified.is_empty() {
            return Ok(TransactionOutcome::discarded(DiscardReason::NotApplicable));
        }

        // Capture original texts before overwriting the copy, then write the
        // rewritten files into the copy only.
        let mut changes = Vec::with_capacity(modified.len());
        for m in &modified {
            let original_text = match fs::read_to_string(workspace.original_path(&m.path)) {
                Ok(text) => text,
                Err(e) => {
                    return Ok(TransactionOutcome::discarded_with(
                        DiscardReason::RefactorFailed,
                        format!("reading {}: {}", m.path.display(), e),
                    ))
                }
            };
            if let Err(e) = workspace.write_file(&m.path, &m.new_text) {
                return Ok(TransactionOutcome::discarded_with(
                    DiscardReason::RefactorFailed,
                    format!("writing {}: {}", m.path.display(), e),
                ));
            }
            changes.push(FileChange {
                path: workspace.original_path(&m.path),
                original_text,
                content_hash: content_hash(m.new_text.as_bytes()),
                rewritten_text: m.new_text.clone(),
            });
        }
        state = self.advance(state, TxState::Rewritten);

        if self.cancel.is_cancelled() {
            return Ok(TransactionOutcome::discarded(DiscardReason::Cancelled));
        }

        // Rewritten -> PostMeasured: cost of the rewritten copy's target.
        let Some(post_cost) = self.cost_oracle.measure(&copy_target) else {
            return Ok(TransactionOutcome::discarded(
                DiscardReason::MeasurementFailed,
            ));
        };
        state = self.advance(state, TxState::PostMeasured);

        // A non-improving rewrite is rejected regardless of correctness,
        // so the cost check short-circuits before the test run.
        if post_cost >= baseline_cost {
            debug!(baseline_cost, post_cost, "no improvement, tests skipped");
            return Ok(TransactionOutcome::discarded(DiscardReason::NoImprovement));
        }

        if self.cancel.is_cancelled() {
            return Ok(TransactionOutcome::discarded(DiscardReason::Cancelled));
        }

        // PostMeasured -> TestsRun: behavioral validation on the copy.
        let passed = self.test_oracle.run(workspace.root());
        state = self.advance(state, TxState::TestsRun);
        if !passed {
            return Ok(TransactionOutcome::discarded(
                DiscardReason::RegressionDetected,
            ));
        }

        // TestsRun -> Committed: report all changes together. The original
        // project files stay physically unchanged; applying the diff is the
        // caller's decision.
        let mut diff = String::new();
        for change in &changes {
            diff.push_str(&unified_diff(
                &change.path.to_string_lossy(),
                &change.original_text,
                &change.rewritten_text,
            ));
        }
        info!(
            strategy = refactorer.name(),
            files = changes.len(),
            baseline_cost,
            post_cost,
            "transaction committed"
        );
        let _ = state;

        Ok(TransactionOutcome::Committed {
            changes,
            baseline_cost,
            post_cost,
            unified_diff: diff,
            started_at,
        })
    }

    fn advance(&self, from: TxState, to: TxState) -> TxState {
        debug!(from = from.name(), to = to.name(), "transaction stage");
        to
    }
}

// ============================================================================
// Tests
// ============================================================================
