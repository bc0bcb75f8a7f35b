//! The smell data contract between detectors and refactorers.
//!
//! Detectors (external collaborators) are pure functions
//! `detect(file, tree, options) -> Vec<SmellRecord>`. A [`SmellRecord`] is
//! created by a detector, consumed read-only by a refactorer, and never
//! mutated after creation.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// Smell Kinds
// ============================================================================

/// The smell classes the engine knows a remediation for.
///
/// Each kind carries a stable symbol string used by detectors and by the
/// strategy registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SmellKind {
    /// Parameter list longer than the configured threshold.
    LongParameterList,
    /// Instance method that never reads or writes instance state.
    SelfIgnoringMethod,
    /// String concatenation onto an accumulator inside a loop.
    StringConcatInLoop,
    /// Call chain longer than the configured threshold.
    LongCallChain,
    /// The same sub-expression evaluated repeatedly.
    RepeatedCall,
    /// Code with no reachable effect.
    DeadCode,
}

impl SmellKind {
    /// Stable symbol identifier for this kind.
    pub fn symbol(&self) -> &'static str {
        match self {
            SmellKind::LongParameterList => "long-parameter-list",
            SmellKind::SelfIgnoringMethod => "self-ignoring-method",
            SmellKind::StringConcatInLoop => "string-concat-in-loop",
            SmellKind::LongCallChain => "long-call-chain",
            SmellKind::RepeatedCall => "repeated-call",
            SmellKind::DeadCode => "dead-code",
        }
    }

    /// Look up a kind from its symbol identifier.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "long-parameter-list" => Some(SmellKind::LongParameterList),
            "self-ignoring-method" => Some(SmellKind::SelfIgnoringMethod),
            "string-concat-in-loop" => Some(SmellKind::StringConcatInLoop),
            "long-call-chain" => Some(SmellKind::LongCallChain),
            "repeated-call" => Some(SmellKind::RepeatedCall),
            "dead-code" => Some(SmellKind::DeadCode),
            _ => None,
        }
    }
}

// ============================================================================
// Occurrences
// ============================================================================

/// One concrete source span where a smell manifests.
///
/// Lines and columns are 1-based; the span is half-open-inclusive the way
/// detectors report it. Multiple occurrences may belong to one record
/// (for example every repeated call site).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmellOccurrence {
    /// Start line (1-based).
    pub line: u32,
    /// End line (1-based).
    pub end_line: u32,
    /// Start column (1-based).
    pub column: u32,
    /// End column (1-based).
    pub end_column: u32,
}

impl SmellOccurrence {
    /// Occurrence spanning a single line from `column` to `end_column`.
    pub fn on_line(line: u32, column: u32, end_column: u32) -> Self {
        SmellOccurrence {
            line,
            end_line: line,
            column,
            end_column,
        }
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Smell-specific metadata payload produced by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SmellMetadata {
    /// Long parameter list: how many parameters were declared
    /// (excluding any receiver).
    ParameterList { parameter_count: usize },
    /// Self-ignoring method: its name and declaring class.
    SelfIgnoring {
        method_name: String,
        class_name: String,
    },
    /// Concatenation-in-loop: the accumulator expression (source text) and
    /// the 1-based line of its innermost enclosing loop.
    LoopConcat { target: String, loop_line: u32 },
    /// Repeated sub-expression: its source text and repetition count.
    RepeatedCall { call: String, count: usize },
    /// No payload.
    None,
}

// ============================================================================
// SmellRecord
// ============================================================================

/// A detected smell: the uniform contract between detectors and refactorers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmellRecord {
    /// Which smell class this is.
    pub kind: SmellKind,
    /// Human-readable description.
    pub message: String,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
    /// File the smell was detected in (project-root-relative).
    pub source_file: PathBuf,
    /// Enclosing class or function name, when the detector knows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enclosing_object: Option<String>,
    /// Every source span where the smell manifests.
    pub occurrences: Vec<SmellOccurrence>,
    /// Smell-specific payload.
    pub metadata: SmellMetadata,
}

impl SmellRecord {
    /// The primary occurrence (detectors always report at least one).
    pub fn primary_occurrence(&self) -> Option<&SmellOccurrence> {
        self.occurrences.first()
    }

    /// 1-based line of the primary occurrence, if any.
    pub fn line(&self) -> Option<u32> {
        self.primary_occurrence().map(|o| o.line)
    }
}

// ============================================================================
// Tests
// ============================================================================
