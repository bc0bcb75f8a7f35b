//! Addressable parse-tree model over `tree-sitter-python`.
//!
//! The model is immutable-by-default: rewriting is expressed as a batch of
//! span edits applied in one pass, producing a *new* tree (reparse), never a
//! destructive mutation shared across readers. Unparsing an unmodified tree
//! returns the original text byte-for-byte.

use std::fmt;

use thiserror::Error;
use tree_sitter::{Node, Parser};

// ============================================================================
// Spans
// ============================================================================

/// Half-open byte span into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Span { start, end }
    }

    /// Span covering a node.
    pub fn of(node: Node<'_>) -> Self {
        Span {
            start: node.start_byte(),
            end: node.end_byte(),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// 1-based start line of a node.
pub fn node_line(node: Node<'_>) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based line one past the node's last line.
pub fn node_end_line(node: Node<'_>) -> u32 {
    node.end_position().row as u32 + 1
}

// ============================================================================
// Errors
// ============================================================================

/// Malformed source: the parse produced error nodes.
#[derive(Debug, Error)]
#[error("syntax error at {line}:{column}")]
pub struct ParseError {
    /// 1-based line of the first error node.
    pub line: u32,
    /// 1-based column of the first error node.
    pub column: u32,
}

/// Error applying an edit batch.
#[derive(Debug, Error)]
pub enum EditError {
    /// Two edits overlap; the batch is rejected as a whole.
    #[error("overlapping edits at byte {offset}")]
    Overlap { offset: usize },

    /// An edit span falls outside the text.
    #[error("edit span {span} exceeds text length {len}")]
    OutOfBounds { span: Span, len: usize },

    /// The edited text no longer parses.
    #[error(transparent)]
    Reparse(#[from] ParseError),
}

// ============================================================================
// Source Tree
// ============================================================================

/// A parsed source file: owns its text and the derived tree.
#[derive(Debug)]
pub struct SourceTree {
    text: String,
    tree: tree_sitter::Tree,
}

impl SourceTree {
    /// Parse Python source. A tree containing error nodes is reported as a
    /// `ParseError` carrying the position of the first error.
    pub fn parse(text: impl Into<String>) -> Result<Self, ParseError> {
        let text = text.into();
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|_| ParseError { line: 1, column: 1 })?;
        let tree = parser.parse(&text, None).ok_or(ParseError { line: 1, column: 1 })?;

        if tree.root_node().has_error() {
            let (line, column) = first_error_position(tree.root_node());
            return Err(ParseError { line, column });
        }

        Ok(SourceTree { text, tree })
    }

    /// The source text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Position-preserving unparse. For an unmodified tree this is the
    /// original text, byte-for-byte.
    pub fn unparse(&self) -> &str {
        &self.text
    }

    /// Root node (kind `module`).
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of a node.
    pub fn node_text(&self, node: Node<'_>) -> &str {
        &self.text[node.start_byte()..node.end_byte()]
    }

    /// Apply an edit batch, producing a new tree. The original is untouched,
    /// so before/after trees can be diffed side by side.
    pub fn apply(&self, edits: &EditSet) -> Result<SourceTree, EditError> {
        let new_text = edits.apply_to(&self.text)?;
        Ok(SourceTree::parse(new_text)?)
    }
}

fn first_error_position(root: Node<'_>) -> (u32, u32) {
    let mut found: Option<(u32, u32)> = None;
    walk(root, &mut |node| {
        if found.is_some() {
            return Visit::SkipChildren;
        }
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            found = Some((pos.row as u32 + 1, pos.column as u32 + 1));
            return Visit::SkipChildren;
        }
        Visit::Continue
    });
    found.unwrap_or((1, 1))
}

// ============================================================================
// Traversal
// ============================================================================

/// Visitor verdict for [`walk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    SkipChildren,
}

/// Pre-order traversal. The visitor may skip a subtree but never mutates;
/// edits are collected separately into an [`EditSet`].
pub fn walk<'t>(node: Node<'t>, visitor: &mut dyn FnMut(Node<'t>) -> Visit) {
    if visitor(node) == Visit::SkipChildren {
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, visitor);
    }
}

/// Nearest ancestor matching a kind.
pub fn ancestor_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    let mut current = node.parent();
    while let Some(n) = current {
        if n.kind() == kind {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

// ============================================================================
// Edit Batches
// ============================================================================

/// One span replacement. Insertions are zero-width spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub text: String,
}

/// A batch of edits applied in a single pass, sorted by descending source
/// offset so earlier edits never invalidate later offsets.
#[derive(Debug, Default, Clone)]
pub struct EditSet {
    edits: Vec<TextEdit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a span with new text.
    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.push(TextEdit {
            span,
            text: text.into(),
        });
    }

    /// Replace a node with new text.
    pub fn replace_node(&mut self, node: Node<'_>, text: impl Into<String>) {
        self.replace(Span::of(node), text);
    }

    /// Insert text at an offset.
    pub fn insert(&mut self, offset: usize, text: impl Into<String>) {
        self.replace(Span::new(offset, offset), text);
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Apply the batch to a text. Overlapping edits are rejected; adjacent
    /// edits and multiple insertions at distinct offsets are fine.
    pub fn apply_to(&self, text: &str) -> Result<String, EditError> {
        let mut ordered: Vec<&TextEdit> = self.edits.iter().collect();
        // Descending by start; at equal start, wider span first so a
        // zero-width insert at a replaced span's start is caught as overlap.
        ordered.sort_by(|a, b| {
            b.span
                .start
                .cmp(&a.span.start)
                .then(b.span.end.cmp(&a.span.end))
        });

        for edit in &ordered {
            if edit.span.end > text.len() || edit.span.start > edit.span.end {
                return Err(EditError::OutOfBounds {
                    span: edit.span,
                    len: text.len(),
                });
            }
        }
        for pair in ordered.windows(2) {
            // pair[0] starts at or after pair[1]; they overlap when pair[1]
            // extends past pair[0]'s start (zero-width inserts at the same
            // offset also collide).
            let later = pair[0];
            let earlier = pair[1];
            if earlier.span.end > later.span.start
                || (earlier.span.start == later.span.start && earlier.span.is_empty())
            {
                return Err(EditError::Overlap {
                    offset: later.span.start,
                });
            }
        }

        let mut result = text.to_string();
        for edit in ordered {
            result.replace_range(edit.span.start..edit.span.end, &edit.text);
        }
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
