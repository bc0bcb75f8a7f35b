//! Long-call-chain remediation.
//!
//! A statement-level chain `a.b().c().d().e()` longer than the configured
//! threshold is split into sequential temporaries:
//!
//! ```text
//! _chain_5_0 = a.b()
//! _chain_5_1 = _chain_5_0.c()
//! _chain_5_2 = _chain_5_1.d()
//! result = _chain_5_2.e()
//! ```
//!
//! Only bare-expression and simple-assignment statements are split; a chain
//! embedded in a larger expression (condition, argument, return value) has
//! no statement position to unfold into and is left alone.

use std::path::Path;

use tracing::debug;
use tree_sitter::Node;

use scour_core::error::RefactorResult;
use scour_core::refactor::{RefactorContext, Refactorer};
use scour_core::smell::SmellRecord;
use scour_core::text::indentation_at;
use scour_core::workspace::ModifiedFile;

use crate::ops::{edit_error, parse_file};
use crate::tree::{node_line, walk, EditSet, SourceTree, Visit};

pub struct ChainSplitRefactorer;

// ============================================================================
// Chain Decomposition
// ============================================================================

struct Chain<'t> {
    /// The expression the chain hangs off, as source text.
    base: &'t str,
    /// `.method(args)` links, innermost first.
    links: Vec<(String, String)>,
}

/// Decompose a call into its `.method(args)` spine. Only uninterrupted
/// call-attribute spines count as links.
fn decompose<'t>(tree: &'t SourceTree, call: Node<'t>) -> Chain<'t> {
    let mut links = Vec::new();
    let mut current = call;
    loop {
        let function = current.child_by_field_name("function");
        let arguments = current.child_by_field_name("arguments");
        let (Some(function), Some(arguments)) = (function, arguments) else {
            break;
        };
        if function.kind() != "attribute" {
            break;
        }
        let (Some(object), Some(attribute)) = (
            function.child_by_field_name("object"),
            function.child_by_field_name("attribute"),
        ) else {
            break;
        };
        links.push((
            tree.node_text(attribute).to_string(),
            tree.node_text(arguments).to_string(),
        ));
        if object.kind() == "call" {
            current = object;
        } else {
            links.reverse();
            return Chain {
                base: tree.node_text(object),
                links,
            };
        }
    }
    links.reverse();
    Chain {
        base: tree.node_text(current),
        links,
    }
}

// ============================================================================
// Refactorer
// ============================================================================

impl Refactorer for ChainSplitRefactorer {
    fn name(&self) -> &'static str {
        "split-call-chain"
    }

    fn apply(
        &self,
        target_file: &Path,
        project_root: &Path,
        smell: &SmellRecord,
        ctx: &RefactorContext,
    ) -> RefactorResult<Vec<ModifiedFile>> {
        let Some(line) = smell.line() else {
            return Ok(vec![]);
        };
        let tree = parse_file(target_file)?;

        let mut statement: Option<Node<'_>> = None;
        walk(tree.root(), &mut |node| {
            if statement.is_some() {
                return Visit::SkipChildren;
            }
            if node.kind() == "expression_statement" && node_line(node) == line {
                statement = Some(node);
                return Visit::SkipChildren;
            }
            Visit::Continue
        });
        let Some(statement) = statement else {
            debug!(line, "no statement at smell line");
            return Ok(vec![]);
        };

        // Bare chain, or `lhs = chain` with a simple target.
        let Some(inner) = statement.named_child(0) else {
            return Ok(vec![]);
        };
        let (lhs, call) = match inner.kind() {
            "call" => (None, inner),
            "assignment" => {
                let (Some(left), Some(right)) = (
                    inner.child_by_field_name("left"),
                    inner.child_by_field_name("right"),
                ) else {
                    return Ok(vec![]);
                };
                if right.kind() != "call" {
                    return Ok(vec![]);
                }
                (Some(tree.node_text(left)), right)
            }
            _ => return Ok(vec![]),
        };

        let chain = decompose(&tree, call);
        if chain.links.len() <= ctx.chain_threshold {
            return Ok(vec![]);
        }

        let indent = indentation_at(tree.text(), statement.start_byte());
        let mut lines: Vec<String> = Vec::new();
        let mut receiver = chain.base.to_string();
        let last = chain.links.len() - 1;
        for (i, (method, args)) in chain.links.iter().enumerate() {
            let call_text = format!("{}.{}{}", receiver, method, args);
            if i == last {
                match lhs {
                    Some(left) => lines.push(format!("{} = {}", left, call_text)),
                    None => lines.push(call_text),
                }
            } else {
                let temp = format!("_chain_{}_{}", line, i);
                lines.push(format!("{} = {}", temp, call_text));
                receiver = temp;
            }
        }

        let mut edits = EditSet::new();
        edits.replace_node(statement, lines.join(&format!("\n{}", indent)));
        let new_text = edits
            .apply_to(tree.text())
            .map_err(|e| edit_error(target_file, e))?;

        let rel = target_file
            .strip_prefix(project_root)
            .unwrap_or(target_file)
            .to_path_buf();
        Ok(vec![ModifiedFile::new(rel, new_text)])
    }
}

// ============================================================================
// Tests
// ============================================================================
