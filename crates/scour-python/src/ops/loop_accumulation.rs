//! String-concatenation-in-loop remediation.
//!
//! Concatenating onto an accumulator inside a loop is quadratic; the rewrite
//! collects the pieces in a list and joins once after the loop:
//!
//! - `acc += piece`            -> `acc.append(piece)`
//! - `acc = acc + piece`       -> `acc.append(piece)`
//! - `acc = piece + acc`       -> `acc.insert(0, piece)`
//! - `acc = a + acc + b`       -> `acc.insert(0, a)` then `acc.append(b)`
//! - `acc = ""` (reset)        -> `acc.clear()`
//! - `acc = other` (reseed)    -> `acc = [other]`
//!
//! The seed before the loop becomes a list, and exactly one
//! `acc = "".join(acc)` lands after the loop. A structural accumulator
//! (`self.buf`, `d[k]`) collects into a synthesized local list instead.

use std::path::Path;

use tracing::debug;
use tree_sitter::Node;

use scour_core::error::RefactorResult;
use scour_core::refactor::{RefactorContext, Refactorer};
use scour_core::smell::{SmellMetadata, SmellRecord};
use scour_core::text::{indentation_at, line_end_offset, line_start_offset};
use scour_core::workspace::ModifiedFile;

use crate::ops::{edit_error, parse_file};
use crate::resolve::enclosing_function;
use crate::tree::{node_line, walk, EditSet, SourceTree, Visit};

pub struct LoopAccumulationRefactorer;

// ============================================================================
// Loop and Expression Analysis
// ============================================================================

/// Innermost `for` / `while` starting on the given 1-based line.
fn find_loop_at<'t>(tree: &'t SourceTree, line: u32) -> Option<Node<'t>> {
    let mut best: Option<Node<'t>> = None;
    walk(tree.root(), &mut |node| {
        if (node.kind() == "for_statement" || node.kind() == "while_statement")
            && node_line(node) == line
            && best.is_none_or(|b| node.start_byte() > b.start_byte())
        {
            best = Some(node);
        }
        Visit::Continue
    });
    best
}

/// Flatten a `+` chain into its terms, left to right.
fn flatten_plus<'t>(tree: &'t SourceTree, node: Node<'t>, terms: &mut Vec<Node<'t>>) {
    if node.kind() == "binary_operator" {
        let op = node
            .child_by_field_name("operator")
            .map(|o| tree.node_text(o));
        if op == Some("+") {
            if let (Some(left), Some(right)) = (
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                flatten_plus(tree, left, terms);
                flatten_plus(tree, right, terms);
                return;
            }
        }
    }
    terms.push(node);
}

fn is_empty_string(tree: &SourceTree, node: Node<'_>) -> bool {
    node.kind() == "string" && matches!(tree.node_text(node), "\"\"" | "''")
}

fn is_identifier_name(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sanitized_list_name(target: &str) -> String {
    let cleaned: String = target
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_parts", cleaned.trim_matches('_'))
}

// ============================================================================
// Body Rewrites
// ============================================================================

enum BodyRewrite {
    /// Replace one statement with the given text.
    Replace(String),
    /// The statement mixes the accumulator into the expression in a shape
    /// the rewrite cannot express; the whole refactor is abandoned.
    Unsupported,
}

fn rewrite_statement(
    tree: &SourceTree,
    stmt: Node<'_>,
    target: &str,
    list_name: &str,
) -> Option<BodyRewrite> {
    match stmt.kind() {
        "augmented_assignment" => {
            let left = stmt.child_by_field_name("left")?;
            if tree.node_text(left) != target {
                return None;
            }
            let op = stmt.child_by_field_name("operator")?;
            if tree.node_text(op) != "+=" {
                return Some(BodyRewrite::Unsupported);
            }
            let right = stmt.child_by_field_name("right")?;
            Some(BodyRewrite::Replace(format!(
                "{}.append({})",
                list_name,
                tree.node_text(right)
            )))
        }
        "assignment" => {
            let left = stmt.child_by_field_name("left")?;
            if tree.node_text(left) != target {
                return None;
            }
            let right = stmt.child_by_field_name("right")?;
            let mut terms = Vec::new();
            flatten_plus(tree, right, &mut terms);

            let positions: Vec<usize> = terms
                .iter()
                .enumerate()
                .filter(|(_, t)| tree.node_text(**t) == target)
                .map(|(i, _)| i)
                .collect();

            let join =
                |nodes: &[Node<'_>]| -> String {
                    nodes
                        .iter()
                        .map(|n| tree.node_text(*n))
                        .collect::<Vec<_>>()
                        .join(" + ")
                };

            match positions.as_slice() {
                // Reset or reseed: the accumulator does not feed itself.
                [] => {
                    if terms.len() == 1 && is_empty_string(tree, terms[0]) {
                        Some(BodyRewrite::Replace(format!("{}.clear()", list_name)))
                    } else {
                        Some(BodyRewrite::Replace(format!(
                            "{} = [{}]",
                            list_name,
                            tree.node_text(right)
                        )))
                    }
                }
                [0] if terms.len() > 1 => Some(BodyRewrite::Replace(format!(
                    "{}.append({})",
                    list_name,
                    join(&terms[1..])
                ))),
                [last] if *last == terms.len() - 1 => Some(BodyRewrite::Replace(format!(
                    "{}.insert(0, {})",
                    list_name,
                    join(&terms[..terms.len() - 1])
                ))),
                [mid] => {
                    let indent = indentation_at(tree.text(), stmt.start_byte());
                    Some(BodyRewrite::Replace(format!(
                        "{}.insert(0, {})\n{}{}.append({})",
                        list_name,
                        join(&terms[..*mid]),
                        indent,
                        list_name,
                        join(&terms[*mid + 1..])
                    )))
                }
                // `acc = acc + x + acc` and friends.
                _ => Some(BodyRewrite::Unsupported),
            }
        }
        _ => None,
    }
}

// ============================================================================
// Refactorer
// ============================================================================

impl Refactorer for LoopAccumulationRefactorer {
    fn name(&self) -> &'static str {
        "join-loop-accumulation"
    }

    fn apply(
        &self,
        target_file: &Path,
        project_root: &Path,
        smell: &SmellRecord,
        _ctx: &RefactorContext,
    ) -> RefactorResult<Vec<ModifiedFile>> {
        let SmellMetadata::LoopConcat { target, loop_line } = &smell.metadata else {
            return Ok(vec![]);
        };

        let tree = parse_file(target_file)?;
        let Some(loop_node) = find_loop_at(&tree, *loop_line) else {
            debug!(line = loop_line, "no loop at smell line");
            return Ok(vec![]);
        };
        let Some(body) = loop_node.child_by_field_name("body") else {
            return Ok(vec![]);
        };

        let plain = is_identifier_name(target);
        let list_name = if plain {
            target.clone()
        } else {
            sanitized_list_name(target)
        };

        // Collect accumulator statements in the loop body. Nested scopes are
        // different variables; nested loops still feed the same accumulator.
        let mut rewrites: Vec<(Node<'_>, String)> = Vec::new();
        let mut unsupported = false;
        walk(body, &mut |node| {
            if node.kind() == "function_definition" || node.kind() == "class_definition" {
                return Visit::SkipChildren;
            }
            match rewrite_statement(&tree, node, target, &list_name) {
                Some(BodyRewrite::Replace(text)) => {
                    rewrites.push((node, text));
                    Visit::SkipChildren
                }
                Some(BodyRewrite::Unsupported) => {
                    unsupported = true;
                    Visit::SkipChildren
                }
                None => Visit::Continue,
            }
        });
        if unsupported {
            debug!(target = %target, "accumulation shape not rewritable");
            return Ok(vec![]);
        }
        let accumulates = rewrites
            .iter()
            .any(|(_, text)| text.contains(".append(") || text.contains(".insert(0,"));
        if !accumulates {
            return Ok(vec![]);
        }

        let mut edits = EditSet::new();
        for (node, text) in rewrites {
            edits.replace_node(node, text);
        }

        let loop_indent = indentation_at(tree.text(), loop_node.start_byte()).to_string();
        let loop_line_start = line_start_offset(tree.text(), loop_node.start_byte());

        if plain {
            let seed_right = find_seed(&tree, loop_node, target)
                .filter(|seed| {
                    !referenced_between(&tree, target, seed.end_byte(), loop_node.start_byte())
                })
                .and_then(|seed| seed.child_by_field_name("right"));
            match seed_right {
                Some(right) if is_empty_string(&tree, right) => {
                    edits.replace_node(right, "[]");
                }
                Some(right) => {
                    edits.replace_node(right, format!("[{}]", tree.node_text(right)));
                }
                // No seed, or the seed value is still read before the loop:
                // wrap the current value instead of disturbing it.
                None => {
                    edits.insert(
                        loop_line_start,
                        format!("{}{} = [{}]\n", loop_indent, target, target),
                    );
                }
            }
        } else {
            // The structural target keeps its seed assignment; the parts list
            // starts from whatever the target held. An empty-string seed
            // means the list can start empty.
            let seed_is_empty = find_seed(&tree, loop_node, target)
                .and_then(|seed| seed.child_by_field_name("right"))
                .is_some_and(|right| is_empty_string(&tree, right));
            let init = if seed_is_empty {
                "[]".to_string()
            } else {
                format!("[{}]", target)
            };
            edits.insert(
                loop_line_start,
                format!("{}{} = {}\n", loop_indent, list_name, init),
            );
        }

        // Exactly one join, on the line after the loop.
        let mut join_at = line_end_offset(tree.text(), loop_node.end_byte() - 1);
        let mut join_text = format!(
            "{}{} = \"\".join({})\n",
            loop_indent, target, list_name
        );
        if join_at == tree.text().len() && !tree.text().ends_with('\n') {
            join_text.insert(0, '\n');
            join_at = tree.text().len();
        }
        edits.insert(join_at, join_text);

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

/// Nearest assignment to the accumulator before the loop, in the loop's
/// enclosing scope.
fn find_seed<'t>(tree: &'t SourceTree, loop_node: Node<'t>, target: &str) -> Option<Node<'t>> {
    let scope_root = enclosing_function(loop_node)
        .and_then(|f| f.child_by_field_name("body"))
        .unwrap_or_else(|| tree.root());

    let mut best: Option<Node<'t>> = None;
    walk(scope_root, &mut |node| {
        if (node.kind() == "function_definition" || node.kind() == "class_definition")
            && node != scope_root
        {
            return Visit::SkipChildren;
        }
        if node.kind() == "assignment"
            && node.end_byte() <= loop_node.start_byte()
            && node
                .child_by_field_name("left")
                .is_some_and(|l| tree.node_text(l) == target)
            && best.is_none_or(|b| node.start_byte() > b.start_byte())
        {
            best = Some(node);
        }
        Visit::Continue
    });
    best
}

/// Whether the accumulator is read anywhere in the byte range between its
/// seed and the loop.
fn referenced_between(tree: &SourceTree, target: &str, start: usize, end: usize) -> bool {
    let mut referenced = false;
    walk(tree.root(), &mut |node| {
        if node.kind() == "identifier"
            && node.start_byte() >= start
            && node.end_byte() <= end
            && tree.node_text(node) == target
        {
            referenced = true;
        }
        Visit::Continue
    });
    referenced
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scour_core::smell::{SmellKind, SmellOccurrence};
    use std::fs;
    use std::path::PathBuf;

    fn smell(target: &str, loop_line: u32) -> SmellRecord {
        SmellRecord {
            kind: SmellKind::StringConcatInLoop,
            message: "string concatenation in loop".to_string(),
            confidence: 0.9,
            source_file: PathBuf::from("main.py"),
            enclosing_object: None,
            occurrences: vec![SmellOccurrence::on_line(loop_line + 1, 9, 20)],
            metadata: SmellMetadata::LoopConcat {
                target: target.to_string(),
                loop_line,
            },
        }
    }

    fn run_on(source: &str, target: &str, loop_line: u32) -> Vec<ModifiedFile> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), source).unwrap();
        LoopAccumulationRefactorer
            .apply(
                &dir.path().join("main.py"),
                dir.path(),
                &smell(target, loop_line),
                &RefactorContext::default(),
            )
            .unwrap()
    }

    #[test]
    fn augmented_concat_becomes_append_and_join() {
        let source = "def build(items):\n    s = \"\"\n    for item in items:\n        s += str(item)\n    return s\n";
        let modified = run_on(source, "s", 3);
        assert_eq!(modified.len(), 1);
        let expected = "def build(items):\n    s = []\n    for item in items:\n        s.append(str(item))\n    s = \"\".join(s)\n    return s\n";
        assert_eq!(modified[0].new_text, expected);
    }

    #[test]
    fn self_concat_becomes_append() {
        let source = "def build(items):\n    s = \"\"\n    for item in items:\n        s = s + str(item) + \",\"\n    return s\n";
        let modified = run_on(source, "s", 3);
        assert!(modified[0]
            .new_text
            .contains("s.append(str(item) + \",\")"));
    }

    #[test]
    fn prefix_concat_becomes_insert() {
        let source = "def build(items):\n    s = \"\"\n    for item in items:\n        s = str(item) + s\n    return s\n";
        let modified = run_on(source, "s", 3);
        assert!(modified[0].new_text.contains("s.insert(0, str(item))"));
    }

    #[test]
    fn two_sided_concat_splits_into_insert_and_append() {
        let source = "def build(items):\n    s = \"\"\n    for item in items:\n        s = \"<\" + s + \">\"\n    return s\n";
        let modified = run_on(source, "s", 3);
        let text = &modified[0].new_text;
        assert!(text.contains("s.insert(0, \"<\")\n        s.append(\">\")"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn reset_in_loop_becomes_clear() {
        let source = "def build(items):\n    s = \"\"\n    for item in items:\n        s += str(item)\n        if len(s) > 80:\n            s = \"\"\n    return s\n";
        let modified = run_on(source, "s", 3);
        let text = &modified[0].new_text;
        assert!(text.contains("s.clear()"));
        assert!(text.contains("s.append(str(item))"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn nonempty_seed_is_wrapped() {
        let source = "def build(items, prefix):\n    s = prefix\n    for item in items:\n        s += str(item)\n    return s\n";
        let modified = run_on(source, "s", 3);
        assert!(modified[0].new_text.contains("s = [prefix]"));
    }

    #[test]
    fn seed_read_before_loop_is_preserved() {
        let source = "def build(items):\n    s = \"\"\n    print(s)\n    for item in items:\n        s += str(item)\n    return s\n";
        let modified = run_on(source, "s", 4);
        let text = &modified[0].new_text;
        // Seed stays a string for the read; the list wraps it at the loop.
        assert!(text.contains("s = \"\"\n    print(s)\n    s = [s]\n    for item in items:"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn structural_accumulator_uses_a_parts_list() {
        let source = "class Buf:\n    def fill(self, items):\n        self.text = \"\"\n        for item in items:\n            self.text += str(item)\n";
        let modified = run_on(source, "self.text", 4);
        let text = &modified[0].new_text;
        assert!(text.contains("self_text_parts = []\n        for item in items:"));
        assert!(text.contains("self_text_parts.append(str(item))"));
        assert!(text.contains("self.text = \"\".join(self_text_parts)"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn structural_accumulator_keeps_prior_content() {
        // The attribute already holds "header"; the parts list must start
        // from it, not from empty.
        let source = "class Buf:\n    def fill(self, items):\n        self.text = \"header\"\n        for item in items:\n            self.text += str(item)\n";
        let modified = run_on(source, "self.text", 4);
        let text = &modified[0].new_text;
        assert!(text.contains("self.text = \"header\"\n"));
        assert!(text.contains("self_text_parts = [self.text]\n        for item in items:"));
        assert!(text.contains("self.text = \"\".join(self_text_parts)"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn no_loop_at_line_is_not_applicable() {
        let source = "def f():\n    return 1\n";
        assert!(run_on(source, "s", 1).is_empty());
    }

    #[test]
    fn non_concat_loop_is_not_applicable() {
        let source = "def f(items):\n    s = \"\"\n    for item in items:\n        s = str(item)\n    return s\n";
        assert!(run_on(source, "s", 3).is_empty());
    }

    #[test]
    fn unsupported_shape_is_abandoned() {
        // The accumulator feeds itself twice; no faithful list rewrite.
        let source = "def f(items):\n    s = \"\"\n    for item in items:\n        s = s + str(item) + s\n    return s\n";
        assert!(run_on(source, "s", 3).is_empty());
    }

    #[test]
    fn while_loops_are_handled() {
        let source = "def f(n):\n    s = \"\"\n    while n > 0:\n        s += \"x\"\n        n -= 1\n    return s\n";
        let modified = run_on(source, "s", 3);
        let text = &modified[0].new_text;
        assert!(text.contains("s.append(\"x\")"));
        assert!(text.contains("s = \"\".join(s)"));
        // The unrelated augmented assignment is untouched.
        assert!(text.contains("n -= 1"));
        SourceTree::parse(text.as_str()).unwrap();
    }
}
