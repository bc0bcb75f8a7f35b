//! Concrete refactoring strategies and their shared plumbing.
//!
//! Each strategy is one file implementing [`Refactorer`] for one smell kind.
//! [`default_registry`] wires the full set; hosts that want a subset build
//! their own registry.

use std::fs;
use std::path::Path;

use scour_core::error::{RefactorError, RefactorResult};
use scour_core::refactor::RefactorerRegistry;
use scour_core::smell::SmellKind;

use crate::tree::{node_line, walk, EditError, SourceTree, Visit};
use tree_sitter::Node;

pub mod chain_split;
pub mod loop_accumulation;
pub mod parameter_list;
pub mod static_method;

pub use chain_split::ChainSplitRefactorer;
pub use loop_accumulation::LoopAccumulationRefactorer;
pub use parameter_list::ParameterListRefactorer;
pub use static_method::StaticMethodRefactorer;

// ============================================================================
// Registry
// ============================================================================

/// Registry with every built-in strategy wired to its smell kind.
pub fn default_registry() -> RefactorerRegistry {
    let mut registry = RefactorerRegistry::new();
    registry.register(
        SmellKind::LongParameterList,
        Box::new(ParameterListRefactorer),
    );
    registry.register(
        SmellKind::SelfIgnoringMethod,
        Box::new(StaticMethodRefactorer),
    );
    registry.register(
        SmellKind::StringConcatInLoop,
        Box::new(LoopAccumulationRefactorer),
    );
    registry.register(SmellKind::LongCallChain, Box::new(ChainSplitRefactorer));
    registry
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Read and parse a Python file, bridging errors into the refactor taxonomy.
pub(crate) fn parse_file(path: &Path) -> RefactorResult<SourceTree> {
    let text = fs::read_to_string(path)?;
    SourceTree::parse(text)
        .map_err(|e| RefactorError::parse(path.display().to_string(), e.to_string()))
}

/// Bridge an edit-batch failure on a known file.
pub(crate) fn edit_error(path: &Path, err: EditError) -> RefactorError {
    match err {
        EditError::Reparse(e) => {
            RefactorError::parse(path.display().to_string(), e.to_string())
        }
        other => RefactorError::edit(other.to_string()),
    }
}

/// Innermost function definition whose `def` sits on the given 1-based line.
/// Decorated definitions also match on the decoration's first line.
pub(crate) fn find_function_at<'t>(tree: &'t SourceTree, line: u32) -> Option<Node<'t>> {
    let mut best: Option<Node<'t>> = None;
    walk(tree.root(), &mut |node| {
        if node.kind() != "function_definition" {
            return Visit::Continue;
        }
        let decorated_line = node
            .parent()
            .filter(|p| p.kind() == "decorated_definition")
            .map(node_line);
        if node_line(node) == line || decorated_line == Some(line) {
            if best.is_none_or(|b| node.start_byte() > b.start_byte()) {
                best = Some(node);
            }
        }
        Visit::Continue
    });
    best
}

/// The statement directly under the module root that contains `node`
/// (the node itself when it is already top-level).
pub(crate) fn top_level_statement<'t>(tree: &'t SourceTree, node: Node<'t>) -> Node<'t> {
    let mut current = node;
    while let Some(parent) = current.parent() {
        if parent == tree.root() {
            return current;
        }
        current = parent;
    }
    current
}

/// Byte offset where a new import line belongs: after the last top-level
/// import, else after the module docstring, else at the top of the file.
pub(crate) fn import_insertion_offset(tree: &SourceTree) -> usize {
    let root = tree.root();
    let mut offset = 0usize;
    let mut seen_docstring = false;

    let mut cursor = root.walk();
    for stmt in root.named_children(&mut cursor) {
        match stmt.kind() {
            "import_statement" | "import_from_statement" | "future_import_statement" => {
                offset = scour_core::text::line_end_offset(tree.text(), stmt.end_byte() - 1);
            }
            "expression_statement" => {
                let is_docstring = !seen_docstring
                    && offset == 0
                    && stmt
                        .named_child(0)
                        .is_some_and(|child| child.kind() == "string");
                seen_docstring = true;
                if !is_docstring {
                    break;
                }
                offset = scour_core::text::line_end_offset(tree.text(), stmt.end_byte() - 1);
            }
            "comment" => {}
            _ => break,
        }
    }
    offset
}

/// Dotted module path for a project-root-relative Python file.
/// `pkg/sub/mod.py` becomes `pkg.sub.mod`; a trailing `__init__` is dropped.
pub(crate) fn module_path_for(relative: &Path) -> String {
    let mut parts: Vec<String> = relative
        .with_extension("")
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.last().is_some_and(|p| p == "__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// A call whose callee is `<object>.<name>(...)`, split into parts.
pub(crate) fn attribute_call_parts<'t>(
    tree: &'t SourceTree,
    call: Node<'t>,
) -> Option<(Node<'t>, &'t str)> {
    let function = call.child_by_field_name("function")?;
    if function.kind() != "attribute" {
        return None;
    }
    let object = function.child_by_field_name("object")?;
    let attribute = function.child_by_field_name("attribute")?;
    Some((object, tree.node_text(attribute)))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_builtin_kinds() {
        let registry = default_registry();
        assert_eq!(registry.len(), 4);
        assert!(registry.get(SmellKind::LongParameterList).is_some());
        assert!(registry.get(SmellKind::SelfIgnoringMethod).is_some());
        assert!(registry.get(SmellKind::StringConcatInLoop).is_some());
        assert!(registry.get(SmellKind::LongCallChain).is_some());
        assert!(registry.get(SmellKind::DeadCode).is_none());
    }

    #[test]
    fn finds_function_by_def_line() {
        let tree =
            SourceTree::parse("def outer():\n    def inner():\n        pass\n    pass\n").unwrap();
        let outer = find_function_at(&tree, 1).unwrap();
        assert_eq!(node_line(outer), 1);
        let inner = find_function_at(&tree, 2).unwrap();
        assert_eq!(node_line(inner), 2);
        assert!(find_function_at(&tree, 9).is_none());
    }

    #[test]
    fn decorated_function_matches_decorator_line() {
        let tree = SourceTree::parse("@wraps\ndef f():\n    pass\n").unwrap();
        let f = find_function_at(&tree, 1).unwrap();
        assert_eq!(node_line(f), 2);
    }

    #[test]
    fn import_offset_after_imports() {
        let tree = SourceTree::parse("import os\nfrom sys import path\n\nx = 1\n").unwrap();
        let offset = import_insertion_offset(&tree);
        assert_eq!(&tree.text()[..offset], "import os\nfrom sys import path\n");
    }

    #[test]
    fn import_offset_after_docstring() {
        let tree = SourceTree::parse("\"\"\"doc\"\"\"\n\nx = 1\n").unwrap();
        let offset = import_insertion_offset(&tree);
        assert_eq!(&tree.text()[..offset], "\"\"\"doc\"\"\"\n");
    }

    #[test]
    fn import_offset_defaults_to_top() {
        let tree = SourceTree::parse("x = 1\nimport late\n").unwrap();
        assert_eq!(import_insertion_offset(&tree), 0);
    }

    #[test]
    fn module_paths() {
        assert_eq!(module_path_for(Path::new("pkg/sub/mod.py")), "pkg.sub.mod");
        assert_eq!(module_path_for(Path::new("pkg/__init__.py")), "pkg");
        assert_eq!(module_path_for(Path::new("main.py")), "main");
    }
}
