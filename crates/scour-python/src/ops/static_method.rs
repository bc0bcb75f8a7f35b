//! Self-ignoring-method remediation.
//!
//! A method that never touches instance state becomes a `@staticmethod`:
//! the decorator is inserted, the receiver parameter is removed, and every
//! call site whose receiver provably resolves to a valid class is rewritten
//! from `obj.m(args)` to `Class.m(args)`.
//!
//! The valid-receiver set is the declaring class plus every subclass that
//! does not override the method; a receiver resolving to an overriding
//! subclass (or to nothing at all) leaves the call byte-identical.

use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::Node;

use scour_core::error::RefactorResult;
use scour_core::refactor::{RefactorContext, Refactorer};
use scour_core::smell::{SmellMetadata, SmellRecord};
use scour_core::text::{indentation_at, line_start_offset};
use scour_core::walker::ProjectWalker;
use scour_core::workspace::ModifiedFile;

use crate::facts::ClassHierarchy;
use crate::ops::{attribute_call_parts, edit_error, parse_file};
use crate::resolve::{resolve_receiver, TypeResolution};
use crate::tree::{walk, EditSet, SourceTree, Span, Visit};

pub struct StaticMethodRefactorer;

// ============================================================================
// Definition-Side Edits
// ============================================================================

/// The method definition for `class_name.method_name`, if present.
fn find_method<'t>(
    tree: &'t SourceTree,
    class_name: &str,
    method_name: &str,
) -> Option<Node<'t>> {
    let mut found = None;
    walk(tree.root(), &mut |node| {
        if found.is_some() {
            return Visit::SkipChildren;
        }
        if node.kind() != "class_definition" {
            return Visit::Continue;
        }
        let matches = node
            .child_by_field_name("name")
            .is_some_and(|n| tree.node_text(n) == class_name);
        if !matches {
            return Visit::Continue;
        }
        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            for stmt in body.named_children(&mut cursor) {
                let def = match stmt.kind() {
                    "function_definition" => Some(stmt),
                    "decorated_definition" => stmt
                        .child_by_field_name("definition")
                        .filter(|d| d.kind() == "function_definition"),
                    _ => None,
                };
                if let Some(def) = def {
                    let named = def
                        .child_by_field_name("name")
                        .is_some_and(|n| tree.node_text(n) == method_name);
                    if named {
                        found = Some(def);
                        return Visit::SkipChildren;
                    }
                }
            }
        }
        Visit::Continue
    });
    found
}

fn already_static(tree: &SourceTree, def: Node<'_>) -> bool {
    let Some(decorated) = def.parent().filter(|p| p.kind() == "decorated_definition") else {
        return false;
    };
    let mut cursor = decorated.walk();
    let is_static = decorated
        .named_children(&mut cursor)
        .any(|child| child.kind() == "decorator" && tree.node_text(child) == "@staticmethod");
    is_static
}

/// Span removing the receiver parameter: up to the following parameter's
/// start when one exists (eating the comma), otherwise the receiver alone.
fn receiver_removal_span(def: Node<'_>, tree: &SourceTree) -> Option<Span> {
    let params = def.child_by_field_name("parameters")?;
    let mut cursor = params.walk();
    let named: Vec<Node<'_>> = params.named_children(&mut cursor).collect();
    let first = named.first()?;
    if first.kind() != "identifier" {
        return None;
    }
    let name = tree.node_text(*first);
    if name != "self" && name != "cls" {
        return None;
    }
    match named.get(1) {
        Some(second) => Some(Span::new(first.start_byte(), second.start_byte())),
        None => Some(Span::of(*first)),
    }
}

// ============================================================================
// Call-Site Rewriting
// ============================================================================

/// Rewrite `obj.method(...)` receivers to the resolved class name wherever
/// resolution lands in the valid set. Returns the number of calls changed.
fn rewrite_receivers(
    tree: &SourceTree,
    method_name: &str,
    valid: &std::collections::BTreeSet<String>,
    hierarchy: &ClassHierarchy,
    edits: &mut EditSet,
) -> usize {
    let mut changed = 0usize;
    walk(tree.root(), &mut |node| {
        if node.kind() != "call" {
            return Visit::Continue;
        }
        let Some((object, method)) = attribute_call_parts(tree, node) else {
            return Visit::Continue;
        };
        if method != method_name {
            return Visit::Continue;
        }
        let TypeResolution::Resolved(class) = resolve_receiver(tree, object, hierarchy) else {
            return Visit::Continue;
        };
        if !valid.contains(&class) || tree.node_text(object) == class {
            return Visit::Continue;
        }
        edits.replace_node(object, class);
        changed += 1;
        Visit::Continue
    });
    changed
}

// ============================================================================
// Refactorer
// ============================================================================

impl Refactorer for StaticMethodRefactorer {
    fn name(&self) -> &'static str {
        "promote-static-method"
    }

    fn apply(
        &self,
        target_file: &Path,
        project_root: &Path,
        smell: &SmellRecord,
        ctx: &RefactorContext,
    ) -> RefactorResult<Vec<ModifiedFile>> {
        let SmellMetadata::SelfIgnoring {
            method_name,
            class_name,
        } = &smell.metadata
        else {
            return Ok(vec![]);
        };

        let tree = parse_file(target_file)?;
        let Some(def) = find_method(&tree, class_name, method_name) else {
            debug!(class = %class_name, method = %method_name, "method not found");
            return Ok(vec![]);
        };
        if already_static(&tree, def) {
            return Ok(vec![]);
        }
        let Some(receiver_span) = receiver_removal_span(def, &tree) else {
            return Ok(vec![]);
        };

        let hierarchy = ClassHierarchy::scan(project_root, &ctx.ignore_patterns)?;
        let valid = hierarchy.valid_receivers(class_name, method_name);

        let mut target_edits = EditSet::new();
        let def_line_start = line_start_offset(tree.text(), def.start_byte());
        let indent = indentation_at(tree.text(), def.start_byte());
        target_edits.insert(def_line_start, format!("{}@staticmethod\n", indent));
        target_edits.replace(receiver_span, "");
        rewrite_receivers(&tree, method_name, &valid, &hierarchy, &mut target_edits);

        let target_text = target_edits
            .apply_to(tree.text())
            .map_err(|e| edit_error(target_file, e))?;
        let target_rel = target_file
            .strip_prefix(project_root)
            .unwrap_or(target_file)
            .to_path_buf();

        let mut modified = vec![ModifiedFile::new(target_rel.clone(), target_text)];

        let walker = ProjectWalker::with_patterns(project_root, &ctx.ignore_patterns)
            .map_err(|e| scour_core::error::RefactorError::internal(e.to_string()))?
            .with_extension("py");
        for file in walker.files() {
            let rel: PathBuf = file
                .strip_prefix(project_root)
                .unwrap_or(&file)
                .to_path_buf();
            if rel == target_rel {
                continue;
            }
            let other = match parse_file(&file) {
                Ok(t) => t,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping unparseable file");
                    continue;
                }
            };
            let mut edits = EditSet::new();
            let changed = rewrite_receivers(&other, method_name, &valid, &hierarchy, &mut edits);
            if changed == 0 {
                continue;
            }
            let new_text = edits.apply_to(other.text()).map_err(|e| edit_error(&file, e))?;
            modified.push(ModifiedFile::new(rel, new_text));
        }

        Ok(modified)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use scour_core::smell::{SmellKind, SmellOccurrence};
    use std::fs;

    fn smell(class_name: &str, method_name: &str, line: u32) -> SmellRecord {
        SmellRecord {
            kind: SmellKind::SelfIgnoringMethod,
            message: format!("{}.{} ignores self", class_name, method_name),
            confidence: 0.9,
            source_file: PathBuf::from("main.py"),
            enclosing_object: Some(class_name.to_string()),
            occurrences: vec![SmellOccurrence::on_line(line, 1, 1)],
            metadata: SmellMetadata::SelfIgnoring {
                method_name: method_name.to_string(),
                class_name: class_name.to_string(),
            },
        }
    }

    fn run_on(
        files: &[(&str, &str)],
        target: &str,
        class_name: &str,
        method_name: &str,
    ) -> (tempfile::TempDir, Vec<ModifiedFile>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in files {
            fs::write(dir.path().join(name), text).unwrap();
        }
        let modified = StaticMethodRefactorer
            .apply(
                &dir.path().join(target),
                dir.path(),
                &smell(class_name, method_name, 2),
                &RefactorContext::default(),
            )
            .unwrap();
        (dir, modified)
    }

    #[test]
    fn inserts_decorator_and_drops_receiver() {
        let source = "class Calc:\n    def double(self, x):\n        return x * 2\n\n\nc = Calc()\nprint(c.double(5))\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "Calc", "double");
        assert_eq!(modified.len(), 1);
        let text = &modified[0].new_text;
        assert!(text.contains("    @staticmethod\n    def double(x):"));
        assert!(text.contains("print(Calc.double(5))"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn receiver_only_signature_becomes_empty() {
        let source = "class Calc:\n    def version(self):\n        return 3\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "Calc", "version");
        let text = &modified[0].new_text;
        assert!(text.contains("def version():"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn overriding_subclass_receivers_stay_untouched() {
        // B overrides m so b.m() must keep dynamic dispatch; C inherits, so
        // c.m() can be pinned to C.m().
        let source = "class A:\n    def m(self, x):\n        return x\n\nclass B(A):\n    def m(self, x):\n        return -x\n\nclass C(A):\n    pass\n\n\nb = B()\nb.m(1)\nc = C()\nc.m(2)\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "A", "m");
        let text = &modified[0].new_text;
        assert!(text.contains("b.m(1)"));
        assert!(text.contains("C.m(2)"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn unresolved_receivers_stay_untouched() {
        let source =
            "class Calc:\n    def double(self, x):\n        return x * 2\n\n\nmystery.double(7)\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "Calc", "double");
        assert!(modified[0].new_text.contains("mystery.double(7)"));
    }

    #[test]
    fn already_static_is_not_applicable() {
        let source = "class Calc:\n    @staticmethod\n    def double(x):\n        return x * 2\n";
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("main.py"), source).unwrap();
        let modified = StaticMethodRefactorer
            .apply(
                &dir.path().join("main.py"),
                dir.path(),
                &smell("Calc", "double", 3),
                &RefactorContext::default(),
            )
            .unwrap();
        assert!(modified.is_empty());
    }

    #[test]
    fn other_decorators_do_not_count_as_static() {
        let source =
            "class Calc:\n    @cached\n    def double(self, x):\n        return x * 2\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "Calc", "double");
        let text = &modified[0].new_text;
        assert!(text.contains("@cached\n    @staticmethod\n    def double(x):"));
        SourceTree::parse(text.as_str()).unwrap();
    }

    #[test]
    fn cross_file_calls_are_rewritten() {
        let lib = "class Calc:\n    def double(self, x):\n        return x * 2\n";
        let user = "from lib import Calc\n\ndef go(c: Calc):\n    return c.double(4)\n";
        let (_dir, modified) =
            run_on(&[("lib.py", lib), ("user.py", user)], "lib.py", "Calc", "double");
        assert_eq!(modified.len(), 2);
        let user_out = modified
            .iter()
            .find(|m| m.path == PathBuf::from("user.py"))
            .unwrap();
        assert!(user_out.new_text.contains("return Calc.double(4)"));
        SourceTree::parse(user_out.new_text.as_str()).unwrap();
    }

    #[test]
    fn internal_self_calls_are_pinned_to_the_class() {
        let source = "class Calc:\n    def double(self, x):\n        return x * 2\n\n    def quad(self, x):\n        return self.double(self.double(x))\n";
        let (_dir, modified) = run_on(&[("main.py", source)], "main.py", "Calc", "double");
        let text = &modified[0].new_text;
        assert!(text.contains("return Calc.double(Calc.double(x))"));
        SourceTree::parse(text.as_str()).unwrap();
    }
}
