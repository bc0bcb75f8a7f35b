//! Best-effort receiver type resolution.
//!
//! Resolution is an explicit tri-state threaded through every call-site
//! decision: `Resolved(type)` or `Unknown`, never an exception. Every
//! ambiguous case is a deliberate "leave the call unmodified" branch in the
//! refactorers, so the engine never guesses.

use tree_sitter::Node;

use crate::facts::ClassHierarchy;
use crate::tree::{walk, SourceTree, Visit};

// ============================================================================
// Result Type
// ============================================================================

/// Outcome of resolving an expression's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeResolution {
    Resolved(String),
    Unknown,
}

// ============================================================================
// Scope Helpers
// ============================================================================

/// Nearest enclosing function definition.
pub fn enclosing_function(node: Node<'_>) -> Option<Node<'_>> {
    crate::tree::ancestor_of_kind(node, "function_definition")
}

/// Nearest enclosing class definition.
pub fn enclosing_class(node: Node<'_>) -> Option<Node<'_>> {
    crate::tree::ancestor_of_kind(node, "class_definition")
}

// ============================================================================
// Receiver Resolution
// ============================================================================

/// Resolve the type of a call receiver expression.
///
/// The ladder, in order of preference:
/// (a) static inference on the expression itself: a direct constructor call
///     `ClassName(...)` of a known project class, or `self` inside a class;
/// (b) a declared parameter-type annotation when the receiver is a parameter
///     of the enclosing function;
/// (c) the nearest preceding simple assignment `receiver = ClassName(...)`
///     in the same lexical scope.
pub fn resolve_receiver(
    tree: &SourceTree,
    receiver: Node<'_>,
    hierarchy: &ClassHierarchy,
) -> TypeResolution {
    // (a) Direct constructor call.
    if receiver.kind() == "call" {
        if let Some(function) = receiver.child_by_field_name("function") {
            if function.kind() == "identifier" {
                let name = tree.node_text(function);
                if hierarchy.is_class(name) {
                    return TypeResolution::Resolved(name.to_string());
                }
            }
        }
        return TypeResolution::Unknown;
    }

    if receiver.kind() != "identifier" {
        return TypeResolution::Unknown;
    }
    let receiver_name = tree.node_text(receiver);

    // (a) `self` resolves to the enclosing class.
    if receiver_name == "self" {
        if let Some(class) = enclosing_class(receiver) {
            if let Some(name) = class.child_by_field_name("name") {
                return TypeResolution::Resolved(tree.node_text(name).to_string());
            }
        }
        return TypeResolution::Unknown;
    }

    // (b) Parameter annotation in the enclosing function.
    if let Some(function) = enclosing_function(receiver) {
        if let Some(annotation) = parameter_annotation(tree, function, receiver_name) {
            return TypeResolution::Resolved(annotation);
        }
    }

    // (c) Nearest preceding `receiver = ClassName(...)` in the same scope.
    // The callee must be a known project class; a plain function call
    // rebinding the receiver makes the type unknown.
    if let Some(class_name) = preceding_constructor_assignment(tree, receiver, receiver_name) {
        if hierarchy.is_class(&class_name) {
            return TypeResolution::Resolved(class_name);
        }
    }

    TypeResolution::Unknown
}

/// Annotation type for a named parameter, when it is a plain identifier
/// annotation. Generic or attribute annotations stay unresolved.
fn parameter_annotation(
    tree: &SourceTree,
    function: Node<'_>,
    param_name: &str,
) -> Option<String> {
    let params = function.child_by_field_name("parameters")?;
    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        let (name_node, type_node) = match param.kind() {
            "typed_parameter" => {
                let name = param.named_child(0)?;
                (name, param.child_by_field_name("type"))
            }
            "typed_default_parameter" => {
                let name = param.child_by_field_name("name")?;
                (name, param.child_by_field_name("type"))
            }
            _ => continue,
        };
        if name_node.kind() != "identifier" || tree.node_text(name_node) != param_name {
            continue;
        }
        let type_node = type_node?;
        // The grammar wraps annotations in a `type` node.
        let inner = if type_node.kind() == "type" {
            type_node.named_child(0)?
        } else {
            type_node
        };
        if inner.kind() == "identifier" {
            return Some(tree.node_text(inner).to_string());
        }
        return None;
    }
    None
}

/// Nearest preceding `name = ClassName(...)` assignment in the receiver's
/// lexical scope (the enclosing function body, or the module). Nested
/// function and class bodies are different scopes and are skipped.
fn preceding_constructor_assignment(
    tree: &SourceTree,
    receiver: Node<'_>,
    receiver_name: &str,
) -> Option<String> {
    let scope_root = enclosing_function(receiver)
        .and_then(|f| f.child_by_field_name("body"))
        .unwrap_or_else(|| tree.root());

    let mut best: Option<(usize, String)> = None;
    walk(scope_root, &mut |node| {
        // Do not descend into nested scopes, except the one holding the
        // receiver itself.
        if (node.kind() == "function_definition" || node.kind() == "class_definition")
            && node != scope_root
        {
            return Visit::SkipChildren;
        }
        if node.kind() != "assignment" || node.end_byte() > receiver.start_byte() {
            return Visit::Continue;
        }
        let Some(left) = node.child_by_field_name("left") else {
            return Visit::Continue;
        };
        if left.kind() != "identifier" || tree.node_text(left) != receiver_name {
            return Visit::Continue;
        }
        let Some(right) = node.child_by_field_name("right") else {
            return Visit::Continue;
        };
        if right.kind() != "call" {
            return Visit::Continue;
        }
        let Some(function) = right.child_by_field_name("function") else {
            return Visit::Continue;
        };
        if function.kind() != "identifier" {
            return Visit::Continue;
        }
        let class_name = tree.node_text(function).to_string();
        let start = node.start_byte();
        if best.as_ref().is_none_or(|(s, _)| start > *s) {
            best = Some((start, class_name));
        }
        Visit::Continue
    });

    best.map(|(_, name)| name)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn hierarchy_with(source: &str) -> ClassHierarchy {
        let mut hierarchy = ClassHierarchy::default();
        let tree = SourceTree::parse(source).unwrap();
        hierarchy.collect_from(&tree, Path::new("classes.py"));
        hierarchy.index_subclasses();
        hierarchy
    }

    /// Find the receiver of the first `<recv>.target(...)` call.
    fn receiver_of_first_target_call<'t>(tree: &'t SourceTree) -> Node<'t> {
        let mut found = None;
        walk(tree.root(), &mut |node| {
            if found.is_some() {
                return Visit::SkipChildren;
            }
            if node.kind() == "call" {
                if let Some(function) = node.child_by_field_name("function") {
                    if function.kind() == "attribute" {
                        let attr = function.child_by_field_name("attribute").unwrap();
                        if tree.node_text(attr) == "target" {
                            found = Some(function.child_by_field_name("object").unwrap());
                            return Visit::SkipChildren;
                        }
                    }
                }
            }
            Visit::Continue
        });
        found.expect("no target call in fixture")
    }

    #[test]
    fn direct_constructor_call_resolves() {
        let hierarchy = hierarchy_with("class Widget:\n    def target(self):\n        pass\n");
        let tree = SourceTree::parse("Widget().target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Resolved("Widget".to_string())
        );
    }

    #[test]
    fn self_resolves_to_enclosing_class() {
        let hierarchy = hierarchy_with("class Widget:\n    pass\n");
        let tree = SourceTree::parse(
            "class Widget:\n    def target(self):\n        pass\n    def other(self):\n        self.target()\n",
        )
        .unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Resolved("Widget".to_string())
        );
    }

    #[test]
    fn parameter_annotation_resolves() {
        let hierarchy = hierarchy_with("class Widget:\n    pass\n");
        let tree =
            SourceTree::parse("def use(w: Widget):\n    w.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Resolved("Widget".to_string())
        );
    }

    #[test]
    fn preceding_assignment_resolves() {
        let hierarchy = hierarchy_with("class Widget:\n    pass\n");
        let tree = SourceTree::parse("w = Widget()\nw.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Resolved("Widget".to_string())
        );
    }

    #[test]
    fn nearest_assignment_wins() {
        let hierarchy = hierarchy_with("class A:\n    pass\nclass B:\n    pass\n");
        let tree = SourceTree::parse("w = A()\nw = B()\nw.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Resolved("B".to_string())
        );
    }

    #[test]
    fn assignment_from_plain_function_is_unknown() {
        // `make` is a project function, not a class; the binding tells us
        // nothing about the receiver's type.
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree = SourceTree::parse("w = make()\nw.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }

    #[test]
    fn rebinding_through_a_function_clears_the_type() {
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree = SourceTree::parse("w = A()\nw = make()\nw.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }

    #[test]
    fn later_assignment_is_ignored() {
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree = SourceTree::parse("w.target()\nw = A()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }

    #[test]
    fn assignment_in_nested_scope_does_not_leak() {
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree = SourceTree::parse(
            "def inner():\n    w = A()\n\ndef outer():\n    w.target()\n",
        )
        .unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }

    #[test]
    fn unknown_expression_is_unknown() {
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree = SourceTree::parse("get_thing().target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }

    #[test]
    fn generic_annotation_stays_unknown() {
        let hierarchy = hierarchy_with("class A:\n    pass\n");
        let tree =
            SourceTree::parse("def use(w: list[A]):\n    w.target()\n").unwrap();
        let receiver = receiver_of_first_target_call(&tree);
        assert_eq!(
            resolve_receiver(&tree, receiver, &hierarchy),
            TypeResolution::Unknown
        );
    }
}
