//! Project-wide class hierarchy facts.
//!
//! Collected once per refactor invocation by scanning every project file;
//! never cached across transactions, so facts cannot go stale when earlier
//! transactions rewrote their copies. Files that fail to parse are skipped
//! (a parse error aborts that file only).

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use scour_core::error::RefactorResult;
use scour_core::walker::ProjectWalker;

use crate::tree::{walk, SourceTree, Visit};

// ============================================================================
// Facts
// ============================================================================

/// One class observed in the project.
#[derive(Debug, Clone)]
pub struct ClassFact {
    pub name: String,
    /// Base class names as written (identifiers only; keyword arguments such
    /// as `metaclass=` are not bases).
    pub bases: Vec<String>,
    /// Methods the class itself defines.
    pub methods: BTreeSet<String>,
    /// Project-root-relative file the class was found in.
    pub file: PathBuf,
}

/// Class facts for one project, keyed by class name.
#[derive(Debug, Default)]
pub struct ClassHierarchy {
    classes: BTreeMap<String, ClassFact>,
    /// base name -> direct subclass names.
    subclasses: BTreeMap<String, Vec<String>>,
}

impl ClassHierarchy {
    /// Scan every Python file under `project_root`.
    pub fn scan(project_root: &Path, ignore_patterns: &[String]) -> RefactorResult<Self> {
        let walker = ProjectWalker::with_patterns(project_root, ignore_patterns)
            .map_err(|e| scour_core::error::RefactorError::internal(e.to_string()))?
            .with_extension("py");

        let mut hierarchy = ClassHierarchy::default();
        for file in walker.files() {
            let text = fs::read_to_string(&file)?;
            let tree = match SourceTree::parse(text) {
                Ok(tree) => tree,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping unparseable file");
                    continue;
                }
            };
            let rel = file
                .strip_prefix(project_root)
                .unwrap_or(&file)
                .to_path_buf();
            hierarchy.collect_from(&tree, &rel);
        }
        hierarchy.index_subclasses();
        Ok(hierarchy)
    }

    /// Collect facts from a single parsed file (exposed for tests and for
    /// callers that already hold the trees).
    pub fn collect_from(&mut self, tree: &SourceTree, file: &Path) {
        walk(tree.root(), &mut |node| {
            if node.kind() != "class_definition" {
                return Visit::Continue;
            }
            let Some(name_node) = node.child_by_field_name("name") else {
                return Visit::Continue;
            };
            let name = tree.node_text(name_node).to_string();

            let mut bases = Vec::new();
            if let Some(superclasses) = node.child_by_field_name("superclasses") {
                let mut cursor = superclasses.walk();
                for arg in superclasses.named_children(&mut cursor) {
                    if arg.kind() == "identifier" {
                        bases.push(tree.node_text(arg).to_string());
                    }
                }
            }

            let mut methods = BTreeSet::new();
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
                        if let Some(method_name) = def.child_by_field_name("name") {
                            methods.insert(tree.node_text(method_name).to_string());
                        }
                    }
                }
            }

            self.classes.insert(
                name.clone(),
                ClassFact {
                    name,
                    bases,
                    methods,
                    file: file.to_path_buf(),
                },
            );
            // Nested classes are rare; their methods are still collected by
            // continuing the walk.
            Visit::Continue
        });
    }

    /// Rebuild the base -> subclasses index. Called after collection.
    pub fn index_subclasses(&mut self) {
        self.subclasses.clear();
        for fact in self.classes.values() {
            for base in &fact.bases {
                self.subclasses
                    .entry(base.clone())
                    .or_default()
                    .push(fact.name.clone());
            }
        }
        for subs in self.subclasses.values_mut() {
            subs.sort();
        }
    }

    /// Look up a class by name.
    pub fn class(&self, name: &str) -> Option<&ClassFact> {
        self.classes.get(name)
    }

    /// Whether a name refers to a known project class.
    pub fn is_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// The valid-receiver-class set for a static-method rewrite: the
    /// declaring class plus every subclass that does not redefine the method.
    /// A subclass that overrides prunes its whole branch, because its
    /// descendants inherit the override.
    pub fn valid_receivers(&self, class_name: &str, method_name: &str) -> BTreeSet<String> {
        let mut valid = BTreeSet::new();
        valid.insert(class_name.to_string());

        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(class_name);
        while let Some(current) = queue.pop_front() {
            let Some(subs) = self.subclasses.get(current) else {
                continue;
            };
            for sub in subs {
                let overrides = self
                    .classes
                    .get(sub)
                    .is_some_and(|fact| fact.methods.contains(method_name));
                if overrides {
                    continue;
                }
                if valid.insert(sub.clone()) {
                    queue.push_back(sub);
                }
            }
        }
        valid
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy_from(sources: &[(&str, &str)]) -> ClassHierarchy {
        let mut hierarchy = ClassHierarchy::default();
        for (file, source) in sources {
            let tree = SourceTree::parse(*source).unwrap();
            hierarchy.collect_from(&tree, Path::new(file));
        }
        hierarchy.index_subclasses();
        hierarchy
    }

    #[test]
    fn collects_classes_bases_and_methods() {
        let hierarchy = hierarchy_from(&[(
            "shapes.py",
            "class Shape:\n    def area(self):\n        return 0\n\nclass Circle(Shape):\n    def area(self):\n        return 3\n",
        )]);

        let shape = hierarchy.class("Shape").unwrap();
        assert!(shape.bases.is_empty());
        assert!(shape.methods.contains("area"));

        let circle = hierarchy.class("Circle").unwrap();
        assert_eq!(circle.bases, vec!["Shape"]);
    }

    #[test]
    fn decorated_methods_are_collected() {
        let hierarchy = hierarchy_from(&[(
            "svc.py",
            "class Service:\n    @property\n    def status(self):\n        return 'ok'\n",
        )]);
        assert!(hierarchy.class("Service").unwrap().methods.contains("status"));
    }

    #[test]
    fn valid_receivers_scenario_b() {
        // B overrides m; C does not. Valid set is {A, C}.
        let hierarchy = hierarchy_from(&[(
            "m.py",
            "class A:\n    def m(self):\n        return 1\n\nclass B(A):\n    def m(self):\n        return 2\n\nclass C(A):\n    pass\n",
        )]);
        let valid = hierarchy.valid_receivers("A", "m");
        assert!(valid.contains("A"));
        assert!(valid.contains("C"));
        assert!(!valid.contains("B"));
    }

    #[test]
    fn override_prunes_descendants() {
        // D subclasses the overriding B; it inherits B's override, so it is
        // excluded even though it does not define m itself.
        let hierarchy = hierarchy_from(&[(
            "m.py",
            "class A:\n    def m(self):\n        return 1\n\nclass B(A):\n    def m(self):\n        return 2\n\nclass D(B):\n    pass\n",
        )]);
        let valid = hierarchy.valid_receivers("A", "m");
        assert_eq!(valid.into_iter().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn cross_file_subclasses_are_seen() {
        let hierarchy = hierarchy_from(&[
            ("base.py", "class Base:\n    def run(self):\n        pass\n"),
            ("ext.py", "class Ext(Base):\n    pass\n"),
        ]);
        let valid = hierarchy.valid_receivers("Base", "run");
        assert!(valid.contains("Ext"));
        assert_eq!(hierarchy.class("Ext").unwrap().file, PathBuf::from("ext.py"));
    }

    #[test]
    fn metaclass_keyword_is_not_a_base() {
        let hierarchy =
            hierarchy_from(&[("meta.py", "class C(Base, metaclass=Meta):\n    pass\n")]);
        assert_eq!(hierarchy.class("C").unwrap().bases, vec!["Base"]);
    }
}
