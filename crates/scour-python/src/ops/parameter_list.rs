//! Long-parameter-list remediation.
//!
//! Collapses an over-long parameter list into parameter-object groups:
//!
//! 1. Parameters the body never reads are dropped outright (their arguments
//!    are dropped at every call site too).
//! 2. If the survivors still exceed the threshold, they are classified as
//!    data-oriented or config-oriented by keyword match and each category
//!    with at least two members becomes a synthesized group class
//!    (`DataParams_<fn>_<line>` / `ConfigParams_<fn>_<line>`).
//! 3. The signature becomes `(receiver?, data_params, config_params,
//!    leftovers..., *variadics)`, body reads are redirected through the
//!    group objects, and every resolvable call site project-wide bundles its
//!    arguments into group constructors.
//!
//! Call sites the engine cannot map faithfully (splat arguments, unresolved
//! method receivers) are left byte-identical rather than guessed at.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;
use tree_sitter::Node;

use scour_core::error::RefactorResult;
use scour_core::refactor::{RefactorContext, Refactorer};
use scour_core::smell::SmellRecord;
use scour_core::text::line_start_offset;
use scour_core::walker::ProjectWalker;
use scour_core::workspace::ModifiedFile;

use crate::facts::ClassHierarchy;
use crate::ops::{
    attribute_call_parts, edit_error, find_function_at, import_insertion_offset, module_path_for,
    parse_file, top_level_statement,
};
use crate::resolve::{resolve_receiver, TypeResolution};
use crate::tree::{ancestor_of_kind, node_line, walk, EditSet, SourceTree, Visit};

pub struct ParameterListRefactorer;

// ============================================================================
// Parameter Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamKind {
    /// Implicit receiver (`self` / `cls`); never grouped, never mapped.
    Receiver,
    Plain,
    VarArgs,
    KwArgs,
}

#[derive(Debug, Clone)]
struct Param {
    name: String,
    default: Option<String>,
    kind: ParamKind,
    /// Original declaration text, annotations and defaults included.
    text: String,
}

/// Parse the declared parameters. `None` means the signature uses a shape
/// the rewrite does not support (keyword-only markers, positional-only
/// markers, parameters after `*args`).
fn parse_params(tree: &SourceTree, def: Node<'_>, in_class: bool) -> Option<Vec<Param>> {
    let params_node = def.child_by_field_name("parameters")?;
    let mut params = Vec::new();
    let mut seen_varargs = false;

    let mut cursor = params_node.walk();
    for (index, node) in params_node.named_children(&mut cursor).enumerate() {
        let param = match node.kind() {
            "identifier" => {
                let name = tree.node_text(node).to_string();
                let kind = if index == 0 && in_class && (name == "self" || name == "cls") {
                    ParamKind::Receiver
                } else {
                    ParamKind::Plain
                };
                Param {
                    name,
                    default: None,
                    kind,
                    text: tree.node_text(node).to_string(),
                }
            }
            "typed_parameter" => {
                let name_node = node.named_child(0)?;
                if name_node.kind() != "identifier" {
                    return None;
                }
                Param {
                    name: tree.node_text(name_node).to_string(),
                    default: None,
                    kind: ParamKind::Plain,
                    text: tree.node_text(node).to_string(),
                }
            }
            "default_parameter" | "typed_default_parameter" => {
                let name_node = node.child_by_field_name("name")?;
                if name_node.kind() != "identifier" {
                    return None;
                }
                let value = node.child_by_field_name("value")?;
                Param {
                    name: tree.node_text(name_node).to_string(),
                    default: Some(tree.node_text(value).to_string()),
                    kind: ParamKind::Plain,
                    text: tree.node_text(node).to_string(),
                }
            }
            "list_splat_pattern" => {
                seen_varargs = true;
                Param {
                    name: tree.node_text(node).to_string(),
                    default: None,
                    kind: ParamKind::VarArgs,
                    text: tree.node_text(node).to_string(),
                }
            }
            "dictionary_splat_pattern" => Param {
                name: tree.node_text(node).to_string(),
                default: None,
                kind: ParamKind::KwArgs,
                text: tree.node_text(node).to_string(),
            },
            _ => return None,
        };
        // A named parameter after `*args` is keyword-only; its call-site
        // mapping is not positional and the rewrite does not attempt it.
        if seen_varargs && param.kind == ParamKind::Plain {
            return None;
        }
        params.push(param);
    }
    Some(params)
}

// ============================================================================
// Body Analysis
// ============================================================================

/// Names the body reads. Attribute names, keyword-argument names, and bare
/// assignment / loop targets are writes or labels, not reads; an augmented
/// assignment target reads before it writes.
fn used_names(tree: &SourceTree, body: Node<'_>) -> BTreeSet<String> {
    let mut used = BTreeSet::new();
    walk(body, &mut |node| {
        if node.kind() != "identifier" {
            return Visit::Continue;
        }
        if is_read_position(node) {
            used.insert(tree.node_text(node).to_string());
        }
        Visit::Continue
    });
    used
}

fn is_read_position(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        "attribute" => parent.child_by_field_name("attribute") != Some(node),
        "keyword_argument" => parent.child_by_field_name("name") != Some(node),
        "assignment" | "for_statement" => parent.child_by_field_name("left") != Some(node),
        _ => true,
    }
}

/// An attribute name or keyword-argument name: a label, never a variable.
fn is_label_position(node: Node<'_>) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "attribute" => parent.child_by_field_name("attribute") == Some(node),
        "keyword_argument" => parent.child_by_field_name("name") == Some(node),
        _ => false,
    }
}

fn has_nested_scope(body: Node<'_>) -> bool {
    let mut found = false;
    walk(body, &mut |node| {
        if node.kind() == "function_definition" || node.kind() == "class_definition" {
            found = true;
            return Visit::SkipChildren;
        }
        Visit::Continue
    });
    found
}

fn matches_any(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords.iter().any(|k| lower.contains(k.as_str()))
}

/// Config wins only when the name matches config keywords and no data
/// keyword; everything else defaults to data.
fn is_config_param(name: &str, ctx: &RefactorContext) -> bool {
    matches_any(name, &ctx.config_keywords) && !matches_any(name, &ctx.data_keywords)
}

// ============================================================================
// Group Synthesis
// ============================================================================

struct Group {
    class_name: String,
    param_name: &'static str,
    /// Members in constructor order: required first, defaulted after, each
    /// sub-list keeping declaration order.
    members: Vec<Param>,
}

impl Group {
    fn build(class_name: String, param_name: &'static str, members: &[&Param]) -> Self {
        let mut ordered: Vec<Param> = members
            .iter()
            .filter(|p| p.default.is_none())
            .map(|p| (*p).clone())
            .collect();
        ordered.extend(
            members
                .iter()
                .filter(|p| p.default.is_some())
                .map(|p| (*p).clone()),
        );
        Group {
            class_name,
            param_name,
            members: ordered,
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|m| m.name == name)
    }

    fn class_source(&self) -> String {
        let mut signature = vec!["self".to_string()];
        for member in &self.members {
            match &member.default {
                Some(default) => signature.push(format!("{}={}", member.name, default)),
                None => signature.push(member.name.clone()),
            }
        }
        let mut out = format!("class {}:\n", self.class_name);
        out.push_str(&format!("    def __init__({}):\n", signature.join(", ")));
        for member in &self.members {
            out.push_str(&format!("        self.{0} = {0}\n", member.name));
        }
        out
    }
}

// ============================================================================
// Call-Site Rewriting
// ============================================================================

/// Everything a call-site pass needs to know about the rewritten function.
struct CallPlan<'a> {
    fn_name: &'a str,
    /// Declaring class when the target is a method; `__init__` rewrites
    /// match constructor calls of this class instead of attribute calls.
    declaring_class: Option<&'a str>,
    /// Old non-receiver, non-variadic parameters in declaration order.
    /// Dead parameters stay here so positional slots keep lining up; their
    /// values are dropped because nothing in the new signature reads them.
    old_plain: Vec<Param>,
    data_group: Option<&'a Group>,
    config_group: Option<&'a Group>,
    /// Surviving parameters not absorbed by a group, declaration order.
    ungrouped: Vec<Param>,
}

impl CallPlan<'_> {
    fn is_constructor(&self) -> bool {
        self.fn_name == "__init__"
    }
}

#[derive(Debug, Clone)]
struct ArgValue {
    text: String,
    positional: bool,
}

/// Rewrite every matching, mappable call in one file. Returns the number of
/// calls changed.
fn rewrite_calls(
    tree: &SourceTree,
    plan: &CallPlan<'_>,
    hierarchy: &ClassHierarchy,
    edits: &mut EditSet,
) -> usize {
    let mut changed = 0usize;
    walk(tree.root(), &mut |node| {
        if node.kind() != "call" {
            return Visit::Continue;
        }
        if !call_matches(tree, node, plan, hierarchy) {
            return Visit::Continue;
        }
        if let Some(new_args) = remap_arguments(tree, node, plan) {
            if let Some(args_node) = node.child_by_field_name("arguments") {
                if tree.node_text(args_node) != new_args {
                    edits.replace_node(args_node, new_args);
                    changed += 1;
                }
            }
        }
        Visit::Continue
    });
    changed
}

fn call_matches(
    tree: &SourceTree,
    call: Node<'_>,
    plan: &CallPlan<'_>,
    hierarchy: &ClassHierarchy,
) -> bool {
    if plan.is_constructor() {
        let Some(class_name) = plan.declaring_class else {
            return false;
        };
        return call
            .child_by_field_name("function")
            .is_some_and(|f| f.kind() == "identifier" && tree.node_text(f) == class_name);
    }

    match plan.declaring_class {
        None => call
            .child_by_field_name("function")
            .is_some_and(|f| f.kind() == "identifier" && tree.node_text(f) == plan.fn_name),
        Some(class_name) => {
            let Some((object, method)) = attribute_call_parts(tree, call) else {
                return false;
            };
            if method != plan.fn_name {
                return false;
            }
            // Only receivers that provably resolve to the declaring class
            // are rewritten; everything else stays byte-identical.
            resolve_receiver(tree, object, hierarchy)
                == TypeResolution::Resolved(class_name.to_string())
        }
    }
}

/// Map a call's arguments onto the new signature. `None` means the call is
/// not faithfully mappable and must stay unmodified.
fn remap_arguments(tree: &SourceTree, call: Node<'_>, plan: &CallPlan<'_>) -> Option<String> {
    let args_node = call.child_by_field_name("arguments")?;

    let mut values: BTreeMap<String, ArgValue> = BTreeMap::new();
    let mut extras: Vec<String> = Vec::new();
    let mut leftover_keywords: Vec<(String, String)> = Vec::new();
    let mut positional_index = 0usize;

    let mut cursor = args_node.walk();
    for arg in args_node.named_children(&mut cursor) {
        match arg.kind() {
            // Splats cannot be mapped onto individual parameters.
            "list_splat" | "dictionary_splat" => return None,
            "keyword_argument" => {
                let name_node = arg.child_by_field_name("name")?;
                let value_node = arg.child_by_field_name("value")?;
                let name = tree.node_text(name_node).to_string();
                let text = tree.node_text(value_node).to_string();
                if plan.old_plain.iter().any(|p| p.name == name) {
                    values.insert(
                        name,
                        ArgValue {
                            text,
                            positional: false,
                        },
                    );
                } else {
                    leftover_keywords.push((name, text));
                }
            }
            "comment" => {}
            _ => {
                let text = tree.node_text(arg).to_string();
                if let Some(param) = plan.old_plain.get(positional_index) {
                    values.insert(
                        param.name.clone(),
                        ArgValue {
                            text,
                            positional: true,
                        },
                    );
                } else {
                    extras.push(text);
                }
                positional_index += 1;
            }
        }
    }

    let mut positionals: Vec<String> = Vec::new();
    let mut keywords: Vec<String> = Vec::new();

    for group in [plan.data_group, plan.config_group].into_iter().flatten() {
        positionals.push(group_constructor(group, &values));
    }

    // Ungrouped survivors: positional while the prefix is gapless and was
    // positional at the original call, keyword from the first break on.
    let mut positional_phase = true;
    for param in &plan.ungrouped {
        match values.get(&param.name) {
            Some(v) if v.positional && positional_phase => positionals.push(v.text.clone()),
            Some(v) => {
                positional_phase = false;
                keywords.push(format!("{}={}", param.name, v.text));
            }
            None => positional_phase = false,
        }
    }

    // Extra positionals feed `*args`; they are only coherent when every
    // survivor before them stayed positional.
    if !extras.is_empty() && !positional_phase {
        return None;
    }
    positionals.extend(extras);

    for (name, text) in leftover_keywords {
        keywords.push(format!("{}={}", name, text));
    }

    let mut all = positionals;
    all.extend(keywords);
    Some(format!("({})", all.join(", ")))
}

fn group_constructor(group: &Group, values: &BTreeMap<String, ArgValue>) -> String {
    let mut positionals: Vec<String> = Vec::new();
    let mut keywords: Vec<String> = Vec::new();
    let mut positional_phase = true;

    for member in &group.members {
        match values.get(&member.name) {
            Some(v) if v.positional && positional_phase => positionals.push(v.text.clone()),
            Some(v) => {
                positional_phase = false;
                keywords.push(format!("{}={}", member.name, v.text));
            }
            None => positional_phase = false,
        }
    }

    let mut all = positionals;
    all.extend(keywords);
    format!("{}({})", group.class_name, all.join(", "))
}

// ============================================================================
// Refactorer
// ============================================================================

impl Refactorer for ParameterListRefactorer {
    fn name(&self) -> &'static str {
        "collapse-parameter-list"
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
        let Some(def) = find_function_at(&tree, line) else {
            debug!(line, "no function definition at smell line");
            return Ok(vec![]);
        };
        let Some(name_node) = def.child_by_field_name("name") else {
            return Ok(vec![]);
        };
        let Some(body) = def.child_by_field_name("body") else {
            return Ok(vec![]);
        };
        let fn_name = tree.node_text(name_node).to_string();
        let def_line = node_line(def);

        let declaring_class = ancestor_of_kind(def, "class_definition")
            .and_then(|c| c.child_by_field_name("name"))
            .map(|n| tree.node_text(n).to_string());

        let Some(params) = parse_params(&tree, def, declaring_class.is_some()) else {
            debug!(function = %fn_name, "unsupported parameter shape");
            return Ok(vec![]);
        };
        let plain: Vec<Param> = params
            .iter()
            .filter(|p| p.kind == ParamKind::Plain)
            .cloned()
            .collect();
        if plain.len() <= ctx.param_threshold {
            return Ok(vec![]);
        }

        let used = used_names(&tree, body);
        let dead: BTreeSet<String> = plain
            .iter()
            .filter(|p| !used.contains(&p.name))
            .map(|p| p.name.clone())
            .collect();
        let survivors: Vec<&Param> = plain.iter().filter(|p| !dead.contains(&p.name)).collect();

        // Grouping redirects body reads through the group object, which is
        // unsound when a nested scope may rebind the same names. Dropping
        // dead parameters never touches the body, so it stays available.
        let grouping_allowed =
            survivors.len() > ctx.param_threshold && !has_nested_scope(body);

        let (data_group, config_group) = if grouping_allowed {
            let data: Vec<&Param> = survivors
                .iter()
                .filter(|p| !is_config_param(&p.name, ctx))
                .copied()
                .collect();
            let config: Vec<&Param> = survivors
                .iter()
                .filter(|p| is_config_param(&p.name, ctx))
                .copied()
                .collect();
            (
                (!data.is_empty()).then(|| {
                    Group::build(
                        format!("DataParams_{}_{}", fn_name, def_line),
                        "data_params",
                        &data,
                    )
                }),
                (!config.is_empty()).then(|| {
                    Group::build(
                        format!("ConfigParams_{}_{}", fn_name, def_line),
                        "config_params",
                        &config,
                    )
                }),
            )
        } else {
            (None, None)
        };

        if data_group.is_none() && config_group.is_none() && dead.is_empty() {
            return Ok(vec![]);
        }

        let ungrouped: Vec<Param> = survivors
            .iter()
            .filter(|p| {
                !data_group.as_ref().is_some_and(|g| g.contains(&p.name))
                    && !config_group.as_ref().is_some_and(|g| g.contains(&p.name))
            })
            .map(|p| (*p).clone())
            .collect();

        // --- Pass 1: definition-side edits on the target file. ---
        let mut edits = EditSet::new();

        // Synthesized classes land right above the enclosing top-level
        // statement, indentation zero, as a single insertion.
        let class_block: String = [&data_group, &config_group]
            .into_iter()
            .flatten()
            .map(|g| format!("{}\n\n", g.class_source()))
            .collect();
        if !class_block.is_empty() {
            let anchor = top_level_statement(&tree, def);
            let insert_at = line_start_offset(tree.text(), anchor.start_byte());
            edits.insert(insert_at, class_block);
        }

        let mut signature: Vec<String> = Vec::new();
        for param in &params {
            match param.kind {
                ParamKind::Receiver => signature.push(param.text.clone()),
                _ => break,
            }
        }
        for group in [&data_group, &config_group].into_iter().flatten() {
            signature.push(group.param_name.to_string());
        }
        signature.extend(ungrouped.iter().map(|p| p.text.clone()));
        signature.extend(
            params
                .iter()
                .filter(|p| matches!(p.kind, ParamKind::VarArgs | ParamKind::KwArgs))
                .map(|p| p.text.clone()),
        );
        if let Some(params_node) = def.child_by_field_name("parameters") {
            edits.replace_node(params_node, format!("({})", signature.join(", ")));
        }

        // Redirect body reads of grouped names through the group objects.
        for group in [&data_group, &config_group].into_iter().flatten() {
            let mut body_edits: Vec<(Node<'_>, String)> = Vec::new();
            walk(body, &mut |node| {
                if node.kind() == "identifier"
                    && group.contains(tree.node_text(node))
                    && !is_label_position(node)
                {
                    body_edits.push((
                        node,
                        format!("{}.{}", group.param_name, tree.node_text(node)),
                    ));
                }
                Visit::Continue
            });
            for (node, text) in body_edits {
                edits.replace_node(node, text);
            }
        }

        let pass1_text = edits
            .apply_to(tree.text())
            .map_err(|e| edit_error(target_file, e))?;

        // --- Pass 2: call sites, target file first, then the project. ---
        let needs_hierarchy = declaring_class.is_some() && fn_name != "__init__";
        let hierarchy = if needs_hierarchy {
            ClassHierarchy::scan(project_root, &ctx.ignore_patterns)?
        } else {
            ClassHierarchy::default()
        };

        let plan = CallPlan {
            fn_name: &fn_name,
            declaring_class: declaring_class.as_deref(),
            old_plain: plain.clone(),
            data_group: data_group.as_ref(),
            config_group: config_group.as_ref(),
            ungrouped,
        };

        let mut modified = Vec::new();

        let target_tree =
            SourceTree::parse(pass1_text).map_err(|e| edit_error(target_file, e.into()))?;
        let mut target_edits = EditSet::new();
        rewrite_calls(&target_tree, &plan, &hierarchy, &mut target_edits);
        let target_text = if target_edits.is_empty() {
            target_tree.text().to_string()
        } else {
            target_edits
                .apply_to(target_tree.text())
                .map_err(|e| edit_error(target_file, e))?
        };
        let target_rel = target_file
            .strip_prefix(project_root)
            .unwrap_or(target_file)
            .to_path_buf();
        modified.push(ModifiedFile::new(target_rel.clone(), target_text));

        let group_imports: Vec<&str> = [&data_group, &config_group]
            .into_iter()
            .flatten()
            .map(|g| g.class_name.as_str())
            .collect();
        let target_module = module_path_for(&target_rel);

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
            let mut other_edits = EditSet::new();
            let changed = rewrite_calls(&other, &plan, &hierarchy, &mut other_edits);
            if changed == 0 {
                continue;
            }
            if !group_imports.is_empty() {
                other_edits.insert(
                    import_insertion_offset(&other),
                    format!("from {} import {}\n", target_module, group_imports.join(", ")),
                );
            }
            let new_text = other_edits
                .apply_to(other.text())
                .map_err(|e| edit_error(&file, e))?;
            modified.push(ModifiedFile::new(rel, new_text));
        }

        Ok(modified)
    }
}

// ============================================================================
// Tests
// ============================================================================
