use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dom::document::{Document, NodeId};
use crate::scanner::element_model::{
    CanonicalType, ElementDescriptor, ExtractionSnapshot, FormAccessibility, FormDescriptor,
    FormKind, FormStructure,
};
use crate::scanner::extract::{extract_element, is_disabled, is_rendered, structural_selector};
use crate::scanner::groups::{detect_field_groups, merge_choice_groups};
use crate::scanner::index::ScanIndex;
use crate::scanner::normalize::generated_id;
use crate::scanner::stats::{compute_statistics, validation_rule_index};
use crate::scanner::type_map::{classify, is_editable_region, is_excluded_container};

/// Class/id fragments that mark a form-like container.
pub const CONTAINER_PATTERNS: [&str; 9] = [
    "form",
    "signup",
    "sign-up",
    "login",
    "register",
    "checkout",
    "contact",
    "search",
    "subscribe",
];

/// Id of the synthetic container holding surfaces outside any form.
pub const STANDALONE_FORM_ID: &str = "standalone";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Include elements that are not rendered.
    pub include_hidden: bool,
    pub include_disabled: bool,
    /// Include `<input type="hidden">`.
    pub include_hidden_inputs: bool,
    pub group_radio_checkbox: bool,
    pub detect_field_groups: bool,
    pub traverse_shadow: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_hidden: false,
            include_disabled: false,
            include_hidden_inputs: false,
            group_radio_checkbox: true,
            detect_field_groups: true,
            traverse_shadow: true,
        }
    }
}

// ============================================================================
// DocumentScanner
// ============================================================================

/// Walks a document and produces an [`ExtractionSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct DocumentScanner {
    pub options: ScanOptions,
}

struct Container {
    node: Option<NodeId>,
    kind: FormKind,
    members: Vec<(NodeId, CanonicalType)>,
}

impl DocumentScanner {
    pub fn new(options: ScanOptions) -> Self {
        Self { options }
    }

    /// Scan `root` (default: `<body>`) synchronously.
    pub fn scan(&self, doc: &Document, root: Option<NodeId>) -> ExtractionSnapshot {
        let started = Instant::now();
        let root = root.unwrap_or(doc.body());
        let index = ScanIndex::build(doc, root);

        let mut nodes = vec![root];
        nodes.extend(if self.options.traverse_shadow {
            doc.composed_descendants(root)
        } else {
            doc.descendants(root)
        });
        let nodes: Vec<NodeId> = nodes
            .into_iter()
            .filter(|n| doc.is_element(*n) && !in_excluded_container(doc, *n))
            .collect();

        let mut containers = self.find_containers(doc, &nodes);
        let mut standalone = Container {
            node: None,
            kind: FormKind::Standalone,
            members: Vec::new(),
        };

        let index_of: HashMap<NodeId, usize> = containers
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.node.map(|n| (n, i)))
            .collect();
        for node in &nodes {
            let Some(kind) = self.candidate_type(doc, *node) else {
                continue;
            };
            match owner_index(doc, *node, &index_of) {
                Some(idx) => containers[idx].members.push((*node, kind)),
                None => standalone.members.push((*node, kind)),
            }
        }
        if !standalone.members.is_empty() {
            containers.push(standalone);
        }

        let mut used_ids: HashSet<String> = HashSet::new();
        let mut used_form_ids: HashSet<String> = HashSet::new();
        let forms: Vec<FormDescriptor> = containers
            .iter()
            .enumerate()
            .map(|(idx, c)| self.build_form(doc, &index, idx, c, &mut used_ids, &mut used_form_ids))
            .collect();

        let field_groups = if self.options.detect_field_groups {
            detect_field_groups(&forms)
        } else {
            Vec::new()
        };
        let validation_rules = validation_rule_index(&forms);
        let statistics = compute_statistics(&forms);
        let extraction_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        debug!(
            forms = forms.len(),
            elements = statistics.total_elements,
            elapsed_ms = extraction_time_ms,
            "scan complete"
        );

        ExtractionSnapshot {
            timestamp: Utc::now(),
            forms,
            field_groups,
            validation_rules,
            statistics,
            extraction_time_ms,
        }
    }

    /// Canonical type of an includable surface, or `None`.
    fn candidate_type(&self, doc: &Document, node: NodeId) -> Option<CanonicalType> {
        let el = doc.element(node)?;
        let kind = classify(el)?;

        let inside_editable = doc
            .element_ancestors(node)
            .into_iter()
            .any(|a| doc.element(a).is_some_and(is_editable_region));
        if inside_editable {
            return None;
        }

        if kind == CanonicalType::Hidden {
            return self.options.include_hidden_inputs.then_some(kind);
        }
        if !self.options.include_disabled && is_disabled(doc, node) {
            return None;
        }
        if !self.options.include_hidden && !is_rendered(doc, node) {
            return None;
        }
        Some(kind)
    }

    /// Native forms plus outermost heuristic containers outside any form.
    fn find_containers(&self, doc: &Document, nodes: &[NodeId]) -> Vec<Container> {
        let mut containers = Vec::new();
        let mut heuristic_nodes: Vec<NodeId> = Vec::new();

        for node in nodes {
            let Some(el) = doc.element(*node) else {
                continue;
            };
            if el.tag == "form" {
                containers.push(Container {
                    node: Some(*node),
                    kind: FormKind::Native,
                    members: Vec::new(),
                });
                continue;
            }
            if el.tag == "body" || doc.closest(*node, "form").is_some() {
                continue;
            }
            if heuristic_nodes.iter().any(|h| doc.contains(*h, *node)) {
                continue;
            }
            if self.looks_like_form(doc, *node) {
                heuristic_nodes.push(*node);
                containers.push(Container {
                    node: Some(*node),
                    kind: FormKind::Heuristic,
                    members: Vec::new(),
                });
            }
        }
        containers
    }

    fn looks_like_form(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        let role_match = matches!(el.attr("role"), Some("form" | "search"));
        let class = el.attr("class").unwrap_or("").to_lowercase();
        let id = el.attr("id").unwrap_or("").to_lowercase();
        let name_match = CONTAINER_PATTERNS
            .iter()
            .any(|p| class.contains(p) || id.contains(p));
        if !role_match && !name_match {
            return false;
        }

        let interactive = doc
            .composed_descendants(node)
            .into_iter()
            .filter(|n| self.candidate_type(doc, *n).is_some())
            .take(2)
            .count();
        interactive >= 2
    }

    fn build_form(
        &self,
        doc: &Document,
        scan_index: &ScanIndex,
        index: usize,
        container: &Container,
        used_ids: &mut HashSet<String>,
        used_form_ids: &mut HashSet<String>,
    ) -> FormDescriptor {
        let mut elements: Vec<ElementDescriptor> = Vec::new();
        for (node, kind) in &container.members {
            match extract_element(doc, scan_index, *node, *kind) {
                Ok(desc) => elements.push(desc),
                Err(e) => warn!(node = %node, error = %e, "dropping element after extraction failure"),
            }
        }
        if self.options.group_radio_checkbox {
            elements = merge_choice_groups(doc, elements);
        }
        for el in &mut elements {
            el.id = unique_id(&el.id, used_ids);
        }

        let el = container.node.and_then(|n| doc.element(n));
        let attr = |name: &str| el.and_then(|e| e.attr(name)).map(str::to_string);
        let base_form_id = match (container.kind, container.node) {
            (FormKind::Standalone, _) => STANDALONE_FORM_ID.to_string(),
            (_, Some(node)) => el
                .and_then(|e| e.id().or(e.name()))
                .map(str::to_string)
                .unwrap_or_else(|| match container.kind {
                    FormKind::Native => format!("form-{}", index),
                    _ => generated_id(&structural_selector(doc, node)),
                }),
            (_, None) => format!("form-{}", index),
        };

        FormDescriptor {
            id: unique_id(&base_form_id, used_form_ids),
            node: container.node,
            kind: container.kind,
            name: attr("name"),
            action: attr("action"),
            method: attr("method")
                .map(|m| m.to_lowercase())
                .unwrap_or_else(|| "get".to_string()),
            enctype: attr("enctype")
                .unwrap_or_else(|| "application/x-www-form-urlencoded".to_string()),
            autocomplete: attr("autocomplete"),
            novalidate: el.is_some_and(|e| e.has_attr("novalidate")),
            structure: summarize_structure(doc, container, &elements),
            accessibility: summarize_accessibility(&elements),
            elements,
        }
    }
}

fn summarize_structure(
    doc: &Document,
    container: &Container,
    elements: &[ElementDescriptor],
) -> FormStructure {
    let fieldsets = container
        .node
        .map(|n| {
            doc.descendants(n)
                .into_iter()
                .filter(|d| doc.tag(*d) == Some("fieldset"))
                .count()
        })
        .unwrap_or(0);
    FormStructure {
        element_count: elements.len(),
        fieldsets,
        required_fields: elements.iter().filter(|e| e.constraints.required).count(),
        groups: elements.iter().filter(|e| e.group.is_some()).count(),
    }
}

pub(crate) fn summarize_accessibility(elements: &[ElementDescriptor]) -> FormAccessibility {
    let labelled = elements.iter().filter(|e| e.label.is_some()).count();
    FormAccessibility {
        labelled,
        unlabelled: elements.len() - labelled,
        with_aria: elements.iter().filter(|e| e.has_accessibility()).count(),
    }
}

fn in_excluded_container(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(is_excluded_container)
        || doc
            .element_ancestors(node)
            .into_iter()
            .any(|a| doc.tag(a).is_some_and(is_excluded_container))
}

/// Container owning `node`: the form named by its `form` attribute, the
/// nearest enclosing form, or the heuristic container holding it.
fn owner_index(doc: &Document, node: NodeId, index_of: &HashMap<NodeId, usize>) -> Option<usize> {
    if let Some(form) = doc
        .attr(node, "form")
        .and_then(|id| doc.get_element_by_id(id))
        .filter(|f| doc.tag(*f) == Some("form"))
    {
        if let Some(idx) = index_of.get(&form) {
            return Some(*idx);
        }
    }
    doc.element_ancestors(node)
        .into_iter()
        .find_map(|a| index_of.get(&a).copied())
}

pub(crate) fn unique_id(base: &str, used: &mut HashSet<String>) -> String {
    if used.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{}-{}", base, n);
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
