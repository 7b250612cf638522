use std::collections::HashMap;

use crate::dom::document::{Document, NodeId};

const HEADING_TAGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Reverse lookups built in one pass over the composed tree at the start of
/// a scan, so per-element extraction never walks the whole document.
#[derive(Debug, Default)]
pub struct ScanIndex {
    /// `label[for]` target id to the labels naming it, in document order.
    labels_for: HashMap<String, Vec<NodeId>>,
    /// Id to the elements listing it in `aria-controls`.
    controllers: HashMap<String, Vec<NodeId>>,
    /// Element to the first heading in its light subtree.
    first_heading: HashMap<NodeId, NodeId>,
}

impl ScanIndex {
    /// Index the document, plus `scan_root` when it is detached.
    pub fn build(doc: &Document, scan_root: NodeId) -> Self {
        let mut index = Self::default();
        let mut nodes = doc.composed_descendants(doc.root());
        if !doc.is_connected(scan_root) {
            nodes.push(scan_root);
            nodes.extend(doc.composed_descendants(scan_root));
        }
        for node in nodes {
            let Some(el) = doc.element(node) else {
                continue;
            };
            if el.tag == "label" {
                if let Some(target) = el.attr("for") {
                    index.labels_for.entry(target.to_string()).or_default().push(node);
                }
            }
            if let Some(controls) = el.attr("aria-controls") {
                for target in controls.split_whitespace() {
                    let controllers = index.controllers.entry(target.to_string()).or_default();
                    if controllers.last() != Some(&node) {
                        controllers.push(node);
                    }
                }
            }
            if HEADING_TAGS.contains(&el.tag.as_str()) {
                index.record_heading(doc, node);
            }
        }
        index
    }

    /// Claim `heading` for every light-tree ancestor that has none yet.
    fn record_heading(&mut self, doc: &Document, heading: NodeId) {
        let mut current = doc.parent(heading);
        while let Some(ancestor) = current {
            if doc.is_shadow_root(ancestor) || !doc.is_element(ancestor) {
                break;
            }
            self.first_heading.entry(ancestor).or_insert(heading);
            current = doc.parent(ancestor);
        }
    }

    pub fn labels_for(&self, id: &str) -> &[NodeId] {
        self.labels_for.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn controllers_of(&self, id: &str) -> &[NodeId] {
        self.controllers.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn first_heading(&self, node: NodeId) -> Option<NodeId> {
        self.first_heading.get(&node).copied()
    }
}
