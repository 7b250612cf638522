use std::collections::BTreeSet;

use tracing::warn;

use crate::dom::document::{Document, NodeId};
use crate::error::DocumentError;

pub const HIGHLIGHT_ATTR: &str = "data-fie-highlight";

/// Nodes currently carrying the highlight marker. Owned by the caller and
/// independent of snapshot lifetime.
#[derive(Debug, Default)]
pub struct HighlightSet {
    nodes: BTreeSet<NodeId>,
}

impl HighlightSet {
    /// Mark `nodes` with `tone`, clearing earlier markers first when
    /// `replace` is set. Every node is checked up front, so a bad target
    /// leaves both the document and the set untouched.
    pub fn mark(
        &mut self,
        doc: &mut Document,
        nodes: &[NodeId],
        tone: &str,
        replace: bool,
    ) -> Result<(), DocumentError> {
        if let Some(bad) = nodes.iter().find(|n| !doc.is_element(**n)) {
            return Err(DocumentError::NotAnElement(*bad));
        }
        if replace {
            self.clear(doc);
        }
        for node in nodes {
            doc.set_attribute(*node, HIGHLIGHT_ATTR, tone)?;
            self.nodes.insert(*node);
        }
        Ok(())
    }

    /// Clear every marker still attached. Nodes that no longer exist are
    /// forgotten.
    pub fn clear(&mut self, doc: &mut Document) -> usize {
        let count = self.nodes.len();
        for node in std::mem::take(&mut self.nodes) {
            if doc.attr(node, HIGHLIGHT_ATTR).is_none() {
                continue;
            }
            if let Err(e) = doc.remove_attribute(node, HIGHLIGHT_ATTR) {
                warn!(node = %node, error = %e, "could not clear highlight");
            }
        }
        count
    }

    pub fn nodes(&self) -> Vec<NodeId> {
        self.nodes.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
