use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dom::mutation::MutationRecord;
use crate::dom::selector::SelectorList;
use crate::error::DocumentError;

// ============================================================================
// Identity and geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Document shared between the engine, its watcher task and the host.
pub type SharedDocument = Arc<RwLock<Document>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Layout box assigned to elements that carry no explicit geometry.
pub const DEFAULT_RECT: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 160.0,
    height: 24.0,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f32,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "inline-block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
        }
    }
}

impl ComputedStyle {
    pub fn hidden() -> Self {
        Self {
            display: "none".to_string(),
            ..Self::default()
        }
    }

    pub fn is_rendered(&self) -> bool {
        self.display != "none"
            && self.visibility != "hidden"
            && self.visibility != "collapse"
            && self.opacity > 0.0
    }
}

/// Metadata of a selected file. Contents are never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub name: String,
    pub size: u64,
    #[serde(rename = "type")]
    pub mime_type: String,
    #[serde(default)]
    pub last_modified: i64,
}

/// Live control state, separate from attributes as in a browser.
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    pub value: String,
    pub default_value: String,
    pub dirty: bool,
    pub checked: bool,
    pub default_checked: bool,
    pub selected: bool,
    pub files: Vec<FileMeta>,
}

// ============================================================================
// Nodes
// ============================================================================

#[derive(Debug, Clone)]
pub struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub shadow_root: Option<NodeId>,
    pub rect: Option<Rect>,
    pub style: ComputedStyle,
    pub state: ControlState,
}

impl ElementData {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            shadow_root: None,
            rect: Some(DEFAULT_RECT),
            style: ComputedStyle::default(),
            state: ControlState::default(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|(k, _)| k == name)
    }

    /// Boolean ARIA-style attribute: present and equal to "true".
    pub fn attr_is_true(&self, name: &str) -> bool {
        self.attr(name)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    /// Non-empty `id` attribute.
    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|v| !v.trim().is_empty())
    }

    /// Non-empty `name` attribute.
    pub fn name(&self) -> Option<&str> {
        self.attr("name").filter(|v| !v.trim().is_empty())
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    /// Lowercased `type` attribute of an input, defaulting to `text`.
    pub fn input_type(&self) -> String {
        self.attr("type")
            .map(|t| t.trim().to_ascii_lowercase())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "text".to_string())
    }

    pub fn is_input(&self) -> bool {
        self.tag == "input"
    }
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    ShadowRoot,
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub data: NodeData,
}

impl Node {
    pub fn element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }
}

/// An event dispatched at a control after its value changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchedEvent {
    pub target: NodeId,
    pub kind: String,
}

// ============================================================================
// Document arena
// ============================================================================

/// Arena-backed document tree with mutation observers.
///
/// Structural edits and attribute edits are published to every observer
/// returned by [`Document::observe`]. Control state (value, checked,
/// selected, files) and layout are not mutations.
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    /// Every element that has carried an `id`, attached or not.
    ids: HashMap<String, Vec<NodeId>>,
    observers: Vec<mpsc::UnboundedSender<MutationRecord>>,
    events: Vec<DispatchedEvent>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.len())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = Node {
            id: NodeId(0),
            parent: None,
            children: vec![NodeId(1)],
            data: NodeData::Document,
        };
        let body = Node {
            id: NodeId(1),
            parent: Some(NodeId(0)),
            children: Vec::new(),
            data: NodeData::Element(ElementData::new("body")),
        };

        Self {
            nodes: vec![root, body],
            root: NodeId(0),
            body: NodeId(1),
            ids: HashMap::new(),
            observers: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedDocument {
        Arc::new(RwLock::new(self))
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 2
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, DocumentError> {
        self.nodes.get(id.0).ok_or(DocumentError::UnknownNode(id))
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.nodes.get(id.0).and_then(|n| n.element())
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DocumentError> {
        match self.nodes.get_mut(id.0) {
            Some(Node {
                data: NodeData::Element(el),
                ..
            }) => Ok(el),
            Some(_) => Err(DocumentError::NotAnElement(id)),
            None => Err(DocumentError::UnknownNode(id)),
        }
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|el| el.attr(name))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Text(t)) => Some(t),
            _ => None,
        }
    }

    pub fn is_shadow_root(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|n| &n.data),
            Some(NodeData::ShadowRoot)
        )
    }

    // ------------------------------------------------------------------
    // Construction and structural edits
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeData::Element(ElementData::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeData::Text(text.to_string()))
    }

    fn push_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            parent: None,
            children: Vec::new(),
            data,
        });
        id
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DocumentError> {
        let parent_node = self.node(parent)?;
        if matches!(parent_node.data, NodeData::Text(_)) {
            return Err(DocumentError::InvalidHierarchy {
                parent,
                child,
                reason: "text nodes cannot have children".into(),
            });
        }
        self.node(child)?;
        if child == parent || self.ancestors(parent).contains(&child) {
            return Err(DocumentError::InvalidHierarchy {
                parent,
                child,
                reason: "insertion would create a cycle".into(),
            });
        }
        if matches!(self.nodes[child.0].data, NodeData::Document | NodeData::ShadowRoot) {
            return Err(DocumentError::InvalidHierarchy {
                parent,
                child,
                reason: "document and shadow roots cannot be re-parented".into(),
            });
        }

        if self.nodes[child.0].parent.is_some() {
            self.remove(child)?;
        }

        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        self.publish(MutationRecord::child_list(parent, vec![child], vec![]));
        Ok(())
    }

    /// Detach a node (and its subtree) from its parent.
    pub fn remove(&mut self, id: NodeId) -> Result<(), DocumentError> {
        let parent = match self.node(id)?.parent {
            Some(p) => p,
            None => return Ok(()),
        };
        if self.is_shadow_root(id) {
            return Err(DocumentError::InvalidHierarchy {
                parent,
                child: id,
                reason: "shadow roots cannot be detached".into(),
            });
        }
        self.nodes[parent.0].children.retain(|c| *c != id);
        self.nodes[id.0].parent = None;
        self.publish(MutationRecord::child_list(parent, vec![], vec![id]));
        Ok(())
    }

    pub fn remove_children(&mut self, id: NodeId) -> Result<(), DocumentError> {
        let children = self.node(id)?.children.clone();
        for child in children {
            self.remove(child)?;
        }
        Ok(())
    }

    pub fn attach_shadow(&mut self, host: NodeId) -> Result<NodeId, DocumentError> {
        if let Some(existing) = self.element_mut(host)?.shadow_root {
            return Ok(existing);
        }
        let shadow = self.push_node(NodeData::ShadowRoot);
        self.nodes[shadow.0].parent = Some(host);
        self.element_mut(host)?.shadow_root = Some(shadow);
        self.publish(MutationRecord::child_list(host, vec![shadow], vec![]));
        Ok(shadow)
    }

    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.element(host).and_then(|el| el.shadow_root)
    }

    /// Set an attribute, applying the reflected control-state defaults.
    pub fn set_attribute(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        let old = el.attr(&name).map(str::to_string);
        match el.attrs.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => el.attrs.push((name.clone(), value.to_string())),
        }

        match name.as_str() {
            "value" if el.tag == "input" => {
                el.state.default_value = value.to_string();
                if !el.state.dirty {
                    el.state.value = value.to_string();
                }
            }
            "checked" if el.tag == "input" => {
                el.state.default_checked = true;
                el.state.checked = true;
            }
            "selected" if el.tag == "option" => el.state.selected = true,
            _ => {}
        }

        if name == "id" {
            self.unindex_id(id, old.as_deref());
            self.ids.entry(value.to_string()).or_default().push(id);
        }
        self.publish(MutationRecord::attribute(id, &name, old));
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DocumentError> {
        let name = name.to_ascii_lowercase();
        let el = self.element_mut(id)?;
        let Some(pos) = el.attrs.iter().position(|(k, _)| *k == name) else {
            return Ok(());
        };
        let (_, old) = el.attrs.remove(pos);
        if name == "id" {
            self.unindex_id(id, Some(old.as_str()));
        }
        self.publish(MutationRecord::attribute(id, &name, Some(old)));
        Ok(())
    }

    fn unindex_id(&mut self, node: NodeId, old: Option<&str>) {
        let Some(old) = old else { return };
        if let Some(nodes) = self.ids.get_mut(old) {
            nodes.retain(|n| *n != node);
            if nodes.is_empty() {
                self.ids.remove(old);
            }
        }
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Option<Rect>) -> Result<(), DocumentError> {
        self.element_mut(id)?.rect = rect;
        Ok(())
    }

    pub fn set_style(&mut self, id: NodeId, style: ComputedStyle) -> Result<(), DocumentError> {
        self.element_mut(id)?.style = style;
        Ok(())
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DocumentError> {
        self.remove_children(id)?;
        if !text.is_empty() {
            let t = self.create_text(text);
            self.append_child(id, t)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Control state
    // ------------------------------------------------------------------

    /// Seed control state from attributes and content, as a parser would.
    pub fn init_control_state(&mut self, id: NodeId) -> Result<(), DocumentError> {
        let text = self.text_content(id);
        let el = self.element_mut(id)?;
        match el.tag.as_str() {
            "input" => {
                let value = el.attr("value").unwrap_or("").to_string();
                let checked = el.has_attr("checked");
                el.state.value = value.clone();
                el.state.default_value = value;
                el.state.checked = checked;
                el.state.default_checked = checked;
            }
            "textarea" => {
                el.state.value = text.clone();
                el.state.default_value = text;
            }
            "option" => el.state.selected = el.has_attr("selected"),
            _ => {}
        }
        Ok(())
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.state.value.as_str())
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), DocumentError> {
        let el = self.element_mut(id)?;
        el.state.value = value.to_string();
        el.state.dirty = true;
        Ok(())
    }

    pub fn checked(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| el.state.checked)
    }

    pub fn set_checked(&mut self, id: NodeId, checked: bool) -> Result<(), DocumentError> {
        self.element_mut(id)?.state.checked = checked;
        Ok(())
    }

    pub fn selected(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|el| el.state.selected)
    }

    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> Result<(), DocumentError> {
        self.element_mut(id)?.state.selected = selected;
        Ok(())
    }

    pub fn files(&self, id: NodeId) -> &[FileMeta] {
        self.element(id)
            .map(|el| el.state.files.as_slice())
            .unwrap_or(&[])
    }

    /// Host-side file selection (the user picked files).
    pub fn set_files(&mut self, id: NodeId, files: Vec<FileMeta>) -> Result<(), DocumentError> {
        self.element_mut(id)?.state.files = files;
        Ok(())
    }

    pub fn dispatch_event(&mut self, target: NodeId, kind: &str) {
        self.events.push(DispatchedEvent {
            target,
            kind: kind.to_string(),
        });
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Parent chain, nearest first. Crosses shadow roots into their host.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    /// Element ancestors only, nearest first.
    pub fn element_ancestors(&self, id: NodeId) -> Vec<NodeId> {
        self.ancestors(id)
            .into_iter()
            .filter(|a| self.is_element(*a))
            .collect()
    }

    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.element_ancestors(id)
            .into_iter()
            .find(|a| self.tag(*a) == Some(tag))
    }

    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).last() == Some(&self.root)
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor == node || self.ancestors(node).contains(&ancestor)
    }

    /// Light-tree descendants in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id, false)
    }

    /// Descendants including attached shadow trees (hosts first, then their
    /// shadow content, then light children).
    pub fn composed_descendants(&self, id: NodeId) -> Vec<NodeId> {
        self.walk(id, true)
    }

    fn walk(&self, id: NodeId, composed: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        self.push_children(id, composed, &mut stack);
        while let Some(next) = stack.pop() {
            out.push(next);
            self.push_children(next, composed, &mut stack);
        }
        out
    }

    fn push_children(&self, id: NodeId, composed: bool, stack: &mut Vec<NodeId>) {
        for child in self.children(id).iter().rev() {
            stack.push(*child);
        }
        if composed {
            if let Some(shadow) = self.shadow_root(id) {
                stack.push(shadow);
            }
        }
    }

    pub fn previous_siblings(&self, id: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(id) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|c| *c == id).unwrap_or(0);
        siblings[..pos].iter().rev().copied().collect()
    }

    /// 1-based position among element siblings sharing the same tag.
    pub fn index_of_type(&self, id: NodeId) -> usize {
        let (Some(parent), Some(tag)) = (self.parent(id), self.tag(id)) else {
            return 1;
        };
        self.children(parent)
            .iter()
            .filter(|c| self.tag(**c) == Some(tag))
            .position(|c| *c == id)
            .map(|p| p + 1)
            .unwrap_or(1)
    }

    /// Concatenated text of light-tree descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.descendants(id)
            .into_iter()
            .filter_map(|d| self.text(d))
            .collect()
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize_node(*child, &mut out);
        }
        out
    }

    fn serialize_node(&self, id: NodeId, out: &mut String) {
        match self.nodes.get(id.0).map(|n| &n.data) {
            Some(NodeData::Text(t)) => out.push_str(&escape_html(t)),
            Some(NodeData::Element(el)) => {
                out.push('<');
                out.push_str(&el.tag);
                for (k, v) in &el.attrs {
                    out.push_str(&format!(" {}=\"{}\"", k, escape_html(v)));
                }
                out.push('>');
                if !is_void_tag(&el.tag) {
                    for child in self.children(id) {
                        self.serialize_node(*child, out);
                    }
                    out.push_str(&format!("</{}>", el.tag));
                }
            }
            _ => {}
        }
    }

    /// First connected element with `id` in composed document order.
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        let connected: Vec<NodeId> = self
            .ids
            .get(id)?
            .iter()
            .copied()
            .filter(|n| self.is_connected(*n))
            .collect();
        match connected.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => self
                .composed_descendants(self.root)
                .into_iter()
                .find(|n| connected.contains(n)),
        }
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    pub fn matches(&self, id: NodeId, selector: &str) -> Result<bool, DocumentError> {
        let list = SelectorList::parse(selector)?;
        Ok(list.matches(self, id))
    }

    pub fn query_selector(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>, DocumentError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .composed_descendants(scope)
            .into_iter()
            .find(|n| list.matches(self, *n)))
    }

    pub fn query_selector_all(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Vec<NodeId>, DocumentError> {
        let list = SelectorList::parse(selector)?;
        Ok(self
            .composed_descendants(scope)
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect())
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    pub fn observe(&mut self) -> mpsc::UnboundedReceiver<MutationRecord> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn publish(&mut self, record: MutationRecord) {
        self.observers.retain(|tx| tx.send(record.clone()).is_ok());
    }
}

pub fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "input" | "br" | "hr" | "img" | "meta" | "link" | "area" | "base" | "col" | "source" | "wbr"
    )
}

pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
