use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::document::{ComputedStyle, Document, FileMeta, NodeId, Rect};
use crate::error::DocumentError;

// ============================================================================
// Declarative document description (JSON / YAML)
// ============================================================================

/// A whole document: the children of `<body>`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentSpec {
    #[serde(default)]
    pub body: Vec<NodeSpec>,
}

/// One node. An entry without `tag` is a text node carrying `text`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,

    /// Children of an attached shadow root.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shadow: Vec<NodeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ComputedStyle>,

    /// Shorthand for `display: none`.
    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileMeta>,
}

impl NodeSpec {
    pub fn element(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::default()
        }
    }

    pub fn text_node(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn shadow(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.shadow.extend(children);
        self
    }

    pub fn rect(mut self, rect: Rect) -> Self {
        self.rect = Some(rect);
        self
    }

    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = Some(style);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn files(mut self, files: Vec<FileMeta>) -> Self {
        self.files = files;
        self
    }
}

impl DocumentSpec {
    pub fn new(body: Vec<NodeSpec>) -> Self {
        Self { body }
    }

    pub fn from_json(raw: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(raw).map_err(|e| DocumentError::SpecParse {
            context: "json".into(),
            reason: e.to_string(),
        })
    }

    pub fn from_yaml(raw: &str) -> Result<Self, DocumentError> {
        serde_yaml::from_str(raw).map_err(|e| DocumentError::SpecParse {
            context: "yaml".into(),
            reason: e.to_string(),
        })
    }

    pub fn build(&self) -> Result<Document, DocumentError> {
        let mut doc = Document::new();
        let body = doc.body();
        for spec in &self.body {
            mount(&mut doc, body, spec)?;
        }
        Ok(doc)
    }
}

/// Materialize `spec` under `parent`, returning the new node.
pub fn mount(doc: &mut Document, parent: NodeId, spec: &NodeSpec) -> Result<NodeId, DocumentError> {
    let Some(tag) = &spec.tag else {
        let text = doc.create_text(spec.text.as_deref().unwrap_or(""));
        doc.append_child(parent, text)?;
        return Ok(text);
    };

    let el = doc.create_element(tag);
    for (k, v) in &spec.attrs {
        doc.set_attribute(el, k, v)?;
    }
    if let Some(rect) = spec.rect {
        doc.set_rect(el, Some(rect))?;
    }
    if let Some(style) = &spec.style {
        doc.set_style(el, style.clone())?;
    }
    if spec.hidden {
        doc.set_style(el, ComputedStyle::hidden())?;
    }

    if let Some(text) = &spec.text {
        let t = doc.create_text(text);
        doc.append_child(el, t)?;
    }
    for child in &spec.children {
        mount(doc, el, child)?;
    }
    if !spec.shadow.is_empty() {
        let root = doc.attach_shadow(el)?;
        for child in &spec.shadow {
            mount(doc, root, child)?;
        }
    }

    doc.init_control_state(el)?;
    if !spec.files.is_empty() {
        doc.set_files(el, spec.files.clone())?;
    }
    doc.append_child(parent, el)?;
    Ok(el)
}
