use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dom::document::{FileMeta, NodeId};
use crate::dom::validity::ValidityState;

// ============================================================================
// Canonical types
// ============================================================================

/// Normalized semantic type of an interactive surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CanonicalType {
    Text,
    Email,
    Password,
    Search,
    Tel,
    Url,
    Textarea,
    Number,
    Range,
    Date,
    DatetimeLocal,
    Time,
    Month,
    Week,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
    File,
    Color,
    Hidden,
    ContentEditable,
    AriaTextbox,
    AriaCombobox,
    AriaListbox,
    AriaSlider,
    AriaSpinbutton,
}

/// Coarse grouping of canonical types that share value semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeFamily {
    Text,
    Numeric,
    Date,
    Checkbox,
    Radio,
    Select,
    SelectMultiple,
    File,
    Color,
    Editable,
    Aria,
}

impl CanonicalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalType::Text => "text",
            CanonicalType::Email => "email",
            CanonicalType::Password => "password",
            CanonicalType::Search => "search",
            CanonicalType::Tel => "tel",
            CanonicalType::Url => "url",
            CanonicalType::Textarea => "textarea",
            CanonicalType::Number => "number",
            CanonicalType::Range => "range",
            CanonicalType::Date => "date",
            CanonicalType::DatetimeLocal => "datetime-local",
            CanonicalType::Time => "time",
            CanonicalType::Month => "month",
            CanonicalType::Week => "week",
            CanonicalType::Checkbox => "checkbox",
            CanonicalType::Radio => "radio",
            CanonicalType::Select => "select",
            CanonicalType::SelectMultiple => "select-multiple",
            CanonicalType::File => "file",
            CanonicalType::Color => "color",
            CanonicalType::Hidden => "hidden",
            CanonicalType::ContentEditable => "contenteditable",
            CanonicalType::AriaTextbox => "aria-textbox",
            CanonicalType::AriaCombobox => "aria-combobox",
            CanonicalType::AriaListbox => "aria-listbox",
            CanonicalType::AriaSlider => "aria-slider",
            CanonicalType::AriaSpinbutton => "aria-spinbutton",
        }
    }

    pub fn family(&self) -> TypeFamily {
        match self {
            CanonicalType::Text
            | CanonicalType::Email
            | CanonicalType::Password
            | CanonicalType::Search
            | CanonicalType::Tel
            | CanonicalType::Url
            | CanonicalType::Textarea
            | CanonicalType::Hidden => TypeFamily::Text,
            CanonicalType::Number | CanonicalType::Range => TypeFamily::Numeric,
            CanonicalType::Date
            | CanonicalType::DatetimeLocal
            | CanonicalType::Time
            | CanonicalType::Month
            | CanonicalType::Week => TypeFamily::Date,
            CanonicalType::Checkbox => TypeFamily::Checkbox,
            CanonicalType::Radio => TypeFamily::Radio,
            CanonicalType::Select => TypeFamily::Select,
            CanonicalType::SelectMultiple => TypeFamily::SelectMultiple,
            CanonicalType::File => TypeFamily::File,
            CanonicalType::Color => TypeFamily::Color,
            CanonicalType::ContentEditable => TypeFamily::Editable,
            CanonicalType::AriaTextbox
            | CanonicalType::AriaCombobox
            | CanonicalType::AriaListbox
            | CanonicalType::AriaSlider
            | CanonicalType::AriaSpinbutton => TypeFamily::Aria,
        }
    }
}

// ============================================================================
// Values
// ============================================================================

/// Current or default value of a surface. The shape depends on its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Text(String),
    List(Vec<String>),
    Files(Vec<FileMeta>),
    #[serde(rename_all = "camelCase")]
    Date {
        value: String,
        as_date: Option<String>,
        as_number: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Editable { text_content: String, html: String },
}

impl FieldValue {
    /// Flat string form used for matching and validation.
    pub fn as_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Bool(b) => b.to_string(),
            FieldValue::Text(s) => s.clone(),
            FieldValue::List(items) => items.join(","),
            FieldValue::Files(files) => files
                .iter()
                .map(|f| f.name.as_str())
                .collect::<Vec<_>>()
                .join(","),
            FieldValue::Date { value, .. } => value.clone(),
            FieldValue::Editable { text_content, .. } => text_content.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Bool(b) => !b,
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(items) => items.is_empty(),
            FieldValue::Files(files) => files.is_empty(),
            FieldValue::Date { value, .. } => value.is_empty(),
            FieldValue::Editable { text_content, .. } => text_content.trim().is_empty(),
        }
    }
}

// ============================================================================
// Element descriptor
// ============================================================================

/// Which step of the label cascade produced an element's label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabelSource {
    AriaLabel,
    AriaLabelledBy,
    LabelFor,
    WrappingLabel,
    Container,
    PrecedingText,
    TableHeader,
    NumericId,
    Placeholder,
    Title,
    NameOrId,
    GroupLegend,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    pub required: bool,
    pub pattern: Option<String>,
    pub min: Option<String>,
    pub max: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub step: Option<String>,
    pub accept: Option<String>,
    pub multiple: bool,
    pub validity: ValidityState,
}

impl Constraints {
    pub fn has_any(&self) -> bool {
        self.required
            || self.pattern.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.step.is_some()
            || self.accept.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityInfo {
    pub aria_label: Option<String>,
    pub labelled_by: Vec<String>,
    pub described_by: Vec<String>,
    pub descriptions: Vec<String>,
    pub role: Option<String>,
    pub aria_required: bool,
    pub aria_invalid: bool,
    pub expanded: Option<bool>,
    pub hidden: bool,
    pub keyboard_navigable: bool,
    pub tab_index: Option<i32>,
}

impl AccessibilityInfo {
    pub fn has_any(&self) -> bool {
        self.aria_label.is_some()
            || !self.labelled_by.is_empty()
            || !self.described_by.is_empty()
            || self.role.is_some()
            || self.aria_required
            || self.aria_invalid
            || self.expanded.is_some()
            || self.hidden
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub id: String,
    pub node: NodeId,
    pub value: String,
    pub label: Option<String>,
    pub checked: bool,
}

/// Radio/checkbox membership merged into one descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupInfo {
    pub name: String,
    pub member_count: usize,
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependencies {
    pub controls: Vec<String>,
    pub controlled_by: Vec<String>,
    pub described_by: Vec<String>,
    pub confirm_target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionInfo {
    pub tag: String,
    pub role: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementContext {
    pub fieldset: Option<String>,
    pub legend: Option<String>,
    pub form: Option<String>,
    pub section: Option<SectionInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionInfo {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// One interactive surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementDescriptor {
    pub id: String,
    pub node: NodeId,
    pub tag_name: String,
    #[serde(rename = "type")]
    pub kind: CanonicalType,
    pub name: Option<String>,
    pub value: FieldValue,
    pub default_value: FieldValue,
    pub label: Option<String>,
    pub label_source: Option<LabelSource>,
    pub placeholder: Option<String>,
    pub selector: String,
    pub position: Position,
    pub dimensions: Dimensions,
    pub visible: bool,
    pub disabled: bool,
    pub readonly: bool,
    pub constraints: Constraints,
    pub accessibility: AccessibilityInfo,
    pub group: Option<GroupInfo>,
    pub dependencies: Dependencies,
    pub context: ElementContext,
    pub options: Vec<OptionInfo>,
    pub classes: Vec<String>,
    /// `data-*` attributes, keyed without the prefix.
    pub custom: BTreeMap<String, String>,
}

impl ElementDescriptor {
    pub fn has_validation(&self) -> bool {
        self.constraints.has_any() || self.custom.contains_key("validate")
    }

    pub fn has_accessibility(&self) -> bool {
        self.accessibility.has_any()
    }

    pub fn has_custom(&self) -> bool {
        !self.custom.is_empty()
    }

    /// Nodes backing this descriptor: group members or the element itself.
    pub fn nodes(&self) -> Vec<NodeId> {
        match &self.group {
            Some(group) => group.members.iter().map(|m| m.node).collect(),
            None => vec![self.node],
        }
    }
}

// ============================================================================
// Containers, groups and the snapshot
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FormKind {
    Native,
    Heuristic,
    Standalone,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormStructure {
    pub element_count: usize,
    pub fieldsets: usize,
    pub required_fields: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormAccessibility {
    pub labelled: usize,
    pub unlabelled: usize,
    pub with_aria: usize,
}

/// A form or form-like container and its surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDescriptor {
    pub id: String,
    pub node: Option<NodeId>,
    pub kind: FormKind,
    pub name: Option<String>,
    pub action: Option<String>,
    pub method: String,
    pub enctype: String,
    pub autocomplete: Option<String>,
    pub novalidate: bool,
    pub elements: Vec<ElementDescriptor>,
    pub structure: FormStructure,
    pub accessibility: FormAccessibility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldGroupKind {
    Fieldset,
    NamePattern,
    Semantic,
}

/// A relationship spanning several elements. Membership is non-exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGroup {
    pub id: String,
    pub kind: FieldGroupKind,
    pub name: String,
    pub element_ids: Vec<String>,
    pub confidence: f32,
}

/// Constraint summary for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRule {
    pub element_id: String,
    pub rules: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_forms: usize,
    pub total_elements: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_tag: BTreeMap<String, usize>,
    pub with_validation: usize,
    pub with_accessibility: usize,
    pub with_custom: usize,
    pub required: usize,
    pub complexity_score: u32,
}

/// One complete, immutable scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionSnapshot {
    pub timestamp: DateTime<Utc>,
    pub forms: Vec<FormDescriptor>,
    pub field_groups: Vec<FieldGroup>,
    pub validation_rules: Vec<ValidationRule>,
    pub statistics: Statistics,
    pub extraction_time_ms: f64,
}

impl ExtractionSnapshot {
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            forms: Vec::new(),
            field_groups: Vec::new(),
            validation_rules: Vec::new(),
            statistics: Statistics::default(),
            extraction_time_ms: 0.0,
        }
    }

    pub fn elements(&self) -> impl Iterator<Item = &ElementDescriptor> {
        self.forms.iter().flat_map(|f| f.elements.iter())
    }

    pub fn element_count(&self) -> usize {
        self.forms.iter().map(|f| f.elements.len()).sum()
    }
}
