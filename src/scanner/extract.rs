use std::collections::BTreeMap;

use crate::dom::document::{Document, NodeId};
use crate::dom::selector::{is_simple_ident, quote_attr_value};
use crate::dom::validity::{
    compute_validity, date_family_millis, option_value, select_options, selected_option_values,
    selected_options,
};
use crate::error::DocumentError;
use crate::scanner::element_model::{
    AccessibilityInfo, CanonicalType, Constraints, Dependencies, Dimensions, ElementContext,
    ElementDescriptor, FieldValue, OptionInfo, Position, SectionInfo, TypeFamily,
};
use crate::scanner::index::ScanIndex;
use crate::scanner::labels::resolve_label;
use crate::scanner::normalize::{clean_label, generated_id};
use crate::scanner::type_map::is_native_control;

const LANDMARK_TAGS: [&str; 7] = ["section", "main", "aside", "nav", "header", "footer", "article"];
const LANDMARK_ROLES: [&str; 8] = [
    "main",
    "region",
    "navigation",
    "complementary",
    "banner",
    "contentinfo",
    "form",
    "search",
];

// ============================================================================
// Per-element extraction
// ============================================================================

/// Build the descriptor of one surface. The returned `id` is the base id;
/// the scanner makes it unique within the snapshot.
pub fn extract_element(
    doc: &Document,
    index: &ScanIndex,
    node: NodeId,
    kind: CanonicalType,
) -> Result<ElementDescriptor, DocumentError> {
    let el = doc.element(node).ok_or(DocumentError::NotAnElement(node))?;
    let selector = structural_selector(doc, node);
    let id = base_id(doc, node, &selector);
    let (label, label_source) = match resolve_label(doc, index, node) {
        Some((label, source)) => (Some(label), Some(source)),
        None => (None, None),
    };
    let rect = el.rect.unwrap_or(crate::dom::document::Rect::new(0.0, 0.0, 0.0, 0.0));

    let custom: BTreeMap<String, String> = el
        .attrs
        .iter()
        .filter_map(|(k, v)| k.strip_prefix("data-").map(|key| (key.to_string(), v.clone())))
        .filter(|(k, _)| !k.starts_with("fie-"))
        .collect();

    Ok(ElementDescriptor {
        id,
        node,
        tag_name: el.tag.clone(),
        kind,
        name: el.name().map(str::to_string),
        value: extract_value(doc, node, kind),
        default_value: extract_default_value(doc, node, kind),
        label,
        label_source,
        placeholder: el.attr("placeholder").map(str::to_string),
        selector,
        position: Position {
            x: rect.x,
            y: rect.y,
        },
        dimensions: Dimensions {
            width: rect.width,
            height: rect.height,
        },
        visible: is_rendered(doc, node),
        disabled: is_disabled(doc, node),
        readonly: el.has_attr("readonly") || el.attr_is_true("aria-readonly"),
        constraints: extract_constraints(doc, node),
        accessibility: extract_accessibility(doc, node),
        group: None,
        dependencies: extract_dependencies(doc, index, node),
        context: extract_context(doc, index, node),
        options: extract_options(doc, node, kind),
        classes: el.classes().map(str::to_string).collect(),
        custom,
    })
}

/// Native id, else name, else a hash of the structural path.
pub fn base_id(doc: &Document, node: NodeId, selector: &str) -> String {
    let el = doc.element(node);
    el.and_then(|e| e.id())
        .or_else(|| el.and_then(|e| e.name()))
        .map(str::to_string)
        .unwrap_or_else(|| generated_id(selector))
}

/// Structural selector: climbs to the nearest ancestor with a simple id, or
/// to `body`, disambiguating siblings with `:nth-of-type`.
pub fn structural_selector(doc: &Document, node: NodeId) -> String {
    let mut segments = Vec::new();
    let mut current = Some(node);

    while let Some(n) = current {
        let Some(el) = doc.element(n) else { break };
        if el.tag == "body" {
            segments.push("body".to_string());
            break;
        }
        if let Some(id) = el.id().filter(|id| is_simple_ident(id)) {
            segments.push(format!("{}#{}", el.tag, id));
            break;
        }

        let mut segment = el.tag.clone();
        if n == node {
            if let Some(name) = el.name() {
                segment.push_str(&format!("[name={}]", quote_attr_value(name)));
            }
        }
        let same_type = doc
            .parent(n)
            .map(|p| {
                doc.children(p)
                    .iter()
                    .filter(|c| doc.tag(**c) == Some(el.tag.as_str()))
                    .count()
            })
            .unwrap_or(1);
        if same_type > 1 {
            segment.push_str(&format!(":nth-of-type({})", doc.index_of_type(n)));
        }
        segments.push(segment);
        current = doc.parent(n).filter(|p| doc.is_element(*p));
    }

    segments.reverse();
    segments.join(" > ")
}

/// Rendered: visible computed style on the element and every ancestor, a
/// non-empty layout box, and no `hidden` attribute.
pub fn is_rendered(doc: &Document, node: NodeId) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    if el.has_attr("hidden") || !el.style.is_rendered() {
        return false;
    }
    if el.rect.is_none_or(|r| r.is_empty()) {
        return false;
    }
    doc.element_ancestors(node).into_iter().all(|a| {
        doc.element(a)
            .is_some_and(|ae| !ae.has_attr("hidden") && ae.style.display != "none")
    })
}

/// Disabled directly, via `aria-disabled`, or by a disabled fieldset.
pub fn is_disabled(doc: &Document, node: NodeId) -> bool {
    let Some(el) = doc.element(node) else {
        return false;
    };
    if el.has_attr("disabled") || el.attr_is_true("aria-disabled") {
        return true;
    }
    is_native_control(el)
        && doc
            .element_ancestors(node)
            .into_iter()
            .any(|a| doc.tag(a) == Some("fieldset") && doc.attr(a, "disabled").is_some())
}

// ============================================================================
// Values
// ============================================================================

pub fn extract_value(doc: &Document, node: NodeId, kind: CanonicalType) -> FieldValue {
    let Some(el) = doc.element(node) else {
        return FieldValue::Null;
    };
    match kind.family() {
        TypeFamily::Checkbox | TypeFamily::Radio => FieldValue::Bool(el.state.checked),
        TypeFamily::SelectMultiple => FieldValue::List(selected_option_values(doc, node)),
        TypeFamily::Select => FieldValue::Text(
            selected_option_values(doc, node)
                .into_iter()
                .next()
                .unwrap_or_default(),
        ),
        TypeFamily::File => FieldValue::Files(el.state.files.clone()),
        TypeFamily::Date => date_value(kind, &el.state.value),
        TypeFamily::Editable => FieldValue::Editable {
            text_content: doc.text_content(node),
            html: doc.inner_html(node),
        },
        TypeFamily::Aria => aria_value(doc, node, kind),
        TypeFamily::Text | TypeFamily::Numeric | TypeFamily::Color => {
            FieldValue::Text(el.state.value.clone())
        }
    }
}

/// Current value of a descriptor read back from the document. Group
/// descriptors report the checked member values.
pub fn live_value(doc: &Document, el: &ElementDescriptor) -> FieldValue {
    let Some(group) = &el.group else {
        return extract_value(doc, el.node, el.kind);
    };
    let checked: Vec<String> = group
        .members
        .iter()
        .filter(|m| doc.checked(m.node))
        .map(|m| m.value.clone())
        .collect();
    match el.kind {
        CanonicalType::Radio => checked
            .into_iter()
            .next()
            .map(FieldValue::Text)
            .unwrap_or(FieldValue::Null),
        _ => FieldValue::List(checked),
    }
}

fn extract_default_value(doc: &Document, node: NodeId, kind: CanonicalType) -> FieldValue {
    let Some(el) = doc.element(node) else {
        return FieldValue::Null;
    };
    match kind.family() {
        TypeFamily::Checkbox | TypeFamily::Radio => FieldValue::Bool(el.state.default_checked),
        TypeFamily::Select | TypeFamily::SelectMultiple => FieldValue::List(
            select_options(doc, node)
                .into_iter()
                .filter(|o| doc.attr(*o, "selected").is_some())
                .map(|o| option_value(doc, o))
                .collect(),
        ),
        TypeFamily::Text | TypeFamily::Numeric | TypeFamily::Color | TypeFamily::Date => {
            FieldValue::Text(el.state.default_value.clone())
        }
        TypeFamily::File | TypeFamily::Editable | TypeFamily::Aria => FieldValue::Null,
    }
}

pub fn date_value(kind: CanonicalType, raw: &str) -> FieldValue {
    let as_number = date_family_millis(kind.as_str(), raw);
    let as_date = match kind {
        CanonicalType::Date | CanonicalType::DatetimeLocal if as_number.is_some() => {
            Some(raw.to_string())
        }
        _ => None,
    };
    FieldValue::Date {
        value: raw.to_string(),
        as_date,
        as_number,
    }
}

fn aria_value(doc: &Document, node: NodeId, kind: CanonicalType) -> FieldValue {
    match kind {
        CanonicalType::AriaSlider | CanonicalType::AriaSpinbutton => FieldValue::Text(
            doc.attr(node, "aria-valuenow").unwrap_or("").to_string(),
        ),
        CanonicalType::AriaListbox => FieldValue::List(
            aria_options(doc, node)
                .into_iter()
                .filter(|o| o.selected)
                .map(|o| o.value)
                .collect(),
        ),
        CanonicalType::AriaCombobox => match aria_options(doc, node).into_iter().find(|o| o.selected) {
            Some(option) => FieldValue::Text(option.value),
            None => FieldValue::Text(doc.text_content(node).trim().to_string()),
        },
        _ => FieldValue::Text(doc.text_content(node).trim().to_string()),
    }
}

/// `role="option"` nodes of an ARIA listbox/combobox, including those in
/// the popup named by `aria-controls`.
pub fn aria_option_nodes(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let mut scopes = vec![node];
    if let Some(popup) = doc.attr(node, "aria-controls").and_then(|id| doc.get_element_by_id(id)) {
        scopes.push(popup);
    }
    scopes
        .into_iter()
        .flat_map(|s| doc.descendants(s))
        .filter(|n| doc.attr(*n, "role") == Some("option"))
        .collect()
}

/// Value of an ARIA option: `data-value`, else its trimmed text.
pub fn aria_option_value(doc: &Document, option: NodeId) -> String {
    doc.attr(option, "data-value")
        .map(str::to_string)
        .unwrap_or_else(|| doc.text_content(option).trim().to_string())
}

pub fn aria_options(doc: &Document, node: NodeId) -> Vec<OptionInfo> {
    aria_option_nodes(doc, node)
        .into_iter()
        .map(|o| {
            OptionInfo {
                value: aria_option_value(doc, o),
                label: doc.text_content(o).trim().to_string(),
                selected: doc.element(o).is_some_and(|e| e.attr_is_true("aria-selected")),
            }
        })
        .collect()
}

fn extract_options(doc: &Document, node: NodeId, kind: CanonicalType) -> Vec<OptionInfo> {
    match kind.family() {
        TypeFamily::Select | TypeFamily::SelectMultiple => {
            let selected = selected_options(doc, node);
            select_options(doc, node)
                .into_iter()
                .map(|o| OptionInfo {
                    value: option_value(doc, o),
                    label: doc.text_content(o).trim().to_string(),
                    selected: selected.contains(&o),
                })
                .collect()
        }
        TypeFamily::Aria => aria_options(doc, node),
        _ => Vec::new(),
    }
}

// ============================================================================
// Constraints, accessibility, relations, context
// ============================================================================

pub fn extract_constraints(doc: &Document, node: NodeId) -> Constraints {
    let Some(el) = doc.element(node) else {
        return Constraints::default();
    };
    let string_attr = |name: &str| el.attr(name).map(str::to_string);
    Constraints {
        required: el.has_attr("required") || el.attr_is_true("aria-required"),
        pattern: string_attr("pattern"),
        min: string_attr("min"),
        max: string_attr("max"),
        min_length: el.attr("minlength").and_then(|v| v.parse().ok()),
        max_length: el.attr("maxlength").and_then(|v| v.parse().ok()),
        step: string_attr("step"),
        accept: string_attr("accept"),
        multiple: el.has_attr("multiple"),
        validity: compute_validity(doc, node),
    }
}

pub fn extract_accessibility(doc: &Document, node: NodeId) -> AccessibilityInfo {
    let Some(el) = doc.element(node) else {
        return AccessibilityInfo::default();
    };
    let id_list = |name: &str| -> Vec<String> {
        el.attr(name)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    };
    let described_by = id_list("aria-describedby");
    let descriptions = described_by
        .iter()
        .filter_map(|id| doc.get_element_by_id(id))
        .filter_map(|n| clean_label(&doc.text_content(n)))
        .collect();
    let tab_index = el.attr("tabindex").and_then(|v| v.trim().parse::<i32>().ok());
    let focusable_by_default = is_native_control(el)
        || crate::scanner::type_map::is_editable_region(el);

    AccessibilityInfo {
        aria_label: el.attr("aria-label").map(str::to_string),
        labelled_by: id_list("aria-labelledby"),
        described_by,
        descriptions,
        role: el.attr("role").map(str::to_string),
        aria_required: el.attr_is_true("aria-required"),
        aria_invalid: el.attr_is_true("aria-invalid"),
        expanded: el
            .attr("aria-expanded")
            .map(|v| v.eq_ignore_ascii_case("true")),
        hidden: el.attr_is_true("aria-hidden"),
        keyboard_navigable: !is_disabled(doc, node)
            && match tab_index {
                Some(t) => t >= 0,
                None => focusable_by_default,
            },
        tab_index,
    }
}

pub fn extract_dependencies(doc: &Document, index: &ScanIndex, node: NodeId) -> Dependencies {
    let Some(el) = doc.element(node) else {
        return Dependencies::default();
    };
    let split = |name: &str| -> Vec<String> {
        el.attr(name)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    };
    let controlled_by = match el.id() {
        Some(id) => index
            .controllers_of(id)
            .iter()
            .map(|n| {
                let sel = structural_selector(doc, *n);
                base_id(doc, *n, &sel)
            })
            .collect(),
        None => Vec::new(),
    };

    Dependencies {
        controls: split("aria-controls"),
        controlled_by,
        described_by: split("aria-describedby"),
        confirm_target: el.attr("data-confirm").map(str::to_string),
    }
}

pub fn extract_context(doc: &Document, index: &ScanIndex, node: NodeId) -> ElementContext {
    let mut context = ElementContext::default();
    for ancestor in doc.element_ancestors(node) {
        let Some(el) = doc.element(ancestor) else {
            continue;
        };
        if context.fieldset.is_none() && el.tag == "fieldset" {
            context.fieldset = Some(
                el.id()
                    .or(el.name())
                    .map(str::to_string)
                    .unwrap_or_else(|| structural_selector(doc, ancestor)),
            );
            context.legend = doc
                .element_children(ancestor)
                .into_iter()
                .find(|c| doc.tag(*c) == Some("legend"))
                .and_then(|l| clean_label(&doc.text_content(l)));
        }
        if context.form.is_none() && el.tag == "form" {
            context.form = el.id().or(el.name()).map(str::to_string);
        }
        let role = el.attr("role").map(str::to_string);
        let is_landmark = LANDMARK_TAGS.contains(&el.tag.as_str())
            || role.as_deref().is_some_and(|r| LANDMARK_ROLES.contains(&r));
        if context.section.is_none() && is_landmark && el.tag != "form" {
            let heading = index
                .first_heading(ancestor)
                .and_then(|h| clean_label(&doc.text_content(h)));
            context.section = Some(SectionInfo {
                tag: el.tag.clone(),
                role,
                label: el.attr("aria-label").and_then(clean_label).or(heading),
            });
        }
    }
    if context.form.is_none() {
        context.form = doc
            .attr(node, "form")
            .filter(|id| doc.get_element_by_id(id).is_some())
            .map(str::to_string);
    }
    context
}
