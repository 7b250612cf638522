use std::collections::BTreeMap;

use crate::dom::document::{Document, NodeId};
use crate::dom::selector::quote_attr_value;
use crate::dom::validity::compute_validity;
use crate::scanner::element_model::{
    CanonicalType, ElementDescriptor, FieldGroup, FieldGroupKind, FieldValue, FormDescriptor,
    GroupInfo, GroupMember, LabelSource, OptionInfo,
};
use crate::scanner::labels::group_label;
use crate::scanner::normalize::clean_label;

// ============================================================================
// Radio / checkbox merging
// ============================================================================

/// Merge same-name radios (any count) and checkboxes (two or more) into one
/// group descriptor placed where the first member was.
pub fn merge_choice_groups(doc: &Document, elements: Vec<ElementDescriptor>) -> Vec<ElementDescriptor> {
    let mut members_by_key: BTreeMap<(CanonicalType, String), Vec<usize>> = BTreeMap::new();
    for (idx, el) in elements.iter().enumerate() {
        if let (CanonicalType::Radio | CanonicalType::Checkbox, Some(name)) = (el.kind, &el.name) {
            members_by_key
                .entry((el.kind, name.clone()))
                .or_default()
                .push(idx);
        }
    }
    members_by_key.retain(|(kind, _), idxs| *kind == CanonicalType::Radio || idxs.len() > 1);

    let mut first_of_group: BTreeMap<usize, (CanonicalType, String)> = BTreeMap::new();
    let mut absorbed = vec![false; elements.len()];
    for (key, idxs) in &members_by_key {
        first_of_group.insert(idxs[0], key.clone());
        for idx in idxs {
            absorbed[*idx] = true;
        }
    }

    let mut out = Vec::with_capacity(elements.len());
    for (idx, el) in elements.iter().enumerate() {
        if let Some(key) = first_of_group.get(&idx) {
            let members: Vec<&ElementDescriptor> = members_by_key[key]
                .iter()
                .map(|i| &elements[*i])
                .collect();
            out.push(build_group_descriptor(doc, key.0, &key.1, &members));
        } else if !absorbed[idx] {
            out.push(el.clone());
        }
    }
    out
}

fn member_value(doc: &Document, node: NodeId) -> String {
    doc.attr(node, "value").unwrap_or("on").to_string()
}

fn build_group_descriptor(
    doc: &Document,
    kind: CanonicalType,
    name: &str,
    members: &[&ElementDescriptor],
) -> ElementDescriptor {
    let first = members[0];
    let group_members: Vec<GroupMember> = members
        .iter()
        .map(|m| GroupMember {
            id: m.id.clone(),
            node: m.node,
            value: member_value(doc, m.node),
            label: m.label.clone(),
            checked: doc.checked(m.node),
        })
        .collect();

    let checked: Vec<String> = group_members
        .iter()
        .filter(|m| m.checked)
        .map(|m| m.value.clone())
        .collect();
    let defaults: Vec<String> = members
        .iter()
        .filter(|m| doc.element(m.node).is_some_and(|e| e.state.default_checked))
        .map(|m| member_value(doc, m.node))
        .collect();

    let (value, default_value) = match kind {
        CanonicalType::Radio => (
            checked.first().cloned().map(FieldValue::Text).unwrap_or(FieldValue::Null),
            defaults.first().cloned().map(FieldValue::Text).unwrap_or(FieldValue::Null),
        ),
        _ => (FieldValue::List(checked), FieldValue::List(defaults)),
    };

    let (label, label_source) = match group_label(doc, first.node) {
        Some(l) => (Some(l), Some(LabelSource::GroupLegend)),
        None => (clean_label(name), Some(LabelSource::NameOrId)),
    };

    let mut constraints = first.constraints.clone();
    constraints.required = members.iter().any(|m| m.constraints.required);
    constraints.validity = compute_validity(doc, first.node);

    let options = group_members
        .iter()
        .map(|m| OptionInfo {
            value: m.value.clone(),
            label: m.label.clone().unwrap_or_else(|| m.value.clone()),
            selected: m.checked,
        })
        .collect();

    ElementDescriptor {
        id: name.to_string(),
        node: first.node,
        kind,
        name: Some(name.to_string()),
        value,
        default_value,
        label,
        label_source,
        selector: format!("input[name={}]", quote_attr_value(name)),
        visible: members.iter().any(|m| m.visible),
        disabled: members.iter().all(|m| m.disabled),
        constraints,
        group: Some(GroupInfo {
            name: name.to_string(),
            member_count: group_members.len(),
            members: group_members,
        }),
        options,
        ..first.clone()
    }
}

// ============================================================================
// Field groups
// ============================================================================

const SEMANTIC_CLUSTERS: [(&str, &[&str]); 5] = [
    (
        "address",
        &[
            "address", "street", "city", "state", "zip", "postal", "country", "province",
        ],
    ),
    ("contact", &["email", "phone", "tel", "mobile", "fax", "contact"]),
    (
        "payment",
        &["card", "cc-", "cvv", "cvc", "expir", "billing", "payment"],
    ),
    (
        "name",
        &[
            "first name", "last name", "firstname", "lastname", "surname", "given", "family",
            "full name", "middle",
        ],
    ),
    ("credentials", &["password", "username", "user name", "login"]),
];

/// Detect fieldset, naming-pattern and semantic groups across all forms.
pub fn detect_field_groups(forms: &[FormDescriptor]) -> Vec<FieldGroup> {
    let mut groups = Vec::new();

    for form in forms {
        groups.extend(fieldset_groups(form));
        groups.extend(name_pattern_groups(form));
        groups.extend(semantic_groups(form));
    }
    groups
}

fn fieldset_groups(form: &FormDescriptor) -> Vec<FieldGroup> {
    let mut by_fieldset: BTreeMap<String, (Option<String>, Vec<String>)> = BTreeMap::new();
    for el in &form.elements {
        if let Some(fieldset) = &el.context.fieldset {
            let entry = by_fieldset
                .entry(fieldset.clone())
                .or_insert_with(|| (el.context.legend.clone(), Vec::new()));
            entry.1.push(el.id.clone());
        }
    }
    by_fieldset
        .into_iter()
        .map(|(fieldset, (legend, ids))| FieldGroup {
            id: format!("{}:fieldset:{}", form.id, fieldset),
            kind: FieldGroupKind::Fieldset,
            name: legend.unwrap_or(fieldset),
            element_ids: ids,
            confidence: 1.0,
        })
        .collect()
}

/// Prefix shared by `prefix[..]`, `prefix_..`, `prefix-..` and `prefix.` names.
pub fn name_prefix(name: &str) -> Option<&str> {
    if let Some(pos) = name.find('[') {
        return Some(&name[..pos]).filter(|p| !p.is_empty());
    }
    let pos = name.find(['_', '-', '.'])?;
    Some(&name[..pos]).filter(|p| !p.is_empty())
}

fn name_pattern_groups(form: &FormDescriptor) -> Vec<FieldGroup> {
    let mut by_prefix: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for el in &form.elements {
        if let Some(prefix) = el.name.as_deref().and_then(name_prefix) {
            by_prefix
                .entry(prefix.to_lowercase())
                .or_default()
                .push(el.id.clone());
        }
    }
    by_prefix
        .into_iter()
        .filter(|(_, ids)| ids.len() >= 2)
        .map(|(prefix, ids)| FieldGroup {
            id: format!("{}:name:{}", form.id, prefix),
            kind: FieldGroupKind::NamePattern,
            name: prefix,
            element_ids: ids,
            confidence: 0.8,
        })
        .collect()
}

fn semantic_groups(form: &FormDescriptor) -> Vec<FieldGroup> {
    let mut out = Vec::new();
    for (cluster, keywords) in SEMANTIC_CLUSTERS {
        let members: Vec<String> = form
            .elements
            .iter()
            .filter(|el| {
                let text = semantic_text(el);
                keywords.iter().any(|k| text.contains(k))
            })
            .map(|el| el.id.clone())
            .collect();

        if members.len() >= 2 {
            let confidence = (members.len() as f32 / form.elements.len().max(1) as f32)
                .clamp(0.0, 1.0);
            out.push(FieldGroup {
                id: format!("{}:semantic:{}", form.id, cluster),
                kind: FieldGroupKind::Semantic,
                name: cluster.to_string(),
                element_ids: members,
                confidence,
            });
        }
    }
    out
}

fn semantic_text(el: &ElementDescriptor) -> String {
    let mut text = String::new();
    for part in [
        el.label.as_deref(),
        el.name.as_deref(),
        el.placeholder.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        text.push_str(&part.to_lowercase());
        text.push(' ');
    }
    text
}
