use chrono::{NaiveDate, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::dom::document::{Document, NodeId};
use crate::dom::fragment::append_fragment;
use crate::dom::validity::{
    date_family_millis, option_value, parse_loose_date, radio_group_nodes, select_options,
};
use crate::error::DocumentError;
use crate::fill::fill_model::ApplyMethod;
use crate::scanner::element_model::{CanonicalType, ElementDescriptor};
use crate::scanner::extract::{aria_option_nodes, aria_option_value};

static HEX_COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("static regex"));

/// Why a value could not be written. Reported per entry, never raised past
/// the orchestrator.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("file inputs cannot be set programmatically (browser security restriction)")]
    FileInputRejected,

    #[error("expected {expected}, got {got}")]
    TypeMismatch { expected: &'static str, got: String },

    #[error("'{0}' is not a number")]
    NotNumeric(String),

    #[error("'{0}' is not a 6-digit hex color")]
    InvalidColor(String),

    #[error("no option matches '{0}'")]
    NoMatchingOption(String),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl ApplyError {
    /// Policy rejections are final; other failures may succeed on an
    /// alternate element.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ApplyError::FileInputRejected)
    }
}

fn kind_of(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}

/// Scalar values as text; arrays and objects have none.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Arrays give one entry per item; any scalar is a single entry.
fn text_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).collect(),
        other => scalar_text(other).map(|s| vec![s]),
    }
}

pub fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Null => Some(false),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "on" | "yes" | "1" | "checked" => Some(true),
            "false" | "off" | "no" | "0" | "" => Some(false),
            _ => None,
        },
        Value::Array(_) | Value::Object(_) => None,
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Write `value` into the element with the handler for its canonical type.
pub fn apply_value(
    doc: &mut Document,
    el: &ElementDescriptor,
    value: &Value,
) -> Result<ApplyMethod, ApplyError> {
    match el.kind {
        CanonicalType::Text
        | CanonicalType::Email
        | CanonicalType::Password
        | CanonicalType::Search
        | CanonicalType::Tel
        | CanonicalType::Url
        | CanonicalType::Textarea
        | CanonicalType::Hidden => apply_text(doc, el.node, value),
        CanonicalType::Number | CanonicalType::Range => apply_number(doc, el.node, value),
        CanonicalType::Date
        | CanonicalType::DatetimeLocal
        | CanonicalType::Time
        | CanonicalType::Month
        | CanonicalType::Week => apply_date(doc, el, value),
        CanonicalType::Checkbox => apply_checkbox(doc, el, value),
        CanonicalType::Radio => apply_radio(doc, el, value),
        CanonicalType::Select => apply_select(doc, el.node, value),
        CanonicalType::SelectMultiple => apply_multi_select(doc, el.node, value),
        CanonicalType::File => Err(ApplyError::FileInputRejected),
        CanonicalType::Color => apply_color(doc, el.node, value),
        CanonicalType::ContentEditable | CanonicalType::AriaTextbox => {
            apply_editable(doc, el.node, value)
        }
        CanonicalType::AriaCombobox | CanonicalType::AriaListbox => {
            apply_aria_selection(doc, el, value)
        }
        CanonicalType::AriaSlider | CanonicalType::AriaSpinbutton => {
            apply_aria_number(doc, el.node, value)
        }
    }
}

fn apply_text(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let text = scalar_text(value).ok_or_else(|| ApplyError::TypeMismatch {
        expected: "text",
        got: kind_of(value),
    })?;
    doc.set_value(node, &text)?;
    Ok(ApplyMethod::DirectAssignment)
}

fn numeric_text(value: &Value) -> Result<String, ApplyError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if s.trim().is_empty() => Ok(String::new()),
        Value::String(s) if s.trim().parse::<f64>().is_ok_and(f64::is_finite) => {
            Ok(s.trim().to_string())
        }
        Value::String(s) => Err(ApplyError::NotNumeric(s.clone())),
        other => Err(ApplyError::TypeMismatch {
            expected: "number",
            got: kind_of(other),
        }),
    }
}

fn apply_number(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let text = numeric_text(value)?;
    doc.set_value(node, &text)?;
    Ok(ApplyMethod::NumericAssignment)
}

/// Strings must already be in the input's own format (calendar dates are
/// also accepted loosely and normalized to `YYYY-MM-DD`); objects carry
/// `value` or the parts of that kind. An empty string clears the input.
fn date_text(kind: CanonicalType, value: &Value) -> Result<String, ApplyError> {
    let expected = match kind {
        CanonicalType::Time => "time string or {hour, minute}",
        CanonicalType::Month => "month string or {year, month}",
        CanonicalType::Week => "week string or {year, week}",
        CanonicalType::DatetimeLocal => "datetime string or {year, month, day, hour, minute}",
        _ => "date string or {year, month, day}",
    };
    let mismatch = |got: String| ApplyError::TypeMismatch { expected, got };

    let raw = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Object(map) => match map.get("value") {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => return date_parts_text(kind, map).ok_or_else(|| mismatch("object".to_string())),
        },
        other => return Err(mismatch(kind_of(other))),
    };

    if raw.is_empty() {
        return Ok(raw);
    }
    if kind == CanonicalType::Date {
        return parse_loose_date(&raw)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .ok_or_else(|| mismatch(format!("'{}'", raw)));
    }
    match date_family_millis(kind.as_str(), &raw) {
        Some(_) => Ok(raw),
        None => Err(mismatch(format!("'{}'", raw))),
    }
}

/// Format the structured parts of one date-family kind, or `None` when a
/// part is missing or out of range.
fn date_parts_text(kind: CanonicalType, map: &serde_json::Map<String, Value>) -> Option<String> {
    let part = |k: &str| map.get(k).and_then(Value::as_u64);
    let small = |k: &str| part(k).and_then(|v| u32::try_from(v).ok());
    let year = || part("year").and_then(|v| i32::try_from(v).ok());

    match kind {
        CanonicalType::Date => {
            let date = NaiveDate::from_ymd_opt(year()?, small("month")?, small("day")?)?;
            Some(date.format("%Y-%m-%d").to_string())
        }
        CanonicalType::DatetimeLocal => {
            let date = NaiveDate::from_ymd_opt(year()?, small("month")?, small("day")?)?;
            let time = NaiveTime::from_hms_opt(
                small("hour").unwrap_or(0),
                small("minute").unwrap_or(0),
                0,
            )?;
            Some(date.and_time(time).format("%Y-%m-%dT%H:%M").to_string())
        }
        CanonicalType::Time => {
            let time = NaiveTime::from_hms_opt(small("hour")?, small("minute")?, 0)?;
            Some(time.format("%H:%M").to_string())
        }
        CanonicalType::Month => {
            let date = NaiveDate::from_ymd_opt(year()?, small("month")?, 1)?;
            Some(date.format("%Y-%m").to_string())
        }
        CanonicalType::Week => {
            let (year, week) = (year()?, small("week")?);
            NaiveDate::from_isoywd_opt(year, week, Weekday::Mon)?;
            Some(format!("{:04}-W{:02}", year, week))
        }
        _ => None,
    }
}

fn apply_date(doc: &mut Document, el: &ElementDescriptor, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let text = date_text(el.kind, value)?;
    doc.set_value(el.node, &text)?;
    Ok(ApplyMethod::DateAssignment)
}

fn apply_checkbox(doc: &mut Document, el: &ElementDescriptor, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let Some(group) = &el.group else {
        let own_value = doc.attr(el.node, "value").map(str::to_string);
        let checked = match (coerce_bool(value), value) {
            (Some(b), _) => b,
            (None, Value::String(s)) if own_value.as_deref() == Some(s.as_str()) => true,
            _ => {
                return Err(ApplyError::TypeMismatch {
                    expected: "boolean",
                    got: kind_of(value),
                });
            }
        };
        doc.set_checked(el.node, checked)?;
        return Ok(ApplyMethod::CheckboxToggle);
    };

    if let Value::Bool(all) = value {
        for member in &group.members {
            doc.set_checked(member.node, *all)?;
        }
        return Ok(ApplyMethod::CheckboxGroup);
    }
    let wanted = text_list(value).ok_or_else(|| ApplyError::TypeMismatch {
        expected: "list of values",
        got: kind_of(value),
    })?;
    let missing: Vec<&str> = wanted
        .iter()
        .filter(|w| !group.members.iter().any(|m| &m.value == *w))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ApplyError::NoMatchingOption(missing.join(", ")));
    }
    for member in &group.members {
        doc.set_checked(member.node, wanted.contains(&member.value))?;
    }
    Ok(ApplyMethod::CheckboxGroup)
}

/// (node, value, label) of every radio in the element's group.
fn radio_members(doc: &Document, el: &ElementDescriptor) -> Vec<(NodeId, String, Option<String>)> {
    if let Some(group) = &el.group {
        return group
            .members
            .iter()
            .map(|m| (m.node, m.value.clone(), m.label.clone()))
            .collect();
    }
    radio_group_nodes(doc, el.node)
        .into_iter()
        .map(|n| (n, doc.attr(n, "value").unwrap_or("on").to_string(), None))
        .collect()
}

fn apply_radio(doc: &mut Document, el: &ElementDescriptor, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let wanted = scalar_text(value).ok_or_else(|| ApplyError::TypeMismatch {
        expected: "option value",
        got: kind_of(value),
    })?;
    let members = radio_members(doc, el);
    let target = members
        .iter()
        .find(|(_, v, _)| *v == wanted)
        .or_else(|| {
            members
                .iter()
                .find(|(_, _, label)| label.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(&wanted)))
        })
        .map(|(node, _, _)| *node)
        .ok_or_else(|| ApplyError::NoMatchingOption(wanted.clone()))?;

    for (node, _, _) in &members {
        doc.set_checked(*node, *node == target)?;
    }
    Ok(ApplyMethod::RadioSelection)
}

fn find_option(doc: &Document, options: &[NodeId], wanted: &str) -> Option<NodeId> {
    options
        .iter()
        .find(|o| option_value(doc, **o) == wanted)
        .or_else(|| {
            options
                .iter()
                .find(|o| doc.text_content(**o).trim().eq_ignore_ascii_case(wanted))
        })
        .copied()
}

fn apply_select(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let wanted = scalar_text(value).ok_or_else(|| ApplyError::TypeMismatch {
        expected: "option value",
        got: kind_of(value),
    })?;
    let options = select_options(doc, node);
    let target = find_option(doc, &options, &wanted)
        .ok_or_else(|| ApplyError::NoMatchingOption(wanted.clone()))?;
    for option in options {
        doc.set_selected(option, option == target)?;
    }
    Ok(ApplyMethod::SelectByValue)
}

fn apply_multi_select(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let wanted = text_list(value).ok_or_else(|| ApplyError::TypeMismatch {
        expected: "list of option values",
        got: kind_of(value),
    })?;
    let options = select_options(doc, node);
    let mut targets = Vec::with_capacity(wanted.len());
    let mut missing = Vec::new();
    for w in &wanted {
        match find_option(doc, &options, w) {
            Some(o) => targets.push(o),
            None => missing.push(w.as_str()),
        }
    }
    if !missing.is_empty() {
        return Err(ApplyError::NoMatchingOption(missing.join(", ")));
    }

    for option in &options {
        doc.set_selected(*option, false)?;
    }
    for option in targets {
        doc.set_selected(option, true)?;
    }
    Ok(ApplyMethod::MultiSelect)
}

fn apply_color(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let text = scalar_text(value).unwrap_or_else(|| kind_of(value));
    let text = text.trim();
    if !HEX_COLOR_RE.is_match(text) {
        return Err(ApplyError::InvalidColor(text.to_string()));
    }
    doc.set_value(node, &text.to_lowercase())?;
    Ok(ApplyMethod::ColorAssignment)
}

fn apply_editable(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(html)) = map.get("html") {
                doc.remove_children(node)?;
                append_fragment(doc, node, html)?;
                return Ok(ApplyMethod::EditableHtml);
            }
            if let Some(Value::String(text)) = map.get("text") {
                doc.set_text_content(node, text)?;
                return Ok(ApplyMethod::EditableText);
            }
            Err(ApplyError::TypeMismatch {
                expected: "text or {html}",
                got: "object without html/text".to_string(),
            })
        }
        other => {
            let text = scalar_text(other).ok_or_else(|| ApplyError::TypeMismatch {
                expected: "text or {html}",
                got: kind_of(other),
            })?;
            doc.set_text_content(node, &text)?;
            Ok(ApplyMethod::EditableText)
        }
    }
}

fn apply_aria_selection(doc: &mut Document, el: &ElementDescriptor, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let wanted = match el.kind {
        CanonicalType::AriaCombobox => scalar_text(value).map(|s| vec![s]),
        _ => text_list(value),
    }
    .ok_or_else(|| ApplyError::TypeMismatch {
        expected: "option value",
        got: kind_of(value),
    })?;
    let options = aria_option_nodes(doc, el.node);

    if options.is_empty() && el.kind == CanonicalType::AriaCombobox {
        if !doc.element_children(el.node).is_empty() {
            return Err(ApplyError::NoMatchingOption(wanted.join(", ")));
        }
        doc.set_text_content(el.node, &wanted.join(", "))?;
        return Ok(ApplyMethod::AriaValue);
    }

    let matches = |o: NodeId, w: &str| {
        aria_option_value(doc, o) == w || doc.text_content(o).trim().eq_ignore_ascii_case(w)
    };
    let missing: Vec<&str> = wanted
        .iter()
        .filter(|w| !options.iter().any(|o| matches(*o, w)))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(ApplyError::NoMatchingOption(missing.join(", ")));
    }

    let chosen: Vec<NodeId> = options
        .iter()
        .copied()
        .filter(|o| wanted.iter().any(|w| matches(*o, w)))
        .collect();
    let chosen = match el.kind {
        CanonicalType::AriaCombobox => chosen.into_iter().take(1).collect(),
        _ => chosen,
    };
    for option in &options {
        let state = if chosen.contains(option) { "true" } else { "false" };
        doc.set_attribute(*option, "aria-selected", state)?;
    }
    if let (CanonicalType::AriaCombobox, Some(first)) = (el.kind, chosen.first()) {
        reflect_combobox_choice(doc, el.node, *first)?;
    }
    Ok(ApplyMethod::AriaSelection)
}

/// Point a combobox at its chosen option. The displayed text is rewritten
/// only for a bare combobox with no child elements, so nested options and
/// inner controls stay in place.
fn reflect_combobox_choice(doc: &mut Document, combobox: NodeId, option: NodeId) -> Result<(), ApplyError> {
    match doc.attr(option, "id").map(str::to_string) {
        Some(id) => doc.set_attribute(combobox, "aria-activedescendant", &id)?,
        None => doc.remove_attribute(combobox, "aria-activedescendant")?,
    }
    if doc.element_children(combobox).is_empty() {
        let label = doc.text_content(option).trim().to_string();
        doc.set_text_content(combobox, &label)?;
    }
    Ok(())
}

fn apply_aria_number(doc: &mut Document, node: NodeId, value: &Value) -> Result<ApplyMethod, ApplyError> {
    let text = numeric_text(value)?;
    doc.set_attribute(node, "aria-valuenow", &text)?;
    Ok(ApplyMethod::AriaValue)
}
