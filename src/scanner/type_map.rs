use crate::dom::document::ElementData;
use crate::scanner::element_model::CanonicalType;

/// Map a native `<input type>` to its canonical type.
///
/// Button-like types are not input surfaces and yield `None`; any other
/// unrecognized type falls back to `Text`.
pub fn input_type_to_canonical(input_type: &str) -> Option<CanonicalType> {
    let canonical = match input_type {
        "text" => CanonicalType::Text,
        "email" => CanonicalType::Email,
        "password" => CanonicalType::Password,
        "search" => CanonicalType::Search,
        "tel" => CanonicalType::Tel,
        "url" => CanonicalType::Url,
        "number" => CanonicalType::Number,
        "range" => CanonicalType::Range,
        "date" => CanonicalType::Date,
        "datetime-local" | "datetime" => CanonicalType::DatetimeLocal,
        "time" => CanonicalType::Time,
        "month" => CanonicalType::Month,
        "week" => CanonicalType::Week,
        "checkbox" => CanonicalType::Checkbox,
        "radio" => CanonicalType::Radio,
        "file" => CanonicalType::File,
        "color" => CanonicalType::Color,
        "hidden" => CanonicalType::Hidden,
        "submit" | "button" | "reset" | "image" => return None,
        _ => CanonicalType::Text,
    };
    Some(canonical)
}

pub fn role_to_canonical(role: &str) -> Option<CanonicalType> {
    match role.trim().to_ascii_lowercase().as_str() {
        "textbox" | "searchbox" => Some(CanonicalType::AriaTextbox),
        "combobox" => Some(CanonicalType::AriaCombobox),
        "listbox" => Some(CanonicalType::AriaListbox),
        "slider" => Some(CanonicalType::AriaSlider),
        "spinbutton" => Some(CanonicalType::AriaSpinbutton),
        _ => None,
    }
}

pub fn is_editable_region(el: &ElementData) -> bool {
    el.attr("contenteditable").is_some_and(|v| {
        let v = v.trim().to_ascii_lowercase();
        v.is_empty() || v == "true" || v == "plaintext-only"
    })
}

/// Classify an element. Native tags win over roles, roles over editability.
pub fn classify(el: &ElementData) -> Option<CanonicalType> {
    match el.tag.as_str() {
        "input" => input_type_to_canonical(&el.input_type()),
        "textarea" => Some(CanonicalType::Textarea),
        "select" if el.has_attr("multiple") => Some(CanonicalType::SelectMultiple),
        "select" => Some(CanonicalType::Select),
        "button" | "option" | "optgroup" => None,
        _ => el
            .attr("role")
            .and_then(role_to_canonical)
            .or_else(|| is_editable_region(el).then_some(CanonicalType::ContentEditable)),
    }
}

/// Whether the element is a native form control (labelable, has validity).
pub fn is_native_control(el: &ElementData) -> bool {
    matches!(el.tag.as_str(), "input" | "select" | "textarea")
}

/// Containers whose content is never scanned.
pub fn is_excluded_container(tag: &str) -> bool {
    matches!(tag, "script" | "style" | "noscript" | "template")
}
