use crate::dom::document::{Document, NodeId};
use crate::error::DocumentError;
use crate::validation::result::ValidationResult;

pub const ERROR_CONTAINER_CLASS: &str = "fie-errors";

pub fn error_container_id(element_id: &str) -> String {
    format!("{}-errors", element_id)
}

/// Replace any previous annotation of `target` with the errors in `result`,
/// or just clear it when the result is valid.
pub fn annotate(
    doc: &mut Document,
    target: NodeId,
    result: &ValidationResult,
) -> Result<(), DocumentError> {
    clear_annotations(doc, target, &result.element_id)?;
    if result.valid {
        return Ok(());
    }

    let container_id = error_container_id(&result.element_id);
    let container = doc.create_element("div");
    doc.set_attribute(container, "id", &container_id)?;
    doc.set_attribute(container, "role", "alert")?;
    doc.set_attribute(container, "class", ERROR_CONTAINER_CLASS)?;
    let list = doc.create_element("ul");
    for error in &result.errors {
        let item = doc.create_element("li");
        let text = doc.create_text(&error.message);
        doc.append_child(item, text)?;
        doc.append_child(list, item)?;
    }
    doc.append_child(container, list)?;

    let parent = doc.parent(target).unwrap_or(doc.body());
    doc.append_child(parent, container)?;

    let described_by = match doc.attr(target, "aria-describedby") {
        Some(existing) if !existing.trim().is_empty() => format!("{} {}", existing.trim(), container_id),
        _ => container_id,
    };
    doc.set_attribute(target, "aria-describedby", &described_by)?;
    doc.set_attribute(target, "aria-invalid", "true")?;
    Ok(())
}

/// Remove the error container, its `aria-describedby` reference and the
/// invalid flag.
pub fn clear_annotations(
    doc: &mut Document,
    target: NodeId,
    element_id: &str,
) -> Result<(), DocumentError> {
    let container_id = error_container_id(element_id);
    if let Some(container) = doc.get_element_by_id(&container_id) {
        doc.remove(container)?;
    }

    if let Some(existing) = doc.attr(target, "aria-describedby").map(str::to_string) {
        let remaining: Vec<&str> = existing
            .split_whitespace()
            .filter(|id| *id != container_id)
            .collect();
        if remaining.is_empty() {
            doc.remove_attribute(target, "aria-describedby")?;
        } else {
            doc.set_attribute(target, "aria-describedby", &remaining.join(" "))?;
        }
    }
    if doc.attr(target, "aria-invalid").is_some() {
        doc.remove_attribute(target, "aria-invalid")?;
    }
    Ok(())
}
