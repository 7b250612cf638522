use crate::scanner::element_model::{ElementDescriptor, LabelSource};
use crate::validation::result::{AccessibilityIssue, Severity, ValidationResult};

pub const WCAG_NAME_ROLE_VALUE: &str = "4.1.2";
pub const WCAG_LABELS_OR_INSTRUCTIONS: &str = "3.3.2";
pub const WCAG_ERROR_IDENTIFICATION: &str = "3.3.1";
pub const WCAG_KEYBOARD: &str = "2.1.1";

fn issue(code: &str, message: String, severity: Severity, guideline: &str) -> AccessibilityIssue {
    AccessibilityIssue {
        code: code.to_string(),
        message,
        severity,
        guideline: guideline.to_string(),
    }
}

/// Accessibility checks for one element. `previous` is the last cached
/// validation result, used to check that a field known to be invalid
/// exposes `aria-invalid`.
pub fn check_accessibility(
    el: &ElementDescriptor,
    previous: Option<&ValidationResult>,
) -> Vec<AccessibilityIssue> {
    let mut issues = Vec::new();
    let who = el.label.as_deref().unwrap_or(&el.id);

    match el.label_source {
        None | Some(LabelSource::NameOrId) => issues.push(issue(
            "missing_accessible_name",
            format!("{} has no accessible name", who),
            Severity::Error,
            WCAG_NAME_ROLE_VALUE,
        )),
        Some(LabelSource::Placeholder) => issues.push(issue(
            "placeholder_as_label",
            format!("{} is labelled only by its placeholder", who),
            Severity::Warning,
            WCAG_LABELS_OR_INSTRUCTIONS,
        )),
        _ => {}
    }

    if el.constraints.required && !el.accessibility.aria_required {
        issues.push(issue(
            "missing_aria_required",
            format!("required field {} does not set aria-required", who),
            Severity::Warning,
            WCAG_LABELS_OR_INSTRUCTIONS,
        ));
    }

    if previous.is_some_and(|r| !r.valid) && !el.accessibility.aria_invalid {
        issues.push(issue(
            "missing_aria_invalid",
            format!("invalid field {} does not set aria-invalid", who),
            Severity::Warning,
            WCAG_ERROR_IDENTIFICATION,
        ));
    }

    if !el.disabled && !el.accessibility.keyboard_navigable {
        issues.push(issue(
            "not_keyboard_accessible",
            format!("{} cannot be reached with the keyboard", who),
            Severity::Error,
            WCAG_KEYBOARD,
        ));
    }

    issues
}
