use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use form_intelligence::dom::builder::NodeSpec;
use form_intelligence::dom::document::FileMeta;
use form_intelligence::error::{EngineError, ValidatorError};
use form_intelligence::validation::accessibility::{
    WCAG_KEYBOARD, WCAG_LABELS_OR_INSTRUCTIONS, WCAG_NAME_ROLE_VALUE,
};
use form_intelligence::validation::annotate::error_container_id;
use form_intelligence::validation::result::{
    IssueSource, RuleOutcome, Severity, ValidationOptions, ValidationResult, compute_score,
};
use form_intelligence::scanner::element_model::FieldValue;
use form_intelligence::validation::validators::{
    FnValidator, ValidationContext, Validator, luhn_valid,
};
use parking_lot::Mutex;

use crate::common::{Harness, harness, input, labelled, node_by_id, signup_form};

mod common;

async fn validate(h: &Harness, id: &str, options: &ValidationOptions) -> ValidationResult {
    let el = h.model.find_element(id).unwrap_or_else(|| panic!("{} resolves", id));
    h.validation.validate_element(&el, options).await
}

fn set_value(h: &Harness, id: &str, value: &str) {
    let node = node_by_id(&h.document, id);
    h.document.write().set_value(node, value).expect("set value");
}

fn form(children: Vec<NodeSpec>) -> NodeSpec {
    NodeSpec::element("form").attr("id", "f").children(children)
}

fn required_email() -> NodeSpec {
    form(vec![
        NodeSpec::element("label").attr("for", "email").text("Email"),
        input("email", "email")
            .attr("required", "")
            .attr("aria-required", "true"),
    ])
}

// =========================================================================
// Scoring
// =========================================================================

#[test]
fn test_compute_score() {
    assert_eq!(compute_score(0, 0, 0), 100);
    assert_eq!(compute_score(1, 0, 0), 80);
    assert_eq!(compute_score(0, 2, 0), 100, "bonus offsets warnings");
    assert_eq!(compute_score(0, 3, 1), 85);
    assert_eq!(compute_score(6, 0, 0), 0);
}

#[tokio::test]
async fn test_required_empty_field_scores_eighty() {
    let h = harness(vec![required_email()]);

    let result = validate(&h, "email", &ValidationOptions::default()).await;

    assert!(!result.valid);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "value_missing");
    assert_eq!(result.errors[0].source, IssueSource::Html5);
    assert_eq!(result.errors[0].message, "This field is required");
    assert!(result.html5_validity.value_missing);
    assert!(result.accessibility_issues.is_empty());
    assert_eq!(result.score, 80);
}

#[tokio::test]
async fn test_clean_field_scores_one_hundred() {
    let h = harness(vec![required_email()]);
    set_value(&h, "email", "ada@example.com");

    let result = validate(&h, "email", &ValidationOptions::default()).await;

    assert!(result.valid);
    assert!(result.errors.is_empty());
    assert_eq!(result.score, 100);
    assert!(result.custom_results.iter().any(|c| c.rule == "email" && c.valid));
    assert_eq!(h.validation.cached("email"), Some(result));
}

#[tokio::test]
async fn test_message_overrides() {
    let h = harness(vec![required_email()]);
    let mut options = ValidationOptions::default();
    options
        .messages
        .insert("value_missing".to_string(), "Please tell us your email".to_string());

    let result = validate(&h, "email", &options).await;

    assert_eq!(result.errors[0].message, "Please tell us your email");
}

// =========================================================================
// Built-in validators
// =========================================================================

#[tokio::test]
async fn test_email_validator_rejects_malformed_address() {
    let h = harness(vec![required_email()]);
    set_value(&h, "email", "not-an-email");

    let result = validate(&h, "email", &ValidationOptions::default()).await;

    assert!(!result.valid);
    assert!(result.errors.iter().any(|e| e.code == "type_mismatch"));
    let from_validator = result
        .errors
        .iter()
        .find(|e| e.source == IssueSource::Validator)
        .expect("validator error");
    assert_eq!(from_validator.rule.as_deref(), Some("email"));
}

#[tokio::test]
async fn test_password_flags_add_requirements() {
    let mut children = labelled("password", "password", "Password");
    children[1] = input("password", "password")
        .attr("data-require-digit", "true")
        .attr("data-require-uppercase", "true");
    let h = harness(vec![form(children)]);
    set_value(&h, "password", "abcdefgh");

    let result = validate(&h, "password", &ValidationOptions::default()).await;

    let issue = result
        .errors
        .iter()
        .find(|e| e.rule.as_deref() == Some("password"))
        .expect("password issue");
    assert!(issue.message.contains("an uppercase letter"));
    assert!(issue.message.contains("a digit"));

    set_value(&h, "password", "Abcdefg1");
    let fixed = validate(&h, "password", &ValidationOptions::default()).await;
    assert!(fixed.valid);
}

#[tokio::test]
async fn test_confirm_validator_compares_with_target() {
    let mut children = labelled("password", "password", "Password");
    children.push(NodeSpec::element("label").attr("for", "password_again").text("Repeat"));
    children.push(input("password_again", "password").attr("data-confirm", "password"));
    let h = harness(vec![form(children)]);
    set_value(&h, "password", "Sesame-1234");
    set_value(&h, "password_again", "Sesame-9999");

    let result = validate(&h, "password_again", &ValidationOptions::default()).await;
    assert!(result.errors.iter().any(|e| e.message == "Value must match password"));

    set_value(&h, "password_again", "Sesame-1234");
    let result = validate(&h, "password_again", &ValidationOptions::default()).await;
    assert!(result.valid);
}

/// Message of the error raised by validator `rule`, if any.
fn rule_error(result: &ValidationResult, rule: &str) -> Option<String> {
    result
        .errors
        .iter()
        .find(|e| e.rule.as_deref() == Some(rule))
        .map(|e| e.message.clone())
}

#[tokio::test]
async fn test_phone_and_url_validators() {
    let h = harness(vec![form(vec![
        NodeSpec::element("label").attr("for", "phone").text("Phone"),
        input("phone", "tel"),
        NodeSpec::element("label").attr("for", "site").text("Website"),
        input("site", "url"),
    ])]);
    let options = ValidationOptions::default();

    set_value(&h, "phone", "555-CALL-NOW");
    set_value(&h, "site", "not a url");
    let phone = validate(&h, "phone", &options).await;
    let site = validate(&h, "site", &options).await;
    assert_eq!(rule_error(&phone, "phone").as_deref(), Some("Please enter a valid phone number"));
    assert_eq!(rule_error(&site, "url").as_deref(), Some("Please enter a valid URL"));

    set_value(&h, "phone", "+1 (555) 123-4567");
    set_value(&h, "site", "https://example.com/path");
    assert!(validate(&h, "phone", &options).await.valid);
    assert!(validate(&h, "site", &options).await.valid);
}

#[tokio::test]
async fn test_credit_card_validator_runs_when_requested() {
    let mut children = labelled("card", "text", "Card number");
    children[1] = input("card", "text").attr("data-validate", "credit-card");
    let h = harness(vec![form(children)]);

    set_value(&h, "card", "4111 1111 1111 1112");
    let bad = validate(&h, "card", &ValidationOptions::default()).await;
    assert_eq!(rule_error(&bad, "credit-card").as_deref(), Some("Please enter a valid card number"));

    set_value(&h, "card", "4111-1111-1111-1111");
    let good = validate(&h, "card", &ValidationOptions::default()).await;
    assert!(good.valid);
    assert!(good.custom_results.iter().any(|c| c.rule == "credit-card" && c.valid));
}

#[tokio::test]
async fn test_date_range_validator() {
    let mut children = labelled("start_date", "date", "Start date");
    children[1] = input("start_date", "date")
        .attr("data-min-date", "2024-01-01")
        .attr("data-max-date", "2024-12-31");
    let h = harness(vec![form(children)]);
    let options = ValidationOptions::default();

    for (value, expected) in [
        ("2023-12-31", Some("Date must be on or after 2024-01-01")),
        ("2025-01-01", Some("Date must be on or before 2024-12-31")),
        ("2024-06-01", None),
    ] {
        set_value(&h, "start_date", value);
        let result = validate(&h, "start_date", &options).await;
        assert_eq!(rule_error(&result, "date-range").as_deref(), expected, "value {}", value);
    }
}

#[tokio::test]
async fn test_numeric_range_validator() {
    let mut children = labelled("qty", "number", "Quantity");
    children[1] = input("qty", "number").attr("data-min", "1").attr("data-max", "10");
    let h = harness(vec![form(children)]);
    let options = ValidationOptions::default();

    for (value, expected) in [
        ("0", Some("Value must be at least 1")),
        ("11", Some("Value must be at most 10")),
        ("5", None),
    ] {
        set_value(&h, "qty", value);
        let result = validate(&h, "qty", &options).await;
        assert_eq!(rule_error(&result, "numeric-range").as_deref(), expected, "value {}", value);
    }
}

fn file(name: &str, size: u64, mime_type: &str) -> FileMeta {
    FileMeta {
        name: name.to_string(),
        size,
        mime_type: mime_type.to_string(),
        last_modified: 0,
    }
}

#[tokio::test]
async fn test_file_validator_limits() {
    let mut children = labelled("upload", "file", "Attachments");
    children[1] = input("upload", "file")
        .attr("multiple", "")
        .attr("accept", ".pdf, image/*")
        .attr("data-max-size", "1000")
        .attr("data-max-files", "2");
    let h = harness(vec![form(children)]);
    let upload = node_by_id(&h.document, "upload");
    let options = ValidationOptions::default();

    let cases = [
        (
            vec![file("a.pdf", 10, "application/pdf"), file("b.pdf", 10, "application/pdf"), file("c.pdf", 10, "application/pdf")],
            Some("At most 2 files are allowed"),
        ),
        (
            vec![file("report.pdf", 5000, "application/pdf")],
            Some("report.pdf exceeds the 1000 byte limit"),
        ),
        (
            vec![file("notes.txt", 10, "text/plain")],
            Some("notes.txt is not an accepted file type"),
        ),
        (
            vec![file("a.pdf", 10, "application/pdf"), file("photo.png", 10, "image/png")],
            None,
        ),
    ];
    for (files, expected) in cases {
        h.document.write().set_files(upload, files).expect("set files");
        let result = validate(&h, "upload", &options).await;
        assert_eq!(rule_error(&result, "file").as_deref(), expected);
    }
}

#[test]
fn test_luhn() {
    assert!(luhn_valid("4111111111111111"));
    assert!(!luhn_valid("4111111111111112"));
}

// =========================================================================
// Custom validators and field rules
// =========================================================================

#[tokio::test]
async fn test_validator_error_becomes_warning() {
    let mut children = labelled("handle", "text", "Handle");
    children[1] = input("handle", "text").attr("data-validate", "availability");
    let h = harness(vec![form(children)]);
    h.validation.register(Arc::new(FnValidator::new("availability", |_, _| {
        Err(ValidatorError::new("availability", "lookup service unavailable"))
    })));
    set_value(&h, "handle", "ada");

    let result = validate(&h, "handle", &ValidationOptions::default()).await;

    assert!(result.valid, "a broken validator never invalidates the field");
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].code, "validation_error");
    assert_eq!(result.warnings[0].severity, Severity::Warning);
}

/// Looks the handle up in a directory that answers after a delay.
struct HandleDirectory {
    taken: Vec<&'static str>,
    latency: Duration,
}

#[async_trait]
impl Validator for HandleDirectory {
    fn name(&self) -> &str {
        "handle-available"
    }

    async fn validate(
        &self,
        value: &FieldValue,
        ctx: &ValidationContext<'_>,
    ) -> Result<RuleOutcome, ValidatorError> {
        tokio::time::sleep(self.latency).await;
        let connected = {
            let doc = ctx.document.read();
            doc.is_connected(ctx.element.node)
        };
        if !connected {
            return Err(ValidatorError::new(self.name(), "field left the page"));
        }
        let handle = value.as_text();
        if self.taken.iter().any(|t| *t == handle.trim()) {
            Ok(RuleOutcome::fail("That handle is already taken"))
        } else {
            Ok(RuleOutcome::pass())
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_async_validator_is_awaited() {
    let mut children = labelled("handle", "text", "Handle");
    children[1] = input("handle", "text").attr("data-validate", "handle-available");
    let h = harness(vec![form(children)]);
    h.validation.register(Arc::new(HandleDirectory {
        taken: vec!["ada", "grace"],
        latency: Duration::from_millis(250),
    }));

    set_value(&h, "handle", "ada");
    let started = tokio::time::Instant::now();
    let taken = validate(&h, "handle", &ValidationOptions::default()).await;
    assert!(started.elapsed() >= Duration::from_millis(250), "the lookup was awaited");
    assert!(!taken.valid);
    assert_eq!(
        rule_error(&taken, "handle-available").as_deref(),
        Some("That handle is already taken")
    );

    set_value(&h, "handle", "linus");
    let free = validate(&h, "handle", &ValidationOptions::default()).await;
    assert!(free.valid);
    assert!(free.custom_results.iter().any(|c| c.rule == "handle-available" && c.valid));
}

#[tokio::test]
async fn test_validators_run_in_ascending_priority() {
    let mut children = labelled("code", "text", "Code");
    children[1] = input("code", "text").attr("data-validate", "late early middle");
    let h = harness(vec![form(children)]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    for (name, priority) in [("late", 90), ("early", 5), ("middle", 50)] {
        let calls = Arc::clone(&calls);
        h.validation.register(Arc::new(
            FnValidator::new(name, move |_, _| {
                calls.lock().push(name);
                Ok(RuleOutcome::pass())
            })
            .with_priority(priority),
        ));
    }

    let result = validate(&h, "code", &ValidationOptions::default()).await;

    assert_eq!(*calls.lock(), vec!["early", "middle", "late"]);
    let order: Vec<&str> = result.custom_results.iter().map(|c| c.rule.as_str()).collect();
    assert_eq!(order, vec!["early", "middle", "late"]);
}

#[tokio::test]
async fn test_field_rules_report_failures_and_errors() {
    let h = harness(vec![signup_form()]);
    h.validation.register_field_rule(
        "first_name",
        Arc::new(FnValidator::new("no_digits", |value, _| {
            if value.as_text().chars().any(|c| c.is_ascii_digit()) {
                Ok(RuleOutcome::fail("Names cannot contain digits"))
            } else {
                Ok(RuleOutcome::pass())
            }
        })),
    );
    h.validation.register_field_rule(
        "last_name",
        Arc::new(FnValidator::new("broken", |_, _| {
            Err(ValidatorError::new("broken", "rule crashed"))
        })),
    );
    set_value(&h, "first_name", "Ada2");

    let first = validate(&h, "first_name", &ValidationOptions::default()).await;
    assert!(!first.valid);
    assert_eq!(first.errors[0].source, IssueSource::FieldRule);
    assert_eq!(first.errors[0].message, "Names cannot contain digits");

    let last = validate(&h, "last_name", &ValidationOptions::default()).await;
    assert!(last.valid);
    assert_eq!(last.warnings[0].code, "rule_error");
}

#[tokio::test]
async fn test_unregistered_builtin_no_longer_runs() {
    let h = harness(vec![required_email()]);
    assert!(h.validation.validator_names().contains(&"email".to_string()));
    assert!(h.validation.unregister("email"));
    set_value(&h, "email", "ada@example.com");

    let result = validate(&h, "email", &ValidationOptions::default()).await;

    assert!(!result.custom_results.iter().any(|c| c.rule == "email"));
}

// =========================================================================
// Accessibility and annotations
// =========================================================================

#[tokio::test]
async fn test_accessibility_issues_carry_guidelines() {
    let h = harness(vec![form(vec![
        input("mystery", "text")
            .attr("required", "")
            .attr("tabindex", "-1"),
    ])]);

    let result = validate(&h, "mystery", &ValidationOptions::default()).await;
    let guideline = |code: &str| {
        result
            .accessibility_issues
            .iter()
            .find(|i| i.code == code)
            .map(|i| i.guideline.clone())
    };

    assert_eq!(guideline("missing_accessible_name").as_deref(), Some(WCAG_NAME_ROLE_VALUE));
    assert_eq!(guideline("missing_aria_required").as_deref(), Some(WCAG_LABELS_OR_INSTRUCTIONS));
    assert_eq!(guideline("not_keyboard_accessible").as_deref(), Some(WCAG_KEYBOARD));
}

#[tokio::test]
async fn test_repeated_invalid_result_expects_aria_invalid() {
    let h = harness(vec![required_email()]);

    let first = validate(&h, "email", &ValidationOptions::default()).await;
    assert!(!first.accessibility_issues.iter().any(|i| i.code == "missing_aria_invalid"));

    let second = validate(&h, "email", &ValidationOptions::default()).await;
    assert!(second.accessibility_issues.iter().any(|i| i.code == "missing_aria_invalid"));
}

#[tokio::test]
async fn test_annotations_are_written_and_cleared() {
    let h = harness(vec![required_email()]);
    let options = ValidationOptions {
        annotate: true,
        ..ValidationOptions::default()
    };
    let email = node_by_id(&h.document, "email");
    let container_id = error_container_id("email");

    validate(&h, "email", &options).await;
    {
        let doc = h.document.read();
        let container = doc.get_element_by_id(&container_id).expect("error container");
        assert_eq!(doc.attr(container, "role"), Some("alert"));
        assert!(doc.text_content(container).contains("This field is required"));
        assert_eq!(doc.attr(email, "aria-invalid"), Some("true"));
        assert_eq!(doc.attr(email, "aria-describedby"), Some(container_id.as_str()));
    }

    set_value(&h, "email", "ada@example.com");
    let result = validate(&h, "email", &options).await;
    assert!(result.valid);
    let doc = h.document.read();
    assert!(doc.get_element_by_id(&container_id).is_none());
    assert_eq!(doc.attr(email, "aria-invalid"), None);
    assert_eq!(doc.attr(email, "aria-describedby"), None);
}

// =========================================================================
// Forms
// =========================================================================

#[tokio::test]
async fn test_validate_forms_summarizes_each_form() {
    let h = harness(vec![signup_form(), required_email()]);

    let forms = h.validation.validate_forms(&ValidationOptions::default()).await;

    assert_eq!(forms.len(), 2);
    let signup = forms.iter().find(|f| f.form_id == "signup").expect("signup");
    assert!(signup.valid);
    assert_eq!(signup.results.len(), 4);
    let f = forms.iter().find(|f| f.form_id == "f").expect("second form");
    assert!(!f.valid);
    assert_eq!(f.score, 80.0);
}

#[tokio::test]
async fn test_validate_unknown_form_is_an_error() {
    let h = harness(vec![signup_form()]);

    let err = h
        .validation
        .validate_form("nope", &ValidationOptions::default())
        .await
        .expect_err("unknown form");
    assert!(matches!(err, EngineError::Operation { .. }));

    let ok = h
        .validation
        .validate_form("signup", &ValidationOptions::default())
        .await
        .expect("known form");
    assert_eq!(ok.form_id, "signup");
}
