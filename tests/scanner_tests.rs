use form_intelligence::dom::builder::NodeSpec;
use form_intelligence::scanner::element_model::{
    CanonicalType, ElementDescriptor, ExtractionSnapshot, FieldGroupKind, FieldValue, FormKind,
    LabelSource,
};
use form_intelligence::scanner::scanner::{DocumentScanner, STANDALONE_FORM_ID, ScanOptions};

use crate::common::{build, input, labelled, preferences_form, signup_form};

mod common;

fn scan(body: Vec<NodeSpec>) -> ExtractionSnapshot {
    DocumentScanner::default().scan(&build(body), None)
}

// =========================================================================
// Containers and identity
// =========================================================================

#[test]
fn test_native_form_metadata() {
    let snapshot = scan(vec![signup_form()]);

    assert_eq!(snapshot.forms.len(), 1);
    let form = &snapshot.forms[0];
    assert_eq!(form.id, "signup");
    assert_eq!(form.kind, FormKind::Native);
    assert_eq!(form.method, "post", "method is lowercased");
    assert_eq!(form.enctype, "application/x-www-form-urlencoded");

    let ids: Vec<&str> = form.elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["first_name", "last_name", "email", "password"]);
    assert_eq!(form.elements[2].kind, CanonicalType::Email);
    assert_eq!(form.accessibility.labelled, 4);
}

#[test]
fn test_scan_is_idempotent() {
    let doc = build(vec![signup_form(), preferences_form()]);
    let scanner = DocumentScanner::default();

    let first = scanner.scan(&doc, None);
    let second = scanner.scan(&doc, None);

    assert_eq!(first.element_count(), second.element_count());
    assert_eq!(first.statistics, second.statistics);
    assert_eq!(first.forms, second.forms);
}

#[test]
fn test_elements_outside_forms_go_to_standalone() {
    let snapshot = scan(vec![
        signup_form(),
        NodeSpec::element("div").children(labelled("newsletter_email", "email", "Newsletter")),
    ]);

    let standalone = snapshot
        .forms
        .iter()
        .find(|f| f.id == STANDALONE_FORM_ID)
        .expect("standalone container");
    assert_eq!(standalone.kind, FormKind::Standalone);
    assert_eq!(standalone.elements.len(), 1);
    assert_eq!(standalone.elements[0].id, "newsletter_email");
}

#[test]
fn test_heuristic_container_needs_two_controls() {
    let snapshot = scan(vec![
        NodeSpec::element("div")
            .attr("class", "login-box")
            .children(vec![input("user", "text"), input("pass", "password")]),
        NodeSpec::element("div")
            .attr("class", "search-bar")
            .child(input("q", "search")),
    ]);

    let heuristic: Vec<_> = snapshot
        .forms
        .iter()
        .filter(|f| f.kind == FormKind::Heuristic)
        .collect();
    assert_eq!(heuristic.len(), 1, "only the container with two controls qualifies");
    assert_eq!(heuristic[0].elements.len(), 2);

    let standalone = snapshot
        .forms
        .iter()
        .find(|f| f.kind == FormKind::Standalone)
        .expect("the lone search input is standalone");
    assert_eq!(standalone.elements[0].id, "q");
}

#[test]
fn test_generated_id_for_anonymous_element() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        NodeSpec::element("input").attr("type", "text"),
    )]);

    let el = &snapshot.forms[0].elements[0];
    assert!(el.id.starts_with("fie-"), "got {}", el.id);
    assert_eq!(el.id.len(), "fie-".len() + 12);
    assert_eq!(snapshot.forms[0].id, "form-0");
}

#[test]
fn test_duplicate_ids_are_suffixed() {
    let snapshot = scan(vec![NodeSpec::element("form").children(vec![
        input("dup", "text"),
        input("dup", "text"),
        input("dup", "text"),
    ])]);

    let ids: Vec<&str> = snapshot.forms[0].elements.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["dup", "dup-2", "dup-3"]);
}

// =========================================================================
// Inclusion rules
// =========================================================================

#[test]
fn test_hidden_disabled_and_hidden_inputs_are_excluded_by_default() {
    let body = vec![NodeSpec::element("form").children(vec![
        input("visible", "text"),
        input("token", "hidden"),
        input("gone", "text").hidden(),
        input("locked", "text").attr("disabled", ""),
        NodeSpec::element("input").attr("type", "submit").attr("value", "Go"),
    ])];

    let default_ids: Vec<String> = scan(body.clone()).elements().map(|e| e.id.clone()).collect();
    assert_eq!(default_ids, vec!["visible"]);

    let scanner = DocumentScanner::new(ScanOptions {
        include_hidden: true,
        include_disabled: true,
        include_hidden_inputs: true,
        ..ScanOptions::default()
    });
    let all = scanner.scan(&build(body), None);
    let ids: Vec<&str> = all.elements().map(|e| e.id.as_str()).collect();
    assert!(ids.contains(&"token"));
    assert!(ids.contains(&"gone"));
    assert!(ids.contains(&"locked"));
    assert!(!ids.iter().any(|id| id.starts_with("fie-")), "submit buttons are not surfaces");
}

#[test]
fn test_template_and_noscript_contents_are_skipped() {
    let snapshot = scan(vec![NodeSpec::element("form").attr("id", "f").children(vec![
        input("real", "text"),
        NodeSpec::element("template").children(vec![input("row_template", "text")]),
        NodeSpec::element("noscript").children(vec![input("fallback", "text")]),
    ])]);

    let ids: Vec<&str> = snapshot.elements().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["real"]);
}

#[test]
fn test_shadow_root_controls_are_traversed() {
    let host = NodeSpec::element("div")
        .attr("id", "widget")
        .shadow(vec![input("inner", "text")]);

    let with_shadow = scan(vec![host.clone()]);
    assert!(with_shadow.elements().any(|e| e.id == "inner"));

    let scanner = DocumentScanner::new(ScanOptions {
        traverse_shadow: false,
        ..ScanOptions::default()
    });
    let without = scanner.scan(&build(vec![host]), None);
    assert_eq!(without.element_count(), 0);
}

#[test]
fn test_contenteditable_and_aria_widgets_are_classified() {
    let snapshot = scan(vec![
        NodeSpec::element("div")
            .attr("id", "bio")
            .attr("contenteditable", "true")
            .text("Hello"),
        NodeSpec::element("div")
            .attr("id", "volume")
            .attr("role", "slider")
            .attr("aria-valuenow", "30")
            .attr("aria-label", "Volume"),
    ]);

    let bio = snapshot.elements().find(|e| e.id == "bio").expect("bio");
    assert_eq!(bio.kind, CanonicalType::ContentEditable);
    let volume = snapshot.elements().find(|e| e.id == "volume").expect("volume");
    assert_eq!(volume.kind, CanonicalType::AriaSlider);
    assert_eq!(volume.value, FieldValue::Text("30".to_string()));
}

// =========================================================================
// Labels
// =========================================================================

#[test]
fn test_aria_label_beats_wrapping_label() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        NodeSpec::element("label")
            .text("Wrapping text")
            .child(input("city", "text").attr("aria-label", "City of residence")),
    )]);

    let el = &snapshot.forms[0].elements[0];
    assert_eq!(el.label.as_deref(), Some("City of residence"));
    assert_eq!(el.label_source, Some(LabelSource::AriaLabel));
}

#[test]
fn test_wrapping_label_used_without_explicit_name() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        NodeSpec::element("label")
            .text("Postal code")
            .child(input("zip", "text")),
    )]);

    let el = &snapshot.forms[0].elements[0];
    assert_eq!(el.label.as_deref(), Some("Postal code"));
    assert_eq!(el.label_source, Some(LabelSource::WrappingLabel));
}

#[test]
fn test_placeholder_is_a_late_fallback() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        input("nick", "text").attr("placeholder", "Your nickname"),
    )]);

    let el = &snapshot.forms[0].elements[0];
    assert_eq!(el.label.as_deref(), Some("Your nickname"));
    assert_eq!(el.label_source, Some(LabelSource::Placeholder));
}

fn only_element(snapshot: &ExtractionSnapshot, id: &str) -> ElementDescriptor {
    snapshot
        .elements()
        .find(|e| e.id == id)
        .cloned()
        .unwrap_or_else(|| panic!("{} scanned", id))
}

#[test]
fn test_labelledby_beats_label_for() {
    let snapshot = scan(vec![NodeSpec::element("form").children(vec![
        NodeSpec::element("span").attr("id", "gn-caption").text("Given name"),
        NodeSpec::element("label").attr("for", "gn").text("First"),
        input("gn", "text").attr("aria-labelledby", "gn-caption"),
    ])]);

    let el = only_element(&snapshot, "gn");
    assert_eq!(el.label.as_deref(), Some("Given name"));
    assert_eq!(el.label_source, Some(LabelSource::AriaLabelledBy));
}

#[test]
fn test_container_label_class_and_legend() {
    let snapshot = scan(vec![NodeSpec::element("form").children(vec![
        NodeSpec::element("div").attr("class", "field").children(vec![
            NodeSpec::element("div").attr("class", "field-label").text("Shipping note"),
            input("note", "text"),
        ]),
        NodeSpec::element("fieldset").children(vec![
            NodeSpec::element("legend").text("Billing"),
            input("billing_zip", "text"),
        ]),
    ])]);

    let note = only_element(&snapshot, "note");
    assert_eq!(note.label.as_deref(), Some("Shipping note"));
    assert_eq!(note.label_source, Some(LabelSource::Container));
    let zip = only_element(&snapshot, "billing_zip");
    assert_eq!(zip.label.as_deref(), Some("Billing"));
    assert_eq!(zip.label_source, Some(LabelSource::Container));
}

#[test]
fn test_preceding_text_label() {
    let snapshot = scan(vec![NodeSpec::element("form").children(vec![
        NodeSpec::text_node("Nickname:"),
        input("nick", "text"),
    ])]);

    let el = only_element(&snapshot, "nick");
    assert_eq!(el.label.as_deref(), Some("Nickname"));
    assert_eq!(el.label_source, Some(LabelSource::PrecedingText));
}

#[test]
fn test_table_header_labels_cell_control() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        NodeSpec::element("table").children(vec![
            NodeSpec::element("tr").children(vec![
                NodeSpec::element("th").text("Item"),
                NodeSpec::element("th").text("Quantity"),
            ]),
            NodeSpec::element("tr").children(vec![
                NodeSpec::element("td").text("Apples"),
                NodeSpec::element("td").child(input("qty", "number")),
            ]),
        ]),
    )]);

    let el = only_element(&snapshot, "qty");
    assert_eq!(el.label.as_deref(), Some("Quantity"));
    assert_eq!(el.label_source, Some(LabelSource::TableHeader));
}

#[test]
fn test_numeric_id_pairs_with_label() {
    let snapshot = scan(vec![NodeSpec::element("form").child(
        NodeSpec::element("div").children(vec![
            NodeSpec::element("div").child(input("field_1042", "text")),
            NodeSpec::element("div").child(
                NodeSpec::element("label")
                    .attr("for", "answer_1042")
                    .text("Favourite number"),
            ),
        ]),
    )]);

    let el = only_element(&snapshot, "field_1042");
    assert_eq!(el.label.as_deref(), Some("Favourite number"));
    assert_eq!(el.label_source, Some(LabelSource::NumericId));
}

#[test]
fn test_relations_and_sections_resolve_across_the_document() {
    let snapshot = scan(vec![
        NodeSpec::element("section").children(vec![
            NodeSpec::element("h2").text("Delivery"),
            NodeSpec::element("form").children(vec![
                NodeSpec::element("label").attr("for", "express").text("Express"),
                input("express", "checkbox").attr("aria-controls", "slot"),
                NodeSpec::element("label").attr("for", "slot").text("Time slot"),
                input("slot", "text"),
            ]),
        ]),
        NodeSpec::element("label").attr("for", "slot").text("(optional)"),
    ]);

    let slot = only_element(&snapshot, "slot");
    assert_eq!(slot.label.as_deref(), Some("Time slot (optional)"));
    assert_eq!(slot.dependencies.controlled_by, vec!["express".to_string()]);
    let section = slot.context.section.expect("section context");
    assert_eq!(section.tag, "section");
    assert_eq!(section.label.as_deref(), Some("Delivery"));
}

#[test]
fn test_id_lookup_follows_attribute_changes() {
    let mut doc = build(vec![NodeSpec::element("form").children(vec![
        input("first", "text"),
        input("second", "text"),
    ])]);
    let first = doc.get_element_by_id("first").expect("first");
    let second = doc.get_element_by_id("second").expect("second");

    doc.set_attribute(first, "id", "renamed").expect("rename");
    assert_eq!(doc.get_element_by_id("first"), None);
    assert_eq!(doc.get_element_by_id("renamed"), Some(first));

    doc.set_attribute(second, "id", "renamed").expect("duplicate id");
    assert_eq!(doc.get_element_by_id("renamed"), Some(first), "first in document order wins");

    doc.remove(first).expect("detach");
    assert_eq!(doc.get_element_by_id("renamed"), Some(second));
    doc.remove_attribute(second, "id").expect("drop id");
    assert_eq!(doc.get_element_by_id("renamed"), None);
}

// =========================================================================
// Groups, rules and statistics
// =========================================================================

#[test]
fn test_radio_buttons_merge_into_one_group() {
    let snapshot = scan(vec![preferences_form()]);
    let form = &snapshot.forms[0];

    let color = form.elements.iter().find(|e| e.id == "color").expect("color group");
    assert_eq!(color.kind, CanonicalType::Radio);
    let group = color.group.as_ref().expect("group info");
    assert_eq!(group.member_count, 3);
    let values: Vec<&str> = group.members.iter().map(|m| m.value.as_str()).collect();
    assert_eq!(values, vec!["red", "green", "blue"]);
    assert_eq!(color.label.as_deref(), Some("Favourite color"));
    assert!(
        !form.elements.iter().any(|e| e.id.starts_with("color-")),
        "members are absorbed into the group"
    );
}

#[test]
fn test_field_groups_detected() {
    let snapshot = scan(vec![signup_form(), preferences_form()]);

    assert!(snapshot.field_groups.iter().any(|g| {
        g.kind == FieldGroupKind::Semantic
            && g.name == "name"
            && g.element_ids == vec!["first_name".to_string(), "last_name".to_string()]
    }));
    assert!(snapshot
        .field_groups
        .iter()
        .any(|g| g.kind == FieldGroupKind::Fieldset && g.element_ids.contains(&"color".to_string())));
}

#[test]
fn test_validation_rule_index_and_statistics() {
    let snapshot = scan(vec![NodeSpec::element("form").children(vec![
        input("email", "email").attr("required", ""),
        input("code", "text").attr("pattern", "[0-9]{4}").attr("maxlength", "4"),
        input("free", "text"),
    ])]);

    let email_rules = snapshot
        .validation_rules
        .iter()
        .find(|r| r.element_id == "email")
        .expect("email has rules");
    assert!(email_rules.rules.contains(&"required".to_string()));
    let code_rules = snapshot
        .validation_rules
        .iter()
        .find(|r| r.element_id == "code")
        .expect("code has rules");
    assert!(code_rules.rules.iter().any(|r| r.starts_with("pattern:")));
    assert!(code_rules.rules.iter().any(|r| r.starts_with("maxlength:")));
    assert!(!snapshot.validation_rules.iter().any(|r| r.element_id == "free"));

    let stats = &snapshot.statistics;
    assert_eq!(stats.total_forms, 1);
    assert_eq!(stats.total_elements, 3);
    assert_eq!(stats.required, 1);
    assert_eq!(stats.with_validation, 2);
    assert_eq!(stats.by_type.get("text"), Some(&2));
    assert!(stats.complexity_score <= 100);
}
