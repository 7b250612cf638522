use std::sync::Arc;

use form_intelligence::bridge::bridge::{CompatibilityBridge, FallbackPolicy};
use form_intelligence::bridge::engine::{EngineKind, FormEngine};
use form_intelligence::bridge::legacy::LegacyExtractor;
use form_intelligence::dom::builder::NodeSpec;
use form_intelligence::dom::document::SharedDocument;
use form_intelligence::error::EngineError;
use form_intelligence::fill::fill_model::{FillOptions, HighlightOptions};
use form_intelligence::scanner::element_model::LabelSource;
use form_intelligence::scanner::scanner::ScanOptions;
use form_intelligence::validation::result::ValidationOptions;
use serde_json::json;

use crate::common::{input, node_by_id, preferences_form, shared, signup_form, values};

mod common;

fn bridge(document: &SharedDocument, root: Option<&str>, policy: FallbackPolicy) -> CompatibilityBridge {
    let root = root.map(|id| node_by_id(document, id));
    CompatibilityBridge::new(Arc::clone(document), ScanOptions::default(), root, policy)
}

// =========================================================================
// Engine selection
// =========================================================================

#[test]
fn test_full_engine_is_active_by_default() {
    let document = shared(vec![signup_form()]);
    let bridge = bridge(&document, None, FallbackPolicy::default());

    assert_eq!(bridge.active_kind(), EngineKind::Full);
    assert!(bridge.full().is_some());
    assert_eq!(bridge.get_forms_data().len(), 1);
    assert!(!bridge.get_forms_data()[0].elements.is_empty());
}

#[test]
fn test_detached_root_at_construction_selects_legacy() {
    let document = shared(vec![signup_form(), preferences_form()]);
    let signup = node_by_id(&document, "signup");
    document.write().remove(signup).expect("detach signup");

    let bridge = CompatibilityBridge::new(
        Arc::clone(&document),
        ScanOptions::default(),
        Some(signup),
        FallbackPolicy::default(),
    );

    assert_eq!(bridge.active_kind(), EngineKind::Legacy);
    let forms = bridge.get_forms_data();
    assert_eq!(forms.len(), 1, "legacy falls back to the body");
    assert_eq!(forms[0].id, "prefs");
}

#[test]
fn test_policy_can_disable_full_engine() {
    let document = shared(vec![signup_form()]);
    let bridge = bridge(
        &document,
        None,
        FallbackPolicy {
            prefer_full: false,
            ..FallbackPolicy::default()
        },
    );

    assert_eq!(bridge.active_kind(), EngineKind::Legacy);
    assert!(bridge.full().is_none());
    assert_eq!(bridge.refresh().expect("legacy refresh").forms.len(), 1);
}

// =========================================================================
// Fallback on apply
// =========================================================================

#[tokio::test]
async fn test_apply_falls_back_when_root_detaches() {
    let document = shared(vec![signup_form(), preferences_form()]);
    let bridge = bridge(&document, Some("prefs"), FallbackPolicy::default());
    assert_eq!(bridge.active_kind(), EngineKind::Full);

    let prefs = node_by_id(&document, "prefs");
    document.write().remove(prefs).expect("detach prefs");

    let result = bridge
        .apply_values(&values(&[("email", json!("ada@example.com"))]), &FillOptions::default())
        .await
        .expect("legacy serves the call");

    assert!(result.fallback_used);
    assert!(result.succeeded("email"));
}

#[tokio::test]
async fn test_apply_error_surfaces_without_legacy_retry() {
    let document = shared(vec![signup_form(), preferences_form()]);
    let bridge = bridge(
        &document,
        Some("prefs"),
        FallbackPolicy {
            retry_apply_on_legacy: false,
            ..FallbackPolicy::default()
        },
    );
    let prefs = node_by_id(&document, "prefs");
    document.write().remove(prefs).expect("detach prefs");

    let err = bridge
        .apply_values(&values(&[("size", json!("large"))]), &FillOptions::default())
        .await
        .expect_err("full engine fails");
    assert!(matches!(err, EngineError::Operation { .. }));
}

#[tokio::test]
async fn test_full_engine_apply_is_not_marked_as_fallback() {
    let document = shared(vec![signup_form()]);
    let bridge = bridge(&document, None, FallbackPolicy::default());

    let result = bridge
        .apply_values(&values(&[("first", json!("Ada"))]), &FillOptions::default())
        .await
        .expect("fill runs");

    assert!(!result.fallback_used);
    assert!(result.succeeded("first"), "full engine resolves label fragments");
}

// =========================================================================
// Legacy extractor
// =========================================================================

#[tokio::test]
async fn test_legacy_lookup_is_exact_only() {
    let document = shared(vec![signup_form()]);
    let legacy = LegacyExtractor::new(Arc::clone(&document), None);

    assert!(legacy.find_element("first_name").is_some());
    assert!(legacy.find_element("first").is_none());

    let result = legacy
        .apply_values(&values(&[("first", json!("Ada"))]), &FillOptions::default())
        .await
        .expect("fill runs");
    assert_eq!(
        result.failure("first").map(|f| f.reason.as_str()),
        Some("no element matches this identifier")
    );
}

#[test]
fn test_legacy_scan_covers_native_light_tree_controls() {
    let document = shared(vec![
        NodeSpec::element("form").attr("id", "f").children(vec![
            input("visible", "text").attr("placeholder", "Visible"),
            input("token", "hidden"),
            NodeSpec::element("input").attr("type", "submit"),
            NodeSpec::element("div")
                .attr("id", "editor")
                .attr("contenteditable", "true"),
            NodeSpec::element("textarea").attr("id", "notes").attr("aria-label", "Notes"),
        ]),
        NodeSpec::element("div")
            .attr("id", "host")
            .shadow(vec![input("inner", "text")]),
    ]);
    let legacy = LegacyExtractor::new(Arc::clone(&document), None);
    let snapshot = legacy.snapshot();

    let ids: Vec<&str> = snapshot.elements().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["visible", "notes"]);
    assert!(snapshot.field_groups.is_empty());

    let visible = legacy.find_element("visible").expect("visible");
    assert_eq!(visible.label_source, Some(LabelSource::Placeholder));
    let notes = legacy.find_element("notes").expect("notes");
    assert_eq!(notes.label.as_deref(), Some("Notes"));
    assert_eq!(notes.label_source, Some(LabelSource::AriaLabel));
}

#[tokio::test]
async fn test_legacy_validation_is_native_only() {
    let document = shared(vec![NodeSpec::element("form").attr("id", "f").children(vec![
        input("email", "email").attr("required", ""),
        input("site", "url").attr("data-validate", "url"),
    ])]);
    let bridge = bridge(
        &document,
        None,
        FallbackPolicy {
            prefer_full: false,
            ..FallbackPolicy::default()
        },
    );

    let forms = bridge
        .validate_forms(&ValidationOptions::default())
        .await
        .expect("validation runs");

    assert_eq!(forms.len(), 1);
    let email = forms[0]
        .results
        .iter()
        .find(|r| r.element_id == "email")
        .expect("email result");
    assert!(!email.valid);
    assert_eq!(email.score, 80);
    assert!(email.custom_results.is_empty());
    assert!(email.accessibility_issues.is_empty());
}

#[test]
fn test_highlight_through_bridge() {
    let document = shared(vec![signup_form()]);
    for prefer_full in [true, false] {
        let bridge = bridge(
            &document,
            None,
            FallbackPolicy {
                prefer_full,
                ..FallbackPolicy::default()
            },
        );
        let marked = bridge
            .highlight(&["email".to_string()], &HighlightOptions::default())
            .expect("highlight");
        assert_eq!(marked, 1);
        assert_eq!(bridge.remove_highlight(), 1);
    }
}
