use std::sync::Arc;
use std::time::Duration;

use form_intelligence::dom::builder::{NodeSpec, mount};
use form_intelligence::error::EngineError;
use form_intelligence::model::events::EngineEvent;
use form_intelligence::model::query::ElementCriteria;
use form_intelligence::model::semantic_model::{HISTORY_LIMIT, SemanticModel};
use form_intelligence::scanner::element_model::CanonicalType;
use form_intelligence::scanner::scanner::DocumentScanner;

use crate::common::{input, labelled, model_for, node_by_id, preferences_form, shared, signup_form};

mod common;

// =========================================================================
// Lookups
// =========================================================================

#[test]
fn test_find_element_by_id_name_selector_and_aria_label() {
    let document = shared(vec![NodeSpec::element("form").attr("id", "f").children(vec![
        input("email", "email"),
        NodeSpec::element("input").attr("name", "phone").attr("type", "tel"),
        NodeSpec::element("input")
            .attr("type", "text")
            .attr("class", "promo")
            .attr("data-identifier", "coupon")
            .attr("aria-label", "Promo code"),
    ])]);
    let model = model_for(document);

    assert_eq!(model.find_element("email").map(|e| e.id), Some("email".to_string()));
    assert_eq!(model.find_element("phone").map(|e| e.kind), Some(CanonicalType::Tel));
    let by_selector = model.find_element("input.promo").expect("selector lookup");
    assert_eq!(by_selector.accessibility.aria_label.as_deref(), Some("Promo code"));
    assert_eq!(
        model.find_element("coupon").map(|e| e.id),
        Some(by_selector.id.clone())
    );
    assert_eq!(
        model.find_element("Promo code").map(|e| e.id),
        Some(by_selector.id)
    );
    assert!(model.find_element("nothing-here").is_none());
}

#[test]
fn test_invalid_selector_identifier_is_not_an_error() {
    let model = model_for(shared(vec![signup_form()]));
    assert!(model.find_element("input[[").is_none());
}

#[test]
fn test_find_elements_combines_criteria() {
    let model = model_for(shared(vec![NodeSpec::element("form").children(vec![
        input("a", "text").attr("required", "").attr("class", "wide"),
        input("b", "text"),
        input("c", "email").attr("required", ""),
    ])]));

    let required_text = model.find_elements(
        &ElementCriteria::new()
            .kind(CanonicalType::Text)
            .required(true),
    );
    assert_eq!(required_text.len(), 1);
    assert_eq!(required_text[0].id, "a");

    assert_eq!(model.find_elements(&ElementCriteria::new().class("wide")).len(), 1);
    assert_eq!(model.find_elements(&ElementCriteria::new().tag("INPUT")).len(), 3);

    let custom = model.find_elements(&ElementCriteria::new().predicate(|el| el.id != "a"));
    assert_eq!(custom.len(), 2);
}

#[test]
fn test_get_form_and_all_elements() {
    let model = model_for(shared(vec![signup_form(), preferences_form()]));

    assert_eq!(model.get_forms_data().len(), 2);
    assert_eq!(model.get_form("signup").map(|f| f.elements.len()), Some(4));
    assert!(model.get_form("missing").is_none());
    assert_eq!(model.get_all_elements().len(), model.snapshot().element_count());
}

// =========================================================================
// Snapshots, history and events
// =========================================================================

#[test]
fn test_refresh_swaps_snapshot_and_keeps_bounded_history() {
    let model = model_for(shared(vec![signup_form()]));
    let first = model.snapshot();

    for _ in 0..(HISTORY_LIMIT + 3) {
        model.refresh().expect("refresh");
    }

    assert_eq!(model.history().len(), HISTORY_LIMIT);
    assert_eq!(model.generation(), HISTORY_LIMIT as u64 + 4);
    assert_eq!(first.element_count(), 4, "held snapshots are never mutated");
}

#[tokio::test]
async fn test_refresh_publishes_forms_updated_with_diff() {
    let document = shared(vec![signup_form()]);
    let model = model_for(Arc::clone(&document));
    let mut events = model.subscribe();

    {
        let mut doc = document.write();
        let form = doc.get_element_by_id("signup").expect("signup form");
        mount(&mut doc, form, &input("phone", "tel")).expect("mount");
    }
    model.refresh().expect("refresh");

    match events.recv().await.expect("event") {
        EngineEvent::FormsUpdated { forms, diff, .. } => {
            assert_eq!(forms[0].elements.len(), 5);
            assert_eq!(diff.added, vec!["phone".to_string()]);
            assert!(diff.removed.is_empty());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_detached_root_fails_refresh() {
    let document = shared(vec![signup_form()]);
    let form = node_by_id(&document, "signup");
    let model = SemanticModel::new(Arc::clone(&document), DocumentScanner::default()).with_root(form);
    model.refresh().expect("root is attached");

    document.write().remove(form).expect("remove form");

    assert!(matches!(model.ensure_live(), Err(EngineError::Operation { .. })));
    assert!(model.refresh().is_err());
    assert_eq!(model.snapshot().element_count(), 4, "last good snapshot is kept");
}

// =========================================================================
// Watching
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_mutation_burst_collapses_into_one_rescan() {
    let document = shared(vec![signup_form()]);
    let model = model_for(Arc::clone(&document));
    model
        .start_watching(Duration::from_millis(300))
        .expect("watcher starts");
    let target = node_by_id(&document, "first_name");

    for i in 0..5 {
        document
            .write()
            .set_attribute(target, "class", &format!("variant-{}", i))
            .expect("set class");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(model.pending_rescans(), 1);
    assert_eq!(model.rescan_count(), 0);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(model.rescan_count(), 1);
    assert_eq!(model.pending_rescans(), 0);
    assert_eq!(model.generation(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unwatched_attribute_does_not_rescan() {
    let document = shared(vec![signup_form()]);
    let model = model_for(Arc::clone(&document));
    model
        .start_watching(Duration::from_millis(300))
        .expect("watcher starts");
    let target = node_by_id(&document, "email");

    document
        .write()
        .set_attribute(target, "data-tracking", "1")
        .expect("set attribute");
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert_eq!(model.rescan_count(), 0);
    assert_eq!(model.generation(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_added_control_is_picked_up_after_debounce() {
    let document = shared(vec![signup_form()]);
    let model = model_for(Arc::clone(&document));
    model
        .start_watching(Duration::from_millis(300))
        .expect("watcher starts");

    {
        let mut doc = document.write();
        let form = doc.get_element_by_id("signup").expect("signup form");
        for spec in labelled("phone", "tel", "Phone") {
            mount(&mut doc, form, &spec).expect("mount");
        }
    }
    tokio::time::sleep(Duration::from_millis(350)).await;

    assert!(model.find_element("phone").is_some());
    assert_eq!(model.rescan_count(), 1);

    model.stop_watching();
    assert!(!model.is_watching());
}

#[test]
fn test_start_watching_without_runtime_is_missing_collaborator() {
    let model = model_for(shared(vec![signup_form()]));
    assert!(matches!(
        model.start_watching(Duration::from_millis(10)),
        Err(EngineError::MissingCollaborator(_))
    ));
}
