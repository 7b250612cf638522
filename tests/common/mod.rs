#![allow(dead_code)]

use std::sync::Arc;

use form_intelligence::dom::builder::{DocumentSpec, NodeSpec};
use form_intelligence::dom::document::{Document, NodeId, SharedDocument};
use form_intelligence::fill::fill_model::FillValues;
use form_intelligence::fill::orchestrator::FillOrchestrator;
use form_intelligence::model::semantic_model::SemanticModel;
use form_intelligence::scanner::scanner::DocumentScanner;
use form_intelligence::validation::engine::ValidationEngine;

// =========================================================================
// Document builders
// =========================================================================

pub fn build(body: Vec<NodeSpec>) -> Document {
    DocumentSpec::new(body).build().expect("fixture document must build")
}

pub fn shared(body: Vec<NodeSpec>) -> SharedDocument {
    build(body).into_shared()
}

/// `<input id=.. name=.. type=..>`
pub fn input(id: &str, kind: &str) -> NodeSpec {
    NodeSpec::element("input")
        .attr("id", id)
        .attr("name", id)
        .attr("type", kind)
}

/// `<label for=id>` followed by the input.
pub fn labelled(id: &str, kind: &str, label: &str) -> Vec<NodeSpec> {
    vec![
        NodeSpec::element("label").attr("for", id).text(label),
        input(id, kind),
    ]
}

pub fn radio(name: &str, value: &str) -> NodeSpec {
    NodeSpec::element("input")
        .attr("type", "radio")
        .attr("name", name)
        .attr("value", value)
        .attr("id", &format!("{}-{}", name, value))
}

pub fn option(value: &str) -> NodeSpec {
    NodeSpec::element("option").attr("value", value).text(value)
}

/// Signup form: first/last name, required email, password.
pub fn signup_form() -> NodeSpec {
    let mut children = Vec::new();
    children.extend(labelled("first_name", "text", "First Name"));
    children.extend(labelled("last_name", "text", "Last Name"));
    children.extend(labelled("email", "email", "Email"));
    children.extend(labelled("password", "password", "Password"));
    NodeSpec::element("form")
        .attr("id", "signup")
        .attr("method", "POST")
        .children(children)
}

/// Preferences form: radio group, multi-select, checkbox, file, color, number.
pub fn preferences_form() -> NodeSpec {
    NodeSpec::element("form").attr("id", "prefs").children(vec![
        NodeSpec::element("fieldset").children(vec![
            NodeSpec::element("legend").text("Favourite color"),
            radio("color", "red"),
            radio("color", "green"),
            radio("color", "blue"),
        ]),
        NodeSpec::element("label").attr("for", "letters").text("Letters"),
        NodeSpec::element("select")
            .attr("id", "letters")
            .attr("name", "letters")
            .attr("multiple", "")
            .children(vec![option("a"), option("b"), option("c")]),
        NodeSpec::element("label").attr("for", "size").text("Size"),
        NodeSpec::element("select")
            .attr("id", "size")
            .attr("name", "size")
            .children(vec![option("small"), option("medium"), option("large")]),
        NodeSpec::element("label").attr("for", "newsletter").text("Newsletter"),
        input("newsletter", "checkbox"),
        NodeSpec::element("label").attr("for", "avatar").text("Avatar"),
        input("avatar", "file"),
        NodeSpec::element("label").attr("for", "theme").text("Theme"),
        input("theme", "color"),
        NodeSpec::element("label").attr("for", "age").text("Age"),
        input("age", "number"),
    ])
}

// =========================================================================
// Engine wiring
// =========================================================================

pub fn model_for(document: SharedDocument) -> Arc<SemanticModel> {
    model_with_scanner(document, DocumentScanner::default())
}

pub fn model_with_scanner(document: SharedDocument, scanner: DocumentScanner) -> Arc<SemanticModel> {
    let model = Arc::new(SemanticModel::new(document, scanner));
    model.refresh().expect("initial scan must succeed");
    model
}

pub struct Harness {
    pub document: SharedDocument,
    pub model: Arc<SemanticModel>,
    pub validation: Arc<ValidationEngine>,
    pub fill: FillOrchestrator,
}

pub fn harness(body: Vec<NodeSpec>) -> Harness {
    harness_with_scanner(body, DocumentScanner::default())
}

pub fn harness_with_scanner(body: Vec<NodeSpec>, scanner: DocumentScanner) -> Harness {
    let document = shared(body);
    let model = model_with_scanner(Arc::clone(&document), scanner);
    let validation = Arc::new(ValidationEngine::new(Arc::clone(&model)));
    let fill = FillOrchestrator::new(Arc::clone(&model), Arc::clone(&validation));
    Harness {
        document,
        model,
        validation,
        fill,
    }
}

pub fn values(pairs: &[(&str, serde_json::Value)]) -> FillValues {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn node_by_id(document: &SharedDocument, id: &str) -> NodeId {
    document
        .read()
        .get_element_by_id(id)
        .unwrap_or_else(|| panic!("no element with id '{}'", id))
}
