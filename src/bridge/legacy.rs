use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::dom::document::{Document, NodeId, SharedDocument};
use crate::dom::validity::compute_validity;
use crate::error::EngineError;
use crate::fill::apply::apply_value;
use crate::fill::fill_model::{
    AppliedValue, FailedValue, FillOptions, FillResult, FillValues, FillWarning, HighlightOptions,
};
use crate::fill::highlight::HighlightSet;
use crate::scanner::element_model::{
    ElementDescriptor, ExtractionSnapshot, FormDescriptor, FormKind, FormStructure,
};
use crate::scanner::extract::{extract_element, live_value};
use crate::scanner::index::ScanIndex;
use crate::scanner::labels::resolve_basic_label;
use crate::scanner::scanner::{STANDALONE_FORM_ID, summarize_accessibility, unique_id};
use crate::scanner::stats::{compute_statistics, validation_rule_index};
use crate::scanner::type_map::classify;
use crate::validation::result::{
    FormValidationResult, IssueSource, Severity, ValidationIssue, ValidationOptions,
    ValidationResult, compute_score,
};

use super::engine::{EngineKind, FormEngine};

const SKIPPED_INPUT_TYPES: [&str; 5] = ["hidden", "submit", "button", "reset", "image"];

// ============================================================================
// LegacyExtractor
// ============================================================================

/// Minimal extractor: native `input`/`select`/`textarea` in the light tree,
/// a short label cascade, exact identifier lookup and native validation only.
pub struct LegacyExtractor {
    document: SharedDocument,
    root: Option<NodeId>,
    snapshot: RwLock<Arc<ExtractionSnapshot>>,
    highlights: Mutex<HighlightSet>,
}

impl LegacyExtractor {
    pub fn new(document: SharedDocument, root: Option<NodeId>) -> Self {
        let extractor = Self {
            document,
            root,
            snapshot: RwLock::new(Arc::new(ExtractionSnapshot::empty())),
            highlights: Mutex::new(HighlightSet::default()),
        };
        extractor.rescan();
        extractor
    }

    pub fn snapshot(&self) -> Arc<ExtractionSnapshot> {
        Arc::clone(&*self.snapshot.read())
    }

    fn rescan(&self) -> Arc<ExtractionSnapshot> {
        let next = {
            let doc = self.document.read();
            Arc::new(self.scan(&doc))
        };
        *self.snapshot.write() = Arc::clone(&next);
        next
    }

    /// The configured root while it is attached, otherwise `<body>`.
    fn scan_root(&self, doc: &Document) -> NodeId {
        match self.root {
            Some(root) if doc.is_element(root) && doc.is_connected(root) => root,
            _ => doc.body(),
        }
    }

    pub fn scan(&self, doc: &Document) -> ExtractionSnapshot {
        let started = Instant::now();
        let root = self.scan_root(doc);
        let index = ScanIndex::build(doc, root);
        let mut forms: Vec<FormDescriptor> = Vec::new();
        let mut form_index: HashMap<Option<NodeId>, usize> = HashMap::new();
        let mut used_ids: HashSet<String> = HashSet::new();

        for node in doc.descendants(root) {
            let Some(el) = doc.element(node) else {
                continue;
            };
            if !matches!(el.tag.as_str(), "input" | "select" | "textarea") {
                continue;
            }
            if el.tag == "input" && SKIPPED_INPUT_TYPES.contains(&el.input_type().as_str()) {
                continue;
            }
            let Some(kind) = classify(el) else {
                continue;
            };

            let mut descriptor = match extract_element(doc, &index, node, kind) {
                Ok(d) => d,
                Err(e) => {
                    warn!(node = %node, error = %e, "legacy extraction skipped element");
                    continue;
                }
            };
            let (label, source) = match resolve_basic_label(doc, &index, node) {
                Some((label, source)) => (Some(label), Some(source)),
                None => (None, None),
            };
            descriptor.label = label;
            descriptor.label_source = source;
            descriptor.id = unique_id(&descriptor.id, &mut used_ids);

            let owner = doc.closest(node, "form");
            let idx = *form_index.entry(owner).or_insert_with(|| {
                forms.push(legacy_form(doc, owner, forms.len()));
                forms.len() - 1
            });
            forms[idx].elements.push(descriptor);
        }

        for form in &mut forms {
            form.structure = FormStructure {
                element_count: form.elements.len(),
                required_fields: form.elements.iter().filter(|e| e.constraints.required).count(),
                ..FormStructure::default()
            };
            form.accessibility = summarize_accessibility(&form.elements);
        }

        let extraction_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(forms = forms.len(), elapsed_ms = extraction_time_ms, "legacy scan complete");
        ExtractionSnapshot {
            timestamp: Utc::now(),
            statistics: compute_statistics(&forms),
            validation_rules: validation_rule_index(&forms),
            field_groups: Vec::new(),
            forms,
            extraction_time_ms,
        }
    }

    /// Exact element id or `name` only.
    pub fn find_element(&self, identifier: &str) -> Option<ElementDescriptor> {
        let snapshot = self.snapshot();
        snapshot
            .elements()
            .find(|el| el.id == identifier)
            .or_else(|| snapshot.elements().find(|el| el.name.as_deref() == Some(identifier)))
            .cloned()
    }

    fn validate_element(&self, doc: &Document, el: &ElementDescriptor, options: &ValidationOptions) -> ValidationResult {
        let validity = compute_validity(doc, el.node);
        let errors: Vec<ValidationIssue> = validity
            .failures()
            .into_iter()
            .map(|kind| ValidationIssue {
                code: kind.code().to_string(),
                message: options.message_for(kind),
                severity: Severity::Error,
                source: IssueSource::Html5,
                rule: None,
            })
            .collect();
        ValidationResult {
            element_id: el.id.clone(),
            valid: errors.is_empty(),
            score: compute_score(errors.len(), 0, 0),
            errors,
            warnings: Vec::new(),
            html5_validity: validity,
            custom_results: Vec::new(),
            accessibility_issues: Vec::new(),
        }
    }
}

fn legacy_form(doc: &Document, owner: Option<NodeId>, index: usize) -> FormDescriptor {
    let el = owner.and_then(|n| doc.element(n));
    let attr = |name: &str| el.and_then(|e| e.attr(name)).map(str::to_string);
    let id = match owner {
        None => STANDALONE_FORM_ID.to_string(),
        Some(_) => el
            .and_then(|e| e.id().or(e.name()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("form-{}", index)),
    };
    FormDescriptor {
        id,
        node: owner,
        kind: if owner.is_some() {
            FormKind::Native
        } else {
            FormKind::Standalone
        },
        name: attr("name"),
        action: attr("action"),
        method: attr("method")
            .map(|m| m.to_lowercase())
            .unwrap_or_else(|| "get".to_string()),
        enctype: attr("enctype").unwrap_or_else(|| "application/x-www-form-urlencoded".to_string()),
        autocomplete: attr("autocomplete"),
        novalidate: el.is_some_and(|e| e.has_attr("novalidate")),
        elements: Vec::new(),
        structure: FormStructure::default(),
        accessibility: Default::default(),
    }
}

#[async_trait]
impl FormEngine for LegacyExtractor {
    fn kind(&self) -> EngineKind {
        EngineKind::Legacy
    }

    fn get_forms_data(&self) -> Vec<FormDescriptor> {
        self.snapshot().forms.clone()
    }

    fn refresh(&self) -> Result<Arc<ExtractionSnapshot>, EngineError> {
        Ok(self.rescan())
    }

    async fn apply_values(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError> {
        let started = Instant::now();
        self.rescan();
        let mut result = FillResult {
            total_attempted: values.len(),
            ..FillResult::default()
        };

        for (identifier, value) in values {
            let Some(el) = self.find_element(identifier) else {
                result.failed.push(FailedValue {
                    identifier: identifier.clone(),
                    element_id: None,
                    reason: "no element matches this identifier".to_string(),
                    suggestions: Vec::new(),
                });
                continue;
            };
            if options.skip_disabled && (el.disabled || el.readonly) {
                result.warnings.push(FillWarning {
                    identifier: identifier.clone(),
                    element_id: Some(el.id.clone()),
                    code: "skipped".to_string(),
                    message: format!("{} is not editable", el.id),
                });
                continue;
            }

            let mut doc = self.document.write();
            let previous = live_value(&doc, &el);
            match apply_value(&mut doc, &el, value) {
                Ok(method) => {
                    if options.dispatch_events {
                        doc.dispatch_event(el.node, "input");
                        doc.dispatch_event(el.node, "change");
                    }
                    result.success.push(AppliedValue {
                        identifier: identifier.clone(),
                        element_id: el.id.clone(),
                        previous_value: previous,
                        new_value: live_value(&doc, &el),
                        method,
                        match_score: None,
                        attempt: 0,
                    });
                }
                Err(e) => result.failed.push(FailedValue {
                    identifier: identifier.clone(),
                    element_id: Some(el.id.clone()),
                    reason: e.to_string(),
                    suggestions: Vec::new(),
                }),
            }
        }

        if options.validate {
            let doc = self.document.read();
            let validation = ValidationOptions::default();
            for applied in &result.success {
                let Some(el) = self.find_element(&applied.element_id) else {
                    continue;
                };
                let outcome = self.validate_element(&doc, &el, &validation);
                for error in &outcome.errors {
                    result.warnings.push(FillWarning {
                        identifier: applied.identifier.clone(),
                        element_id: Some(el.id.clone()),
                        code: "validation_failed".to_string(),
                        message: error.message.clone(),
                    });
                }
                result.validation_results.insert(el.id.clone(), outcome);
            }
        }

        result.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        debug!(
            succeeded = result.success.len(),
            failed = result.failed.len(),
            "legacy values applied"
        );
        Ok(result)
    }

    async fn validate_forms(
        &self,
        options: &ValidationOptions,
    ) -> Result<Vec<FormValidationResult>, EngineError> {
        let snapshot = self.snapshot();
        let doc = self.document.read();
        Ok(snapshot
            .forms
            .iter()
            .map(|form| {
                let results = form
                    .elements
                    .iter()
                    .map(|el| self.validate_element(&doc, el, options))
                    .collect();
                FormValidationResult::from_results(&form.id, results)
            })
            .collect())
    }

    fn highlight(&self, targets: &[String], options: &HighlightOptions) -> Result<usize, EngineError> {
        let resolved: Vec<ElementDescriptor> =
            targets.iter().filter_map(|t| self.find_element(t)).collect();
        let nodes: Vec<NodeId> = resolved.iter().map(|el| el.node).collect();
        let mut doc = self.document.write();
        self.highlights
            .lock()
            .mark(&mut doc, &nodes, &options.tone, options.replace)?;
        Ok(resolved.len())
    }

    fn remove_highlight(&self) -> usize {
        let mut doc = self.document.write();
        self.highlights.lock().clear(&mut doc)
    }
}
