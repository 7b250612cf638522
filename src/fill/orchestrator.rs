use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::audit::event::{AuditEvent, AuditOutcome};
use crate::audit::logger::AuditLogger;
use crate::dom::document::{Document, NodeId};
use crate::error::EngineError;
use crate::fill::apply::{ApplyError, apply_value};
use crate::fill::fill_model::{
    AppliedValue, FailedValue, FillOptions, FillResult, FillValues, FillWarning, HighlightOptions,
};
use crate::fill::fuzzy::{fuzzy_resolve, ranked_matches, suggestions};
use crate::fill::highlight::HighlightSet;
use crate::model::events::EngineEvent;
use crate::model::semantic_model::SemanticModel;
use crate::scanner::element_model::ElementDescriptor;
use crate::scanner::extract::live_value;
use crate::validation::engine::ValidationEngine;
use crate::validation::result::ValidationOptions;

const UNRESOLVED_REASON: &str = "no element matches this identifier";

/// An entry whose first application failed and may be retried against
/// another candidate.
struct PendingRetry<'a> {
    identifier: &'a str,
    value: &'a Value,
    tried: Vec<String>,
    last_element: String,
    last_error: String,
}

fn skip_reason(el: &ElementDescriptor) -> Option<&'static str> {
    if el.disabled {
        Some("disabled")
    } else if el.readonly {
        Some("read-only")
    } else if !el.visible {
        Some("hidden")
    } else {
        None
    }
}

/// Nodes that receive `input`/`change`: checked group members, or the
/// element itself.
fn event_targets(doc: &Document, el: &ElementDescriptor) -> Vec<NodeId> {
    match &el.group {
        Some(group) => group
            .members
            .iter()
            .map(|m| m.node)
            .filter(|n| doc.checked(*n))
            .collect(),
        None => vec![el.node],
    }
}

// ============================================================================
// FillOrchestrator
// ============================================================================

pub struct FillOrchestrator {
    model: Arc<SemanticModel>,
    validation: Arc<ValidationEngine>,
    highlights: Mutex<HighlightSet>,
    audit: AuditLogger,
}

impl FillOrchestrator {
    pub fn new(model: Arc<SemanticModel>, validation: Arc<ValidationEngine>) -> Self {
        Self {
            model,
            validation,
            highlights: Mutex::new(HighlightSet::default()),
            audit: AuditLogger::disabled(),
        }
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Resolve each identifier, write its value with the handler for the
    /// element's type, then retry and validate as `options` ask.
    pub async fn apply_values(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError> {
        let started = Instant::now();
        self.model.ensure_live()?;
        if self.model.generation() == 0 {
            self.model.refresh()?;
        }
        let elements = self.model.get_all_elements();
        let mut result = FillResult {
            total_attempted: values.len(),
            ..FillResult::default()
        };
        let mut pending: Vec<PendingRetry<'_>> = Vec::new();

        for (identifier, value) in values {
            let Some((el, score)) = self.resolve(identifier, &elements) else {
                self.audit.log(
                    &AuditEvent::now(identifier, AuditOutcome::Failed).with_reason(UNRESOLVED_REASON),
                );
                result.failed.push(FailedValue {
                    identifier: identifier.clone(),
                    element_id: None,
                    reason: UNRESOLVED_REASON.to_string(),
                    suggestions: suggestions(identifier, &elements),
                });
                continue;
            };

            if options.skip_disabled {
                if let Some(reason) = skip_reason(&el) {
                    self.audit.log(
                        &AuditEvent::now(identifier, AuditOutcome::Skipped)
                            .with_element(&el.id)
                            .with_reason(reason),
                    );
                    result.warnings.push(FillWarning {
                        identifier: identifier.clone(),
                        element_id: Some(el.id.clone()),
                        code: "skipped".to_string(),
                        message: format!("{} is {}", el.id, reason),
                    });
                    continue;
                }
            }

            match self.try_apply(identifier, &el, value, score, 0, options) {
                Ok(applied) => result.success.push(applied),
                Err(e) if options.smart_matching && e.is_retryable() && options.max_retries > 0 => {
                    pending.push(PendingRetry {
                        identifier,
                        value,
                        tried: vec![el.id.clone()],
                        last_element: el.id.clone(),
                        last_error: e.to_string(),
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

        let mut attempt = 0;
        while !pending.is_empty() && attempt < options.max_retries {
            attempt += 1;
            tokio::time::sleep(Duration::from_millis(options.retry_delay_ms)).await;
            debug!(attempt, entries = pending.len(), "retrying failed applications");

            let mut still_failing = Vec::new();
            for mut entry in pending {
                let alternate = ranked_matches(entry.identifier, &elements)
                    .into_iter()
                    .find(|(el, _)| {
                        !entry.tried.contains(&el.id)
                            && !(options.skip_disabled && skip_reason(el).is_some())
                    })
                    .map(|(el, score)| (el.clone(), score));
                let Some((alt, score)) = alternate else {
                    result.failed.push(Self::exhausted(&entry, &elements));
                    continue;
                };

                entry.tried.push(alt.id.clone());
                match self.try_apply(entry.identifier, &alt, entry.value, Some(score), attempt, options) {
                    Ok(applied) => {
                        result.retried.push(applied.clone());
                        result.success.push(applied);
                    }
                    Err(e) => {
                        entry.last_element = alt.id.clone();
                        entry.last_error = e.to_string();
                        if e.is_retryable() {
                            still_failing.push(entry);
                        } else {
                            result.failed.push(Self::exhausted(&entry, &elements));
                        }
                    }
                }
            }
            pending = still_failing;
        }
        for entry in &pending {
            result.failed.push(Self::exhausted(entry, &elements));
        }

        if options.validate {
            self.validate_applied(&elements, &mut result).await;
        }

        result.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        info!(
            attempted = result.total_attempted,
            succeeded = result.success.len(),
            failed = result.failed.len(),
            retried = result.retried.len(),
            "values applied"
        );
        self.model.publish(EngineEvent::ValuesApplied {
            result: result.clone(),
        });
        Ok(result)
    }

    /// `apply_values` with fuzzy retries forced on.
    pub async fn smart_fill_forms(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError> {
        let options = FillOptions {
            smart_matching: true,
            ..options.clone()
        };
        self.apply_values(values, &options).await
    }

    fn exhausted(entry: &PendingRetry<'_>, elements: &[ElementDescriptor]) -> FailedValue {
        FailedValue {
            identifier: entry.identifier.to_string(),
            element_id: Some(entry.last_element.clone()),
            reason: entry.last_error.clone(),
            suggestions: suggestions(entry.identifier, elements)
                .into_iter()
                .filter(|id| !entry.tried.contains(id))
                .collect(),
        }
    }

    /// Exact lookup through the model, then the best positive fuzzy score.
    fn resolve(
        &self,
        identifier: &str,
        elements: &[ElementDescriptor],
    ) -> Option<(ElementDescriptor, Option<u8>)> {
        if let Some(el) = self.model.find_element(identifier) {
            return Some((el, None));
        }
        let (el, score) = fuzzy_resolve(identifier, elements)?;
        debug!(identifier, element = %el.id, score, "fuzzy match");
        Some((el.clone(), Some(score)))
    }

    fn try_apply(
        &self,
        identifier: &str,
        el: &ElementDescriptor,
        value: &Value,
        score: Option<u8>,
        attempt: u32,
        options: &FillOptions,
    ) -> Result<AppliedValue, ApplyError> {
        let shared = self.model.document();
        let mut doc = shared.write();
        let previous = live_value(&doc, el);

        let method = match apply_value(&mut doc, el, value) {
            Ok(method) => method,
            Err(e) => {
                drop(doc);
                debug!(identifier, element = %el.id, error = %e, "application failed");
                self.audit.log(
                    &AuditEvent::now(identifier, AuditOutcome::Failed)
                        .with_element(&el.id)
                        .with_attempt(attempt)
                        .with_score(score)
                        .with_reason(&e),
                );
                return Err(e);
            }
        };

        let new_value = live_value(&doc, el);
        if options.dispatch_events {
            for node in event_targets(&doc, el) {
                doc.dispatch_event(node, "input");
                doc.dispatch_event(node, "change");
            }
        }
        drop(doc);

        self.audit.log(
            &AuditEvent::now(identifier, AuditOutcome::Applied)
                .with_element(&el.id)
                .with_attempt(attempt)
                .with_score(score)
                .with_change(method, &previous, &new_value),
        );
        Ok(AppliedValue {
            identifier: identifier.to_string(),
            element_id: el.id.clone(),
            previous_value: previous,
            new_value,
            method,
            match_score: score,
            attempt,
        })
    }

    async fn validate_applied(&self, elements: &[ElementDescriptor], result: &mut FillResult) {
        let options = ValidationOptions::default();
        let applied: Vec<(String, String)> = result
            .success
            .iter()
            .map(|a| (a.identifier.clone(), a.element_id.clone()))
            .collect();

        for (identifier, element_id) in applied {
            let Some(el) = elements.iter().find(|e| e.id == element_id) else {
                continue;
            };
            let outcome = self.validation.validate_element(el, &options).await;
            for error in &outcome.errors {
                result.warnings.push(FillWarning {
                    identifier: identifier.clone(),
                    element_id: Some(element_id.clone()),
                    code: "validation_failed".to_string(),
                    message: error.message.clone(),
                });
            }
            result.validation_results.insert(element_id, outcome);
        }
    }

    // ------------------------------------------------------------------
    // Highlighting
    // ------------------------------------------------------------------

    /// Mark every element named in `targets`. Returns how many were marked.
    pub fn highlight(&self, targets: &[String], options: &HighlightOptions) -> Result<usize, EngineError> {
        let elements = self.model.get_all_elements();
        let resolved: Vec<ElementDescriptor> = targets
            .iter()
            .filter_map(|t| match self.resolve(t, &elements) {
                Some((el, _)) => Some(el),
                None => {
                    warn!(target = %t, "highlight target not found");
                    None
                }
            })
            .collect();

        let nodes: Vec<NodeId> = resolved.iter().flat_map(|el| el.nodes()).collect();

        let shared = self.model.document();
        let mut doc = shared.write();
        self.highlights
            .lock()
            .mark(&mut doc, &nodes, &options.tone, options.replace)?;
        Ok(resolved.len())
    }

    pub fn remove_highlight(&self) -> usize {
        let shared = self.model.document();
        let mut doc = shared.write();
        self.highlights.lock().clear(&mut doc)
    }

    pub fn highlighted(&self) -> Vec<NodeId> {
        self.highlights.lock().nodes()
    }

    pub fn model(&self) -> &Arc<SemanticModel> {
        &self.model
    }

    pub fn validation(&self) -> &Arc<ValidationEngine> {
        &self.validation
    }
}
