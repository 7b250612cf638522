use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::dom::validity::compute_validity;
use crate::error::EngineError;
use crate::model::semantic_model::SemanticModel;
use crate::scanner::element_model::{ElementDescriptor, FieldValue};
use crate::scanner::extract::{extract_accessibility, live_value};
use crate::validation::accessibility::check_accessibility;
use crate::validation::annotate::annotate;
use crate::validation::result::{
    CustomResult, FormValidationResult, IssueSource, Severity, ValidationIssue, ValidationOptions,
    ValidationResult, compute_score,
};
use crate::validation::validators::{
    ValidationContext, Validator, builtin_validators, requested_validators,
};

#[derive(Default)]
struct Collected {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
    custom_results: Vec<CustomResult>,
}

/// Validator registry plus per-field rules and a result cache keyed by
/// element id.
pub struct ValidationEngine {
    model: Arc<SemanticModel>,
    validators: RwLock<BTreeMap<String, Arc<dyn Validator>>>,
    field_rules: RwLock<HashMap<String, Vec<Arc<dyn Validator>>>>,
    cache: RwLock<HashMap<String, ValidationResult>>,
}

impl ValidationEngine {
    pub fn new(model: Arc<SemanticModel>) -> Self {
        let validators = builtin_validators()
            .into_iter()
            .map(|v| (v.name().to_string(), v))
            .collect();
        Self {
            model,
            validators: RwLock::new(validators),
            field_rules: RwLock::new(HashMap::new()),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &Arc<SemanticModel> {
        &self.model
    }

    // ------------------------------------------------------------------
    // Registry
    // ------------------------------------------------------------------

    /// Register a validator, replacing any with the same name.
    pub fn register(&self, validator: Arc<dyn Validator>) -> Option<Arc<dyn Validator>> {
        self.validators
            .write()
            .insert(validator.name().to_string(), validator)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.validators.write().remove(name).is_some()
    }

    pub fn validator_names(&self) -> Vec<String> {
        self.validators.read().keys().cloned().collect()
    }

    /// Attach a rule to one field, matched by element id or `name`.
    pub fn register_field_rule(&self, field: &str, rule: Arc<dyn Validator>) {
        self.field_rules
            .write()
            .entry(field.to_string())
            .or_default()
            .push(rule);
    }

    pub fn cached(&self, element_id: &str) -> Option<ValidationResult> {
        self.cache.read().get(element_id).cloned()
    }

    fn applicable_validators(&self, el: &ElementDescriptor) -> Vec<Arc<dyn Validator>> {
        let requested = requested_validators(el);
        let registry = self.validators.read();
        for name in &requested {
            if !registry.contains_key(name) {
                warn!(element = %el.id, validator = %name, "unknown validator requested");
            }
        }
        let mut selected: Vec<Arc<dyn Validator>> = registry
            .values()
            .filter(|v| v.applies_to(el) || requested.iter().any(|r| r == v.name()))
            .cloned()
            .collect();
        selected.sort_by_key(|v| v.priority());
        selected
    }

    fn field_rules_for(&self, el: &ElementDescriptor) -> Vec<Arc<dyn Validator>> {
        let rules = self.field_rules.read();
        let mut keys = vec![el.id.as_str()];
        if let Some(name) = el.name.as_deref().filter(|n| *n != el.id) {
            keys.push(name);
        }
        let mut selected: Vec<Arc<dyn Validator>> = keys
            .into_iter()
            .filter_map(|k| rules.get(k))
            .flatten()
            .cloned()
            .collect();
        selected.sort_by_key(|v| v.priority());
        selected
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Native constraints, then validators, then field rules, then
    /// accessibility checks. Validator failures become warnings.
    pub async fn validate_element(
        &self,
        el: &ElementDescriptor,
        options: &ValidationOptions,
    ) -> ValidationResult {
        let shared = self.model.document();
        let (value, validity, current) = {
            let doc = shared.read();
            let mut current = el.clone();
            current.accessibility = extract_accessibility(&doc, el.node);
            (live_value(&doc, el), compute_validity(&doc, el.node), current)
        };

        let mut collected = Collected::default();
        for kind in validity.failures() {
            collected.errors.push(ValidationIssue {
                code: kind.code().to_string(),
                message: options.message_for(kind),
                severity: Severity::Error,
                source: IssueSource::Html5,
                rule: None,
            });
        }

        if options.run_validators {
            let validators = self.applicable_validators(&current);
            self.run_rules(&validators, IssueSource::Validator, "validation_error", &current, &value, &mut collected)
                .await;
            let rules = self.field_rules_for(&current);
            self.run_rules(&rules, IssueSource::FieldRule, "rule_error", &current, &value, &mut collected)
                .await;
        }

        let accessibility_issues = if options.check_accessibility {
            let previous = self.cached(&el.id);
            check_accessibility(&current, previous.as_ref())
        } else {
            Vec::new()
        };

        let result = ValidationResult {
            element_id: el.id.clone(),
            valid: collected.errors.is_empty(),
            score: compute_score(
                collected.errors.len(),
                collected.warnings.len(),
                accessibility_issues.len(),
            ),
            errors: collected.errors,
            warnings: collected.warnings,
            html5_validity: validity,
            custom_results: collected.custom_results,
            accessibility_issues,
        };
        debug!(
            element = %el.id,
            valid = result.valid,
            score = result.score,
            "element validated"
        );

        self.cache.write().insert(el.id.clone(), result.clone());
        if options.annotate {
            let mut doc = shared.write();
            if let Err(e) = annotate(&mut doc, el.node, &result) {
                warn!(element = %el.id, error = %e, "could not annotate element");
            }
        }
        result
    }

    async fn run_rules(
        &self,
        rules: &[Arc<dyn Validator>],
        source: IssueSource,
        failure_code: &str,
        el: &ElementDescriptor,
        value: &FieldValue,
        out: &mut Collected,
    ) {
        let document = self.model.document();
        for rule in rules {
            let ctx = ValidationContext {
                document: &document,
                element: el,
            };
            let outcome = rule.validate(value, &ctx).await;

            match outcome {
                Ok(outcome) => {
                    out.custom_results.push(CustomResult {
                        rule: rule.name().to_string(),
                        valid: outcome.valid,
                        message: outcome.message.clone(),
                    });
                    if outcome.valid {
                        continue;
                    }
                    let severity = outcome.severity.unwrap_or(Severity::Error);
                    let issue = ValidationIssue {
                        code: rule.name().to_string(),
                        message: outcome
                            .message
                            .unwrap_or_else(|| format!("{} check failed", rule.name())),
                        severity,
                        source,
                        rule: Some(rule.name().to_string()),
                    };
                    match severity {
                        Severity::Error => out.errors.push(issue),
                        Severity::Warning => out.warnings.push(issue),
                        Severity::Info => {}
                    }
                }
                Err(e) => {
                    warn!(element = %el.id, error = %e, "validator raised an error");
                    out.warnings.push(ValidationIssue {
                        code: failure_code.to_string(),
                        message: e.to_string(),
                        severity: Severity::Warning,
                        source,
                        rule: Some(rule.name().to_string()),
                    });
                }
            }
        }
    }

    pub async fn validate_form(
        &self,
        form_id: &str,
        options: &ValidationOptions,
    ) -> Result<FormValidationResult, EngineError> {
        let form = self
            .model
            .get_form(form_id)
            .ok_or_else(|| EngineError::operation("validate_form", format!("unknown form '{}'", form_id)))?;

        let mut results = Vec::with_capacity(form.elements.len());
        for el in &form.elements {
            results.push(self.validate_element(el, options).await);
        }
        let summary = FormValidationResult::from_results(&form.id, results);
        info!(form = %form.id, valid = summary.valid, score = summary.score, "form validated");
        Ok(summary)
    }

    /// Validate every form in the current snapshot.
    pub async fn validate_forms(&self, options: &ValidationOptions) -> Vec<FormValidationResult> {
        let snapshot = self.model.snapshot();
        let mut out = Vec::with_capacity(snapshot.forms.len());
        for form in &snapshot.forms {
            let mut results = Vec::with_capacity(form.elements.len());
            for el in &form.elements {
                results.push(self.validate_element(el, options).await);
            }
            out.push(FormValidationResult::from_results(&form.id, results));
        }
        out
    }
}
