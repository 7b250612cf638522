use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::validity::{ConstraintKind, ValidityState};

pub const SCORE_START: i32 = 100;
pub const ERROR_PENALTY: i32 = 20;
pub const WARNING_PENALTY: i32 = 5;
pub const ACCESSIBILITY_BONUS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Where an issue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Html5,
    Validator,
    FieldRule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    pub source: IssueSource,
    /// Validator or rule name, for non-native issues.
    pub rule: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessibilityIssue {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// WCAG success criterion, e.g. `4.1.2`.
    pub guideline: String,
}

/// What a validator reports for one value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    pub valid: bool,
    pub message: Option<String>,
    /// Failing outcomes default to `Error`.
    pub severity: Option<Severity>,
}

impl RuleOutcome {
    pub fn pass() -> Self {
        Self {
            valid: true,
            message: None,
            severity: None,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            severity: Some(Severity::Error),
        }
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: Some(message.into()),
            severity: Some(Severity::Warning),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomResult {
    pub rule: String,
    pub valid: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub element_id: String,
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
    pub html5_validity: ValidityState,
    pub custom_results: Vec<CustomResult>,
    pub accessibility_issues: Vec<AccessibilityIssue>,
    pub score: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormValidationResult {
    pub form_id: String,
    pub valid: bool,
    pub results: Vec<ValidationResult>,
    /// Mean of element scores; 100 for an empty form.
    pub score: f64,
}

impl FormValidationResult {
    pub fn from_results(form_id: &str, results: Vec<ValidationResult>) -> Self {
        let score = if results.is_empty() {
            f64::from(SCORE_START)
        } else {
            results.iter().map(|r| f64::from(r.score)).sum::<f64>() / results.len() as f64
        };
        Self {
            form_id: form_id.to_string(),
            valid: results.iter().all(|r| r.valid),
            results,
            score,
        }
    }
}

// ============================================================================
// Options
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    pub check_accessibility: bool,
    pub run_validators: bool,
    /// Write error annotations into the document.
    pub annotate: bool,
    /// Message overrides keyed by constraint code (`value_missing`, ...).
    pub messages: BTreeMap<String, String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            check_accessibility: true,
            run_validators: true,
            annotate: false,
            messages: BTreeMap::new(),
        }
    }
}

impl ValidationOptions {
    pub fn message_for(&self, kind: ConstraintKind) -> String {
        self.messages
            .get(kind.code())
            .cloned()
            .unwrap_or_else(|| default_message(kind).to_string())
    }
}

pub fn default_message(kind: ConstraintKind) -> &'static str {
    match kind {
        ConstraintKind::ValueMissing => "This field is required",
        ConstraintKind::TypeMismatch => "Value does not match the expected format",
        ConstraintKind::PatternMismatch => "Value does not match the required pattern",
        ConstraintKind::TooLong => "Value is too long",
        ConstraintKind::TooShort => "Value is too short",
        ConstraintKind::RangeUnderflow => "Value is below the minimum",
        ConstraintKind::RangeOverflow => "Value is above the maximum",
        ConstraintKind::StepMismatch => "Value does not fit the allowed step",
        ConstraintKind::BadInput => "Value cannot be interpreted",
    }
}

/// 100, minus 20 per error and 5 per warning. Ten points are added back when
/// the element has no errors and no accessibility issues. Clamped to 0..=100.
pub fn compute_score(errors: usize, warnings: usize, accessibility_issues: usize) -> u8 {
    let mut score = SCORE_START
        .saturating_sub(ERROR_PENALTY.saturating_mul(errors as i32))
        .saturating_sub(WARNING_PENALTY.saturating_mul(warnings as i32));
    if errors == 0 && accessibility_issues == 0 {
        score += ACCESSIBILITY_BONUS;
    }
    score.clamp(0, SCORE_START) as u8
}
