use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::scanner::element_model::FieldValue;
use crate::validation::result::ValidationResult;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 50;

/// Identifier (id, name, selector, label, ...) to raw value.
pub type FillValues = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FillOptions {
    /// Validate each filled element and fold failures into warnings.
    pub validate: bool,
    /// Skip disabled, read-only and hidden elements.
    pub skip_disabled: bool,
    /// Retry failed applications against the next fuzzy-matched candidate.
    pub smart_matching: bool,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Fire `input` and `change` after each successful application.
    pub dispatch_events: bool,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            validate: false,
            skip_disabled: true,
            smart_matching: false,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            dispatch_events: true,
        }
    }
}

/// How a value was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMethod {
    DirectAssignment,
    NumericAssignment,
    DateAssignment,
    CheckboxToggle,
    CheckboxGroup,
    RadioSelection,
    SelectByValue,
    MultiSelect,
    ColorAssignment,
    EditableText,
    EditableHtml,
    AriaValue,
    AriaSelection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedValue {
    pub identifier: String,
    pub element_id: String,
    pub previous_value: FieldValue,
    pub new_value: FieldValue,
    pub method: ApplyMethod,
    /// Set when the element was found by fuzzy resolution.
    pub match_score: Option<u8>,
    /// Retry round that succeeded; 0 for the first pass.
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedValue {
    pub identifier: String,
    pub element_id: Option<String>,
    pub reason: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillWarning {
    pub identifier: String,
    pub element_id: Option<String>,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillResult {
    pub success: Vec<AppliedValue>,
    pub failed: Vec<FailedValue>,
    pub warnings: Vec<FillWarning>,
    pub validation_results: BTreeMap<String, ValidationResult>,
    pub total_attempted: usize,
    pub execution_time_ms: f64,
    /// Successes that needed a retry; also present in `success`.
    pub retried: Vec<AppliedValue>,
    /// Set by the compatibility bridge when the legacy extractor served the call.
    pub fallback_used: bool,
}

impl FillResult {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn succeeded(&self, identifier: &str) -> bool {
        self.success.iter().any(|s| s.identifier == identifier)
    }

    pub fn failure(&self, identifier: &str) -> Option<&FailedValue> {
        self.failed.iter().find(|f| f.identifier == identifier)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightOptions {
    /// Value written to `data-fie-highlight`.
    pub tone: String,
    /// Drop existing highlights first.
    pub replace: bool,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            tone: "info".to_string(),
            replace: false,
        }
    }
}
