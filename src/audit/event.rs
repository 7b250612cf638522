use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fill::fill_model::ApplyMethod;
use crate::scanner::element_model::FieldValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Applied,
    Failed,
    Skipped,
}

/// One value-application attempt, written as a JSONL line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub identifier: String,
    pub element_id: Option<String>,
    pub outcome: AuditOutcome,
    pub attempt: u32,

    pub method: Option<ApplyMethod>,
    pub previous_value: Option<FieldValue>,
    pub new_value: Option<FieldValue>,
    pub match_score: Option<u8>,
    pub reason: Option<String>,
}

impl AuditEvent {
    pub fn now(identifier: &str, outcome: AuditOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            identifier: identifier.to_string(),
            element_id: None,
            outcome,
            attempt: 0,
            method: None,
            previous_value: None,
            new_value: None,
            match_score: None,
            reason: None,
        }
    }

    pub fn with_element(mut self, element_id: &str) -> Self {
        self.element_id = Some(element_id.to_string());
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_change(mut self, method: ApplyMethod, previous: &FieldValue, new: &FieldValue) -> Self {
        self.method = Some(method);
        self.previous_value = Some(previous.clone());
        self.new_value = Some(new.clone());
        self
    }

    pub fn with_score(mut self, score: Option<u8>) -> Self {
        self.match_score = score;
        self
    }

    pub fn with_reason(mut self, reason: impl ToString) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}
