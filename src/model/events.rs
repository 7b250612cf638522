use serde::Serialize;

use crate::fill::fill_model::FillResult;
use crate::model::diff::SnapshotDiff;
use crate::scanner::element_model::{FormDescriptor, Statistics};

/// Change notifications published on the model's broadcast channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    FormsUpdated {
        forms: Vec<FormDescriptor>,
        statistics: Statistics,
        diff: SnapshotDiff,
    },
    ValuesApplied {
        result: FillResult,
    },
}

impl EngineEvent {
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::FormsUpdated { .. } => "forms_updated",
            EngineEvent::ValuesApplied { .. } => "values_applied",
        }
    }
}
