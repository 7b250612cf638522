use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::scanner::element_model::ExtractionSnapshot;

/// Element ids that appeared, disappeared or survived between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub fn diff(before: &ExtractionSnapshot, after: &ExtractionSnapshot) -> SnapshotDiff {
    let before_ids: BTreeSet<&str> = before.elements().map(|e| e.id.as_str()).collect();
    let after_ids: BTreeSet<&str> = after.elements().map(|e| e.id.as_str()).collect();

    SnapshotDiff {
        added: after_ids.difference(&before_ids).map(|id| id.to_string()).collect(),
        removed: before_ids.difference(&after_ids).map(|id| id.to_string()).collect(),
        unchanged: before_ids.intersection(&after_ids).map(|id| id.to_string()).collect(),
    }
}
