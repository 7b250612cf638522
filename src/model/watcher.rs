use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

use crate::dom::mutation::{MutationKind, MutationRecord};
use crate::model::semantic_model::SemanticModel;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Attribute changes that can alter what the scanner sees.
pub const WATCHED_ATTRIBUTES: [&str; 7] =
    ["type", "name", "id", "class", "required", "disabled", "readonly"];

/// Whether a mutation should schedule a re-extraction.
pub fn qualifies(record: &MutationRecord) -> bool {
    match &record.kind {
        MutationKind::ChildList { added, removed } => !added.is_empty() || !removed.is_empty(),
        MutationKind::Attributes { name, .. } => WATCHED_ATTRIBUTES.contains(&name.as_str()),
    }
}

/// Counters shared between the model and its watch task.
#[derive(Debug, Default)]
pub struct WatchStats {
    pending: AtomicUsize,
    rescans: AtomicUsize,
}

impl WatchStats {
    /// Re-extractions scheduled but not yet run (0 or 1).
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Re-extractions completed by the watcher.
    pub fn rescans(&self) -> usize {
        self.rescans.load(Ordering::SeqCst)
    }
}

pub struct WatchHandle {
    pub(crate) task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn abort(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Drain mutation records, collapse each burst into one re-extraction
/// after `debounce` of quiet, and stop once the model or the document's
/// sender side is gone.
pub(crate) async fn watch_loop(
    model: Weak<SemanticModel>,
    mut records: UnboundedReceiver<MutationRecord>,
    debounce: Duration,
    stats: Arc<WatchStats>,
) {
    while let Some(record) = records.recv().await {
        if !qualifies(&record) {
            continue;
        }
        stats.pending.store(1, Ordering::SeqCst);
        let mut deadline = Instant::now() + debounce;
        let mut collapsed = 1usize;

        let closed = loop {
            tokio::select! {
                _ = sleep_until(deadline) => break false,
                next = records.recv() => match next {
                    Some(r) if qualifies(&r) => {
                        collapsed += 1;
                        deadline = Instant::now() + debounce;
                    }
                    Some(_) => {}
                    None => break true,
                },
            }
        };

        stats.pending.store(0, Ordering::SeqCst);
        let Some(model) = model.upgrade() else {
            return;
        };
        debug!(collapsed, "debounced re-extraction");
        match model.refresh() {
            Ok(_) => {
                stats.rescans.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => warn!(error = %e, "re-extraction failed"),
        }
        if closed {
            return;
        }
    }
}
