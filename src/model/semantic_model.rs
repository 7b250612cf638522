use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::dom::document::{Document, NodeId, SharedDocument};
use crate::error::EngineError;
use crate::model::diff::diff;
use crate::model::events::EngineEvent;
use crate::model::query::ElementCriteria;
use crate::model::watcher::{WatchHandle, WatchStats, watch_loop};
use crate::scanner::element_model::{ElementDescriptor, ExtractionSnapshot, FormDescriptor};
use crate::scanner::scanner::DocumentScanner;

pub const HISTORY_LIMIT: usize = 10;
const EVENT_CAPACITY: usize = 64;

// ============================================================================
// SemanticModel
// ============================================================================

/// Owns the current extraction snapshot and keeps it in step with the
/// document. Snapshots are swapped whole; readers holding an `Arc` keep a
/// consistent version.
pub struct SemanticModel {
    document: SharedDocument,
    scanner: DocumentScanner,
    root: Option<NodeId>,
    snapshot: RwLock<Arc<ExtractionSnapshot>>,
    generation: AtomicU64,
    history: Mutex<VecDeque<Arc<ExtractionSnapshot>>>,
    events: broadcast::Sender<EngineEvent>,
    watcher: Mutex<Option<WatchHandle>>,
    watch_stats: Arc<WatchStats>,
}

impl SemanticModel {
    /// Model over the whole body. No scan runs until [`refresh`](Self::refresh).
    pub fn new(document: SharedDocument, scanner: DocumentScanner) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            document,
            scanner,
            root: None,
            snapshot: RwLock::new(Arc::new(ExtractionSnapshot::empty())),
            generation: AtomicU64::new(0),
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LIMIT)),
            events,
            watcher: Mutex::new(None),
            watch_stats: Arc::new(WatchStats::default()),
        }
    }

    /// Restrict scanning to the subtree under `root`.
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = Some(root);
        self
    }

    pub fn document(&self) -> SharedDocument {
        Arc::clone(&self.document)
    }

    pub fn scanner(&self) -> &DocumentScanner {
        &self.scanner
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    /// Fails when the configured scan root has left the document.
    pub fn ensure_live(&self) -> Result<NodeId, EngineError> {
        let doc = self.document.read();
        self.scan_root(&doc)
    }

    fn scan_root(&self, doc: &Document) -> Result<NodeId, EngineError> {
        match self.root {
            None => Ok(doc.body()),
            Some(root) if doc.is_element(root) && doc.is_connected(root) => Ok(root),
            Some(root) => Err(EngineError::operation(
                "refresh",
                format!("scan root {} is not connected to the document", root),
            )),
        }
    }

    /// Re-scan and replace the snapshot, then publish `FormsUpdated`.
    pub fn refresh(&self) -> Result<Arc<ExtractionSnapshot>, EngineError> {
        let next = {
            let doc = self.document.read();
            let root = self.scan_root(&doc)?;
            Arc::new(self.scanner.scan(&doc, Some(root)))
        };

        let previous = std::mem::replace(&mut *self.snapshot.write(), Arc::clone(&next));
        if self.generation.fetch_add(1, Ordering::SeqCst) > 0 {
            let mut history = self.history.lock();
            history.push_back(Arc::clone(&previous));
            while history.len() > HISTORY_LIMIT {
                history.pop_front();
            }
        }

        let change = diff(&previous, &next);
        info!(
            forms = next.forms.len(),
            elements = next.element_count(),
            added = change.added.len(),
            removed = change.removed.len(),
            "snapshot refreshed"
        );
        self.publish(EngineEvent::FormsUpdated {
            forms: next.forms.clone(),
            statistics: next.statistics.clone(),
            diff: change,
        });
        Ok(next)
    }

    pub fn snapshot(&self) -> Arc<ExtractionSnapshot> {
        Arc::clone(&*self.snapshot.read())
    }

    /// How many snapshots have been produced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Prior snapshots, oldest first.
    pub fn history(&self) -> Vec<Arc<ExtractionSnapshot>> {
        self.history.lock().iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_forms_data(&self) -> Vec<FormDescriptor> {
        self.snapshot().forms.clone()
    }

    pub fn get_form(&self, id: &str) -> Option<FormDescriptor> {
        self.snapshot().forms.iter().find(|f| f.id == id).cloned()
    }

    pub fn get_all_elements(&self) -> Vec<ElementDescriptor> {
        self.snapshot().elements().cloned().collect()
    }

    pub fn find_elements(&self, criteria: &ElementCriteria) -> Vec<ElementDescriptor> {
        self.snapshot()
            .elements()
            .filter(|el| criteria.matches(el))
            .cloned()
            .collect()
    }

    /// Resolve by element id, `name`, selector, `data-identifier`, then
    /// `aria-label`.
    pub fn find_element(&self, identifier: &str) -> Option<ElementDescriptor> {
        let snapshot = self.snapshot();
        let first = |pred: &dyn Fn(&ElementDescriptor) -> bool| {
            snapshot.elements().find(|el| pred(el)).cloned()
        };

        first(&|el| el.id == identifier)
            .or_else(|| {
                let doc = self.document.read();
                doc.get_element_by_id(identifier)
                    .and_then(|node| descriptor_for_node(&snapshot, node))
            })
            .or_else(|| first(&|el| el.name.as_deref() == Some(identifier)))
            .or_else(|| self.find_by_selector(&snapshot, identifier))
            .or_else(|| first(&|el| el.custom.get("identifier").is_some_and(|v| v == identifier)))
            .or_else(|| first(&|el| el.accessibility.aria_label.as_deref() == Some(identifier)))
    }

    fn find_by_selector(
        &self,
        snapshot: &ExtractionSnapshot,
        selector: &str,
    ) -> Option<ElementDescriptor> {
        let doc = self.document.read();
        let nodes = match doc.query_selector_all(doc.root(), selector) {
            Ok(nodes) => nodes,
            Err(e) => {
                debug!(selector, error = %e, "identifier is not a selector");
                return None;
            }
        };
        nodes
            .into_iter()
            .find_map(|node| descriptor_for_node(snapshot, node))
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        let name = event.name();
        if self.events.send(event).is_err() {
            debug!(event = name, "no subscribers for engine event");
        }
    }

    // ------------------------------------------------------------------
    // Live updates
    // ------------------------------------------------------------------

    /// Observe document mutations and re-extract after `debounce` of quiet.
    /// Requires a running tokio runtime. Replaces any previous watcher.
    pub fn start_watching(self: &Arc<Self>, debounce: Duration) -> Result<(), EngineError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| EngineError::MissingCollaborator("tokio runtime".to_string()))?;
        let records = self.document.write().observe();
        let task = runtime.spawn(watch_loop(
            Arc::downgrade(self),
            records,
            debounce,
            Arc::clone(&self.watch_stats),
        ));
        if let Some(old) = self.watcher.lock().replace(WatchHandle { task }) {
            old.abort();
        }
        debug!(debounce_ms = debounce.as_millis() as u64, "watching document mutations");
        Ok(())
    }

    pub fn stop_watching(&self) {
        if let Some(handle) = self.watcher.lock().take() {
            handle.abort();
            debug!("stopped watching document mutations");
        }
    }

    pub fn is_watching(&self) -> bool {
        self.watcher
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn pending_rescans(&self) -> usize {
        self.watch_stats.pending()
    }

    pub fn rescan_count(&self) -> usize {
        self.watch_stats.rescans()
    }
}

impl Drop for SemanticModel {
    fn drop(&mut self) {
        if let Some(handle) = self.watcher.get_mut().take() {
            handle.abort();
        }
    }
}

fn descriptor_for_node(snapshot: &ExtractionSnapshot, node: NodeId) -> Option<ElementDescriptor> {
    snapshot
        .elements()
        .find(|el| el.nodes().contains(&node))
        .cloned()
}
