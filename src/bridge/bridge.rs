use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::logger::AuditLogger;
use crate::dom::document::{NodeId, SharedDocument};
use crate::error::EngineError;
use crate::fill::fill_model::{FillOptions, FillResult, FillValues, HighlightOptions};
use crate::scanner::element_model::{ExtractionSnapshot, FormDescriptor};
use crate::scanner::scanner::ScanOptions;
use crate::validation::result::{FormValidationResult, ValidationOptions};

use super::engine::{EngineKind, FormEngine, FullEngine};
use super::legacy::LegacyExtractor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackPolicy {
    /// Try to activate the full engine at all.
    pub prefer_full: bool,
    /// Re-run a failed full-engine `apply_values` on the legacy extractor.
    pub retry_apply_on_legacy: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            prefer_full: true,
            retry_apply_on_legacy: true,
        }
    }
}

// ============================================================================
// CompatibilityBridge
// ============================================================================

/// Routes calls to the full engine when it initialized, otherwise to the
/// legacy extractor.
pub struct CompatibilityBridge {
    full: Option<Arc<FullEngine>>,
    legacy: Arc<LegacyExtractor>,
    policy: FallbackPolicy,
}

impl CompatibilityBridge {
    pub fn new(
        document: SharedDocument,
        scan: ScanOptions,
        root: Option<NodeId>,
        policy: FallbackPolicy,
    ) -> Self {
        Self::with_audit(document, scan, root, policy, AuditLogger::disabled())
    }

    pub fn with_audit(
        document: SharedDocument,
        scan: ScanOptions,
        root: Option<NodeId>,
        policy: FallbackPolicy,
        audit: AuditLogger,
    ) -> Self {
        let legacy = Arc::new(LegacyExtractor::new(Arc::clone(&document), root));
        let full = if policy.prefer_full {
            match FullEngine::new(document, scan, root).and_then(check_capabilities) {
                Ok(engine) => Some(Arc::new(engine.with_audit(audit))),
                Err(e) => {
                    warn!(error = %e, "full engine unavailable, using legacy extractor");
                    None
                }
            }
        } else {
            None
        };
        let bridge = Self {
            full,
            legacy,
            policy,
        };
        info!(engine = ?bridge.active_kind(), "compatibility bridge ready");
        bridge
    }

    pub fn active_kind(&self) -> EngineKind {
        self.active().kind()
    }

    pub fn full(&self) -> Option<&Arc<FullEngine>> {
        self.full.as_ref()
    }

    pub fn legacy(&self) -> &Arc<LegacyExtractor> {
        &self.legacy
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    fn active(&self) -> &dyn FormEngine {
        match &self.full {
            Some(full) => full.as_ref(),
            None => self.legacy.as_ref(),
        }
    }

    pub fn get_forms_data(&self) -> Vec<FormDescriptor> {
        self.active().get_forms_data()
    }

    pub fn refresh(&self) -> Result<Arc<ExtractionSnapshot>, EngineError> {
        self.active().refresh()
    }

    /// Apply on the active engine. A full-engine failure is retried once on
    /// the legacy extractor when the policy allows it.
    pub async fn apply_values(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError> {
        let Some(full) = &self.full else {
            return self.legacy.apply_values(values, options).await;
        };
        match full.apply_values(values, options).await {
            Ok(result) => Ok(result),
            Err(e) if self.policy.retry_apply_on_legacy => {
                warn!(error = %e, "full engine apply failed, retrying on legacy extractor");
                let mut result = self.legacy.apply_values(values, options).await?;
                result.fallback_used = true;
                Ok(result)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn validate_forms(
        &self,
        options: &ValidationOptions,
    ) -> Result<Vec<FormValidationResult>, EngineError> {
        self.active().validate_forms(options).await
    }

    pub fn highlight(&self, targets: &[String], options: &HighlightOptions) -> Result<usize, EngineError> {
        self.active().highlight(targets, options)
    }

    pub fn remove_highlight(&self) -> usize {
        self.active().remove_highlight()
    }
}

/// The full engine is usable only when its model is live and can re-scan.
fn check_capabilities(engine: FullEngine) -> Result<FullEngine, EngineError> {
    engine
        .model()
        .ensure_live()
        .and_then(|_| engine.refresh())
        .map_err(|e| EngineError::Construction(e.to_string()))?;
    Ok(engine)
}
