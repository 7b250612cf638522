use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audit::logger::AuditLogger;
use crate::dom::document::{NodeId, SharedDocument};
use crate::error::EngineError;
use crate::fill::fill_model::{FillOptions, FillResult, FillValues, HighlightOptions};
use crate::fill::orchestrator::FillOrchestrator;
use crate::model::semantic_model::SemanticModel;
use crate::scanner::element_model::{ExtractionSnapshot, FormDescriptor};
use crate::scanner::scanner::{DocumentScanner, ScanOptions};
use crate::validation::engine::ValidationEngine;
use crate::validation::result::{FormValidationResult, ValidationOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Full,
    Legacy,
}

/// Surface shared by the full engine and the legacy extractor.
#[async_trait]
pub trait FormEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn get_forms_data(&self) -> Vec<FormDescriptor>;

    /// Re-scan the document.
    fn refresh(&self) -> Result<Arc<ExtractionSnapshot>, EngineError>;

    async fn apply_values(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError>;

    async fn validate_forms(
        &self,
        options: &ValidationOptions,
    ) -> Result<Vec<FormValidationResult>, EngineError>;

    fn highlight(&self, targets: &[String], options: &HighlightOptions) -> Result<usize, EngineError>;

    fn remove_highlight(&self) -> usize;
}

// ============================================================================
// FullEngine
// ============================================================================

/// Semantic model, validation engine and fill orchestrator wired together
/// over one document.
pub struct FullEngine {
    model: Arc<SemanticModel>,
    validation: Arc<ValidationEngine>,
    fill: FillOrchestrator,
}

impl FullEngine {
    /// Build and run the initial scan. Fails when the scan root is not part
    /// of the document.
    pub fn new(
        document: SharedDocument,
        options: ScanOptions,
        root: Option<NodeId>,
    ) -> Result<Self, EngineError> {
        let mut model = SemanticModel::new(document, DocumentScanner::new(options));
        if let Some(root) = root {
            model = model.with_root(root);
        }
        let model = Arc::new(model);
        let snapshot = model
            .refresh()
            .map_err(|e| EngineError::Construction(e.to_string()))?;
        debug!(forms = snapshot.forms.len(), "full engine ready");

        let validation = Arc::new(ValidationEngine::new(Arc::clone(&model)));
        let fill = FillOrchestrator::new(Arc::clone(&model), Arc::clone(&validation));
        Ok(Self {
            model,
            validation,
            fill,
        })
    }

    pub fn with_audit(mut self, audit: AuditLogger) -> Self {
        self.fill = self.fill.with_audit(audit);
        self
    }

    pub fn model(&self) -> &Arc<SemanticModel> {
        &self.model
    }

    pub fn validation(&self) -> &Arc<ValidationEngine> {
        &self.validation
    }

    pub fn orchestrator(&self) -> &FillOrchestrator {
        &self.fill
    }
}

#[async_trait]
impl FormEngine for FullEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Full
    }

    fn get_forms_data(&self) -> Vec<FormDescriptor> {
        self.model.get_forms_data()
    }

    fn refresh(&self) -> Result<Arc<ExtractionSnapshot>, EngineError> {
        self.model.refresh()
    }

    async fn apply_values(
        &self,
        values: &FillValues,
        options: &FillOptions,
    ) -> Result<FillResult, EngineError> {
        if options.smart_matching {
            self.fill.smart_fill_forms(values, options).await
        } else {
            self.fill.apply_values(values, options).await
        }
    }

    async fn validate_forms(
        &self,
        options: &ValidationOptions,
    ) -> Result<Vec<FormValidationResult>, EngineError> {
        self.model.ensure_live()?;
        Ok(self.validation.validate_forms(options).await)
    }

    fn highlight(&self, targets: &[String], options: &HighlightOptions) -> Result<usize, EngineError> {
        self.fill.highlight(targets, options)
    }

    fn remove_highlight(&self) -> usize {
        self.fill.remove_highlight()
    }
}
