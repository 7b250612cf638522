use thiserror::Error;

use crate::dom::document::NodeId;

/// Failures raised by the document arena and its selector engine.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    #[error("cannot insert node {child} under {parent}: {reason}")]
    InvalidHierarchy {
        parent: NodeId,
        child: NodeId,
        reason: String,
    },

    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("document spec parse error ({context}): {reason}")]
    SpecParse { context: String, reason: String },
}

/// Hard failures that propagate to the caller.
///
/// Per-element extraction problems, unresolved identifiers, type mismatches
/// and validator crashes are reported as data inside results instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine could not initialize against the given document.
    #[error("engine construction failed: {0}")]
    Construction(String),

    /// A required service was not supplied.
    #[error("missing collaborator: {0}")]
    MissingCollaborator(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The full engine failed mid-operation and no fallback was allowed.
    #[error("operation '{operation}' failed: {reason}")]
    Operation { operation: String, reason: String },
}

impl EngineError {
    pub fn operation(operation: &str, reason: impl Into<String>) -> Self {
        Self::Operation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }
}

/// Problems loading a config or document file for the CLI.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// A validator could not evaluate a value. Downgraded to a warning by the
/// validation engine.
#[derive(Debug, Error)]
#[error("validator '{validator}' failed: {reason}")]
pub struct ValidatorError {
    pub validator: String,
    pub reason: String,
}

impl ValidatorError {
    pub fn new(validator: &str, reason: impl Into<String>) -> Self {
        Self {
            validator: validator.to_string(),
            reason: reason.into(),
        }
    }
}
