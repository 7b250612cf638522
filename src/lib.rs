//! Form intelligence: discover the interactive surfaces of a document,
//! describe them, fill them with typed values and validate them.
//!
//! [`scanner`] produces immutable extraction snapshots, [`model`] owns the
//! current snapshot and keeps it in step with document mutations,
//! [`validation`] and [`fill`] act on the model, and [`bridge`] routes calls
//! between the full engine and a minimal legacy extractor.

pub mod audit;
pub mod bridge;
pub mod cli;
pub mod dom;
pub mod error;
pub mod fill;
pub mod model;
pub mod report;
pub mod scanner;
pub mod validation;
