pub mod accessibility;
pub mod annotate;
pub mod engine;
pub mod result;
pub mod validators;
