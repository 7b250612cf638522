pub mod diff;
pub mod events;
pub mod query;
pub mod semantic_model;
pub mod watcher;
