pub mod apply;
pub mod fill_model;
pub mod fuzzy;
pub mod highlight;
pub mod orchestrator;
