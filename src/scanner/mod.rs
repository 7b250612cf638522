pub mod element_model;
pub mod extract;
pub mod groups;
pub mod index;
pub mod labels;
pub mod normalize;
pub mod scanner;
pub mod stats;
pub mod type_map;
