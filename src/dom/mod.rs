pub mod builder;
pub mod document;
pub mod fragment;
pub mod mutation;
pub mod selector;
pub mod validity;
