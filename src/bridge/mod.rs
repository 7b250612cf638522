pub mod bridge;
pub mod engine;
pub mod legacy;
